//! Application event bus.
//!
//! A typed broadcast channel injected into every service that needs to
//! surface user-facing conditions (invalid credentials, connectivity loss,
//! missing repository selection). Components post fire-and-forget; a UI
//! layer subscribes and renders transient notifications. There is no global
//! instance - each application builds one bus and hands clones around.

use serde::Serialize;
use tokio::sync::broadcast;

/// Why credentials were flagged invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    /// No credentials are stored at all.
    Missing,

    /// The server rejected the stored credentials.
    Expired,

    /// The server answered with an unexpected error.
    ServerError,

    /// The host could not be resolved although the device is online.
    CannotReachServer,

    /// The configured server URL does not parse.
    InvalidUrl,
}

/// Cross-component notification events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// Stored credentials are unusable; the UI should re-prompt.
    CredentialsInvalid {
        notifier: String,
        reason: InvalidReason,
    },

    /// The device has no network connection.
    NoNetworkConnection { notifier: String },

    /// No repositories are selected; the UI should prompt for a selection.
    RepositoriesMissing { notifier: String },
}

/// Fan-out bus for [`AppEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    /// Create a bus with room for `capacity` undelivered events per receiver.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Post an event to all current subscribers.
    ///
    /// Posting with no subscribers is not an error; the event is dropped.
    pub fn post(&self, event: AppEvent) {
        if self.tx.send(event.clone()).is_err() {
            log::debug!("event dropped, no subscribers: {:?}", event);
        }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(32)
    }
}
