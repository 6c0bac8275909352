//! Connection supply and network-error routing.
//!
//! The [`ConnectionProvider`] owns the stored credentials and publishes an
//! authenticated [`BitbucketConnection`] through a watch channel whenever
//! they change. Consumers treat the connection as an opaque capability; a
//! `None` value means no valid credentials exist and the UI should prompt.
//!
//! [`route_network_error`] implements the propagation policy: fetch-level
//! failures become event-bus notifications plus an empty contribution, so an
//! aggregation pass always completes with partial data instead of aborting.

use crate::db::pool::DbPool;
use crate::db::settings::{self, KEY_SERVER_URL, KEY_USERNAME};
use crate::error::{AppError, NetworkErrorKind};
use crate::services::bitbucket_client::{BitbucketClient, BitbucketClientConfig};
use crate::services::credentials::CredentialService;
use crate::services::events::{AppEvent, EventBus, InvalidReason};
use tokio::sync::watch;

/// The credential triple as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitbucketCredentials {
    pub server_url: String,
    pub username: String,
    pub password: String,
}

/// An authenticated handle to one Bitbucket server.
#[derive(Debug, Clone)]
pub struct BitbucketConnection {
    pub username: String,
    pub server_url: String,
    pub client: BitbucketClient,
}

impl BitbucketConnection {
    /// Build a connection from a credential triple.
    pub fn from_credentials(credentials: &BitbucketCredentials) -> Result<Self, AppError> {
        let client = BitbucketClient::new(BitbucketClientConfig::new(
            &credentials.server_url,
            &credentials.username,
            &credentials.password,
        ))?;

        Ok(Self {
            username: credentials.username.clone(),
            server_url: client.base_url().to_string(),
            client,
        })
    }
}

/// Probe for whether the device currently has any network at all.
///
/// Distinguishes "the server is unreachable" from "we are offline" when a
/// connect-level failure occurs. The default production implementation
/// assumes online; platforms with a connectivity API can supply their own.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Connectivity probe that always reports online.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// Route a fetch-level error to the event bus.
///
/// Returns `None` when the error was absorbed (the caller should treat the
/// fetch as having contributed zero results) and `Some` when the error is
/// not a recognized network condition and must propagate.
pub fn route_network_error(
    error: AppError,
    events: &EventBus,
    connectivity: &dyn Connectivity,
    notifier: &str,
) -> Option<AppError> {
    match error {
        AppError::AuthenticationExpired { .. } => {
            events.post(AppEvent::CredentialsInvalid {
                notifier: notifier.to_string(),
                reason: InvalidReason::Expired,
            });
            None
        }
        AppError::BitbucketApi { .. } => {
            events.post(AppEvent::CredentialsInvalid {
                notifier: notifier.to_string(),
                reason: InvalidReason::ServerError,
            });
            None
        }
        AppError::Network {
            kind: NetworkErrorKind::Timeout,
            ..
        } => {
            // Expected during cancellation; not worth a notification.
            None
        }
        AppError::Network {
            kind: NetworkErrorKind::Connect,
            ..
        } => {
            if connectivity.is_online() {
                events.post(AppEvent::CredentialsInvalid {
                    notifier: notifier.to_string(),
                    reason: InvalidReason::CannotReachServer,
                });
            } else {
                events.post(AppEvent::NoNetworkConnection {
                    notifier: notifier.to_string(),
                });
            }
            None
        }
        other => Some(other),
    }
}

/// Check that a server URL parses and uses an HTTP scheme.
fn validate_server_url(url: &str) -> bool {
    match reqwest::Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Supplies the current authenticated connection as a watch stream.
pub struct ConnectionProvider {
    pool: DbPool,
    events: EventBus,
    tx: watch::Sender<Option<BitbucketConnection>>,
}

impl ConnectionProvider {
    /// Create a provider, restoring any previously stored credentials.
    ///
    /// When nothing valid is stored the initial value is `None` and a
    /// `CredentialsInvalid(Missing)` event is posted so the UI prompts.
    pub async fn new(pool: DbPool, events: EventBus) -> Result<Self, AppError> {
        let initial = match Self::load_stored(&pool).await? {
            Some(credentials) => Some(BitbucketConnection::from_credentials(&credentials)?),
            None => {
                events.post(AppEvent::CredentialsInvalid {
                    notifier: "connection".to_string(),
                    reason: InvalidReason::Missing,
                });
                None
            }
        };

        let (tx, _) = watch::channel(initial);
        Ok(Self { pool, events, tx })
    }

    /// Subscribe to connection changes. The receiver always holds the
    /// latest value; intermediate values are skipped.
    pub fn connections(&self) -> watch::Receiver<Option<BitbucketConnection>> {
        self.tx.subscribe()
    }

    /// The current connection, if credentials are stored.
    pub fn current(&self) -> Option<BitbucketConnection> {
        self.tx.borrow().clone()
    }

    /// Validate and persist a new credential triple, then publish the
    /// resulting connection.
    pub async fn store_credentials(
        &self,
        credentials: BitbucketCredentials,
    ) -> Result<(), AppError> {
        if !validate_server_url(&credentials.server_url) {
            self.events.post(AppEvent::CredentialsInvalid {
                notifier: "connection".to_string(),
                reason: InvalidReason::InvalidUrl,
            });
            return Err(AppError::invalid_input_field(
                "Server URL is not a valid http(s) URL",
                "server_url",
            ));
        }

        let connection = BitbucketConnection::from_credentials(&credentials)?;

        settings::set_setting(&self.pool, KEY_SERVER_URL, &credentials.server_url).await?;
        settings::set_setting(&self.pool, KEY_USERNAME, &credentials.username).await?;
        CredentialService::store_password(&credentials.server_url, &credentials.password)?;

        self.tx.send_replace(Some(connection));
        Ok(())
    }

    /// Forget the stored credentials and publish `None`.
    pub async fn clear_credentials(&self) -> Result<(), AppError> {
        if let Some(server_url) = settings::get_setting(&self.pool, KEY_SERVER_URL).await? {
            CredentialService::delete_password(&server_url)?;
        }
        settings::delete_setting(&self.pool, KEY_SERVER_URL).await?;
        settings::delete_setting(&self.pool, KEY_USERNAME).await?;

        self.tx.send_replace(None);
        Ok(())
    }

    /// Check the current credentials against the server by fetching the
    /// signed-in user. Network failures and rejections are routed to the
    /// event bus; the return value says whether the credentials work.
    pub async fn validate_credentials(
        &self,
        connectivity: &dyn Connectivity,
    ) -> Result<bool, AppError> {
        let Some(connection) = self.current() else {
            return Ok(false);
        };

        match connection.client.get_user(&connection.username).await {
            Ok(_) => Ok(true),
            Err(error) => match route_network_error(error, &self.events, connectivity, "connection")
            {
                None => Ok(false),
                Some(fatal) => Err(fatal),
            },
        }
    }

    async fn load_stored(pool: &DbPool) -> Result<Option<BitbucketCredentials>, AppError> {
        let Some(server_url) = settings::get_setting(pool, KEY_SERVER_URL).await? else {
            return Ok(None);
        };
        let Some(username) = settings::get_setting(pool, KEY_USERNAME).await? else {
            return Ok(None);
        };

        let password = match CredentialService::get_password(&server_url) {
            Ok(password) => password,
            Err(AppError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(Some(BitbucketCredentials {
            server_url,
            username,
            password,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Offline;

    impl Connectivity for Offline {
        fn is_online(&self) -> bool {
            false
        }
    }

    fn expect_event(rx: &mut tokio::sync::broadcast::Receiver<AppEvent>) -> AppEvent {
        rx.try_recv().expect("expected an event")
    }

    #[test]
    fn test_validate_server_url() {
        assert!(validate_server_url("https://git.example.com"));
        assert!(validate_server_url("http://localhost:7990"));
        assert!(!validate_server_url("git.example.com"));
        assert!(!validate_server_url("ftp://git.example.com"));
        assert!(!validate_server_url(""));
    }

    #[test]
    fn test_route_expired_credentials() {
        let events = EventBus::new(8);
        let mut rx = events.subscribe();

        let absorbed = route_network_error(
            AppError::authentication_expired("401"),
            &events,
            &AlwaysOnline,
            "reviewers",
        );

        assert!(absorbed.is_none());
        assert_eq!(
            expect_event(&mut rx),
            AppEvent::CredentialsInvalid {
                notifier: "reviewers".to_string(),
                reason: InvalidReason::Expired,
            }
        );
    }

    #[test]
    fn test_route_server_error() {
        let events = EventBus::new(8);
        let mut rx = events.subscribe();

        let absorbed = route_network_error(
            AppError::bitbucket_api_full("oops", 500, "/x"),
            &events,
            &AlwaysOnline,
            "reviewers",
        );

        assert!(absorbed.is_none());
        assert_eq!(
            expect_event(&mut rx),
            AppEvent::CredentialsInvalid {
                notifier: "reviewers".to_string(),
                reason: InvalidReason::ServerError,
            }
        );
    }

    #[test]
    fn test_route_connect_failure_online_vs_offline() {
        let events = EventBus::new(8);
        let mut rx = events.subscribe();

        route_network_error(
            AppError::network("host unreachable", NetworkErrorKind::Connect),
            &events,
            &AlwaysOnline,
            "reviewers",
        );
        assert_eq!(
            expect_event(&mut rx),
            AppEvent::CredentialsInvalid {
                notifier: "reviewers".to_string(),
                reason: InvalidReason::CannotReachServer,
            }
        );

        route_network_error(
            AppError::network("host unreachable", NetworkErrorKind::Connect),
            &events,
            &Offline,
            "reviewers",
        );
        assert_eq!(
            expect_event(&mut rx),
            AppEvent::NoNetworkConnection {
                notifier: "reviewers".to_string(),
            }
        );
    }

    #[test]
    fn test_route_timeout_is_silent() {
        let events = EventBus::new(8);
        let mut rx = events.subscribe();

        let absorbed = route_network_error(
            AppError::network("timed out", NetworkErrorKind::Timeout),
            &events,
            &AlwaysOnline,
            "reviewers",
        );

        assert!(absorbed.is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_route_unrecognized_error_propagates() {
        let events = EventBus::new(8);

        let propagated = route_network_error(
            AppError::internal("bug"),
            &events,
            &AlwaysOnline,
            "reviewers",
        );

        assert!(matches!(propagated, Some(AppError::Internal { .. })));
    }
}
