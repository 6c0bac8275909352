//! Derived review-workload models.
//!
//! Everything here is recomputed wholesale on each aggregation pass; none of
//! these types are mutated in place.

use crate::models::user::User;
use serde::{Deserialize, Serialize};

/// Directional interaction count between the signed-in user and a teammate.
///
/// `inbound` counts reviews the signed-in user received from this teammate
/// (including co-reviewer appearances); `outbound` counts reviews the
/// signed-in user gave on this teammate's pull requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Density {
    pub inbound: u32,
    pub outbound: u32,
}

impl Density {
    pub fn new(inbound: u32, outbound: u32) -> Self {
        Self { inbound, outbound }
    }

    /// Total interaction count, used for the membership threshold.
    pub fn total(&self) -> u32 {
        self.inbound + self.outbound
    }
}

/// One team member's computed review workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reviewer {
    pub user: User,
    pub density: Density,

    /// Number of currently open pull requests this member has yet to approve.
    pub reviews_count: u32,

    /// Whether this member sits on at least one lazily-reviewed pull request
    /// without having reacted to it.
    pub is_lazy: bool,
}

/// Output contract of one aggregation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewersInformation {
    /// All team members, least-loaded first, lead pinned to the top.
    pub reviewers: Vec<Reviewer>,

    /// Top-ranked reviewer suggestions (at most 3).
    pub preferred_reviewers: Vec<Reviewer>,

    /// Heuristically identified lead reviewer, if the signal is strong enough.
    pub lead: Option<User>,

    /// Server the snapshot was computed against.
    pub server_url: String,
}

impl ReviewersInformation {
    /// Snapshot representing "nothing to show": no team, no lead.
    pub fn empty() -> Self {
        Self {
            reviewers: Vec::new(),
            preferred_reviewers: Vec::new(),
            lead: None,
            server_url: String::new(),
        }
    }
}

impl Default for ReviewersInformation {
    fn default() -> Self {
        Self::empty()
    }
}

/// A value paired with the timestamp it was computed at, epoch milliseconds.
///
/// Used to wrap the persisted team-membership snapshot for TTL checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedSnapshot<T> {
    pub value: T,
    pub timestamp_ms: i64,
}

impl<T> TimedSnapshot<T> {
    pub fn new(value: T, timestamp_ms: i64) -> Self {
        Self {
            value,
            timestamp_ms,
        }
    }

    /// Age of the snapshot relative to `now_ms`.
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.timestamp_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_density_total() {
        assert_eq!(Density::new(5, 1).total(), 6);
        assert_eq!(Density::default().total(), 0);
    }

    #[test]
    fn test_empty_information() {
        let empty = ReviewersInformation::empty();
        assert!(empty.reviewers.is_empty());
        assert!(empty.preferred_reviewers.is_empty());
        assert!(empty.lead.is_none());
        assert_eq!(empty.server_url, "");
    }

    #[test]
    fn test_snapshot_age() {
        let snapshot = TimedSnapshot::new(1, 1_000);
        assert_eq!(snapshot.age_ms(4_000), 3_000);
        assert_eq!(snapshot.age_ms(1_000), 0);
    }
}
