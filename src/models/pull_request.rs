//! Pull request models and the staleness classifier.
//!
//! These mirror the Bitbucket Server REST 1.0 wire shapes. All timestamps
//! are epoch milliseconds, as sent by the server.

use crate::models::repository::Repository;
use crate::models::user::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Role of a participant on a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    Author,
    Reviewer,
}

/// Review stance of a participant on a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewerStatus {
    Approved,
    NeedsWork,
    Unapproved,
}

/// One participant's stance on one pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestMember {
    pub user: User,
    pub role: MemberRole,
    pub approved: bool,
    pub status: ReviewerStatus,
}

/// State of a pull request as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PullRequestState {
    Open,
    Merged,
    Declined,
}

impl PullRequestState {
    /// Wire representation, also used as the cache column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Merged => "MERGED",
            Self::Declined => "DECLINED",
        }
    }
}

/// Query-side state filter for pull-request listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullRequestStatus {
    Open,
    Merged,
    All,
}

impl PullRequestStatus {
    /// Value of the `state` query parameter.
    pub fn as_query_value(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Merged => "merged",
            Self::All => "all",
        }
    }
}

/// Listing order for pull-request queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullRequestOrder {
    Newest,
    Oldest,
}

impl PullRequestOrder {
    /// Value of the `order` query parameter.
    pub fn as_query_value(&self) -> &'static str {
        match self {
            Self::Newest => "NEWEST",
            Self::Oldest => "OLDEST",
        }
    }
}

/// A branch reference on a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitRef {
    /// Human-readable branch name.
    pub display_id: String,

    /// SHA of the branch head at fetch time.
    pub latest_commit: String,

    /// Repository the reference lives in.
    pub repository: Repository,
}

/// A pull request snapshot as fetched from the server.
///
/// Snapshots are recomputed wholesale on every refresh; the only client-side
/// identity is the (id, repository slug, project key) composite used when
/// persisting to the local cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: i64,
    pub title: String,

    /// Creation timestamp, epoch milliseconds.
    #[serde(rename = "createdDate")]
    pub created_date: i64,

    /// Last-update timestamp, epoch milliseconds.
    #[serde(rename = "updatedDate")]
    pub updated_date: i64,

    pub author: PullRequestMember,
    pub reviewers: Vec<PullRequestMember>,
    pub state: PullRequestState,

    /// Source branch.
    #[serde(rename = "fromRef")]
    pub from_ref: GitRef,

    /// Target branch.
    #[serde(rename = "toRef")]
    pub to_ref: GitRef,
}

impl PullRequest {
    /// Classify this pull request as "lazily reviewed" relative to `now`.
    ///
    /// Two-branch policy, day-granular:
    /// - a PR that saw no update within 3 days of creation is stale once it
    ///   is 4 or more days old ("never touched");
    /// - a PR that was updated later than that is stale once 2 or more days
    ///   have passed since the last update ("touched, then abandoned").
    pub fn is_lazily_reviewed(&self, now: DateTime<Utc>) -> bool {
        let now_ms = now.timestamp_millis();
        if (self.updated_date - self.created_date) / MILLIS_PER_DAY <= 3 {
            (now_ms - self.created_date) / MILLIS_PER_DAY >= 4
        } else {
            (now_ms - self.updated_date) / MILLIS_PER_DAY >= 2
        }
    }

    /// Users listed as reviewers who have not approved this pull request.
    pub fn unapproved_reviewers(&self) -> impl Iterator<Item = &PullRequestMember> {
        self.reviewers.iter().filter(|member| !member.approved)
    }
}

/// A single pull-request activity entry (comments, approvals, merges).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestActivity {
    pub id: i64,

    /// Activity timestamp, epoch milliseconds.
    pub created_date: i64,

    pub user: User,

    /// Server-side action tag (`COMMENTED`, `APPROVED`, `REVIEWED`,
    /// `OPENED`, `MERGED`, `DECLINED`).
    pub action: String,
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use chrono::TimeZone;

    fn days_ago(now: DateTime<Utc>, days: i64) -> i64 {
        now.timestamp_millis() - days * MILLIS_PER_DAY
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_untouched_pr_stale_after_four_days() {
        let mut pr = pull_request(1, "anna", vec![]);
        pr.created_date = days_ago(now(), 4);
        pr.updated_date = pr.created_date;
        assert!(pr.is_lazily_reviewed(now()));
    }

    #[test]
    fn test_untouched_pr_fresh_at_three_days() {
        let mut pr = pull_request(1, "anna", vec![]);
        pr.created_date = days_ago(now(), 3);
        pr.updated_date = pr.created_date;
        assert!(!pr.is_lazily_reviewed(now()));
    }

    #[test]
    fn test_active_pr_fresh_one_day_after_update() {
        // Updated 5 days after creation, then again 1 day ago: still active.
        let mut pr = pull_request(1, "anna", vec![]);
        pr.created_date = days_ago(now(), 6);
        pr.updated_date = days_ago(now(), 1);
        assert!(!pr.is_lazily_reviewed(now()));
    }

    #[test]
    fn test_active_pr_stale_two_days_after_update() {
        let mut pr = pull_request(1, "anna", vec![]);
        pr.created_date = days_ago(now(), 7);
        pr.updated_date = days_ago(now(), 2);
        assert!(pr.is_lazily_reviewed(now()));
    }

    #[test]
    fn test_unapproved_reviewers_filter() {
        let pr = pull_request(
            1,
            "anna",
            vec![reviewer("bert", true), reviewer("carl", false)],
        );
        let unapproved: Vec<_> = pr
            .unapproved_reviewers()
            .map(|m| m.user.slug.clone())
            .collect();
        assert_eq!(unapproved, vec!["carl"]);
    }

    #[test]
    fn test_status_query_values() {
        assert_eq!(PullRequestStatus::Open.as_query_value(), "open");
        assert_eq!(PullRequestStatus::All.as_query_value(), "all");
        assert_eq!(PullRequestOrder::Newest.as_query_value(), "NEWEST");
    }

    #[test]
    fn test_deserialize_wire_shape() {
        let json = r#"{
            "id": 7,
            "title": "Fix rounding in invoices",
            "createdDate": 1700000000000,
            "updatedDate": 1700090000000,
            "author": {
                "user": {"id": 1, "name": "anna", "displayName": "Anna", "slug": "anna", "avatarUrl": ""},
                "role": "AUTHOR",
                "approved": false,
                "status": "UNAPPROVED"
            },
            "reviewers": [{
                "user": {"id": 2, "name": "bert", "displayName": "Bert", "slug": "bert", "avatarUrl": ""},
                "role": "REVIEWER",
                "approved": true,
                "status": "APPROVED"
            }],
            "state": "OPEN",
            "fromRef": {
                "displayId": "feature/rounding",
                "latestCommit": "aaaa",
                "repository": {"slug": "billing", "name": "Billing", "project": {"key": "PLAT", "name": "Platform", "description": null}}
            },
            "toRef": {
                "displayId": "main",
                "latestCommit": "bbbb",
                "repository": {"slug": "billing", "name": "Billing", "project": {"key": "PLAT", "name": "Platform", "description": null}}
            }
        }"#;
        let pr: PullRequest = serde_json::from_str(json).unwrap();
        assert_eq!(pr.state, PullRequestState::Open);
        assert_eq!(pr.author.role, MemberRole::Author);
        assert_eq!(pr.reviewers[0].status, ReviewerStatus::Approved);
        assert_eq!(pr.from_ref.repository.project.key, "PLAT");
    }
}
