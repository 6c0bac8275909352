//! Data models for the application.
//!
//! Immutable wire/domain value types fetched from the Bitbucket Server REST
//! API plus the derived review-workload types computed by the services. All
//! models derive Serialize/Deserialize; the storage layer maps them to and
//! from SQLite rows at the persistence boundary only.

pub mod pull_request;
pub mod repository;
pub mod reviewer;
pub mod user;

// Re-exports for convenient access
pub use pull_request::{
    GitRef, MemberRole, PullRequest, PullRequestActivity, PullRequestMember, PullRequestOrder,
    PullRequestState, PullRequestStatus, ReviewerStatus,
};
pub use repository::{Project, Repository};
pub use reviewer::{Density, Reviewer, ReviewersInformation, TimedSnapshot};
pub use user::User;
