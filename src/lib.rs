//! Team Bucket - review-workload insight for Bitbucket Server teams.
//!
//! The crate infers a signed-in user's team from recent pull-request
//! interactions, then aggregates the team's open review workload into a
//! ranked snapshot: who is free to review, who is sitting on stale reviews,
//! who the likely lead is, and which reviewers to suggest next.
//!
//! The moving parts, wired together by [`services::RefreshEngine`]:
//! - [`services::ConnectionProvider`] publishes the authenticated Bitbucket
//!   connection (password in the OS keychain, the rest in SQLite);
//! - [`db::repositories::RepositorySelection`] publishes the repositories
//!   the user tracks;
//! - [`services::TeamMembersProvider`] infers and caches the team;
//! - [`services::reviewers_information_from`] ranks the workload;
//! - [`services::EventBus`] carries user-facing conditions such as expired
//!   credentials or a lost network connection.

pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use error::AppError;
