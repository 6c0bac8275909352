//! Service layer: Bitbucket access and the review aggregation pipeline.

pub mod bitbucket_client;
pub mod connection;
pub mod credentials;
pub mod events;
pub mod paginator;
pub mod refresh;
pub mod reviewers;
pub mod team_members;

pub use bitbucket_client::{BitbucketClient, BitbucketClientConfig, PAGE_SIZE};
pub use connection::{
    route_network_error, AlwaysOnline, BitbucketConnection, BitbucketCredentials,
    ConnectionProvider, Connectivity,
};
pub use credentials::CredentialService;
pub use events::{AppEvent, EventBus, InvalidReason};
pub use paginator::{fetch_all_pages, fetch_pages, Page};
pub use refresh::{RefreshEngine, RefreshHandle};
pub use reviewers::reviewers_information_from;
pub use team_members::{team_membership_of, TeamConfig, TeamMembersProvider};
