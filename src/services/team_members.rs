//! Team-membership inference.
//!
//! Infers "my team" for the signed-in user from the authorship/review graph
//! of recent pull requests: people who review the user's code, people whose
//! code the user reviews, and co-reviewers, each weighted by a directional
//! interaction density. The result is cached with a time-based expiry so a
//! refresh normally costs nothing; recomputation is single-flight so
//! concurrent refresh triggers share one network pass.

use crate::db;
use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::{
    Density, PullRequest, PullRequestOrder, PullRequestStatus, Repository, TimedSnapshot, User,
};
use crate::services::connection::{route_network_error, BitbucketConnection, Connectivity};
use crate::services::events::EventBus;
use crate::services::paginator::{self, Page};
use chrono::Utc;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Event-bus notifier tag for this engine.
const NOTIFIER: &str = "team_members";

/// Tuning knobs for membership inference.
///
/// The per-repository page cap bounds how much history one repository may
/// contribute; historical versions of this heuristic used different caps,
/// so it is configuration rather than a constant.
#[derive(Debug, Clone)]
pub struct TeamConfig {
    /// Pages of pull requests fetched per repository.
    pub pages_per_repository: u64,

    /// Pull requests requested per page.
    pub page_limit: u64,

    /// Users whose total interaction count does not exceed this are noise.
    pub minimum_occurrences: u32,

    /// Cached snapshot lifetime in hours.
    pub membership_timeout_hours: i64,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            pages_per_repository: 1,
            page_limit: 20,
            minimum_occurrences: 2,
            membership_timeout_hours: 20,
        }
    }
}

impl TeamConfig {
    /// Snapshot lifetime in milliseconds.
    pub fn timeout_ms(&self) -> i64 {
        self.membership_timeout_hours * 60 * 60 * 1000
    }

    /// Minimum inbound/outbound ratio for the lead-reviewer call-out.
    ///
    /// The lead signal requires overwhelming directional evidence relative
    /// to the processed-PR budget, not just a slightly skewed ratio.
    pub fn lead_threshold(&self) -> f64 {
        0.75 * (self.page_limit * self.pages_per_repository) as f64
    }
}

/// Accumulate interaction densities for `user_login` over a window of pull
/// requests.
///
/// Per pull request (login matching is case-insensitive):
/// - the user is the author: every reviewer gains +1 inbound;
/// - the user is a reviewer: every other reviewer gains +1 inbound and the
///   author gains +1 outbound;
/// - the user is absent: no contribution.
///
/// Users whose summed counts do not exceed `minimum_occurrences` are
/// discarded as one-off interactions.
pub fn team_membership_of(
    user_login: &str,
    pull_requests: &[PullRequest],
    minimum_occurrences: u32,
) -> BTreeMap<User, Density> {
    let mut densities: BTreeMap<User, Density> = BTreeMap::new();

    for pull_request in pull_requests {
        let author = &pull_request.author.user;

        if author.matches_login(user_login) {
            for member in &pull_request.reviewers {
                densities.entry(member.user.clone()).or_default().inbound += 1;
            }
            continue;
        }

        let position = pull_request
            .reviewers
            .iter()
            .position(|member| member.user.matches_login(user_login));
        let Some(position) = position else {
            continue;
        };

        for (index, member) in pull_request.reviewers.iter().enumerate() {
            if index != position {
                densities.entry(member.user.clone()).or_default().inbound += 1;
            }
        }
        densities.entry(author.clone()).or_default().outbound += 1;
    }

    densities.retain(|_, density| density.total() > minimum_occurrences);
    densities
}

/// Whether a cached snapshot must be recomputed.
///
/// An empty team is treated as never-computed: it carries no signal and a
/// retry is cheap.
pub fn snapshot_expired(
    snapshot: &TimedSnapshot<BTreeMap<User, Density>>,
    now_ms: i64,
    config: &TeamConfig,
) -> bool {
    snapshot.age_ms(now_ms) > config.timeout_ms() || snapshot.value.is_empty()
}

/// Cached, single-flight team-membership engine.
pub struct TeamMembersProvider {
    pool: DbPool,
    events: EventBus,
    connectivity: Arc<dyn Connectivity>,
    config: TeamConfig,

    // Serializes recomputation; waiters re-check the cache after acquiring
    // so every concurrent trigger observes the same snapshot.
    recompute_guard: Mutex<()>,
}

impl TeamMembersProvider {
    pub fn new(
        pool: DbPool,
        events: EventBus,
        connectivity: Arc<dyn Connectivity>,
        config: TeamConfig,
    ) -> Self {
        Self {
            pool,
            events,
            connectivity,
            config,
            recompute_guard: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &TeamConfig {
        &self.config
    }

    /// The current team for the connection's user, served from the persisted
    /// snapshot when fresh, recomputed from the network otherwise.
    pub async fn team_members(
        &self,
        connection: &BitbucketConnection,
        repositories: &[Repository],
    ) -> Result<BTreeMap<User, Density>, AppError> {
        let client = connection.client.clone();
        let page_limit = self.config.page_limit;

        self.team_members_with(&connection.username, repositories, |repo, start| {
            let client = client.clone();
            async move {
                client
                    .get_pull_requests(
                        &repo.project.key,
                        &repo.slug,
                        start,
                        page_limit,
                        PullRequestStatus::All,
                        PullRequestOrder::Newest,
                    )
                    .await
            }
        })
        .await
    }

    /// Like [`Self::team_members`], but with an injectable page fetcher.
    pub async fn team_members_with<F, Fut>(
        &self,
        user_login: &str,
        repositories: &[Repository],
        fetch: F,
    ) -> Result<BTreeMap<User, Density>, AppError>
    where
        F: Fn(Repository, u64) -> Fut,
        Fut: Future<Output = Result<Page<PullRequest>, AppError>>,
    {
        let now_ms = Utc::now().timestamp_millis();

        if let Some(snapshot) = db::team::get_snapshot(&self.pool).await? {
            if !snapshot_expired(&snapshot, now_ms, &self.config) {
                return Ok(snapshot.value);
            }
        }

        let _guard = self.recompute_guard.lock().await;

        // Another trigger may have recomputed while we waited for the guard.
        if let Some(snapshot) = db::team::get_snapshot(&self.pool).await? {
            if !snapshot_expired(&snapshot, now_ms, &self.config) {
                return Ok(snapshot.value);
            }
        }

        let members = self.recompute(user_login, repositories, fetch).await?;
        let snapshot = TimedSnapshot::new(members.clone(), Utc::now().timestamp_millis());
        db::team::put_snapshot(&self.pool, &snapshot).await?;

        Ok(members)
    }

    /// Fetch the bounded PR window for every repository and reduce it into
    /// a team map. Per-repository failures contribute zero pull requests.
    async fn recompute<F, Fut>(
        &self,
        user_login: &str,
        repositories: &[Repository],
        fetch: F,
    ) -> Result<BTreeMap<User, Density>, AppError>
    where
        F: Fn(Repository, u64) -> Fut,
        Fut: Future<Output = Result<Page<PullRequest>, AppError>>,
    {
        let mut window = Vec::new();

        for repo in repositories {
            let fetched = paginator::fetch_pages(
                |start| fetch(repo.clone(), start),
                self.config.pages_per_repository,
            )
            .await;

            match fetched {
                Ok(pull_requests) => window.extend(pull_requests),
                Err(error) => {
                    log::warn!(
                        "membership fetch failed for {}/{}: {}",
                        repo.project.key,
                        repo.slug,
                        error
                    );
                    if let Some(fatal) = route_network_error(
                        error,
                        &self.events,
                        self.connectivity.as_ref(),
                        NOTIFIER,
                    ) {
                        return Err(fatal);
                    }
                }
            }
        }

        Ok(team_membership_of(
            user_login,
            &window,
            self.config.minimum_occurrences,
        ))
    }
}
