//! Background refresh orchestration.
//!
//! [`RefreshEngine::start`] spawns one tokio task that owns the whole
//! aggregation pipeline and republishes a [`ReviewersInformation`] snapshot
//! whenever credentials change, the repository selection changes, or a
//! caller asks for a refresh. Results go out through a `watch` channel, so
//! consumers only ever observe the latest snapshot, and pending refresh
//! commands are drained before each pass so bursts of triggers collapse
//! into a single recomputation.

use crate::db::{self, pool::DbPool};
use crate::error::AppError;
use crate::models::{
    PullRequest, PullRequestOrder, PullRequestStatus, Repository, ReviewersInformation,
};
use crate::services::bitbucket_client::PAGE_SIZE;
use crate::services::connection::{route_network_error, BitbucketConnection, Connectivity};
use crate::services::events::{AppEvent, EventBus};
use crate::services::paginator::{self, Page};
use crate::services::reviewers::reviewers_information_from;
use crate::services::team_members::TeamMembersProvider;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Event-bus notifier tag for the refresh pipeline.
const NOTIFIER: &str = "reviewers_information";

const COMMAND_BUFFER: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshCommand {
    Refresh,
    Stop,
}

/// Client-side handle to a running [`RefreshEngine`] task.
///
/// Dropping the handle aborts the task, abandoning any in-flight pass;
/// [`RefreshHandle::stop`] shuts it down after the current pass finishes.
pub struct RefreshHandle {
    commands: mpsc::Sender<RefreshCommand>,
    results: watch::Receiver<ReviewersInformation>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Ask for a refresh pass. Never blocks; a full command queue means a
    /// pass is already pending, which covers this request too.
    pub fn refresh(&self) {
        if self.commands.try_send(RefreshCommand::Refresh).is_err() {
            log::debug!("refresh already pending, coalescing");
        }
    }

    /// Watch the published snapshots; the receiver starts at the latest one.
    pub fn subscribe(&self) -> watch::Receiver<ReviewersInformation> {
        self.results.clone()
    }

    pub fn latest(&self) -> ReviewersInformation {
        self.results.borrow().clone()
    }

    /// Shut the engine down and wait for the task to finish.
    pub async fn stop(mut self) {
        let _ = self.commands.send(RefreshCommand::Stop).await;
        let _ = (&mut self.task).await;
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Owns the aggregation pipeline: connection + selection in, ranked
/// reviewer snapshots out.
pub struct RefreshEngine {
    pool: DbPool,
    events: EventBus,
    connectivity: Arc<dyn Connectivity>,
    team_members: Arc<TeamMembersProvider>,
    connections: watch::Receiver<Option<BitbucketConnection>>,
    selection: watch::Receiver<Vec<Repository>>,
}

impl RefreshEngine {
    pub fn new(
        pool: DbPool,
        events: EventBus,
        connectivity: Arc<dyn Connectivity>,
        team_members: Arc<TeamMembersProvider>,
        connections: watch::Receiver<Option<BitbucketConnection>>,
        selection: watch::Receiver<Vec<Repository>>,
    ) -> Self {
        Self {
            pool,
            events,
            connectivity,
            team_members,
            connections,
            selection,
        }
    }

    /// Spawn the engine task. One pass runs immediately so subscribers get
    /// an initial snapshot without asking.
    pub fn start(self) -> RefreshHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (result_tx, result_rx) = watch::channel(ReviewersInformation::empty());

        let task = tokio::spawn(self.run(command_rx, result_tx));

        RefreshHandle {
            commands: command_tx,
            results: result_rx,
            task,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<RefreshCommand>,
        results: watch::Sender<ReviewersInformation>,
    ) {
        self.pass(&results).await;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(RefreshCommand::Refresh) => {}
                    Some(RefreshCommand::Stop) | None => break,
                },
                changed = self.connections.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = self.selection.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }

            if drain_commands(&mut commands) {
                break;
            }
            self.pass(&results).await;
        }

        log::debug!("refresh engine stopped");
    }

    /// One aggregation pass. Failures end the pass and keep the previous
    /// published snapshot in place.
    async fn pass(&mut self, results: &watch::Sender<ReviewersInformation>) {
        let connection = self.connections.borrow_and_update().clone();
        let repositories = self.selection.borrow_and_update().clone();

        let Some(connection) = connection else {
            results.send_replace(ReviewersInformation::empty());
            return;
        };

        if repositories.is_empty() {
            self.events.post(AppEvent::RepositoriesMissing {
                notifier: NOTIFIER.to_string(),
            });
            results.send_replace(ReviewersInformation::empty());
            return;
        }

        let client = connection.client.clone();
        let outcome = self
            .aggregate_with(&connection, &repositories, |repo, start| {
                let client = client.clone();
                async move {
                    client
                        .get_pull_requests(
                            &repo.project.key,
                            &repo.slug,
                            start,
                            PAGE_SIZE,
                            PullRequestStatus::Open,
                            PullRequestOrder::Newest,
                        )
                        .await
                }
            })
            .await;

        match outcome {
            Ok(information) => {
                results.send_replace(information);
            }
            Err(error) => {
                log::error!("refresh pass failed: {}", error);
            }
        }
    }

    /// Fetch all open PRs, resolve the team and aggregate, with an
    /// injectable open-PR page fetcher.
    async fn aggregate_with<F, Fut>(
        &self,
        connection: &BitbucketConnection,
        repositories: &[Repository],
        fetch_open: F,
    ) -> Result<ReviewersInformation, AppError>
    where
        F: Fn(Repository, u64) -> Fut,
        Fut: Future<Output = Result<Page<PullRequest>, AppError>>,
    {
        let mut open_pull_requests = Vec::new();

        for repo in repositories {
            let fetched =
                paginator::fetch_all_pages(|start| fetch_open(repo.clone(), start)).await;

            match fetched {
                Ok(pull_requests) => open_pull_requests.extend(pull_requests),
                Err(error) => {
                    log::warn!(
                        "open PR fetch failed for {}/{}: {}",
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

        let team = self
            .team_members
            .team_members(connection, repositories)
            .await?;

        let information = reviewers_information_from(
            &team,
            &open_pull_requests,
            &connection.server_url,
            Utc::now(),
            self.team_members.config(),
        );

        db::pull_requests::replace_all(&self.pool, &open_pull_requests).await?;

        Ok(information)
    }
}

fn drain_commands(commands: &mut mpsc::Receiver<RefreshCommand>) -> bool {
    loop {
        match commands.try_recv() {
            Ok(RefreshCommand::Refresh) => {}
            Ok(RefreshCommand::Stop) => return true,
            Err(mpsc::error::TryRecvError::Empty) => return false,
            Err(mpsc::error::TryRecvError::Disconnected) => return true,
        }
    }
}
