//! Synchronization orchestrator.
//!
//! A request is planned against the user's job status and whether a store
//! exists, the status is flipped with a compare-and-set, and the actual work
//! runs on a background task:
//!
//! - **Full path**: open/create the store, list archives, fetch all of them,
//!   normalize, write.
//! - **Incremental path**: list archives, re-fetch everything from the stored
//!   latest archive onwards (inclusive), normalize, write.
//!
//! Both end in `Pending` on success and `Failed` otherwise. Committed batches
//! are never rolled back.

mod fetch;

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::archive::{ArchiveError, ArchiveId, ArchivePeriod, ArchiveSource};
use crate::config::SyncConfig;
use crate::identity::resolve;
use crate::normalize::normalize_all;
use crate::persistence::sqlite::WriteStats;
use crate::persistence::{PersistenceError, Stores, UserStore};
use crate::registry::{JobRegistry, JobStatus};

pub use fetch::{fetch_all, Fetched};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Full,
    Incremental,
}

/// What a sync request should do, given the current job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// A full sync is running; refuse.
    Reject,
    /// Work is already in flight; report the status, start nothing.
    Report(JobStatus),
    /// Store exists but no status is known (e.g. after a restart): mark the
    /// user `Pending`, then plan again.
    Recover,
    /// Move to `next` and run `mode` in the background.
    Run { mode: SyncMode, next: JobStatus },
}

/// Decide how to handle a sync request.
pub fn plan(current: Option<JobStatus>, store_exists: bool) -> Plan {
    match (current, store_exists) {
        (Some(JobStatus::Started), _) => Plan::Reject,
        (Some(JobStatus::Updating), _) => Plan::Report(JobStatus::Updating),
        (Some(JobStatus::Pending | JobStatus::Complete), _) | (Some(JobStatus::Failed), true) => {
            Plan::Run {
                mode: SyncMode::Incremental,
                next: JobStatus::Updating,
            }
        }
        (None, true) => Plan::Recover,
        (Some(JobStatus::Failed) | None, false) => Plan::Run {
            mode: SyncMode::Full,
            next: JobStatus::Started,
        },
    }
}

/// Reply to a sync request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResponse {
    pub id: String,
    pub status: JobStatus,
}

/// An accepted sync request and, if work was started, its background task.
#[derive(Debug)]
pub struct SyncHandle {
    pub response: SyncResponse,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    pub fn started_work(&self) -> bool {
        self.task.is_some()
    }

    /// Wait for the background task, if any, to finish.
    pub async fn wait(self) -> SyncResponse {
        if let Some(task) = self.task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Sync task did not complete");
            }
        }
        self.response
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("username must not be empty")]
    InvalidUsername,
    #[error("setup already in progress for {id}")]
    InProgress { id: String },
    #[error("archive source unavailable: {0}")]
    Source(#[from] ArchiveError),
    #[error("all {failed} selected archives failed to fetch")]
    AllArchivesFailed { failed: usize },
    #[error("store error: {0}")]
    Store(#[from] PersistenceError),
    #[error("normalization worker failed: {0}")]
    Normalization(#[from] tokio::task::JoinError),
}

/// Counters for one finished sync run.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub archives_listed: usize,
    pub archives_selected: usize,
    pub archives_failed: usize,
    pub games_fetched: usize,
    pub skipped_variant: usize,
    pub skipped_missing_id: usize,
    pub failed_moves: usize,
    pub unreadable_pgn: usize,
    pub write: WriteStats,
    pub latest_archive: Option<ArchiveId>,
}

impl SyncReport {
    fn log(&self, user_id: &str, mode: SyncMode) {
        tracing::info!(
            user_id,
            ?mode,
            archives_listed = self.archives_listed,
            archives_selected = self.archives_selected,
            archives_failed = self.archives_failed,
            games_fetched = self.games_fetched,
            skipped_variant = self.skipped_variant,
            skipped_missing_id = self.skipped_missing_id,
            failed_moves = self.failed_moves,
            unreadable_pgn = self.unreadable_pgn,
            games_inserted = self.write.games_inserted,
            games_existing = self.write.games_existing,
            games_failed = self.write.games_failed,
            positions_inserted = self.write.positions_inserted,
            positions_existing = self.write.positions_existing,
            positions_failed = self.write.positions_failed,
            batches = self.write.batches_committed,
            latest_archive = ?self.latest_archive.as_ref().map(ArchiveId::as_str),
            "Sync finished"
        );
    }
}

/// Owns the collaborators a sync needs and hands out background runs.
pub struct SyncService {
    source: Arc<dyn ArchiveSource>,
    stores: Arc<Stores>,
    registry: Arc<JobRegistry>,
    config: SyncConfig,
}

impl SyncService {
    pub fn new(
        source: Arc<dyn ArchiveSource>,
        stores: Arc<Stores>,
        registry: Arc<JobRegistry>,
        config: SyncConfig,
    ) -> Self {
        Self {
            source,
            stores,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn stores(&self) -> &Arc<Stores> {
        &self.stores
    }

    /// Accept or refuse a sync for `username`. An accepted request returns at
    /// once with the new status; the work itself runs on a spawned task.
    pub async fn request_sync(self: &Arc<Self>, username: &str) -> Result<SyncHandle, SyncError> {
        let (username, id) = resolve(username).ok_or(SyncError::InvalidUsername)?;
        let store_exists = self.stores.exists(&id).await;

        loop {
            let current = self.registry.get(&id).await;
            match plan(current, store_exists) {
                Plan::Reject => {
                    tracing::info!(user_id = %id, "Sync refused, full sync in progress");
                    return Err(SyncError::InProgress { id });
                }
                Plan::Report(status) => {
                    return Ok(SyncHandle {
                        response: SyncResponse { id, status },
                        task: None,
                    });
                }
                Plan::Recover => {
                    if self
                        .registry
                        .compare_and_set(&id, None, JobStatus::Pending)
                        .await
                    {
                        tracing::info!(user_id = %id, "Recovered existing store as Pending");
                    }
                }
                Plan::Run { mode, next } => {
                    if !self.registry.compare_and_set(&id, current, next).await {
                        continue;
                    }
                    tracing::info!(user_id = %id, ?mode, status = %next, "Sync accepted");
                    let task = self.spawn_run(id.clone(), username, mode);
                    return Ok(SyncHandle {
                        response: SyncResponse { id, status: next },
                        task: Some(task),
                    });
                }
            }
        }
    }

    /// Run one sync in the background and post its terminal status. The run
    /// itself sits in an inner task; a panic there ends in `Failed` like any
    /// other error.
    fn spawn_run(self: &Arc<Self>, id: String, username: String, mode: SyncMode) -> JoinHandle<()> {
        let service = self.clone();
        let span = tracing::info_span!("sync", user_id = %id, ?mode);
        tokio::spawn(
            async move {
                let run = {
                    let service = service.clone();
                    let id = id.clone();
                    tokio::spawn(
                        async move {
                            match mode {
                                SyncMode::Full => service.full_sync(&id, &username).await,
                                SyncMode::Incremental => {
                                    service.incremental_sync(&id, &username).await
                                }
                            }
                        }
                        .in_current_span(),
                    )
                };
                match run.await {
                    Ok(Ok(report)) => {
                        report.log(&id, mode);
                        service.registry.set(&id, JobStatus::Pending).await;
                    }
                    Ok(Err(e)) => {
                        tracing::error!(user_id = %id, ?mode, error = %e, "Sync failed");
                        service.registry.set(&id, JobStatus::Failed).await;
                    }
                    Err(e) => {
                        tracing::error!(user_id = %id, ?mode, error = %e, "Sync task aborted");
                        service.registry.set(&id, JobStatus::Failed).await;
                    }
                }
            }
            .instrument(span),
        )
    }

    async fn full_sync(&self, id: &str, username: &str) -> Result<SyncReport, SyncError> {
        let store = self.stores.open_or_create(id).await?;
        let archives = self.source.list_archives(username).await?;
        let listed = archives.len();
        let mut report = self.ingest(&store, username, archives).await?;
        report.archives_listed = listed;
        Ok(report)
    }

    async fn incremental_sync(&self, id: &str, username: &str) -> Result<SyncReport, SyncError> {
        let store = self.stores.handle(id).await?;
        let archives = self.source.list_archives(username).await?;
        let listed = archives.len();

        let selected = match store.most_recent_archive().await {
            Ok(stored) => select_since(&archives, &stored)?,
            Err(PersistenceError::NotFound(_)) => {
                tracing::warn!(user_id = id, "No archive recorded yet, fetching all");
                archives
            }
            Err(e) => return Err(e.into()),
        };

        let mut report = self.ingest(&store, username, selected).await?;
        report.archives_listed = listed;
        Ok(report)
    }

    /// Fetch, normalize and write `selected`, then record the archive the
    /// next incremental pass should start from.
    async fn ingest(
        &self,
        store: &UserStore,
        username: &str,
        selected: Vec<ArchiveId>,
    ) -> Result<SyncReport, SyncError> {
        let periods = selected
            .iter()
            .map(|a| a.period().map(|p| (a.clone(), p)))
            .collect::<Result<Vec<_>, _>>()?;

        let fetched = fetch_all(
            self.source.clone(),
            &selected,
            self.config.max_concurrent_fetches,
            self.config.fetch_timeout,
        )
        .await;
        if !selected.is_empty() && fetched.archives.is_empty() {
            return Err(SyncError::AllArchivesFailed {
                failed: fetched.failed.len(),
            });
        }

        let latest = latest_to_record(&periods, &fetched.failed);
        let games_fetched = fetched.game_count();
        let raws: Vec<_> = fetched
            .archives
            .into_iter()
            .flat_map(|(_, games)| games)
            .collect();
        let batch = tokio::task::spawn_blocking(move || normalize_all(&raws)).await?;

        let write = store
            .ingest(
                username,
                &batch.games,
                self.config.insert_batch_size,
                latest.as_ref(),
            )
            .await?;

        Ok(SyncReport {
            archives_listed: 0,
            archives_selected: selected.len(),
            archives_failed: fetched.failed.len(),
            games_fetched,
            skipped_variant: batch.skipped_variant,
            skipped_missing_id: batch.skipped_missing_id,
            failed_moves: batch.failed_moves,
            unreadable_pgn: batch.unreadable_pgn,
            write,
            latest_archive: latest,
        })
    }
}

/// Archives whose period is at or after the stored archive's period.
pub fn select_since(
    archives: &[ArchiveId],
    stored: &ArchiveId,
) -> Result<Vec<ArchiveId>, ArchiveError> {
    let since = stored.period()?;
    let mut selected = Vec::new();
    for archive in archives {
        if archive.period()? >= since {
            selected.push(archive.clone());
        }
    }
    Ok(selected)
}

/// The earliest failed archive if any failed, so the next pass retries it;
/// otherwise the newest archive.
fn latest_to_record(
    periods: &[(ArchiveId, ArchivePeriod)],
    failed: &[ArchiveId],
) -> Option<ArchiveId> {
    let earliest_failed = periods
        .iter()
        .filter(|(id, _)| failed.contains(id))
        .min_by_key(|(_, p)| *p);
    earliest_failed
        .or_else(|| periods.iter().max_by_key(|(_, p)| *p))
        .map(|(id, _)| id.clone())
}

#[cfg(test)]
mod tests;
