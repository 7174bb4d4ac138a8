//! Bounded concurrent archive fetches.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::archive::{ArchiveError, ArchiveId, ArchiveSource, RawGame};

/// Result of fetching a set of archives. Both lists keep the request order.
#[derive(Debug, Default)]
pub struct Fetched {
    pub archives: Vec<(ArchiveId, Vec<RawGame>)>,
    pub failed: Vec<ArchiveId>,
}

impl Fetched {
    pub fn game_count(&self) -> usize {
        self.archives.iter().map(|(_, games)| games.len()).sum()
    }
}

/// Fetch every archive on its own task, at most `limit` at a time, each
/// bounded by `timeout`. A failed, timed-out or panicked fetch only removes
/// that archive from the result.
pub async fn fetch_all(
    source: Arc<dyn ArchiveSource>,
    archives: &[ArchiveId],
    limit: usize,
    timeout: Duration,
) -> Fetched {
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut set = JoinSet::new();

    for (index, archive) in archives.iter().cloned().enumerate() {
        let source = source.clone();
        let semaphore = semaphore.clone();
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let result = match tokio::time::timeout(timeout, source.fetch_archive(&archive)).await {
                Ok(result) => result,
                Err(_) => Err(ArchiveError::Timeout(timeout)),
            };
            (index, archive, result)
        });
    }

    let mut slots: Vec<Option<Vec<RawGame>>> = vec![None; archives.len()];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, archive, Ok(games))) => {
                tracing::debug!(archive = %archive, games = games.len(), "Fetched archive");
                slots[index] = Some(games);
            }
            Ok((_, archive, Err(e))) => {
                tracing::warn!(archive = %archive, error = %e, "Archive fetch failed");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Archive fetch task did not complete");
            }
        }
    }

    let mut fetched = Fetched::default();
    for (archive, slot) in archives.iter().zip(slots) {
        match slot {
            Some(games) => fetched.archives.push((archive.clone(), games)),
            None => fetched.failed.push(archive.clone()),
        }
    }
    fetched
}
