//! In-memory archive source for tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{ArchiveError, ArchiveId, ArchiveSource, RawGame};

pub struct MockArchiveSource {
    listings: Mutex<HashMap<String, Vec<ArchiveId>>>,
    pages: Mutex<HashMap<ArchiveId, Vec<RawGame>>>,
    failing: Mutex<HashSet<ArchiveId>>,
    fetch_log: Mutex<Vec<ArchiveId>>,
    gate: Mutex<Option<Arc<Notify>>>,
    list_calls: AtomicUsize,
    listing_down: AtomicBool,
}

impl Default for MockArchiveSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockArchiveSource {
    pub fn new() -> Self {
        Self {
            listings: Mutex::new(HashMap::new()),
            pages: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            fetch_log: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
            list_calls: AtomicUsize::new(0),
            listing_down: AtomicBool::new(false),
        }
    }

    /// Append an archive (with its games) to `username`'s listing.
    pub fn add_archive(&self, username: &str, archive: &str, games: Vec<RawGame>) -> ArchiveId {
        let id = ArchiveId::new(archive);
        self.listings
            .lock()
            .unwrap()
            .entry(username.to_lowercase())
            .or_default()
            .push(id.clone());
        self.pages.lock().unwrap().insert(id.clone(), games);
        id
    }

    /// Make every fetch of `archive` fail.
    pub fn fail_archive(&self, archive: &ArchiveId) {
        self.failing.lock().unwrap().insert(archive.clone());
    }

    pub fn heal_archive(&self, archive: &ArchiveId) {
        self.failing.lock().unwrap().remove(archive);
    }

    /// Make every `list_archives` call fail.
    pub fn fail_listing(&self) {
        self.listing_down.store(true, Ordering::SeqCst);
    }

    /// Hold every `list_archives` call until the returned handle is notified.
    pub fn gate(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(notify.clone());
        notify
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Archives fetched so far, in call order.
    pub fn fetched(&self) -> Vec<ArchiveId> {
        self.fetch_log.lock().unwrap().clone()
    }

    pub fn clear_fetch_log(&self) {
        self.fetch_log.lock().unwrap().clear();
    }
}

#[async_trait]
impl ArchiveSource for MockArchiveSource {
    async fn list_archives(&self, username: &str) -> Result<Vec<ArchiveId>, ArchiveError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.listing_down.load(Ordering::SeqCst) {
            return Err(ArchiveError::HttpStatus {
                status: 503,
                url: format!("{username}/games/archives"),
            });
        }
        Ok(self
            .listings
            .lock()
            .unwrap()
            .get(&username.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_archive(&self, archive: &ArchiveId) -> Result<Vec<RawGame>, ArchiveError> {
        self.fetch_log.lock().unwrap().push(archive.clone());
        if self.failing.lock().unwrap().contains(archive) {
            return Err(ArchiveError::HttpStatus {
                status: 503,
                url: archive.to_string(),
            });
        }
        self.pages
            .lock()
            .unwrap()
            .get(archive)
            .cloned()
            .ok_or_else(|| ArchiveError::HttpStatus {
                status: 404,
                url: archive.to_string(),
            })
    }
}
