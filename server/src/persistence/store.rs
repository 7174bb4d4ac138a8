use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::sqlite::{
    Database, OutcomeCount, SqliteGameRepository, SqliteStatsRepository, SqliteUserRepository,
    WriteStats,
};
use super::PersistenceError;
use crate::archive::ArchiveId;
use crate::identity::is_user_id;
use crate::normalize::NormalizedGame;

const STORE_EXTENSION: &str = "db";

/// One user's store. Every operation holds the store's lock for its whole
/// duration, so writes and reads against the same user are serialized.
pub struct UserStore {
    user_id: String,
    path: PathBuf,
    db: Mutex<Database>,
}

impl UserStore {
    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub async fn most_recent_archive(&self) -> Result<ArchiveId, PersistenceError> {
        let db = self.db.lock().await;
        SqliteUserRepository::new(db.pool().clone())
            .most_recent_archive(&self.user_id)
            .await
    }

    /// Run one write pass: ensure the schema, write `games` in batches and,
    /// if every batch committed, record `latest` as the user's newest archive.
    pub async fn ingest(
        &self,
        username: &str,
        games: &[NormalizedGame],
        batch_size: usize,
        latest: Option<&ArchiveId>,
    ) -> Result<WriteStats, PersistenceError> {
        let db = self.db.lock().await;
        db.ensure_schema().await?;
        tracing::debug!(
            user_id = %self.user_id,
            path = %self.path.display(),
            games = games.len(),
            "Writing games"
        );

        let stats = SqliteGameRepository::new(db.pool().clone())
            .write_games(games, batch_size)
            .await?;

        if let Some(archive) = latest {
            SqliteUserRepository::new(db.pool().clone())
                .record_latest_archive(&self.user_id, username, archive)
                .await?;
        }
        Ok(stats)
    }

    pub async fn outcome_counts(&self) -> Result<Vec<OutcomeCount>, PersistenceError> {
        let db = self.db.lock().await;
        SqliteStatsRepository::new(db.pool().clone())
            .outcome_counts()
            .await
    }

    pub async fn username(&self) -> Result<Option<String>, PersistenceError> {
        let db = self.db.lock().await;
        SqliteUserRepository::new(db.pool().clone())
            .username(&self.user_id)
            .await
    }

    #[cfg(test)]
    pub async fn count_rows(&self) -> Result<(i64, i64), PersistenceError> {
        let db = self.db.lock().await;
        let repo = SqliteGameRepository::new(db.pool().clone());
        Ok((repo.count_games().await?, repo.count_positions().await?))
    }

    #[cfg(test)]
    pub async fn pool(&self) -> sqlx::SqlitePool {
        self.db.lock().await.pool().clone()
    }

    async fn close(&self) {
        self.db.lock().await.close().await;
    }
}

/// Owner of every per-user store under one data directory.
pub struct Stores {
    data_dir: PathBuf,
    handles: RwLock<HashMap<String, Arc<UserStore>>>,
}

impl Stores {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            handles: RwLock::new(HashMap::new()),
        }
    }

    fn path_for(&self, user_id: &str) -> PathBuf {
        self.data_dir
            .join(user_id)
            .with_extension(STORE_EXTENSION)
    }

    /// Whether durable storage exists for `user_id`, loaded or not.
    pub async fn exists(&self, user_id: &str) -> bool {
        if self.handles.read().await.contains_key(user_id) {
            return true;
        }
        tokio::fs::try_exists(self.path_for(user_id))
            .await
            .unwrap_or(false)
    }

    /// Handle for an existing store, opening it from disk if it is not loaded
    /// yet.
    pub async fn handle(&self, user_id: &str) -> Result<Arc<UserStore>, PersistenceError> {
        if let Some(store) = self.handles.read().await.get(user_id) {
            return Ok(store.clone());
        }

        let path = self.path_for(user_id);
        let db = Database::open_existing(&path).await?;
        Ok(self.install(user_id, path, db).await)
    }

    /// Handle for `user_id`'s store, creating the database file if needed.
    pub async fn open_or_create(&self, user_id: &str) -> Result<Arc<UserStore>, PersistenceError> {
        if let Some(store) = self.handles.read().await.get(user_id) {
            return Ok(store.clone());
        }

        let path = self.path_for(user_id);
        let db = Database::open(&path).await?;
        tracing::info!(user_id, path = %path.display(), "Opened user store");
        Ok(self.install(user_id, path, db).await)
    }

    /// Register a freshly opened database. The map lock is only taken here,
    /// after the open; if another task registered the same user in the
    /// meantime its handle wins and `db` is closed.
    async fn install(&self, user_id: &str, path: PathBuf, db: Database) -> Arc<UserStore> {
        let mut handles = self.handles.write().await;
        if let Some(existing) = handles.get(user_id).cloned() {
            drop(handles);
            tracing::debug!(user_id, "Store opened concurrently, keeping first handle");
            db.close().await;
            return existing;
        }

        let store = Arc::new(UserStore {
            user_id: user_id.to_string(),
            path,
            db: Mutex::new(db),
        });
        handles.insert(user_id.to_string(), store.clone());
        store
    }

    /// Load every store file found in the data directory and return the ids
    /// that were loaded. Files whose name is not a user id are ignored.
    pub async fn discover(&self) -> Result<Vec<String>, PersistenceError> {
        tokio::fs::create_dir_all(&self.data_dir).await?;

        let mut found = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.data_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(STORE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if is_user_id(stem) {
                found.push(stem.to_string());
            }
        }
        found.sort();

        let mut loaded = Vec::with_capacity(found.len());
        for user_id in found {
            match self.handle(&user_id).await {
                Ok(store) => {
                    let username = store.username().await.ok().flatten();
                    tracing::debug!(user_id, ?username, "Recovered user store");
                    loaded.push(user_id);
                }
                Err(e) => tracing::warn!(user_id, error = %e, "Skipping unreadable store"),
            }
        }
        Ok(loaded)
    }

    pub async fn close_all(&self) {
        let handles: Vec<_> = self.handles.write().await.drain().map(|(_, s)| s).collect();
        for store in handles {
            store.close().await;
        }
    }
}
