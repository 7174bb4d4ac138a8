//! The `users` table: which archive a user's store was last synced up to.

use sqlx::SqlitePool;

use crate::archive::ArchiveId;
use crate::persistence::PersistenceError;

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Associate `archive` with the user, replacing any earlier value so the
    /// row tracks the latest successful sync.
    pub async fn record_latest_archive(
        &self,
        user_id: &str,
        username: &str,
        archive: &ArchiveId,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            "INSERT INTO users (id, username, latest_archive) VALUES (?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
                username = excluded.username, \
                latest_archive = excluded.latest_archive",
        )
        .bind(user_id)
        .bind(username)
        .bind(archive.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The archive recorded by the last sync, or `NotFound` if the user has
    /// never completed one.
    pub async fn most_recent_archive(&self, user_id: &str) -> Result<ArchiveId, PersistenceError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT latest_archive FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(archive,)| ArchiveId::from(archive))
            .ok_or_else(|| PersistenceError::NotFound(format!("user {user_id}")))
    }

    pub async fn username(&self, user_id: &str) -> Result<Option<String>, PersistenceError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT username FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(name,)| name))
    }
}
