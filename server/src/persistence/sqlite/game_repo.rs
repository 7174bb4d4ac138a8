//! Batched, idempotent writer for the `games` and `positions` tables.

use sqlx::{Sqlite, SqlitePool, Transaction};

use super::helpers::{encode_outcome, position_id};
use crate::normalize::NormalizedGame;
use crate::persistence::PersistenceError;

/// Row counts from one write pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteStats {
    pub games_inserted: usize,
    pub games_existing: usize,
    pub games_failed: usize,
    pub positions_inserted: usize,
    pub positions_existing: usize,
    pub positions_failed: usize,
    pub batches_committed: usize,
}

pub struct SqliteGameRepository {
    pool: SqlitePool,
}

impl SqliteGameRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert-or-ignore `games` and their positions, committing every
    /// `batch_size` games.
    ///
    /// The position index is dropped for the duration of the pass and rebuilt
    /// once at the end, including when a commit fails. A failed commit stops
    /// the pass; batches committed before it stay in place.
    pub async fn write_games(
        &self,
        games: &[NormalizedGame],
        batch_size: usize,
    ) -> Result<WriteStats, PersistenceError> {
        self.drop_position_index().await?;
        let written = self.write_batches(games, batch_size.max(1)).await;
        let indexed = self.create_position_index().await;
        let stats = written?;
        indexed?;
        Ok(stats)
    }

    async fn write_batches(
        &self,
        games: &[NormalizedGame],
        batch_size: usize,
    ) -> Result<WriteStats, PersistenceError> {
        let mut stats = WriteStats::default();
        let mut batch = 1;
        let mut tx = self.pool.begin().await?;

        for (i, game) in games.iter().enumerate() {
            match insert_game(&mut tx, game).await {
                Ok(0) => stats.games_existing += 1,
                Ok(_) => stats.games_inserted += 1,
                Err(e) => {
                    tracing::warn!(game_id = %game.id, error = %e, "Failed to insert game");
                    stats.games_failed += 1;
                    continue;
                }
            }

            for fen in &game.positions {
                match insert_position(&mut tx, fen, &game.id).await {
                    Ok(0) => stats.positions_existing += 1,
                    Ok(_) => stats.positions_inserted += 1,
                    Err(e) => {
                        tracing::debug!(game_id = %game.id, error = %e, "Failed to insert position");
                        stats.positions_failed += 1;
                    }
                }
            }

            if (i + 1) % batch_size == 0 {
                tx.commit()
                    .await
                    .map_err(|source| PersistenceError::BatchCommit { batch, source })?;
                tracing::debug!(batch, games = i + 1, "Committed batch");
                stats.batches_committed += 1;
                batch += 1;
                tx = self.pool.begin().await?;
            }
        }

        if games.len() % batch_size != 0 {
            tx.commit()
                .await
                .map_err(|source| PersistenceError::BatchCommit { batch, source })?;
            tracing::debug!(batch, games = games.len(), "Committed final batch");
            stats.batches_committed += 1;
        } else {
            tx.rollback().await?;
        }

        Ok(stats)
    }

    async fn drop_position_index(&self) -> Result<(), PersistenceError> {
        sqlx::query("DROP INDEX IF EXISTS positions_fen_idx")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_position_index(&self) -> Result<(), PersistenceError> {
        sqlx::query("CREATE INDEX IF NOT EXISTS positions_fen_idx ON positions(fen)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[cfg(test)]
    pub async fn count_games(&self) -> Result<i64, PersistenceError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM games")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    #[cfg(test)]
    pub async fn count_positions(&self) -> Result<i64, PersistenceError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM positions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Ids of the games containing the canonical position `fen`.
    #[cfg(test)]
    pub async fn games_with_position(&self, fen: &str) -> Result<Vec<String>, PersistenceError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT game_id FROM positions WHERE fen = ? ORDER BY game_id")
                .bind(fen)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

async fn insert_game(
    tx: &mut Transaction<'_, Sqlite>,
    game: &NormalizedGame,
) -> Result<u64, sqlx::Error> {
    let (winner, result) = encode_outcome(game);
    let done = sqlx::query(
        "INSERT OR IGNORE INTO games \
         (id, url, time_class, time_control, white_player, black_player, \
          white_rating, black_rating, winner, result) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&game.id)
    .bind(&game.url)
    .bind(&game.time_class)
    .bind(&game.time_control)
    .bind(&game.white_player)
    .bind(&game.black_player)
    .bind(game.white_rating)
    .bind(game.black_rating)
    .bind(winner)
    .bind(result)
    .execute(&mut **tx)
    .await?;
    Ok(done.rows_affected())
}

async fn insert_position(
    tx: &mut Transaction<'_, Sqlite>,
    fen: &str,
    game_id: &str,
) -> Result<u64, sqlx::Error> {
    let done = sqlx::query("INSERT OR IGNORE INTO positions (id, fen, game_id) VALUES (?, ?, ?)")
        .bind(position_id(fen, game_id))
        .bind(fen)
        .bind(game_id)
        .execute(&mut **tx)
        .await?;
    Ok(done.rows_affected())
}
