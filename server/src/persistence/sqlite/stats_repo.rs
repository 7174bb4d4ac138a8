//! Read-only aggregate queries over ingested games.

use sqlx::SqlitePool;

use super::helpers::decode_outcome;
use crate::normalize::Outcome;
use crate::persistence::PersistenceError;

/// Number of games in one time class sharing the same players and outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeCount {
    pub time_class: String,
    pub white_player: String,
    pub black_player: String,
    pub outcome: Outcome,
    pub count: i64,
}

pub struct SqliteStatsRepository {
    pool: SqlitePool,
}

impl SqliteStatsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn outcome_counts(&self) -> Result<Vec<OutcomeCount>, PersistenceError> {
        let rows: Vec<(String, String, String, Option<String>, String, i64)> = sqlx::query_as(
            "SELECT time_class, white_player, black_player, winner, result, COUNT(*) \
             FROM games \
             GROUP BY time_class, white_player, black_player, winner, result \
             ORDER BY time_class",
        )
        .fetch_all(&self.pool)
        .await?;

        let counts = rows
            .into_iter()
            .map(
                |(time_class, white_player, black_player, winner, result, count)| {
                    let outcome =
                        decode_outcome(&white_player, &black_player, winner.as_deref(), result);
                    OutcomeCount {
                        time_class,
                        white_player,
                        black_player,
                        outcome,
                        count,
                    }
                },
            )
            .collect();

        Ok(counts)
    }
}
