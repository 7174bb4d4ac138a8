//! SQLite-backed repositories for one user's store.
//!
//! ## Database setup
//!
//! [`Database`] wraps a `sqlx::SqlitePool` configured with:
//! - **WAL mode** with `synchronous=NORMAL`.
//! - **Foreign keys enabled**. `positions.game_id` is checked at commit time.
//! - **Embedded schema** from `schema/chesslog.sql`, applied on every open.
//!
//! ## Repository types
//!
//! | Type | Tables |
//! |------|--------|
//! | [`SqliteGameRepository`] | `games`, `positions` (batched writer) |
//! | [`SqliteUserRepository`] | `users` |
//! | [`SqliteStatsRepository`] | `games` (read-only aggregates) |
//!
//! The `winner`/`result` columns are round-tripped through [`helpers`].

mod database;
mod game_repo;
mod stats_repo;
mod user_repo;
pub(crate) mod helpers;

pub use database::Database;
pub use game_repo::{SqliteGameRepository, WriteStats};
pub use stats_repo::{OutcomeCount, SqliteStatsRepository};
pub use user_repo::SqliteUserRepository;
