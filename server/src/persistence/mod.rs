//! Ingestion store: one SQLite database per user holding the `games`,
//! `positions` and `users` tables.
//!
//! [`Stores`] owns every open per-user handle. Each [`UserStore`] serializes
//! access to its database through its own async mutex, so a sync writing a
//! batch and a stats query reading the same store never interleave.

pub mod sqlite;
mod store;

pub use store::{Stores, UserStore};

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Commit of batch {batch} failed: {source}")]
    BatchCommit {
        batch: usize,
        #[source]
        source: sqlx::Error,
    },
    #[error("Not found: {0}")]
    NotFound(String),
}
