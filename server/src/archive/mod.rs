//! Archive source adapter: lists a player's monthly archives and fetches the
//! raw game records inside one archive. Pure I/O, no retries.

mod client;
#[cfg(test)]
pub(crate) mod mock;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

pub use client::ChessComArchiveClient;

/// Opaque archive identifier (the archive URL). Its trailing path segments
/// encode the calendar month, e.g. `.../games/2024/05`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchiveId(String);

/// A calendar month encoded as `YYYYMM`, comparable as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchivePeriod(u32);

impl ArchiveId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the trailing `YYYY/MM` of the identifier.
    pub fn period(&self) -> Result<ArchivePeriod, ArchiveError> {
        let invalid = || ArchiveError::InvalidArchiveId(self.0.clone());

        let mut segments = self.0.trim_end_matches('/').rsplit('/');
        let month = segments.next().ok_or_else(invalid)?;
        let year = segments.next().ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        if !year.bytes().chain(month.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let year: u32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        Ok(ArchivePeriod(year * 100 + month))
    }
}

impl fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ArchiveId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl ArchivePeriod {
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ArchivePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.value();
        write!(f, "{:04}/{:02}", value / 100, value % 100)
    }
}

/// One game record as served by the archive API. Older archives omit some
/// fields, so every field falls back to its default.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawGame {
    pub uuid: String,
    pub url: String,
    pub pgn: String,
    pub time_control: String,
    pub time_class: String,
    pub end_time: i64,
    pub rated: bool,
    pub rules: String,
    pub white: RawPlayer,
    pub black: RawPlayer,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawPlayer {
    pub username: String,
    pub rating: i64,
    /// Per-player result tag: `win`, `resigned`, `stalemate`, ...
    pub result: String,
}

/// Read access to a player's game archives.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Archive identifiers for `username`, oldest first.
    async fn list_archives(&self, username: &str) -> Result<Vec<ArchiveId>, ArchiveError>;

    /// Raw game records stored in one archive.
    async fn fetch_archive(&self, archive: &ArchiveId) -> Result<Vec<RawGame>, ArchiveError>;
}

/// The archive source could not be reached or returned something unusable.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("archive id has no YYYY/MM period: {0}")]
    InvalidArchiveId(String),
    #[error("invalid archive base url {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("username cannot be used as a path segment: {0:?}")]
    InvalidUsername(String),
}
