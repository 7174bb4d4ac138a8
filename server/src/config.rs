//! Configuration for the chesslog server.
//!
//! Every tunable has a compile-time default and can be overridden at runtime
//! through a dedicated `CHESSLOG_*` environment variable. Command-line flags
//! parsed in `main` take precedence over both.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CONFIG_DIR: &str = ".config/chesslog/data";
const DEV_DATA_DIR: &str = "./data";

/// Default HTTP listen address.
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8090";

/// Root of the public archive API.
const DEFAULT_ARCHIVE_BASE_URL: &str = "https://api.chess.com/pub";

/// Per-archive fetch timeout (in seconds).
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 5;

/// Upper bound on archive fetches in flight for one sync.
const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// Games written per transaction.
const DEFAULT_INSERT_BATCH_SIZE: usize = 5000;

/// Get the data directory holding the per-user stores.
///
/// Priority:
/// 1. `CHESSLOG_DATA_DIR` env variable if set
/// 2. `$HOME/.config/chesslog/data` if HOME is set
/// 3. `./data` as fallback
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CHESSLOG_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(DEFAULT_CONFIG_DIR);
    }

    PathBuf::from(DEV_DATA_DIR)
}

/// Get the HTTP listen address.
///
/// Falls back to `127.0.0.1:8090` when `CHESSLOG_BIND_ADDR` is unset or
/// not a valid socket address.
pub fn get_bind_addr() -> SocketAddr {
    let default = || {
        DEFAULT_BIND_ADDR
            .parse()
            .unwrap_or(SocketAddr::from(([127, 0, 0, 1], 8090)))
    };
    match std::env::var("CHESSLOG_BIND_ADDR") {
        Ok(addr) => addr.parse().unwrap_or_else(|_| default()),
        Err(_) => default(),
    }
}

pub fn get_archive_base_url() -> String {
    std::env::var("CHESSLOG_ARCHIVE_BASE_URL")
        .unwrap_or_else(|_| DEFAULT_ARCHIVE_BASE_URL.to_string())
}

/// Get the per-archive fetch timeout in seconds (falls back to the default if
/// the value cannot be parsed as a `u64`).
pub fn get_fetch_timeout_secs() -> u64 {
    if let Ok(timeout) = std::env::var("CHESSLOG_FETCH_TIMEOUT_SECS") {
        return timeout.parse().unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);
    }

    DEFAULT_FETCH_TIMEOUT_SECS
}

pub fn get_max_concurrent_fetches() -> usize {
    if let Ok(max) = std::env::var("CHESSLOG_MAX_CONCURRENT_FETCHES") {
        return max
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_CONCURRENT_FETCHES);
    }

    DEFAULT_MAX_CONCURRENT_FETCHES
}

pub fn get_insert_batch_size() -> usize {
    if let Ok(size) = std::env::var("CHESSLOG_INSERT_BATCH_SIZE") {
        return size
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_INSERT_BATCH_SIZE);
    }

    DEFAULT_INSERT_BATCH_SIZE
}

/// Directory for daily-rolling log files. File logging is off when unset.
pub fn get_log_dir() -> Option<PathBuf> {
    std::env::var("CHESSLOG_LOG_DIR").ok().map(PathBuf::from)
}

/// Tunables for one synchronization run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub fetch_timeout: Duration,
    pub max_concurrent_fetches: usize,
    pub insert_batch_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            insert_batch_size: DEFAULT_INSERT_BATCH_SIZE,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(get_fetch_timeout_secs()),
            max_concurrent_fetches: get_max_concurrent_fetches(),
            insert_batch_size: get_insert_batch_size(),
        }
    }
}

/// Everything the server binary needs at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub archive_base_url: String,
    pub log_dir: Option<PathBuf>,
    pub sync: SyncConfig,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            data_dir: get_data_dir(),
            bind_addr: get_bind_addr(),
            archive_base_url: get_archive_base_url(),
            log_dir: get_log_dir(),
            sync: SyncConfig::from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_data_dir_fallback() {
        let dir = get_data_dir();
        match std::env::var("CHESSLOG_DATA_DIR") {
            Ok(val) => assert_eq!(dir, PathBuf::from(val)),
            Err(_) => assert!(!dir.as_os_str().is_empty()),
        }
    }

    #[test]
    fn test_get_bind_addr() {
        let addr = get_bind_addr();
        if std::env::var("CHESSLOG_BIND_ADDR").is_err() {
            assert_eq!(addr, SocketAddr::from(([127, 0, 0, 1], 8090)));
        }
    }

    #[test]
    fn test_get_archive_base_url() {
        let url = get_archive_base_url();
        match std::env::var("CHESSLOG_ARCHIVE_BASE_URL") {
            Ok(val) => assert_eq!(url, val),
            Err(_) => assert_eq!(url, DEFAULT_ARCHIVE_BASE_URL),
        }
    }

    #[test]
    fn test_sync_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.fetch_timeout, Duration::from_secs(5));
        assert_eq!(config.max_concurrent_fetches, 8);
        assert_eq!(config.insert_batch_size, 5000);
    }

    #[test]
    fn test_get_insert_batch_size_default() {
        if std::env::var("CHESSLOG_INSERT_BATCH_SIZE").is_err() {
            assert_eq!(get_insert_batch_size(), DEFAULT_INSERT_BATCH_SIZE);
        }
    }
}
