use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use super::{ArchiveError, ArchiveId, ArchiveSource, RawGame};

const USER_AGENT: &str = concat!("chesslog/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the Chess.com published-data API.
pub struct ChessComArchiveClient {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ArchiveList {
    #[serde(default)]
    archives: Vec<String>,
}

#[derive(Deserialize)]
struct ArchivePage {
    #[serde(default)]
    games: Vec<RawGame>,
}

impl ChessComArchiveClient {
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self, ArchiveError> {
        let raw = base_url.as_ref();
        let invalid = |reason: String| ArchiveError::InvalidBaseUrl {
            url: raw.to_string(),
            reason,
        };
        let base_url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(invalid("not a hierarchical url".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// `{base}/player/{username}/games/archives`. The username always lands
    /// in exactly one percent-encoded path segment.
    fn archives_url(&self, username: &str) -> Result<Url, ArchiveError> {
        if username.is_empty() || matches!(username, "." | "..") {
            return Err(ArchiveError::InvalidUsername(username.to_string()));
        }

        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|()| ArchiveError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: "not a hierarchical url".to_string(),
            })?
            .pop_if_empty()
            .push("player")
            .push(username)
            .push("games")
            .push("archives");
        Ok(url)
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ArchiveError> {
        let resp = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ArchiveError::Timeout(self.timeout)
            } else {
                ArchiveError::Request(e)
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ArchiveError::HttpStatus {
                status: status.as_u16(),
                url: resp.url().to_string(),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ArchiveSource for ChessComArchiveClient {
    async fn list_archives(&self, username: &str) -> Result<Vec<ArchiveId>, ArchiveError> {
        let url = self.archives_url(username)?;
        tracing::debug!(%url, "Listing archives");
        let body = self.get_bytes(url.as_str()).await?;
        decode_archive_list(&body)
    }

    async fn fetch_archive(&self, archive: &ArchiveId) -> Result<Vec<RawGame>, ArchiveError> {
        tracing::debug!(archive = %archive, "Fetching archive");
        let body = self.get_bytes(archive.as_str()).await?;
        decode_archive_page(&body)
    }
}

fn decode_archive_list(body: &[u8]) -> Result<Vec<ArchiveId>, ArchiveError> {
    let list: ArchiveList = serde_json::from_slice(body)?;
    Ok(list.archives.into_iter().map(ArchiveId::from).collect())
}

fn decode_archive_page(body: &[u8]) -> Result<Vec<RawGame>, ArchiveError> {
    let page: ArchivePage = serde_json::from_slice(body)?;
    Ok(page.games)
}
