//! Lyrics provider collaborator
//!
//! The orchestrator consumes lyrics as an ordered sequence of
//! (timestamp, text) lines for a track id. A track without lyrics is a
//! distinct not-found condition, surfaced to the client as 422 rather
//! than a generic failure.

use async_trait::async_trait;
use lyrivis_common::{Error, Result};
use serde::Deserialize;

use crate::models::LyricLine;

/// Seam for the lyric retrieval collaborator
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    /// Ordered lyric lines for a track.
    ///
    /// Returns `Error::NotFound` when the track has no lyrics (or the
    /// provider reports the track unknown); any other error is a
    /// transient upstream failure.
    async fn lines(&self, track_id: &str) -> Result<Vec<LyricLine>>;
}

#[derive(Debug, Deserialize)]
struct LyricsResponse {
    lines: Vec<LyricLine>,
}

/// HTTP lyrics provider client
pub struct HttpLyricsProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLyricsProvider {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl LyricsProvider for HttpLyricsProvider {
    async fn lines(&self, track_id: &str) -> Result<Vec<LyricLine>> {
        let url = format!("{}/lyrics/{}", self.base_url.trim_end_matches('/'), track_id);
        tracing::debug!(track_id = %track_id, url = %url, "Fetching lyrics");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Lyrics request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("No lyrics for track {}", track_id)));
        }
        if !status.is_success() {
            return Err(Error::Upstream(format!(
                "Lyrics provider returned {} for track {}",
                status, track_id
            )));
        }

        let body: LyricsResponse = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Failed to parse lyrics response: {}", e)))?;

        Ok(body.lines)
    }
}
