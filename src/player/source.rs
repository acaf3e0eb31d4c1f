//! Media metadata collaborator.

use async_trait::async_trait;

use crate::error::{PlayerError, Result};

/// Metadata and stream URLs for one video.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    /// Seconds; 0 for live streams.
    pub length_seconds: i64,
    pub live: bool,
    pub author: String,
    pub published_text: String,
    pub view_count: i64,
    pub like_count: i64,
    pub subscriber_text: String,
    pub description: String,
    /// Primary stream first, optional separate audio track second.
    pub stream_urls: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistInfo {
    pub id: String,
    pub title: String,
    pub video_ids: Vec<String>,
}

/// Result of checking a queued live stream URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveUrlStatus {
    pub video_id: String,
    pub expired: bool,
}

/// The web API behind the player. Implementations report rate limiting as
/// [`PlayerError::RateLimited`].
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn video(&self, id: &str, audio: bool) -> Result<VideoInfo>;
    async fn playlist(&self, id: &str) -> Result<PlaylistInfo>;
    async fn thumbnail(&self, id: &str) -> Result<Vec<u8>>;
    async fn check_live_url(&self, uri: &str, audio: bool) -> Result<LiveUrlStatus>;
}

/// Source for running without an API: nothing resolves, and live URLs are
/// never considered expired.
pub struct NoMediaSource;

#[async_trait]
impl MediaSource for NoMediaSource {
    async fn video(&self, id: &str, _audio: bool) -> Result<VideoInfo> {
        Err(PlayerError::Source(format!("no media source for video {}", id)))
    }

    async fn playlist(&self, id: &str) -> Result<PlaylistInfo> {
        Err(PlayerError::Source(format!("no media source for playlist {}", id)))
    }

    async fn thumbnail(&self, id: &str) -> Result<Vec<u8>> {
        Err(PlayerError::Source(format!("no thumbnail for {}", id)))
    }

    async fn check_live_url(&self, uri: &str, _audio: bool) -> Result<LiveUrlStatus> {
        Ok(LiveUrlStatus {
            video_id: video_id_from_uri(uri).unwrap_or_default(),
            expired: false,
        })
    }
}

/// Video id from a `v` or `id` query parameter.
pub fn video_id_from_uri(uri: &str) -> Option<String> {
    let url = url::Url::parse(uri).ok()?;
    let found = url
        .query_pairs()
        .find(|(k, v)| (k == "v" || k == "id") && !v.is_empty())
        .map(|(_, v)| v.into_owned());
    found
}
