use std::path::Path;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use super::parse_line;
use crate::error::{PlayerError, Result};
use crate::ipc::PropertyValue;
use crate::session::Session;

/// Header written at the top of exported playlists.
const PLAYLIST_HEADER: &str = "#EXTM3U";

/// Called for entries whose stream URL may have expired.
#[async_trait]
pub trait LiveUrlRenewer: Send + Sync {
    /// Return `true` when a fresh URL was queued in place of `uri`; the
    /// loader then skips the original line.
    async fn renew_live_url(&self, uri: &str, audio: bool) -> bool;
}

/// Renewer that never renews.
pub struct NoRenewal;

#[async_trait]
impl LiveUrlRenewer for NoRenewal {
    async fn renew_live_url(&self, _uri: &str, _audio: bool) -> bool {
        false
    }
}

impl Session {
    /// Append every entry of the playlist file at `path` to the queue, in
    /// file order.
    ///
    /// With `replace`, the current queue and its error attribution are
    /// cleared first. Lines that are not valid URIs are skipped. The first
    /// failed `loadfile` aborts the scan and is returned as is; entries
    /// appended before it stay queued. Returns the number of entries added,
    /// or [`PlayerError::EmptyPlaylist`] when that would be zero.
    pub async fn load_playlist(
        &self,
        path: &Path,
        replace: bool,
        renewer: &dyn LiveUrlRenewer,
    ) -> Result<usize> {
        if replace {
            self.clear_for_replace().await;
        }

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| PlayerError::OpenFailed {
                path: path.to_path_buf(),
                source,
            })?;

        // Files from other tools may carry Latin-1 titles; decode lossily
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        let mut added = 0;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            let entry = match parse_line(line.trim_end_matches(['\r', '\n']), self.api_host()) {
                None => continue,
                Some(Ok(entry)) => entry,
                Some(Err(e)) => {
                    warn!("Skipping playlist line: {}", e);
                    continue;
                }
            };

            if entry.is_live()
                && renewer
                    .renew_live_url(entry.uri.as_str(), entry.is_audio())
                    .await
            {
                debug!("Live entry {} was renewed, skipping", entry.uri);
                continue;
            }

            let options = entry.player_options().to_string();
            self.call(
                "loadfile",
                &[
                    entry.uri.as_str().into(),
                    "append-play".into(),
                    options.into(),
                ],
            )
            .await?;

            added += 1;
            self.monitor().add_to_monitor(&entry.display_title());
        }

        if added == 0 {
            return Err(PlayerError::EmptyPlaylist);
        }

        info!("Loaded {} entries from {}", added, path.display());
        Ok(added)
    }

    /// Write the current queue to `path` in a form `load_playlist` accepts.
    pub async fn save_playlist(&self, path: &Path) -> Result<usize> {
        let playlist = self.get("playlist").await?;

        let mut contents = String::from(PLAYLIST_HEADER);
        contents.push('\n');

        let mut written = 0;
        for entry in playlist.as_array()? {
            if let Some(filename) = entry.get("filename").and_then(|f| f.as_str().ok()) {
                contents.push_str(filename);
                contents.push('\n');
                written += 1;
            }
        }

        tokio::fs::write(path, contents).await?;
        info!("Saved {} entries to {}", written, path.display());
        Ok(written)
    }

    async fn clear_for_replace(&self) {
        if let Err(e) = self.call("playlist-clear", &[]).await {
            debug!("playlist-clear: {}", e);
        }
        // playlist-clear keeps the playing entry
        if let Err(e) = self
            .call("playlist-remove", &[PropertyValue::from("current")])
            .await
        {
            debug!("playlist-remove: {}", e);
        }
        self.monitor().clear_monitor();
    }
}
