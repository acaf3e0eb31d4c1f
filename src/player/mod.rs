//! Player front end.
//!
//! Ties a [`Session`] to a media source and a display surface: adds media
//! under a concurrency limit, routes player notifications to the surface,
//! drives the progress loop and renews expired live URLs for playlist
//! files.

mod info;
pub mod source;

pub use info::{decode_thumbnail, format_info, format_number};
pub use source::{LiveUrlStatus, MediaSource, NoMediaSource, PlaylistInfo, VideoInfo};

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::PlayerEvents;
use crate::error::{PlayerError, Result};
use crate::playlist::LiveUrlRenewer;
use crate::progress::{ProgressController, ProgressOutputs};
use crate::session::Session;
use crate::surface::Surface;

#[derive(Debug, Clone)]
pub struct PlayerSettings {
    /// Add-media operations allowed to run at once.
    pub add_media_limit: usize,
    pub progress_period: Duration,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            add_media_limit: 2,
            progress_period: crate::progress::DEFAULT_PERIOD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaTarget {
    Video(String),
    Playlist(String),
}

impl MediaTarget {
    fn kind(&self) -> &'static str {
        match self {
            MediaTarget::Video(_) => "video",
            MediaTarget::Playlist(_) => "playlist",
        }
    }
}

/// A user request to queue media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRequest {
    pub target: MediaTarget,
    pub audio: bool,
    /// Start playing the video as soon as it is queued.
    pub play_now: bool,
}

impl MediaRequest {
    pub fn video(id: impl Into<String>, audio: bool) -> Self {
        Self {
            target: MediaTarget::Video(id.into()),
            audio,
            play_now: false,
        }
    }

    pub fn playlist(id: impl Into<String>, audio: bool) -> Self {
        Self {
            target: MediaTarget::Playlist(id.into()),
            audio,
            play_now: false,
        }
    }

    pub fn play_now(mut self) -> Self {
        self.play_now = true;
        self
    }
}

#[derive(Clone)]
pub struct Player {
    inner: Arc<PlayerInner>,
}

struct PlayerInner {
    session: Session,
    source: Arc<dyn MediaSource>,
    surface: Arc<dyn Surface>,
    limiter: Semaphore,
    videos: Mutex<HashMap<String, VideoInfo>>,
    shown_info: Mutex<Option<String>>,
    progress: ProgressController,
    playing: AtomicBool,
    shutdown: CancellationToken,
}

impl Player {
    /// Build the player and start routing `events` to `surface`.
    pub fn start(
        session: Session,
        events: PlayerEvents,
        source: Arc<dyn MediaSource>,
        surface: Arc<dyn Surface>,
        settings: PlayerSettings,
    ) -> Self {
        let (progress, outputs) =
            ProgressController::spawn(session.clone(), surface.clone(), settings.progress_period);

        let player = Self {
            inner: Arc::new(PlayerInner {
                session,
                source,
                surface,
                limiter: Semaphore::new(settings.add_media_limit.max(1)),
                videos: Mutex::new(HashMap::new()),
                shown_info: Mutex::new(None),
                progress,
                playing: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
            }),
        };

        player.spawn_notifications(events, outputs);
        player
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub fn is_playing(&self) -> bool {
        self.inner.playing.load(Ordering::Acquire)
    }

    /// Queue a video or a remote playlist.
    ///
    /// At most `add_media_limit` of these run at once; the rest wait for a
    /// slot. Returns the title of what was added. Rate-limit failures are
    /// returned but not shown.
    pub async fn add_media(&self, request: MediaRequest) -> Result<String> {
        let _permit = self
            .inner
            .limiter
            .acquire()
            .await
            .map_err(|_| PlayerError::ConnectionClosed)?;

        let kind = request.target.kind();
        self.inner.surface.show_info(&format!("Adding {}", kind));

        let result = match &request.target {
            MediaTarget::Video(id) => self.load_video(id, request.audio).await,
            MediaTarget::Playlist(id) => self.load_remote_playlist(id, request.audio).await,
        };

        let title = match result {
            Ok(title) => title,
            Err(e) => {
                if !e.is_rate_limited() {
                    self.inner.surface.show_error(&e.to_string());
                }
                return Err(e);
            }
        };

        self.inner
            .surface
            .show_info(&format!("Added {}", title));

        if request.play_now {
            if let MediaTarget::Video(_) = request.target {
                self.inner.session.queue_play_latest().await?;
            }
        }

        Ok(title)
    }

    /// Fetch and queue one video.
    pub async fn load_video(&self, id: &str, audio: bool) -> Result<String> {
        let video = self.inner.source.video(id, audio).await?;
        self.cache_video(id, video.clone());

        self.inner
            .session
            .load_file(
                &video.title,
                video.length_seconds,
                audio && video.live,
                &video.stream_urls,
            )
            .await?;

        Ok(video.title)
    }

    /// Queue every video of a remote playlist. Individual failures are
    /// skipped.
    pub async fn load_remote_playlist(&self, id: &str, audio: bool) -> Result<String> {
        let playlist = self.inner.source.playlist(id).await?;

        for video_id in &playlist.video_ids {
            if self.inner.shutdown.is_cancelled() || self.inner.session.exited() {
                return Err(PlayerError::ConnectionClosed);
            }
            if let Err(e) = self.load_video(video_id, audio).await {
                warn!("Skipping {} from playlist {}: {}", video_id, id, e);
            }
        }

        Ok(playlist.title)
    }

    /// Replace the queue with the playlist file at `path`.
    pub async fn open_playlist(&self, path: &Path) -> Result<usize> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.inner.surface.show_info(&format!("Loading {}", name));

        match self.inner.session.load_playlist(path, true, self).await {
            Ok(added) => {
                self.show().await;
                self.inner.surface.show_info(&format!("Loaded {}", name));
                Ok(added)
            }
            Err(e) => {
                self.inner.surface.show_error(&e.to_string());
                Err(e)
            }
        }
    }

    /// Show the player and start the progress loop.
    pub async fn show(&self) {
        if self.inner.playing.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.surface.show();
        self.inner.progress.set_playing(true).await;
    }

    /// Hide the player, stop playback and empty the queue.
    pub async fn hide(&self) {
        if !self.inner.playing.swap(false, Ordering::AcqRel) {
            return;
        }
        self.inner.progress.set_playing(false).await;
        self.inner.surface.hide();

        if let Err(e) = self.inner.session.stop().await {
            debug!("stop: {}", e);
        }
        if let Err(e) = self.inner.session.queue_clear().await {
            debug!("queue_clear: {}", e);
        }
    }

    /// Redraw the progress line now.
    pub fn refresh(&self) {
        self.inner.progress.refresh_now();
    }

    /// Stop everything and shut the player process down.
    pub async fn stop(&self) {
        self.inner.shutdown.cancel();
        self.inner.playing.store(false, Ordering::Release);
        self.inner.progress.set_playing(false).await;

        if let Err(e) = self.inner.session.stop().await {
            debug!("stop: {}", e);
        }
        self.inner.session.exit().await;
    }

    /// Cached metadata for a loaded video.
    pub fn current_video(&self, id: &str) -> Option<VideoInfo> {
        self.videos().get(id).cloned()
    }

    pub fn remove_video(&self, id: &str) -> Option<VideoInfo> {
        self.videos().remove(id)
    }

    fn cache_video(&self, id: &str, video: VideoInfo) {
        self.videos().insert(id.to_string(), video);
    }

    fn videos(&self) -> MutexGuard<'_, HashMap<String, VideoInfo>> {
        self.inner.videos.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fill the information panel for video `id`. Does nothing when `id` is
    /// already shown or was never loaded through this player.
    pub fn render_info(&self, id: &str) {
        {
            let mut shown = self
                .inner
                .shown_info
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if shown.as_deref() == Some(id) {
                return;
            }
            *shown = Some(id.to_string());
        }

        let Some(video) = self.current_video(id) else {
            return;
        };
        self.inner.surface.render_info(&format_info(&video));

        let source = self.inner.source.clone();
        let surface = self.inner.surface.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            let bytes = match source.thumbnail(&id).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!("Thumbnail for {}: {}", id, e);
                    surface.show_error("Player: Unable to download thumbnail");
                    return;
                }
            };
            match decode_thumbnail(&bytes) {
                Ok(image) => surface.render_image(&image),
                Err(e) => {
                    debug!("{}", e);
                    surface.show_error("Player: Unable to decode thumbnail");
                }
            }
        });
    }

    fn spawn_notifications(&self, events: PlayerEvents, outputs: ProgressOutputs) {
        let player = self.clone();
        let shutdown = self.inner.shutdown.clone();
        let PlayerEvents {
            mut errors,
            mut now_playing,
            ..
        } = events;
        let ProgressOutputs {
            mut hide,
            mut snapshots,
        } = outputs;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    Some(title) = errors.recv() => {
                        player
                            .inner
                            .surface
                            .show_error(&format!("Player: Unable to play {}", title));
                    }
                    Some(()) = now_playing.recv() => player.show().await,
                    Some(()) = hide.recv() => player.hide().await,
                    Ok(()) = snapshots.changed() => {
                        let video_id = snapshots
                            .borrow_and_update()
                            .as_ref()
                            .and_then(|s| s.video_id.clone());
                        if let Some(id) = video_id {
                            player.render_info(&id);
                        }
                    }
                    else => break,
                }
            }
            debug!("Player notifications stopped");
        });
    }
}

#[async_trait]
impl LiveUrlRenewer for Player {
    async fn renew_live_url(&self, uri: &str, audio: bool) -> bool {
        let status = match self.inner.source.check_live_url(uri, audio).await {
            Ok(status) => status,
            Err(e) => {
                debug!("Could not check live URL {}: {}", uri, e);
                return false;
            }
        };
        if !status.expired {
            return false;
        }

        info!("Live URL for {} expired, renewing", status.video_id);
        if let Err(e) = self.load_video(&status.video_id, audio).await {
            debug!("Renewal failed: {}", e);
            self.inner.surface.show_error(&format!(
                "Player: Unable to renew live URL for video {}",
                status.video_id
            ));
        }
        true
    }
}
