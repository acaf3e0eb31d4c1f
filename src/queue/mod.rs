//! Play queue state and transport controls.
//!
//! Everything here is a thin wrapper over session calls. Status reads are
//! display inputs, so they fall back to a fixed value instead of failing;
//! loads and explicit controls return their error.

use std::fmt;

use tracing::{debug, warn};
use url::Url;

use crate::error::{PlayerError, Result};
use crate::ipc::PropertyValue;
use crate::playlist::{DeclaredLength, PlayerOptions, LIVE_LENGTH, TITLE_OPTION};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// `"Audio"` means audio; anything else is treated as video.
    pub fn from_label(label: &str) -> Self {
        if label == "Audio" {
            MediaKind::Audio
        } else {
            MediaKind::Video
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Audio => "Audio",
            MediaKind::Video => "Video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Repeat setting. Cycles off, file, playlist, off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoopMode {
    #[default]
    Off,
    File,
    Playlist,
}

impl LoopMode {
    pub fn next(self) -> Self {
        match self {
            LoopMode::Off => LoopMode::File,
            LoopMode::File => LoopMode::Playlist,
            LoopMode::Playlist => LoopMode::Off,
        }
    }

    /// Short tag shown on the progress line.
    pub fn tag(self) -> &'static str {
        match self {
            LoopMode::Off => "",
            LoopMode::File => "R-F",
            LoopMode::Playlist => "R-P",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoopMode::Off => "",
            LoopMode::File => "loop-file",
            LoopMode::Playlist => "loop-playlist",
        }
    }

    /// Values for `loop-file` and `loop-playlist`.
    fn properties(self) -> (&'static str, &'static str) {
        match self {
            LoopMode::Off => ("no", "no"),
            LoopMode::File => ("yes", "no"),
            LoopMode::Playlist => ("no", "yes"),
        }
    }
}

fn loop_enabled(value: &str) -> bool {
    value == "yes" || value == "inf"
}

/// Stream URLs behind one queue entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamUrls {
    pub primary: String,
    /// Separate audio track attached to a video stream.
    pub audio: Option<String>,
}

/// One entry of the player's play queue.
///
/// Positions shift as the queue changes, so an entry is identified by the
/// metadata in its URL, never by `position`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueEntry {
    pub position: usize,
    pub title: String,
    /// Video id carried in the entry's URL, if any.
    pub id: Option<String>,
    pub media_kind: Option<MediaKind>,
    pub length: Option<DeclaredLength>,
    pub streams: StreamUrls,
    pub current: bool,
    pub playing: bool,
}

impl QueueEntry {
    pub fn new(position: usize, title: impl Into<String>) -> Self {
        Self {
            position,
            title: title.into(),
            ..Self::default()
        }
    }

    /// Build an entry from one element of the player's `playlist` property.
    pub fn from_properties(position: usize, item: &PropertyValue) -> Self {
        let flag = |key: &str| {
            item.get(key)
                .and_then(|v| v.as_bool().ok())
                .unwrap_or(false)
        };
        let filename = item
            .get("filename")
            .and_then(|v| v.as_str().ok())
            .unwrap_or_default()
            .to_string();

        let meta = UrlMetadata::from_filename(&filename);
        let title = meta
            .title
            .clone()
            .or_else(|| {
                item.get("title")
                    .and_then(|v| v.as_str().ok())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| filename.clone());

        Self {
            position,
            title,
            id: meta.id,
            media_kind: meta.media_kind,
            length: meta.length,
            streams: StreamUrls {
                primary: filename,
                audio: meta.options.get("audio-file").map(str::to_string),
            },
            current: flag("current"),
            playing: flag("playing"),
        }
    }
}

/// Metadata encoded in the query string of a queued URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlMetadata {
    pub title: Option<String>,
    pub id: Option<String>,
    pub length: Option<DeclaredLength>,
    pub media_kind: Option<MediaKind>,
    pub options: PlayerOptions,
}

impl UrlMetadata {
    /// Read the metadata of `filename`. Non-URL filenames carry none.
    pub fn from_filename(filename: &str) -> Self {
        let mut meta = Self::default();
        let Ok(url) = Url::parse(filename) else {
            return meta;
        };

        for (key, value) in url.query_pairs() {
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "title" => meta.title = Some(value.into_owned()),
                "id" => meta.id = Some(value.into_owned()),
                "length" if value == LIVE_LENGTH => meta.length = Some(DeclaredLength::Live),
                "length" => meta.length = Some(DeclaredLength::Value(value.into_owned())),
                "mediatype" => meta.media_kind = Some(MediaKind::from_label(&value)),
                "options" => meta.options = PlayerOptions::parse(&value),
                _ => {}
            }
        }
        meta
    }
}

/// Append `options` to `url` as an escaped `options` query parameter.
fn with_options_param(url: &str, options: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.query_pairs_mut().append_pair("options", options);
            parsed.into()
        }
        Err(_) => {
            let sep = if url.contains('?') { '&' } else { '?' };
            format!("{}{}options={}", url, sep, urlencoding::encode(options))
        }
    }
}

impl Session {
    /// Queue one file for playback.
    ///
    /// With two URLs the second is attached as the audio track of the first.
    /// A `duration` above zero is remembered as the declared length.
    pub async fn load_file(
        &self,
        title: &str,
        duration: i64,
        audio: bool,
        urls: &[String],
    ) -> Result<()> {
        let Some(primary) = urls.first() else {
            return Err(PlayerError::LoadFailed(title.to_string()));
        };

        let mut options = PlayerOptions::new();
        options.set(TITLE_OPTION, title);
        if duration > 0 {
            options.set("length", duration.to_string());
        }
        if audio {
            options.set("vid", "no");
        }
        if let Some(audio_track) = urls.get(1) {
            options.set("audio-file", audio_track.as_str());
        }
        let options = options.to_string();

        let url = with_options_param(primary, &options);
        if let Err(e) = self
            .call(
                "loadfile",
                &[url.into(), "append-play".into(), options.into()],
            )
            .await
        {
            warn!("loadfile for {:?} failed: {}", title, e);
            return Err(PlayerError::LoadFailed(title.to_string()));
        }

        self.monitor().add_to_monitor(title);
        Ok(())
    }

    /// Filename (with query metadata) of the entry at `position`, or `"-"`.
    pub async fn title(&self, position: usize) -> String {
        self.get_string(&format!("playlist/{}/filename", position))
            .await
            .unwrap_or_else(|_| "-".to_string())
    }

    /// Video when the current file has a picture height, audio otherwise.
    pub async fn media_type(&self) -> MediaKind {
        match self.get("height").await {
            Ok(_) => MediaKind::Video,
            Err(_) => MediaKind::Audio,
        }
    }

    pub async fn play(&self) -> Result<()> {
        self.set("pause", false).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.call("stop", &[]).await.map(|_| ())
    }

    pub async fn next(&self) -> Result<()> {
        self.call("playlist-next", &[]).await.map(|_| ())
    }

    pub async fn prev(&self) -> Result<()> {
        self.call("playlist-prev", &[]).await.map(|_| ())
    }

    pub async fn seek_forward(&self) -> Result<()> {
        self.call("seek", &[PropertyValue::from(1i64)]).await.map(|_| ())
    }

    pub async fn seek_backward(&self) -> Result<()> {
        self.call("seek", &[PropertyValue::from(-1i64)]).await.map(|_| ())
    }

    /// Playback position in whole seconds, 0 when unknown.
    pub async fn position(&self) -> i64 {
        self.get_f64("playback-time").await.map_or(0, |t| t as i64)
    }

    /// Track length in whole seconds. Falls back to the length declared when
    /// the file was loaded, then 0.
    pub async fn duration(&self) -> i64 {
        if let Some(d) = self.get_f64("duration").await {
            return d as i64;
        }
        match self.get_string("options/length").await {
            Ok(declared) => declared.trim().parse::<f64>().map_or(0, |d| d as i64),
            Err(_) => 0,
        }
    }

    pub async fn paused(&self) -> bool {
        self.get_bool("pause").await.unwrap_or(false)
    }

    /// Toggle pause, rewinding first when paused at the end of a file.
    pub async fn toggle_paused(&self) -> Result<()> {
        if self.finished().await && self.paused().await {
            self.call("seek", &[PropertyValue::from(0i64), "absolute-percent".into()])
                .await?;
        }
        self.call("cycle", &["pause".into()]).await.map(|_| ())
    }

    pub async fn shuffled(&self) -> bool {
        self.get_bool("shuffle").await.unwrap_or(false)
    }

    pub async fn toggle_shuffled(&self) -> Result<()> {
        self.call("cycle", &["shuffle".into()]).await.map(|_| ())
    }

    pub async fn muted(&self) -> bool {
        self.get_bool("mute").await.unwrap_or(false)
    }

    pub async fn toggle_muted(&self) -> Result<()> {
        self.call("cycle", &["mute".into()]).await.map(|_| ())
    }

    pub async fn loop_mode(&self) -> LoopMode {
        let (Ok(file), Ok(playlist)) = (
            self.get_string("loop-file").await,
            self.get_string("loop-playlist").await,
        ) else {
            return LoopMode::Off;
        };

        if loop_enabled(&file) {
            LoopMode::File
        } else if loop_enabled(&playlist) {
            LoopMode::Playlist
        } else {
            LoopMode::Off
        }
    }

    /// Advance the repeat setting. File and playlist repeat are always set
    /// together so at most one is ever on.
    pub async fn toggle_loop_mode(&self) -> Result<LoopMode> {
        let mode = self.loop_mode().await.next();
        let (file, playlist) = mode.properties();
        self.set("loop-file", file).await?;
        self.set("loop-playlist", playlist).await?;
        debug!("Loop mode now {:?}", mode);
        Ok(mode)
    }

    pub async fn idle(&self) -> bool {
        self.get_bool("core-idle").await.unwrap_or(false)
    }

    pub async fn finished(&self) -> bool {
        self.get_bool("eof-reached").await.unwrap_or(false)
    }

    /// Assumes buffering when the player cannot say.
    pub async fn buffering(&self) -> bool {
        self.get_bool("paused-for-cache").await.unwrap_or(true)
    }

    /// Volume in percent, or -1 when unknown.
    pub async fn volume(&self) -> i64 {
        self.get_f64("volume").await.map_or(-1, |v| v as i64)
    }

    /// Raise the volume by one. Does nothing when the volume is unknown.
    pub async fn volume_increase(&self) -> Result<()> {
        let volume = self.volume().await;
        if volume < 0 {
            return Ok(());
        }
        self.set("volume", volume + 1).await
    }

    /// Lower the volume by one. Does nothing when the volume is unknown or
    /// already at zero.
    pub async fn volume_decrease(&self) -> Result<()> {
        let volume = self.volume().await;
        if volume <= 0 {
            return Ok(());
        }
        self.set("volume", volume - 1).await
    }

    pub async fn queue_count(&self) -> usize {
        self.get_f64("playlist-count")
            .await
            .map_or(0, |n| n.max(0.0) as usize)
    }

    /// Index of the playing entry, or `None` when nothing is playing or the
    /// player cannot be reached.
    pub async fn queue_position(&self) -> Option<usize> {
        self.try_queue_position().await.ok().flatten()
    }

    /// Like [`queue_position`](Self::queue_position) but keeps transport
    /// errors apart from an empty queue.
    pub async fn try_queue_position(&self) -> Result<Option<usize>> {
        let pos = self.get("playlist-playing-pos").await?.as_i64()?;
        Ok(usize::try_from(pos).ok())
    }

    pub async fn queue_delete(&self, position: usize) -> Result<()> {
        self.call("playlist-remove", &[position.into()])
            .await
            .map(|_| ())
    }

    /// Move the entry at `from` so it takes the place of the entry at `to`.
    pub async fn queue_move(&self, from: usize, to: usize) -> Result<()> {
        self.call("playlist-move", &[from.into(), to.into()])
            .await
            .map(|_| ())
    }

    pub async fn queue_switch_to_track(&self, position: usize) -> Result<()> {
        self.set("playlist-pos", position).await
    }

    /// The player's playlist as a raw JSON string, empty when unavailable.
    pub async fn queue_data(&self) -> String {
        self.get_string("playlist").await.unwrap_or_default()
    }

    /// Current queue, in order.
    pub async fn queue_entries(&self) -> Result<Vec<QueueEntry>> {
        let playlist = self.get("playlist").await?;
        Ok(playlist
            .as_array()?
            .iter()
            .enumerate()
            .map(|(position, item)| QueueEntry::from_properties(position, item))
            .collect())
    }

    /// Jump to the most recently added entry and play it.
    pub async fn queue_play_latest(&self) -> Result<()> {
        let count = self.queue_count().await;
        if count == 0 {
            return Err(PlayerError::EmptyQueue);
        }
        self.set("playlist-pos", count - 1).await?;
        self.play().await
    }

    /// Empty the queue and forget error attribution for it.
    pub async fn queue_clear(&self) -> Result<()> {
        let result = self.call("playlist-clear", &[]).await.map(|_| ());
        self.monitor().clear_monitor();
        result
    }

    async fn get_f64(&self, property: &str) -> Option<f64> {
        self.get(property).await.ok()?.as_f64().ok()
    }

    async fn get_bool(&self, property: &str) -> Option<bool> {
        self.get(property).await.ok()?.as_bool().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn item(pairs: &[(&str, PropertyValue)]) -> PropertyValue {
        PropertyValue::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn test_loop_mode_is_a_three_cycle() {
        let mut mode = LoopMode::Off;
        let mut seen = Vec::new();
        for _ in 0..3 {
            mode = mode.next();
            seen.push(mode);
        }
        assert_eq!(seen, vec![LoopMode::File, LoopMode::Playlist, LoopMode::Off]);

        for mode in [LoopMode::Off, LoopMode::File, LoopMode::Playlist] {
            let (file, playlist) = mode.properties();
            assert!(!(file == "yes" && playlist == "yes"));
        }
    }

    #[test]
    fn test_loop_tags() {
        assert_eq!(LoopMode::File.tag(), "R-F");
        assert_eq!(LoopMode::Playlist.tag(), "R-P");
        assert_eq!(LoopMode::Off.tag(), "");
        assert!(loop_enabled("inf"));
        assert!(loop_enabled("yes"));
        assert!(!loop_enabled("no"));
    }

    #[test]
    fn test_entry_title_prefers_query_metadata() {
        let entry = QueueEntry::from_properties(
            2,
            &item(&[
                (
                    "filename",
                    "https://h/watch?v=a&id=a1&title=From+Query&mediatype=Audio&length=3:00".into(),
                ),
                ("title", "From Player".into()),
                ("current", true.into()),
            ]),
        );
        assert_eq!(entry.position, 2);
        assert_eq!(entry.title, "From Query");
        assert_eq!(entry.id.as_deref(), Some("a1"));
        assert_eq!(entry.media_kind, Some(MediaKind::Audio));
        assert_eq!(entry.length, Some(DeclaredLength::Value("3:00".into())));
        assert!(entry.current);
        assert!(!entry.playing);
    }

    #[test]
    fn test_entry_title_falls_back() {
        let entry = QueueEntry::from_properties(
            0,
            &item(&[("filename", "/music/a.flac".into()), ("title", "Tagged".into())]),
        );
        assert_eq!(entry.title, "Tagged");

        let entry = QueueEntry::from_properties(0, &item(&[("filename", "/music/b.flac".into())]));
        assert_eq!(entry.title, "/music/b.flac");
        assert_eq!(entry.streams.primary, "/music/b.flac");
        assert!(entry.streams.audio.is_none());
    }

    #[test]
    fn test_entry_reads_attached_audio_track() {
        let options = "force-media-title=%1%T,audio-file=https://cdn/a.m4a";
        let filename = format!(
            "https://cdn/v.mp4?x=1&options={}",
            urlencoding::encode(options)
        );
        let entry = QueueEntry::from_properties(0, &item(&[("filename", filename.into())]));
        assert_eq!(entry.streams.audio.as_deref(), Some("https://cdn/a.m4a"));
    }

    #[test]
    fn test_options_param_is_escaped() {
        let url = with_options_param("https://cdn/v?x=1", "force-media-title=%3%A,B");
        let parsed = Url::parse(&url).unwrap();
        let options = parsed
            .query_pairs()
            .find(|(k, _)| k == "options")
            .map(|(_, v)| v.into_owned());
        assert_eq!(options.as_deref(), Some("force-media-title=%3%A,B"));

        let fallback = with_options_param("not a url", "a=b");
        assert_eq!(fallback, "not a url?options=a%3Db");
    }
}
