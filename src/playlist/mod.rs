//! Playlist files.
//!
//! The format is deliberately loose: one URI per line, `#` comments and
//! blank lines ignored, with per-entry metadata carried in the query string:
//!
//! ```text
//! #EXTM3U
//! https://host/watch?v=abc&title=Song+A&length=180
//! https://host/watch?v=def&length=Live&mediatype=Audio
//! ```
//!
//! Standard playlist parsers reject entries with blank metadata fields,
//! which this format tolerates.

mod loader;
pub mod options;

pub use loader::{LiveUrlRenewer, NoRenewal};
pub use options::PlayerOptions;

use url::Url;

use crate::error::{PlayerError, Result};
use crate::queue::MediaKind;

/// Declared length sentinel for streams whose URL may have expired.
pub const LIVE_LENGTH: &str = "Live";

/// Option key carrying the display title.
pub const TITLE_OPTION: &str = "force-media-title";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredLength {
    Live,
    Value(String),
}

/// One accepted line of a playlist file.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistFileEntry {
    /// URI with its host already rewritten to the configured API host.
    pub uri: Url,
    pub title: Option<String>,
    pub options: PlayerOptions,
    pub length: Option<DeclaredLength>,
    pub media_kind: Option<MediaKind>,
}

impl PlaylistFileEntry {
    pub fn is_live(&self) -> bool {
        self.length == Some(DeclaredLength::Live)
    }

    pub fn is_audio(&self) -> bool {
        self.media_kind == Some(MediaKind::Audio)
    }

    /// Options to pass to `loadfile`. A title directive is added from the
    /// parsed title when the stored options lack one; an untitled entry gets
    /// an empty title so the player never falls back to the raw URL.
    pub fn player_options(&self) -> PlayerOptions {
        let mut options = self.options.clone();
        if !options.contains(TITLE_OPTION) {
            options.set(TITLE_OPTION, self.title.as_deref().unwrap_or(""));
        }
        options
    }

    /// Name reported when this entry fails to play.
    pub fn display_title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| self.uri.to_string())
    }
}

/// Parse one playlist line.
///
/// Returns `None` for comments and blank lines, and an error for lines that
/// are not an absolute URI with a host.
pub fn parse_line(line: &str, api_host: &str) -> Option<Result<PlaylistFileEntry>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(parse_entry(line, api_host))
}

fn parse_entry(line: &str, api_host: &str) -> Result<PlaylistFileEntry> {
    let invalid = |reason: &str| PlayerError::InvalidUri {
        uri: line.to_string(),
        reason: reason.to_string(),
    };

    let mut uri = Url::parse(line).map_err(|e| invalid(&e.to_string()))?;
    if !uri.has_host() {
        return Err(invalid("missing host"));
    }

    if !api_host.is_empty() {
        rewrite_host(&mut uri, api_host).map_err(|reason| invalid(&reason))?;
    }

    let mut title = None;
    let mut options = PlayerOptions::new();
    let mut length = None;
    let mut media_kind = None;

    for (key, value) in uri.query_pairs() {
        match key.as_ref() {
            "title" if !value.is_empty() => title = Some(value.into_owned()),
            "options" if !value.is_empty() => options = PlayerOptions::parse(&value),
            "length" if value == LIVE_LENGTH => length = Some(DeclaredLength::Live),
            "length" if !value.is_empty() => length = Some(DeclaredLength::Value(value.into_owned())),
            "mediatype" if !value.is_empty() => media_kind = Some(MediaKind::from_label(&value)),
            _ => {}
        }
    }

    Ok(PlaylistFileEntry {
        uri,
        title,
        options,
        length,
        media_kind,
    })
}

/// Point `uri` at `host`, which may carry a port.
fn rewrite_host(uri: &mut Url, host: &str) -> std::result::Result<(), String> {
    let (name, port) = match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(']') || name.ends_with(']') => {
            match port.parse::<u16>() {
                Ok(port) => (name, Some(port)),
                Err(_) => (host, None),
            }
        }
        _ => (host, None),
    };

    uri.set_host(Some(name)).map_err(|e| e.to_string())?;
    if port.is_some() {
        uri.set_port(port)
            .map_err(|_| format!("cannot set port on {}", uri.scheme()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_comments_and_blanks() {
        assert!(parse_line("", "h").is_none());
        assert!(parse_line("   ", "h").is_none());
        assert!(parse_line("#EXTM3U", "h").is_none());
        assert!(parse_line("#EXTINF:-1,Whatever", "h").is_none());
    }

    #[test]
    fn test_rejects_non_uris() {
        assert!(matches!(
            parse_line("just some words", "h"),
            Some(Err(PlayerError::InvalidUri { .. }))
        ));
        assert!(matches!(
            parse_line("mailto:someone@example.org", "h"),
            Some(Err(PlayerError::InvalidUri { .. }))
        ));
    }

    #[test]
    fn test_rewrites_host_and_reads_metadata() {
        let entry = parse_line(
            "https://old.example/watch?v=abc&title=Song+A&length=180&mediatype=Video",
            "new.example",
        )
        .unwrap()
        .unwrap();

        assert_eq!(entry.uri.host_str(), Some("new.example"));
        assert_eq!(entry.uri.path(), "/watch");
        assert_eq!(entry.title.as_deref(), Some("Song A"));
        assert_eq!(entry.length, Some(DeclaredLength::Value("180".into())));
        assert_eq!(entry.media_kind, Some(MediaKind::Video));
        assert!(!entry.is_live());
    }

    #[test]
    fn test_host_with_port() {
        let entry = tokio_test::assert_ok!(parse_line("http://a/watch?v=x", "localhost:3000").unwrap());
        assert_eq!(entry.uri.host_str(), Some("localhost"));
        assert_eq!(entry.uri.port(), Some(3000));
    }

    #[test]
    fn test_live_audio_entry() {
        let entry = parse_line(
            "https://host/watch?v=def&length=Live&mediatype=Audio",
            "host",
        )
        .unwrap()
        .unwrap();
        assert!(entry.is_live());
        assert!(entry.is_audio());
        assert!(entry.title.is_none());
    }

    #[test]
    fn test_title_synthesized_only_when_missing() {
        let entry = parse_line("https://h/watch?v=a&title=Mine", "h")
            .unwrap()
            .unwrap();
        assert_eq!(
            entry.player_options().to_string(),
            "force-media-title=%4%Mine"
        );

        let entry = parse_line(
            "https://h/watch?v=a&title=Mine&options=force-media-title%3D%255%25Other%2Cvid%3Dno",
            "h",
        )
        .unwrap()
        .unwrap();
        let opts = entry.player_options();
        assert_eq!(opts.get(TITLE_OPTION), Some("Other"));
        assert_eq!(opts.get("vid"), Some("no"));
    }

    #[test]
    fn test_untitled_entry_reports_uri() {
        let entry = parse_line("https://h/watch?v=zz", "h").unwrap().unwrap();
        assert_eq!(entry.player_options().to_string(), "force-media-title=%0%");
        assert_eq!(entry.display_title(), "https://h/watch?v=zz");
    }
}
