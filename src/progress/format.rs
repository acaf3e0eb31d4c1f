//! Progress line rendering. Pure functions over a [`StatusSnapshot`].

use crate::playlist::DeclaredLength;
use crate::queue::{LoopMode, MediaKind, UrlMetadata};

const BAR_FILLED: &str = "█";

/// Live player state gathered for one refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    /// Filename of the playing entry, including its query metadata.
    pub filename: String,
    pub finished: bool,
    pub paused: bool,
    pub buffering: bool,
    pub shuffled: bool,
    pub muted: bool,
    pub loop_mode: LoopMode,
    /// Percent, negative when unknown.
    pub volume: i64,
    /// Seconds.
    pub position: i64,
    /// Seconds.
    pub duration: i64,
    pub media_kind: MediaKind,
}

/// What the display shows for the playing entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub title: String,
    pub line: String,
    /// Active states, e.g. `volume 80`, `shuffle`, `loop-file`.
    pub states: Vec<String>,
    /// Video id of the entry, used for the information panel.
    pub video_id: Option<String>,
}

/// `MM:SS`, or `HH:MM:SS` from one hour up. Non-positive input is `00:00`.
pub fn format_duration(seconds: i64) -> String {
    if seconds <= 0 {
        return "00:00".to_string();
    }
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{:02}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

/// Filled cells of a `width`-cell bar. Always within `[0, width]`.
pub fn bar_fill(elapsed: i64, duration: i64, width: usize) -> usize {
    let duration = duration.max(1);
    let elapsed = elapsed.clamp(0, duration);
    ((width as i128 * elapsed as i128) / duration as i128) as usize
}

fn state_glyph(status: &StatusSnapshot) -> &'static str {
    if status.paused {
        if status.finished {
            "[]"
        } else {
            "||"
        }
    } else if status.buffering {
        "B"
    } else {
        ">"
    }
}

/// Lay out the progress line for a display `width` cells wide. The bar takes
/// half of it.
pub fn render(status: &StatusSnapshot, width: usize) -> ProgressSnapshot {
    let meta = UrlMetadata::from_filename(&status.filename);
    let mut states = Vec::new();

    let volume = if status.volume < 0 {
        "0".to_string()
    } else {
        status.volume.to_string()
    };
    states.push(format!("volume {}", volume));

    let title = meta.title.unwrap_or_else(|| status.filename.clone());
    let total = match meta.length {
        Some(DeclaredLength::Value(declared)) => declared,
        Some(DeclaredLength::Live) => "Live".to_string(),
        None => format_duration(status.duration),
    };
    let media = meta.media_kind.unwrap_or(status.media_kind);

    let mut flags = String::new();
    if status.shuffled {
        flags.push_str(" S");
        states.push("shuffle".to_string());
    }
    if status.muted {
        flags.push_str(" M");
        states.push("mute".to_string());
    }
    if status.loop_mode != LoopMode::Off {
        states.push(status.loop_mode.as_str().to_string());
    }

    let bar_width = width / 2;
    let filled = bar_fill(status.position, status.duration, bar_width);

    let line = format!(
        "{}{} {} {} |{}{}| {} {}% ({})",
        status.loop_mode.tag(),
        flags,
        state_glyph(status),
        format_duration(status.position),
        BAR_FILLED.repeat(filled),
        " ".repeat(bar_width - filled),
        total,
        volume,
        media,
    );

    ProgressSnapshot {
        title,
        line,
        states,
        video_id: meta.id,
    }
}
