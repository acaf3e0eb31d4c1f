//! Track information panel.

use image::DynamicImage;

use super::source::VideoInfo;
use crate::error::{PlayerError, Result};

/// Compact count: `999`, `1.2K`, `3.4M`, `5.6B`.
pub fn format_number(n: i64) -> String {
    let abs = n.unsigned_abs() as f64;
    let sign = if n < 0 { "-" } else { "" };
    let (value, suffix) = if abs >= 1e9 {
        (abs / 1e9, "B")
    } else if abs >= 1e6 {
        (abs / 1e6, "M")
    } else if abs >= 1e3 {
        (abs / 1e3, "K")
    } else {
        return n.to_string();
    };

    let text = format!("{:.1}", value);
    let text = text.strip_suffix(".0").unwrap_or(&text);
    format!("{}{}{}", sign, text, suffix)
}

/// Panel text for `video`.
pub fn format_info(video: &VideoInfo) -> String {
    let mut text = String::from("\n");

    if !video.author.is_empty() {
        text.push_str(&video.author);
        text.push_str("\n\n");
    }
    if !video.published_text.is_empty() {
        text.push_str(&format!("Uploaded {}\n", video.published_text));
    }
    text.push_str(&format!(
        "{} views / {} likes / {} subscribers\n\n",
        format_number(video.view_count),
        format_number(video.like_count),
        video.subscriber_text,
    ));
    text.push_str(&video.description);
    text
}

/// Decode thumbnail bytes in any supported format.
pub fn decode_thumbnail(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes)
        .map_err(|e| PlayerError::Source(format!("Player: Unable to decode thumbnail: {}", e)))
}
