//! Display surface the player renders into.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use image::DynamicImage;
use tracing::{error, info, trace};

/// Rendering destination. Calls come from background tasks and must not
/// block.
pub trait Surface: Send + Sync {
    /// Width in cells of the progress line.
    fn progress_width(&self) -> usize;

    fn render_title(&self, title: &str);
    fn render_progress(&self, line: &str);
    /// Text of the track information panel.
    fn render_info(&self, text: &str);
    /// Thumbnail of the track information panel.
    fn render_image(&self, image: &DynamicImage);

    /// Transient status message.
    fn show_info(&self, message: &str);
    fn show_error(&self, message: &str);

    /// Make the player area visible.
    fn show(&self);
    fn hide(&self);
}

/// Plain terminal output: the progress line redraws in place on stdout and
/// messages go to the log.
pub struct TerminalSurface {
    width: usize,
    visible: AtomicBool,
    title: Mutex<String>,
}

impl TerminalSurface {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            visible: AtomicBool::new(false),
            title: Mutex::new(String::new()),
        }
    }

    /// Width from `COLUMNS`, else 80.
    pub fn from_env() -> Self {
        let width = std::env::var("COLUMNS")
            .ok()
            .and_then(|c| c.parse().ok())
            .filter(|w: &usize| *w > 0)
            .unwrap_or(80);
        Self::new(width)
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    fn redraw(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = write!(out, "\r\x1b[2K{}", text).and_then(|_| out.flush()) {
            trace!("stdout: {}", e);
        }
    }
}

impl Surface for TerminalSurface {
    fn progress_width(&self) -> usize {
        self.width
    }

    fn render_title(&self, title: &str) {
        let mut current = self.title.lock().unwrap_or_else(|e| e.into_inner());
        if *current != title {
            *current = title.to_string();
            if !title.is_empty() {
                info!("Now playing: {}", title);
            }
        }
    }

    fn render_progress(&self, line: &str) {
        if self.is_visible() {
            self.redraw(line);
        }
    }

    fn render_info(&self, text: &str) {
        info!("{}", text.trim());
    }

    fn render_image(&self, image: &DynamicImage) {
        info!("Thumbnail {}x{}", image.width(), image.height());
    }

    fn show_info(&self, message: &str) {
        info!("{}", message);
    }

    fn show_error(&self, message: &str) {
        error!("{}", message);
    }

    fn show(&self) {
        self.visible.store(true, Ordering::Release);
    }

    fn hide(&self) {
        if self.visible.swap(false, Ordering::AcqRel) {
            self.redraw("");
        }
    }
}
