//! Configuration management
//!
//! Sources, lowest precedence first: built-in defaults, an optional
//! `config.{toml,json,yaml}` in the config directory, then `MPVCTL_*`
//! environment variables.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::player::PlayerSettings;
use crate::session::{ConnectRetry, SessionOptions};

const APP_DIR_NAME: &str = "mpvctl";
const SOCKET_NAME: &str = "mpvctl-socket";

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/115.0";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_mpv_path")]
    pub mpv_path: String,
    #[serde(default = "default_ytdl_path")]
    pub ytdl_path: String,
    /// Socket connection retries after the first attempt.
    #[serde(default = "default_num_retries")]
    pub num_retries: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Defaults to a file in the runtime directory.
    #[serde(default)]
    pub socket_path: Option<PathBuf>,
    /// Host written into playlist URIs on load. Empty keeps each URI's own
    /// host.
    #[serde(default)]
    pub api_host: String,
    #[serde(default = "default_add_media_limit")]
    pub add_media_limit: usize,
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

fn default_mpv_path() -> String {
    "mpv".to_string()
}

fn default_ytdl_path() -> String {
    "yt-dlp".to_string()
}

fn default_num_retries() -> u32 {
    10
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_add_media_limit() -> usize {
    2
}

fn default_progress_interval_ms() -> u64 {
    1000
}

impl Config {
    pub fn socket_path(&self) -> PathBuf {
        self.socket_path
            .clone()
            .unwrap_or_else(|| get_runtime_dir().join(SOCKET_NAME))
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            mpv_path: self.mpv_path.clone(),
            ytdl_path: self.ytdl_path.clone(),
            user_agent: self.user_agent.clone(),
            socket_path: self.socket_path(),
            retry: ConnectRetry::new(self.num_retries, Duration::from_secs(1)),
            api_host: self.api_host.clone(),
        }
    }

    pub fn player_settings(&self) -> PlayerSettings {
        PlayerSettings {
            add_media_limit: self.add_media_limit.max(1),
            progress_period: Duration::from_millis(self.progress_interval_ms.max(1)),
        }
    }
}

/// Get config directory (XDG_CONFIG_HOME or platform default)
pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MPVCTL_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library/Application Support")
                .join(APP_DIR_NAME);
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join(APP_DIR_NAME);
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".config").join(APP_DIR_NAME);
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join(APP_DIR_NAME);
        }
    }

    // Fallback to current directory
    PathBuf::from(".")
}

/// Where the control socket lives by default.
pub fn get_runtime_dir() -> PathBuf {
    std::env::var("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir())
}

pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir();

    let config = ::config::Config::builder()
        .set_default("mpv_path", default_mpv_path())?
        .set_default("ytdl_path", default_ytdl_path())?
        .set_default("num_retries", default_num_retries() as i64)?
        .set_default("add_media_limit", default_add_media_limit() as i64)?
        .set_default("progress_interval_ms", default_progress_interval_ms() as i64)?
        // Load from config file if it exists
        .add_source(
            ::config::File::with_name(&config_dir.join("config").to_string_lossy()).required(false),
        )
        // Override with environment variables (MPVCTL_MPV_PATH, MPVCTL_NUM_RETRIES, etc.)
        .add_source(
            ::config::Environment::with_prefix("MPVCTL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}
