//! Error taxonomy for the player control layer.
//!
//! Status queries recover locally with fallback values, so most of these only
//! surface from startup, connection, and load paths.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = PlayerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum PlayerError {
    /// The player process could not be spawned.
    #[error("MPV: could not start {path}: {source}")]
    StartupFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The control socket never became reachable within the retry budget.
    #[error("MPV: could not connect to socket {} after {attempts} attempts", socket.display())]
    ConnectFailed { socket: PathBuf, attempts: u32 },

    /// An operation was attempted after the process or connection went away.
    #[error("MPV: connection closed")]
    ConnectionClosed,

    /// A protocol value did not have the requested type.
    #[error("MPV: expected {expected} value, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// The player answered a request with a non-success error string.
    #[error("MPV: {0}")]
    Command(String),

    /// A line from the socket could not be decoded.
    #[error("MPV: malformed message: {0}")]
    Protocol(String),

    /// The play queue has no current entry.
    #[error("MPV: empty playlist")]
    EmptyQueue,

    #[error("MPV: unable to open {}: {source}", path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A playlist file produced no queued entries.
    #[error("MPV: no files were added")]
    EmptyPlaylist,

    /// A single `loadfile` call for the named title failed.
    #[error("MPV: unable to load {0}")]
    LoadFailed(String),

    #[error("invalid URI {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },

    /// The media API refused the request because of rate limiting.
    ///
    /// Callers suppress the user-visible message for this variant.
    #[error("Rate-limit exceeded")]
    RateLimited,

    /// Any other failure reported by the media API collaborator.
    #[error("{0}")]
    Source(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PlayerError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, PlayerError::RateLimited)
    }

    /// Whether the error means the session is gone for good.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PlayerError::StartupFailed { .. }
                | PlayerError::ConnectFailed { .. }
                | PlayerError::ConnectionClosed
        )
    }
}
