//! mpvctl
//!
//! Control layer that drives an external mpv process over its JSON IPC
//! socket.
//!
//! This library provides:
//! - Process startup, connection retry and shutdown ([`session`])
//! - The socket protocol and request/response correlation ([`ipc`])
//! - Event routing to bounded hand-off queues ([`bus`])
//! - Per-load title tracking for failure reports ([`monitor`])
//! - Queue, transport and status operations ([`queue`])
//! - Playlist file loading and saving ([`playlist`])
//! - The periodic progress line ([`progress`])
//! - A front end tying it together with a media source ([`player`])

pub mod bus;
pub mod config;
pub mod error;
pub mod ipc;
pub mod monitor;
pub mod player;
pub mod playlist;
pub mod progress;
pub mod queue;
pub mod session;
pub mod surface;

pub use error::{PlayerError, Result};
pub use ipc::PropertyValue;
pub use player::{MediaRequest, Player, PlayerSettings};
pub use session::{ConnectRetry, Session, SessionOptions};
