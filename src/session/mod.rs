//! Connection manager for the player process.
//!
//! A [`Session`] owns one player process and its control socket. It is the
//! only way the rest of the crate talks to the player: every `call`, `get`
//! and `set` checks liveness first and fails fast with
//! [`PlayerError::ConnectionClosed`] once the process is gone. There is no
//! reconnection; a fresh session is the only recovery path.
//!
//! Cloning a `Session` is cheap and shares the same connection.

mod retry;

pub use retry::{open_with_retry, ConnectRetry};

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::bus::{self, dispatcher, PlayerEvents};
use crate::error::{PlayerError, Result};
use crate::ipc::{EventStream, IpcConnection, PropertyValue};
use crate::monitor::TrackMonitor;

/// How long `send_quit` and `exit` wait for the process to let go.
const QUIT_GRACE: Duration = Duration::from_secs(1);

/// Keys the player would otherwise use to quit on its own.
const QUIT_KEYS: &[&str] = &["q", "Ctrl+q", "Shift+q"];

/// Everything needed to start a player process.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub mpv_path: String,
    pub ytdl_path: String,
    pub user_agent: String,
    pub socket_path: PathBuf,
    pub retry: ConnectRetry,
    /// Host substituted into every playlist URI on load.
    pub api_host: String,
}

impl SessionOptions {
    /// Fixed command-line flags for the player process.
    pub fn process_args(&self) -> Vec<String> {
        vec![
            "--idle".to_string(),
            "--keep-open".to_string(),
            "--no-terminal".to_string(),
            "--really-quiet".to_string(),
            "--no-input-terminal".to_string(),
            format!("--user-agent={}", self.user_agent),
            format!("--input-ipc-server={}", self.socket_path.display()),
            format!("--script-opts=ytdl_hook-ytdl_path={}", self.ytdl_path),
        ]
    }
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    socket: PathBuf,
    connection: Arc<IpcConnection>,
    monitor: Arc<TrackMonitor>,
    api_host: String,
    child: Mutex<Option<Child>>,
    exit_requested: AtomicBool,
}

impl Session {
    /// Start the player process and connect to it.
    pub async fn init(options: SessionOptions) -> Result<(Self, PlayerEvents)> {
        info!(
            "Starting {} with socket {}",
            options.mpv_path,
            options.socket_path.display()
        );

        let mut child = Command::new(&options.mpv_path)
            .args(options.process_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| PlayerError::StartupFailed {
                path: options.mpv_path.clone(),
                source,
            })?;

        let (connection, events) = match open_with_retry(&options.socket_path, options.retry).await
        {
            Ok(opened) => opened,
            Err(e) => {
                if let Err(kill_err) = child.start_kill() {
                    debug!("Could not kill unreachable player: {}", kill_err);
                }
                return Err(e);
            }
        };

        Ok(Self::attach(connection, events, options.api_host, Some(child)).await)
    }

    /// Connect to a player that is already listening on `socket`.
    ///
    /// No process is spawned or owned, so [`Session::exit`] sends `quit` but
    /// has no child to wait on or kill. This attaches a player started by
    /// something else, and is how the integration tests reach a mock socket.
    pub async fn connect(
        socket: &Path,
        retry: ConnectRetry,
        api_host: impl Into<String>,
    ) -> Result<(Self, PlayerEvents)> {
        let (connection, events) = open_with_retry(socket, retry).await?;
        Ok(Self::attach(connection, events, api_host.into(), None).await)
    }

    async fn attach(
        connection: Arc<IpcConnection>,
        events: EventStream,
        api_host: String,
        child: Option<Child>,
    ) -> (Self, PlayerEvents) {
        let wiring = bus::wire();
        let monitor = Arc::new(TrackMonitor::new(wiring.assigned_slots));

        tokio::spawn(dispatcher::run(connection.clone(), events, wiring.dispatch));
        monitor.spawn_drain(wiring.error_slots, wiring.errors);

        let session = Self {
            inner: Arc::new(SessionInner {
                socket: connection.socket().to_path_buf(),
                connection,
                monitor,
                api_host,
                child: Mutex::new(child),
                exit_requested: AtomicBool::new(false),
            }),
        };

        // This application owns shutdown, not the player's key handler.
        for key in QUIT_KEYS {
            if let Err(e) = session.call("keybind", &[(*key).into(), "".into()]).await {
                debug!("Could not unbind {}: {}", key, e);
            }
        }

        (session, wiring.events)
    }

    pub fn socket(&self) -> &Path {
        &self.inner.socket
    }

    pub fn api_host(&self) -> &str {
        &self.inner.api_host
    }

    pub fn monitor(&self) -> &TrackMonitor {
        &self.inner.monitor
    }

    /// Whether the process or its connection is gone.
    pub fn exited(&self) -> bool {
        self.inner.exit_requested.load(Ordering::Acquire) || self.inner.connection.is_closed()
    }

    /// Issue a raw command.
    pub async fn call(&self, command: &str, args: &[PropertyValue]) -> Result<PropertyValue> {
        if self.exited() {
            return Err(PlayerError::ConnectionClosed);
        }

        let mut line = Vec::with_capacity(args.len() + 1);
        line.push(PropertyValue::from(command));
        line.extend_from_slice(args);
        self.inner.connection.call(line).await
    }

    pub async fn get(&self, property: &str) -> Result<PropertyValue> {
        self.call("get_property", &[property.into()]).await
    }

    /// Read a property in the player's own string form.
    pub async fn get_string(&self, property: &str) -> Result<String> {
        let value = self
            .call("get_property_string", &[property.into()])
            .await?;
        Ok(value.as_str()?.to_string())
    }

    pub async fn set(&self, property: &str, value: impl Into<PropertyValue>) -> Result<()> {
        self.call("set_property", &[property.into(), value.into()])
            .await
            .map(|_| ())
    }

    /// Ask the player to quit and remove its socket file. Later calls are
    /// no-ops.
    pub async fn exit(&self) {
        if self.inner.exit_requested.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("Shutting down player on {}", self.inner.socket.display());
        if !self.inner.connection.is_closed() {
            if let Err(e) = self.inner.connection.call(vec!["quit".into()]).await {
                debug!("quit: {}", e);
            }
        }

        let child = self
            .inner
            .child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut child) = child {
            match tokio::time::timeout(QUIT_GRACE, child.wait()).await {
                Ok(Ok(status)) => debug!("Player exited with {}", status),
                Ok(Err(e)) => debug!("Waiting on player failed: {}", e),
                Err(_) => {
                    warn!("Player did not exit in time, killing it");
                    if let Err(e) = child.start_kill() {
                        debug!("kill: {}", e);
                    }
                }
            }
        }

        remove_socket(&self.inner.socket).await;
    }

    /// Resolve once the player's connection closes.
    pub async fn wait_closed(&self) {
        self.inner.connection.closed().await
    }

    /// Tell whatever player is listening on `socket` to quit.
    ///
    /// Meant for cleaning up a process left over from an earlier run. Tries
    /// once, then waits briefly for the process to let go.
    pub async fn send_quit(socket: &Path) {
        let (connection, _events) = match IpcConnection::open(socket).await {
            Ok(opened) => opened,
            Err(e) => {
                debug!("No player on {}: {}", socket.display(), e);
                return;
            }
        };

        info!("Asking stale player on {} to quit", socket.display());
        match tokio::time::timeout(QUIT_GRACE, connection.call(vec!["quit".into()])).await {
            Ok(Ok(_)) | Ok(Err(PlayerError::ConnectionClosed)) => {}
            Ok(Err(e)) => debug!("quit: {}", e),
            Err(_) => debug!("quit timed out on {}", socket.display()),
        }

        if tokio::time::timeout(QUIT_GRACE, connection.closed())
            .await
            .is_err()
        {
            debug!("Stale player on {} still connected", socket.display());
        }
        connection.close();
    }
}

async fn remove_socket(socket: &Path) {
    match tokio::fs::remove_file(socket).await {
        Ok(()) => debug!("Removed {}", socket.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", socket.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> SessionOptions {
        SessionOptions {
            mpv_path: "mpv".into(),
            ytdl_path: "/usr/bin/yt-dlp".into(),
            user_agent: "mpvctl-test".into(),
            socket_path: PathBuf::from("/tmp/mpvctl-test-socket"),
            retry: ConnectRetry::default(),
            api_host: "example.org".into(),
        }
    }

    #[test]
    fn test_process_args_are_fixed() {
        let args = options().process_args();
        assert_eq!(
            args,
            vec![
                "--idle",
                "--keep-open",
                "--no-terminal",
                "--really-quiet",
                "--no-input-terminal",
                "--user-agent=mpvctl-test",
                "--input-ipc-server=/tmp/mpvctl-test-socket",
                "--script-opts=ytdl_hook-ytdl_path=/usr/bin/yt-dlp",
            ]
        );
    }

    #[tokio::test]
    async fn test_init_reports_missing_binary() {
        let mut opts = options();
        opts.mpv_path = "/nonexistent/definitely-not-mpv".into();
        opts.retry = ConnectRetry::new(0, Duration::from_millis(1));

        match Session::init(opts).await {
            Err(PlayerError::StartupFailed { path, .. }) => {
                assert_eq!(path, "/nonexistent/definitely-not-mpv")
            }
            Err(other) => panic!("Expected StartupFailed, got {:?}", other),
            Ok(_) => panic!("Expected StartupFailed"),
        }
    }

    #[tokio::test]
    async fn test_send_quit_without_listener_returns() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("nobody");
        tokio::time::timeout(Duration::from_secs(2), Session::send_quit(&socket))
            .await
            .unwrap();
    }
}
