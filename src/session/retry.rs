//! Fixed-count, fixed-delay retry for opening the control socket.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{PlayerError, Result};
use crate::ipc::{EventStream, IpcConnection};

/// How hard to try before giving up on the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectRetry {
    /// Retries after the first attempt
    pub retries: u32,
    /// Pause between attempts (no backoff)
    pub delay: Duration,
}

impl Default for ConnectRetry {
    fn default() -> Self {
        Self {
            retries: 10,
            delay: Duration::from_secs(1),
        }
    }
}

impl ConnectRetry {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// Total number of connection attempts.
    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Open `socket`, retrying per `retry`. The process creates its socket some
/// time after it starts, so the first few attempts usually fail.
pub async fn open_with_retry(
    socket: &Path,
    retry: ConnectRetry,
) -> Result<(Arc<IpcConnection>, EventStream)> {
    let attempts = retry.attempts();

    for attempt in 1..=attempts {
        match IpcConnection::open(socket).await {
            Ok(opened) => {
                info!(
                    "Connected to {} on attempt {}/{}",
                    socket.display(),
                    attempt,
                    attempts
                );
                return Ok(opened);
            }
            Err(e) => {
                debug!(
                    "Socket {} not ready (attempt {}/{}): {}",
                    socket.display(),
                    attempt,
                    attempts,
                    e
                );
                if attempt < attempts {
                    tokio::time::sleep(retry.delay).await;
                }
            }
        }
    }

    Err(PlayerError::ConnectFailed {
        socket: socket.to_path_buf(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::net::UnixListener;

    #[test]
    fn test_retry_default() {
        let retry = ConnectRetry::default();
        assert_eq!(retry.retries, 10);
        assert_eq!(retry.delay, Duration::from_secs(1));
        assert_eq!(retry.attempts(), 11);
    }

    #[test]
    fn test_zero_retries_still_tries_once() {
        let retry = ConnectRetry::new(0, Duration::from_millis(5));
        assert_eq!(retry.attempts(), 1);
        assert_eq!(ConnectRetry::new(u32::MAX, Duration::ZERO).attempts(), u32::MAX);
    }

    #[tokio::test]
    async fn test_gives_up_after_all_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("never");

        let start = Instant::now();
        let result = open_with_retry(&socket, ConnectRetry::new(2, Duration::from_millis(20))).await;

        match result {
            Err(PlayerError::ConnectFailed { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("Expected ConnectFailed, got {:?}", other.map(|_| ())),
        }
        // Two sleeps between three attempts, none after the last
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_succeeds_once_socket_appears() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("late");

        let bind_path = socket.clone();
        let server = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let listener = UnixListener::bind(&bind_path).unwrap();
            let (stream, _) = listener.accept().await.unwrap();
            stream
        });

        let result = open_with_retry(&socket, ConnectRetry::new(20, Duration::from_millis(20))).await;
        assert!(result.is_ok());
        let _stream = server.await.unwrap();
    }
}
