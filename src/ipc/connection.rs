//! Socket connection to a running player.
//!
//! The socket is split in two. A reader task owns the read half, routes
//! replies to whoever is waiting on that `request_id` and forwards events
//! to a bounded channel. A writer task owns the write half and drains a
//! bounded queue of encoded request lines. Nothing guards the transport with
//! a mutex; only the table of pending replies is locked, and never across an
//! await.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::protocol::{decode_message, encode_request, Event, Message, PropertyValue};
use crate::error::{PlayerError, Result};

/// Events buffered between the reader task and the dispatcher.
const EVENT_BUFFER: usize = 256;

/// Request lines buffered ahead of the writer task.
const WRITE_BUFFER: usize = 64;

/// Receiving side of the player's event stream. Ends when the socket closes.
pub type EventStream = mpsc::Receiver<Event>;

type ReplySender = oneshot::Sender<Result<PropertyValue>>;
type PendingReplies = Arc<Mutex<HashMap<u64, ReplySender>>>;

pub struct IpcConnection {
    socket: PathBuf,
    writer: mpsc::Sender<String>,
    pending: PendingReplies,
    next_id: AtomicU64,
    closed: CancellationToken,
}

impl IpcConnection {
    /// Connect to the socket at `path` and start the reader and writer tasks.
    pub async fn open(path: &Path) -> Result<(Arc<Self>, EventStream)> {
        let stream = UnixStream::connect(path).await?;
        let (read_half, write_half) = stream.into_split();

        let (writer, write_rx) = mpsc::channel(WRITE_BUFFER);
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let pending: PendingReplies = Arc::new(Mutex::new(HashMap::new()));
        let closed = CancellationToken::new();

        tokio::spawn(read_loop(
            BufReader::new(read_half),
            pending.clone(),
            events_tx,
            closed.clone(),
        ));
        tokio::spawn(write_loop(write_half, write_rx, closed.clone()));

        debug!("Connected to player socket {}", path.display());

        let conn = Arc::new(Self {
            socket: path.to_path_buf(),
            writer,
            pending,
            next_id: AtomicU64::new(1),
            closed,
        });
        Ok((conn, events_rx))
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the connection is gone, whichever side closed it.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    /// Tear the connection down. Safe to call more than once.
    pub fn close(&self) {
        if !self.closed.is_cancelled() {
            debug!("Closing player socket {}", self.socket.display());
        }
        self.closed.cancel();
    }

    /// Send a command and wait for its reply.
    pub async fn call(&self, command: Vec<PropertyValue>) -> Result<PropertyValue> {
        if self.is_closed() {
            return Err(PlayerError::ConnectionClosed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending().insert(id, tx);

        // The reader may have drained the table between the check above and
        // the insert; nobody would ever answer this entry.
        if self.is_closed() {
            self.pending().remove(&id);
            return Err(PlayerError::ConnectionClosed);
        }

        trace!("-> [{}] {:?}", id, command);
        if self.writer.send(encode_request(id, &command)).await.is_err() {
            self.pending().remove(&id);
            return Err(PlayerError::ConnectionClosed);
        }

        tokio::select! {
            reply = rx => reply.unwrap_or(Err(PlayerError::ConnectionClosed)),
            _ = self.closed.cancelled() => {
                self.pending().remove(&id);
                Err(PlayerError::ConnectionClosed)
            }
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<u64, ReplySender>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for IpcConnection {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

async fn read_loop(
    mut reader: BufReader<OwnedReadHalf>,
    pending: PendingReplies,
    events: mpsc::Sender<Event>,
    closed: CancellationToken,
) {
    let mut line = String::new();

    loop {
        line.clear();
        tokio::select! {
            _ = closed.cancelled() => break,
            result = reader.read_line(&mut line) => match result {
                Ok(0) => {
                    debug!("Player socket reached EOF");
                    break;
                }
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match decode_message(trimmed) {
                        Ok(Message::Response(resp)) => {
                            let waiter = pending
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .remove(&resp.request_id);
                            match waiter {
                                Some(tx) => {
                                    if tx.send(resp.into_result()).is_err() {
                                        trace!("Caller gave up before its reply arrived");
                                    }
                                }
                                None => trace!("Unsolicited reply {}", resp.request_id),
                            }
                        }
                        Ok(Message::Event(event)) => {
                            trace!("<- event {}", event.name);
                            if events.send(event).await.is_err() {
                                trace!("Event stream dropped, discarding event");
                            }
                        }
                        Err(e) => warn!("Ignoring line from player: {}", e),
                    }
                }
                Err(e) => {
                    warn!("Player socket read failed: {}", e);
                    break;
                }
            }
        }
    }

    closed.cancel();

    let orphaned: Vec<ReplySender> = pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .drain()
        .map(|(_, tx)| tx)
        .collect();
    for tx in orphaned {
        if tx.send(Err(PlayerError::ConnectionClosed)).is_err() {
            trace!("Caller already gone at close");
        }
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut lines: mpsc::Receiver<String>,
    closed: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = closed.cancelled() => break,
            next = lines.recv() => match next {
                Some(line) => {
                    if let Err(e) = writer.write_all(line.as_bytes()).await {
                        warn!("Player socket write failed: {}", e);
                        closed.cancel();
                        break;
                    }
                }
                None => break,
            }
        }
    }

    if let Err(e) = writer.shutdown().await {
        trace!("Socket shutdown: {}", e);
    }
}
