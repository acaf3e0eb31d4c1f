#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]
//! Mock mpv for testing
//!
//! Listens on a Unix socket in a temporary directory and speaks the JSON IPC
//! protocol: one JSON object per line, replies carry the request id, events
//! are pushed to every connection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Mock player state
#[derive(Debug, Default)]
pub struct MockMpvState {
    /// Every command received, in order, without the request id.
    pub commands: Vec<Vec<Value>>,
    /// Property table for get/set. `playlist` and `playlist-count` are
    /// derived from `playlist` below.
    pub properties: HashMap<String, Value>,
    /// Filenames queued through `loadfile`.
    pub playlist: Vec<String>,
    /// Reject every `loadfile`.
    pub fail_loadfile: bool,
}

/// Mock mpv server
pub struct MockMpv {
    _dir: TempDir,
    socket: PathBuf,
    state: Arc<RwLock<MockMpvState>>,
    events: broadcast::Sender<String>,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl MockMpv {
    /// Start a mock player on a fresh socket
    pub async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("mpv.sock");
        Self::start_at(dir, socket).await
    }

    async fn start_at(dir: TempDir, socket: PathBuf) -> Self {
        let listener = UnixListener::bind(&socket).unwrap();
        let state = Arc::new(RwLock::new(MockMpvState::default()));
        let (events, _) = broadcast::channel(64);
        let shutdown = CancellationToken::new();

        let handle = {
            let state = state.clone();
            let events = events.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        accepted = listener.accept() => {
                            let Ok((stream, _)) = accepted else { break };
                            let conn = Connection {
                                state: state.clone(),
                                events: events.subscribe(),
                                shutdown: shutdown.clone(),
                            };
                            tokio::spawn(conn.serve(stream));
                        }
                    }
                }
            })
        };

        Self {
            _dir: dir,
            socket,
            state,
            events,
            shutdown,
            handle,
        }
    }

    /// Socket path clients connect to
    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// A socket path in the same directory that nothing listens on
    pub fn unused_socket(&self) -> PathBuf {
        self.socket.with_file_name("nobody.sock")
    }

    pub async fn set_property(&self, name: &str, value: Value) {
        self.state
            .write()
            .await
            .properties
            .insert(name.to_string(), value);
    }

    pub async fn remove_property(&self, name: &str) {
        self.state.write().await.properties.remove(name);
    }

    pub async fn property(&self, name: &str) -> Option<Value> {
        self.state.read().await.properties.get(name).cloned()
    }

    pub async fn set_fail_loadfile(&self, fail: bool) {
        self.state.write().await.fail_loadfile = fail;
    }

    pub async fn playlist(&self) -> Vec<String> {
        self.state.read().await.playlist.clone()
    }

    /// All received commands
    pub async fn commands(&self) -> Vec<Vec<Value>> {
        self.state.read().await.commands.clone()
    }

    /// Received commands whose name is `name`
    pub async fn commands_named(&self, name: &str) -> Vec<Vec<Value>> {
        self.state
            .read()
            .await
            .commands
            .iter()
            .filter(|c| c.first().and_then(Value::as_str) == Some(name))
            .cloned()
            .collect()
    }

    /// Wait until at least `count` commands named `name` have arrived
    pub async fn wait_for_commands(&self, name: &str, count: usize) -> Vec<Vec<Value>> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let seen = self.commands_named(name).await;
                if seen.len() >= count {
                    return seen;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {} x {}", count, name))
    }

    /// Push an event to every connected client
    pub fn emit(&self, event: Value) {
        self.events
            .send(format!("{}\n", event))
            .expect("no client connected");
    }

    /// Close every connection and stop accepting
    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.handle.await;
    }
}

struct Connection {
    state: Arc<RwLock<MockMpvState>>,
    events: broadcast::Receiver<String>,
    shutdown: CancellationToken,
}

impl Connection {
    async fn serve(mut self, stream: UnixStream) {
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                line = lines.next_line() => {
                    let Ok(Some(line)) = line else { break };
                    let (reply, quit) = self.process(&line).await;
                    if writer.write_all(reply.as_bytes()).await.is_err() {
                        break;
                    }
                    if quit {
                        break;
                    }
                }
                event = self.events.recv() => match event {
                    Ok(event) => {
                        if writer.write_all(event.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    }

    /// Returns the reply line and whether to hang up after sending it
    async fn process(&self, line: &str) -> (String, bool) {
        let request: Value = serde_json::from_str(line).unwrap();
        let request_id = request["request_id"].clone();
        let command = request["command"].as_array().cloned().unwrap_or_default();
        let name = command
            .first()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let result = {
            let mut state = self.state.write().await;
            state.commands.push(command.clone());
            execute(&mut state, &name, command.get(1..).unwrap_or_default())
        };

        let reply = match result {
            Ok(data) => json!({"request_id": request_id, "error": "success", "data": data}),
            Err(error) => json!({"request_id": request_id, "error": error}),
        };
        (format!("{}\n", reply), name == "quit")
    }
}

fn execute(state: &mut MockMpvState, name: &str, args: &[Value]) -> Result<Value, &'static str> {
    match name {
        "get_property" => get_property(state, arg_str(args, 0)),
        "get_property_string" => {
            get_property(state, arg_str(args, 0)).map(|v| Value::String(property_string(&v)))
        }
        "set_property" => {
            let value = args.get(1).cloned().unwrap_or(Value::Null);
            state.properties.insert(arg_str(args, 0).to_string(), value);
            Ok(Value::Null)
        }
        "cycle" => {
            let prop = arg_str(args, 0).to_string();
            let current = state
                .properties
                .get(&prop)
                .and_then(Value::as_bool)
                .unwrap_or(false);
            state.properties.insert(prop, Value::Bool(!current));
            Ok(Value::Null)
        }
        "loadfile" => {
            if state.fail_loadfile {
                return Err("error running command");
            }
            if arg_str(args, 1) == "replace" {
                state.playlist.clear();
            }
            state.playlist.push(arg_str(args, 0).to_string());
            Ok(json!({"playlist_entry_id": state.playlist.len()}))
        }
        "playlist-clear" => {
            state.playlist.clear();
            Ok(Value::Null)
        }
        "playlist-remove" => {
            if let Some(index) = args.first().and_then(Value::as_u64) {
                let index = index as usize;
                if index >= state.playlist.len() {
                    return Err("invalid parameter");
                }
                state.playlist.remove(index);
            }
            Ok(Value::Null)
        }
        "playlist-move" => {
            let from = args.first().and_then(Value::as_u64).unwrap_or(0) as usize;
            let to = args.get(1).and_then(Value::as_u64).unwrap_or(0) as usize;
            if from >= state.playlist.len() {
                return Err("invalid parameter");
            }
            // The entry takes the place of the one at `to`
            let entry = state.playlist.remove(from);
            let to = if from < to { to - 1 } else { to };
            let to = to.min(state.playlist.len());
            state.playlist.insert(to, entry);
            Ok(Value::Null)
        }
        _ => Ok(Value::Null),
    }
}

fn get_property(state: &MockMpvState, name: &str) -> Result<Value, &'static str> {
    match name {
        "playlist-count" => Ok(json!(state.playlist.len())),
        "playlist" => Ok(Value::Array(
            state
                .playlist
                .iter()
                .map(|f| json!({"filename": f}))
                .collect(),
        )),
        _ => state
            .properties
            .get(name)
            .cloned()
            .ok_or("property unavailable"),
    }
}

/// mpv's own string form of a property
fn property_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "yes".to_string(),
        Value::Bool(false) => "no".to_string(),
        other => other.to_string(),
    }
}

fn arg_str(args: &[Value], index: usize) -> &str {
    args.get(index).and_then(Value::as_str).unwrap_or_default()
}
