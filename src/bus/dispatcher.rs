//! Sole reader of the player's event stream.
//!
//! Each event is routed synchronously with `try_send`; anything that needs a
//! round trip to the player is spawned off so the read loop never waits on a
//! reply.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, trace};

use super::{DispatchSenders, PLAYLIST_OBSERVER_ID};
use crate::ipc::{Event, EventStream, IpcConnection, PropertyValue};
use crate::queue::QueueEntry;

/// Read events until the stream ends, then close the connection.
pub(crate) async fn run(
    connection: Arc<IpcConnection>,
    mut events: EventStream,
    senders: DispatchSenders,
) {
    let observe = vec![
        PropertyValue::from("observe_property"),
        PropertyValue::from(PLAYLIST_OBSERVER_ID),
        PropertyValue::from("playlist"),
    ];
    if let Err(e) = connection.call(observe).await {
        debug!("Could not observe playlist: {}", e);
    }

    while let Some(event) = events.recv().await {
        dispatch(&connection, &senders, event);
    }

    info!("Player event stream ended");
    connection.close();
}

pub(crate) fn dispatch(connection: &Arc<IpcConnection>, senders: &DispatchSenders, event: Event) {
    if event.id == Some(PLAYLIST_OBSERVER_ID) {
        if let Ok(items) = event.data.as_array() {
            let entries = items
                .iter()
                .enumerate()
                .map(|(position, item)| QueueEntry::from_properties(position, item))
                .collect::<Vec<_>>();
            trace!("Playlist changed ({} entries)", entries.len());
            senders.playlist.send_replace(entries);
            return;
        }
    }

    match event.name.as_str() {
        "start-file" => {
            cycle_pause(connection.clone());

            if let Some(id) = event.extra_i64("playlist_entry_id") {
                offer(&senders.assigned_slots, id, "assigned slot");
            }
        }
        "end-file" => {
            let failed = event
                .extra_str("file_error")
                .is_some_and(|err| !err.is_empty());
            if failed {
                if let Some(id) = event.extra_i64("playlist_entry_id") {
                    debug!(
                        "Entry {} failed: {}",
                        id,
                        event.extra_str("file_error").unwrap_or_default()
                    );
                    offer(&senders.error_slots, id, "error slot");
                }
            }
        }
        "file-loaded" => offer(&senders.now_playing, (), "now playing"),
        _ => {}
    }
}

/// Pause then unpause. Works around a frozen first frame when a stream
/// starts.
fn cycle_pause(connection: Arc<IpcConnection>) {
    tokio::spawn(async move {
        for paused in [true, false] {
            let command = vec!["set_property".into(), "pause".into(), paused.into()];
            if let Err(e) = connection.call(command).await {
                trace!("pause={}: {}", paused, e);
                return;
            }
        }
    });
}

fn offer<T>(tx: &tokio::sync::mpsc::Sender<T>, value: T, what: &str) {
    match tx.try_send(value) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => trace!("{} queue full, dropping", what),
        Err(TrySendError::Closed(_)) => trace!("{} queue closed", what),
    }
}
