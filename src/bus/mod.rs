//! Hand-off queues between the event dispatcher and its consumers.
//!
//! Every queue is bounded and the dispatcher only ever uses non-blocking
//! sends, so a slow consumer can never stall the socket reader:
//!
//! | queue          | kind            | capacity              | consumer          |
//! |----------------|-----------------|-----------------------|-------------------|
//! | playlist       | `watch`         | latest value          | UI                |
//! | assigned slots | `mpsc`          | [`MAX_IN_FLIGHT_LOADS`] | track monitor   |
//! | error slots    | `mpsc`          | [`MAX_IN_FLIGHT_LOADS`] | monitor drain   |
//! | errors         | `mpsc`          | 1                     | UI                |
//! | now playing    | `mpsc`          | 1                     | UI                |

pub mod dispatcher;

use tokio::sync::{mpsc, watch};

use crate::queue::QueueEntry;

/// Observer id used for the playlist subscription.
pub const PLAYLIST_OBSERVER_ID: i64 = 1;

/// Upper bound on loads that can be waiting for the player to assign them a
/// slot id. Slot ids beyond this many unclaimed assignments are dropped and
/// their titles go unmonitored.
pub const MAX_IN_FLIGHT_LOADS: usize = 100;

/// Notifications for the UI layer.
pub struct PlayerEvents {
    /// Current play queue, replaced wholesale on every change.
    pub playlist: watch::Receiver<Vec<QueueEntry>>,
    /// Ticks when a file finished loading. Bursts coalesce into one.
    pub now_playing: mpsc::Receiver<()>,
    /// Title of the most recent entry that failed to play.
    pub errors: mpsc::Receiver<String>,
}

/// Sending halves owned by the dispatcher.
pub(crate) struct DispatchSenders {
    pub playlist: watch::Sender<Vec<QueueEntry>>,
    pub assigned_slots: mpsc::Sender<i64>,
    pub error_slots: mpsc::Sender<i64>,
    pub now_playing: mpsc::Sender<()>,
}

/// Both ends of every queue, before they are handed to their owners.
pub(crate) struct Wiring {
    pub dispatch: DispatchSenders,
    pub assigned_slots: mpsc::Receiver<i64>,
    pub error_slots: mpsc::Receiver<i64>,
    pub errors: mpsc::Sender<String>,
    pub events: PlayerEvents,
}

pub(crate) fn wire() -> Wiring {
    let (playlist_tx, playlist_rx) = watch::channel(Vec::new());
    let (assigned_tx, assigned_rx) = mpsc::channel(MAX_IN_FLIGHT_LOADS);
    let (error_slot_tx, error_slot_rx) = mpsc::channel(MAX_IN_FLIGHT_LOADS);
    let (errors_tx, errors_rx) = mpsc::channel(1);
    let (now_playing_tx, now_playing_rx) = mpsc::channel(1);

    Wiring {
        dispatch: DispatchSenders {
            playlist: playlist_tx,
            assigned_slots: assigned_tx,
            error_slots: error_slot_tx,
            now_playing: now_playing_tx,
        },
        assigned_slots: assigned_rx,
        error_slots: error_slot_rx,
        errors: errors_tx,
        events: PlayerEvents {
            playlist: playlist_rx,
            now_playing: now_playing_rx,
            errors: errors_rx,
        },
    }
}
