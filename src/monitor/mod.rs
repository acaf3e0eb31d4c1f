//! Attribution of playback errors to track titles.
//!
//! The player assigns each queued file a slot id when it starts, and reports
//! failures by that id. Ids arrive asynchronously relative to the `loadfile`
//! that produced them and get reused, so the only correlation is a narrow
//! handoff: the dispatcher pushes each assigned id onto a bounded queue and
//! the loader claims one right after a successful load.
//!
//! Attribution is best effort. A title enqueued when no id is waiting is
//! simply not monitored, and an error for an unknown id is ignored.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace};

pub struct TrackMonitor {
    titles: Mutex<HashMap<i64, String>>,
    assigned: Mutex<mpsc::Receiver<i64>>,
}

impl TrackMonitor {
    pub(crate) fn new(assigned: mpsc::Receiver<i64>) -> Self {
        Self {
            titles: Mutex::new(HashMap::new()),
            assigned: Mutex::new(assigned),
        }
    }

    /// Pair `title` with the next assigned slot id, if one is waiting.
    ///
    /// Never blocks. Returns the claimed id.
    pub fn add_to_monitor(&self, title: &str) -> Option<i64> {
        let claimed = self
            .assigned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_recv();

        match claimed {
            Ok(id) => {
                trace!("Monitoring slot {} as {:?}", id, title);
                self.titles().insert(id, title.to_string());
                Some(id)
            }
            Err(_) => {
                trace!("No slot assigned yet, {:?} goes unmonitored", title);
                None
            }
        }
    }

    /// Forget every pairing. Slot ids are meaningless once the queue is
    /// cleared.
    pub fn clear_monitor(&self) {
        self.titles().clear();
    }

    /// Remove and return the title paired with `id`.
    pub fn take(&self, id: i64) -> Option<String> {
        self.titles().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.titles().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Turn failed slot ids into titles for the UI until the dispatcher goes
    /// away.
    pub(crate) fn spawn_drain(
        self: &Arc<Self>,
        mut error_slots: mpsc::Receiver<i64>,
        errors: mpsc::Sender<String>,
    ) {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(id) = error_slots.recv().await {
                let Some(title) = monitor.take(id) else {
                    trace!("Error for unmonitored slot {}", id);
                    continue;
                };
                match errors.try_send(title) {
                    Ok(()) => {}
                    Err(TrySendError::Full(title)) => {
                        debug!("Error for {:?} dropped, UI still busy", title)
                    }
                    Err(TrySendError::Closed(_)) => break,
                }
            }
        });
    }

    fn titles(&self) -> MutexGuard<'_, HashMap<i64, String>> {
        self.titles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
