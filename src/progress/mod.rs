//! Periodic progress refresh.
//!
//! A supervisor task reads playing/stopped intents from a single-slot
//! channel. `true` starts a refresh loop if none is running, `false` cancels
//! it, and closing the channel shuts the supervisor down.
//!
//! Each refresh loop re-queries the player on a fixed period or whenever a
//! refresh is requested, whichever comes first; a requested refresh also
//! restarts the period so it is not followed by a redundant tick. When a
//! query fails (usually because the queue emptied) the loop cancels itself,
//! clears the display and raises the hide signal.

pub mod format;

pub use format::{bar_fill, format_duration, render, ProgressSnapshot, StatusSnapshot};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{PlayerError, Result};
use crate::queue::UrlMetadata;
use crate::session::Session;
use crate::surface::Surface;

/// Default refresh period.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

/// Why the scheduler woke up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Tick,
    Refresh,
}

/// Timer plus a coalesced wake signal. A wake restarts the timer.
pub struct RefreshScheduler {
    interval: Interval,
    wake: Arc<Notify>,
}

impl RefreshScheduler {
    /// The first tick fires one period after start, so a queue that was just
    /// loaded has time to report a playing position.
    pub fn new(period: Duration, wake: Arc<Notify>) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, wake }
    }

    pub async fn next(&mut self) -> Trigger {
        tokio::select! {
            _ = self.interval.tick() => Trigger::Tick,
            _ = self.wake.notified() => {
                self.interval.reset();
                Trigger::Refresh
            }
        }
    }
}

/// Handle for starting, stopping and poking the refresh loop.
#[derive(Clone)]
pub struct ProgressController {
    intents: mpsc::Sender<bool>,
    refresh: Arc<Notify>,
}

/// Outputs of the refresh loop.
pub struct ProgressOutputs {
    /// Raised whenever a refresh loop ends.
    pub hide: mpsc::Receiver<()>,
    /// Latest rendered snapshot, `None` while stopped.
    pub snapshots: watch::Receiver<Option<ProgressSnapshot>>,
}

#[derive(Clone)]
struct LoopContext {
    session: Session,
    surface: Arc<dyn Surface>,
    period: Duration,
    refresh: Arc<Notify>,
    hide: mpsc::Sender<()>,
    snapshots: watch::Sender<Option<ProgressSnapshot>>,
}

impl ProgressController {
    /// Start the supervisor. It runs until every controller clone is dropped.
    pub fn spawn(
        session: Session,
        surface: Arc<dyn Surface>,
        period: Duration,
    ) -> (Self, ProgressOutputs) {
        let (intents_tx, intents_rx) = mpsc::channel(1);
        let (hide_tx, hide_rx) = mpsc::channel(1);
        let (snapshots_tx, snapshots_rx) = watch::channel(None);
        let refresh = Arc::new(Notify::new());

        let ctx = LoopContext {
            session,
            surface,
            period,
            refresh: refresh.clone(),
            hide: hide_tx,
            snapshots: snapshots_tx,
        };
        tokio::spawn(supervise(intents_rx, ctx));

        (
            Self {
                intents: intents_tx,
                refresh,
            },
            ProgressOutputs {
                hide: hide_rx,
                snapshots: snapshots_rx,
            },
        )
    }

    /// Start (`true`) or stop (`false`) the refresh loop.
    pub async fn set_playing(&self, playing: bool) {
        if self.intents.send(playing).await.is_err() {
            debug!("Progress supervisor gone, ignoring playing={}", playing);
        }
    }

    /// Refresh now instead of waiting for the next tick. Repeated requests
    /// before the loop wakes count once.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }
}

async fn supervise(mut intents: mpsc::Receiver<bool>, ctx: LoopContext) {
    let mut running: Option<CancellationToken> = None;

    while let Some(playing) = intents.recv().await {
        if !playing {
            if let Some(token) = running.take() {
                trace!("Stopping progress loop");
                token.cancel();
            }
            continue;
        }

        if running.as_ref().is_some_and(|t| !t.is_cancelled()) {
            continue;
        }

        trace!("Starting progress loop");
        let token = CancellationToken::new();
        tokio::spawn(run_loop(ctx.clone(), token.clone()));
        running = Some(token);
    }

    if let Some(token) = running {
        token.cancel();
    }
    debug!("Progress supervisor stopped");
}

async fn run_loop(ctx: LoopContext, token: CancellationToken) {
    let mut scheduler = RefreshScheduler::new(ctx.period, ctx.refresh.clone());

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            trigger = scheduler.next() => {
                trace!("Progress refresh ({:?})", trigger);
                match query_status(&ctx.session).await {
                    Ok(status) => {
                        let snapshot = render(&status, ctx.surface.progress_width());
                        ctx.surface.render_title(&snapshot.title);
                        ctx.surface.render_progress(&snapshot.line);
                        ctx.snapshots.send_replace(Some(snapshot));
                    }
                    Err(e) => {
                        debug!("Progress query failed, stopping: {}", e);
                        token.cancel();
                    }
                }
            }
        }
    }

    ctx.surface.render_title("");
    ctx.surface.render_progress("");
    ctx.snapshots.send_replace(None);
    match ctx.hide.try_send(()) {
        Ok(()) | Err(TrySendError::Full(())) => {}
        Err(TrySendError::Closed(())) => trace!("Nobody listening for hide"),
    }
}

/// Gather everything the progress line needs. Fails only when there is no
/// playing entry or the player cannot be reached.
pub async fn query_status(session: &Session) -> Result<StatusSnapshot> {
    let position = session
        .try_queue_position()
        .await?
        .ok_or(PlayerError::EmptyQueue)?;
    let filename = session.title(position).await;

    let (finished, paused, buffering, shuffled, muted, loop_mode, volume, duration, elapsed) = tokio::join!(
        session.finished(),
        session.paused(),
        session.buffering(),
        session.shuffled(),
        session.muted(),
        session.loop_mode(),
        session.volume(),
        session.duration(),
        session.position(),
    );

    let media_kind = match UrlMetadata::from_filename(&filename).media_kind {
        Some(kind) => kind,
        None => session.media_type().await,
    };

    Ok(StatusSnapshot {
        filename,
        finished,
        paused,
        buffering,
        shuffled,
        muted,
        loop_mode,
        volume,
        position: elapsed,
        duration,
        media_kind,
    })
}
