//! Room Reveal Watcher
//!
//! Background poller that flips a one-way "credentials visible" flag when
//! the reveal window opens. The embedding view keeps the watcher alive
//! while it cares about the tournament and drops it afterwards; dropping
//! aborts the polling task.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::core::clock::Clock;
use crate::tournament::gate::check_room_reveal;
use crate::tournament::record::TournamentId;

/// Default evaluation cadence while the window is still closed.
pub const DEFAULT_POLL_INTERVAL: StdDuration = StdDuration::from_secs(1);

/// Handle to a running reveal poller.
#[derive(Debug)]
pub struct RevealWatcher {
    tournament_id: TournamentId,
    rx: watch::Receiver<bool>,
    handle: JoinHandle<()>,
}

impl RevealWatcher {
    /// Start polling. Must be called inside a tokio runtime.
    ///
    /// The first check runs immediately; later checks every
    /// `poll_interval`. Polling stops for good once the window is open.
    pub fn spawn(
        tournament_id: TournamentId,
        scheduled_start: DateTime<Utc>,
        reveal_window: Duration,
        poll_interval: StdDuration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (tx, rx) = watch::channel(false);
        let period = poll_interval.max(StdDuration::from_millis(1));
        let id = tournament_id.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if check_room_reveal(scheduled_start, reveal_window, clock.now()) {
                    info!(tournament = %id, "room credentials revealed");
                    tx.send_replace(true);
                    break;
                }
            }
            debug!(tournament = %id, "reveal watcher stopped");
        });

        Self { tournament_id, rx, handle }
    }

    /// Tournament being watched.
    pub fn tournament_id(&self) -> &TournamentId {
        &self.tournament_id
    }

    /// Current flag.
    pub fn is_revealed(&self) -> bool {
        *self.rx.borrow()
    }

    /// Another receiver for the flag.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }

    /// Wait until revealed. Returns `false` if the watcher was cancelled
    /// first.
    pub async fn wait_revealed(&self) -> bool {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return true;
        }
        let reached = rx.wait_for(|revealed| *revealed).await.is_ok();
        reached || *rx.borrow()
    }

    /// Whether the polling task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop polling now.
    pub fn cancel(self) {
        self.handle.abort();
    }
}

impl Drop for RevealWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
