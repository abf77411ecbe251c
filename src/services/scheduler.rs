use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, warn};

use crate::state::{SharedGame, state_machine::TickOutcome};

/// Single re-arming round timer.
///
/// One task per session sleeps for the current round interval, ticks the
/// engine, and re-arms with the interval the tick returned until the session
/// stops. Cancelling the task is safe at any point because the engine never
/// holds its lock across an `.await`.
///
/// Arming is synchronous so a session committed by the engine always gets its
/// timer in the same poll, even if the caller's future is dropped right after.
pub struct Scheduler {
    game: SharedGame,
    timer: Mutex<TimerSlot>,
}

#[derive(Default)]
struct TimerSlot {
    handle: Option<JoinHandle<()>>,
    closed: bool,
}

impl Scheduler {
    /// Create an idle scheduler driving `game`.
    pub fn new(game: SharedGame) -> Self {
        Self {
            game,
            timer: Mutex::new(TimerSlot::default()),
        }
    }

    /// Schedule the first tick of session `generation` after `delay`.
    ///
    /// Returns `false` once the scheduler has been shut down.
    pub fn arm(&self, generation: u64, delay: Duration) -> bool {
        let mut slot = self.slot();
        if slot.closed {
            return false;
        }
        if let Some(previous) = slot.handle.take() {
            previous.abort();
        }
        slot.handle = Some(tokio::spawn(run_rounds(self.game.clone(), generation, delay)));
        true
    }

    /// Whether a round timer is still pending.
    pub fn is_armed(&self) -> bool {
        self.slot()
            .handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Refuse further arming, cancel the pending timer and wait until it has fully stopped.
    pub async fn shutdown(&self) {
        let handle = {
            let mut slot = self.slot();
            slot.closed = true;
            slot.handle.take()
        };

        let Some(handle) = handle else {
            return;
        };
        handle.abort();
        match handle.await {
            Ok(()) => {}
            Err(err) if err.is_cancelled() => {}
            Err(err) => warn!(error = %err, "round timer task failed"),
        }
        debug!("round timer stopped");
    }

    // The slot holds no invariant a panic could break, so a poisoned lock is still usable.
    fn slot(&self) -> MutexGuard<'_, TimerSlot> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_rounds(game: SharedGame, generation: u64, mut delay: Duration) {
    loop {
        sleep(delay).await;
        match game.tick(generation).await {
            TickOutcome::Continue { interval, .. } => delay = interval,
            TickOutcome::Stopped { .. } | TickOutcome::Stale => break,
        }
    }
    debug!(generation, "round timer finished");
}
