use std::sync::atomic::{AtomicBool, Ordering};

use tokio::{
    sync::{
        Mutex,
        mpsc::{self, error::TrySendError},
        watch,
    },
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::state::{
    SharedGame,
    game::{KeyCode, PressOutcome},
};

/// Keys that may wait for the deferred worker; one is enough to know a key arrived.
const PENDING_KEYS: usize = 1;

/// What the immediate path did with a raw key notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// No session is running (or input is disabled); the key is not ours.
    Ignored,
    /// Handed to the deferred worker.
    Deferred,
    /// A key was already pending; this one was discarded.
    Dropped,
}

/// Two-phase key handling.
///
/// [`InputHandler::notify`] is the immediate path: it never locks, never
/// waits and only hands the key over. A worker task does the matching under
/// the engine lock.
pub struct InputHandler {
    game: SharedGame,
    enabled: AtomicBool,
    pending: mpsc::Sender<KeyCode>,
    stop: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl InputHandler {
    /// Start the deferred worker for `game`.
    pub fn spawn(game: SharedGame) -> Self {
        let (pending, keys) = mpsc::channel(PENDING_KEYS);
        let (stop, stop_rx) = watch::channel(false);
        let worker = tokio::spawn(run_deferred(game.clone(), keys, stop_rx));

        Self {
            game,
            enabled: AtomicBool::new(true),
            pending,
            stop,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Immediate path for a raw key notification. O(1), never blocks.
    pub fn notify(&self, key: KeyCode) -> Notification {
        if !self.enabled.load(Ordering::Acquire) || !self.game.is_running() {
            return Notification::Ignored;
        }

        match self.pending.try_send(key) {
            Ok(()) => Notification::Deferred,
            Err(TrySendError::Full(_)) => {
                debug!(scancode = key.0, "key already pending; dropping");
                Notification::Dropped
            }
            Err(TrySendError::Closed(_)) => Notification::Ignored,
        }
    }

    /// Stop accepting notifications. Already deferred keys are still handled.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    /// Disable input and wait for the worker to finish the key it is handling.
    pub async fn shutdown(&self) {
        self.disable();
        let _ = self.stop.send(true);

        let Some(worker) = self.worker.lock().await.take() else {
            return;
        };
        if let Err(err) = worker.await {
            warn!(error = %err, "deferred input worker failed");
        }
        debug!("deferred input worker stopped");
    }
}

async fn run_deferred(
    game: SharedGame,
    mut keys: mpsc::Receiver<KeyCode>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => break,
            key = keys.recv() => match key {
                Some(key) => handle_key(&game, key).await,
                None => break,
            },
        }
    }
}

/// Deferred path: match the key against the live pattern under the engine lock.
async fn handle_key(game: &SharedGame, key: KeyCode) {
    match game.press(key).await {
        PressOutcome::Cleared { indicator, pattern } => {
            debug!(scancode = key.0, ?indicator, %pattern, "indicator cleared");
        }
        PressOutcome::Extra { extra_presses } => {
            debug!(scancode = key.0, extra_presses, "extra key press");
        }
        PressOutcome::Ignored => {
            debug!(scancode = key.0, "key arrived after the session stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::GameRules,
        state::{
            BeginOutcome,
            engine::testing::{ScriptedPatterns, engine},
            game::Pattern,
        },
    };

    async fn running(bits: u8) -> (SharedGame, u64) {
        let (game, _) = engine(GameRules::default(), ScriptedPatterns::new(&[bits], 0));
        let BeginOutcome::Started { generation, .. } = game.begin().await else {
            panic!("session did not start");
        };
        game.tick(generation).await;
        (game, generation)
    }

    async fn settle<F>(game: &SharedGame, mut done: F)
    where
        F: FnMut(&crate::state::game::GameState) -> bool,
    {
        for _ in 0..200 {
            if game.with_state(|state| done(state)).await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("state never settled");
    }

    #[tokio::test]
    async fn keys_are_ignored_without_a_session() {
        let (game, _) = engine(GameRules::default(), ScriptedPatterns::new(&[], 0));
        let input = InputHandler::spawn(game);
        assert_eq!(input.notify(KeyCode(0x02)), Notification::Ignored);
    }

    #[tokio::test]
    async fn deferred_key_clears_the_matching_indicator() {
        let (game, _) = running(0b101).await;
        let input = InputHandler::spawn(game.clone());

        assert_eq!(input.notify(KeyCode(0x04)), Notification::Deferred);
        settle(&game, |state| {
            state.live_pattern() == Pattern::from_bits_truncate(0b001)
        })
        .await;
    }

    #[tokio::test]
    async fn deferred_stray_key_is_counted() {
        let (game, _) = running(0b001).await;
        let input = InputHandler::spawn(game.clone());

        assert_eq!(input.notify(KeyCode(0x03)), Notification::Deferred);
        settle(&game, |state| state.extra_presses() == 1).await;
    }

    #[tokio::test]
    async fn only_one_key_waits_at_a_time() {
        let (game, _) = running(0b111).await;
        let input = InputHandler::spawn(game.clone());

        // Single-threaded runtime: the worker cannot run between these calls.
        assert_eq!(input.notify(KeyCode(0x02)), Notification::Deferred);
        assert_eq!(input.notify(KeyCode(0x03)), Notification::Dropped);

        settle(&game, |state| {
            state.live_pattern() == Pattern::from_bits_truncate(0b110)
        })
        .await;
        assert_eq!(input.notify(KeyCode(0x03)), Notification::Deferred);
        settle(&game, |state| {
            state.live_pattern() == Pattern::from_bits_truncate(0b100)
        })
        .await;
    }

    #[tokio::test]
    async fn shutdown_disables_the_immediate_path_and_stops_the_worker() {
        let (game, _) = running(0b111).await;
        let input = InputHandler::spawn(game.clone());

        input.shutdown().await;
        assert_eq!(input.notify(KeyCode(0x02)), Notification::Ignored);
        assert!(input.worker.lock().await.is_none());
        assert_eq!(game.with_state(|state| state.live_pattern()).await, Pattern::ALL);
    }

    #[tokio::test]
    async fn key_deferred_before_stop_is_a_no_op_after_it() {
        let (game, _) = running(0b111).await;
        let input = InputHandler::spawn(game.clone());

        assert_eq!(input.notify(KeyCode(0x02)), Notification::Deferred);
        // The session ends before the worker gets to run.
        game.close().await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        let state = game.with_state(|state| state.clone()).await;
        assert_eq!(state.live_pattern(), Pattern::OFF);
        assert_eq!(state.extra_presses(), 0);
    }
}
