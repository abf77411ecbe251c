use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use rand::Rng;
use tokio::sync::{Mutex, broadcast};
use tracing::{info, trace};
use uuid::Uuid;

use crate::{
    config::GameRules,
    device::IndicatorDriver,
    state::{
        game::{GameState, KeyCode, Pattern, PressOutcome, StatusSnapshot},
        state_machine::{RoundResult, StopReason, TickOutcome},
    },
};

/// Shared handle to the engine, passed to every component at construction.
pub type SharedGame = Arc<GameEngine>;

const EVENT_CAPACITY: usize = 32;

/// Supplies the next pattern for every round.
pub trait PatternSource: Send + Sync {
    /// Draw the pattern for the upcoming round.
    fn next_pattern(&self) -> Pattern;
}

/// Uniform draws over the eight possible patterns.
pub struct RandomPatterns;

impl PatternSource for RandomPatterns {
    fn next_pattern(&self) -> Pattern {
        Pattern::from_bits_truncate(rand::rng().random_range(0..8u8))
    }
}

/// Notifications published after every state change, once the lock is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new session began.
    Started(StatusSnapshot),
    /// A round was scored and the session goes on.
    Round {
        /// Score of the elapsed round.
        result: RoundResult,
        /// Figures after scoring.
        snapshot: StatusSnapshot,
    },
    /// The session ended.
    Stopped {
        /// Why it ended.
        reason: StopReason,
        /// Final figures.
        snapshot: StatusSnapshot,
    },
}

/// Result of asking the engine to start a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginOutcome {
    /// A new session is running; the scheduler must be armed with `generation`.
    Started {
        /// Generation the scheduler task belongs to.
        generation: u64,
        /// Figures right after the reset.
        snapshot: StatusSnapshot,
    },
    /// A session was already running; nothing changed.
    AlreadyRunning(StatusSnapshot),
    /// The engine is shutting down and accepts no new session.
    Closed,
}

/// Owner of the shared [`GameState`] and its exclusion.
///
/// Every critical section runs as a synchronous closure under one async mutex,
/// so no guard ever lives across an `.await`. The `running` mirror is refreshed
/// before each release and lets the non-blocking input path check for an
/// active session without taking the lock.
pub struct GameEngine {
    state: Mutex<GameState>,
    running: AtomicBool,
    indicators: Arc<dyn IndicatorDriver>,
    patterns: Box<dyn PatternSource>,
    rules: GameRules,
    events: broadcast::Sender<SessionEvent>,
}

impl GameEngine {
    /// Build an engine in the stopped state.
    pub fn new(
        rules: GameRules,
        indicators: Arc<dyn IndicatorDriver>,
        patterns: Box<dyn PatternSource>,
    ) -> SharedGame {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            state: Mutex::new(GameState::new()),
            running: AtomicBool::new(false),
            indicators,
            patterns,
            rules,
            events,
        })
    }

    /// Rules in effect.
    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    /// Lock-free view of the running flag. Only a hint: recheck under the lock.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Subscribe to [`SessionEvent`]s.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Run `f` with exclusive access to the game state.
    pub async fn with_state<T>(&self, f: impl FnOnce(&mut GameState) -> T) -> T {
        let mut guard = self.state.lock().await;
        let value = f(&mut guard);
        self.running.store(guard.is_running(), Ordering::Release);
        value
    }

    /// Reset the counters and enter the running state unless a session is active.
    pub async fn begin(&self) -> BeginOutcome {
        let outcome = self
            .with_state(|state| {
                if state.is_closed() {
                    return BeginOutcome::Closed;
                }
                if state.is_running() {
                    return BeginOutcome::AlreadyRunning(state.snapshot(&self.rules));
                }
                let generation = state.reset_for_session(Uuid::new_v4());
                self.command(state.live_pattern());
                BeginOutcome::Started {
                    generation,
                    snapshot: state.snapshot(&self.rules),
                }
            })
            .await;

        if let BeginOutcome::Started { snapshot, .. } = &outcome {
            info!(session = ?snapshot.session_id, "session started");
            self.publish(SessionEvent::Started(snapshot.clone()));
        }
        outcome
    }

    /// Score the elapsed round for session `generation` and draw the next pattern.
    pub async fn tick(&self, generation: u64) -> TickOutcome {
        let (outcome, snapshot) = self
            .with_state(|state| {
                if state.generation() != generation {
                    return (TickOutcome::Stale, None);
                }
                let outcome = state.advance(self.patterns.next_pattern(), &self.rules);
                match outcome {
                    TickOutcome::Continue { pattern, .. } => self.command(pattern),
                    TickOutcome::Stopped { .. } => self.command(Pattern::OFF),
                    TickOutcome::Stale => return (outcome, None),
                }
                (outcome, Some(state.snapshot(&self.rules)))
            })
            .await;

        let Some(snapshot) = snapshot else {
            return outcome;
        };
        match outcome {
            TickOutcome::Continue { result, .. } => {
                self.publish(SessionEvent::Round { result, snapshot });
            }
            TickOutcome::Stopped { reason, .. } => {
                info!(
                    ?reason,
                    hits = snapshot.hits,
                    misses = snapshot.misses,
                    level = snapshot.level,
                    "session over"
                );
                self.publish(SessionEvent::Stopped { reason, snapshot });
            }
            TickOutcome::Stale => {}
        }
        outcome
    }

    /// Apply one key press; a cleared indicator is pushed to the lights at once.
    pub async fn press(&self, key: KeyCode) -> PressOutcome {
        self.with_state(|state| {
            let outcome = state.press(key);
            if let PressOutcome::Cleared { pattern, .. } = outcome {
                self.command(pattern);
            }
            outcome
        })
        .await
    }

    /// Atomic snapshot of the externally visible figures.
    pub async fn status(&self) -> StatusSnapshot {
        self.with_state(|state| state.snapshot(&self.rules)).await
    }

    /// Display `pattern` only while no session runs and the engine is open.
    /// Returns whether it was shown.
    pub async fn show_when_idle(&self, pattern: Pattern) -> bool {
        self.with_state(|state| {
            if state.is_running() || state.is_closed() {
                return false;
            }
            self.command(pattern);
            true
        })
        .await
    }

    /// Refuse new sessions and stop the current one, turning the lights off.
    pub async fn close(&self) {
        let stopped = self
            .with_state(|state| {
                state.closed = true;
                let was_running = state.is_running();
                if was_running {
                    state.stop(StopReason::Shutdown);
                }
                self.command(Pattern::OFF);
                was_running.then(|| state.snapshot(&self.rules))
            })
            .await;

        if let Some(snapshot) = stopped {
            info!(session = ?snapshot.session_id, "session stopped by shutdown");
            self.publish(SessionEvent::Stopped {
                reason: StopReason::Shutdown,
                snapshot,
            });
        }
    }

    /// Force the lights off once every other context is quiet.
    pub async fn lights_off(&self) {
        self.with_state(|_| self.command(Pattern::OFF)).await;
    }

    /// Command the driver. Callers hold the state lock.
    fn command(&self, pattern: Pattern) {
        let elapsed = self.indicators.set_pattern(pattern);
        trace!(%pattern, elapsed_us = elapsed.as_micros() as u64, "indicators set");
    }

    fn publish(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}
