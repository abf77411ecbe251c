//! Keypads connected over WebSocket: the registry and the indicator driver that lights them.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
    time::{Duration, Instant},
};

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::{device::IndicatorDriver, state::game::Pattern};

/// Control frames (pong, close) queued per keypad.
pub const KEYPAD_QUEUE_CAPACITY: usize = 8;

/// Handle used to push messages to a connected keypad.
pub struct KeypadConnection {
    /// Identifier announced by the keypad.
    pub id: String,
    /// Bounded queue of control frames drained by the socket writer task.
    pub tx: mpsc::Sender<Message>,
    /// Pattern the keypad must show. The writer only ever sends the latest value.
    pub indicators: watch::Sender<Pattern>,
}

/// Connected keypads keyed by their identifier.
pub type KeypadRegistry = Arc<DashMap<String, KeypadConnection>>;

/// Indicator driver that mirrors the pattern onto every connected keypad.
///
/// Publishing never waits on a socket: each keypad has a single-slot `watch`
/// that its writer drains, so a slow keypad skips stale patterns instead of
/// holding up the engine lock.
pub struct KeypadIndicators {
    keypads: KeypadRegistry,
    last: AtomicU8,
    ceiling: Duration,
}

impl KeypadIndicators {
    /// Build a driver over `keypads`; calls slower than `ceiling` are logged.
    pub fn new(keypads: KeypadRegistry, ceiling: Duration) -> Self {
        Self {
            keypads,
            last: AtomicU8::new(Pattern::OFF.bits()),
            ceiling,
        }
    }

    /// Most recently commanded pattern, replayed to keypads when they connect.
    pub fn last_pattern(&self) -> Pattern {
        Pattern::from_bits_truncate(self.last.load(Ordering::Acquire))
    }

    /// Registry the driver writes to.
    pub fn keypads(&self) -> &KeypadRegistry {
        &self.keypads
    }
}

impl IndicatorDriver for KeypadIndicators {
    fn set_pattern(&self, pattern: Pattern) -> Duration {
        let started = Instant::now();
        self.last.store(pattern.bits(), Ordering::Release);

        self.keypads.retain(|id, keypad| {
            if keypad.indicators.send(pattern).is_ok() {
                return true;
            }
            debug!(keypad = %id, "keypad writer gone; unregistering");
            false
        });

        let elapsed = started.elapsed();
        if elapsed > self.ceiling {
            warn!(
                %pattern,
                elapsed_us = elapsed.as_micros() as u64,
                ceiling_ms = self.ceiling.as_millis() as u64,
                "setting indicators took longer than the ceiling"
            );
        }
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> KeypadIndicators {
        KeypadIndicators::new(Arc::new(DashMap::new()), Duration::from_millis(10))
    }

    fn register(driver: &KeypadIndicators, id: &str) -> watch::Receiver<Pattern> {
        let (tx, _rx) = mpsc::channel(1);
        let (indicators, rx) = watch::channel(Pattern::OFF);
        driver.keypads().insert(
            id.to_string(),
            KeypadConnection {
                id: id.to_string(),
                tx,
                indicators,
            },
        );
        rx
    }

    #[test]
    fn remembers_last_pattern_without_keypads() {
        let driver = driver();
        driver.set_pattern(Pattern::from_bits_truncate(0b101));
        assert_eq!(driver.last_pattern(), Pattern::from_bits_truncate(0b101));
    }

    #[test]
    fn pushes_pattern_to_every_keypad() {
        let driver = driver();
        let mut first = register(&driver, "first");
        let mut second = register(&driver, "second");

        driver.set_pattern(Pattern::from_bits_truncate(0b011));

        for rx in [&mut first, &mut second] {
            assert!(rx.has_changed().unwrap());
            assert_eq!(*rx.borrow_and_update(), Pattern::from_bits_truncate(0b011));
        }
    }

    #[test]
    fn slow_keypad_only_sees_the_latest_pattern() {
        let driver = driver();
        let mut slow = register(&driver, "slow");

        for bits in 0..8 {
            driver.set_pattern(Pattern::from_bits_truncate(bits));
        }

        assert_eq!(*slow.borrow_and_update(), Pattern::from_bits_truncate(7));
        assert!(!slow.has_changed().unwrap());
        assert!(driver.keypads().contains_key("slow"));
    }

    #[test]
    fn closed_keypad_is_unregistered() {
        let driver = driver();
        drop(register(&driver, "gone"));
        driver.set_pattern(Pattern::ALL);
        assert!(!driver.keypads().contains_key("gone"));
    }
}
