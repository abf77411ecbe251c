//! External collaborators: the indicator lights and the keypad that reports key presses.

/// WebSocket keypads and their indicator driver.
pub mod keypad;

use std::time::Duration;

use crate::state::game::Pattern;

/// Drives the physical indicator lights.
///
/// Implementations are best-effort and must never wait on the device: callers
/// hold the engine lock while commanding the lights.
pub trait IndicatorDriver: Send + Sync {
    /// Display `pattern`, returning the time spent doing so.
    fn set_pattern(&self, pattern: Pattern) -> Duration;
}
