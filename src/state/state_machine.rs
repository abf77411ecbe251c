use std::time::Duration;

use crate::{
    config::GameRules,
    state::game::{GameState, Pattern},
};

/// Indicates why a session left the running phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Missed rounds reached the configured limit.
    MissLimit,
    /// The operator reached the final level.
    LevelLimit,
    /// The process is shutting down.
    Shutdown,
}

/// How the round that just elapsed was scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundResult {
    /// Every lit indicator was cleared and no stray key was pressed.
    Hit,
    /// Something was left lit, or a stray key was pressed.
    Miss,
}

/// What a scheduler tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The session goes on with a freshly drawn pattern.
    Continue {
        /// Score of the round that just elapsed.
        result: RoundResult,
        /// Pattern the operator must clear next.
        pattern: Pattern,
        /// Delay before the next tick.
        interval: Duration,
    },
    /// The round pushed the session over a limit.
    Stopped {
        /// Score of the round that just elapsed.
        result: RoundResult,
        /// Limit that was reached.
        reason: StopReason,
    },
    /// The session this tick belonged to is no longer running.
    Stale,
}

impl GameState {
    /// Score the elapsed round and install `next` as the live pattern.
    ///
    /// The round is judged on the pattern being replaced, not on `next`.
    pub fn advance(&mut self, next: Pattern, rules: &GameRules) -> TickOutcome {
        if !self.running {
            return TickOutcome::Stale;
        }

        let previous = self.live_pattern;
        self.live_pattern = next;

        let result = if !previous.is_clear() || self.extra_presses > 0 {
            self.misses += 1;
            if self.misses >= rules.miss_limit {
                self.stop(StopReason::MissLimit);
                return TickOutcome::Stopped {
                    result: RoundResult::Miss,
                    reason: StopReason::MissLimit,
                };
            }
            RoundResult::Miss
        } else {
            self.hits += 1;
            self.level = self.hits / rules.hits_per_level;
            if self.level >= rules.level_limit {
                self.stop(StopReason::LevelLimit);
                return TickOutcome::Stopped {
                    result: RoundResult::Hit,
                    reason: StopReason::LevelLimit,
                };
            }
            RoundResult::Hit
        };
        self.extra_presses = 0;

        TickOutcome::Continue {
            result,
            pattern: self.live_pattern,
            interval: rules.interval(self.level),
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::state::game::{KeyCode, PressOutcome};

    fn started() -> GameState {
        let mut state = GameState::new();
        state.reset_for_session(Uuid::new_v4());
        state
    }

    fn pattern(bits: u8) -> Pattern {
        Pattern::from_bits_truncate(bits)
    }

    /// Clear every lit indicator with its assigned key.
    fn clear_all(state: &mut GameState) {
        for key in [KeyCode(0x02), KeyCode(0x03), KeyCode(0x04)] {
            if let Some(indicator) = crate::state::game::indicator_for(key) {
                if state.live_pattern().contains(indicator) {
                    assert!(matches!(state.press(key), PressOutcome::Cleared { .. }));
                }
            }
        }
    }

    #[test]
    fn initial_state_is_stopped() {
        let state = GameState::new();
        assert!(!state.is_running());
        assert_eq!(state.live_pattern(), Pattern::OFF);
    }

    #[test]
    fn idle_ticks_miss_until_limit_then_stop() {
        let rules = GameRules::default();
        let mut state = started();

        // First tick scores the empty start round as a hit.
        assert!(matches!(
            state.advance(pattern(0b001), &rules),
            TickOutcome::Continue {
                result: RoundResult::Hit,
                ..
            }
        ));

        for expected in 1..rules.miss_limit {
            let outcome = state.advance(pattern(0b001), &rules);
            assert!(matches!(
                outcome,
                TickOutcome::Continue {
                    result: RoundResult::Miss,
                    ..
                }
            ));
            assert_eq!(state.misses(), expected);
        }

        let outcome = state.advance(pattern(0b001), &rules);
        assert_eq!(
            outcome,
            TickOutcome::Stopped {
                result: RoundResult::Miss,
                reason: StopReason::MissLimit,
            }
        );
        assert_eq!(state.misses(), rules.miss_limit);
        assert!(!state.is_running());
        assert_eq!(state.live_pattern(), Pattern::OFF);

        assert_eq!(state.advance(pattern(0b111), &rules), TickOutcome::Stale);
        assert_eq!(state.misses(), rules.miss_limit);
        assert_eq!(state.live_pattern(), Pattern::OFF);
    }

    #[test]
    fn perfect_play_climbs_levels_until_limit() {
        let rules = GameRules::default();
        let mut state = started();
        let total = rules.hits_per_level * rules.level_limit;

        for round in 1..total {
            let outcome = state.advance(pattern((round % 8) as u8), &rules);
            let TickOutcome::Continue {
                result, interval, ..
            } = outcome
            else {
                panic!("session stopped early at round {round}: {outcome:?}");
            };
            assert_eq!(result, RoundResult::Hit);
            assert_eq!(state.hits(), round);
            assert_eq!(state.level(), state.hits() / rules.hits_per_level);
            assert_eq!(interval, rules.interval(state.level()));
            clear_all(&mut state);
        }

        assert_eq!(
            state.advance(pattern(0b111), &rules),
            TickOutcome::Stopped {
                result: RoundResult::Hit,
                reason: StopReason::LevelLimit,
            }
        );
        assert_eq!(state.level(), rules.level_limit);
        assert_eq!(state.misses(), 0);
        assert!(!state.is_running());
    }

    #[test]
    fn partially_cleared_round_is_a_miss() {
        let rules = GameRules::default();
        let mut state = started();
        state.advance(pattern(0b011), &rules);
        state.press(KeyCode(0x02));
        assert_eq!(state.live_pattern(), pattern(0b010));

        let outcome = state.advance(pattern(0b100), &rules);
        assert!(matches!(
            outcome,
            TickOutcome::Continue {
                result: RoundResult::Miss,
                ..
            }
        ));
        assert_eq!(state.misses(), 1);
        assert_eq!(state.extra_presses(), 0);
        assert_eq!(state.live_pattern(), pattern(0b100));
    }

    #[test]
    fn blank_round_without_presses_is_a_hit() {
        let rules = GameRules::default();
        let mut state = started();
        state.advance(Pattern::OFF, &rules);
        let outcome = state.advance(pattern(0b110), &rules);
        assert!(matches!(
            outcome,
            TickOutcome::Continue {
                result: RoundResult::Hit,
                ..
            }
        ));
        assert_eq!(state.hits(), 2);
        assert_eq!(state.level(), 0);
    }

    #[test]
    fn stray_press_forces_a_miss_even_when_cleared() {
        let rules = GameRules::default();
        let mut state = started();
        state.advance(pattern(0b010), &rules);

        state.press(KeyCode(0x02));
        assert_eq!(state.extra_presses(), 1);
        state.press(KeyCode(0x03));
        assert!(state.live_pattern().is_clear());

        assert!(matches!(
            state.advance(Pattern::OFF, &rules),
            TickOutcome::Continue {
                result: RoundResult::Miss,
                ..
            }
        ));
        assert_eq!(state.extra_presses(), 0);
    }

    #[test]
    fn misses_and_level_never_decrease_within_session() {
        let rules = GameRules {
            hits_per_level: 2,
            ..GameRules::default()
        };
        let mut state = started();
        let mut last = (0, 0);
        for round in 0..40u32 {
            if state.advance(pattern((round * 5 % 8) as u8), &rules) != TickOutcome::Stale {
                if round % 3 == 0 {
                    clear_all(&mut state);
                }
            }
            assert!(state.misses() >= last.0);
            assert!(state.level() >= last.1);
            last = (state.misses(), state.level());
        }
    }
}
