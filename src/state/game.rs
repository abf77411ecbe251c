use std::{fmt, time::{Duration, SystemTime}};

use uuid::Uuid;

use crate::state::state_machine::StopReason;

/// One of the three physical indicator lights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    /// Bit 0, cleared by key "1".
    NumLock,
    /// Bit 1, cleared by key "2".
    CapsLock,
    /// Bit 2, cleared by key "3".
    ScrollLock,
}

impl Indicator {
    /// Every indicator in bit order.
    pub const ALL: [Indicator; 3] = [
        Indicator::NumLock,
        Indicator::CapsLock,
        Indicator::ScrollLock,
    ];

    /// Bit position inside a [`Pattern`].
    pub fn index(self) -> u8 {
        match self {
            Indicator::NumLock => 0,
            Indicator::CapsLock => 1,
            Indicator::ScrollLock => 2,
        }
    }

    fn mask(self) -> u8 {
        1 << self.index()
    }
}

/// Bitset of lit indicators; only the low three bits are ever set.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Pattern(u8);

impl Pattern {
    /// Every indicator dark.
    pub const OFF: Pattern = Pattern(0);
    /// Every indicator lit.
    pub const ALL: Pattern = Pattern(0b111);

    /// Keep the low three bits of `bits`.
    pub fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Raw bit representation.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// No indicator is lit.
    pub fn is_clear(self) -> bool {
        self.0 == 0
    }

    /// Whether `indicator` is lit.
    pub fn contains(self, indicator: Indicator) -> bool {
        self.0 & indicator.mask() != 0
    }

    /// Same pattern with `indicator` dark.
    pub fn without(self, indicator: Indicator) -> Self {
        Self(self.0 & !indicator.mask())
    }

    /// Lit indicators in bit order.
    pub fn lit(self) -> impl Iterator<Item = Indicator> {
        Indicator::ALL
            .into_iter()
            .filter(move |indicator| self.contains(*indicator))
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({:#05b})", self.0)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03b}", self.0)
    }
}

/// Scancode-equivalent identifier of a raw key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCode(pub u16);

/// Fixed key assignment: PC set-1 scancodes for the "1", "2" and "3" keys.
pub const KEY_MAP: [(KeyCode, Indicator); 3] = [
    (KeyCode(0x02), Indicator::NumLock),
    (KeyCode(0x03), Indicator::CapsLock),
    (KeyCode(0x04), Indicator::ScrollLock),
];

/// Indicator cleared by `key`, if the key is assigned to one.
pub fn indicator_for(key: KeyCode) -> Option<Indicator> {
    KEY_MAP
        .iter()
        .find(|(code, _)| *code == key)
        .map(|(_, indicator)| *indicator)
}

/// Result of applying one key press to the live state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    /// The key matched a lit indicator; the new pattern must be displayed.
    Cleared {
        /// Indicator that went dark.
        indicator: Indicator,
        /// Live pattern after the clear.
        pattern: Pattern,
    },
    /// Unassigned key or already-dark indicator; the round is now a miss.
    Extra {
        /// Extra presses recorded this round, including this one.
        extra_presses: u32,
    },
    /// No session was running when the press was handled.
    Ignored,
}

/// Immutable copy of the externally visible session figures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Whether a session is active.
    pub running: bool,
    /// Current difficulty tier.
    pub level: u32,
    /// Round interval for the current level.
    pub interval: Duration,
    /// Rounds cleared in time.
    pub hits: u32,
    /// Rounds missed.
    pub misses: u32,
    /// Configured miss limit.
    pub miss_limit: u32,
    /// Why the last session ended, if one has.
    pub stop_reason: Option<StopReason>,
    /// Identifier of the current or last session.
    pub session_id: Option<Uuid>,
    /// When the current or last session began.
    pub started_at: Option<SystemTime>,
}

/// The single shared record of session truth.
///
/// Only ever touched through [`GameEngine::with_state`](crate::state::engine::GameEngine::with_state),
/// which holds the engine lock for the whole closure.
#[derive(Debug, Clone, Default)]
pub struct GameState {
    pub(crate) live_pattern: Pattern,
    pub(crate) running: bool,
    pub(crate) extra_presses: u32,
    pub(crate) hits: u32,
    pub(crate) misses: u32,
    pub(crate) level: u32,
    pub(crate) generation: u64,
    pub(crate) session_id: Option<Uuid>,
    pub(crate) started_at: Option<SystemTime>,
    pub(crate) stop_reason: Option<StopReason>,
    pub(crate) closed: bool,
}

impl GameState {
    /// Fresh, stopped state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a session is active.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Indicators still waiting for a key this round.
    pub fn live_pattern(&self) -> Pattern {
        self.live_pattern
    }

    /// Rounds cleared in time.
    pub fn hits(&self) -> u32 {
        self.hits
    }

    /// Rounds missed.
    pub fn misses(&self) -> u32 {
        self.misses
    }

    /// Current difficulty tier.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Stray presses recorded during the current round.
    pub fn extra_presses(&self) -> u32 {
        self.extra_presses
    }

    /// Session generation; bumped by every successful [`GameState::reset_for_session`].
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the engine refuses new sessions.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Zero every counter and enter the running state for a new session.
    ///
    /// Returns the new generation.
    pub fn reset_for_session(&mut self, session_id: Uuid) -> u64 {
        self.live_pattern = Pattern::OFF;
        self.extra_presses = 0;
        self.hits = 0;
        self.misses = 0;
        self.level = 0;
        self.stop_reason = None;
        self.session_id = Some(session_id);
        self.started_at = Some(SystemTime::now());
        self.generation += 1;
        self.running = true;
        self.generation
    }

    /// Leave the running state; the pattern goes dark.
    pub fn stop(&mut self, reason: StopReason) {
        self.running = false;
        self.live_pattern = Pattern::OFF;
        self.stop_reason = Some(reason);
    }

    /// Apply one key press to the live pattern.
    pub fn press(&mut self, key: KeyCode) -> PressOutcome {
        if !self.running {
            return PressOutcome::Ignored;
        }

        match indicator_for(key) {
            Some(indicator) if self.live_pattern.contains(indicator) => {
                self.live_pattern = self.live_pattern.without(indicator);
                PressOutcome::Cleared {
                    indicator,
                    pattern: self.live_pattern,
                }
            }
            _ => {
                self.extra_presses += 1;
                PressOutcome::Extra {
                    extra_presses: self.extra_presses,
                }
            }
        }
    }

    /// Copy out the externally visible figures.
    pub fn snapshot(&self, rules: &crate::config::GameRules) -> StatusSnapshot {
        StatusSnapshot {
            running: self.running,
            level: self.level,
            interval: rules.interval(self.level),
            hits: self.hits,
            misses: self.misses,
            miss_limit: rules.miss_limit,
            stop_reason: self.stop_reason,
            session_id: self.session_id,
            started_at: self.started_at,
        }
    }
}
