//! Shared application state and the game engine it carries.

/// Engine owning the game state and its lock.
pub mod engine;
/// Session data and key matching.
pub mod game;
/// Round scoring and session transitions.
pub mod state_machine;

use std::sync::Arc;

use dashmap::DashMap;

use crate::{
    config::AppConfig,
    device::keypad::{KeypadIndicators, KeypadRegistry},
    services::{input_service::InputHandler, scheduler::Scheduler},
};

pub use self::engine::{BeginOutcome, GameEngine, PatternSource, RandomPatterns, SessionEvent, SharedGame};

/// Shared application state handle.
pub type SharedState = Arc<AppState>;

/// Central application state: the game engine, its execution contexts and the connected keypads.
pub struct AppState {
    config: AppConfig,
    game: SharedGame,
    scheduler: Scheduler,
    input: InputHandler,
    indicators: Arc<KeypadIndicators>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// Spawns the deferred input worker, so it must run inside a Tokio runtime.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_patterns(config, Box::new(RandomPatterns))
    }

    /// Same as [`AppState::new`] with an explicit pattern source.
    pub fn with_patterns(config: AppConfig, patterns: Box<dyn PatternSource>) -> SharedState {
        let settings = config.indicators();
        let keypads: KeypadRegistry = Arc::new(DashMap::new());
        let indicators = Arc::new(KeypadIndicators::new(keypads, settings.ceiling));
        let game = GameEngine::new(config.rules(), indicators.clone(), patterns);
        let scheduler = Scheduler::new(game.clone());
        let input = InputHandler::spawn(game.clone());

        Arc::new(Self {
            config,
            game,
            scheduler,
            input,
            indicators,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Shared game engine.
    pub fn game(&self) -> &SharedGame {
        &self.game
    }

    /// Round timer.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Raw key entry point.
    pub fn input(&self) -> &InputHandler {
        &self.input
    }

    /// Indicator driver writing to the connected keypads.
    pub fn indicators(&self) -> &KeypadIndicators {
        &self.indicators
    }

    /// Registry of active keypad sockets keyed by their identifier.
    pub fn keypads(&self) -> &KeypadRegistry {
        self.indicators.keypads()
    }
}
