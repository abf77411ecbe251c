//! Application-level configuration loading: game rules and indicator driver tuning.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};
use validator::{Validate, ValidationError};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "KEYDANCE_CONFIG_PATH";

/// Scoring and pacing constants for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameRules {
    /// Hits needed to climb one level.
    pub hits_per_level: u32,
    /// Missed rounds that end the session.
    pub miss_limit: u32,
    /// Level that ends the session.
    pub level_limit: u32,
    /// Round interval at level 0.
    pub base_interval: Duration,
    /// Amount shaved off the round interval per level.
    pub interval_step: Duration,
    /// Floor for the round interval; always non-zero.
    pub min_interval: Duration,
}

impl GameRules {
    /// Round interval for `level`, shrinking linearly down to [`GameRules::min_interval`].
    pub fn interval(&self, level: u32) -> Duration {
        self.interval_step
            .checked_mul(level)
            .and_then(|cut| self.base_interval.checked_sub(cut))
            .unwrap_or(Duration::ZERO)
            .max(self.min_interval)
    }
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            hits_per_level: 10,
            miss_limit: 10,
            level_limit: 10,
            base_interval: Duration::from_millis(2_000),
            interval_step: Duration::from_millis(200),
            min_interval: Duration::from_millis(200),
        }
    }
}

/// Tuning for the keypad indicator driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorSettings {
    /// A `set_pattern` call taking longer than this is reported as slow.
    pub ceiling: Duration,
    /// Flash all indicators when a keypad connects while no session runs.
    pub self_test: bool,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            ceiling: Duration::from_millis(10),
            self_test: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    rules: GameRules,
    indicators: IndicatorSettings,
}

impl AppConfig {
    /// Build a configuration from already validated parts.
    pub fn new(rules: GameRules, indicators: IndicatorSettings) -> Self {
        Self { rules, indicators }
    }

    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        rules = ?app_config.rules,
                        "loaded game rules from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse and validate a JSON document; sections left out keep their defaults.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let raw = serde_json::from_str::<RawConfig>(contents)?;
        raw.validate()?;
        Ok(raw.into())
    }

    /// Game rules in effect for every session.
    pub fn rules(&self) -> GameRules {
        self.rules
    }

    /// Indicator driver tuning.
    pub fn indicators(&self) -> IndicatorSettings {
        self.indicators
    }
}

/// Reasons a configuration document is rejected.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Not valid JSON or wrong shape.
    #[error("malformed config: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Well-formed but out of range.
    #[error("invalid config: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

#[derive(Debug, Deserialize, Validate)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    #[validate(nested)]
    rules: RawRules,
    #[serde(default)]
    #[validate(nested)]
    indicators: RawIndicators,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            rules: value.rules.into(),
            indicators: value.indicators.into(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_intervals"))]
struct RawRules {
    #[validate(range(min = 1))]
    hits_per_level: u32,
    #[validate(range(min = 1))]
    miss_limit: u32,
    #[validate(range(min = 1))]
    level_limit: u32,
    #[validate(range(min = 1))]
    base_interval_ms: u64,
    interval_step_ms: u64,
    #[validate(range(min = 1))]
    min_interval_ms: u64,
}

impl Default for RawRules {
    fn default() -> Self {
        let rules = GameRules::default();
        Self {
            hits_per_level: rules.hits_per_level,
            miss_limit: rules.miss_limit,
            level_limit: rules.level_limit,
            base_interval_ms: rules.base_interval.as_millis() as u64,
            interval_step_ms: rules.interval_step.as_millis() as u64,
            min_interval_ms: rules.min_interval.as_millis() as u64,
        }
    }
}

impl From<RawRules> for GameRules {
    fn from(value: RawRules) -> Self {
        Self {
            hits_per_level: value.hits_per_level,
            miss_limit: value.miss_limit,
            level_limit: value.level_limit,
            base_interval: Duration::from_millis(value.base_interval_ms),
            interval_step: Duration::from_millis(value.interval_step_ms),
            min_interval: Duration::from_millis(value.min_interval_ms),
        }
    }
}

fn validate_intervals(rules: &RawRules) -> Result<(), ValidationError> {
    if rules.min_interval_ms > rules.base_interval_ms {
        let mut err = ValidationError::new("interval_floor");
        err.message = Some(
            format!(
                "min_interval_ms ({}) must not exceed base_interval_ms ({})",
                rules.min_interval_ms, rules.base_interval_ms
            )
            .into(),
        );
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
#[serde(default)]
struct RawIndicators {
    #[validate(range(min = 1, max = 100))]
    ceiling_ms: u64,
    self_test: bool,
}

impl Default for RawIndicators {
    fn default() -> Self {
        let settings = IndicatorSettings::default();
        Self {
            ceiling_ms: settings.ceiling.as_millis() as u64,
            self_test: settings.self_test,
        }
    }
}

impl From<RawIndicators> for IndicatorSettings {
    fn from(value: RawIndicators) -> Self {
        Self {
            ceiling: Duration::from_millis(value.ceiling_ms),
            self_test: value.self_test,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
