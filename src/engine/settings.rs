//! Resolved engine timing settings.

use std::time::Duration;

use partyline_core::config::schema::EngineConfig;

use crate::error::ConfigError;

/// Engine timing knobs with durations already parsed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    /// Countdowns shorter than this get no progress display
    pub countdown_floor: Duration,
    /// Countdowns at or above this are logged as suspicious
    pub countdown_warn_threshold: Duration,
    /// Lifetime of a private reply token
    pub reply_ttl: Duration,
    /// Participant ticker period
    pub ticker_period: Duration,
    /// Tick at which a refresh is prompted
    pub refresh_prompt_tick: u32,
    /// Tick at which the token dies
    pub dead_tick: u32,
    /// Multiplier for presentational pauses
    pub pacing_scale: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            countdown_floor: Duration::from_secs(10),
            countdown_warn_threshold: Duration::from_secs(10_000),
            reply_ttl: Duration::from_secs(840),
            ticker_period: Duration::from_secs(60),
            refresh_prompt_tick: 10,
            dead_tick: 15,
            pacing_scale: 1.0,
        }
    }
}

impl EngineSettings {
    /// Parses the engine section of the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a malformed duration or a
    /// negative or non-finite pacing scale.
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        if !config.pacing_scale.is_finite() || config.pacing_scale < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.pacing_scale".to_string(),
                value: config.pacing_scale.to_string(),
                expected: "a finite number >= 0".to_string(),
            });
        }
        Ok(Self {
            countdown_floor: parse_duration("engine.countdown_floor", &config.countdown_floor)?,
            countdown_warn_threshold: parse_duration(
                "engine.countdown_warn_threshold",
                &config.countdown_warn_threshold,
            )?,
            reply_ttl: parse_duration("engine.reply_ttl", &config.reply_ttl)?,
            ticker_period: parse_duration("engine.ticker_period", &config.ticker_period)?,
            refresh_prompt_tick: config.refresh_prompt_tick,
            dead_tick: config.dead_tick,
            pacing_scale: config.pacing_scale,
        })
    }

    /// Scales a presentational pause.
    #[must_use]
    pub fn pace(&self, base: Duration) -> Duration {
        base.mul_f64(self.pacing_scale)
    }
}

/// Parses a humantime duration for the given config field.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` if `value` is not a valid duration.
pub fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        expected: format!("a duration such as \"60s\" ({e})"),
    })
}
