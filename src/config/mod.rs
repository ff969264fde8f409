//! Configuration module - environment variable parsing

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::rate_limit::TRIGGER_RATE_LIMIT;

/// Whether fighters decide autonomously or only move on button presses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Preparation phase, then submitted strategies decide every tick
    #[default]
    Scripted,
    /// Straight into battle; fighters idle until a button is triggered
    Manual,
}

impl FromStr for MatchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scripted" | "autonomous" => Ok(Self::Scripted),
            "manual" => Ok(Self::Manual),
            _ => Err(ConfigError::Invalid {
                name: "MATCH_MODE",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scripted => write!(f, "scripted"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Settings that apply to a single match
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchConfig {
    /// Scripted (with preparation) or manual combat
    pub mode: MatchMode,
    /// Simulated time per tick
    pub tick_interval_ms: u64,
    /// Tick count that forces a draw
    pub max_ticks: u64,
    /// Preparation countdown length
    pub preparation_secs: u32,
    /// Wall-clock budget for one script invocation
    pub script_budget_ms: u64,
    /// Cooldown of the built-in action buttons
    pub default_button_cooldown_ms: u64,
    /// Cooldown of participant-defined action buttons
    pub custom_button_cooldown_ms: u64,
    /// Trigger requests accepted per participant per second
    pub trigger_rate_limit: u32,
}

impl MatchConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn script_budget(&self) -> Duration {
        Duration::from_millis(self.script_budget_ms.max(1))
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            mode: MatchMode::Scripted,
            tick_interval_ms: 100,
            max_ticks: 3000,
            preparation_secs: 30,
            script_budget_ms: 50,
            default_button_cooldown_ms: 1500,
            custom_button_cooldown_ms: 5000,
            trigger_rate_limit: TRIGGER_RATE_LIMIT,
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Defaults for every match started by this process
    pub matches: MatchConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = MatchConfig::default();

        Ok(Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            matches: MatchConfig {
                mode: env_or("MATCH_MODE", defaults.mode)?,
                tick_interval_ms: env_or("TICK_INTERVAL_MS", defaults.tick_interval_ms)?,
                max_ticks: env_or("MAX_TICKS", defaults.max_ticks)?,
                preparation_secs: env_or("PREPARATION_SECS", defaults.preparation_secs)?,
                script_budget_ms: env_or("SCRIPT_BUDGET_MS", defaults.script_budget_ms)?,
                default_button_cooldown_ms: env_or(
                    "DEFAULT_BUTTON_COOLDOWN_MS",
                    defaults.default_button_cooldown_ms,
                )?,
                custom_button_cooldown_ms: env_or(
                    "CUSTOM_BUTTON_COOLDOWN_MS",
                    defaults.custom_button_cooldown_ms,
                )?,
                trigger_rate_limit: env_or("TRIGGER_RATE_LIMIT", defaults.trigger_rate_limit)?,
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            matches: MatchConfig::default(),
        }
    }
}

/// Read `name`, falling back to `default` when it is unset
fn env_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_mode_parses_case_insensitively() {
        assert_eq!("Manual".parse::<MatchMode>().unwrap(), MatchMode::Manual);
        assert_eq!(" scripted ".parse::<MatchMode>().unwrap(), MatchMode::Scripted);
        assert!("arcade".parse::<MatchMode>().is_err());
    }

    #[test]
    fn zero_durations_are_clamped() {
        let config = MatchConfig {
            tick_interval_ms: 0,
            script_budget_ms: 0,
            ..MatchConfig::default()
        };
        assert_eq!(config.tick_interval(), Duration::from_millis(1));
        assert_eq!(config.script_budget(), Duration::from_millis(1));
    }

    #[test]
    fn unset_variable_uses_default() {
        let value: u64 = env_or("FIGHTER_ARENA_SURELY_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }
}
