//! Session timing configuration.
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::constants::{
    DEFAULT_LOCK_DELAY_MS, DEFAULT_REVEAL_DELAY_MS, DEFAULT_TIMEOUT_DELAY_MS, MAX_DELAY_MS,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be at most {max} ms (got {value})")]
    DelayTooLong {
        field: &'static str,
        value: u64,
        max: u64,
    },
    #[error("invalid session config JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Delays between the observable steps of a question, plus timer behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Commit to correctness evaluation.
    #[serde(default = "SessionConfig::default_lock_delay_ms")]
    pub lock_delay_ms: u64,
    /// Reveal to the next question or the finish.
    #[serde(default = "SessionConfig::default_reveal_delay_ms")]
    pub reveal_delay_ms: u64,
    /// Timer expiry to the finish.
    #[serde(default = "SessionConfig::default_timeout_delay_ms")]
    pub timeout_delay_ms: u64,
    /// Hold the countdown while an advisory panel is open.
    #[serde(default = "SessionConfig::default_pause_timer")]
    pub pause_timer_on_advisory: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lock_delay_ms: DEFAULT_LOCK_DELAY_MS,
            reveal_delay_ms: DEFAULT_REVEAL_DELAY_MS,
            timeout_delay_ms: DEFAULT_TIMEOUT_DELAY_MS,
            pause_timer_on_advisory: true,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub const fn default_lock_delay_ms() -> u64 {
        DEFAULT_LOCK_DELAY_MS
    }

    #[must_use]
    pub const fn default_reveal_delay_ms() -> u64 {
        DEFAULT_REVEAL_DELAY_MS
    }

    #[must_use]
    pub const fn default_timeout_delay_ms() -> u64 {
        DEFAULT_TIMEOUT_DELAY_MS
    }

    #[must_use]
    pub const fn default_pause_timer() -> bool {
        true
    }

    /// Zero delays; every scheduled transition fires on the next `advance`.
    #[must_use]
    pub const fn instant() -> Self {
        Self {
            lock_delay_ms: 0,
            reveal_delay_ms: 0,
            timeout_delay_ms: 0,
            pause_timer_on_advisory: true,
        }
    }

    /// Parse and validate a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a delay is out of range.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    ///
    /// Returns an error when any delay exceeds one minute.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("lock_delay_ms", self.lock_delay_ms),
            ("reveal_delay_ms", self.reveal_delay_ms),
            ("timeout_delay_ms", self.timeout_delay_ms),
        ] {
            if value > MAX_DELAY_MS {
                return Err(ConfigError::DelayTooLong {
                    field,
                    value,
                    max: MAX_DELAY_MS,
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub const fn lock_delay(&self) -> Duration {
        Duration::from_millis(self.lock_delay_ms)
    }

    #[must_use]
    pub const fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.reveal_delay_ms)
    }

    #[must_use]
    pub const fn timeout_delay(&self) -> Duration {
        Duration::from_millis(self.timeout_delay_ms)
    }
}
