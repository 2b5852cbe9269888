//! Supervisor configuration.
//!
//! Loaded from serde sources or overridden from environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::limits::ExecutionLimits;

/// Default per-invocation deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings applied by the execution supervisor to every invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Deadline for a single handler invocation.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Payload ceilings checked before binding.
    pub limits: ExecutionLimits,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            limits: ExecutionLimits::default(),
        }
    }
}

/// An environment override could not be parsed.
#[derive(Debug, Error)]
#[error("invalid value `{value}` for {key}: expected a non-negative integer")]
pub struct ConfigError {
    /// Environment variable name.
    pub key: &'static str,
    /// Rejected value.
    pub value: String,
}

impl SupervisorConfig {
    /// Replaces the invocation deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replaces the payload limits.
    #[must_use]
    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Invocation deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Payload limits.
    #[must_use]
    pub const fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// Builds a configuration from defaults overridden by `TOOL_TIMEOUT_MS`,
    /// `TOOL_MAX_FIELDS`, `TOOL_MAX_STRING_LEN`, `TOOL_MAX_DEPTH`,
    /// `TOOL_MAX_COLLECTION_LEN` and `TOOL_MAX_TOTAL_ELEMENTS`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is set but not a valid integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SupervisorConfig::from_env`] with a custom variable source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is set but not a valid integer.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &'static str| -> Result<Option<u64>, ConfigError> {
            match lookup(key) {
                None => Ok(None),
                Some(raw) => {
                    let parsed = raw.trim().parse::<u64>();
                    parsed.map(Some).map_err(|_| ConfigError { key, value: raw })
                }
            }
        };
        let read_usize = |key: &'static str, current: usize| -> Result<usize, ConfigError> {
            Ok(read(key)?.map_or(current, |value| {
                usize::try_from(value).unwrap_or(usize::MAX)
            }))
        };

        let mut config = Self::default();
        if let Some(millis) = read("TOOL_TIMEOUT_MS")? {
            config.timeout = Duration::from_millis(millis);
        }
        let limits = &mut config.limits;
        limits.max_fields = read_usize("TOOL_MAX_FIELDS", limits.max_fields)?;
        limits.max_string_len = read_usize("TOOL_MAX_STRING_LEN", limits.max_string_len)?;
        limits.max_depth = read_usize("TOOL_MAX_DEPTH", limits.max_depth)?;
        limits.max_collection_len =
            read_usize("TOOL_MAX_COLLECTION_LEN", limits.max_collection_len)?;
        limits.max_total_elements =
            read_usize("TOOL_MAX_TOTAL_ELEMENTS", limits.max_total_elements)?;
        Ok(config)
    }
}
