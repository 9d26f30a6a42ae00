//! Evaluation configuration
//!
//! Read from environment variables:
//! - `PHIQL_CHANNEL_CAPACITY`: rows buffered between a row producer and
//!   the evaluator (default 1024)

use std::env;

use thiserror::Error;

/// Environment variable holding the row channel capacity
pub const CHANNEL_CAPACITY_VAR: &str = "PHIQL_CHANNEL_CAPACITY";

/// Default row channel capacity
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Evaluator settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalConfig {
    /// Bounded channel size for background row producers
    pub channel_capacity: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl EvalConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Create configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = EvalConfig::default();

        if let Some(value) = lookup(CHANNEL_CAPACITY_VAR) {
            let invalid = |reason: String| ConfigError::InvalidValue {
                var: CHANNEL_CAPACITY_VAR,
                value: value.clone(),
                reason,
            };
            let capacity: usize = value.trim().parse().map_err(|e| invalid(format!("{}", e)))?;
            if capacity == 0 {
                return Err(invalid("must be at least 1".to_string()));
            }
            config.channel_capacity = capacity;
        }

        Ok(config)
    }
}
