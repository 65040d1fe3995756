//! Engine configuration
//!
//! ```yaml
//! maxSteps: 256
//! portTimeoutMs: 10000
//! retry:
//!   maxAttempts: 3
//!   initialDelayMs: 200
//!   backoffMultiplier: 2.0
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LeadflowError, LeadflowResult};

/// Hard cap on executed nodes per run
pub const DEFAULT_MAX_STEPS: usize = 256;

/// Per port call
pub const DEFAULT_PORT_TIMEOUT_MS: u64 = 10_000;

/// Largest accepted `maxSteps`; the visited set is sized from it
pub const MAX_STEPS_LIMIT: usize = 100_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Maximum node executions in one run; also bounds the visited set
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Timeout applied to every port call
    #[serde(default = "default_port_timeout_ms")]
    pub port_timeout_ms: u64,

    /// Retry policy for the send-message port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
}

fn default_max_steps() -> usize {
    DEFAULT_MAX_STEPS
}

fn default_port_timeout_ms() -> u64 {
    DEFAULT_PORT_TIMEOUT_MS
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            port_timeout_ms: DEFAULT_PORT_TIMEOUT_MS,
            retry: None,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml(content: &str) -> LeadflowResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| LeadflowError::config(format!("Failed to parse engine config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> LeadflowResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LeadflowError::config(format!(
                "Failed to read engine config {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> LeadflowResult<()> {
        if self.max_steps == 0 {
            return Err(LeadflowError::config("maxSteps must be at least 1"));
        }
        if self.max_steps > MAX_STEPS_LIMIT {
            return Err(LeadflowError::config(format!(
                "maxSteps must be at most {}",
                MAX_STEPS_LIMIT
            )));
        }
        if self.port_timeout_ms == 0 {
            return Err(LeadflowError::config("portTimeoutMs must be greater than 0"));
        }
        if let Some(ref retry) = self.retry {
            retry.validate()?;
        }
        Ok(())
    }

    pub fn port_timeout(&self) -> Duration {
        Duration::from_millis(self.port_timeout_ms)
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_port_timeout(mut self, timeout: Duration) -> Self {
        self.port_timeout_ms = timeout.as_millis() as u64;
        self
    }
}

/// Retry with exponential backoff
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Total attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    200
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> LeadflowResult<()> {
        if self.max_attempts == 0 {
            return Err(LeadflowError::config("retry.maxAttempts must be at least 1"));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(LeadflowError::config(
                "retry.backoffMultiplier must be at least 1.0",
            ));
        }
        Ok(())
    }

    /// Delay before retry number `retry` (0-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(retry as i32);
        Duration::from_millis((self.initial_delay_ms as f64 * factor) as u64)
    }
}
