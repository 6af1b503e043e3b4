//! Wait bounds for the harness
//!
//! - `ready_ms`: how long the driver waits for the worker's readiness signal.
//!   Running out is a harness failure; the run is classified FAILED.
//! - `settle_ms`: how long the CLI waits, after the checks, for the worker to
//!   finish its post-hoc checks. Zero means do not wait.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Upper bound for either wait (10 minutes)
pub const MAX_WAIT_MS: u64 = 600_000;

/// Wait configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    /// Readiness wait (default: 30000 = 30 s)
    pub ready_ms: u64,

    /// Settle wait (default: 5000 = 5 s)
    pub settle_ms: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            ready_ms: 30_000,
            settle_ms: 5_000,
        }
    }
}

impl WaitConfig {
    pub fn validate(&self) -> Result<(), TimeoutValidationError> {
        // ready_ms must be in (0, MAX_WAIT_MS]
        if self.ready_ms == 0 || self.ready_ms > MAX_WAIT_MS {
            return Err(TimeoutValidationError::ReadyOutOfBounds {
                value: self.ready_ms,
            });
        }

        // settle_ms must be in [0, MAX_WAIT_MS]
        if self.settle_ms > MAX_WAIT_MS {
            return Err(TimeoutValidationError::SettleOutOfBounds {
                value: self.settle_ms,
            });
        }

        Ok(())
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_ms)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, thiserror::Error)]
pub enum TimeoutValidationError {
    #[error("timeouts.ready_ms must be in (0, 600000], got {value}")]
    ReadyOutOfBounds { value: u64 },

    #[error("timeouts.settle_ms must be in [0, 600000], got {value}")]
    SettleOutOfBounds { value: u64 },
}
