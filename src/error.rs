//! Harness infrastructure errors
//!
//! These are failures of the harness itself, not of the runtime under test.
//! A check that the runtime fails is a check result, never a `HarnessError`.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::sync::WaitError;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("worker did not signal readiness within {waited_ms} ms")]
    ReadinessTimeout { waited_ms: u64 },

    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),

    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[from] io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl HarnessError {
    pub(crate) fn from_readiness(err: WaitError) -> Self {
        match err {
            WaitError::TimedOut { waited_ms } => HarnessError::ReadinessTimeout { waited_ms },
            WaitError::Poisoned => HarnessError::LockPoisoned("readiness"),
        }
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
