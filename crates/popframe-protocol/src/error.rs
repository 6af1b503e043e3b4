//! Rejection codes returned by the runtime's pop-frame facility.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes a runtime returns from a pop-frame request.
///
/// Numeric values follow the tool-interface registry so that a native
/// boundary can pass them through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeError {
    /// Handle does not identify a thread.
    InvalidThread,
    /// Thread is not suspended.
    ThreadNotSuspended,
    /// Thread is already suspended.
    ThreadSuspended,
    /// Thread has terminated or was never started.
    ThreadNotAlive,
    /// Fewer than two frames on the stack.
    NoMoreFrames,
    /// Top frame cannot be popped (e.g. a native frame).
    OpaqueFrame,
    /// Required pointer argument was null.
    NullPointer,
    /// Any code not in the registry above.
    Other(u32),
}

impl RuntimeError {
    pub fn code(&self) -> u32 {
        match self {
            RuntimeError::InvalidThread => 10,
            RuntimeError::ThreadNotSuspended => 13,
            RuntimeError::ThreadSuspended => 14,
            RuntimeError::ThreadNotAlive => 15,
            RuntimeError::NoMoreFrames => 31,
            RuntimeError::OpaqueFrame => 32,
            RuntimeError::NullPointer => 100,
            RuntimeError::Other(code) => *code,
        }
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            10 => RuntimeError::InvalidThread,
            13 => RuntimeError::ThreadNotSuspended,
            14 => RuntimeError::ThreadSuspended,
            15 => RuntimeError::ThreadNotAlive,
            31 => RuntimeError::NoMoreFrames,
            32 => RuntimeError::OpaqueFrame,
            100 => RuntimeError::NullPointer,
            other => RuntimeError::Other(other),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidThread => write!(f, "INVALID_THREAD"),
            Self::ThreadNotSuspended => write!(f, "THREAD_NOT_SUSPENDED"),
            Self::ThreadSuspended => write!(f, "THREAD_SUSPENDED"),
            Self::ThreadNotAlive => write!(f, "THREAD_NOT_ALIVE"),
            Self::NoMoreFrames => write!(f, "NO_MORE_FRAMES"),
            Self::OpaqueFrame => write!(f, "OPAQUE_FRAME"),
            Self::NullPointer => write!(f, "NULL_POINTER"),
            Self::Other(code) => write!(f, "UNKNOWN_ERROR({})", code),
        }
    }
}

impl std::error::Error for RuntimeError {}
