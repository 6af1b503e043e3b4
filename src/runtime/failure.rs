//! Failure injection for the simulated runtime
//!
//! Lets tests make the runtime misbehave on a specific rejection path. See
//! [`Misbehavior`] for what it can do instead of rejecting.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use popframe_protocol::RuntimeError;
use thiserror::Error;

/// What the runtime does instead of the rejection it would normally return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Misbehavior {
    /// Accept the call and pop a frame if there is a live target
    Accept,
    /// Return a different error code
    Return(RuntimeError),
    /// Return the right code but post frame events anyway
    Notify,
}

/// Failure configuration for one rejection path
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// Replacement behavior (None = only delay)
    pub misbehavior: Option<Misbehavior>,
    /// Delay to add before answering
    pub delay: Option<Duration>,
}

impl FailureConfig {
    /// Accept the call instead of rejecting it
    pub fn accept() -> Self {
        Self {
            misbehavior: Some(Misbehavior::Accept),
            delay: None,
        }
    }

    /// Reject with a different code
    pub fn wrong_code(code: RuntimeError) -> Self {
        Self {
            misbehavior: Some(Misbehavior::Return(code)),
            delay: None,
        }
    }

    /// Reject correctly but leak frame events
    pub fn notify() -> Self {
        Self {
            misbehavior: Some(Misbehavior::Notify),
            delay: None,
        }
    }

    /// Behave correctly but slowly
    pub fn delay(duration: Duration) -> Self {
        Self {
            misbehavior: None,
            delay: Some(duration),
        }
    }
}

/// Per-rejection failure injector
#[derive(Debug, Default)]
pub struct FailureInjector {
    configs: HashMap<RuntimeError, FailureConfig>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a failure for the path that would reject with `rejection`
    pub fn inject(&mut self, rejection: RuntimeError, config: FailureConfig) {
        self.configs.insert(rejection, config);
    }

    /// Failure installed for a rejection path, if any
    pub fn check(&self, rejection: &RuntimeError) -> Option<&FailureConfig> {
        self.configs.get(rejection)
    }
}

/// Error parsing an injection spec
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InjectionParseError {
    #[error("injection must look like REJECTION=OUTCOME, got '{0}'")]
    Malformed(String),

    #[error("unknown rejection '{0}' (expected null_pointer, invalid_thread or thread_not_suspended)")]
    UnknownRejection(String),

    #[error("unknown outcome '{0}' (expected 'accept', 'notify', a numeric error code or 'delay:<ms>')")]
    UnknownOutcome(String),
}

/// Parsed `REJECTION=OUTCOME` injection, as given on the command line or
/// in the `[inject]` config table
#[derive(Debug, Clone)]
pub struct InjectionSpec {
    pub rejection: RuntimeError,
    pub config: FailureConfig,
}

impl InjectionSpec {
    pub fn parse_pair(key: &str, value: &str) -> Result<Self, InjectionParseError> {
        let rejection = match key.trim() {
            "null_pointer" => RuntimeError::NullPointer,
            "invalid_thread" => RuntimeError::InvalidThread,
            "thread_not_suspended" => RuntimeError::ThreadNotSuspended,
            other => return Err(InjectionParseError::UnknownRejection(other.to_string())),
        };

        let value = value.trim();
        let config = if value == "accept" {
            FailureConfig::accept()
        } else if value == "notify" {
            FailureConfig::notify()
        } else if let Some(ms) = value.strip_prefix("delay:") {
            let ms: u64 = ms
                .parse()
                .map_err(|_| InjectionParseError::UnknownOutcome(value.to_string()))?;
            FailureConfig::delay(Duration::from_millis(ms))
        } else {
            let code: u32 = value
                .parse()
                .map_err(|_| InjectionParseError::UnknownOutcome(value.to_string()))?;
            FailureConfig::wrong_code(RuntimeError::from_code(code))
        };

        Ok(Self { rejection, config })
    }
}

impl FromStr for InjectionSpec {
    type Err = InjectionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| InjectionParseError::Malformed(s.to_string()))?;
        Self::parse_pair(key, value)
    }
}

impl fmt::Display for Misbehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Misbehavior::Accept => write!(f, "accept"),
            Misbehavior::Return(code) => write!(f, "return {}", code),
            Misbehavior::Notify => write!(f, "notify"),
        }
    }
}
