//! Typed harness configuration

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use popframe_protocol::Encoding;
use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::runtime::InjectionSpec;
use crate::timeout::WaitConfig;

/// Which argument encoding the driver uses for its checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// Alternate encodings in verbose mode, primary otherwise
    #[default]
    Auto,
    Primary,
    Alternate,
}

impl EncodingMode {
    pub fn resolve(&self, verbose: bool) -> Encoding {
        match self {
            EncodingMode::Auto if verbose => Encoding::Alternate,
            EncodingMode::Auto => Encoding::Primary,
            EncodingMode::Primary => Encoding::Primary,
            EncodingMode::Alternate => Encoding::Alternate,
        }
    }
}

impl FromStr for EncodingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(EncodingMode::Auto),
            "primary" => Ok(EncodingMode::Primary),
            "alternate" => Ok(EncodingMode::Alternate),
            other => Err(ConfigError::ValidationError(format!(
                "mode must be one of auto, primary, alternate; got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for EncodingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingMode::Auto => write!(f, "auto"),
            EncodingMode::Primary => write!(f, "primary"),
            EncodingMode::Alternate => write!(f, "alternate"),
        }
    }
}

/// Resolved harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub verbose: bool,
    pub mode: EncodingMode,
    pub worker_name: String,
    pub timeouts: WaitConfig,
    /// Failure injections for the simulated runtime, `rejection -> outcome`
    pub inject: BTreeMap<String, String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            mode: EncodingMode::Auto,
            worker_name: "popframe-worker".to_string(),
            timeouts: WaitConfig::default(),
            inject: BTreeMap::new(),
        }
    }
}

impl HarnessConfig {
    /// Encoding the driver should use
    pub fn encoding(&self) -> Encoding {
        self.mode.resolve(self.verbose)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timeouts
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.worker_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "worker_name must not be empty".to_string(),
            ));
        }

        self.injections().map(|_| ())
    }

    /// Parse the `inject` table
    pub fn injections(&self) -> Result<Vec<InjectionSpec>, ConfigError> {
        self.inject
            .iter()
            .map(|(key, value)| {
                InjectionSpec::parse_pair(key, value)
                    .map_err(|e| ConfigError::ValidationError(e.to_string()))
            })
            .collect()
    }
}
