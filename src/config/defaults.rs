//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

use crate::timeout::WaitConfig;

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Verbose diagnostics (default: false)
    pub verbose: bool,

    /// Argument encoding mode (default: "auto")
    pub mode: String,

    /// Worker thread name (default: "popframe-worker")
    pub worker_name: String,

    /// Wait bounds
    pub timeouts: WaitConfig,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            verbose: false,
            mode: "auto".to_string(),
            worker_name: "popframe-worker".to_string(),
            timeouts: WaitConfig::default(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "verbose": self.verbose,
            "mode": self.mode,
            "worker_name": self.worker_name,
            "timeouts": {
                "ready_ms": self.timeouts.ready_ms,
                "settle_ms": self.timeouts.settle_ms
            },
            "inject": {}
        })
    }
}
