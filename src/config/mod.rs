//! Harness configuration
//!
//! Three layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. Config file (`--config <FILE>`, TOML)
//! 3. CLI flags
//!
//! The merged value is validated and deserialized into [`HarnessConfig`].

mod defaults;
mod effective;
mod harness;
mod merge;

pub use defaults::BuiltinDefaults;
pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig};
pub use harness::{EncodingMode, HarnessConfig};
pub use merge::{deep_merge, merge_layers};
