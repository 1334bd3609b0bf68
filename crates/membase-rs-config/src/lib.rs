//! Configuration models and layered config loading.
//!
//! This crate owns the membase config schema, validation, layer merging and
//! environment overrides used by the hub client and the memory model.

mod env;
mod error;
mod loader;
mod model;

/// Environment variable names and override helpers.
pub use env::{ENV_ACCOUNT, ENV_HUB, ENV_MEMBASE_ID};
/// Public error type returned by config loading and validation APIs.
pub use error::ConfigError;
/// Layered config types and loader options.
pub use loader::{ConfigLayer, ConfigLayerSource, LayeredConfig, LayeredConfigOptions};
/// Configuration schema models.
pub use model::*;
