//! Layered configuration loader.
//!
//! Discovers configuration layers (user, cwd, runtime overrides), validates
//! them against the schema, merges them and applies environment overrides to
//! produce the final `MembaseConfig`.

mod layer_io;
mod merge;
mod paths;
mod schema;

#[cfg(test)]
mod tests;

use crate::{ConfigError, MembaseConfig};
use log::{debug, info};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Default config filename in local layers.
const DEFAULT_CONFIG_FILE: &str = "membase.json5";
/// Default config directory under the user's home.
const DEFAULT_CONFIG_DIR: &str = ".membase";

/// Effective config plus metadata about which layers were loaded.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// The merged, validated config.
    pub config: MembaseConfig,
    /// Metadata for each layer applied during load.
    pub layers: Vec<ConfigLayer>,
}

/// Origin for a single config layer in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// User-specific configuration.
    User,
    /// Current working directory configuration.
    Cwd,
    /// Runtime override files.
    Runtime,
    /// `MEMBASE_*` environment variables (highest precedence).
    Env,
}

/// Metadata about a config layer.
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    /// Layer origin.
    pub source: ConfigLayerSource,
    /// Location on disk if the layer came from a file.
    pub path: Option<PathBuf>,
}

/// Schema validation mode for layered configs.
#[derive(Debug, Clone, Copy)]
enum SchemaMode {
    /// Partial validation for non-final layers.
    Partial,
    /// Full validation for the effective config.
    Full,
}

/// Options controlling layered config discovery and overrides.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    /// Working directory used to resolve the cwd layer.
    pub cwd: PathBuf,
    /// Optional user config path (defaults to `~/.membase/membase.json5`).
    pub user_config_path: Option<PathBuf>,
    /// Runtime override config paths applied after file layers.
    pub runtime_paths: Vec<PathBuf>,
    /// Apply `MEMBASE_*` environment overrides last.
    pub apply_env: bool,
}

impl LayeredConfigOptions {
    /// Create options with default layer locations for the provided cwd.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            user_config_path: layer_io::default_user_config_path(),
            runtime_paths: Vec::new(),
            apply_env: true,
        }
    }

    /// Add a runtime override config path.
    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Skip environment overrides.
    pub fn without_env(mut self) -> Self {
        self.apply_env = false;
        self
    }
}

impl MembaseConfig {
    /// Load a single config from a path (no layering, no env overrides).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("loading config from path: {}", path.display());
        let label = format!("config({})", path.display());
        let value = layer_io::read_layer_file(path, &label)?;
        config_from_value(value, &label)
    }

    /// Load a single config from JSON5 contents (no layering, no env overrides).
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let value: Value =
            json5::from_str(contents).map_err(|source| ConfigError::ParseFailed {
                layer: "config".to_string(),
                source,
            })?;
        config_from_value(value, "config")
    }

    /// Load a layered config stack using the default layer locations.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        info!(
            "loading layered config with defaults (cwd={})",
            cwd.as_ref().display()
        );
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    /// Load a layered config stack using explicit layer locations.
    ///
    /// Layer precedence (low -> high): user, cwd, runtime overrides, env.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let cwd = paths::resolve_cwd(&options.cwd)?;
        debug!("normalized cwd for config load: {}", cwd.display());
        let mut layers = Vec::new();
        let mut merged = Value::Object(serde_json::Map::new());
        let mut seen = paths::SeenLayers::default();

        let candidates = [
            (ConfigLayerSource::User, options.user_config_path.clone()),
            (ConfigLayerSource::Cwd, Some(cwd.join(DEFAULT_CONFIG_FILE))),
        ];
        for (source, path) in candidates {
            let Some(loaded) = layer_io::load_optional_layer(source, path.as_deref())? else {
                continue;
            };
            if let Some(path) = loaded.meta.path.as_deref()
                && !seen.first_visit(path)
            {
                debug!(
                    "skipping duplicate layer (source={:?}, path={})",
                    source,
                    path.display()
                );
                continue;
            }
            merge::merge_layer(&mut merged, &loaded.value);
            layers.push(loaded.meta);
        }

        for runtime_path in &options.runtime_paths {
            let loaded = layer_io::load_required_layer(ConfigLayerSource::Runtime, runtime_path)?;
            debug!("loaded runtime layer (path={})", runtime_path.display());
            merge::merge_layer(&mut merged, &loaded.value);
            layers.push(loaded.meta);
        }

        let mut config = config_from_value(merged, "effective")?;
        if options.apply_env {
            config.apply_env();
            layers.push(ConfigLayer {
                source: ConfigLayerSource::Env,
                path: None,
            });
            config.validate()?;
        }
        info!("layered config loaded (layers={})", layers.len());
        Ok(LayeredConfig { config, layers })
    }

    /// Validate configuration invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.hub.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::Invalid("hub.base_url cannot be empty".to_string()));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidField {
                path: "hub.base_url".to_string(),
                message: format!("expected an http(s) URL, got {base_url:?}"),
            });
        }
        if self.hub.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "hub.retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.hub.idle_poll_interval_ms == 0 {
            return Err(ConfigError::InvalidField {
                path: "hub.idle_poll_interval_ms".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.memory.account.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "memory.account cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Internal representation of a loaded config layer.
#[derive(Debug, Clone)]
struct LoadedLayer {
    meta: ConfigLayer,
    value: Value,
}

fn config_from_value(value: Value, label: &str) -> Result<MembaseConfig, ConfigError> {
    schema::validate_layer_schema(&value, SchemaMode::Full, label)?;
    let config: MembaseConfig =
        serde_json::from_value(value).map_err(|source| ConfigError::DecodeFailed {
            layer: label.to_string(),
            source,
        })?;
    config.validate()?;
    Ok(config)
}
