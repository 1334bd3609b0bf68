//! Config loading and validation errors.
//!
//! File-level failures carry the label of the layer they came from, in the
//! same `source(path)` form used by schema errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{layer}: cannot read config file: {source}")]
    ReadFailed {
        layer: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{layer}: malformed JSON5: {source}")]
    ParseFailed {
        layer: String,
        #[source]
        source: json5::Error,
    },
    /// The merged document passed the schema pass but not serde decoding.
    #[error("{layer}: cannot decode config: {source}")]
    DecodeFailed {
        layer: String,
        #[source]
        source: serde_json::Error,
    },
    /// A field failed validation; `path` is `layer:dotted.path`.
    #[error("invalid config at {path}: {message}")]
    InvalidField { path: String, message: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Layer label for file-level failures.
    pub fn layer(&self) -> Option<&str> {
        match self {
            ConfigError::ReadFailed { layer, .. }
            | ConfigError::ParseFailed { layer, .. }
            | ConfigError::DecodeFailed { layer, .. } => Some(layer),
            ConfigError::InvalidField { .. } | ConfigError::Invalid(_) => None,
        }
    }
}
