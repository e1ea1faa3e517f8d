//! Config loading and validation failures.

use thiserror::Error;

/// Why a config stack could not be turned into a usable `ParleyConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A layer file exists but could not be read.
    #[error("cannot read config {origin}: {source}")]
    Read {
        origin: String,
        #[source]
        source: std::io::Error,
    },
    /// A layer is not valid JSON5.
    #[error("cannot parse config {origin}: {source}")]
    Syntax {
        origin: String,
        #[source]
        source: json5::Error,
    },
    /// The merged document does not deserialize into the config model.
    #[error("config has the wrong shape: {0}")]
    Shape(#[from] serde_json::Error),
    #[error("invalid config at {path}: {message}")]
    InvalidField { path: String, message: String },
    /// `models.default` names a model with no entry.
    #[error("default model `{0}` is not configured")]
    UnknownDefaultModel(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}
