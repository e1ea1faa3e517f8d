//! Error types for the durable cache.

/// Cache failures. `save` and `load` log them and degrade; `new` and
/// `try_save` return them.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Key would escape the cache directory.
    #[error("invalid cache key: {0}")]
    InvalidKey(String),
}
