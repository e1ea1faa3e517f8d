//! Model backend capability and its failure taxonomy.

use crate::ChatRequest;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Classified reason a backend call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Credentials were rejected.
    Auth,
    /// The provider throttled the request.
    RateLimit,
    /// The provider could not be reached.
    Network,
    /// The request did not complete in time.
    Timeout,
    /// The provider answered with something unusable.
    Malformed,
    /// Any other provider failure.
    Unknown,
}

impl BackendErrorKind {
    /// Return a stable lowercase name for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendErrorKind::Auth => "auth",
            BackendErrorKind::RateLimit => "rate_limit",
            BackendErrorKind::Network => "network",
            BackendErrorKind::Timeout => "timeout",
            BackendErrorKind::Malformed => "malformed",
            BackendErrorKind::Unknown => "unknown",
        }
    }

    /// Whether a caller may reasonably retry the same request.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendErrorKind::Network | BackendErrorKind::Timeout)
    }
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a [`ChatBackend`].
///
/// `details` carries provider diagnostics (status codes, raw bodies) for logs
/// only; nothing in the engine branches on it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} backend error: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
    pub details: Option<Value>,
}

impl BackendError {
    /// Build an error of the given kind.
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Attach opaque diagnostics.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Auth, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::RateLimit, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Timeout, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Malformed, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Unknown, message)
    }
}

#[async_trait]
/// A language-model provider able to answer one chat turn.
pub trait ChatBackend: Send + Sync {
    /// Logical model name this backend is registered under.
    fn name(&self) -> &str;

    /// Send the assembled request and return the assistant text.
    async fn send_chat(&self, request: &ChatRequest) -> Result<String, BackendError>;
}
