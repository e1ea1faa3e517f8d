//! Error types for the assistant engine.

use parley_rs_memory::CacheError;
use parley_rs_protocol::{
    BackendError, BackendErrorKind, DeliveryError, ProviderError, RenderError,
};
use thiserror::Error;

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// Backend rejected its credentials.
    #[error("model authentication failed: {0}")]
    Auth(BackendError),
    /// Backend throttled the request.
    #[error("model rate limited: {0}")]
    RateLimit(BackendError),
    /// Backend could not be reached.
    #[error("model unreachable: {0}")]
    Network(BackendError),
    /// Backend did not answer in time.
    #[error("model timed out: {0}")]
    Timeout(BackendError),
    /// Backend answered with an unusable payload.
    #[error("malformed model response: {0}")]
    MalformedResponse(BackendError),
    /// Any other backend failure.
    #[error("model request failed: {0}")]
    Backend(BackendError),
    /// Model name is not configured.
    #[error("unknown model: {0}")]
    UnknownModel(String),
    /// Caller input was rejected.
    #[error("invalid input: {0}")]
    Validation(String),
    /// Caller is not allowed to run the command.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// Render service failed.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// Content provider failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Messaging gateway failed.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    /// Cache directory could not be prepared.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
    /// A command handler panicked.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<BackendError> for AssistantError {
    fn from(err: BackendError) -> Self {
        match err.kind {
            BackendErrorKind::Auth => AssistantError::Auth(err),
            BackendErrorKind::RateLimit => AssistantError::RateLimit(err),
            BackendErrorKind::Network => AssistantError::Network(err),
            BackendErrorKind::Timeout => AssistantError::Timeout(err),
            BackendErrorKind::Malformed => AssistantError::MalformedResponse(err),
            BackendErrorKind::Unknown => AssistantError::Backend(err),
        }
    }
}

impl AssistantError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AssistantError::Network(_) | AssistantError::Timeout(_))
    }

    /// Short text safe to send back to the chat. Never includes provider
    /// bodies, status codes, or credentials.
    pub fn user_message(&self) -> String {
        match self {
            AssistantError::Auth(_) => {
                "Model credentials were rejected, please contact the admin.".to_string()
            }
            AssistantError::RateLimit(_) => "The model is busy, please try again later.".to_string(),
            AssistantError::Network(_) => {
                "The model service is unreachable, please try again.".to_string()
            }
            AssistantError::Timeout(_) => "The model timed out, please try again.".to_string(),
            AssistantError::MalformedResponse(_) => {
                "The model returned an unexpected response.".to_string()
            }
            AssistantError::Backend(_) => "The model request failed.".to_string(),
            AssistantError::UnknownModel(name) => format!("Unknown model: {name}"),
            AssistantError::Validation(message) | AssistantError::PermissionDenied(message) => {
                message.clone()
            }
            AssistantError::Render(_) => "Rendering failed.".to_string(),
            AssistantError::Provider(_) => "The content source is unavailable.".to_string(),
            AssistantError::Delivery(_) | AssistantError::Cache(_) | AssistantError::Internal(_) => {
                "Something went wrong, please try again.".to_string()
            }
        }
    }
}

/// A command handler failure with the context it ran in.
#[derive(Debug, Error)]
#[error("command {command} failed (user={user_id}, group={group_id}): {source}")]
pub struct CommandError {
    pub command: String,
    pub args: Vec<String>,
    pub user_id: String,
    pub group_id: String,
    #[source]
    pub source: AssistantError,
}

impl CommandError {
    /// Text to send back to the chat.
    pub fn user_message(&self) -> String {
        self.source.user_message()
    }
}

#[cfg(test)]
mod tests {
    use super::AssistantError;
    use parley_rs_protocol::BackendError;
    use pretty_assertions::assert_eq;

    #[test]
    fn backend_kinds_map_onto_engine_variants() {
        assert!(matches!(
            AssistantError::from(BackendError::auth("401")),
            AssistantError::Auth(_)
        ));
        assert!(matches!(
            AssistantError::from(BackendError::malformed("no choices")),
            AssistantError::MalformedResponse(_)
        ));
        assert!(AssistantError::from(BackendError::timeout("slow")).is_transient());
        assert!(!AssistantError::from(BackendError::rate_limit("429")).is_transient());
    }

    #[test]
    fn user_message_hides_backend_detail() {
        let err = AssistantError::from(BackendError::auth("invalid key sk-secret"));
        let message = err.user_message();
        assert!(!message.contains("sk-secret"));
        assert_eq!(
            AssistantError::UnknownModel("gpt".to_string()).user_message(),
            "Unknown model: gpt"
        );
    }
}
