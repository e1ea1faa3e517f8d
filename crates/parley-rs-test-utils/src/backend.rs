use async_trait::async_trait;
use parking_lot::Mutex;
use parley_rs_protocol::{BackendError, BackendErrorKind, ChatBackend, ChatRequest};
use serde_json::json;
use std::sync::Arc;

/// Always answers with the same text.
#[derive(Debug, Clone)]
pub struct FixedBackend {
    name: String,
    reply: String,
}

impl FixedBackend {
    pub fn new(name: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl ChatBackend for FixedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_chat(&self, _request: &ChatRequest) -> Result<String, BackendError> {
        Ok(self.reply.clone())
    }
}

/// Answers with a fixed text and keeps every request it saw.
#[derive(Debug, Clone)]
pub struct RecordingBackend {
    name: String,
    reply: String,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl RecordingBackend {
    pub fn new(name: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reply: reply.into(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ChatBackend for RecordingBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_chat(&self, request: &ChatRequest) -> Result<String, BackendError> {
        self.requests.lock().push(request.clone());
        Ok(self.reply.clone())
    }
}

/// Fails every call with the given kind.
#[derive(Debug, Clone)]
pub struct FailingBackend {
    name: String,
    kind: BackendErrorKind,
}

impl FailingBackend {
    pub fn new(name: impl Into<String>, kind: BackendErrorKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[async_trait]
impl ChatBackend for FailingBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_chat(&self, _request: &ChatRequest) -> Result<String, BackendError> {
        Err(BackendError::new(self.kind, "mock backend failure")
            .with_details(json!({ "backend": self.name, "kind": self.kind.as_str() })))
    }
}
