//! Maps logical model names to backends and runs chat turns.

use crate::error::AssistantError;
use crate::persistence::{FlushReason, FlushRequester};
use crate::sessions::SessionRegistry;
use log::{debug, info, warn};
use parking_lot::RwLock;
use parley_rs_memory::HistoryStore;
use parley_rs_protocol::{ChatBackend, ChatRequest, ConversationKey, HistoryEntry};
use std::collections::HashMap;
use std::sync::Arc;

/// Chat entry point used by commands and the public engine surface.
///
/// Settings and history are read before the backend call and written after
/// it; no store lock is held while the backend runs. History only changes
/// when the backend succeeds.
pub struct ModelRouter {
    backends: RwLock<HashMap<String, Arc<dyn ChatBackend>>>,
    sessions: SessionRegistry,
    history: HistoryStore,
    flush: FlushRequester,
}

impl ModelRouter {
    pub fn new(sessions: SessionRegistry, history: HistoryStore, flush: FlushRequester) -> Self {
        Self {
            backends: RwLock::new(HashMap::new()),
            sessions,
            history,
            flush,
        }
    }

    /// Bind a backend to its logical name, replacing any previous binding.
    pub fn register_backend(&self, backend: Arc<dyn ChatBackend>) {
        let name = backend.name().to_string();
        info!("registered chat backend (model={})", name);
        self.backends.write().insert(name, backend);
    }

    /// Names with a bound backend, sorted.
    pub fn backend_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn backend(&self, model: &str) -> Result<Arc<dyn ChatBackend>, AssistantError> {
        self.backends
            .read()
            .get(model)
            .cloned()
            .ok_or_else(|| AssistantError::UnknownModel(model.to_string()))
    }

    /// Answer `message` in the conversation of `user_id` in `group_id`.
    pub async fn chat(
        &self,
        message: &str,
        user_id: &str,
        group_id: &str,
    ) -> Result<String, AssistantError> {
        if message.trim().is_empty() {
            return Err(AssistantError::Validation(
                "Please include a message.".to_string(),
            ));
        }
        let key = ConversationKey::new(user_id, group_id);
        let settings = self.sessions.get_or_create(&key);
        let backend = self.backend(&settings.current_model)?;
        let request = ChatRequest {
            system_prompt: self.sessions.system_prompt(&key),
            history: self.history.get(&key),
            message: message.to_string(),
        };
        debug!(
            "dispatching chat (key={}, model={}, history_len={}, message_len={})",
            key,
            settings.current_model,
            request.history.len(),
            message.len()
        );

        match backend.send_chat(&request).await {
            Ok(reply) => {
                self.history.append_all(
                    &key,
                    [HistoryEntry::user(message), HistoryEntry::assistant(reply.clone())],
                );
                self.flush.request(FlushReason::ChatTurn);
                debug!("chat completed (key={}, reply_len={})", key, reply.len());
                Ok(reply)
            }
            Err(err) => {
                warn!(
                    "chat failed (key={}, model={}, kind={}, message={}, details={})",
                    key,
                    settings.current_model,
                    err.kind,
                    err.message,
                    err.details
                        .as_ref()
                        .map(|details| details.to_string())
                        .unwrap_or_default()
                );
                Err(err.into())
            }
        }
    }
}
