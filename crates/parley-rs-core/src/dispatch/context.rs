//! Types handed to command handlers.

use crate::error::AssistantError;
use crate::router::ModelRouter;
use crate::runtime::RuntimeState;
use crate::sessions::SessionRegistry;
use async_trait::async_trait;
use parley_rs_memory::HistoryStore;
use parley_rs_protocol::{ContentProvider, ConversationKey};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What a handler produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Plain text.
    Text(String),
    /// Markup for the render service, plus text sent when rendering is
    /// unavailable or fails.
    Markup { markup: String, fallback: String },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text(text.into())
    }

    /// Text form of the reply.
    pub fn fallback_text(&self) -> &str {
        match self {
            Reply::Text(text) => text,
            Reply::Markup { fallback, .. } => fallback,
        }
    }
}

/// Menu metadata for a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    /// Token (or pattern description) the command answers to.
    pub token: String,
    pub usage: String,
    pub summary: String,
    /// Only the bot owner may run it.
    pub master_only: bool,
}

impl CommandInfo {
    pub fn new(token: &str, usage: &str, summary: &str) -> Self {
        Self {
            token: token.to_string(),
            usage: usage.to_string(),
            summary: summary.to_string(),
            master_only: false,
        }
    }

    pub fn master_only(mut self) -> Self {
        self.master_only = true;
        self
    }
}

/// Engine parts available to every command.
pub struct CommandServices {
    pub router: Arc<ModelRouter>,
    pub sessions: SessionRegistry,
    pub history: HistoryStore,
    pub runtime: Arc<RuntimeState>,
    pub content: Option<Arc<dyn ContentProvider>>,
    pub bot_name: String,
}

impl CommandServices {
    /// Content provider or a validation error when none is wired.
    pub fn content(&self) -> Result<&Arc<dyn ContentProvider>, AssistantError> {
        self.content.as_ref().ok_or_else(|| {
            AssistantError::Validation("No content source is configured.".to_string())
        })
    }
}

/// Per-invocation context.
pub struct CommandContext {
    /// Token as typed, after alias resolution.
    pub command: String,
    /// Text after the command token, leading whitespace removed.
    pub rest: String,
    /// Named captures when resolved through a pattern.
    pub captures: BTreeMap<String, String>,
    pub key: ConversationKey,
    pub message_id: String,
    pub sender_name: Option<String>,
    pub services: Arc<CommandServices>,
    /// Every registered command, in registration order.
    pub catalog: Arc<Vec<CommandInfo>>,
}

impl CommandContext {
    pub fn user_id(&self) -> &str {
        &self.key.user_id
    }

    pub fn group_id(&self) -> &str {
        &self.key.group_id
    }

    pub fn capture(&self, name: &str) -> Option<&str> {
        self.captures.get(name).map(String::as_str)
    }

    /// Fail unless the caller is the bot owner.
    pub fn require_master(&self, action: &str) -> Result<(), AssistantError> {
        if self.services.runtime.is_master(self.user_id()) {
            Ok(())
        } else {
            Err(AssistantError::PermissionDenied(format!(
                "Only the bot owner can {action}."
            )))
        }
    }
}

#[async_trait]
/// A single chat command.
pub trait CommandHandler: Send + Sync {
    fn info(&self) -> CommandInfo;

    async fn execute(&self, args: &[String], ctx: &CommandContext) -> Result<Reply, AssistantError>;
}
