//! Shared types for Parley conversations, model backends, and the platform
//! collaborators the engine talks to.

mod backend;
mod gateway;
mod services;

pub use backend::{BackendError, BackendErrorKind, ChatBackend};
pub use gateway::{DeliveryError, IncomingMessage, MessagingGateway, OutgoingMessage};
pub use services::{
    ContentProvider, Digest, Headline, ProviderError, RenderError, RenderService, TrendingItem,
    TrendingPlatform,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one conversation: a user inside a group.
///
/// Both ids are compared by exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationKey {
    /// Platform user id.
    pub user_id: String,
    /// Platform group id.
    pub group_id: String,
}

impl ConversationKey {
    /// Build a key from a user id and a group id.
    pub fn new(user_id: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            group_id: group_id.into(),
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.group_id)
    }
}

/// Speaker of a recorded history entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message authored by the user.
    User,
    /// Reply produced by a model backend.
    Assistant,
}

impl Role {
    /// Return the role as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn in a conversation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Who produced the content.
    pub role: Role,
    /// Raw message text.
    pub content: String,
}

impl HistoryEntry {
    /// Build a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Build an assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Role of a message in an outbound model request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

impl From<Role> for PromptRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => PromptRole::User,
            Role::Assistant => PromptRole::Assistant,
        }
    }
}

/// A message in the ordered sequence sent to a backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

/// Everything a backend needs to answer one chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// System prompt for the active model, if any.
    pub system_prompt: Option<String>,
    /// Prior turns, oldest first.
    pub history: Vec<HistoryEntry>,
    /// The new user message.
    pub message: String,
}

impl ChatRequest {
    /// Flatten the request into the message order every backend sends:
    /// system prompt (when non-empty), then history, then the new user turn.
    pub fn messages(&self) -> Vec<PromptMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        if let Some(prompt) = self
            .system_prompt
            .as_deref()
            .filter(|prompt| !prompt.trim().is_empty())
        {
            messages.push(PromptMessage {
                role: PromptRole::System,
                content: prompt.to_string(),
            });
        }
        messages.extend(self.history.iter().map(|entry| PromptMessage {
            role: entry.role.into(),
            content: entry.content.clone(),
        }));
        messages.push(PromptMessage {
            role: PromptRole::User,
            content: self.message.clone(),
        });
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn messages_put_system_first_and_new_turn_last() {
        let request = ChatRequest {
            system_prompt: Some("be brief".to_string()),
            history: vec![HistoryEntry::user("hi"), HistoryEntry::assistant("hello")],
            message: "how are you".to_string(),
        };

        let roles: Vec<PromptRole> = request.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                PromptRole::System,
                PromptRole::User,
                PromptRole::Assistant,
                PromptRole::User
            ]
        );
        assert_eq!(
            request.messages().last().map(|m| m.content.as_str()),
            Some("how are you")
        );
    }

    #[test]
    fn blank_system_prompt_is_omitted() {
        let request = ChatRequest {
            system_prompt: Some("   ".to_string()),
            history: Vec::new(),
            message: "ping".to_string(),
        };
        assert_eq!(
            request.messages(),
            vec![PromptMessage {
                role: PromptRole::User,
                content: "ping".to_string(),
            }]
        );
    }

    #[test]
    fn history_entry_serializes_lowercase_role() {
        let value = serde_json::to_value(HistoryEntry::assistant("ok")).expect("json");
        assert_eq!(value, serde_json::json!({"role": "assistant", "content": "ok"}));
    }
}
