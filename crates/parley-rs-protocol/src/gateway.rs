//! Messaging platform boundary.

use crate::ConversationKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A message delivered by the platform adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncomingMessage {
    pub user_id: String,
    pub group_id: String,
    /// Platform message id, used for de-duplication.
    pub message_id: String,
    /// Text exactly as received.
    pub raw_text: String,
    #[serde(default)]
    pub sender_name: Option<String>,
}

impl IncomingMessage {
    /// Conversation this message belongs to.
    pub fn key(&self) -> ConversationKey {
        ConversationKey::new(self.user_id.clone(), self.group_id.clone())
    }
}

/// Content handed to the platform for delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: Option<String>,
    /// Encoded image (PNG) to attach.
    pub image: Option<Vec<u8>>,
    /// Platform message id to quote in the reply.
    pub reply_to: Option<String>,
}

impl OutgoingMessage {
    /// Plain text message.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Image-only message.
    pub fn image(bytes: Vec<u8>) -> Self {
        Self {
            image: Some(bytes),
            ..Self::default()
        }
    }

    /// Quote the given platform message.
    pub fn with_reply_to(mut self, message_id: impl Into<String>) -> Self {
        self.reply_to = Some(message_id.into());
        self
    }
}

/// Errors returned by a messaging gateway.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The platform refused the message.
    #[error("message rejected: {0}")]
    Rejected(String),
    /// The platform connection is not available.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
/// Outbound side of the messaging platform.
pub trait MessagingGateway: Send + Sync {
    /// Deliver a message to a group.
    async fn send_message(
        &self,
        group_id: &str,
        message: OutgoingMessage,
    ) -> Result<(), DeliveryError>;

    /// Groups the bot is a member of.
    async fn list_groups(&self) -> Result<Vec<String>, DeliveryError>;
}
