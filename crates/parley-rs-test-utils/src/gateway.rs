use async_trait::async_trait;
use parking_lot::Mutex;
use parley_rs_protocol::{DeliveryError, MessagingGateway, OutgoingMessage};
use std::collections::HashSet;
use std::sync::Arc;

/// Gateway that keeps every delivered message in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingGateway {
    groups: Vec<String>,
    failing: HashSet<String>,
    sent: Arc<Mutex<Vec<(String, OutgoingMessage)>>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups returned from `list_groups`.
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Reject every delivery to `group_id`.
    pub fn with_failing_group(mut self, group_id: impl Into<String>) -> Self {
        self.failing.insert(group_id.into());
        self
    }

    /// `(group, message)` pairs in delivery order.
    pub fn sent(&self) -> Vec<(String, OutgoingMessage)> {
        self.sent.lock().clone()
    }

    /// Text of every delivered message that had one.
    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|(_, message)| message.text.clone())
            .collect()
    }

    pub fn last(&self) -> Option<OutgoingMessage> {
        self.sent.lock().last().map(|(_, message)| message.clone())
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn send_message(
        &self,
        group_id: &str,
        message: OutgoingMessage,
    ) -> Result<(), DeliveryError> {
        if self.failing.contains(group_id) {
            return Err(DeliveryError::Rejected(format!("group {group_id} refused")));
        }
        self.sent.lock().push((group_id.to_string(), message));
        Ok(())
    }

    async fn list_groups(&self) -> Result<Vec<String>, DeliveryError> {
        Ok(self.groups.clone())
    }
}
