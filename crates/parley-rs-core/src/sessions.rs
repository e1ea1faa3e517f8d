//! Per-conversation settings with lazy creation and idle expiry.

use crate::error::AssistantError;
use crate::persistence::{FlushReason, FlushRequester};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use parking_lot::RwLock;
use parley_rs_config::ParleyConfig;
use parley_rs_memory::HistoryStore;
use parley_rs_protocol::ConversationKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Settings for one conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    /// Logical model answering this conversation.
    pub current_model: String,
    /// System prompt per model name.
    pub system_prompts: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

/// Persisted shape of the registry: user id -> group id -> settings.
pub type SettingsSnapshot = BTreeMap<String, BTreeMap<String, SessionSettings>>;

/// Result of a system prompt update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChange {
    /// Prompt matched the stored one; nothing changed.
    Unchanged,
    /// Prompt replaced and the conversation history cleared.
    Replaced,
}

/// Global model table new sessions are seeded from. Read-only at runtime.
#[derive(Debug, Clone)]
pub struct ModelDefaults {
    default_model: String,
    prompts: BTreeMap<String, String>,
}

impl ModelDefaults {
    /// `prompts` maps every configured model to its default system prompt.
    pub fn new(default_model: impl Into<String>, prompts: BTreeMap<String, String>) -> Self {
        Self {
            default_model: default_model.into(),
            prompts,
        }
    }

    /// Build defaults from the `models` config section.
    pub fn from_config(config: &ParleyConfig) -> Self {
        let prompts = config
            .models
            .entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.system_prompt.clone()))
            .collect();
        Self::new(config.models.default.clone(), prompts)
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Configured model names in sorted order.
    pub fn model_names(&self) -> Vec<String> {
        self.prompts.keys().cloned().collect()
    }

    pub fn is_known(&self, model: &str) -> bool {
        self.prompts.contains_key(model)
    }

    fn seed(&self, now: DateTime<Utc>) -> SessionSettings {
        SessionSettings {
            current_model: self.default_model.clone(),
            system_prompts: self.prompts.clone(),
            created_at: now,
            last_active: now,
        }
    }
}

/// Registry of per-conversation settings.
///
/// Mutations that must survive a crash ask the flush writer for a snapshot.
/// Prompt changes and expiry also reach into the history store, since both
/// invalidate the conversation log.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<ConversationKey, SessionSettings>>>,
    defaults: Arc<ModelDefaults>,
    history: HistoryStore,
    flush: FlushRequester,
}

impl SessionRegistry {
    pub fn new(defaults: ModelDefaults, history: HistoryStore, flush: FlushRequester) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            defaults: Arc::new(defaults),
            history,
            flush,
        }
    }

    pub fn defaults(&self) -> &ModelDefaults {
        &self.defaults
    }

    /// Number of known conversations.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the settings for `key`, creating defaults on first access.
    /// Every call refreshes `last_active`.
    pub fn get_or_create(&self, key: &ConversationKey) -> SessionSettings {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let settings = sessions.entry(key.clone()).or_insert_with(|| {
            info!(
                "created session (key={}, model={})",
                key,
                self.defaults.default_model()
            );
            self.defaults.seed(now)
        });
        settings.last_active = now;
        settings.clone()
    }

    /// Settings for `key` without creating or touching them.
    pub fn peek(&self, key: &ConversationKey) -> Option<SessionSettings> {
        self.sessions.read().get(key).cloned()
    }

    /// System prompt for the key's current model.
    pub fn system_prompt(&self, key: &ConversationKey) -> Option<String> {
        let settings = self.get_or_create(key);
        settings
            .system_prompts
            .get(&settings.current_model)
            .cloned()
            .or_else(|| self.defaults.prompts.get(&settings.current_model).cloned())
    }

    /// Switch the conversation to `model`.
    pub fn set_model(&self, key: &ConversationKey, model: &str) -> Result<(), AssistantError> {
        if !self.defaults.is_known(model) {
            debug!("rejected model switch (key={}, model={})", key, model);
            return Err(AssistantError::UnknownModel(model.to_string()));
        }
        self.get_or_create(key);
        {
            let mut sessions = self.sessions.write();
            if let Some(settings) = sessions.get_mut(key) {
                settings.current_model = model.to_string();
                if !settings.system_prompts.contains_key(model)
                    && let Some(prompt) = self.defaults.prompts.get(model)
                {
                    settings
                        .system_prompts
                        .insert(model.to_string(), prompt.clone());
                }
            }
        }
        info!("model switched (key={}, model={})", key, model);
        self.flush.request(FlushReason::ModelChanged);
        Ok(())
    }

    /// Set the system prompt for the key's current model. A different prompt
    /// clears the conversation history.
    pub fn set_system_prompt(&self, key: &ConversationKey, prompt: &str) -> PromptChange {
        let settings = self.get_or_create(key);
        let model = settings.current_model;
        let effective = settings
            .system_prompts
            .get(&model)
            .or_else(|| self.defaults.prompts.get(&model));
        if effective.map(String::as_str) == Some(prompt) {
            debug!("system prompt unchanged (key={}, model={})", key, model);
            return PromptChange::Unchanged;
        }
        if let Some(settings) = self.sessions.write().get_mut(key) {
            settings
                .system_prompts
                .insert(model.clone(), prompt.to_string());
        }
        let dropped = self.history.clear(key);
        info!(
            "system prompt replaced (key={}, model={}, prompt_len={}, history_dropped={})",
            key,
            model,
            prompt.len(),
            dropped
        );
        self.flush.request(FlushReason::PromptChanged);
        PromptChange::Replaced
    }

    /// Empty the conversation history for `key`.
    pub fn clear_history(&self, key: &ConversationKey) -> usize {
        let dropped = self.history.clear(key);
        self.flush.request(FlushReason::HistoryCleared);
        dropped
    }

    /// Delete conversations idle for longer than `max_idle_days`.
    pub fn sweep_expired(&self, max_idle_days: u32) -> usize {
        self.sweep_expired_at(max_idle_days, Utc::now())
    }

    /// [`SessionRegistry::sweep_expired`] against an explicit clock. History
    /// logs without a live session are deleted as well.
    pub fn sweep_expired_at(&self, max_idle_days: u32, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::days(i64::from(max_idle_days));
        let (expired, orphaned) = {
            let mut sessions = self.sessions.write();
            let before = sessions.len();
            sessions.retain(|_, settings| settings.last_active >= cutoff);
            let expired = before - sessions.len();
            let removed_logs = self.history.retain(|key| sessions.contains_key(key));
            (expired, removed_logs)
        };
        if expired > 0 || orphaned > 0 {
            info!(
                "expired idle sessions (removed={}, history_removed={}, max_idle_days={})",
                expired, orphaned, max_idle_days
            );
            self.flush.request(FlushReason::Sweep);
        }
        expired
    }

    /// Full copy in the persisted shape.
    pub fn export(&self) -> SettingsSnapshot {
        let mut snapshot = SettingsSnapshot::new();
        for (key, settings) in self.sessions.read().iter() {
            snapshot
                .entry(key.user_id.clone())
                .or_default()
                .insert(key.group_id.clone(), settings.clone());
        }
        snapshot
    }

    /// Replace every session with `snapshot`.
    pub fn import(&self, snapshot: SettingsSnapshot) {
        let mut next = HashMap::new();
        for (user_id, groups) in snapshot {
            for (group_id, settings) in groups {
                next.insert(ConversationKey::new(user_id.clone(), group_id), settings);
            }
        }
        *self.sessions.write() = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_rs_protocol::HistoryEntry;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn registry() -> (SessionRegistry, HistoryStore, UnboundedReceiver<FlushReason>) {
        let history = HistoryStore::new(10);
        let (flush, rx) = FlushRequester::channel();
        let defaults = ModelDefaults::new(
            "spark",
            BTreeMap::from([
                ("spark".to_string(), "spark prompt".to_string()),
                ("deepseek".to_string(), "deepseek prompt".to_string()),
            ]),
        );
        (
            SessionRegistry::new(defaults, history.clone(), flush),
            history,
            rx,
        )
    }

    fn drain(rx: &mut UnboundedReceiver<FlushReason>) -> Vec<FlushReason> {
        let mut reasons = Vec::new();
        while let Ok(reason) = rx.try_recv() {
            reasons.push(reason);
        }
        reasons
    }

    fn key() -> ConversationKey {
        ConversationKey::new("u1", "g1")
    }

    #[test]
    fn get_or_create_seeds_defaults_and_refreshes_activity() {
        let (registry, _, _rx) = registry();
        let first = registry.get_or_create(&key());
        assert_eq!(first.current_model, "spark");
        assert_eq!(
            first.system_prompts.get("deepseek").map(String::as_str),
            Some("deepseek prompt")
        );
        let second = registry.get_or_create(&key());
        assert_eq!(second.created_at, first.created_at);
        assert!(second.last_active >= first.last_active);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn set_model_rejects_unknown_and_keeps_current() {
        let (registry, _, mut rx) = registry();
        let err = registry.set_model(&key(), "unknown-model").unwrap_err();
        assert!(matches!(err, AssistantError::UnknownModel(name) if name == "unknown-model"));
        assert_eq!(registry.get_or_create(&key()).current_model, "spark");
        assert_eq!(drain(&mut rx), Vec::new());
    }

    #[test]
    fn set_model_switches_and_requests_flush() {
        let (registry, _, mut rx) = registry();
        registry.set_model(&key(), "deepseek").expect("switch");
        assert_eq!(registry.get_or_create(&key()).current_model, "deepseek");
        assert_eq!(
            registry.system_prompt(&key()).as_deref(),
            Some("deepseek prompt")
        );
        assert_eq!(drain(&mut rx), vec![FlushReason::ModelChanged]);
    }

    #[test]
    fn same_prompt_is_unchanged_and_keeps_history() {
        let (registry, history, mut rx) = registry();
        history.append(&key(), HistoryEntry::user("hi"));
        let change = registry.set_system_prompt(&key(), "spark prompt");
        assert_eq!(change, PromptChange::Unchanged);
        assert_eq!(history.len(&key()), 1);
        assert_eq!(drain(&mut rx), Vec::new());
    }

    #[test]
    fn different_prompt_replaces_and_clears_history() {
        let (registry, history, mut rx) = registry();
        history.append(&key(), HistoryEntry::user("hi"));
        let change = registry.set_system_prompt(&key(), "talk like a pirate");
        assert_eq!(change, PromptChange::Replaced);
        assert!(history.is_empty(&key()));
        assert_eq!(
            registry.system_prompt(&key()).as_deref(),
            Some("talk like a pirate")
        );
        assert_eq!(drain(&mut rx), vec![FlushReason::PromptChanged]);
    }

    #[test]
    fn prompt_change_does_not_touch_global_defaults() {
        let (registry, _, _rx) = registry();
        registry.set_system_prompt(&key(), "custom");
        let other = ConversationKey::new("u2", "g1");
        assert_eq!(registry.system_prompt(&other).as_deref(), Some("spark prompt"));
    }

    #[test]
    fn sweep_removes_only_sessions_past_retention() {
        let (registry, history, mut rx) = registry();
        let now = Utc::now();
        let settings = |idle_days: i64| SessionSettings {
            current_model: "spark".to_string(),
            system_prompts: BTreeMap::new(),
            created_at: now - Duration::days(60),
            last_active: now - Duration::days(idle_days),
        };
        registry.import(BTreeMap::from([(
            "u1".to_string(),
            BTreeMap::from([
                ("old".to_string(), settings(31)),
                ("recent".to_string(), settings(29)),
            ]),
        )]));
        let old = ConversationKey::new("u1", "old");
        history.append(&old, HistoryEntry::user("stale"));

        let removed = registry.sweep_expired_at(30, now);

        assert_eq!(removed, 1);
        assert!(registry.peek(&old).is_none());
        assert!(registry.peek(&ConversationKey::new("u1", "recent")).is_some());
        assert!(!history.contains(&old));
        assert_eq!(drain(&mut rx), vec![FlushReason::Sweep]);
    }

    #[test]
    fn sweep_with_nothing_expired_does_not_flush() {
        let (registry, _, mut rx) = registry();
        registry.get_or_create(&key());
        assert_eq!(registry.sweep_expired(30), 0);
        assert_eq!(drain(&mut rx), Vec::new());
    }

    #[test]
    fn sweep_drops_history_without_a_session() {
        let (registry, history, mut rx) = registry();
        let live = key();
        registry.get_or_create(&live);
        history.append(&live, HistoryEntry::user("hi"));
        let viewed = ConversationKey::new("u9", "g1");
        let cleared = ConversationKey::new("u9", "g2");
        history.get(&viewed);
        history.clear(&cleared);

        let removed = registry.sweep_expired_at(30, Utc::now());

        assert_eq!(removed, 0);
        assert!(history.contains(&live));
        assert!(!history.contains(&viewed));
        assert!(!history.contains(&cleared));
        assert!(!history.export().contains_key("u9"));
        assert_eq!(drain(&mut rx), vec![FlushReason::Sweep]);
    }

    #[test]
    fn default_prompt_counts_as_current_when_session_has_none() {
        let (registry, history, mut rx) = registry();
        let now = Utc::now();
        registry.import(BTreeMap::from([(
            "u1".to_string(),
            BTreeMap::from([(
                "g1".to_string(),
                SessionSettings {
                    current_model: "spark".to_string(),
                    system_prompts: BTreeMap::new(),
                    created_at: now,
                    last_active: now,
                },
            )]),
        )]));
        history.append(&key(), HistoryEntry::user("hi"));

        let change = registry.set_system_prompt(&key(), "spark prompt");

        assert_eq!(change, PromptChange::Unchanged);
        assert_eq!(history.len(&key()), 1);
        assert_eq!(drain(&mut rx), Vec::new());
    }

    #[test]
    fn export_import_round_trips() {
        let (original, _, _rx) = registry();
        original.set_model(&key(), "deepseek").expect("switch");
        let snapshot = original.export();
        let (restored, _, _rx2) = registry();
        restored.import(snapshot.clone());
        assert_eq!(restored.export(), snapshot);
    }
}
