//! Bounded, ordered chat history per conversation.

use log::{debug, info};
use parking_lot::RwLock;
use parley_rs_protocol::{ConversationKey, HistoryEntry};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

/// Persisted shape of the history store: user id -> group id -> entries.
pub type HistorySnapshot = BTreeMap<String, BTreeMap<String, Vec<HistoryEntry>>>;

/// In-memory history logs keyed by conversation.
///
/// Every log holds at most `max_entries` items; appending past the bound
/// evicts the oldest entries first.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    logs: Arc<RwLock<HashMap<ConversationKey, VecDeque<HistoryEntry>>>>,
    max_entries: usize,
}

impl HistoryStore {
    /// Create an empty store. A zero bound is raised to one.
    pub fn new(max_entries: usize) -> Self {
        Self {
            logs: Arc::new(RwLock::new(HashMap::new())),
            max_entries: max_entries.max(1),
        }
    }

    /// Maximum entries kept per conversation.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Append one entry, evicting from the front when over the bound.
    pub fn append(&self, key: &ConversationKey, entry: HistoryEntry) {
        self.append_all(key, [entry]);
    }

    /// Append several entries under a single lock so no other writer can
    /// interleave between them.
    pub fn append_all(
        &self,
        key: &ConversationKey,
        entries: impl IntoIterator<Item = HistoryEntry>,
    ) {
        let mut logs = self.logs.write();
        let log = logs.entry(key.clone()).or_default();
        for entry in entries {
            log.push_back(entry);
        }
        let mut evicted = 0;
        while log.len() > self.max_entries {
            log.pop_front();
            evicted += 1;
        }
        debug!(
            "history appended (key={}, len={}, evicted={})",
            key,
            log.len(),
            evicted
        );
    }

    /// Ordered entries for `key`, oldest first. An unknown key gets an empty
    /// log created for it.
    pub fn get(&self, key: &ConversationKey) -> Vec<HistoryEntry> {
        if let Some(log) = self.logs.read().get(key) {
            return log.iter().cloned().collect();
        }
        self.logs.write().entry(key.clone()).or_default();
        Vec::new()
    }

    /// Number of entries stored for `key`.
    pub fn len(&self, key: &ConversationKey) -> usize {
        self.logs.read().get(key).map_or(0, VecDeque::len)
    }

    /// Whether `key` has no entries.
    pub fn is_empty(&self, key: &ConversationKey) -> bool {
        self.len(key) == 0
    }

    /// Whether a log (possibly empty) exists for `key`.
    pub fn contains(&self, key: &ConversationKey) -> bool {
        self.logs.read().contains_key(key)
    }

    /// Empty the log for `key` but keep the key. Returns how many entries were dropped.
    pub fn clear(&self, key: &ConversationKey) -> usize {
        let mut logs = self.logs.write();
        let log = logs.entry(key.clone()).or_default();
        let dropped = log.len();
        log.clear();
        debug!("history cleared (key={}, dropped={})", key, dropped);
        dropped
    }

    /// Delete the log for `key` entirely.
    pub fn remove(&self, key: &ConversationKey) -> bool {
        self.logs.write().remove(key).is_some()
    }

    /// Keep only the logs whose key satisfies `keep`. Returns how many logs
    /// were deleted.
    pub fn retain(&self, mut keep: impl FnMut(&ConversationKey) -> bool) -> usize {
        let mut logs = self.logs.write();
        let before = logs.len();
        logs.retain(|key, _| keep(key));
        before - logs.len()
    }

    /// Full copy of every log in the persisted shape.
    pub fn export(&self) -> HistorySnapshot {
        let logs = self.logs.read();
        let mut snapshot = HistorySnapshot::new();
        for (key, log) in logs.iter() {
            snapshot
                .entry(key.user_id.clone())
                .or_default()
                .insert(key.group_id.clone(), log.iter().cloned().collect());
        }
        snapshot
    }

    /// Replace the whole store with `snapshot`, keeping only the most recent
    /// `max_entries` of each imported log.
    pub fn import(&self, snapshot: HistorySnapshot) {
        let mut next = HashMap::new();
        for (user_id, groups) in snapshot {
            for (group_id, entries) in groups {
                let skip = entries.len().saturating_sub(self.max_entries);
                let log: VecDeque<HistoryEntry> = entries.into_iter().skip(skip).collect();
                next.insert(ConversationKey::new(user_id.clone(), group_id), log);
            }
        }
        let count = next.len();
        *self.logs.write() = next;
        info!("history imported (conversations={})", count);
    }
}
