//! Suppression of re-delivered platform messages.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Remembers `(group, message id)` pairs for a fixed window.
#[derive(Debug)]
pub struct DedupCache {
    seen: Mutex<HashMap<(String, String), Instant>>,
    ttl: Duration,
}

impl DedupCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Record the message and return `true` if it was not seen within the
    /// window. Expired ids are pruned on every call.
    pub fn first_seen(&self, group_id: &str, message_id: &str) -> bool {
        let now = Instant::now();
        let id = (group_id.to_string(), message_id.to_string());
        let mut seen = self.seen.lock();
        seen.retain(|_, at| now.duration_since(*at) < self.ttl);
        if seen.contains_key(&id) {
            return false;
        }
        seen.insert(id, now);
        true
    }

    /// Ids currently remembered.
    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::DedupCache;
    use std::time::Duration;

    #[test]
    fn repeat_within_window_is_rejected() {
        let cache = DedupCache::new(Duration::from_secs(300));
        assert!(cache.first_seen("g1", "m1"));
        assert!(!cache.first_seen("g1", "m1"));
        assert!(cache.first_seen("g2", "m1"));
    }

    #[test]
    fn dashes_do_not_merge_group_and_message_ids() {
        let cache = DedupCache::new(Duration::from_secs(300));
        assert!(cache.first_seen("a-b", "c"));
        assert!(cache.first_seen("a", "b-c"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn expired_ids_are_accepted_again() {
        let cache = DedupCache::new(Duration::ZERO);
        assert!(cache.first_seen("g1", "m1"));
        assert!(cache.first_seen("g1", "m1"));
        assert_eq!(cache.len(), 1);
    }
}
