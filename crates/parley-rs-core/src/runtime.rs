//! Process-wide bot state read on every dispatch.

use log::info;
use std::sync::atomic::{AtomicBool, Ordering};

/// Power switch and owner identity shared by the dispatcher and commands.
#[derive(Debug)]
pub struct RuntimeState {
    enabled: AtomicBool,
    master_id: Option<String>,
}

impl RuntimeState {
    pub fn new(enabled: bool, master_id: Option<String>) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            master_id,
        }
    }

    /// Whether the bot answers non-master users.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Flip the power switch. Returns the previous state.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        let previous = self.enabled.swap(enabled, Ordering::AcqRel);
        if previous != enabled {
            info!("bot power changed (enabled={})", enabled);
        }
        previous
    }

    /// Whether `user_id` is the configured owner.
    pub fn is_master(&self, user_id: &str) -> bool {
        self.master_id.as_deref() == Some(user_id)
    }

    pub fn master_id(&self) -> Option<&str> {
        self.master_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::RuntimeState;

    #[test]
    fn master_check_requires_configured_owner() {
        let state = RuntimeState::new(true, None);
        assert!(!state.is_master(""));
        let state = RuntimeState::new(true, Some("10001".to_string()));
        assert!(state.is_master("10001"));
        assert!(!state.is_master("10002"));
    }

    #[test]
    fn set_enabled_reports_previous_state() {
        let state = RuntimeState::new(true, None);
        assert!(state.set_enabled(false));
        assert!(!state.is_enabled());
        assert!(!state.set_enabled(false));
    }
}
