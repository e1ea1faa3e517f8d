//! Snapshot persistence: startup load, flush requests, and the background
//! writer that coalesces them.

use crate::sessions::{SessionRegistry, SettingsSnapshot};
use log::{debug, info, warn};
use parking_lot::Mutex;
use parley_rs_memory::{FileCache, HistorySnapshot, HistoryStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Cache key for the history snapshot.
pub const HISTORY_CACHE_KEY: &str = "chat_history";
/// Cache key for the session settings snapshot.
pub const SETTINGS_CACHE_KEY: &str = "user_settings";

/// Why a flush was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    ChatTurn,
    ModelChanged,
    PromptChanged,
    HistoryCleared,
    Sweep,
}

impl FlushReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushReason::ChatTurn => "chat_turn",
            FlushReason::ModelChanged => "model_changed",
            FlushReason::PromptChanged => "prompt_changed",
            FlushReason::HistoryCleared => "history_cleared",
            FlushReason::Sweep => "sweep",
        }
    }
}

/// Fire-and-forget handle used by mutating operations to ask for a flush.
#[derive(Debug, Clone)]
pub struct FlushRequester {
    tx: mpsc::UnboundedSender<FlushReason>,
}

impl FlushRequester {
    /// Create a requester and the receiving end consumed by the writer.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<FlushReason>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a flush. Never blocks; a closed writer only logs.
    pub fn request(&self, reason: FlushReason) {
        if self.tx.send(reason).is_err() {
            debug!("flush writer closed; request dropped (reason={})", reason.as_str());
        }
    }
}

/// Owns the cache and the stores it snapshots.
///
/// Every write is a full snapshot of both stores. If the engine never calls
/// [`Persistence::close`], dropping the last handle flushes once more.
pub struct Persistence {
    cache: FileCache,
    history: HistoryStore,
    sessions: SessionRegistry,
    closed: AtomicBool,
}

impl Persistence {
    pub fn new(cache: FileCache, history: HistoryStore, sessions: SessionRegistry) -> Self {
        Self {
            cache,
            history,
            sessions,
            closed: AtomicBool::new(false),
        }
    }

    /// Replace both stores with whatever the cache holds.
    pub fn load(&self) {
        let history: HistorySnapshot = self.cache.load(HISTORY_CACHE_KEY, HistorySnapshot::new());
        let settings: SettingsSnapshot =
            self.cache.load(SETTINGS_CACHE_KEY, SettingsSnapshot::new());
        self.history.import(history);
        self.sessions.import(settings);
        info!(
            "state restored from cache (sessions={}, root={})",
            self.sessions.len(),
            self.cache.root().display()
        );
    }

    /// Write both snapshots synchronously.
    pub fn flush_now(&self) {
        self.cache.save(HISTORY_CACHE_KEY, &self.history.export());
        self.cache.save(SETTINGS_CACHE_KEY, &self.sessions.export());
        debug!("state flushed (sessions={})", self.sessions.len());
    }

    /// Final flush; later drops are no-ops.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.flush_now();
            info!("persistence closed");
        }
    }
}

impl Drop for Persistence {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            warn!("persistence dropped without close; flushing");
            self.flush_now();
        }
    }
}

/// Spawn the writer task.
///
/// Pending requests are drained and answered with one snapshot write. The
/// interval timer adds a periodic write. The task exits when `shutdown` flips
/// to `true` or every requester is gone.
pub(crate) fn spawn_flush_worker(
    persistence: Arc<Persistence>,
    mut requests: mpsc::UnboundedReceiver<FlushReason>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    write_snapshot(&persistence, "periodic", 0).await;
                }
                request = requests.recv() => {
                    let Some(reason) = request else {
                        break;
                    };
                    let mut coalesced = 0;
                    while requests.try_recv().is_ok() {
                        coalesced += 1;
                    }
                    write_snapshot(&persistence, reason.as_str(), coalesced).await;
                }
            }
        }
        debug!("flush worker stopped");
    })
}

async fn write_snapshot(persistence: &Arc<Persistence>, reason: &str, coalesced: usize) {
    debug!("flushing state (reason={}, coalesced={})", reason, coalesced);
    let persistence = persistence.clone();
    if let Err(err) = tokio::task::spawn_blocking(move || persistence.flush_now()).await {
        warn!("flush task failed (error={})", err);
    }
}

/// Handles of spawned background tasks, joined on shutdown.
#[derive(Default)]
pub(crate) struct WorkerSet {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerSet {
    pub(crate) fn push(&self, handle: JoinHandle<()>) {
        self.handles.lock().push(handle);
    }

    pub(crate) fn take(&self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut *self.handles.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::ModelDefaults;
    use parley_rs_protocol::{ConversationKey, HistoryEntry};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn stores() -> (HistoryStore, SessionRegistry) {
        let history = HistoryStore::new(10);
        let (flush, _rx) = FlushRequester::channel();
        let defaults = ModelDefaults::new(
            "spark",
            BTreeMap::from([("spark".to_string(), "be kind".to_string())]),
        );
        let sessions = SessionRegistry::new(defaults, history.clone(), flush);
        (history, sessions)
    }

    #[test]
    fn flush_then_load_restores_both_stores() {
        let root = tempdir().expect("root");
        let key = ConversationKey::new("u1", "g1");
        {
            let (history, sessions) = stores();
            sessions.get_or_create(&key);
            history.append(&key, HistoryEntry::user("hello"));
            let persistence =
                Persistence::new(FileCache::new(root.path()).expect("cache"), history, sessions);
            persistence.close();
        }

        let (history, sessions) = stores();
        let persistence = Persistence::new(
            FileCache::new(root.path()).expect("cache"),
            history.clone(),
            sessions.clone(),
        );
        persistence.load();
        assert_eq!(history.get(&key), vec![HistoryEntry::user("hello")]);
        assert_eq!(sessions.len(), 1);
        persistence.close();
    }

    #[test]
    fn drop_without_close_still_flushes() {
        let root = tempdir().expect("root");
        let (history, sessions) = stores();
        history.append(&ConversationKey::new("u1", "g1"), HistoryEntry::user("kept"));
        drop(Persistence::new(
            FileCache::new(root.path()).expect("cache"),
            history,
            sessions,
        ));
        assert!(root.path().join("chat_history.json").exists());
        assert!(root.path().join("user_settings.json").exists());
    }

    #[tokio::test]
    async fn worker_writes_after_request_and_stops_on_shutdown() {
        let root = tempdir().expect("root");
        let (history, sessions) = stores();
        let (flush, rx) = FlushRequester::channel();
        let persistence = Arc::new(Persistence::new(
            FileCache::new(root.path()).expect("cache"),
            history.clone(),
            sessions,
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_flush_worker(
            persistence.clone(),
            rx,
            Duration::from_secs(3600),
            shutdown_rx,
        );

        history.append(&ConversationKey::new("u1", "g1"), HistoryEntry::user("x"));
        flush.request(FlushReason::ChatTurn);
        flush.request(FlushReason::ChatTurn);

        let path = root.path().join("chat_history.json");
        for _ in 0..50 {
            if path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(path.exists());

        shutdown_tx.send(true).expect("shutdown");
        handle.await.expect("join");
        persistence.close();
    }
}
