//! The assistant engine: wires stores, router, and dispatcher together and
//! drives inbound messages through them.

use crate::backends::OpenAiCompatibleBackend;
use crate::commands;
use crate::dedup::DedupCache;
use crate::dispatch::{CommandDispatcher, CommandInfo, CommandServices, DispatchOutcome, Reply};
use crate::error::AssistantError;
use crate::persistence::{FlushReason, FlushRequester, Persistence, WorkerSet, spawn_flush_worker};
use crate::router::ModelRouter;
use crate::runtime::RuntimeState;
use crate::sessions::{ModelDefaults, SessionRegistry};
use chrono::{Local, NaiveDate, Timelike};
use log::{debug, info, warn};
use parking_lot::Mutex;
use parley_rs_config::ParleyConfig;
use parley_rs_memory::{FileCache, HistoryStore};
use parley_rs_protocol::{
    ChatBackend, ContentProvider, ConversationKey, IncomingMessage, MessagingGateway,
    OutgoingMessage, RenderService,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How often the sweeper checks whether today's sweep is due.
const SWEEP_CHECK_INTERVAL: Duration = Duration::from_secs(60);

type TurnLocks = Arc<Mutex<HashMap<ConversationKey, Arc<tokio::sync::Mutex<()>>>>>;

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Same `(group, message id)` was already handled recently.
    Duplicate,
    /// Not a command.
    Ignored,
    /// Bot is off and the sender is not the owner.
    Suppressed,
    /// A reply was sent.
    Replied,
    /// The command failed; an error message was sent.
    Failed,
}

/// Delivery counts for a broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Builder for [`Assistant`].
pub struct AssistantBuilder {
    config: ParleyConfig,
    gateway: Option<Arc<dyn MessagingGateway>>,
    render: Option<Arc<dyn RenderService>>,
    content: Option<Arc<dyn ContentProvider>>,
    backends: Vec<Arc<dyn ChatBackend>>,
    cache_dir: Option<PathBuf>,
}

impl AssistantBuilder {
    pub fn new(config: ParleyConfig) -> Self {
        Self {
            config,
            gateway: None,
            render: None,
            content: None,
            backends: Vec::new(),
            cache_dir: None,
        }
    }

    /// Platform used to send replies. Required.
    pub fn gateway(mut self, gateway: Arc<dyn MessagingGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn render(mut self, render: Arc<dyn RenderService>) -> Self {
        self.render = Some(render);
        self
    }

    pub fn content(mut self, content: Arc<dyn ContentProvider>) -> Self {
        self.content = Some(content);
        self
    }

    /// Bind a backend under its own name instead of the HTTP backend the
    /// config would create for it.
    pub fn backend(mut self, backend: Arc<dyn ChatBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Override `cache.dir`.
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Restore persisted state and assemble the engine. Background tasks
    /// start with [`Assistant::start`].
    pub fn build(self) -> Result<Assistant, AssistantError> {
        let config = self.config;
        config
            .validate()
            .map_err(|err| AssistantError::Validation(err.to_string()))?;
        let gateway = self.gateway.ok_or_else(|| {
            AssistantError::Validation("a messaging gateway is required".to_string())
        })?;

        let cache_dir = self
            .cache_dir
            .unwrap_or_else(|| PathBuf::from(&config.cache.dir));
        let cache = FileCache::new(cache_dir)?;
        let history = HistoryStore::new(config.history.max_entries);
        let (flush, flush_rx) = FlushRequester::channel();
        let sessions = SessionRegistry::new(
            ModelDefaults::from_config(&config),
            history.clone(),
            flush.clone(),
        );
        let persistence = Arc::new(Persistence::new(cache, history.clone(), sessions.clone()));
        persistence.load();

        let router = Arc::new(ModelRouter::new(sessions.clone(), history.clone(), flush));
        for backend in self.backends {
            router.register_backend(backend);
        }
        let bound = router.backend_names();
        for (name, entry) in &config.models.entries {
            if bound.contains(name) {
                continue;
            }
            if entry.resolve_api_key().is_none() {
                warn!("model has no credential; calls will fail (model={})", name);
            }
            match OpenAiCompatibleBackend::from_entry(name.clone(), entry) {
                Ok(backend) => router.register_backend(Arc::new(backend)),
                Err(err) => warn!("failed to create backend (model={}, error={})", name, err),
            }
        }

        let runtime = Arc::new(RuntimeState::new(
            config.bot.enabled,
            config.bot.master.clone(),
        ));
        let services = Arc::new(CommandServices {
            router: router.clone(),
            sessions: sessions.clone(),
            history: history.clone(),
            runtime: runtime.clone(),
            content: self.content.clone(),
            bot_name: config.bot.name.clone(),
        });
        let mut dispatcher = CommandDispatcher::new(services);
        commands::register_builtin(&mut dispatcher)?;
        for (alias, target) in &config.commands.aliases {
            dispatcher.add_alias(alias, target);
        }

        let (shutdown, _) = watch::channel(false);
        info!(
            "assistant ready (name={}, models={}, commands={})",
            config.bot.name,
            bound_models(&router),
            dispatcher.catalog().len()
        );
        Ok(Assistant {
            dedup: DedupCache::new(Duration::from_secs(config.dedup.ttl_secs)),
            config,
            router,
            sessions,
            history,
            runtime,
            dispatcher,
            gateway,
            render: self.render,
            content: self.content,
            persistence,
            turn_locks: Arc::new(Mutex::new(HashMap::new())),
            flush_rx: Mutex::new(Some(flush_rx)),
            shutdown,
            workers: WorkerSet::default(),
        })
    }
}

fn bound_models(router: &ModelRouter) -> String {
    router.backend_names().join(",")
}

/// Conversation engine for one bot.
///
/// Messages for the same conversation are handled one at a time; different
/// conversations proceed in parallel.
pub struct Assistant {
    config: ParleyConfig,
    router: Arc<ModelRouter>,
    sessions: SessionRegistry,
    history: HistoryStore,
    runtime: Arc<RuntimeState>,
    dispatcher: CommandDispatcher,
    gateway: Arc<dyn MessagingGateway>,
    render: Option<Arc<dyn RenderService>>,
    content: Option<Arc<dyn ContentProvider>>,
    persistence: Arc<Persistence>,
    dedup: DedupCache,
    turn_locks: TurnLocks,
    flush_rx: Mutex<Option<UnboundedReceiver<FlushReason>>>,
    shutdown: watch::Sender<bool>,
    workers: WorkerSet,
}

impl Assistant {
    pub fn builder(config: ParleyConfig) -> AssistantBuilder {
        AssistantBuilder::new(config)
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn runtime(&self) -> &Arc<RuntimeState> {
        &self.runtime
    }

    pub fn router(&self) -> &Arc<ModelRouter> {
        &self.router
    }

    /// Registered commands in menu order.
    pub fn commands(&self) -> Arc<Vec<CommandInfo>> {
        self.dispatcher.catalog()
    }

    /// Spawn the flush writer and the idle sweeper. Must run inside a Tokio
    /// runtime. Calling it twice is a no-op.
    pub fn start(&self) {
        let Some(flush_rx) = self.flush_rx.lock().take() else {
            warn!("assistant already started");
            return;
        };
        let interval = Duration::from_secs(self.config.cache.flush_interval_secs.max(1));
        self.workers.push(spawn_flush_worker(
            self.persistence.clone(),
            flush_rx,
            interval,
            self.shutdown.subscribe(),
        ));
        self.workers.push(spawn_sweeper(
            self.sessions.clone(),
            self.turn_locks.clone(),
            self.config.sessions.retention_days,
            self.config.sessions.sweep_hour,
            self.shutdown.subscribe(),
        ));
        info!(
            "background workers started (flush_interval_secs={}, sweep_hour={})",
            interval.as_secs(),
            self.config.sessions.sweep_hour
        );
    }

    /// Stop background work and write a final snapshot.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        for handle in self.workers.take() {
            if let Err(err) = handle.await {
                warn!("background worker ended abnormally (error={})", err);
            }
        }
        self.persistence.close();
        info!("assistant stopped");
    }

    fn turn_lock(&self, key: &ConversationKey) -> Arc<tokio::sync::Mutex<()>> {
        self.turn_locks
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Handle one message from the platform and send whatever reply it
    /// produces.
    pub async fn handle_incoming(&self, message: IncomingMessage) -> HandleOutcome {
        if !self
            .dedup
            .first_seen(&message.group_id, &message.message_id)
        {
            debug!(
                "duplicate message dropped (group={}, message_id={})",
                message.group_id, message.message_id
            );
            return HandleOutcome::Duplicate;
        }

        let key = message.key();
        let lock = self.turn_lock(&key);
        let _turn = lock.lock().await;

        match self.dispatcher.dispatch(&message).await {
            Ok(DispatchOutcome::NotCommand) => HandleOutcome::Ignored,
            Ok(DispatchOutcome::Suppressed) => HandleOutcome::Suppressed,
            Ok(DispatchOutcome::Handled { reply, .. }) => {
                let outgoing = self
                    .prepare(reply)
                    .await
                    .with_reply_to(message.message_id.clone());
                self.deliver(&message.group_id, outgoing).await;
                HandleOutcome::Replied
            }
            Err(err) => {
                warn!(
                    "command failed (command={}, user={}, group={}, args={}, error={})",
                    err.command,
                    err.user_id,
                    err.group_id,
                    err.args.len(),
                    err.source
                );
                let outgoing = OutgoingMessage::text(err.user_message())
                    .with_reply_to(message.message_id.clone());
                self.deliver(&message.group_id, outgoing).await;
                HandleOutcome::Failed
            }
        }
    }

    /// Chat surface for schedulers and embedders. Serialized with inbound
    /// commands for the same conversation.
    pub async fn chat(
        &self,
        message: &str,
        user_id: &str,
        group_id: &str,
    ) -> Result<String, AssistantError> {
        let key = ConversationKey::new(user_id, group_id);
        let lock = self.turn_lock(&key);
        let _turn = lock.lock().await;
        self.router.chat(message, user_id, group_id).await
    }

    /// Send `message` to every group the gateway reports.
    pub async fn broadcast(
        &self,
        message: OutgoingMessage,
    ) -> Result<BroadcastReport, AssistantError> {
        let groups = self.gateway.list_groups().await?;
        let mut report = BroadcastReport::default();
        for group_id in groups {
            match self.gateway.send_message(&group_id, message.clone()).await {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    warn!("broadcast delivery failed (group={}, error={})", group_id, err);
                    report.failed += 1;
                }
            }
        }
        info!(
            "broadcast finished (delivered={}, failed={})",
            report.delivered, report.failed
        );
        Ok(report)
    }

    /// Broadcast plain text.
    pub async fn broadcast_text(&self, text: &str) -> Result<BroadcastReport, AssistantError> {
        self.broadcast(OutgoingMessage::text(text)).await
    }

    /// Fetch today's digest and broadcast it, rendered when possible.
    pub async fn broadcast_digest(&self) -> Result<BroadcastReport, AssistantError> {
        let content = self.content.as_ref().ok_or_else(|| {
            AssistantError::Validation("No content source is configured.".to_string())
        })?;
        let digest = content.fetch_digest().await?;
        let message = self
            .prepare(Reply::Markup {
                markup: commands::digest_markup(&digest),
                fallback: commands::digest_text(&digest),
            })
            .await;
        self.broadcast(message).await
    }

    /// Turn a reply into a platform message, rendering markup when a
    /// renderer is available and falling back to text otherwise.
    async fn prepare(&self, reply: Reply) -> OutgoingMessage {
        match reply {
            Reply::Text(text) => OutgoingMessage::text(text),
            Reply::Markup { markup, fallback } => {
                let Some(render) = &self.render else {
                    return OutgoingMessage::text(fallback);
                };
                match render.render(&markup).await {
                    Ok(image) => OutgoingMessage::image(image),
                    Err(err) => {
                        warn!("render failed; sending text (error={})", err);
                        OutgoingMessage::text(fallback)
                    }
                }
            }
        }
    }

    async fn deliver(&self, group_id: &str, message: OutgoingMessage) {
        if let Err(err) = self.gateway.send_message(group_id, message).await {
            warn!("reply delivery failed (group={}, error={})", group_id, err);
        }
    }
}

/// Whether the daily sweep should run now.
fn sweep_due(now_hour: u32, today: NaiveDate, sweep_hour: u32, last_run: Option<NaiveDate>) -> bool {
    now_hour == sweep_hour && last_run != Some(today)
}

fn spawn_sweeper(
    sessions: SessionRegistry,
    turn_locks: TurnLocks,
    retention_days: u32,
    sweep_hour: u32,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_CHECK_INTERVAL);
        let mut last_run: Option<NaiveDate> = None;
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let now = Local::now();
                    let today = now.date_naive();
                    if !sweep_due(now.hour(), today, sweep_hour, last_run) {
                        continue;
                    }
                    last_run = Some(today);
                    let removed = sessions.sweep_expired(retention_days);
                    turn_locks.lock().retain(|_, lock| Arc::strong_count(lock) > 1);
                    info!("daily sweep finished (removed={}, date={})", removed, today);
                }
            }
        }
        debug!("sweeper stopped");
    })
}
