//! Configuration schema for Parley.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prompt used when a model entry does not set its own.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant in a group chat.";

/// Root config for a Parley deployment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ParleyConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
}

impl ParleyConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> ParleyConfigBuilder {
        ParleyConfigBuilder::new()
    }
}

/// Builder for assembling a `ParleyConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct ParleyConfigBuilder {
    config: ParleyConfig,
}

impl ParleyConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: ParleyConfig::default(),
        }
    }

    /// Replace the bot identity section.
    pub fn bot(mut self, bot: BotConfig) -> Self {
        self.config.bot = bot;
        self
    }

    /// Replace the model table.
    pub fn models(mut self, models: ModelsConfig) -> Self {
        self.config.models = models;
        self
    }

    pub fn history(mut self, history: HistoryConfig) -> Self {
        self.config.history = history;
        self
    }

    pub fn sessions(mut self, sessions: SessionsConfig) -> Self {
        self.config.sessions = sessions;
        self
    }

    /// Replace the cache location and flush cadence.
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    pub fn dedup(mut self, dedup: DedupConfig) -> Self {
        self.config.dedup = dedup;
        self
    }

    /// Replace the command alias table.
    pub fn commands(mut self, commands: CommandsConfig) -> Self {
        self.config.commands = commands;
        self
    }

    /// Finalize and return the built `ParleyConfig`.
    pub fn build(self) -> ParleyConfig {
        self.config
    }
}

/// Bot identity and power state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_bot_name")]
    pub name: String,
    /// User id allowed to toggle the bot and to talk to it while disabled.
    #[serde(default)]
    pub master: Option<String>,
    /// Initial power state.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            master: None,
            enabled: true,
        }
    }
}

fn default_bot_name() -> String {
    "Parley".to_string()
}

fn default_true() -> bool {
    true
}

/// Wire flavor of a model provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Plain OpenAI-compatible chat completions.
    #[default]
    Openai,
    /// OpenAI-compatible with a `code` status field and web search tool.
    Spark,
}

/// One selectable model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelEntry {
    #[serde(default)]
    pub provider: ProviderKind,
    /// API root; `/chat/completions` is appended.
    pub base_url: String,
    /// Remote model identifier.
    pub model: String,
    /// Inline credential. Prefer `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the credential.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ModelEntry {
    /// Create an entry with default prompt and timeout.
    pub fn new(provider: ProviderKind, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider,
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            api_key_env: None,
            system_prompt: default_system_prompt(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Resolve the credential from the inline key or the named env var.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|key| !key.is_empty()) {
            return Some(key.clone());
        }
        self.api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.is_empty())
    }
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

/// Model table and the model new conversations start on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_model_name")]
    pub default: String,
    #[serde(default = "default_model_entries")]
    pub entries: BTreeMap<String, ModelEntry>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            default: default_model_name(),
            entries: default_model_entries(),
        }
    }
}

fn default_model_name() -> String {
    "spark".to_string()
}

fn default_model_entries() -> BTreeMap<String, ModelEntry> {
    let mut spark = ModelEntry::new(
        ProviderKind::Spark,
        "https://spark-api-open.xf-yun.com/v1",
        "generalv3.5",
    );
    spark.api_key_env = Some("SPARK_API_KEY".to_string());
    let mut deepseek = ModelEntry::new(
        ProviderKind::Openai,
        "https://api.deepseek.com",
        "deepseek-chat",
    );
    deepseek.api_key_env = Some("DEEPSEEK_API_KEY".to_string());
    BTreeMap::from([
        ("spark".to_string(), spark),
        ("deepseek".to_string(), deepseek),
    ])
}

/// Per-conversation history bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
        }
    }
}

fn default_max_entries() -> usize {
    10
}

/// Idle session expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Local hour (0-23) the daily sweep runs at.
    #[serde(default = "default_sweep_hour")]
    pub sweep_hour: u32,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            sweep_hour: default_sweep_hour(),
        }
    }
}

fn default_retention_days() -> u32 {
    30
}

fn default_sweep_hour() -> u32 {
    4
}

/// Snapshot directory and periodic flush cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: String,
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            flush_interval_secs: default_flush_interval_secs(),
        }
    }
}

fn default_cache_dir() -> String {
    "cache".to_string()
}

fn default_flush_interval_secs() -> u64 {
    300
}

/// Re-delivery suppression window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    #[serde(default = "default_dedup_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_dedup_ttl_secs(),
        }
    }
}

fn default_dedup_ttl_secs() -> u64 {
    300
}

/// Extra command tokens mapped onto built-in commands.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CommandsConfig {
    /// alias token -> built-in token, e.g. `"/问": "/ask"`.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}
