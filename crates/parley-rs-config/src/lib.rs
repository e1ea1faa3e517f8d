//! Parley configuration: the serde model, JSON5 layer discovery, and the
//! validation applied before an engine is built from it.

mod error;
mod loader;
mod model;

pub use error::ConfigError;
pub use loader::{ConfigLayer, ConfigLayerSource, LayeredConfig, LayeredConfigOptions};
pub use model::{
    BotConfig, CacheConfig, CommandsConfig, DEFAULT_SYSTEM_PROMPT, DedupConfig, HistoryConfig,
    ModelEntry, ModelsConfig, ParleyConfig, ParleyConfigBuilder, ProviderKind, SessionsConfig,
};
