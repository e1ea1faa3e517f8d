//! Layered configuration loader.
//!
//! Discovers configuration layers (user, cwd, runtime overrides), validates
//! each against the schema, merges them, and produces a final `ParleyConfig`.

mod layer_io;
mod merge;
mod schema;
mod utils;

#[cfg(test)]
mod tests;

use crate::{ConfigError, ParleyConfig};
use log::{debug, info};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Default config filename in local layers.
const DEFAULT_CONFIG_FILE: &str = "parley.json5";
/// Default config directory under the user's home.
const DEFAULT_CONFIG_DIR: &str = ".parley";

/// Effective config plus metadata about which layers were loaded.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// The merged, validated config.
    pub config: ParleyConfig,
    /// Metadata for each layer that contributed.
    pub layers: Vec<ConfigLayer>,
}

/// Origin for a single config layer in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// User-specific configuration.
    User,
    /// Current working directory configuration.
    Cwd,
    /// Runtime overrides (highest precedence).
    Runtime,
}

impl ConfigLayerSource {
    /// Short name used in log lines and error origins.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigLayerSource::User => "user",
            ConfigLayerSource::Cwd => "cwd",
            ConfigLayerSource::Runtime => "runtime",
        }
    }
}

/// Metadata about a loaded config layer.
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    pub source: ConfigLayerSource,
    pub path: Option<PathBuf>,
}

/// Schema validation mode for layered configs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchemaMode {
    /// Single layers may omit fields a later layer supplies.
    Partial,
    /// The effective config must be complete.
    Full,
}

/// Options controlling layered config discovery and overrides.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    /// Working directory used to find the cwd layer.
    pub cwd: PathBuf,
    /// Optional user config path (defaults to `~/.parley/parley.json5`).
    pub user_config_path: Option<PathBuf>,
    /// Runtime override config paths applied last.
    pub runtime_paths: Vec<PathBuf>,
}

impl LayeredConfigOptions {
    /// Create options with default layer locations for the provided cwd.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            user_config_path: layer_io::default_user_config_path(),
            runtime_paths: Vec::new(),
        }
    }

    /// Add a runtime override config path that is applied last.
    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Override or disable the user layer.
    pub fn with_user_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.user_config_path = path;
        self
    }
}

impl ParleyConfig {
    /// Load a single config from a path (no layering).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        info!("loading config from path: {}", origin);
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            origin: origin.clone(),
            source,
        })?;
        let value = layer_io::parse_json5(&contents, &origin)?;
        config_from_value(value, &origin)
    }

    /// Load a single config from JSON5 contents (no layering).
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let value = layer_io::parse_json5(contents, "inline")?;
        config_from_value(value, "inline")
    }

    /// Load a layered config stack using the default layer locations.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        info!(
            "loading layered config with defaults (cwd={})",
            cwd.as_ref().display()
        );
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    /// Load a layered config stack using explicit layer locations.
    ///
    /// Layer precedence (low -> high): user, cwd, runtime overrides.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let cwd = utils::normalize_path(&options.cwd)?;
        debug!("normalized cwd for config load: {}", cwd.display());
        let mut candidates: Vec<(ConfigLayerSource, PathBuf, bool)> = Vec::new();
        if let Some(path) = options.user_config_path {
            candidates.push((ConfigLayerSource::User, path, false));
        }
        candidates.push((ConfigLayerSource::Cwd, cwd.join(DEFAULT_CONFIG_FILE), false));
        for path in options.runtime_paths {
            candidates.push((ConfigLayerSource::Runtime, path, true));
        }

        let mut layers = Vec::new();
        let mut merged = Value::Object(serde_json::Map::new());
        let mut seen_paths = HashSet::new();
        for (source, path, required) in candidates {
            if !seen_paths.insert(utils::unique_path(&path)) {
                debug!(
                    "skipping duplicate layer (source={}, path={})",
                    source.as_str(),
                    path.display()
                );
                continue;
            }
            let Some(loaded) = layer_io::read_layer(source, &path, required)? else {
                continue;
            };
            merge::merge_json_values(&mut merged, &loaded.value);
            layers.push(loaded.meta);
        }

        let config = config_from_value(merged, "effective")?;
        info!("layered config loaded (layers={})", layers.len());
        Ok(LayeredConfig { config, layers })
    }

    /// Validate configuration invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.entries.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one model entry is required".to_string(),
            ));
        }
        if !self.models.entries.contains_key(&self.models.default) {
            return Err(ConfigError::UnknownDefaultModel(self.models.default.clone()));
        }
        for (name, entry) in &self.models.entries {
            if entry.base_url.trim().is_empty() {
                return Err(ConfigError::InvalidField {
                    path: format!("models.entries.{name}.base_url"),
                    message: "must not be empty".to_string(),
                });
            }
            if entry.timeout_secs == 0 {
                return Err(ConfigError::InvalidField {
                    path: format!("models.entries.{name}.timeout_secs"),
                    message: "must be at least 1".to_string(),
                });
            }
        }
        if self.history.max_entries == 0 {
            return Err(ConfigError::InvalidField {
                path: "history.max_entries".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.sessions.retention_days == 0 {
            return Err(ConfigError::InvalidField {
                path: "sessions.retention_days".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.sessions.sweep_hour > 23 {
            return Err(ConfigError::InvalidField {
                path: "sessions.sweep_hour".to_string(),
                message: "must be between 0 and 23".to_string(),
            });
        }
        Ok(())
    }
}

/// Internal representation of a loaded config layer.
#[derive(Debug, Clone)]
struct LoadedLayer {
    meta: ConfigLayer,
    value: Value,
}

fn config_from_value(value: Value, label: &str) -> Result<ParleyConfig, ConfigError> {
    schema::validate_layer_schema(&value, SchemaMode::Full, label)?;
    let config: ParleyConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}
