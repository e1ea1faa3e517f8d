//! Reading individual layer files.

use super::{
    ConfigLayer, ConfigLayerSource, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE, LoadedLayer,
    SchemaMode, schema,
};
use crate::ConfigError;
use directories::UserDirs;
use log::debug;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Read one layer. A missing file yields `None` unless `required` is set.
/// Every layer is schema-checked on its own before merging, so errors name
/// the file they came from.
pub(super) fn read_layer(
    source: ConfigLayerSource,
    path: &Path,
    required: bool,
) -> Result<Option<LoadedLayer>, ConfigError> {
    let origin = format!("{}({})", source.as_str(), path.display());
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound && !required => {
            debug!("no config layer at {}", origin);
            return Ok(None);
        }
        Err(err) => return Err(ConfigError::Read { origin, source: err }),
    };
    debug!("read config layer {} (len={})", origin, contents.len());
    let value = parse_json5(&contents, &origin)?;
    schema::validate_layer_schema(&value, SchemaMode::Partial, &origin)?;
    Ok(Some(LoadedLayer {
        meta: ConfigLayer {
            source,
            path: Some(path.to_path_buf()),
        },
        value,
    }))
}

/// Parse JSON5 text, tagging syntax errors with `origin`.
pub(super) fn parse_json5(contents: &str, origin: &str) -> Result<Value, ConfigError> {
    json5::from_str(contents).map_err(|source| ConfigError::Syntax {
        origin: origin.to_string(),
        source,
    })
}

/// `~/.parley/parley.json5`, when a home directory is known.
pub(super) fn default_user_config_path() -> Option<PathBuf> {
    let dirs = UserDirs::new()?;
    Some(
        dirs.home_dir()
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILE),
    )
}
