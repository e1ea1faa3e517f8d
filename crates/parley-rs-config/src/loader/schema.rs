//! Schema validation helpers for Parley JSON5 configuration.

use super::SchemaMode;
use crate::ConfigError;
use serde_json::{Map, Value};

/// Validate a single config layer against the schema.
pub(super) fn validate_layer_schema(
    value: &Value,
    mode: SchemaMode,
    layer: &str,
) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    let allowed = [
        "$schema", "bot", "models", "history", "sessions", "cache", "dedup", "commands",
    ];
    ensure_allowed_keys(map, &allowed, layer, "")?;

    if let Some(value) = map.get("$schema") {
        expect_string(value, layer, "$schema")?;
    }
    if let Some(value) = map.get("bot") {
        validate_bot(value, layer, "bot")?;
    }
    if let Some(value) = map.get("models") {
        validate_models(value, mode, layer, "models")?;
    }
    if let Some(value) = map.get("history") {
        let map = expect_object(value, layer, "history")?;
        ensure_allowed_keys(map, &["max_entries"], layer, "history")?;
        if let Some(value) = map.get("max_entries") {
            expect_u64(value, layer, "history.max_entries")?;
        }
    }
    if let Some(value) = map.get("sessions") {
        let map = expect_object(value, layer, "sessions")?;
        ensure_allowed_keys(map, &["retention_days", "sweep_hour"], layer, "sessions")?;
        for key in ["retention_days", "sweep_hour"] {
            if let Some(value) = map.get(key) {
                expect_u64(value, layer, &join_path("sessions", key))?;
            }
        }
    }
    if let Some(value) = map.get("cache") {
        let map = expect_object(value, layer, "cache")?;
        ensure_allowed_keys(map, &["dir", "flush_interval_secs"], layer, "cache")?;
        if let Some(value) = map.get("dir") {
            expect_string(value, layer, "cache.dir")?;
        }
        if let Some(value) = map.get("flush_interval_secs") {
            expect_u64(value, layer, "cache.flush_interval_secs")?;
        }
    }
    if let Some(value) = map.get("dedup") {
        let map = expect_object(value, layer, "dedup")?;
        ensure_allowed_keys(map, &["ttl_secs"], layer, "dedup")?;
        if let Some(value) = map.get("ttl_secs") {
            expect_u64(value, layer, "dedup.ttl_secs")?;
        }
    }
    if let Some(value) = map.get("commands") {
        validate_commands(value, layer, "commands")?;
    }

    Ok(())
}

/// Validate the "bot" block.
fn validate_bot(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["name", "master", "enabled"], layer, path)?;
    if let Some(value) = map.get("name") {
        expect_string(value, layer, &join_path(path, "name"))?;
    }
    if let Some(value) = map.get("master") {
        expect_string(value, layer, &join_path(path, "master"))?;
    }
    if let Some(value) = map.get("enabled") {
        expect_bool(value, layer, &join_path(path, "enabled"))?;
    }
    Ok(())
}

/// Validate the "models" block.
fn validate_models(
    value: &Value,
    mode: SchemaMode,
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["default", "entries"], layer, path)?;
    if let Some(value) = map.get("default") {
        expect_string(value, layer, &join_path(path, "default"))?;
    }
    if let Some(entries) = map.get("entries") {
        let entries_path = join_path(path, "entries");
        let entries = expect_object(entries, layer, &entries_path)?;
        for (name, entry) in entries {
            validate_model_entry(entry, mode, layer, &join_path(&entries_path, name))?;
        }
    }
    Ok(())
}

/// Validate a single model entry.
fn validate_model_entry(
    value: &Value,
    mode: SchemaMode,
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    let allowed = [
        "provider",
        "base_url",
        "model",
        "api_key",
        "api_key_env",
        "system_prompt",
        "timeout_secs",
    ];
    ensure_allowed_keys(map, &allowed, layer, path)?;

    if let Some(value) = map.get("provider") {
        let provider_path = join_path(path, "provider");
        match value.as_str() {
            Some("openai") | Some("spark") => {}
            Some(_) => {
                return Err(invalid_field(
                    layer,
                    &provider_path,
                    "expected one of: openai, spark",
                ));
            }
            None => return Err(invalid_field(layer, &provider_path, "expected string")),
        }
    }
    for key in ["base_url", "model"] {
        let field_path = join_path(path, key);
        match map.get(key) {
            Some(value) => expect_string(value, layer, &field_path)?,
            None if mode == SchemaMode::Full => {
                return Err(invalid_field(layer, &field_path, "missing required field"));
            }
            None => {}
        }
    }
    for key in ["api_key", "api_key_env", "system_prompt"] {
        if let Some(value) = map.get(key) {
            expect_string(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("timeout_secs") {
        expect_u64(value, layer, &join_path(path, "timeout_secs"))?;
    }
    Ok(())
}

/// Validate the "commands" block.
fn validate_commands(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["aliases"], layer, path)?;
    if let Some(aliases) = map.get("aliases") {
        let aliases_path = join_path(path, "aliases");
        let aliases = expect_object(aliases, layer, &aliases_path)?;
        for (alias, target) in aliases {
            let alias_path = join_path(&aliases_path, alias);
            if alias.trim().is_empty() || alias.chars().any(char::is_whitespace) {
                return Err(invalid_field(
                    layer,
                    &alias_path,
                    "alias must be a single token",
                ));
            }
            expect_string(target, layer, &alias_path)?;
        }
    }
    Ok(())
}

/// Expect a JSON object or return a typed error.
fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(invalid_field(layer, path, "expected object")),
    }
}

/// Expect a JSON string or return a typed error.
fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_string() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string"))
    }
}

/// Expect a JSON boolean or return a typed error.
fn expect_bool(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_boolean() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected bool"))
    }
}

/// Expect a non-negative JSON integer or return a typed error.
fn expect_u64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_u64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected non-negative integer"))
    }
}

/// Reject keys outside the allowed set.
fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    match map.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(invalid_field(layer, &join_path(path, key), "unknown key")),
        None => Ok(()),
    }
}

/// Join nested paths for better error messages.
fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Build a structured invalid-field error.
fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let normalized_path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{layer}:{normalized_path}"),
        message: message.to_string(),
    }
}
