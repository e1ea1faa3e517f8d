//! Tests for layered configuration loading.

use super::*;
use crate::ProviderKind;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write JSON5 contents to a path, creating parent directories if needed.
fn write_json5(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("dir");
    }
    fs::write(path, contents).expect("write");
}

/// An empty document yields the built-in defaults.
#[test]
fn parse_minimal_config() {
    let config = ParleyConfig::load_from_str("{}").expect("config");
    assert_eq!(config.models.default, "spark");
    assert_eq!(config.history.max_entries, 10);
    assert_eq!(config.sessions.retention_days, 30);
    assert_eq!(config.dedup.ttl_secs, 300);
    assert!(config.bot.enabled);
    assert_eq!(
        config.models.entries.get("spark").map(|entry| entry.provider),
        Some(ProviderKind::Spark)
    );
}

/// Reject unexpected top-level config keys.
#[test]
fn rejects_unknown_top_level_key() {
    let err = ParleyConfig::load_from_str("{ unexpected: true }").unwrap_err();
    assert!(format!("{err}").contains("unknown key"));
}

/// Reject provider flavors the router cannot build.
#[test]
fn rejects_unknown_provider() {
    let json5 = r#"{
        models: { default: "x", entries: { x: { provider: "grpc", base_url: "http://x", model: "m" } } }
    }"#;
    let err = ParleyConfig::load_from_str(json5).unwrap_err();
    assert!(format!("{err}").contains("models.entries.x.provider"));
}

/// A model entry without a base url is incomplete in the effective config.
#[test]
fn rejects_entry_missing_base_url() {
    let json5 = r#"{ models: { default: "x", entries: { x: { model: "m" } } } }"#;
    let err = ParleyConfig::load_from_str(json5).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("models.entries.x.base_url"), "{msg}");
    assert!(msg.contains("missing required field"), "{msg}");
}

/// The default model must be one of the entries.
#[test]
fn rejects_unknown_default_model() {
    let json5 = r#"{ models: { default: "gpt" } }"#;
    let err = ParleyConfig::load_from_str(json5).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownDefaultModel(name) if name == "gpt"));
}

#[test]
fn rejects_zero_history_bound() {
    let err = ParleyConfig::load_from_str("{ history: { max_entries: 0 } }").unwrap_err();
    assert!(format!("{err}").contains("history.max_entries"));
}

#[test]
fn rejects_out_of_range_sweep_hour() {
    let err = ParleyConfig::load_from_str("{ sessions: { sweep_hour: 24 } }").unwrap_err();
    assert!(format!("{err}").contains("sessions.sweep_hour"));
}

#[test]
fn rejects_alias_with_whitespace() {
    let err =
        ParleyConfig::load_from_str(r#"{ commands: { aliases: { "/a b": "/ask" } } }"#)
            .unwrap_err();
    assert!(format!("{err}").contains("single token"));
}

/// Runtime overrides beat cwd, which beats the user layer.
#[test]
fn layered_config_applies_precedence() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    let cwd = root.join("work");
    fs::create_dir_all(&cwd).expect("cwd");

    let user_config = root.join("home").join(".parley").join(DEFAULT_CONFIG_FILE);
    write_json5(
        &user_config,
        r#"{ bot: { name: "user", master: "42" }, history: { max_entries: 4 } }"#,
    );
    write_json5(
        &cwd.join(DEFAULT_CONFIG_FILE),
        r#"{ bot: { name: "cwd" }, history: { max_entries: 6 } }"#,
    );
    let runtime = root.join("override.json5");
    write_json5(&runtime, r#"{ history: { max_entries: 8 } }"#);

    let options = LayeredConfigOptions::new(&cwd)
        .with_user_config_path(Some(user_config))
        .with_runtime_path(&runtime);
    let layered = ParleyConfig::load_layered_with_options(options).expect("layered");

    assert_eq!(layered.layers.len(), 3);
    assert_eq!(layered.config.bot.name, "cwd");
    assert_eq!(layered.config.bot.master.as_deref(), Some("42"));
    assert_eq!(layered.config.history.max_entries, 8);
}

/// Layers may be partial as long as the merged result is complete.
#[test]
fn partial_model_entries_merge_across_layers() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    let base = root.join("base.json5");
    write_json5(
        &base,
        r#"{ models: { default: "local", entries: { local: { base_url: "http://127.0.0.1:8080" } } } }"#,
    );
    let extra = root.join("extra.json5");
    write_json5(
        &extra,
        r#"{ models: { entries: { local: { model: "qwen", api_key: "k" } } } }"#,
    );

    let options = LayeredConfigOptions::new(root)
        .with_user_config_path(None)
        .with_runtime_path(&base)
        .with_runtime_path(&extra);
    let config = ParleyConfig::load_layered_with_options(options)
        .expect("layered")
        .config;
    let entry = config.models.entries.get("local").expect("local");
    assert_eq!(entry.model, "qwen");
    assert_eq!(entry.resolve_api_key().as_deref(), Some("k"));
    assert_eq!(entry.provider, ProviderKind::Openai);
}

/// Missing runtime paths are an error, unlike optional layers.
#[test]
fn missing_runtime_layer_fails() {
    let temp = TempDir::new().expect("tmp");
    let options = LayeredConfigOptions::new(temp.path())
        .with_user_config_path(None)
        .with_runtime_path(temp.path().join("absent.json5"));
    let err = ParleyConfig::load_layered_with_options(options).unwrap_err();
    match err {
        ConfigError::Read { origin, .. } => assert!(origin.starts_with("runtime(")),
        other => panic!("expected read error, got {other:?}"),
    }
}

/// Syntax errors name the layer they came from.
#[test]
fn syntax_error_names_layer() {
    let temp = TempDir::new().expect("tmp");
    fs::write(temp.path().join("parley.json5"), "{ bot: { name: ").expect("write");
    let options = LayeredConfigOptions::new(temp.path()).with_user_config_path(None);
    let err = ParleyConfig::load_layered_with_options(options).unwrap_err();
    match err {
        ConfigError::Syntax { origin, .. } => assert!(origin.starts_with("cwd(")),
        other => panic!("expected syntax error, got {other:?}"),
    }
}
