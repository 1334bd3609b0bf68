//! Tests for layered configuration loading.

use super::*;
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

/// Verify that a minimal config parses with defaults.
#[test]
fn parse_minimal_config() {
    let config = MembaseConfig::load_from_str("{}").expect("config");
    assert_eq!(config, MembaseConfig::default());
    assert_eq!(config.hub.retry.max_attempts, 3);
    assert_eq!(config.hub.retry.base_delay_ms, 1000);
    assert_eq!(config.memory.account, "default");
}

/// Reject unexpected top-level config keys.
#[test]
fn rejects_unknown_top_level_key() {
    let err = MembaseConfig::load_from_str(r#"{ unexpected: true }"#).unwrap_err();
    assert!(format!("{err}").contains("unknown key"));
}

#[test]
fn rejects_non_http_base_url() {
    let err = MembaseConfig::load_from_str(r#"{ hub: { base_url: "ftp://hub" } }"#).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("hub.base_url"), "{msg}");
}

#[test]
fn rejects_zero_retry_attempts() {
    let err =
        MembaseConfig::load_from_str(r#"{ hub: { retry: { max_attempts: 0 } } }"#).unwrap_err();
    assert!(format!("{err}").contains("hub.retry.max_attempts"));
}

#[test]
fn load_from_path_reads_json5_comments() {
    let temp = TempDir::new().expect("tmp");
    let path = temp.path().join("membase.json5");
    write_json5(
        &path,
        r#"{
            // local hub
            hub: { base_url: "http://localhost:8080", timeout_ms: 500 },
            memory: { auto_upload_to_hub: true },
        }"#,
    );
    let config = MembaseConfig::load_from_path(&path).expect("config");
    assert_eq!(config.hub.base_url, "http://localhost:8080");
    assert_eq!(config.hub.timeout_ms, 500);
    assert!(config.memory.auto_upload_to_hub);
}

/// Runtime layers override cwd, which overrides user.
#[test]
fn layered_config_precedence() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    let cwd = root.join("work");
    fs::create_dir_all(&cwd).expect("cwd");

    let user_config = root.join("home").join(DEFAULT_CONFIG_FILE);
    write_json5(
        &user_config,
        r#"{ hub: { membase_id: "user-id", timeout_ms: 1 }, memory: { account: "user" } }"#,
    );
    write_json5(
        &cwd.join(DEFAULT_CONFIG_FILE),
        r#"{ hub: { timeout_ms: 2 }, memory: { account: "cwd" } }"#,
    );
    let runtime = root.join("runtime.json5");
    write_json5(&runtime, r#"{ memory: { account: "runtime" } }"#);

    let mut options = LayeredConfigOptions::new(&cwd)
        .with_runtime_path(&runtime)
        .without_env();
    options.user_config_path = Some(user_config);

    let layered = MembaseConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.hub.membase_id, "user-id");
    assert_eq!(layered.config.hub.timeout_ms, 2);
    assert_eq!(layered.config.memory.account, "runtime");
    let sources: Vec<_> = layered.layers.iter().map(|layer| layer.source).collect();
    assert_eq!(
        sources,
        vec![
            ConfigLayerSource::User,
            ConfigLayerSource::Cwd,
            ConfigLayerSource::Runtime
        ]
    );
}

#[test]
fn missing_runtime_layer_is_an_error() {
    let temp = TempDir::new().expect("tmp");
    let mut options = LayeredConfigOptions::new(temp.path())
        .with_runtime_path(temp.path().join("missing.json5"))
        .without_env();
    options.user_config_path = None;
    let err = MembaseConfig::load_layered_with_options(options).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFailed { .. }));
}

#[test]
fn partial_layers_report_their_origin() {
    let temp = TempDir::new().expect("tmp");
    write_json5(
        &temp.path().join(DEFAULT_CONFIG_FILE),
        r#"{ memory: { preload_from_hub: "yes" } }"#,
    );
    let mut options = LayeredConfigOptions::new(temp.path()).without_env();
    options.user_config_path = None;
    let err = MembaseConfig::load_layered_with_options(options).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("cwd("), "{msg}");
    assert!(msg.contains("memory.preload_from_hub"), "{msg}");
}

#[test]
fn malformed_cwd_layer_names_its_file() {
    let temp = TempDir::new().expect("tmp");
    write_json5(
        &temp.path().join(DEFAULT_CONFIG_FILE),
        r#"{ hub: { timeout_ms: 5 "#,
    );
    let mut options = LayeredConfigOptions::new(temp.path()).without_env();
    options.user_config_path = None;
    let err = MembaseConfig::load_layered_with_options(options).unwrap_err();
    assert!(matches!(err, ConfigError::ParseFailed { .. }), "{err:?}");
    let layer = err.layer().expect("layer");
    assert!(layer.starts_with("cwd("), "{layer}");
    assert!(layer.contains(DEFAULT_CONFIG_FILE), "{layer}");
}

#[test]
fn env_base_url_must_still_be_http() {
    let mut config = MembaseConfig::load_from_str("{}").expect("config");
    config.apply_env_with(|key| (key == crate::ENV_HUB).then(|| "ftp://hub".to_string()));
    let err = config.validate().unwrap_err();
    assert!(format!("{err}").contains("hub.base_url"), "{err}");
}

#[test]
fn rejects_zero_idle_poll_interval() {
    let err = MembaseConfig::load_from_str(r#"{ hub: { idle_poll_interval_ms: 0 } }"#).unwrap_err();
    assert!(
        format!("{err}").contains("hub.idle_poll_interval_ms"),
        "{err}"
    );
}
