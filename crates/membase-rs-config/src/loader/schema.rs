//! Schema validation helpers for membase JSON5 configuration.

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
    ensure_allowed_keys(map, &["$schema", "hub", "memory"], layer, "")?;

    if let Some(value) = map.get("$schema") {
        expect_string(value, layer, "$schema")?;
    }
    if let Some(value) = map.get("hub") {
        validate_hub(value, mode, layer, "hub")?;
    }
    if let Some(value) = map.get("memory") {
        validate_memory(value, layer, "memory")?;
    }

    Ok(())
}

/// Validate the "hub" block.
fn validate_hub(value: &Value, mode: SchemaMode, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "base_url",
            "membase_id",
            "timeout_ms",
            "user_agent",
            "retry",
            "upload_interval_ms",
            "idle_poll_interval_ms",
        ],
        layer,
        path,
    )?;
    if let Some(value) = map.get("base_url") {
        let field = join_path(path, "base_url");
        expect_string(value, layer, &field)?;
        let url = value.as_str().unwrap_or_default();
        if matches!(mode, SchemaMode::Full)
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(invalid_field(layer, &field, "expected http(s) url"));
        }
    }
    for key in ["membase_id", "user_agent"] {
        if let Some(value) = map.get(key) {
            expect_string(value, layer, &join_path(path, key))?;
        }
    }
    for key in ["timeout_ms", "upload_interval_ms", "idle_poll_interval_ms"] {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("retry") {
        validate_retry(value, layer, &join_path(path, "retry"))?;
    }
    Ok(())
}

/// Validate the "hub.retry" block.
fn validate_retry(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["max_attempts", "base_delay_ms"], layer, path)?;
    if let Some(value) = map.get("max_attempts") {
        let field = join_path(path, "max_attempts");
        expect_u64(value, layer, &field)?;
        if value.as_u64() == Some(0) {
            return Err(invalid_field(layer, &field, "must be at least 1"));
        }
    }
    if let Some(value) = map.get("base_delay_ms") {
        expect_u64(value, layer, &join_path(path, "base_delay_ms"))?;
    }
    Ok(())
}

/// Validate the "memory" block.
fn validate_memory(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "account",
            "auto_upload_to_hub",
            "preload_from_hub",
            "default_conversation_id",
        ],
        layer,
        path,
    )?;
    if let Some(value) = map.get("account") {
        expect_string(value, layer, &join_path(path, "account"))?;
    }
    for key in ["auto_upload_to_hub", "preload_from_hub"] {
        if let Some(value) = map.get(key) {
            expect_bool(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("default_conversation_id")
        && !value.is_null()
    {
        expect_string(value, layer, &join_path(path, "default_conversation_id"))?;
    }
    Ok(())
}

fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    value
        .as_object()
        .ok_or_else(|| invalid_field(layer, path, "expected object"))
}

fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_string() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string"))
    }
}

fn expect_bool(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_boolean() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected boolean"))
    }
}

fn expect_u64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.as_u64().is_some() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected non-negative integer"))
    }
}

/// Reject keys that are not part of the schema.
fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    for key in map.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(invalid_field(layer, &join_path(path, key), "unknown key"));
        }
    }
    Ok(())
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
