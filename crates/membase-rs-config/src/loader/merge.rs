//! JSON merge helpers for layered configuration.

use serde_json::Value;

/// Merge an overlay layer into the accumulated config.
///
/// Objects merge key by key; any other overlay value replaces the base value.
pub(super) fn merge_layer(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_layer(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base_slot, overlay_value) => *base_slot = overlay_value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::merge_layer;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn nested_keys_merge_and_scalars_replace() {
        let mut base = json!({ "hub": { "base_url": "a", "timeout_ms": 10 }, "memory": {} });
        merge_layer(
            &mut base,
            &json!({ "hub": { "timeout_ms": 20 }, "memory": { "account": "x" } }),
        );
        assert_eq!(
            base,
            json!({ "hub": { "base_url": "a", "timeout_ms": 20 }, "memory": { "account": "x" } })
        );
    }
}
