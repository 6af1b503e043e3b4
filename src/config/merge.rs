//! Layer merge
//!
//! Tables merge key by key, recursively. Everything else (scalars, arrays,
//! null) is replaced wholesale by the higher layer.

use serde_json::Value;

/// Overlay `overlay` onto `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Merge layers in precedence order (first is lowest)
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cli_flag_overrides_file() {
        let file = json!({"verbose": false, "mode": "primary"});
        let cli = json!({"verbose": true});
        let result = deep_merge(file, cli);

        assert_eq!(result["verbose"], true);
        assert_eq!(result["mode"], "primary");
    }

    #[test]
    fn test_timeouts_merge_per_key() {
        let builtin = json!({"timeouts": {"ready_ms": 30000, "settle_ms": 5000}});
        let file = json!({"timeouts": {"ready_ms": 250}});
        let result = deep_merge(builtin, file);

        assert_eq!(result["timeouts"]["ready_ms"], 250);
        assert_eq!(result["timeouts"]["settle_ms"], 5000);
    }

    #[test]
    fn test_inject_tables_accumulate() {
        let file = json!({"inject": {"null_pointer": "13"}});
        let cli = json!({"inject": {"invalid_thread": "accept"}});
        let result = deep_merge(file, cli);

        assert_eq!(result["inject"]["null_pointer"], "13");
        assert_eq!(result["inject"]["invalid_thread"], "accept");
    }

    #[test]
    fn test_scalar_replaces_table() {
        let base = json!({"timeouts": {"ready_ms": 1}});
        let overlay = json!({"timeouts": 7});
        assert_eq!(deep_merge(base, overlay)["timeouts"], 7);
    }

    #[test]
    fn test_merge_layers_precedence() {
        let result = merge_layers(vec![
            json!({"mode": "auto", "worker_name": "w"}),
            json!({"mode": "primary"}),
            json!({"mode": "alternate"}),
        ]);

        assert_eq!(result["mode"], "alternate");
        assert_eq!(result["worker_name"], "w");
    }

    #[test]
    fn test_merge_no_layers_is_null() {
        assert!(merge_layers(Vec::new()).is_null());
    }
}
