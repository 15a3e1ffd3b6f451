//! Deep merge for layered YAML documents.
//!
//! Used both for the tool's own configuration tiers and for stacking the
//! store's static configuration files. Higher layers override lower layers
//! field by field; lists are replaced entirely, never concatenated.

use serde_json::Value;

/// Deep merge two JSON values, with `overlay` taking precedence over `base`.
///
/// - Mappings are merged recursively; overlay keys win, base key order is kept
///   and new overlay keys are appended
/// - Lists, strings, numbers and booleans are replaced entirely
/// - A null overlay preserves the base value (null means "not specified")
///
/// # Example
/// ```
/// use serde_json::json;
/// use shop_config_audit::config::deep_merge;
///
/// let base = json!({
///     "Order": { "modifiers": [], "minimum_amount": 0 },
///     "Cart": { "enabled": true }
/// });
/// let overlay = json!({
///     "Order": { "modifiers": ["TaxModifier"] }
/// });
/// let merged = deep_merge(base, overlay);
/// assert_eq!(merged["Order"]["modifiers"], json!(["TaxModifier"]));
/// assert_eq!(merged["Order"]["minimum_amount"], json!(0));
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged_value = match base_map.get_mut(&key) {
                    Some(base_value) => deep_merge(base_value.take(), overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged_value);
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Merge multiple values in order, with later values taking precedence.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_namespaces() {
        let base = json!({"Order": {"a": 1, "b": 2}});
        let overlay = json!({"Order": {"b": 3}, "Cart": {"c": 4}});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"Order": {"a": 1, "b": 3}, "Cart": {"c": 4}}));
    }

    #[test]
    fn test_lists_replaced_not_merged() {
        let base = json!({"Order": {"modifiers": ["A", "B"]}});
        let overlay = json!({"Order": {"modifiers": ["C"]}});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"Order": {"modifiers": ["C"]}}));
    }

    #[test]
    fn test_null_preserves_base() {
        let base = json!({"Email": {"admin": "a@shop.test"}});
        let overlay = json!({"Email": {"admin": null}});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"Email": {"admin": "a@shop.test"}}));
    }

    #[test]
    fn test_merge_keeps_base_key_order() {
        let base = json!({"First": {}, "Second": {}});
        let overlay = json!({"Third": {}, "First": {"x": 1}});
        let result = deep_merge(base, overlay);
        let keys: Vec<&String> = result.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_merge_all_later_wins() {
        let values = vec![json!({"a": 1}), json!({"b": 2}), json!({"a": 3, "c": 4})];
        let result = deep_merge_all(values);
        assert_eq!(result, json!({"a": 3, "b": 2, "c": 4}));
    }

    #[test]
    fn test_scalar_replaced_by_mapping() {
        let result = deep_merge(json!({"v": 42}), json!({"v": {"nested": true}}));
        assert_eq!(result, json!({"v": {"nested": true}}));
    }
}
