//! JSON merge helper for layered configuration.

use serde_json::Value;

/// Merge overlay values into the base: objects merge key by key, anything
/// else (scalars, arrays) is replaced by the overlay.
pub(super) fn merge_json_values(base: &mut Value, overlay: &Value) {
    if let (Value::Object(base_map), Value::Object(overlay_map)) = (&mut *base, overlay) {
        for (key, value) in overlay_map {
            match base_map.get_mut(key) {
                Some(existing) => merge_json_values(existing, value),
                None => {
                    base_map.insert(key.clone(), value.clone());
                }
            }
        }
        return;
    }
    *base = overlay.clone();
}

#[cfg(test)]
mod tests {
    use super::merge_json_values;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn nested_objects_merge_and_scalars_override() {
        let mut base = json!({ "bot": { "name": "a", "enabled": true }, "history": { "max_entries": 10 } });
        merge_json_values(&mut base, &json!({ "bot": { "enabled": false } }));
        assert_eq!(
            base,
            json!({ "bot": { "name": "a", "enabled": false }, "history": { "max_entries": 10 } })
        );
    }
}
