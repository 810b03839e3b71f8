//! Recursive merge of JSON override objects.

use serde_json::{Map, Value};

/// Merge `overlay` into `base`. Nested objects merge key by key; any other
/// value in `overlay` replaces the one in `base`.
pub fn merge_overrides(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_overrides(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Merge `overlay` onto a JSON value, turning a non-object base into an empty object.
pub fn apply_overrides(base: &mut Value, overlay: &Map<String, Value>) {
    if overlay.is_empty() {
        return;
    }
    if !base.is_object() {
        *base = Value::Object(Map::new());
    }
    if let Value::Object(map) = base {
        merge_overrides(map, overlay);
    }
}
