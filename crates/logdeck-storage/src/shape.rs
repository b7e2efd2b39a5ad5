//! Shape rules shared by every store
//!
//! [`heal`] compares types the way a JSON document sees them: integers and
//! floats are both numbers, and a `null` default only accepts `null`.
//! [`heal_typed`] lets the document's Rust type judge each field instead.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl Kind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Number(_) => Kind::Number,
            Value::String(_) => Kind::String,
            Value::Array(_) => Kind::Array,
            Value::Object(_) => Kind::Object,
        }
    }
}

/// Merge `patch` over `target`.
///
/// Objects merge key by key and recurse; any other value (arrays included)
/// replaces what was there.
pub fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

/// Repair `value` against `defaults` in place.
///
/// Missing keys are back-filled, keys whose type differs from the default are
/// reset to the default, nested objects are repaired recursively. Keys unknown
/// to the defaults are left alone. Returns how many fields were repaired.
pub fn heal(value: &mut Value, defaults: &Value) -> usize {
    let (Value::Object(map), Value::Object(defaults)) = (value, defaults) else {
        return 0;
    };

    let mut repaired = 0;
    for (key, default) in defaults {
        match map.get_mut(key) {
            None => {
                map.insert(key.clone(), default.clone());
                repaired += 1;
            }
            Some(current) if Kind::of(current) != Kind::of(default) => {
                *current = default.clone();
                repaired += 1;
            }
            Some(current) => {
                if default.is_object() {
                    repaired += heal(current, default);
                }
            }
        }
    }
    repaired
}

/// Insert every key of `defaults` missing from `value`, recursing into
/// nested objects. Present values are never touched.
fn backfill(value: &mut Value, defaults: &Value) -> usize {
    let (Value::Object(map), Value::Object(defaults)) = (value, defaults) else {
        return 0;
    };

    let mut filled = 0;
    for (key, default) in defaults {
        match map.get_mut(key) {
            None => {
                map.insert(key.clone(), default.clone());
                filled += 1;
            }
            Some(current) => filled += backfill(current, default),
        }
    }
    filled
}

/// Repair `value` against `defaults`, asking `accepts` whether a document is
/// valid for the store's type.
///
/// Missing keys are back-filled first. Each top-level field is then checked
/// on its own, placed into a copy of the defaults; a rejected object field
/// gets a [`heal`] pass before it is given up, anything else rejected is reset
/// to its default. Keys unknown to the defaults are left alone.
pub fn heal_typed<F>(value: &mut Value, defaults: &Value, accepts: F) -> usize
where
    F: Fn(&Value) -> bool,
{
    let mut repaired = backfill(value, defaults);
    let (Value::Object(map), Value::Object(fields)) = (value, defaults) else {
        return repaired;
    };

    let field_ok = |key: &str, candidate: &Value| {
        let mut document = defaults.clone();
        document[key] = candidate.clone();
        accepts(&document)
    };

    for (key, default) in fields {
        let Some(current) = map.get_mut(key) else {
            continue;
        };
        if field_ok(key, current) {
            continue;
        }

        let mut healed = current.clone();
        if healed.is_object() && heal(&mut healed, default) > 0 && field_ok(key, &healed) {
            *current = healed;
        } else {
            *current = default.clone();
        }
        repaired += 1;
    }
    repaired
}
