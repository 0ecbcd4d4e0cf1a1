//! Canonical JSON rendering.
//!
//! `serde_json::Map` is ordered by key (the `preserve_order` feature is not
//! enabled anywhere in the workspace), so a compact rendering of a `Value` is
//! already canonical. This module makes that contract explicit and provides a
//! pretty variant with a trailing newline for files written to disk.

use serde_json::Value;

use crate::errors::{RamliftError, RamliftResult};

/// Canonical compact bytes of a JSON value.
pub fn to_canonical_bytes(value: &Value) -> RamliftResult<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| RamliftError::serialization(format!("canonical json: {e}")))
}

/// Pretty-printed canonical JSON, newline-terminated.
pub fn to_canonical_pretty(value: &Value) -> RamliftResult<String> {
    let mut s = serde_json::to_string_pretty(value)
        .map_err(|e| RamliftError::serialization(format!("canonical json: {e}")))?;
    s.push('\n');
    Ok(s)
}

/// Recursively drop `null` members from objects.
///
/// Builders produce optional members as `null` while composing fragments;
/// the target dialect has no use for explicit nulls, except in `enum` and
/// `default`/`example` payloads, which are left untouched.
pub fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            for (k, v) in map.iter_mut() {
                if matches!(k.as_str(), "enum" | "default" | "example" | "examples") {
                    continue;
                }
                strip_nulls(v);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted() {
        let v = json!({"b": 1, "a": {"d": 2, "c": 3}});
        let bytes = to_canonical_bytes(&v).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"a":{"c":3,"d":2},"b":1}"#);
    }

    #[test]
    fn strip_nulls_keeps_example_payloads() {
        let mut v = json!({"a": null, "b": {"c": null}, "example": {"x": null}});
        strip_nulls(&mut v);
        assert_eq!(v, json!({"b": {}, "example": {"x": null}}));
    }
}
