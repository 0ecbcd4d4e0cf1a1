//! Overlay merger.
//!
//! Applies overlay/extension trees onto the master tree, in order:
//! - scalars in the overlay replace the base value
//! - sequences are appended after the base's elements
//! - mappings merge key-wise; base keys absent from the overlay survive
//! - `null` is compatible with every shape: a null overlay value leaves the
//!   base untouched, a null base value takes the overlay value
//!
//! Any other shape mismatch (a sequence over a scalar, a mapping over a
//! sequence, ...) is an `OverlayMergeError` at the offending path.

use serde_json::Value;
use tracing::debug;

use crate::errors::{RamliftError, RamliftResult};
use crate::loader::DocumentGraph;
use crate::path::NodePath;

/// Top-level overlay keys that describe the overlay itself.
const OVERLAY_ONLY_KEYS: &[&str] = &["extends", "usage"];

fn shape(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) | Value::Number(_) | Value::String(_) => "scalar",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// Merge `overlay` into `base` in place.
pub fn merge_value(base: &mut Value, overlay: &Value, path: &NodePath) -> RamliftResult<()> {
    match (base, overlay) {
        (_, Value::Null) => Ok(()),
        (base @ Value::Null, overlay) => {
            *base = overlay.clone();
            Ok(())
        }
        (Value::Object(b), Value::Object(o)) => {
            for (k, v) in o {
                let child = path.child(k.clone());
                match b.get_mut(k) {
                    Some(existing) => merge_value(existing, v, &child)?,
                    None => {
                        b.insert(k.clone(), v.clone());
                    }
                }
            }
            Ok(())
        }
        (Value::Array(b), Value::Array(o)) => {
            b.extend(o.iter().cloned());
            Ok(())
        }
        (base, overlay) if shape(base) == "scalar" && shape(overlay) == "scalar" => {
            *base = overlay.clone();
            Ok(())
        }
        (base, overlay) => Err(RamliftError::overlay(
            format!("cannot merge a {} onto a {}", shape(overlay), shape(base)),
            path.clone(),
        )),
    }
}

/// Merge one overlay document tree onto the master tree.
pub fn merge_document(base: &mut Value, overlay: &Value) -> RamliftResult<()> {
    let root = NodePath::root();
    let Some(entries) = overlay.as_object() else {
        return if overlay.is_null() {
            Ok(())
        } else {
            Err(RamliftError::overlay("overlay document must be a mapping", root))
        };
    };
    let filtered: serde_json::Map<String, Value> = entries
        .iter()
        .filter(|(k, _)| !OVERLAY_ONLY_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    merge_value(base, &Value::Object(filtered), &root)
}

/// Apply and consume every queued overlay of `graph`.
pub fn apply_overlays(graph: &mut DocumentGraph) -> RamliftResult<usize> {
    let overlays = std::mem::take(&mut graph.overlays);
    let applied = overlays.len();

    for overlay in overlays {
        for (ns, location) in overlay.uses {
            match graph.uses.get(&ns) {
                Some(existing) if *existing != location => {
                    return Err(RamliftError::overlay(
                        format!(
                            "namespace `{ns}` is bound to both {existing} and {location}"
                        ),
                        NodePath::root().child("uses").child(ns),
                    ));
                }
                Some(_) => {}
                None => {
                    graph.uses.insert(ns, location);
                }
            }
        }
        merge_document(&mut graph.root, &overlay.tree)?;
        debug!(overlay = %overlay.location, kind = overlay.kind.as_str(), "merged overlay");
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn scalars_replace_sequences_append_maps_merge() {
        let mut base = json!({"title": "A", "protocols": ["HTTP"], "types": {"U": "string"}});
        let overlay = json!({"title": "B", "protocols": ["HTTPS"], "types": {"V": "number"}});
        merge_value(&mut base, &overlay, &NodePath::root()).unwrap();
        assert_eq!(
            base,
            json!({"title": "B", "protocols": ["HTTP", "HTTPS"], "types": {"U": "string", "V": "number"}})
        );
    }

    #[test]
    fn incompatible_shapes_fail_with_path() {
        let mut base = json!({"a": {"b": "scalar"}});
        let err = merge_value(&mut base, &json!({"a": {"b": [1]}}), &NodePath::root()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OverlayMerge);
        assert_eq!(err.path().unwrap().to_string(), "#/a/b");
    }

    #[test]
    fn overlay_only_keys_are_skipped() {
        let mut base = json!({"title": "A"});
        merge_document(&mut base, &json!({"extends": "api.raml", "usage": "x", "title": "B"})).unwrap();
        assert_eq!(base, json!({"title": "B"}));
    }

    #[test]
    fn null_is_compatible() {
        let mut base = json!({"a": null, "b": [1]});
        merge_value(&mut base, &json!({"a": {"x": 1}, "b": null}), &NodePath::root()).unwrap();
        assert_eq!(base, json!({"a": {"x": 1}, "b": [1]}));
    }

    proptest! {
        #[test]
        fn last_overlay_wins_for_scalars(a in any::<i64>(), b in any::<i64>(), key in "[a-z]{1,8}") {
            let mut base = json!({"title": "T"});
            prop_assume!(key != "title");
            merge_document(&mut base, &json!({ key.clone(): a })).unwrap();
            merge_document(&mut base, &json!({ key.clone(): b })).unwrap();
            prop_assert_eq!(&base[&key], &json!(b));
        }

        #[test]
        fn sequences_keep_overlay_order(xs in proptest::collection::vec(any::<u8>(), 0..8), ys in proptest::collection::vec(any::<u8>(), 0..8)) {
            let mut base = json!({"s": []});
            merge_document(&mut base, &json!({"s": xs.clone()})).unwrap();
            merge_document(&mut base, &json!({"s": ys.clone()})).unwrap();
            let expected: Vec<u8> = xs.into_iter().chain(ys).collect();
            prop_assert_eq!(base["s"].clone(), json!(expected));
        }
    }
}
