//! Facet handling.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Validation facets copied onto resolved types and inherited by subtypes.
pub const VALIDATION_FACETS: &[&str] = &[
    "enum",
    "pattern",
    "minLength",
    "maxLength",
    "minimum",
    "maximum",
    "multipleOf",
    "format",
    "minItems",
    "maxItems",
    "uniqueItems",
    "minProperties",
    "maxProperties",
    "fileTypes",
];

/// Annotation keys are written `(name)`.
pub fn annotation_name(key: &str) -> Option<&str> {
    key.strip_prefix('(')?.strip_suffix(')')
}

/// Collect validation facets from a declaration.
pub fn own_facets(decl: &Map<String, Value>) -> BTreeMap<String, Value> {
    decl.iter()
        .filter(|(k, _)| VALIDATION_FACETS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Overlay `own` facets onto inherited ones.
pub fn merge_facets(inherited: &mut BTreeMap<String, Value>, own: BTreeMap<String, Value>) {
    inherited.extend(own);
}

/// `examples` as a name -> value map. Each entry may be a bare value or a
/// `{value: ..., strict: ...}` wrapper; the wrapper is unwrapped.
pub fn examples(decl: &Map<String, Value>) -> BTreeMap<String, Value> {
    let Some(Value::Object(map)) = decl.get("examples") else {
        return BTreeMap::new();
    };
    map.iter()
        .map(|(name, ex)| {
            let value = match ex {
                Value::Object(o) if o.contains_key("value") => o.get("value").cloned().unwrap_or(Value::Null),
                other => other.clone(),
            };
            (name.clone(), value)
        })
        .collect()
}

/// `example` value, unwrapping the `{value: ...}` form.
pub fn example(decl: &Map<String, Value>) -> Option<Value> {
    match decl.get("example")? {
        Value::Object(o) if o.contains_key("value") && o.keys().all(|k| matches!(k.as_str(), "value" | "strict" | "displayName" | "description")) => {
            o.get("value").cloned()
        }
        other => Some(other.clone()),
    }
}

pub fn string_field(decl: &Map<String, Value>, key: &str) -> Option<String> {
    match decl.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn own_facets_filters_known_keys() {
        let decl = json!({"type": "string", "minLength": 1, "description": "d", "(x)": 1});
        let f = own_facets(decl.as_object().unwrap());
        assert_eq!(f.len(), 1);
        assert_eq!(f["minLength"], 1);
    }

    #[test]
    fn examples_unwrap_value_wrappers() {
        let decl = json!({"examples": {"a": {"value": 1, "strict": false}, "b": 2}, "example": {"value": "x"}});
        let m = decl.as_object().unwrap();
        assert_eq!(examples(m)["a"], 1);
        assert_eq!(examples(m)["b"], 2);
        assert_eq!(example(m), Some(json!("x")));
    }

    #[test]
    fn annotation_keys() {
        assert_eq!(annotation_name("(deprecated)"), Some("deprecated"));
        assert_eq!(annotation_name("deprecated"), None);
    }
}
