//! YAML to document-tree conversion.
//!
//! Source documents are parsed with `serde_yaml` and converted into
//! `serde_json::Value` trees, which every later stage works on. The conversion:
//! - stringifies non-string mapping keys (`200:` becomes `"200"`)
//! - hands `!include <location>` nodes to a caller-supplied callback
//! - drops any other YAML tag and keeps the tagged value

use serde_json::{Map, Number, Value};

use crate::errors::{RamliftError, RamliftResult};
use crate::path::NodePath;

const INCLUDE_TAG: &str = "include";

/// Parse YAML text into a raw YAML value. An empty document is `Null`.
pub fn parse_yaml(text: &str) -> Result<serde_yaml::Value, serde_yaml::Error> {
    if text.trim().lines().all(|l| l.trim().is_empty() || l.trim_start().starts_with('#')) {
        return Ok(serde_yaml::Value::Null);
    }
    serde_yaml::from_str(text)
}

fn is_include(tag: &serde_yaml::value::Tag) -> bool {
    tag.to_string().trim_start_matches('!') == INCLUDE_TAG
}

/// Convert a YAML value into a document tree, resolving includes through
/// `include(location, path)`.
pub fn to_tree<F>(value: serde_yaml::Value, path: &NodePath, include: &mut F) -> RamliftResult<Value>
where
    F: FnMut(&str, &NodePath) -> RamliftResult<Value>,
{
    match value {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(b)),
        serde_yaml::Value::Number(n) => number_to_json(&n, path),
        serde_yaml::Value::String(s) => Ok(Value::String(s)),
        serde_yaml::Value::Sequence(seq) => {
            let mut out = Vec::with_capacity(seq.len());
            for (i, item) in seq.into_iter().enumerate() {
                out.push(to_tree(item, &path.child(i.to_string()), include)?);
            }
            Ok(Value::Array(out))
        }
        serde_yaml::Value::Mapping(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                let key = key_to_string(&k, path)?;
                let child = path.child(key.clone());
                out.insert(key, to_tree(v, &child, include)?);
            }
            Ok(Value::Object(out))
        }
        serde_yaml::Value::Tagged(tagged) => {
            if is_include(&tagged.tag) {
                match tagged.value {
                    serde_yaml::Value::String(location) => include(location.trim(), path),
                    _ => Err(RamliftError::structure(
                        "!include expects a location string",
                        path.clone(),
                    )),
                }
            } else {
                to_tree(tagged.value, path, include)
            }
        }
    }
}

/// Convert a YAML value that must not contain includes (e.g. unit tests,
/// configuration snippets).
pub fn to_plain_tree(value: serde_yaml::Value) -> RamliftResult<Value> {
    to_tree(value, &NodePath::root(), &mut |location, path| {
        Err(RamliftError::include(
            location,
            "includes are not allowed here",
            path.clone(),
        ))
    })
}

fn key_to_string(key: &serde_yaml::Value, path: &NodePath) -> RamliftResult<String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Null => Ok("null".to_string()),
        _ => Err(RamliftError::structure(
            "mapping keys must be scalars",
            path.clone(),
        )),
    }
}

fn number_to_json(n: &serde_yaml::Number, path: &NodePath) -> RamliftResult<Value> {
    if let Some(i) = n.as_i64() {
        Ok(Value::Number(i.into()))
    } else if let Some(u) = n.as_u64() {
        Ok(Value::Number(Number::from(u)))
    } else if let Some(f) = n.as_f64() {
        Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| RamliftError::structure(format!("non-finite number {f}"), path.clone()))
    } else {
        Err(RamliftError::structure("unknown numeric type", path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_keys_become_strings() {
        let y = parse_yaml("responses:\n  200:\n    description: ok\n").unwrap();
        let v = to_plain_tree(y).unwrap();
        assert_eq!(v, json!({"responses": {"200": {"description": "ok"}}}));
    }

    #[test]
    fn include_tag_invokes_callback() {
        let y = parse_yaml("types:\n  User: !include user.raml\n").unwrap();
        let mut seen = Vec::new();
        let v = to_tree(y, &NodePath::root(), &mut |loc, path| {
            seen.push((loc.to_string(), path.to_string()));
            Ok(json!({"type": "object"}))
        })
        .unwrap();
        assert_eq!(v["types"]["User"]["type"], "object");
        assert_eq!(seen, vec![("user.raml".to_string(), "#/types/User".to_string())]);
    }

    #[test]
    fn comment_only_document_is_null() {
        assert_eq!(parse_yaml("#%RAML 1.0 DataType\n").unwrap(), serde_yaml::Value::Null);
    }
}
