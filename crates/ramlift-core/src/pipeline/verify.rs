//! Structural verification of an emitted OpenAPI 3.0 document.
//!
//! Checks:
//! - `openapi` is a 3.0.x version string
//! - `info.title` and `info.version` are present
//! - every path key starts with `/` and every `{param}` in it is declared as a
//!   required `in: path` parameter at path-item or operation level
//! - component names are valid
//! - every local `$ref` resolves
//!
//! This module performs no I/O.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::errors::{RamliftError, RamliftResult};
use crate::template::{uri_parameter_names, METHODS};

fn component_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").unwrap_or_else(|e| panic!("component name regex: {e}")))
}

/// All problems found in `doc`, in document order.
pub fn check_document(doc: &Value) -> Vec<String> {
    let mut problems = Vec::new();

    match doc.get("openapi").and_then(Value::as_str) {
        Some(v) if v.starts_with("3.0.") => {}
        Some(v) => problems.push(format!("unsupported openapi version `{v}`")),
        None => problems.push("missing `openapi`".to_string()),
    }

    for field in ["title", "version"] {
        if doc.pointer(&format!("/info/{field}")).and_then(Value::as_str).is_none() {
            problems.push(format!("missing `info.{field}`"));
        }
    }

    match doc.get("paths") {
        Some(Value::Object(paths)) => {
            for (key, item) in paths {
                check_path_item(key, item, &mut problems);
            }
        }
        _ => problems.push("missing `paths`".to_string()),
    }

    if let Some(Value::Object(components)) = doc.get("components") {
        for section in components.values().filter_map(Value::as_object) {
            for name in section.keys() {
                if !component_name_regex().is_match(name) {
                    problems.push(format!("invalid component name `{name}`"));
                }
            }
        }
    }

    check_refs(doc, doc, "#", &mut problems);
    problems
}

pub fn verify_document(doc: &Value) -> RamliftResult<()> {
    let problems = check_document(doc);
    if problems.is_empty() {
        return Ok(());
    }
    Err(RamliftError::invariant(format!(
        "emitted document is not valid OpenAPI: {}",
        problems.join("; ")
    )))
}

fn path_params(params: Option<&Value>) -> BTreeSet<String> {
    params
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|p| p.get("in").and_then(Value::as_str) == Some("path"))
        .filter(|p| p.get("required").and_then(Value::as_bool) == Some(true))
        .filter_map(|p| p.get("name").and_then(Value::as_str).map(str::to_string))
        .collect()
}

fn check_path_item(key: &str, item: &Value, problems: &mut Vec<String>) {
    if !key.starts_with('/') {
        problems.push(format!("path `{key}` does not start with `/`"));
    }
    let required = uri_parameter_names(key);
    let shared = path_params(item.get("parameters"));

    let operations: Vec<(&str, &Value)> = METHODS
        .iter()
        .filter_map(|m| item.get(*m).map(|op| (*m, op)))
        .collect();

    if operations.is_empty() {
        for name in required.iter().filter(|n| !shared.contains(*n)) {
            problems.push(format!("path `{key}` does not declare path parameter `{name}`"));
        }
        return;
    }
    for (verb, op) in operations {
        let own = path_params(op.get("parameters"));
        for name in required.iter().filter(|n| !shared.contains(*n) && !own.contains(*n)) {
            problems.push(format!("operation `{verb} {key}` does not declare path parameter `{name}`"));
        }
        if op.get("responses").and_then(Value::as_object).is_none() {
            problems.push(format!("operation `{verb} {key}` has no `responses`"));
        }
    }
}

fn check_refs(root: &Value, value: &Value, at: &str, problems: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                if let Some(pointer) = reference.strip_prefix('#') {
                    if root.pointer(pointer).is_none() {
                        problems.push(format!("unresolved reference `{reference}` at {at}"));
                    }
                }
            }
            for (k, v) in map {
                let child = format!("{at}/{}", k.replace('~', "~0").replace('/', "~1"));
                check_refs(root, v, &child, problems);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                check_refs(root, v, &format!("{at}/{i}"), problems);
            }
        }
        _ => {}
    }
}
