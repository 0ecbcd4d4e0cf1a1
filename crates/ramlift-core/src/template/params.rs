//! Template parameter substitution.
//!
//! Placeholders have the form `<<name>>` or `<<name | !fn | !fn2>>`. A string
//! that consists of exactly one placeholder without transformer functions is
//! replaced structurally (the argument may be a mapping or sequence); any other
//! occurrence is replaced textually and requires a scalar argument.
//!
//! Keys are substituted as well, so `<<resourcePathName>>Id:` works as a
//! property name.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::errors::{RamliftError, RamliftResult};
use crate::path::NodePath;

/// Reserved parameters supplied by the resolver, never by the author.
pub const RESERVED_PARAMS: &[&str] = &["resourcePath", "resourcePathName", "methodName"];

pub fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<<\s*([A-Za-z_][A-Za-z0-9_-]*)\s*((?:\|\s*!?[A-Za-z]+\s*)*)>>")
            .unwrap_or_else(|e| panic!("placeholder regex: {e}"))
    })
}

/// True if `s` still contains a placeholder.
pub fn has_placeholder(s: &str) -> bool {
    placeholder_regex().is_match(s)
}

/// Names of every parameter referenced anywhere in `value`.
pub fn referenced_params(value: &Value) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_params(value, &mut out);
    out
}

fn scan_params(s: &str, out: &mut BTreeSet<String>) {
    for caps in placeholder_regex().captures_iter(s) {
        out.insert(caps[1].to_string());
    }
}

fn collect_params(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => scan_params(s, out),
        Value::Object(map) => {
            for (k, v) in map {
                scan_params(k, out);
                collect_params(v, out);
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_params(v, out)),
        _ => {}
    }
}

/// One substitution pass over a template body.
#[derive(Debug)]
pub struct Substitution<'a> {
    template: &'a str,
    params: BTreeMap<String, Value>,
    used: BTreeSet<String>,
}

impl<'a> Substitution<'a> {
    pub fn new(template: &'a str, params: BTreeMap<String, Value>) -> Self {
        Self {
            template,
            params,
            used: BTreeSet::new(),
        }
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.params.insert(name.to_string(), value);
    }

    pub fn unset(&mut self, name: &str) {
        self.params.remove(name);
    }

    /// Parameters referenced so far.
    pub fn used(&self) -> &BTreeSet<String> {
        &self.used
    }

    fn err(&self, message: impl Into<String>, path: &NodePath) -> RamliftError {
        RamliftError::template(self.template, message, path.clone())
    }

    pub fn apply(&mut self, value: &Value, path: &NodePath) -> RamliftResult<Value> {
        match value {
            Value::String(s) => self.apply_str(s, path),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(self.apply(item, &path.child(i.to_string()))?);
                }
                Ok(Value::Array(out))
            }
            Value::Object(map) => {
                let mut out = Map::new();
                for (k, v) in map {
                    let key = self.apply_key(k, path)?;
                    let child = path.child(key.clone());
                    out.insert(key, self.apply(v, &child)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    /// Substitute placeholders in a mapping key.
    pub fn apply_key(&mut self, key: &str, path: &NodePath) -> RamliftResult<String> {
        if !has_placeholder(key) {
            return Ok(key.to_string());
        }
        match self.apply_str(key, path)? {
            Value::String(s) => Ok(s),
            other => scalar_text(&other).ok_or_else(|| {
                self.err(format!("key `{key}` substitutes to a non-scalar value"), path)
            }),
        }
    }

    fn lookup(&mut self, name: &str, path: &NodePath) -> RamliftResult<Value> {
        match self.params.get(name) {
            Some(v) => {
                self.used.insert(name.to_string());
                Ok(v.clone())
            }
            None => Err(self.err(format!("parameter `{name}` is not supplied"), path)),
        }
    }

    fn apply_str(&mut self, s: &str, path: &NodePath) -> RamliftResult<Value> {
        let re = placeholder_regex();
        if !re.is_match(s) {
            return Ok(Value::String(s.to_string()));
        }

        // Whole-string placeholder without transformers: structural replacement.
        if let Some(caps) = re.captures(s.trim()) {
            let whole = caps.get(0).map(|m| m.as_str().len()) == Some(s.trim().len());
            if whole && caps[2].trim().is_empty() {
                return self.lookup(&caps[1], path);
            }
        }

        let mut out = String::with_capacity(s.len());
        let mut last = 0;
        let captures: Vec<(usize, usize, String, String)> = re
            .captures_iter(s)
            .filter_map(|c| {
                let m = c.get(0)?;
                Some((m.start(), m.end(), c[1].to_string(), c[2].to_string()))
            })
            .collect();

        for (start, end, name, fns) in captures {
            out.push_str(&s[last..start]);
            let arg = self.lookup(&name, path)?;
            let mut text = scalar_text(&arg).ok_or_else(|| {
                self.err(
                    format!("parameter `{name}` is not a scalar and cannot be embedded in text"),
                    path,
                )
            })?;
            for f in fns.split('|').map(str::trim).filter(|f| !f.is_empty()) {
                text = transform(f.trim_start_matches('!'), &text)
                    .map_err(|m| self.err(m, path))?;
            }
            out.push_str(&text);
            last = end;
        }
        out.push_str(&s[last..]);
        Ok(Value::String(out))
    }
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

/// Apply a transformer function by name.
pub fn transform(name: &str, input: &str) -> Result<String, String> {
    let words = || split_words(input);
    Ok(match name {
        "singularize" => singularize(input),
        "pluralize" => pluralize(input),
        "uppercase" => input.to_uppercase(),
        "lowercase" => input.to_lowercase(),
        "lowercamelcase" => camel(&words(), false),
        "uppercamelcase" => camel(&words(), true),
        "lowerunderscorecase" => join_words(&words(), "_", false),
        "upperunderscorecase" => join_words(&words(), "_", true),
        "lowerhyphencase" => join_words(&words(), "-", false),
        "upperhyphencase" => join_words(&words(), "-", true),
        other => return Err(format!("unknown transformer function `!{other}`")),
    })
}

fn split_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in input.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn camel(words: &[String], upper_first: bool) -> String {
    words
        .iter()
        .enumerate()
        .map(|(i, w)| {
            if i == 0 && !upper_first {
                w.to_lowercase()
            } else {
                capitalize(w)
            }
        })
        .collect()
}

fn join_words(words: &[String], sep: &str, upper: bool) -> String {
    words
        .iter()
        .map(|w| if upper { w.to_uppercase() } else { w.to_lowercase() })
        .collect::<Vec<_>>()
        .join(sep)
}

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}

fn singularize(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.ends_with("ies") && word.len() > 3 {
        return format!("{}y", &word[..word.len() - 3]);
    }
    for suffix in ["sses", "xes", "zes", "ches", "shes"] {
        if lower.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if lower.ends_with('s') && !lower.ends_with("ss") && word.len() > 1 {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

fn pluralize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars().rev();
    if let (Some('y'), Some(prev)) = (chars.next(), chars.next()) {
        if !is_vowel(prev) {
            return format!("{}ies", &word[..word.len() - 1]);
        }
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|s| lower.ends_with(s)) {
        return format!("{word}es");
    }
    format!("{word}s")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(v: Value) -> BTreeMap<String, Value> {
        v.as_object().unwrap().clone().into_iter().collect()
    }

    #[test]
    fn structural_and_textual_substitution() {
        let mut sub = Substitution::new(
            "paged",
            params(json!({"schema": {"type": "string"}, "name": "users"})),
        );
        let out = sub
            .apply(
                &json!({"type": "<<schema>>", "description": "List <<name>> (<<name | !singularize | !uppercase>>)"}),
                &NodePath::root(),
            )
            .unwrap();
        assert_eq!(out, json!({"type": {"type": "string"}, "description": "List users (USER)"}));
        assert_eq!(sub.used().len(), 2);
    }

    #[test]
    fn keys_are_substituted() {
        let mut sub = Substitution::new("t", params(json!({"resourcePathName": "users"})));
        let out = sub
            .apply(&json!({"<<resourcePathName | !singularize>>Id": "string"}), &NodePath::root())
            .unwrap();
        assert_eq!(out, json!({"userId": "string"}));
    }

    #[test]
    fn missing_parameter_fails() {
        let mut sub = Substitution::new("t", BTreeMap::new());
        let err = sub.apply(&json!({"d": "<<x>>"}), &NodePath::root()).unwrap_err();
        assert!(err.to_string().contains("`x` is not supplied"));
        assert_eq!(err.path().unwrap().to_string(), "#/d");
    }

    #[test]
    fn embedded_non_scalar_fails() {
        let mut sub = Substitution::new("t", params(json!({"x": [1, 2]})));
        assert!(sub.apply(&json!("a <<x>> b"), &NodePath::root()).is_err());
    }

    #[test]
    fn transformers() {
        assert_eq!(transform("pluralize", "category").unwrap(), "categories");
        assert_eq!(transform("pluralize", "box").unwrap(), "boxes");
        assert_eq!(transform("singularize", "boxes").unwrap(), "box");
        assert_eq!(transform("lowercamelcase", "user-id").unwrap(), "userId");
        assert_eq!(transform("uppercamelcase", "user_id").unwrap(), "UserId");
        assert_eq!(transform("lowerhyphencase", "userId").unwrap(), "user-id");
        assert_eq!(transform("upperunderscorecase", "userId").unwrap(), "USER_ID");
        assert!(transform("reverse", "x").is_err());
    }

    #[test]
    fn referenced_params_scans_keys_and_values() {
        let names = referenced_params(&json!({"<<a>>": ["<<b | !uppercase>>"], "c": "<<a>>"}));
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
