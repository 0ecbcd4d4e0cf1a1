//! Scope-aware instantiation of template bodies.
//!
//! A template body is written in the scope of the document that declares it,
//! but after expansion it lives in the master tree. While substituting
//! parameters, type references, `securedBy` entries and annotation keys are
//! rewritten to canonical names so they resolve from the root scope:
//! - text authored in the template resolves in the declaring scope
//! - text produced by a placeholder resolves in the scope of the application

use serde_json::{Map, Value};

use crate::errors::RamliftResult;
use crate::path::NodePath;
use crate::scope::{Namespaces, Scope};
use crate::template::is_method_key;
use crate::template::params::{has_placeholder, Substitution};
use crate::types::expr::{is_schema_text, TypeExpr};
use crate::types::facets::annotation_name;

type Member<'r> = fn(&mut Instantiation<'r>, &str, &Value, &NodePath) -> RamliftResult<Value>;

/// Canonical name of a declaration referenced from `scope`; unknown
/// namespaces are left untouched for the resolver to report.
pub fn qualify_name(ns: &Namespaces, scope: &Scope, name: &str) -> String {
    ns.resolve(scope, name).unwrap_or_else(|| name.to_string())
}

/// Qualify every user type named in a type expression.
pub fn qualify_reference(ns: &Namespaces, scope: &Scope, text: &str) -> String {
    if is_schema_text(text) {
        return text.to_string();
    }
    match TypeExpr::parse(text) {
        Ok(expr) => {
            let mapped = expr.map_names(&mut |n| qualify_name(ns, scope, n));
            if mapped == expr {
                text.to_string()
            } else {
                mapped.to_string()
            }
        }
        Err(_) => text.to_string(),
    }
}

fn qualify_key(ns: &Namespaces, scope: &Scope, key: &str) -> String {
    match annotation_name(key) {
        Some(name) => format!("({})", qualify_name(ns, scope, name)),
        None => key.to_string(),
    }
}

/// Qualify a placeholder-free type declaration.
pub fn qualify_type(ns: &Namespaces, scope: &Scope, value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(qualify_reference(ns, scope, s)),
        Value::Array(items) => Value::Array(items.iter().map(|i| qualify_type(ns, scope, i)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let v = match k.as_str() {
                        "type" | "schema" | "items" => qualify_type(ns, scope, v),
                        "properties" => match v {
                            Value::Object(props) => Value::Object(
                                props
                                    .iter()
                                    .map(|(p, t)| (p.clone(), qualify_type(ns, scope, t)))
                                    .collect(),
                            ),
                            other => other.clone(),
                        },
                        _ => v.clone(),
                    };
                    (qualify_key(ns, scope, k), v)
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

fn qualify_scheme(ns: &Namespaces, scope: &Scope, value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(qualify_name(ns, scope, s)),
        Value::Object(map) if map.len() == 1 => Value::Object(
            map.iter()
                .map(|(k, v)| (qualify_name(ns, scope, k), v.clone()))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|i| qualify_scheme(ns, scope, i)).collect()),
        other => other.clone(),
    }
}

/// Substitution pass over one template body.
pub struct Instantiation<'r> {
    sub: Substitution<'r>,
    ns: &'r Namespaces,
    declared_in: &'r Scope,
    applied_in: &'r Scope,
}

impl<'r> Instantiation<'r> {
    pub fn new(sub: Substitution<'r>, ns: &'r Namespaces, declared_in: &'r Scope, applied_in: &'r Scope) -> Self {
        Self {
            sub,
            ns,
            declared_in,
            applied_in,
        }
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.sub.set(name, value);
    }

    pub fn unset(&mut self, name: &str) {
        self.sub.unset(name);
    }

    pub fn substitution(&self) -> &Substitution<'r> {
        &self.sub
    }

    fn scope_of(&self, raw: &str) -> &'r Scope {
        if has_placeholder(raw) {
            self.applied_in
        } else {
            self.declared_in
        }
    }

    /// Substituted mapping key; annotation keys are qualified.
    pub fn key(&mut self, raw: &str, path: &NodePath) -> RamliftResult<String> {
        let key = self.sub.apply_key(raw, path)?;
        Ok(qualify_key(self.ns, self.scope_of(raw), &key))
    }

    fn members(&mut self, map: &Map<String, Value>, path: &NodePath, member: Member<'r>) -> RamliftResult<Value> {
        let mut out = Map::new();
        for (raw, value) in map {
            let key = self.key(raw, path)?;
            let child = path.child(key.clone());
            let value = member(self, &key, value, &child)?;
            out.insert(key, value);
        }
        Ok(Value::Object(out))
    }

    fn plain(&mut self, _key: &str, value: &Value, path: &NodePath) -> RamliftResult<Value> {
        self.sub.apply(value, path)
    }

    /// Member of a resource type body other than a method.
    pub fn resource_member(&mut self, key: &str, value: &Value, path: &NodePath) -> RamliftResult<Value> {
        match key {
            "uriParameters" | "baseUriParameters" => self.parameters(value, path),
            "securedBy" => self.secured_by(value, path),
            k if is_method_key(k.trim_end_matches('?')) => self.method(value, path),
            _ => self.sub.apply(value, path),
        }
    }

    /// Member of a trait body or of a resource type method.
    pub fn method_member(&mut self, key: &str, value: &Value, path: &NodePath) -> RamliftResult<Value> {
        match key {
            "queryParameters" | "headers" => self.parameters(value, path),
            "queryString" => self.type_decl(value, path),
            "body" => self.bodies(value, path),
            "responses" => self.responses(value, path),
            "securedBy" => self.secured_by(value, path),
            _ => self.sub.apply(value, path),
        }
    }

    pub fn method(&mut self, value: &Value, path: &NodePath) -> RamliftResult<Value> {
        match value {
            Value::Object(map) => self.members(map, path, Self::method_member),
            other => self.sub.apply(other, path),
        }
    }

    fn parameters(&mut self, value: &Value, path: &NodePath) -> RamliftResult<Value> {
        match value {
            Value::Object(map) => self.members(map, path, |s, _, v, p| s.type_decl(v, p)),
            other => self.sub.apply(other, path),
        }
    }

    fn responses(&mut self, value: &Value, path: &NodePath) -> RamliftResult<Value> {
        match value {
            Value::Object(map) => self.members(map, path, |s, _, v, p| match v {
                Value::Object(response) => s.members(response, p, |s, k, v, p| match k {
                    "headers" => s.parameters(v, p),
                    "body" => s.bodies(v, p),
                    _ => s.plain(k, v, p),
                }),
                other => s.sub.apply(other, p),
            }),
            other => self.sub.apply(other, path),
        }
    }

    fn bodies(&mut self, value: &Value, path: &NodePath) -> RamliftResult<Value> {
        match value {
            Value::Object(map) if !map.is_empty() && map.keys().all(|k| k.contains('/') || has_placeholder(k)) => {
                self.members(map, path, |s, _, v, p| s.type_decl(v, p))
            }
            other => self.type_decl(other, path),
        }
    }

    fn type_decl(&mut self, value: &Value, path: &NodePath) -> RamliftResult<Value> {
        match value {
            Value::String(s) => self.type_ref(s, path),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(self.type_decl(item, &path.child(i.to_string()))?);
                }
                Ok(Value::Array(out))
            }
            Value::Object(map) => self.members(map, path, |s, k, v, p| match k {
                "type" | "schema" | "items" => s.type_decl(v, p),
                "properties" => match v {
                    Value::Object(props) => s.members(props, p, |s, _, v, p| s.type_decl(v, p)),
                    other => s.sub.apply(other, p),
                },
                _ => s.plain(k, v, p),
            }),
            other => Ok(other.clone()),
        }
    }

    fn type_ref(&mut self, text: &str, path: &NodePath) -> RamliftResult<Value> {
        if has_placeholder(text) {
            let value = self.sub.apply(&Value::String(text.to_string()), path)?;
            return Ok(qualify_type(self.ns, self.applied_in, &value));
        }
        Ok(Value::String(qualify_reference(self.ns, self.declared_in, text)))
    }

    fn secured_by(&mut self, value: &Value, path: &NodePath) -> RamliftResult<Value> {
        match value {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(self.scheme_entry(item, &path.child(i.to_string()))?);
                }
                Ok(Value::Array(out))
            }
            single => self.scheme_entry(single, path),
        }
    }

    fn scheme_entry(&mut self, value: &Value, path: &NodePath) -> RamliftResult<Value> {
        match value {
            Value::String(s) if has_placeholder(s) => {
                let value = self.sub.apply(value, path)?;
                Ok(qualify_scheme(self.ns, self.applied_in, &value))
            }
            Value::String(s) => Ok(Value::String(qualify_name(self.ns, self.declared_in, s))),
            Value::Object(map) if map.len() == 1 => {
                let mut out = Map::new();
                for (raw, params) in map {
                    let name = self.sub.apply_key(raw, path)?;
                    let name = qualify_name(self.ns, self.scope_of(raw), &name);
                    let params = self.sub.apply(params, &path.child(name.clone()))?;
                    out.insert(name, params);
                }
                Ok(Value::Object(out))
            }
            other => self.sub.apply(other, path),
        }
    }
}
