//! Template resolver.
//!
//! Expands resource type (`type:`) and trait (`is:`) applications on every
//! resource and method of the merged master tree.
//!
//! Resource types:
//! - the applied type's body is substituted first; its own `type:` (written in
//!   terms of the child's parameters) then names the parent, so a chain
//!   `C -> B -> A` is walked from the most specific declaration upwards
//! - layers are folded ancestor first, so descendants win collisions
//! - optional methods (`get?:`) apply only to methods the resource defines
//!
//! Method composition, later layers winning:
//! 1. the resource type's method body (position controlled by `TemplatePrecedence`)
//! 2. traits in application order: resource type `is`, resource `is`,
//!    resource type method `is`, method `is`
//! 3. the explicitly authored method, which always wins
//!
//! After expansion the tree is checked for leftover placeholders, undeclared
//! URI parameters and duplicate resource paths.

pub mod decls;
pub mod params;
pub mod qualify;

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::config::{CoreConfig, TemplatePrecedence};
use crate::errors::{CycleKind, RamliftError, RamliftResult};
use crate::loader::DocumentGraph;
use crate::path::NodePath;
use crate::scope::{Namespaces, Scope};

use self::decls::{TemplateCatalog, TemplateDecl, TemplateInfo, TemplateKind};
use self::params::{has_placeholder, Substitution};
use self::qualify::Instantiation;

/// HTTP methods recognised as resource members.
pub const METHODS: &[&str] = &["get", "put", "post", "delete", "options", "head", "patch", "trace", "connect"];

pub fn is_method_key(key: &str) -> bool {
    METHODS.contains(&key)
}

pub fn is_resource_key(key: &str) -> bool {
    key.starts_with('/')
}

/// Template-free document ready for type resolution.
#[derive(Debug, Clone)]
pub struct ExpandedDocument {
    pub graph: DocumentGraph,
    pub namespaces: Namespaces,
    pub traits: BTreeMap<String, TemplateInfo>,
    pub resource_types: BTreeMap<String, TemplateInfo>,
    /// Number of template applications performed.
    pub expansions: usize,
}

/// One `type:` or `is:` application site.
#[derive(Debug, Clone)]
struct Application {
    reference: String,
    args: Map<String, Value>,
    scope: Scope,
    path: NodePath,
}

fn parse_application(value: &Value, scope: &Scope, path: &NodePath) -> RamliftResult<Application> {
    match value {
        Value::String(s) => Ok(Application {
            reference: s.trim().to_string(),
            args: Map::new(),
            scope: scope.clone(),
            path: path.clone(),
        }),
        Value::Object(map) if map.len() == 1 => {
            let (name, args) = map
                .iter()
                .next()
                .ok_or_else(|| RamliftError::invariant("single-entry map without entry"))?;
            let args = match args {
                Value::Null => Map::new(),
                Value::Object(a) => a.clone(),
                _ => {
                    return Err(RamliftError::template(
                        name,
                        "template arguments must be a mapping",
                        path.clone(),
                    ))
                }
            };
            Ok(Application {
                reference: name.trim().to_string(),
                args,
                scope: scope.clone(),
                path: path.clone(),
            })
        }
        _ => Err(RamliftError::structure(
            "template application must be a name or a single-entry mapping",
            path.clone(),
        )),
    }
}

fn parse_applications(value: &Value, scope: &Scope, path: &NodePath) -> RamliftResult<Vec<Application>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| parse_application(item, scope, &path.child(i.to_string())))
            .collect(),
        single => Ok(vec![parse_application(single, scope, path)?]),
    }
}

/// Fold `top` onto `base`; `top` wins every collision except where both sides
/// are mappings, which merge recursively. A null `top` leaves `base` alone.
pub fn layer_over(base: &mut Value, top: Value) {
    match (base, top) {
        (_, Value::Null) => {}
        (Value::Object(b), Value::Object(t)) => {
            for (k, v) in t {
                match b.get_mut(&k) {
                    Some(existing) if existing.is_object() && v.is_object() => layer_over(existing, v),
                    Some(existing) if v.is_null() && !existing.is_null() => {}
                    _ => {
                        b.insert(k, v);
                    }
                }
            }
        }
        (base, top) => *base = top,
    }
}

/// Last non-parameter segment of a resource path (`/users/{id}` -> `users`).
fn resource_path_name(full_path: &str) -> String {
    full_path
        .split('/')
        .rev()
        .find(|seg| !seg.is_empty() && !seg.contains('{'))
        .unwrap_or("")
        .to_string()
}

/// Resource type chain folded into one layer.
#[derive(Debug, Default)]
struct ResourceTypeLayer {
    body: Map<String, Value>,
    resource_is: Vec<Application>,
    method_is: BTreeMap<String, Vec<Application>>,
}

struct Expander<'a> {
    catalog: &'a TemplateCatalog,
    ns: &'a Namespaces,
    config: &'a CoreConfig,
    expansions: usize,
}

impl<'a> Expander<'a> {
    fn reserved(&self, full_path: &str) -> BTreeMap<String, Value> {
        let mut out = BTreeMap::new();
        out.insert("resourcePath".to_string(), Value::String(full_path.to_string()));
        out.insert(
            "resourcePathName".to_string(),
            Value::String(resource_path_name(full_path)),
        );
        out
    }

    /// Substitute a template body for one application.
    fn instantiate(
        &mut self,
        decl: &TemplateDecl,
        app: &Application,
        reserved: &BTreeMap<String, Value>,
    ) -> RamliftResult<Map<String, Value>> {
        let mut params = reserved.clone();
        for (k, v) in &app.args {
            params.insert(k.clone(), v.clone());
        }
        let sub = Substitution::new(&decl.name, params);
        let mut inst = Instantiation::new(sub, self.ns, &decl.scope, &app.scope);

        let mut out = Map::new();
        for (key, value) in &decl.body {
            if key == "usage" {
                continue;
            }
            let verb = key.trim_end_matches('?');
            let is_method = decl.kind == TemplateKind::ResourceType && is_method_key(verb);
            if is_method {
                inst.set("methodName", Value::String(verb.to_string()));
            }
            let key = inst.key(key, &app.path)?;
            let child = app.path.child(key.clone());
            let value = match decl.kind {
                TemplateKind::Trait => inst.method_member(&key, value, &child)?,
                TemplateKind::ResourceType => inst.resource_member(&key, value, &child)?,
            };
            out.insert(key, value);
            if is_method {
                inst.unset("methodName");
            }
        }

        if self.config.templates.reject_unused_arguments {
            let used = inst.substitution().used();
            if let Some(unused) = app.args.keys().find(|k| !used.contains(*k)) {
                return Err(RamliftError::template(
                    &decl.name,
                    format!("argument `{unused}` is not used by the {}", decl.kind.label()),
                    app.path.clone(),
                ));
            }
        }

        self.expansions += 1;
        trace!(template = %decl.name, kind = decl.kind.label(), at = %app.path, "instantiated template");
        Ok(out)
    }

    fn resource_type_chain(
        &mut self,
        app: Application,
        reserved: &BTreeMap<String, Value>,
    ) -> RamliftResult<ResourceTypeLayer> {
        let mut layers: Vec<(Map<String, Value>, Vec<Application>, BTreeMap<String, Vec<Application>>)> = Vec::new();
        let mut stack: Vec<String> = Vec::new();
        let mut current = Some(app);

        let catalog = self.catalog;
        while let Some(app) = current.take() {
            let decl = catalog
                .lookup(TemplateKind::ResourceType, self.ns, &app.scope, &app.reference, &app.path)?;

            if let Some(pos) = stack.iter().position(|n| *n == decl.name) {
                let mut chain = stack[pos..].to_vec();
                chain.push(decl.name.clone());
                return Err(RamliftError::cycle(CycleKind::ResourceType, chain, app.path.clone()));
            }
            if stack.len() >= self.config.limits.max_template_depth {
                return Err(RamliftError::template(
                    &decl.name,
                    format!(
                        "resource type chain exceeds depth limit of {}",
                        self.config.limits.max_template_depth
                    ),
                    app.path.clone(),
                ));
            }
            stack.push(decl.name.clone());

            let mut body = self.instantiate(decl, &app, reserved)?;
            let parent = body
                .remove("type")
                .map(|v| parse_application(&v, &decl.scope, &app.path))
                .transpose()?;
            let resource_is = match body.remove("is") {
                Some(v) => parse_applications(&v, &decl.scope, &app.path.child("is"))?,
                None => Vec::new(),
            };

            let mut method_is = BTreeMap::new();
            for (key, value) in body.iter_mut() {
                if !is_method_key(key.trim_end_matches('?')) {
                    continue;
                }
                if let Some(is) = value.as_object_mut().and_then(|m| m.remove("is")) {
                    let apps = parse_applications(&is, &decl.scope, &app.path.child(key.clone()).child("is"))?;
                    method_is.insert(key.trim_end_matches('?').to_string(), apps);
                }
            }

            layers.push((body, resource_is, method_is));
            current = parent;
        }

        let mut folded = ResourceTypeLayer::default();
        let mut acc = Value::Object(Map::new());
        for (body, resource_is, method_is) in layers.into_iter().rev() {
            layer_over(&mut acc, Value::Object(body));
            folded.resource_is.extend(resource_is);
            for (verb, apps) in method_is {
                folded.method_is.entry(verb).or_default().extend(apps);
            }
        }
        if let Value::Object(body) = acc {
            folded.body = body;
        }
        debug!(chain = ?stack, "expanded resource type chain");
        Ok(folded)
    }

    fn expand_resource(&mut self, node: &mut Value, full_path: &str, path: &NodePath) -> RamliftResult<()> {
        let mut explicit = match node {
            Value::Null => return Ok(()),
            Value::Object(map) => std::mem::take(map),
            _ => {
                return Err(RamliftError::structure(
                    format!("resource `{full_path}` must be a mapping"),
                    path.clone(),
                ))
            }
        };
        let reserved = self.reserved(full_path);

        let rt = match explicit.remove("type") {
            Some(v) => {
                let app = parse_application(&v, &Scope::Root, &path.child("type"))?;
                self.resource_type_chain(app, &reserved)?
            }
            None => ResourceTypeLayer::default(),
        };
        let mut resource_is = rt.resource_is.clone();
        if let Some(v) = explicit.remove("is") {
            resource_is.extend(parse_applications(&v, &Scope::Root, &path.child("is"))?);
        }

        // Non-method, non-resource members.
        let mut out = Value::Object(
            rt.body
                .iter()
                .filter(|(k, _)| !is_method_key(k.trim_end_matches('?')))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );
        let own: Map<String, Value> = explicit
            .iter()
            .filter(|(k, _)| !is_method_key(k) && !is_resource_key(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        layer_over(&mut out, Value::Object(own));
        let Value::Object(mut out) = out else {
            return Err(RamliftError::invariant("resource layer is not a mapping"));
        };

        for verb in METHODS {
            let explicit_method = explicit.get(*verb);
            let mut rt_method: Option<Value> = rt.body.get(*verb).cloned();
            if explicit_method.is_some() {
                if let Some(optional) = rt.body.get(&format!("{verb}?")) {
                    let base = rt_method.get_or_insert_with(|| Value::Object(Map::new()));
                    layer_over(base, optional.clone());
                }
            }
            if explicit_method.is_none() && rt_method.is_none() {
                continue;
            }

            let rt_method_is = rt.method_is.get(*verb).cloned().unwrap_or_default();
            let method = self.expand_method(
                verb,
                explicit_method.cloned(),
                rt_method,
                &resource_is,
                rt_method_is,
                &reserved,
                &path.child(*verb),
            )?;
            out.insert(verb.to_string(), method);
        }

        for (key, mut child) in explicit.into_iter().filter(|(k, _)| is_resource_key(k)) {
            let child_path = format!("{full_path}{key}");
            self.expand_resource(&mut child, &child_path, &path.child(key.clone()))?;
            out.insert(key, child);
        }

        *node = Value::Object(out);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn expand_method(
        &mut self,
        verb: &str,
        explicit: Option<Value>,
        rt_method: Option<Value>,
        resource_is: &[Application],
        rt_method_is: Vec<Application>,
        reserved: &BTreeMap<String, Value>,
        path: &NodePath,
    ) -> RamliftResult<Value> {
        let mut explicit = match explicit {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map),
            Some(_) => {
                return Err(RamliftError::structure(
                    format!("method `{verb}` must be a mapping"),
                    path.clone(),
                ))
            }
        };

        let mut applications: Vec<Application> = resource_is.to_vec();
        applications.extend(rt_method_is);
        if let Some(v) = explicit.as_mut().and_then(|m| m.remove("is")) {
            applications.extend(parse_applications(&v, &Scope::Root, &path.child("is"))?);
        }

        if applications.is_empty() && rt_method.is_none() {
            // Nothing to apply: keep the authored node as-is.
            return Ok(explicit.map(Value::Object).unwrap_or(Value::Null));
        }

        let mut reserved = reserved.clone();
        reserved.insert("methodName".to_string(), Value::String(verb.to_string()));

        let catalog = self.catalog;
        let mut traits = Vec::with_capacity(applications.len());
        for app in &applications {
            let decl = catalog
                .lookup(TemplateKind::Trait, self.ns, &app.scope, &app.reference, &app.path)?;
            let body = self.instantiate(decl, app, &reserved)?;
            traits.push(Value::Object(body));
        }

        let rt_method = match rt_method {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(v @ Value::Object(_)) => v,
            Some(_) => {
                return Err(RamliftError::structure(
                    format!("resource type method `{verb}` must be a mapping"),
                    path.clone(),
                ))
            }
        };

        let mut acc = Value::Object(Map::new());
        match self.config.templates.precedence {
            TemplatePrecedence::TraitsOverResourceType => {
                layer_over(&mut acc, rt_method);
                traits.into_iter().for_each(|t| layer_over(&mut acc, t));
            }
            TemplatePrecedence::ResourceTypeOverTraits => {
                traits.into_iter().for_each(|t| layer_over(&mut acc, t));
                layer_over(&mut acc, rt_method);
            }
        }
        if let Some(explicit) = explicit {
            layer_over(&mut acc, Value::Object(explicit));
        }
        Ok(acc)
    }
}

/// Expand every template application in the master tree.
pub fn resolve_templates(mut graph: DocumentGraph, config: &CoreConfig) -> RamliftResult<ExpandedDocument> {
    let namespaces = Namespaces::build(&graph);
    let catalog = TemplateCatalog::collect(&mut graph, &namespaces)?;

    let mut expander = Expander {
        catalog: &catalog,
        ns: &namespaces,
        config,
        expansions: 0,
    };

    if let Some(root) = graph.root.as_object_mut() {
        let keys: Vec<String> = root.keys().filter(|k| is_resource_key(k)).cloned().collect();
        for key in keys {
            if let Some(node) = root.get_mut(&key) {
                let path = NodePath::root().child(key.clone());
                expander.expand_resource(node, &key, &path)?;
            }
        }
    }
    let expansions = expander.expansions;

    check_no_placeholders(&graph.root, &NodePath::root())?;
    check_resources(&graph.root)?;

    debug!(
        templates = catalog.len(),
        expansions,
        "resolved templates"
    );

    Ok(ExpandedDocument {
        traits: catalog.infos(TemplateKind::Trait),
        resource_types: catalog.infos(TemplateKind::ResourceType),
        graph,
        namespaces,
        expansions,
    })
}

fn check_no_placeholders(value: &Value, path: &NodePath) -> RamliftResult<()> {
    let residual = |s: &str, at: &NodePath| -> RamliftResult<()> {
        if has_placeholder(s) {
            return Err(RamliftError::template(
                s,
                "unresolved parameter placeholder outside of a template",
                at.clone(),
            ));
        }
        Ok(())
    };
    match value {
        Value::String(s) => residual(s, path),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                check_no_placeholders(item, &path.child(i.to_string()))?;
            }
            Ok(())
        }
        Value::Object(map) => {
            for (k, v) in map {
                let child = path.child(k.clone());
                residual(k, &child)?;
                check_no_placeholders(v, &child)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Names of the `{param}` segments of a relative resource path.
pub fn uri_parameter_names(relative: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = relative;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push(after[..end].trim().to_string());
        rest = &after[end + 1..];
    }
    out
}

/// Path with parameter names erased, for sibling uniqueness checks.
fn erase_parameters(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut depth = 0usize;
    for c in path.chars() {
        match c {
            '{' => {
                depth += 1;
                out.push_str("{}");
            }
            '}' => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            _ => out.push(c),
        }
    }
    out
}

fn check_resources(root: &Value) -> RamliftResult<()> {
    let mut seen: BTreeMap<String, String> = BTreeMap::new();
    if let Some(map) = root.as_object() {
        for (key, node) in map.iter().filter(|(k, _)| is_resource_key(k)) {
            check_resource(key, key, node, &NodePath::root().child(key.clone()), &mut seen)?;
        }
    }
    Ok(())
}

fn check_resource(
    relative: &str,
    full_path: &str,
    node: &Value,
    path: &NodePath,
    seen: &mut BTreeMap<String, String>,
) -> RamliftResult<()> {
    let erased = erase_parameters(full_path);
    if let Some(previous) = seen.insert(erased, full_path.to_string()) {
        return Err(RamliftError::structure(
            format!("resource path `{full_path}` duplicates `{previous}`"),
            path.clone(),
        ));
    }

    let declared: Vec<String> = node
        .get("uriParameters")
        .and_then(Value::as_object)
        .map(|m| m.keys().map(|k| k.trim_end_matches('?').to_string()).collect())
        .unwrap_or_default();
    for name in uri_parameter_names(relative) {
        if name == "mediaTypeExtension" || declared.contains(&name) {
            continue;
        }
        return Err(RamliftError::structure(
            format!("URI parameter `{name}` used in `{relative}` is not declared in uriParameters"),
            path.clone(),
        ));
    }

    if let Some(map) = node.as_object() {
        for (key, child) in map.iter().filter(|(k, _)| is_resource_key(k)) {
            check_resource(
                key,
                &format!("{full_path}{key}"),
                child,
                &path.child(key.clone()),
                seen,
            )?;
        }
    }
    Ok(())
}
