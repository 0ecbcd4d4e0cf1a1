//! Type resolver.
//!
//! Collects every type and annotation type declaration (master document and
//! libraries) under its canonical name, checks the base-type graph for cycles
//! in a separate topological pass, then resolves each declaration into a
//! flattened `ResolvedType`.
//!
//! Inheritance rules:
//! - a single base is copied (shape and facets) and the declaration's own
//!   properties and facets are layered on top
//! - multiple bases (`type: [A, B]`) must all be object types; their
//!   properties are unioned and a property declared differently by two bases
//!   is a `TypeResolutionError`
//! - descriptive members (description, examples, annotations) are not inherited
//!
//! Properties that merely point at a named type become `TypeNode::Ref`, so
//! self-referential structures resolve without recursion.

pub mod expr;
pub mod facets;

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::errors::{CycleKind, RamliftError, RamliftResult};
use crate::model::{
    Annotation, AnnotationTarget, AnnotationType, ObjectShape, Property, ResolvedType, TypeNode, TypeShape,
};
use crate::path::NodePath;
use crate::scope::{Namespaces, Scope};
use crate::template::ExpandedDocument;

use self::expr::{is_builtin, is_schema_text, TypeExpr};
use self::facets::{annotation_name, example, examples, merge_facets, own_facets, string_field};

const TYPE_SECTIONS: &[&str] = &["types", "schemas"];
const ANNOTATION_SECTION: &str = "annotationTypes";

/// Default type of a declaration that names neither a type nor properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImplicitType {
    String,
    Any,
}

#[derive(Debug, Clone)]
struct Decl {
    scope: Scope,
    raw: Value,
    path: NodePath,
}

pub struct TypeResolver<'a> {
    ns: &'a Namespaces,
    decls: BTreeMap<String, Decl>,
    annotation_decls: BTreeMap<String, Decl>,
    resolved: BTreeMap<String, ResolvedType>,
    in_progress: BTreeSet<String>,
}

fn section_entries(section: &Value, path: &NodePath) -> RamliftResult<Vec<(String, Value)>> {
    match section {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        Value::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                let map = item
                    .as_object()
                    .ok_or_else(|| RamliftError::structure("declaration list entries must be mappings", path.clone()))?;
                out.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            Ok(out)
        }
        _ => Err(RamliftError::structure("declarations must be a mapping", path.clone())),
    }
}

fn type_err(message: impl Into<String>, path: &NodePath) -> RamliftError {
    RamliftError::type_resolution(message, path.clone())
}

fn parse_expr(s: &str, path: &NodePath) -> RamliftResult<TypeExpr> {
    TypeExpr::parse(s).map_err(|e| type_err(format!("invalid type expression `{s}`: {e}"), path))
}

/// Base type references written in a declaration (unresolved).
fn base_refs(raw: &Value) -> Vec<String> {
    let from_str = |s: &str| -> Vec<String> {
        if is_schema_text(s) {
            return Vec::new();
        }
        TypeExpr::parse(s)
            .map(|e| e.base_names().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    };
    match raw {
        Value::String(s) => from_str(s),
        Value::Object(map) => match map.get("type").or_else(|| map.get("schema")) {
            Some(Value::String(s)) => from_str(s),
            Some(Value::Array(items)) => items
                .iter()
                .flat_map(|i| match i {
                    Value::String(s) => from_str(s),
                    other => base_refs(other),
                })
                .collect(),
            Some(inline @ Value::Object(_)) => base_refs(inline),
            _ => Vec::new(),
        },
        Value::Array(items) => items.iter().flat_map(base_refs).collect(),
        _ => Vec::new(),
    }
}

impl<'a> TypeResolver<'a> {
    pub fn collect(doc: &'a ExpandedDocument) -> RamliftResult<Self> {
        let mut out = Self {
            ns: &doc.namespaces,
            decls: BTreeMap::new(),
            annotation_decls: BTreeMap::new(),
            resolved: BTreeMap::new(),
            in_progress: BTreeSet::new(),
        };

        let mut sources: Vec<(Scope, &Value, NodePath)> = vec![(Scope::Root, &doc.graph.root, NodePath::root())];
        for (location, library) in &doc.graph.libraries {
            let scope = Scope::Library(location.clone());
            let prefix = doc.namespaces.prefix(&scope).unwrap_or(location.as_str()).to_string();
            sources.push((scope, &library.tree, NodePath::root().child("uses").child(prefix)));
        }

        for (scope, tree, base) in sources {
            for section in TYPE_SECTIONS.iter().chain(std::iter::once(&ANNOTATION_SECTION)) {
                let Some(value) = tree.get(*section) else {
                    continue;
                };
                let section_path = base.child(*section);
                for (name, raw) in section_entries(value, &section_path)? {
                    let canonical = doc.namespaces.canonical(&scope, &name);
                    let decl = Decl {
                        scope: scope.clone(),
                        raw,
                        path: section_path.child(name.clone()),
                    };
                    let table = if *section == ANNOTATION_SECTION {
                        &mut out.annotation_decls
                    } else {
                        &mut out.decls
                    };
                    if table.insert(canonical.clone(), decl).is_some() {
                        return Err(RamliftError::structure(
                            format!("duplicate declaration `{canonical}`"),
                            section_path.child(name),
                        ));
                    }
                }
            }
        }

        debug!(types = out.decls.len(), annotation_types = out.annotation_decls.len(), "collected type declarations");
        Ok(out)
    }

    /// Canonical name of a type referenced from `scope`.
    pub fn lookup(&self, scope: &Scope, reference: &str) -> Option<String> {
        lookup_in(self.ns, &self.decls, scope, reference)
    }

    fn require(&self, scope: &Scope, reference: &str, path: &NodePath) -> RamliftResult<String> {
        self.lookup(scope, reference)
            .ok_or_else(|| type_err(format!("unknown type `{reference}`"), path))
    }

    /// Reject cycles in the base-type graph, reporting every type on the cycle.
    pub fn check_cycles(&self) -> RamliftResult<()> {
        let mut edges: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (name, decl) in &self.decls {
            let targets = base_refs(&decl.raw)
                .into_iter()
                .filter(|r| !is_builtin(r))
                .filter_map(|r| self.lookup(&decl.scope, &r))
                .collect();
            edges.insert(name.as_str(), targets);
        }

        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Active,
            Done,
        }

        fn visit<'n>(
            node: &'n str,
            edges: &'n BTreeMap<&str, Vec<String>>,
            marks: &mut BTreeMap<&'n str, Mark>,
            stack: &mut Vec<&'n str>,
        ) -> Option<Vec<String>> {
            match marks.get(node) {
                Some(Mark::Done) => return None,
                Some(Mark::Active) => {
                    let pos = stack.iter().position(|n| *n == node).unwrap_or(0);
                    let mut chain: Vec<String> = stack[pos..].iter().map(|s| s.to_string()).collect();
                    chain.push(node.to_string());
                    return Some(chain);
                }
                None => {}
            }
            marks.insert(node, Mark::Active);
            stack.push(node);
            for target in edges.get(node).into_iter().flatten() {
                if let Some(chain) = visit(target.as_str(), edges, marks, stack) {
                    return Some(chain);
                }
            }
            stack.pop();
            marks.insert(node, Mark::Done);
            None
        }

        let mut marks = BTreeMap::new();
        for name in edges.keys() {
            let mut stack = Vec::new();
            if let Some(chain) = visit(name, &edges, &mut marks, &mut stack) {
                let path = self
                    .decls
                    .get(&chain[0])
                    .map(|d| d.path.clone())
                    .unwrap_or_default();
                return Err(RamliftError::cycle(CycleKind::Type, chain, path));
            }
        }
        Ok(())
    }

    pub fn resolve_all(&mut self) -> RamliftResult<()> {
        let names: Vec<String> = self.decls.keys().cloned().collect();
        for name in names {
            self.resolve_named(&name)?;
        }
        Ok(())
    }

    pub fn resolve_named(&mut self, canonical: &str) -> RamliftResult<ResolvedType> {
        if let Some(t) = self.resolved.get(canonical) {
            return Ok(t.clone());
        }
        let decl = self
            .decls
            .get(canonical)
            .cloned()
            .ok_or_else(|| type_err(format!("unknown type `{canonical}`"), &NodePath::root()))?;
        if self.in_progress.contains(canonical) {
            return Err(type_err(
                format!("type `{canonical}` is used in its own definition"),
                &decl.path,
            ));
        }

        self.in_progress.insert(canonical.to_string());
        let result = self.resolve_decl(&decl.raw, &decl.scope, &decl.path, ImplicitType::String);
        self.in_progress.remove(canonical);

        let mut ty = result?;
        ty.name = Some(canonical.to_string());
        trace!(name = canonical, shape = ty.shape.label(), "resolved type");
        self.resolved.insert(canonical.to_string(), ty.clone());
        Ok(ty)
    }

    /// Type node for an inline declaration (property, parameter, body, ...).
    pub fn node_for(
        &mut self,
        raw: &Value,
        scope: &Scope,
        path: &NodePath,
        implicit: ImplicitType,
    ) -> RamliftResult<TypeNode> {
        let reference = match raw {
            Value::String(s) => Some(s.as_str()),
            Value::Object(m) => m.get("type").or_else(|| m.get("schema")).and_then(Value::as_str),
            _ => None,
        };
        if let Some(reference) = reference.filter(|r| !is_schema_text(r)) {
            if let Some(name) = parse_expr(reference, path)?.as_user_name() {
                let canonical = self.require(scope, name, path)?;
                let bare = raw.as_object().map(|m| m.len() == 1).unwrap_or(true);
                if bare || self.in_progress.contains(&canonical) {
                    return Ok(TypeNode::Ref(canonical));
                }
            }
        }
        Ok(TypeNode::inline(self.resolve_decl(raw, scope, path, implicit)?))
    }

    fn resolve_decl(
        &mut self,
        raw: &Value,
        scope: &Scope,
        path: &NodePath,
        implicit: ImplicitType,
    ) -> RamliftResult<ResolvedType> {
        let decl: Map<String, Value> = match raw {
            Value::Null => Map::new(),
            Value::String(s) if is_schema_text(s) => {
                return Ok(ResolvedType::of(TypeShape::External { schema: s.clone() }));
            }
            Value::String(_) | Value::Array(_) => {
                let mut m = Map::new();
                m.insert("type".to_string(), raw.clone());
                m
            }
            Value::Object(m) => m.clone(),
            _ => return Err(type_err("invalid type declaration", path)),
        };

        let mut ty = match decl.get("type").or_else(|| decl.get("schema")) {
            None | Some(Value::Null) => implicit_type(&decl, implicit),
            Some(Value::String(s)) if is_schema_text(s) => ResolvedType::of(TypeShape::External { schema: s.clone() }),
            Some(Value::String(s)) => {
                let expr = parse_expr(s, path)?;
                self.expr_type(&expr, scope, path)?
            }
            Some(Value::Array(items)) => {
                let mut bases = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let at = path.child("type").child(i.to_string());
                    bases.push(match item {
                        Value::String(s) => {
                            let expr = parse_expr(s, &at)?;
                            self.expr_type(&expr, scope, &at)?
                        }
                        other => self.resolve_decl(other, scope, &at, implicit)?,
                    });
                }
                merge_bases(bases, path)?
            }
            Some(inline @ Value::Object(_)) => {
                let inline = inline.clone();
                let mut t = self.resolve_decl(&inline, scope, &path.child("type"), implicit)?;
                t.bases.clear();
                t
            }
            Some(_) => return Err(type_err("`type` must be a name, list or declaration", path)),
        };

        ty.name = None;
        ty.display_name = None;
        ty.description = None;
        ty.default = None;
        ty.example = None;
        ty.examples.clear();
        ty.annotations.clear();

        self.apply_own(&mut ty, &decl, scope, path)?;
        Ok(ty)
    }

    fn name_type(&mut self, name: &str, scope: &Scope, path: &NodePath) -> RamliftResult<ResolvedType> {
        if let Some(scalar) = crate::model::ScalarKind::parse(name) {
            return Ok(ResolvedType::scalar(scalar));
        }
        match name {
            "any" => Ok(ResolvedType::of(TypeShape::Any)),
            "nil" => Ok(ResolvedType::of(TypeShape::Nil)),
            "object" => Ok(ResolvedType::of(TypeShape::Object(ObjectShape::default()))),
            "array" => Ok(ResolvedType::of(TypeShape::Array { items: None })),
            _ => {
                let canonical = self.require(scope, name, path)?;
                let mut t = self.resolve_named(&canonical)?;
                t.bases = vec![canonical];
                Ok(t)
            }
        }
    }

    fn expr_type(&mut self, expr: &TypeExpr, scope: &Scope, path: &NodePath) -> RamliftResult<ResolvedType> {
        match expr {
            TypeExpr::Name(n) => self.name_type(n, scope, path),
            TypeExpr::Array(inner) => {
                let items = self.expr_node(inner, scope, path)?;
                Ok(ResolvedType::of(TypeShape::Array {
                    items: Some(Box::new(items)),
                }))
            }
            TypeExpr::Union(members) => {
                let mut variants = Vec::with_capacity(members.len());
                for m in members {
                    variants.push(self.expr_node(m, scope, path)?);
                }
                Ok(ResolvedType::of(TypeShape::Union { variants }))
            }
            TypeExpr::Nullable(inner) => {
                let variants = vec![
                    self.expr_node(inner, scope, path)?,
                    TypeNode::inline(ResolvedType::of(TypeShape::Nil)),
                ];
                Ok(ResolvedType::of(TypeShape::Union { variants }))
            }
        }
    }

    fn expr_node(&mut self, expr: &TypeExpr, scope: &Scope, path: &NodePath) -> RamliftResult<TypeNode> {
        match expr.as_user_name() {
            Some(name) => Ok(TypeNode::Ref(self.require(scope, name, path)?)),
            None => Ok(TypeNode::inline(self.expr_type(expr, scope, path)?)),
        }
    }

    fn apply_own(
        &mut self,
        ty: &mut ResolvedType,
        decl: &Map<String, Value>,
        scope: &Scope,
        path: &NodePath,
    ) -> RamliftResult<()> {
        let object_keys = ["properties", "additionalProperties", "discriminator", "discriminatorValue"];
        if object_keys.iter().any(|k| decl.contains_key(*k)) {
            if ty.shape == TypeShape::Any {
                ty.shape = TypeShape::Object(ObjectShape::default());
            }
            let label = ty.shape.label();
            let TypeShape::Object(obj) = &mut ty.shape else {
                return Err(type_err(format!("object facets declared on a {label} type"), path));
            };

            if let Some(props) = decl.get("properties") {
                let props_path = path.child("properties");
                let entries = match props {
                    Value::Null => Map::new(),
                    Value::Object(m) => m.clone(),
                    _ => return Err(type_err("`properties` must be a mapping", &props_path)),
                };
                for (key, raw) in entries {
                    let at = props_path.child(key.clone());
                    if key.len() > 1 && key.starts_with('/') && key.ends_with('/') {
                        let node = self.node_for(&raw, scope, &at, ImplicitType::String)?;
                        obj.pattern_properties.insert(key.trim_matches('/').to_string(), node);
                        continue;
                    }
                    let (name, optional) = match key.strip_suffix('?') {
                        Some(n) => (n.to_string(), true),
                        None => (key.clone(), false),
                    };
                    let mut raw = raw;
                    let explicit_required = raw
                        .as_object_mut()
                        .and_then(|m| m.remove("required"))
                        .and_then(|v| v.as_bool());
                    let node = self.node_for(&raw, scope, &at, ImplicitType::String)?;
                    obj.properties.insert(
                        name,
                        Property {
                            node,
                            required: explicit_required.unwrap_or(!optional),
                        },
                    );
                }
            }

            if let Some(v) = decl.get("additionalProperties").and_then(Value::as_bool) {
                obj.additional_properties = Some(v);
            }
            if let Some(d) = string_field(decl, "discriminator") {
                obj.discriminator = Some(d);
            }
            if let Some(v) = decl.get("discriminatorValue") {
                obj.discriminator_value = Some(v.clone());
            }
        }

        if let Some(items) = decl.get("items") {
            if ty.shape == TypeShape::Any {
                ty.shape = TypeShape::Array { items: None };
            }
            let label = ty.shape.label();
            let TypeShape::Array { items: slot } = &mut ty.shape else {
                return Err(type_err(format!("`items` declared on a {label} type"), path));
            };
            let node = self.node_for(items, scope, &path.child("items"), ImplicitType::String)?;
            *slot = Some(Box::new(node));
        }

        merge_facets(&mut ty.facets, own_facets(decl));
        ty.display_name = string_field(decl, "displayName");
        ty.description = string_field(decl, "description");
        ty.default = decl.get("default").cloned();
        ty.example = example(decl);
        ty.examples = examples(decl);
        ty.annotations = self.annotations_of(decl, AnnotationTarget::TypeDeclaration, scope, path)?;
        Ok(())
    }

    /// Annotation instances among the keys of `map`, checked against the
    /// `allowedTargets` of their annotation types.
    pub fn annotations_of(
        &self,
        map: &Map<String, Value>,
        target: AnnotationTarget,
        scope: &Scope,
        path: &NodePath,
    ) -> RamliftResult<Vec<Annotation>> {
        let mut out = Vec::new();
        for (key, value) in map {
            let Some(name) = annotation_name(key) else {
                continue;
            };
            let canonical = lookup_in(self.ns, &self.annotation_decls, scope, name).ok_or_else(|| {
                type_err(format!("unknown annotation `{name}`"), &path.child(key.clone()))
            })?;
            let allowed = self
                .annotation_decls
                .get(&canonical)
                .map(|d| allowed_targets(&d.raw))
                .unwrap_or_default();
            if !allowed.is_empty() && !allowed.iter().any(|t| t == target.as_str()) {
                return Err(RamliftError::structure(
                    format!(
                        "annotation `{canonical}` cannot be applied to a {} (allowed targets: {})",
                        target.as_str(),
                        allowed.join(", ")
                    ),
                    path.child(key.clone()),
                ));
            }
            out.push(Annotation {
                name: canonical,
                value: value.clone(),
            });
        }
        Ok(out)
    }

    pub fn resolve_annotation_types(&mut self) -> RamliftResult<BTreeMap<String, AnnotationType>> {
        let decls: Vec<(String, Decl)> = self
            .annotation_decls
            .iter()
            .map(|(k, d)| (k.clone(), d.clone()))
            .collect();
        let mut out = BTreeMap::new();
        for (name, decl) in decls {
            let targets = allowed_targets(&decl.raw);
            let mut raw = decl.raw.clone();
            if let Some(m) = raw.as_object_mut() {
                m.remove("allowedTargets");
            }
            let mut ty = self.resolve_decl(&raw, &decl.scope, &decl.path, ImplicitType::Any)?;
            ty.name = Some(name.clone());
            out.insert(
                name.clone(),
                AnnotationType {
                    name,
                    ty,
                    allowed_targets: targets,
                },
            );
        }
        Ok(out)
    }

    pub fn into_types(self) -> BTreeMap<String, ResolvedType> {
        self.resolved
    }
}

/// `allowedTargets` of an annotation type declaration; empty admits every target.
fn allowed_targets(raw: &Value) -> Vec<String> {
    match raw.get("allowedTargets") {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items.iter().filter_map(|i| i.as_str().map(str::to_string)).collect(),
        _ => Vec::new(),
    }
}

fn lookup_in<T>(ns: &Namespaces, table: &BTreeMap<String, T>, scope: &Scope, reference: &str) -> Option<String> {
    ns.resolve(scope, reference).filter(|canonical| table.contains_key(canonical))
}

fn implicit_type(decl: &Map<String, Value>, implicit: ImplicitType) -> ResolvedType {
    if decl.contains_key("properties") {
        ResolvedType::of(TypeShape::Object(ObjectShape::default()))
    } else if decl.contains_key("items") {
        ResolvedType::of(TypeShape::Array { items: None })
    } else {
        match implicit {
            ImplicitType::Any => ResolvedType::of(TypeShape::Any),
            ImplicitType::String => ResolvedType::scalar(crate::model::ScalarKind::String),
        }
    }
}

/// Union of object bases for multiple inheritance.
fn merge_bases(bases: Vec<ResolvedType>, path: &NodePath) -> RamliftResult<ResolvedType> {
    let mut iter = bases.into_iter();
    let Some(mut acc) = iter.next() else {
        return Err(type_err("empty base type list", path));
    };
    if iter.len() == 0 {
        return Ok(acc);
    }

    let label = |t: &ResolvedType| t.bases.first().cloned().unwrap_or_else(|| t.shape.label().to_string());
    let mut owners: BTreeMap<String, String> = BTreeMap::new();
    let acc_label = label(&acc);
    let TypeShape::Object(acc_obj) = &mut acc.shape else {
        return Err(type_err(
            format!("multiple inheritance requires object types, `{acc_label}` is not one"),
            path,
        ));
    };
    for name in acc_obj.properties.keys() {
        owners.insert(name.clone(), acc_label.clone());
    }

    let mut all_bases = acc.bases.clone();
    for base in iter {
        let base_label = label(&base);
        let TypeShape::Object(obj) = base.shape else {
            return Err(type_err(
                format!("multiple inheritance requires object types, `{base_label}` is not one"),
                path,
            ));
        };
        for (name, prop) in obj.properties {
            match acc_obj.properties.get(&name) {
                Some(existing) if *existing != prop => {
                    let first = owners.get(&name).cloned().unwrap_or_default();
                    return Err(type_err(
                        format!("property `{name}` is declared incompatibly by `{first}` and `{base_label}`"),
                        path,
                    ));
                }
                Some(_) => {}
                None => {
                    owners.insert(name.clone(), base_label.clone());
                    acc_obj.properties.insert(name, prop);
                }
            }
        }
        acc_obj.pattern_properties.extend(obj.pattern_properties);
        if obj.additional_properties.is_some() {
            acc_obj.additional_properties = obj.additional_properties;
        }
        if obj.discriminator.is_some() {
            acc_obj.discriminator = obj.discriminator;
        }
        merge_facets(&mut acc.facets, base.facets);
        all_bases.extend(base.bases);
    }
    acc.bases = all_bases;
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CoreConfig, LimitsConfig};
    use crate::errors::ErrorKind;
    use crate::loader::load_graph;
    use crate::model::ScalarKind;
    use crate::path::DocumentRef;
    use crate::source::MemorySource;
    use crate::template::resolve_templates;
    use assert_matches::assert_matches;

    fn expanded(src: MemorySource) -> ExpandedDocument {
        let graph = load_graph(&src, &LimitsConfig::default(), &DocumentRef::new("api.raml"), &[]).unwrap();
        resolve_templates(graph, &CoreConfig::default()).unwrap()
    }

    fn resolve(text: &str) -> RamliftResult<BTreeMap<String, ResolvedType>> {
        let doc = expanded(MemorySource::new().with("api.raml", text));
        let mut r = TypeResolver::collect(&doc)?;
        r.check_cycles()?;
        r.resolve_all()?;
        Ok(r.into_types())
    }

    #[test]
    fn single_inheritance_flattens_properties_and_facets() {
        let types = resolve(
            "#%RAML 1.0\ntitle: T\ntypes:\n  Base:\n    properties:\n      id: integer\n  Named:\n    type: Base\n    properties:\n      name?: string\n  Short:\n    type: string\n    maxLength: 5\n  Code:\n    type: Short\n    pattern: ^[A-Z]+$\n",
        )
        .unwrap();
        let named = types["Named"].object().unwrap();
        assert!(named.properties["id"].required);
        assert!(!named.properties["name"].required);
        assert_eq!(types["Named"].bases, vec!["Base".to_string()]);

        let code = &types["Code"];
        assert_eq!(code.shape, TypeShape::Scalar { scalar: ScalarKind::String });
        assert_eq!(code.facets["maxLength"], 5);
        assert_eq!(code.facets["pattern"], "^[A-Z]+$");
    }

    #[test]
    fn base_cycle_names_both_types() {
        let err = resolve("#%RAML 1.0\ntitle: T\ntypes:\n  T1:\n    type: T2\n  T2:\n    type: T1\n").unwrap_err();
        assert_matches!(err, RamliftError::CircularInheritance { kind: CycleKind::Type, .. });
        let chain = err.chain().unwrap();
        assert!(chain.contains(&"T1".to_string()) && chain.contains(&"T2".to_string()));
    }

    #[test]
    fn recursive_property_is_a_reference() {
        let types = resolve(
            "#%RAML 1.0\ntitle: T\ntypes:\n  Node:\n    properties:\n      next?: Node\n      children: Node[]\n      parent?:\n        type: Node\n        description: up\n",
        )
        .unwrap();
        let node = types["Node"].object().unwrap();
        assert_eq!(node.properties["next"].node, TypeNode::Ref("Node".to_string()));
        assert_eq!(node.properties["parent"].node, TypeNode::Ref("Node".to_string()));
    }

    #[test]
    fn multiple_inheritance_unions_and_detects_conflicts() {
        let types = resolve(
            "#%RAML 1.0\ntitle: T\ntypes:\n  A:\n    properties:\n      a: string\n  B:\n    properties:\n      b: number\n  AB:\n    type: [A, B]\n",
        )
        .unwrap();
        let ab = types["AB"].object().unwrap();
        assert!(ab.properties.contains_key("a") && ab.properties.contains_key("b"));

        let err = resolve(
            "#%RAML 1.0\ntitle: T\ntypes:\n  A:\n    properties:\n      x: string\n  B:\n    properties:\n      x: number\n  AB:\n    type: [A, B]\n",
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeResolution);
        assert!(err.to_string().contains("`x`"));
    }

    #[test]
    fn unknown_reference_fails() {
        let err = resolve("#%RAML 1.0\ntitle: T\ntypes:\n  A:\n    properties:\n      b: Missing\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeResolution);
        assert_eq!(err.path().unwrap().to_string(), "#/types/A/properties/b");
    }

    #[test]
    fn library_types_are_qualified() {
        let doc = expanded(
            MemorySource::new()
                .with("api.raml", "#%RAML 1.0\ntitle: T\nuses:\n  geo: geo.raml\ntypes:\n  Place:\n    properties:\n      at: geo.Point\n")
                .with("geo.raml", "#%RAML 1.0 Library\ntypes:\n  Point:\n    properties:\n      lat: number\n      lng: Coord\n  Coord: number\n"),
        );
        let mut r = TypeResolver::collect(&doc).unwrap();
        r.resolve_all().unwrap();
        let types = r.into_types();
        assert_eq!(types["Place"].object().unwrap().properties["at"].node, TypeNode::Ref("geo.Point".into()));
        assert_eq!(
            types["geo.Point"].object().unwrap().properties["lng"].node,
            TypeNode::Ref("geo.Coord".into())
        );
    }

    #[test]
    fn unqualified_name_does_not_bind_to_a_library_type() {
        let doc = expanded(
            MemorySource::new()
                .with("api.raml", "#%RAML 1.0\ntitle: T\nuses:\n  lib: lib.raml\ntypes:\n  Holder:\n    properties:\n      e: Error\n")
                .with("lib.raml", "#%RAML 1.0 Library\ntypes:\n  Error: object\n"),
        );
        let mut r = TypeResolver::collect(&doc).unwrap();
        let err = r.resolve_all().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeResolution);
        assert!(err.to_string().contains("unknown type `Error`"));
        assert_eq!(r.lookup(&Scope::Root, "lib.Error").as_deref(), Some("lib.Error"));
    }

    #[test]
    fn nullable_shorthand_and_json_schema() {
        let types = resolve(
            "#%RAML 1.0\ntitle: T\ntypes:\n  MaybeDate: date-only?\n  Legacy: '{\"type\": \"object\"}'\n",
        )
        .unwrap();
        assert_matches!(&types["MaybeDate"].shape, TypeShape::Union { variants } if variants.len() == 2 && variants[1].is_nil());
        assert_matches!(&types["Legacy"].shape, TypeShape::External { .. });
    }
}
