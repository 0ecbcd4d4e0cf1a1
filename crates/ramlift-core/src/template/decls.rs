//! Trait and resource type declarations.
//!
//! Declarations are collected from the master document and every library
//! into one catalog keyed by canonical name. Both the map form
//! (`traits: {paged: {...}}`) and the legacy sequence-of-maps form
//! (`traits: [{paged: {...}}]`) are accepted.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::{RamliftError, RamliftResult};
use crate::loader::DocumentGraph;
use crate::path::NodePath;
use crate::scope::{Namespaces, Scope};
use crate::template::params::{referenced_params, RESERVED_PARAMS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TemplateKind {
    Trait,
    ResourceType,
}

impl TemplateKind {
    pub fn section(&self) -> &'static str {
        match self {
            Self::Trait => "traits",
            Self::ResourceType => "resourceTypes",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Trait => "trait",
            Self::ResourceType => "resource type",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TemplateDecl {
    pub kind: TemplateKind,
    pub name: String,
    pub scope: Scope,
    pub body: Map<String, Value>,
    pub path: NodePath,
}

/// Public summary of a declared template, kept on the resolved model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateInfo {
    pub kind: TemplateKind,
    pub name: String,
    pub usage: Option<String>,
    /// Author-supplied parameters (reserved parameters excluded).
    pub parameters: BTreeSet<String>,
}

impl TemplateDecl {
    pub fn info(&self) -> TemplateInfo {
        let body = Value::Object(self.body.clone());
        TemplateInfo {
            kind: self.kind,
            name: self.name.clone(),
            usage: self.body.get("usage").and_then(Value::as_str).map(str::to_string),
            parameters: referenced_params(&body)
                .into_iter()
                .filter(|p| !RESERVED_PARAMS.contains(&p.as_str()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    traits: BTreeMap<String, TemplateDecl>,
    resource_types: BTreeMap<String, TemplateDecl>,
}

impl TemplateCatalog {
    /// Collect declarations, removing the declaration sections from the master
    /// tree (they are consumed by expansion).
    pub fn collect(graph: &mut DocumentGraph, ns: &Namespaces) -> RamliftResult<Self> {
        let mut catalog = Self::default();

        for kind in [TemplateKind::Trait, TemplateKind::ResourceType] {
            let section = graph
                .root
                .as_object_mut()
                .and_then(|root| root.remove(kind.section()));
            if let Some(section) = section {
                let base = NodePath::root().child(kind.section());
                catalog.add_section(kind, &Scope::Root, &section, &base, ns)?;
            }

            for (location, library) in &graph.libraries {
                let scope = Scope::Library(location.clone());
                if let Some(section) = library.tree.get(kind.section()) {
                    let prefix = ns.prefix(&scope).unwrap_or(location.as_str()).to_string();
                    let base = NodePath::from_segments(["uses".to_string(), prefix, kind.section().to_string()]);
                    catalog.add_section(kind, &scope, section, &base, ns)?;
                }
            }
        }

        Ok(catalog)
    }

    fn add_section(
        &mut self,
        kind: TemplateKind,
        scope: &Scope,
        section: &Value,
        base: &NodePath,
        ns: &Namespaces,
    ) -> RamliftResult<()> {
        let mut entries: Vec<(String, Value)> = Vec::new();
        match section {
            Value::Null => {}
            Value::Object(map) => entries.extend(map.iter().map(|(k, v)| (k.clone(), v.clone()))),
            Value::Array(items) => {
                for item in items {
                    let map = item.as_object().ok_or_else(|| {
                        RamliftError::structure(
                            format!("{} entries must be mappings", kind.section()),
                            base.clone(),
                        )
                    })?;
                    entries.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
            _ => {
                return Err(RamliftError::structure(
                    format!("`{}` must be a mapping", kind.section()),
                    base.clone(),
                ))
            }
        }

        for (name, body) in entries {
            let path = base.child(name.clone());
            let body = match body {
                Value::Null => Map::new(),
                Value::Object(map) => map,
                _ => {
                    return Err(RamliftError::structure(
                        format!("{} `{name}` must be a mapping", kind.label()),
                        path,
                    ))
                }
            };
            if kind == TemplateKind::Trait && body.contains_key("is") {
                return Err(RamliftError::structure(
                    format!("trait `{name}` cannot apply other traits"),
                    path.child("is"),
                ));
            }
            let canonical = ns.canonical(scope, &name);
            let decl = TemplateDecl {
                kind,
                name: canonical.clone(),
                scope: scope.clone(),
                body,
                path: path.clone(),
            };
            let table = self.table_mut(kind);
            if table.contains_key(&canonical) {
                return Err(RamliftError::structure(
                    format!("duplicate {} `{canonical}`", kind.label()),
                    path,
                ));
            }
            table.insert(canonical, decl);
        }
        Ok(())
    }

    fn table(&self, kind: TemplateKind) -> &BTreeMap<String, TemplateDecl> {
        match kind {
            TemplateKind::Trait => &self.traits,
            TemplateKind::ResourceType => &self.resource_types,
        }
    }

    fn table_mut(&mut self, kind: TemplateKind) -> &mut BTreeMap<String, TemplateDecl> {
        match kind {
            TemplateKind::Trait => &mut self.traits,
            TemplateKind::ResourceType => &mut self.resource_types,
        }
    }

    /// Resolve `reference` made from `scope`.
    pub fn lookup(
        &self,
        kind: TemplateKind,
        ns: &Namespaces,
        scope: &Scope,
        reference: &str,
        path: &NodePath,
    ) -> RamliftResult<&TemplateDecl> {
        ns.resolve(scope, reference)
            .and_then(|canonical| self.table(kind).get(&canonical))
            .ok_or_else(|| {
                RamliftError::template(
                    reference,
                    format!("unknown {} `{reference}`", kind.label()),
                    path.clone(),
                )
            })
    }

    pub fn infos(&self, kind: TemplateKind) -> BTreeMap<String, TemplateInfo> {
        self.table(kind)
            .iter()
            .map(|(name, decl)| (name.clone(), decl.info()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.traits.len() + self.resource_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
