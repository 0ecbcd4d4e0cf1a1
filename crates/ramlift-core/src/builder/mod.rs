//! Builder pipeline.
//!
//! A `BuilderRegistry` maps every `NodeKind` to a builder function. The walk is
//! bottom-up: a node's builder runs after all of its children were built and
//! receives their fragments. Plugin hooks run around every builder call.
//!
//! Walk order:
//! - named types, then security schemes
//! - resources in post-order (children first); inside a method the
//!   parameters, bodies and responses precede the method itself
//! - the root last
//!
//! Builders only read the model. Constructs without a target equivalent go
//! through `BuildCx::unsupported`, which is fatal in strict mode and a warning
//! otherwise.

pub mod oas;
pub mod schema;

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::BuildConfig;
use crate::errors::{RamliftError, RamliftResult};
use crate::host::PluginHost;
use crate::model::{Api, Method, NodeKind, NodeRef, Resource, Response};
use crate::path::NodePath;
use crate::pipeline::PipelineDiagnostic;

/// Builder signature: the node, its children's fragments, the build context.
/// `None` omits the node from the output.
pub type BuilderFn = fn(NodeRef<'_>, &Children, &mut BuildCx<'_>) -> RamliftResult<Option<Value>>;

/// A built child fragment, keyed the way its parent places it (parameter
/// name, media type, status code, verb, path, component name).
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub kind: NodeKind,
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default)]
pub struct Children {
    fragments: Vec<Fragment>,
}

impl Children {
    pub fn push(&mut self, fragment: Fragment) {
        self.fragments.push(fragment);
    }

    pub fn extend(&mut self, fragments: impl IntoIterator<Item = Fragment>) {
        self.fragments.extend(fragments);
    }

    pub fn of(&self, kind: NodeKind) -> impl Iterator<Item = &Fragment> + '_ {
        self.fragments.iter().filter(move |f| f.kind == kind)
    }

    pub fn find(&self, kind: NodeKind, key: &str) -> Option<&Value> {
        self.of(kind).find(|f| f.key == key).map(|f| &f.value)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// Shared state handed to builders.
pub struct BuildCx<'a> {
    pub api: &'a Api,
    pub config: &'a BuildConfig,
    /// Path of the node being built.
    pub path: NodePath,
    /// Security schemes that made it into the output so far.
    schemes: BTreeSet<String>,
    diagnostics: &'a mut Vec<PipelineDiagnostic>,
}

impl<'a> BuildCx<'a> {
    pub fn new(api: &'a Api, config: &'a BuildConfig, diagnostics: &'a mut Vec<PipelineDiagnostic>) -> Self {
        Self {
            api,
            config,
            path: NodePath::root(),
            schemes: BTreeSet::new(),
            diagnostics,
        }
    }

    /// Whether the security scheme `name` was built and not vetoed.
    pub fn has_scheme(&self, name: &str) -> bool {
        self.schemes.contains(name)
    }

    /// Report a construct with no target equivalent. Returns `Err` in strict
    /// mode; otherwise records a warning and lets the caller omit it.
    pub fn unsupported(&mut self, message: impl Into<String>, path: &NodePath) -> RamliftResult<()> {
        let message = message.into();
        if self.config.strict {
            return Err(RamliftError::unsupported(message, path.clone()));
        }
        warn!(path = %path, "{message}");
        self.diagnostics
            .push(PipelineDiagnostic::warning("build.unsupported", message).at(path.clone()));
        Ok(())
    }

    pub(crate) fn diagnostics(&mut self) -> &mut Vec<PipelineDiagnostic> {
        self.diagnostics
    }
}

/// Builder per node kind.
#[derive(Debug, Clone)]
pub struct BuilderRegistry {
    builders: BTreeMap<NodeKind, BuilderFn>,
}

impl Default for BuilderRegistry {
    fn default() -> Self {
        Self::openapi()
    }
}

impl BuilderRegistry {
    /// Default OpenAPI 3.0 builders for every node kind.
    pub fn openapi() -> Self {
        let mut builders: BTreeMap<NodeKind, BuilderFn> = BTreeMap::new();
        builders.insert(NodeKind::Root, oas::build_root);
        builders.insert(NodeKind::Resource, oas::build_resource);
        builders.insert(NodeKind::Method, oas::build_method);
        builders.insert(NodeKind::Parameter, oas::build_parameter);
        builders.insert(NodeKind::Response, oas::build_response);
        builders.insert(NodeKind::Body, oas::build_body);
        builders.insert(NodeKind::Type, oas::build_type);
        builders.insert(NodeKind::SecurityScheme, oas::build_security_scheme);
        Self { builders }
    }

    /// Replace the builder of one node kind.
    pub fn set(&mut self, kind: NodeKind, builder: BuilderFn) -> &mut Self {
        self.builders.insert(kind, builder);
        self
    }

    pub fn get(&self, kind: NodeKind) -> Option<BuilderFn> {
        self.builders.get(&kind).copied()
    }
}

/// Build the target document for `api`.
pub fn build_document(
    api: &Api,
    registry: &BuilderRegistry,
    host: &PluginHost,
    config: &BuildConfig,
    diagnostics: &mut Vec<PipelineDiagnostic>,
) -> RamliftResult<Value> {
    let mut walker = Walker {
        registry,
        host,
        cx: BuildCx::new(api, config, diagnostics),
    };

    let mut children = Children::default();
    for (name, ty) in &api.types {
        let path = NodePath::root().child("types").child(name.clone());
        children.extend(walker.node(NodeRef::Type(name, ty), name.clone(), &path, Children::default())?);
    }
    for (name, scheme) in &api.security_schemes {
        children.extend(walker.node(NodeRef::SecurityScheme(scheme), name.clone(), &scheme.path, Children::default())?);
    }
    for resource in &api.resources {
        children.extend(walker.resource(resource)?);
    }

    let root = walker.node(NodeRef::Root(api), String::new(), &NodePath::root(), children)?;
    let mut document = root
        .map(|f| f.value)
        .ok_or_else(|| RamliftError::invariant("the root fragment was vetoed"))?;
    crate::determinism::canonical_json::strip_nulls(&mut document);
    Ok(document)
}

struct Walker<'a> {
    registry: &'a BuilderRegistry,
    host: &'a PluginHost,
    cx: BuildCx<'a>,
}

impl<'a> Walker<'a> {
    fn node(
        &mut self,
        node: NodeRef<'a>,
        key: String,
        path: &NodePath,
        children: Children,
    ) -> RamliftResult<Option<Fragment>> {
        let kind = node.kind();
        let before = self.host.before(node, path, self.cx.api, self.cx.diagnostics())?;

        let built = match before.replaced {
            Some(replacement) => replacement,
            None => {
                let builder = self
                    .registry
                    .get(kind)
                    .ok_or_else(|| RamliftError::invariant(format!("no builder registered for {kind}")))?;
                self.cx.path = path.clone();
                builder(node, &children, &mut self.cx)?
            }
        };

        let built = match built {
            Some(value) => Some(PluginHost::apply_extensions(value, before.extensions, path)?),
            None => None,
        };
        let value = self.host.after(node, built, path, self.cx.api, self.cx.diagnostics())?;

        match &value {
            None => debug!(%kind, path = %path, "node omitted from output"),
            Some(_) if kind == NodeKind::SecurityScheme => {
                self.cx.schemes.insert(key.clone());
            }
            Some(_) => {}
        }
        Ok(value.map(|value| Fragment { kind, key, value }))
    }

    /// Fragments of `resource` and all of its descendants.
    fn resource(&mut self, resource: &'a Resource) -> RamliftResult<Vec<Fragment>> {
        let mut descendants = Vec::new();
        for child in &resource.resources {
            descendants.extend(self.resource(child)?);
        }

        let mut children = Children::default();
        for param in &resource.path_parameters {
            let path = resource.path.child("uriParameters").child(param.name.clone());
            children.extend(self.node(NodeRef::Parameter(param), param.name.clone(), &path, Children::default())?);
        }
        for method in &resource.methods {
            children.extend(self.method(resource, method)?);
        }

        let mut out: Vec<Fragment> = self
            .node(NodeRef::Resource(resource), resource.full_uri.clone(), &resource.path, children)?
            .into_iter()
            .collect();
        out.extend(descendants);
        Ok(out)
    }

    fn method(&mut self, resource: &'a Resource, method: &'a Method) -> RamliftResult<Option<Fragment>> {
        let mut children = Children::default();
        for param in method.query_parameters.iter().chain(&method.headers) {
            children.extend(self.node(NodeRef::Parameter(param), param.name.clone(), &param.path, Children::default())?);
        }
        for body in &method.bodies {
            children.extend(self.node(NodeRef::Body(body), body.media_type.clone(), &body.path, Children::default())?);
        }
        for response in &method.responses {
            children.extend(self.response(response)?);
        }
        self.node(NodeRef::Method(resource, method), method.verb.clone(), &method.path, children)
    }

    fn response(&mut self, response: &'a Response) -> RamliftResult<Option<Fragment>> {
        let mut children = Children::default();
        for header in &response.headers {
            children.extend(self.node(NodeRef::Parameter(header), header.name.clone(), &header.path, Children::default())?);
        }
        for body in &response.bodies {
            children.extend(self.node(NodeRef::Body(body), body.media_type.clone(), &body.path, Children::default())?);
        }
        self.node(NodeRef::Response(response), response.status.clone(), &response.path, children)
    }
}
