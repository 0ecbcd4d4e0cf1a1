//! Resolved API model.
//!
//! The type resolver lowers the template-free document tree into these
//! structures. From here on the model is read-only: builders and plugins get
//! shared references and produce a separate output document.
//!
//! Node kinds form a closed set (`NodeKind`); `NodeRef` is the borrowed view
//! handed to builders and plugin hooks.

pub mod lower;
pub mod types;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::path::NodePath;
use crate::template::decls::TemplateInfo;

pub use self::types::{ObjectShape, Property, ResolvedType, ScalarKind, TypeNode, TypeShape};

/// Node kinds the builder pipeline and plugins dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Root,
    Resource,
    Method,
    Parameter,
    Response,
    Body,
    Type,
    SecurityScheme,
}

impl NodeKind {
    pub const ALL: [NodeKind; 8] = [
        NodeKind::Root,
        NodeKind::Resource,
        NodeKind::Method,
        NodeKind::Parameter,
        NodeKind::Response,
        NodeKind::Body,
        NodeKind::Type,
        NodeKind::SecurityScheme,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Resource => "resource",
            Self::Method => "method",
            Self::Parameter => "parameter",
            Self::Response => "response",
            Self::Body => "body",
            Self::Type => "type",
            Self::SecurityScheme => "security-scheme",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An annotation instance `(name): value`, name canonicalized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationType {
    pub name: String,
    pub ty: ResolvedType,
    pub allowed_targets: Vec<String>,
}

/// Node an annotation is applied to, named as in `allowedTargets`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationTarget {
    Api,
    Resource,
    Method,
    Response,
    SecurityScheme,
    TypeDeclaration,
}

impl AnnotationTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "API",
            Self::Resource => "Resource",
            Self::Method => "Method",
            Self::Response => "Response",
            Self::SecurityScheme => "SecurityScheme",
            Self::TypeDeclaration => "TypeDeclaration",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentationItem {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParameterLocation {
    BaseUri,
    Uri,
    Query,
    Header,
}

impl ParameterLocation {
    /// `in` value of the target dialect (base URI parameters become server variables).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BaseUri => "server",
            Self::Uri => "path",
            Self::Query => "query",
            Self::Header => "header",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub ty: TypeNode,
    pub annotations: Vec<Annotation>,
    pub path: NodePath,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Body {
    pub media_type: String,
    pub ty: TypeNode,
    pub path: NodePath,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status: String,
    pub description: Option<String>,
    pub headers: Vec<Parameter>,
    pub bodies: Vec<Body>,
    pub annotations: Vec<Annotation>,
    pub path: NodePath,
}

/// One `securedBy` entry; `scheme: None` is anonymous access (`null`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityRequirement {
    pub scheme: Option<String>,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecuritySchemeKind {
    OAuth2,
    OAuth1,
    Basic,
    Digest,
    PassThrough,
    Custom(String),
}

impl SecuritySchemeKind {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.trim() {
            "OAuth 2.0" => Self::OAuth2,
            "OAuth 1.0" => Self::OAuth1,
            "Basic Authentication" => Self::Basic,
            "Digest Authentication" => Self::Digest,
            "Pass Through" => Self::PassThrough,
            other if other.starts_with("x-") => Self::Custom(other.to_string()),
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityScheme {
    pub name: String,
    pub kind: SecuritySchemeKind,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub headers: Vec<Parameter>,
    pub query_parameters: Vec<Parameter>,
    pub responses: Vec<Response>,
    pub settings: Map<String, Value>,
    pub annotations: Vec<Annotation>,
    pub path: NodePath,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Method {
    pub verb: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub query_parameters: Vec<Parameter>,
    pub headers: Vec<Parameter>,
    pub query_string: Option<TypeNode>,
    pub bodies: Vec<Body>,
    pub responses: Vec<Response>,
    /// Effective `securedBy`; `None` inherits the API default.
    pub secured_by: Option<Vec<SecurityRequirement>>,
    pub protocols: Vec<String>,
    pub annotations: Vec<Annotation>,
    pub path: NodePath,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    pub relative_uri: String,
    pub full_uri: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub uri_parameters: Vec<Parameter>,
    /// Every parameter of `full_uri`, ancestors' included, in path order.
    pub path_parameters: Vec<Parameter>,
    pub methods: Vec<Method>,
    pub resources: Vec<Resource>,
    pub annotations: Vec<Annotation>,
    pub path: NodePath,
}

impl Resource {
    /// This resource followed by all descendants, depth first.
    pub fn walk(&self) -> Vec<&Resource> {
        let mut out = vec![self];
        for child in &self.resources {
            out.extend(child.walk());
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryInfo {
    pub prefix: String,
    pub location: String,
}

/// The resolved root document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Api {
    pub title: String,
    pub version: Option<String>,
    pub description: Option<String>,
    pub base_uri: Option<String>,
    pub base_uri_parameters: Vec<Parameter>,
    pub protocols: Vec<String>,
    pub media_types: Vec<String>,
    pub documentation: Vec<DocumentationItem>,
    pub secured_by: Vec<SecurityRequirement>,
    pub resources: Vec<Resource>,
    pub types: BTreeMap<String, ResolvedType>,
    pub traits: BTreeMap<String, TemplateInfo>,
    pub resource_types: BTreeMap<String, TemplateInfo>,
    pub security_schemes: BTreeMap<String, SecurityScheme>,
    pub annotation_types: BTreeMap<String, AnnotationType>,
    pub annotations: Vec<Annotation>,
    pub libraries: Vec<LibraryInfo>,
}

impl Api {
    pub fn all_resources(&self) -> Vec<&Resource> {
        self.resources.iter().flat_map(|r| r.walk()).collect()
    }

    pub fn method_count(&self) -> usize {
        self.all_resources().iter().map(|r| r.methods.len()).sum()
    }
}

/// Borrowed view of one node, handed to builders and plugin hooks.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Root(&'a Api),
    Resource(&'a Resource),
    Method(&'a Resource, &'a Method),
    Parameter(&'a Parameter),
    Response(&'a Response),
    Body(&'a Body),
    Type(&'a str, &'a ResolvedType),
    SecurityScheme(&'a SecurityScheme),
}

impl<'a> NodeRef<'a> {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Root(_) => NodeKind::Root,
            Self::Resource(_) => NodeKind::Resource,
            Self::Method(..) => NodeKind::Method,
            Self::Parameter(_) => NodeKind::Parameter,
            Self::Response(_) => NodeKind::Response,
            Self::Body(_) => NodeKind::Body,
            Self::Type(..) => NodeKind::Type,
            Self::SecurityScheme(_) => NodeKind::SecurityScheme,
        }
    }

    /// Annotations attached to the node (bodies carry theirs on the type).
    pub fn annotations(&self) -> &'a [Annotation] {
        match *self {
            Self::Root(api) => &api.annotations,
            Self::Resource(r) => &r.annotations,
            Self::Method(_, m) => &m.annotations,
            Self::Parameter(p) => &p.annotations,
            Self::Response(r) => &r.annotations,
            Self::Body(b) => match &b.ty {
                TypeNode::Inline(t) => &t.annotations,
                TypeNode::Ref(_) => &[],
            },
            Self::Type(_, t) => &t.annotations,
            Self::SecurityScheme(s) => &s.annotations,
        }
    }

    pub fn annotation(&self, name: &str) -> Option<&'a Value> {
        self.annotations()
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }
}
