//! Lowering of the expanded document tree into the `Api` model.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::CoreConfig;
use crate::errors::{RamliftError, RamliftResult};
use crate::model::{
    AnnotationTarget, Api, Body, DocumentationItem, LibraryInfo, Method, Parameter, ParameterLocation, Resource, Response,
    ScalarKind, SecurityRequirement, SecurityScheme, SecuritySchemeKind, TypeNode,
};
use crate::model::types::ResolvedType;
use crate::path::NodePath;
use crate::scope::{Namespaces, Scope};
use crate::template::{is_method_key, is_resource_key, uri_parameter_names, ExpandedDocument, METHODS};
use crate::types::facets::{annotation_name, string_field};
use crate::types::{ImplicitType, TypeResolver};

/// Resolve every type in `doc` and lower the master tree into an `Api`.
pub fn lower(doc: &ExpandedDocument, config: &CoreConfig) -> RamliftResult<Api> {
    let mut types = TypeResolver::collect(doc)?;
    types.check_cycles()?;
    types.resolve_all()?;
    let annotation_types = types.resolve_annotation_types()?;

    let root = match &doc.graph.root {
        Value::Object(map) => map,
        _ => {
            return Err(RamliftError::structure(
                "the root document must be a mapping",
                NodePath::root(),
            ))
        }
    };

    let mut lowering = Lowering {
        types,
        ns: &doc.namespaces,
        media_types: media_types(root.get("mediaType"), config),
        schemes: BTreeMap::new(),
    };

    lowering.collect_schemes(doc)?;

    let title = string_field(root, "title")
        .ok_or_else(|| RamliftError::structure("missing `title`", NodePath::root().child("title")))?;

    let secured_by = match root.get("securedBy") {
        Some(v) => lowering.secured_by(v, &Scope::Root, &NodePath::root().child("securedBy"))?,
        None => Vec::new(),
    };
    let base_uri_parameters = lowering.parameters(
        root.get("baseUriParameters"),
        ParameterLocation::BaseUri,
        &Scope::Root,
        &NodePath::root().child("baseUriParameters"),
    )?;

    let mut resources = Vec::new();
    for (key, node) in root.iter().filter(|(k, _)| is_resource_key(k)) {
        let path = NodePath::root().child(key.clone());
        resources.push(lowering.resource(key, node, "", &[], None, &path)?);
    }

    let annotations = lowering
        .types
        .annotations_of(root, AnnotationTarget::Api, &Scope::Root, &NodePath::root())?;

    let api = Api {
        title,
        version: root.get("version").and_then(scalar_text),
        description: string_field(root, "description"),
        base_uri: string_field(root, "baseUri"),
        base_uri_parameters,
        protocols: protocols(root.get("protocols")),
        media_types: lowering.media_types.clone(),
        documentation: documentation(root.get("documentation"))?,
        secured_by,
        resources,
        types: BTreeMap::new(),
        traits: doc.traits.clone(),
        resource_types: doc.resource_types.clone(),
        security_schemes: std::mem::take(&mut lowering.schemes),
        annotation_types,
        annotations,
        libraries: doc
            .namespaces
            .libraries()
            .into_iter()
            .map(|(prefix, location)| LibraryInfo {
                prefix,
                location: location.to_string(),
            })
            .collect(),
    };
    let api = Api {
        types: lowering.types.into_types(),
        ..api
    };

    debug!(
        resources = api.all_resources().len(),
        methods = api.method_count(),
        types = api.types.len(),
        "lowered api model"
    );
    Ok(api)
}

struct Lowering<'a> {
    types: TypeResolver<'a>,
    ns: &'a Namespaces,
    media_types: Vec<String>,
    schemes: BTreeMap<String, SecurityScheme>,
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn media_types(value: Option<&Value>, config: &CoreConfig) -> Vec<String> {
    let declared: Vec<String> = match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        _ => Vec::new(),
    };
    if declared.is_empty() {
        vec![config.build.default_media_type.clone()]
    } else {
        declared
    }
}

fn protocols(value: Option<&Value>) -> Vec<String> {
    let list = match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        _ => Vec::new(),
    };
    list.into_iter().map(|p| p.to_ascii_lowercase()).unique().collect()
}

fn documentation(value: Option<&Value>) -> RamliftResult<Vec<DocumentationItem>> {
    let Some(Value::Array(items)) = value else {
        return Ok(Vec::new());
    };
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let path = NodePath::root().child("documentation").child(i.to_string());
        let map = item
            .as_object()
            .ok_or_else(|| RamliftError::structure("documentation entries must be mappings", path.clone()))?;
        let title = string_field(map, "title")
            .ok_or_else(|| RamliftError::structure("documentation entry without `title`", path.clone()))?;
        out.push(DocumentationItem {
            title,
            content: string_field(map, "content").unwrap_or_default(),
        });
    }
    Ok(out)
}

fn mapping<'v>(value: Option<&'v Value>, what: &str, path: &NodePath) -> RamliftResult<Option<&'v Map<String, Value>>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(m)) => Ok(Some(m)),
        Some(_) => Err(RamliftError::structure(format!("`{what}` must be a mapping"), path.clone())),
    }
}

impl<'a> Lowering<'a> {
    fn collect_schemes(&mut self, doc: &ExpandedDocument) -> RamliftResult<()> {
        let mut sources: Vec<(Scope, &Value, NodePath)> = vec![(Scope::Root, &doc.graph.root, NodePath::root())];
        for (location, library) in &doc.graph.libraries {
            let scope = Scope::Library(location.clone());
            let prefix = self.ns.prefix(&scope).unwrap_or(location.as_str()).to_string();
            sources.push((scope, &library.tree, NodePath::root().child("uses").child(prefix)));
        }

        for (scope, tree, base) in sources {
            let path = base.child("securitySchemes");
            let Some(section) = mapping(tree.get("securitySchemes"), "securitySchemes", &path)? else {
                continue;
            };
            for (name, raw) in section {
                let canonical = self.ns.canonical(&scope, name);
                let scheme = self.security_scheme(&canonical, raw, &scope, &path.child(name.clone()))?;
                self.schemes.insert(canonical, scheme);
            }
        }
        Ok(())
    }

    fn security_scheme(
        &mut self,
        name: &str,
        raw: &Value,
        scope: &Scope,
        path: &NodePath,
    ) -> RamliftResult<SecurityScheme> {
        let map = raw
            .as_object()
            .ok_or_else(|| RamliftError::structure("security scheme must be a mapping", path.clone()))?;
        let kind_text = string_field(map, "type")
            .ok_or_else(|| RamliftError::structure("security scheme without `type`", path.child("type")))?;
        let kind = SecuritySchemeKind::parse(&kind_text).ok_or_else(|| {
            RamliftError::structure(format!("unknown security scheme type `{kind_text}`"), path.child("type"))
        })?;

        let described_path = path.child("describedBy");
        let described = mapping(map.get("describedBy"), "describedBy", &described_path)?;
        let (headers, query_parameters, responses) = match described {
            Some(d) => (
                self.parameters(d.get("headers"), ParameterLocation::Header, scope, &described_path.child("headers"))?,
                self.parameters(
                    d.get("queryParameters"),
                    ParameterLocation::Query,
                    scope,
                    &described_path.child("queryParameters"),
                )?,
                self.responses(d.get("responses"), scope, &described_path.child("responses"))?,
            ),
            None => (Vec::new(), Vec::new(), Vec::new()),
        };

        Ok(SecurityScheme {
            name: name.to_string(),
            kind,
            display_name: string_field(map, "displayName"),
            description: string_field(map, "description"),
            headers,
            query_parameters,
            responses,
            settings: mapping(map.get("settings"), "settings", &path.child("settings"))?
                .cloned()
                .unwrap_or_default(),
            annotations: self.types.annotations_of(map, AnnotationTarget::SecurityScheme, scope, path)?,
            path: path.clone(),
        })
    }

    /// `securedBy` list. `null` entries are anonymous access; `{scheme: {scopes}}`
    /// carries OAuth scopes.
    fn secured_by(&self, value: &Value, scope: &Scope, path: &NodePath) -> RamliftResult<Vec<SecurityRequirement>> {
        let entries: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            single => vec![single],
        };
        let mut out = Vec::with_capacity(entries.len());
        for (i, entry) in entries.into_iter().enumerate() {
            let at = path.child(i.to_string());
            let (reference, params) = match entry {
                Value::Null => {
                    out.push(SecurityRequirement {
                        scheme: None,
                        scopes: Vec::new(),
                    });
                    continue;
                }
                Value::String(s) => (s.as_str(), None),
                Value::Object(m) if m.len() == 1 => match m.iter().next() {
                    Some((k, v)) => (k.as_str(), Some(v)),
                    None => continue,
                },
                _ => return Err(RamliftError::structure("invalid `securedBy` entry", at)),
            };
            let canonical = self
                .ns
                .resolve(scope, reference)
                .filter(|c| self.schemes.contains_key(c))
                .ok_or_else(|| RamliftError::type_resolution(format!("unknown security scheme `{reference}`"), at.clone()))?;
            let scopes = params
                .and_then(|p| p.get("scopes"))
                .map(|s| match s {
                    Value::Array(items) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
                    Value::String(one) => vec![one.clone()],
                    _ => Vec::new(),
                })
                .unwrap_or_default();
            out.push(SecurityRequirement {
                scheme: Some(canonical),
                scopes,
            });
        }
        Ok(out)
    }

    fn parameters(
        &mut self,
        value: Option<&Value>,
        location: ParameterLocation,
        scope: &Scope,
        path: &NodePath,
    ) -> RamliftResult<Vec<Parameter>> {
        let what = path.last().unwrap_or("parameters").to_string();
        let Some(map) = mapping(value, &what, path)? else {
            return Ok(Vec::new());
        };
        let mut out = Vec::with_capacity(map.len());
        for (key, raw) in map {
            let at = path.child(key.clone());
            out.push(self.parameter(key, raw, location, scope, &at)?);
        }
        Ok(out)
    }

    fn parameter(
        &mut self,
        key: &str,
        raw: &Value,
        location: ParameterLocation,
        scope: &Scope,
        path: &NodePath,
    ) -> RamliftResult<Parameter> {
        let (name, optional) = match key.strip_suffix('?') {
            Some(n) => (n.to_string(), true),
            None => (key.to_string(), false),
        };
        let mut decl = match raw {
            Value::Null => Map::new(),
            Value::Object(m) => m.clone(),
            Value::String(_) | Value::Array(_) => {
                let mut m = Map::new();
                m.insert("type".to_string(), raw.clone());
                m
            }
            _ => return Err(RamliftError::structure("parameter must be a type or declaration", path.clone())),
        };

        let explicit_required = decl.remove("required").and_then(|v| v.as_bool());
        let required = match location {
            ParameterLocation::Uri | ParameterLocation::BaseUri => true,
            _ => explicit_required.unwrap_or(!optional),
        };
        let display_name = decl.remove("displayName").and_then(|v| v.as_str().map(str::to_string));
        let description = decl.remove("description").and_then(|v| v.as_str().map(str::to_string));
        let annotations = self.types.annotations_of(&decl, AnnotationTarget::TypeDeclaration, scope, path)?;
        decl.retain(|k, _| annotation_name(k).is_none());

        let ty = self
            .types
            .node_for(&Value::Object(decl), scope, path, ImplicitType::String)?;

        Ok(Parameter {
            name,
            location,
            required,
            display_name,
            description,
            ty,
            annotations,
            path: path.clone(),
        })
    }

    /// Bodies keyed by media type, or a single type applied to every default
    /// media type.
    fn bodies(&mut self, value: Option<&Value>, scope: &Scope, path: &NodePath) -> RamliftResult<Vec<Body>> {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        match value {
            Value::Object(m) if !m.is_empty() && m.keys().all(|k| k.contains('/')) => {
                for (media_type, raw) in m {
                    let at = path.child(media_type.clone());
                    out.push(Body {
                        media_type: media_type.clone(),
                        ty: self.types.node_for(raw, scope, &at, ImplicitType::Any)?,
                        path: at,
                    });
                }
            }
            other => {
                let ty = self.types.node_for(other, scope, path, ImplicitType::Any)?;
                for media_type in &self.media_types {
                    out.push(Body {
                        media_type: media_type.clone(),
                        ty: ty.clone(),
                        path: path.clone(),
                    });
                }
            }
        }
        Ok(out)
    }

    fn responses(&mut self, value: Option<&Value>, scope: &Scope, path: &NodePath) -> RamliftResult<Vec<Response>> {
        let Some(map) = mapping(value, "responses", path)? else {
            return Ok(Vec::new());
        };
        let mut out = Vec::with_capacity(map.len());
        for (status, raw) in map {
            let at = path.child(status.clone());
            let empty = Map::new();
            let decl = match raw {
                Value::Null => &empty,
                Value::Object(m) => m,
                _ => return Err(RamliftError::structure("response must be a mapping", at)),
            };
            out.push(Response {
                status: status.clone(),
                description: string_field(decl, "description"),
                headers: self.parameters(decl.get("headers"), ParameterLocation::Header, scope, &at.child("headers"))?,
                bodies: self.bodies(decl.get("body"), scope, &at.child("body"))?,
                annotations: self.types.annotations_of(decl, AnnotationTarget::Response, scope, &at)?,
                path: at,
            });
        }
        Ok(out)
    }

    fn resource(
        &mut self,
        relative: &str,
        value: &Value,
        parent_uri: &str,
        inherited_params: &[Parameter],
        parent_secured: Option<&[SecurityRequirement]>,
        path: &NodePath,
    ) -> RamliftResult<Resource> {
        let empty = Map::new();
        let map = match value {
            Value::Null => &empty,
            Value::Object(m) => m,
            _ => return Err(RamliftError::structure("resource must be a mapping", path.clone())),
        };
        let full_uri = format!("{parent_uri}{relative}");

        let uri_parameters =
            self.parameters(map.get("uriParameters"), ParameterLocation::Uri, &Scope::Root, &path.child("uriParameters"))?;

        let mut path_parameters = inherited_params.to_vec();
        for name in uri_parameter_names(relative) {
            let declared = uri_parameters
                .iter()
                .find(|p| p.name == name)
                .or_else(|| inherited_params.iter().rev().find(|p| p.name == name))
                .cloned();
            path_parameters.push(declared.unwrap_or_else(|| Parameter {
                name: name.clone(),
                location: ParameterLocation::Uri,
                required: true,
                display_name: None,
                description: None,
                ty: TypeNode::inline(ResolvedType::scalar(ScalarKind::String)),
                annotations: Vec::new(),
                path: path.clone(),
            }));
        }

        let own_secured = match map.get("securedBy") {
            Some(v) => Some(self.secured_by(v, &Scope::Root, &path.child("securedBy"))?),
            None => None,
        };
        let effective_secured = own_secured.as_deref().or(parent_secured);

        let mut methods = Vec::new();
        for verb in METHODS {
            if let Some(node) = map.get(*verb) {
                methods.push(self.method(verb, node, effective_secured, &path.child(*verb))?);
            }
        }

        let mut resources = Vec::new();
        for (key, node) in map.iter().filter(|(k, _)| is_resource_key(k)) {
            resources.push(self.resource(key, node, &full_uri, &path_parameters, effective_secured, &path.child(key.clone()))?);
        }

        Ok(Resource {
            relative_uri: relative.to_string(),
            full_uri,
            display_name: string_field(map, "displayName"),
            description: string_field(map, "description"),
            uri_parameters,
            path_parameters,
            methods,
            resources,
            annotations: self.types.annotations_of(map, AnnotationTarget::Resource, &Scope::Root, path)?,
            path: path.clone(),
        })
    }

    fn method(
        &mut self,
        verb: &str,
        value: &Value,
        resource_secured: Option<&[SecurityRequirement]>,
        path: &NodePath,
    ) -> RamliftResult<Method> {
        debug_assert!(is_method_key(verb));
        let empty = Map::new();
        let map = match value {
            Value::Null => &empty,
            Value::Object(m) => m,
            _ => return Err(RamliftError::structure("method must be a mapping", path.clone())),
        };

        let query_string = match map.get("queryString") {
            Some(raw) if !raw.is_null() => Some(self.types.node_for(
                raw,
                &Scope::Root,
                &path.child("queryString"),
                ImplicitType::String,
            )?),
            _ => None,
        };
        let secured_by = match map.get("securedBy") {
            Some(v) => Some(self.secured_by(v, &Scope::Root, &path.child("securedBy"))?),
            None => resource_secured.map(<[SecurityRequirement]>::to_vec),
        };

        Ok(Method {
            verb: verb.to_string(),
            display_name: string_field(map, "displayName"),
            description: string_field(map, "description"),
            query_parameters: self.parameters(
                map.get("queryParameters"),
                ParameterLocation::Query,
                &Scope::Root,
                &path.child("queryParameters"),
            )?,
            headers: self.parameters(
                map.get("headers"),
                ParameterLocation::Header,
                &Scope::Root,
                &path.child("headers"),
            )?,
            query_string,
            bodies: self.bodies(map.get("body"), &Scope::Root, &path.child("body"))?,
            responses: self.responses(map.get("responses"), &Scope::Root, &path.child("responses"))?,
            secured_by,
            protocols: protocols(map.get("protocols")),
            annotations: self.types.annotations_of(map, AnnotationTarget::Method, &Scope::Root, path)?,
            path: path.clone(),
        })
    }
}
