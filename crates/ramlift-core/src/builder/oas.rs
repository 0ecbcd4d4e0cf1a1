//! Default OpenAPI 3.0 builders, one per node kind.

use serde_json::{json, Map, Value};

use crate::builder::schema::{node_schema, type_schema};
use crate::builder::{BuildCx, Children};
use crate::errors::{RamliftError, RamliftResult};
use crate::model::{
    Api, NodeKind, NodeRef, ParameterLocation, SecurityRequirement, SecurityScheme, SecuritySchemeKind, TypeNode,
};
use crate::template::uri_parameter_names;

/// `info.version` when the source declares none.
pub const UNVERSIONED: &str = "0.0.0";

fn mismatch(node: NodeRef<'_>, expected: NodeKind) -> RamliftError {
    RamliftError::invariant(format!("{expected} builder called with a {} node", node.kind()))
}

fn insert_opt(out: &mut Map<String, Value>, key: &str, value: Option<&String>) {
    if let Some(v) = value {
        out.insert(key.to_string(), json!(v));
    }
}

pub fn build_type(node: NodeRef<'_>, _children: &Children, cx: &mut BuildCx<'_>) -> RamliftResult<Option<Value>> {
    let NodeRef::Type(_, ty) = node else {
        return Err(mismatch(node, NodeKind::Type));
    };
    let path = cx.path.clone();
    Ok(Some(type_schema(ty, cx, &path)?))
}

pub fn build_parameter(node: NodeRef<'_>, _children: &Children, cx: &mut BuildCx<'_>) -> RamliftResult<Option<Value>> {
    let NodeRef::Parameter(param) = node else {
        return Err(mismatch(node, NodeKind::Parameter));
    };
    let mut out = Map::new();
    out.insert("name".into(), json!(param.name));
    out.insert("in".into(), json!(param.location.as_str()));
    if param.required || param.location == ParameterLocation::Uri {
        out.insert("required".into(), json!(true));
    }
    insert_opt(&mut out, "description", param.description.as_ref());
    out.insert("schema".into(), node_schema(&param.ty, cx, &param.path)?);
    Ok(Some(Value::Object(out)))
}

pub fn build_body(node: NodeRef<'_>, _children: &Children, cx: &mut BuildCx<'_>) -> RamliftResult<Option<Value>> {
    let NodeRef::Body(body) = node else {
        return Err(mismatch(node, NodeKind::Body));
    };
    Ok(Some(json!({ "schema": node_schema(&body.ty, cx, &body.path)? })))
}

fn content(children: &Children) -> Map<String, Value> {
    children
        .of(NodeKind::Body)
        .map(|f| (f.key.clone(), f.value.clone()))
        .collect()
}

pub fn build_response(node: NodeRef<'_>, children: &Children, _cx: &mut BuildCx<'_>) -> RamliftResult<Option<Value>> {
    let NodeRef::Response(response) = node else {
        return Err(mismatch(node, NodeKind::Response));
    };
    let mut out = Map::new();
    out.insert(
        "description".into(),
        json!(response.description.clone().unwrap_or_default()),
    );

    let headers: Map<String, Value> = children
        .of(NodeKind::Parameter)
        .map(|f| {
            let mut header = f.value.clone();
            if let Some(map) = header.as_object_mut() {
                map.remove("name");
                map.remove("in");
            }
            (f.key.clone(), header)
        })
        .collect();
    if !headers.is_empty() {
        out.insert("headers".into(), Value::Object(headers));
    }

    let content = content(children);
    if !content.is_empty() {
        out.insert("content".into(), Value::Object(content));
    }
    Ok(Some(Value::Object(out)))
}

pub fn build_method(node: NodeRef<'_>, children: &Children, cx: &mut BuildCx<'_>) -> RamliftResult<Option<Value>> {
    let NodeRef::Method(_, method) = node else {
        return Err(mismatch(node, NodeKind::Method));
    };
    let mut out = Map::new();
    insert_opt(&mut out, "summary", method.display_name.as_ref());
    insert_opt(&mut out, "description", method.description.as_ref());

    let parameters: Vec<Value> = children.of(NodeKind::Parameter).map(|f| f.value.clone()).collect();
    if !parameters.is_empty() {
        out.insert("parameters".into(), Value::Array(parameters));
    }

    if method.query_string.is_some() {
        cx.unsupported(
            "queryString has no OpenAPI 3.0 equivalent",
            &method.path.child("queryString"),
        )?;
    }

    let content = content(children);
    if !content.is_empty() {
        if matches!(method.verb.as_str(), "get" | "head") {
            cx.unsupported(
                format!("request body on {} has no OpenAPI 3.0 equivalent", method.verb.to_uppercase()),
                &method.path.child("body"),
            )?;
        } else {
            out.insert("requestBody".into(), json!({ "content": content, "required": true }));
        }
    }

    let mut responses: Map<String, Value> = children
        .of(NodeKind::Response)
        .map(|f| (f.key.clone(), f.value.clone()))
        .collect();
    if responses.is_empty() {
        responses.insert("default".into(), json!({ "description": "" }));
    }
    out.insert("responses".into(), Value::Object(responses));

    if let Some(requirements) = &method.secured_by {
        if let Some(security) = security_requirements(requirements, cx) {
            out.insert("security".into(), Value::Array(security));
        }
    }
    Ok(Some(Value::Object(out)))
}

pub fn build_resource(node: NodeRef<'_>, children: &Children, _cx: &mut BuildCx<'_>) -> RamliftResult<Option<Value>> {
    let NodeRef::Resource(resource) = node else {
        return Err(mismatch(node, NodeKind::Resource));
    };
    let mut out = Map::new();
    insert_opt(&mut out, "summary", resource.display_name.as_ref());
    insert_opt(&mut out, "description", resource.description.as_ref());

    let parameters: Vec<Value> = children.of(NodeKind::Parameter).map(|f| f.value.clone()).collect();
    if !parameters.is_empty() {
        out.insert("parameters".into(), Value::Array(parameters));
    }
    for method in children.of(NodeKind::Method) {
        out.insert(method.key.clone(), method.value.clone());
    }
    Ok(Some(Value::Object(out)))
}

pub fn build_security_scheme(
    node: NodeRef<'_>,
    _children: &Children,
    cx: &mut BuildCx<'_>,
) -> RamliftResult<Option<Value>> {
    let NodeRef::SecurityScheme(scheme) = node else {
        return Err(mismatch(node, NodeKind::SecurityScheme));
    };
    match translate_scheme(scheme) {
        Ok(value) => Ok(Some(value)),
        Err(reason) => {
            cx.unsupported(reason, &scheme.path)?;
            Ok(None)
        }
    }
}

pub fn build_root(node: NodeRef<'_>, children: &Children, cx: &mut BuildCx<'_>) -> RamliftResult<Option<Value>> {
    let NodeRef::Root(api) = node else {
        return Err(mismatch(node, NodeKind::Root));
    };

    let mut out = Map::new();
    out.insert("openapi".into(), json!(cx.config.openapi_version));
    out.insert("info".into(), info(api));

    let servers = servers(api);
    if !servers.is_empty() {
        out.insert("servers".into(), Value::Array(servers));
    }

    let paths: Map<String, Value> = children
        .of(NodeKind::Resource)
        .map(|f| (f.key.clone(), f.value.clone()))
        .collect();
    out.insert("paths".into(), Value::Object(paths));

    let mut components = Map::new();
    let schemas: Map<String, Value> = children
        .of(NodeKind::Type)
        .map(|f| (f.key.clone(), f.value.clone()))
        .collect();
    if !schemas.is_empty() {
        components.insert("schemas".into(), Value::Object(schemas));
    }
    let schemes: Map<String, Value> = children
        .of(NodeKind::SecurityScheme)
        .map(|f| (f.key.clone(), f.value.clone()))
        .collect();
    if !schemes.is_empty() {
        components.insert("securitySchemes".into(), Value::Object(schemes));
    }
    if !components.is_empty() {
        out.insert("components".into(), Value::Object(components));
    }

    if let Some(security) = security_requirements(&api.secured_by, cx) {
        out.insert("security".into(), Value::Array(security));
    }
    Ok(Some(Value::Object(out)))
}

fn info(api: &Api) -> Value {
    let mut info = Map::new();
    info.insert("title".into(), json!(api.title));
    info.insert(
        "version".into(),
        json!(api.version.clone().unwrap_or_else(|| UNVERSIONED.to_string())),
    );

    let mut description = api.description.clone().unwrap_or_default();
    for item in &api.documentation {
        if !description.is_empty() {
            description.push_str("\n\n");
        }
        description.push_str(&format!("## {}\n\n{}", item.title, item.content.trim_end()));
    }
    if !description.is_empty() {
        info.insert("description".into(), json!(description));
    }
    Value::Object(info)
}

/// One server per protocol; `{param}` segments become server variables, with
/// `version` defaulting to the API version.
fn servers(api: &Api) -> Vec<Value> {
    let Some(base) = &api.base_uri else {
        return Vec::new();
    };

    let urls: Vec<String> = match base.split_once("://") {
        Some((_, rest)) if !api.protocols.is_empty() => {
            api.protocols.iter().map(|p| format!("{p}://{rest}")).collect()
        }
        _ => vec![base.clone()],
    };

    let mut variables = Map::new();
    for name in uri_parameter_names(base) {
        let param = api.base_uri_parameters.iter().find(|p| p.name == name);
        let facets = param.and_then(|p| match &p.ty {
            TypeNode::Inline(t) => Some(&**t),
            TypeNode::Ref(r) => api.types.get(r),
        });

        let mut variable = Map::new();
        let choices: Vec<String> = facets
            .and_then(|t| t.facets.get("enum"))
            .and_then(Value::as_array)
            .map(|items| items.iter().map(variable_text).collect())
            .unwrap_or_default();
        let default = facets
            .and_then(|t| t.default.as_ref())
            .map(variable_text)
            .or_else(|| choices.first().cloned())
            .or_else(|| (name == "version").then(|| api.version.clone()).flatten())
            .unwrap_or_default();
        variable.insert("default".into(), json!(default));
        if !choices.is_empty() {
            variable.insert("enum".into(), json!(choices));
        }
        if let Some(description) = param.and_then(|p| p.description.as_ref()) {
            variable.insert("description".into(), json!(description));
        }
        variables.insert(name, Value::Object(variable));
    }

    urls.into_iter()
        .map(|url| {
            let mut server = Map::new();
            server.insert("url".into(), json!(url));
            if !variables.is_empty() {
                server.insert("variables".into(), Value::Object(variables.clone()));
            }
            Value::Object(server)
        })
        .collect()
}

fn variable_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `security` entries for a `securedBy` list. Schemes missing from
/// `components.securitySchemes` (untranslatable or vetoed) are dropped;
/// `None` when nothing remains of a non-empty list.
pub fn security_requirements(requirements: &[SecurityRequirement], cx: &BuildCx<'_>) -> Option<Vec<Value>> {
    if requirements.is_empty() {
        return None;
    }
    let out: Vec<Value> = requirements
        .iter()
        .filter_map(|req| match &req.scheme {
            None => Some(json!({})),
            Some(name) => {
                if !cx.has_scheme(name) {
                    return None;
                }
                let mut entry = Map::new();
                entry.insert(name.clone(), json!(req.scopes));
                Some(Value::Object(entry))
            }
        })
        .collect();
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// OpenAPI security scheme object, or the reason none exists.
pub fn translate_scheme(scheme: &SecurityScheme) -> Result<Value, String> {
    let mut out = match &scheme.kind {
        SecuritySchemeKind::Basic => json!({ "type": "http", "scheme": "basic" }),
        SecuritySchemeKind::Digest => json!({ "type": "http", "scheme": "digest" }),
        SecuritySchemeKind::OAuth2 => json!({ "type": "oauth2", "flows": oauth2_flows(scheme)? }),
        SecuritySchemeKind::PassThrough => match (scheme.headers.as_slice(), scheme.query_parameters.as_slice()) {
            ([header], []) => json!({ "type": "apiKey", "in": "header", "name": header.name }),
            ([], [query]) => json!({ "type": "apiKey", "in": "query", "name": query.name }),
            _ => {
                return Err(format!(
                    "Pass Through scheme `{}` must describe exactly one header or query parameter",
                    scheme.name
                ))
            }
        },
        SecuritySchemeKind::OAuth1 => {
            return Err(format!("OAuth 1.0 scheme `{}` has no OpenAPI 3.0 equivalent", scheme.name))
        }
        SecuritySchemeKind::Custom(kind) => {
            return Err(format!(
                "custom security scheme `{}` ({kind}) has no OpenAPI 3.0 equivalent",
                scheme.name
            ))
        }
    };
    if let (Some(description), Some(map)) = (&scheme.description, out.as_object_mut()) {
        map.insert("description".into(), json!(description));
    }
    Ok(out)
}

fn oauth2_flows(scheme: &SecurityScheme) -> Result<Value, String> {
    let setting = |key: &str| scheme.settings.get(key).and_then(Value::as_str).map(str::to_string);
    let authorization_url = setting("authorizationUri");
    let token_url = setting("accessTokenUri");
    let scopes: Map<String, Value> = scheme
        .settings
        .get("scopes")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| (s.to_string(), json!("")))
                .collect()
        })
        .unwrap_or_default();

    let mut grants: Vec<String> = scheme
        .settings
        .get("authorizationGrants")
        .map(|g| match g {
            Value::String(s) => vec![s.clone()],
            Value::Array(items) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
            _ => Vec::new(),
        })
        .unwrap_or_default();
    if grants.is_empty() {
        grants.push(if authorization_url.is_some() {
            "authorization_code".to_string()
        } else {
            "client_credentials".to_string()
        });
    }

    let need = |url: &Option<String>, which: &str, grant: &str| -> Result<String, String> {
        url.clone()
            .ok_or_else(|| format!("OAuth 2.0 scheme `{}` grant `{grant}` needs `{which}`", scheme.name))
    };

    let mut flows = Map::new();
    for grant in &grants {
        let (flow, value) = match grant.as_str() {
            "authorization_code" => (
                "authorizationCode",
                json!({
                    "authorizationUrl": need(&authorization_url, "authorizationUri", grant)?,
                    "tokenUrl": need(&token_url, "accessTokenUri", grant)?,
                    "scopes": scopes,
                }),
            ),
            "implicit" => (
                "implicit",
                json!({
                    "authorizationUrl": need(&authorization_url, "authorizationUri", grant)?,
                    "scopes": scopes,
                }),
            ),
            "password" => (
                "password",
                json!({ "tokenUrl": need(&token_url, "accessTokenUri", grant)?, "scopes": scopes }),
            ),
            "client_credentials" => (
                "clientCredentials",
                json!({ "tokenUrl": need(&token_url, "accessTokenUri", grant)?, "scopes": scopes }),
            ),
            _ => continue,
        };
        flows.insert(flow.to_string(), value);
    }

    if flows.is_empty() {
        return Err(format!(
            "OAuth 2.0 scheme `{}` declares no grant OpenAPI 3.0 can express",
            scheme.name
        ));
    }
    Ok(Value::Object(flows))
}
