//! Type nodes to OpenAPI 3.0 schema objects.

use serde_json::{json, Map, Value};

use crate::builder::BuildCx;
use crate::errors::RamliftResult;
use crate::model::{ObjectShape, ResolvedType, ScalarKind, TypeNode, TypeShape};
use crate::path::NodePath;

/// Component reference for a named type.
pub fn component_ref(name: &str) -> Value {
    json!({ "$ref": format!("#/components/schemas/{name}") })
}

pub fn node_schema(node: &TypeNode, cx: &mut BuildCx<'_>, path: &NodePath) -> RamliftResult<Value> {
    match node {
        TypeNode::Ref(name) => Ok(component_ref(name)),
        TypeNode::Inline(ty) => type_schema(ty, cx, path),
    }
}

/// Full schema of a resolved type: shape, facets and descriptive members.
pub fn type_schema(ty: &ResolvedType, cx: &mut BuildCx<'_>, path: &NodePath) -> RamliftResult<Value> {
    let mut out = Map::new();
    match &ty.shape {
        TypeShape::Any => {}
        TypeShape::Nil => {
            cx.unsupported("standalone nil type has no OpenAPI 3.0 equivalent", path)?;
        }
        TypeShape::Scalar { scalar } => scalar_schema(*scalar, &mut out),
        TypeShape::Object(obj) => object_schema(obj, &mut out, cx, path)?,
        TypeShape::Array { items } => {
            out.insert("type".into(), json!("array"));
            let items = match items {
                Some(node) => node_schema(node, cx, &path.child("items"))?,
                None => json!({}),
            };
            out.insert("items".into(), items);
        }
        TypeShape::Union { variants } => union_schema(variants, &mut out, cx, path)?,
        TypeShape::External { schema } => {
            if let Some(parsed) = external_schema(schema, cx, path)? {
                return Ok(parsed);
            }
        }
    }

    for (facet, value) in &ty.facets {
        match facet.as_str() {
            "format" => {
                if let Some(format) = map_format(&ty.shape, value) {
                    out.insert("format".into(), format);
                }
            }
            "fileTypes" => {}
            _ => {
                out.insert(facet.clone(), value.clone());
            }
        }
    }

    if let Some(title) = &ty.display_name {
        out.insert("title".into(), json!(title));
    }
    if let Some(description) = &ty.description {
        out.insert("description".into(), json!(description));
    }
    if let Some(default) = &ty.default {
        out.insert("default".into(), default.clone());
    }
    let example = ty.example.clone().or_else(|| ty.examples.values().next().cloned());
    if let Some(example) = example {
        out.insert("example".into(), example);
    }
    Ok(Value::Object(out))
}

fn scalar_schema(scalar: ScalarKind, out: &mut Map<String, Value>) {
    let (ty, format) = match scalar {
        ScalarKind::String => ("string", None),
        ScalarKind::Number => ("number", None),
        ScalarKind::Integer => ("integer", None),
        ScalarKind::Boolean => ("boolean", None),
        ScalarKind::DateOnly => ("string", Some("date")),
        ScalarKind::TimeOnly => ("string", Some("time")),
        ScalarKind::DatetimeOnly | ScalarKind::Datetime => ("string", Some("date-time")),
        ScalarKind::File => ("string", Some("binary")),
    };
    out.insert("type".into(), json!(ty));
    if let Some(format) = format {
        out.insert("format".into(), json!(format));
    }
}

fn object_schema(
    obj: &ObjectShape,
    out: &mut Map<String, Value>,
    cx: &mut BuildCx<'_>,
    path: &NodePath,
) -> RamliftResult<()> {
    out.insert("type".into(), json!("object"));

    let mut properties = Map::new();
    let mut required = Vec::new();
    for (name, prop) in &obj.properties {
        let at = path.child("properties").child(name.clone());
        properties.insert(name.clone(), node_schema(&prop.node, cx, &at)?);
        if prop.required {
            required.push(json!(name));
        }
    }
    if !properties.is_empty() {
        out.insert("properties".into(), Value::Object(properties));
    }
    if !required.is_empty() {
        out.insert("required".into(), Value::Array(required));
    }

    if !obj.pattern_properties.is_empty() {
        cx.unsupported("pattern properties have no OpenAPI 3.0 equivalent", &path.child("properties"))?;
    }
    if let Some(additional) = obj.additional_properties {
        out.insert("additionalProperties".into(), json!(additional));
    }
    if let Some(discriminator) = &obj.discriminator {
        out.insert("discriminator".into(), json!({ "propertyName": discriminator }));
    }
    Ok(())
}

/// `A | nil` becomes a nullable `A`; other unions become `anyOf`.
fn union_schema(
    variants: &[TypeNode],
    out: &mut Map<String, Value>,
    cx: &mut BuildCx<'_>,
    path: &NodePath,
) -> RamliftResult<()> {
    let nullable = variants.iter().any(TypeNode::is_nil);
    let members: Vec<&TypeNode> = variants.iter().filter(|v| !v.is_nil()).collect();

    match members.as_slice() {
        [] => {
            cx.unsupported("union of nil only has no OpenAPI 3.0 equivalent", path)?;
        }
        [only] if nullable => match node_schema(only, cx, path)? {
            reference @ Value::Object(_) if reference.get("$ref").is_some() => {
                out.insert("allOf".into(), json!([reference]));
                out.insert("nullable".into(), json!(true));
            }
            Value::Object(inner) => {
                out.extend(inner);
                out.insert("nullable".into(), json!(true));
            }
            other => {
                out.insert("allOf".into(), json!([other]));
                out.insert("nullable".into(), json!(true));
            }
        },
        _ => {
            let mut any_of = Vec::with_capacity(members.len());
            for member in &members {
                any_of.push(node_schema(member, cx, path)?);
            }
            out.insert("anyOf".into(), Value::Array(any_of));
            if nullable {
                out.insert("nullable".into(), json!(true));
            }
        }
    }
    Ok(())
}

/// Inline JSON schema text is embedded; XML schemas are not representable.
fn external_schema(text: &str, cx: &mut BuildCx<'_>, path: &NodePath) -> RamliftResult<Option<Value>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') {
        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(mut schema)) => {
                schema.remove("$schema");
                schema.remove("id");
                schema.remove("$id");
                return Ok(Some(Value::Object(schema)));
            }
            _ => cx.unsupported("inline JSON schema is not a valid JSON object", path)?,
        }
    } else {
        cx.unsupported("XML schemas have no OpenAPI 3.0 equivalent", path)?;
    }
    Ok(None)
}

fn map_format(shape: &TypeShape, value: &Value) -> Option<Value> {
    if matches!(shape, TypeShape::Scalar { scalar: ScalarKind::Datetime }) {
        return None;
    }
    let format = value.as_str()?;
    Some(match format {
        "int" | "int8" | "int16" | "int32" => json!("int32"),
        "int64" | "long" => json!("int64"),
        other => json!(other),
    })
}
