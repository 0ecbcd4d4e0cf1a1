//! Canonical type nodes produced by the type resolver.
//!
//! Every `ResolvedType` is fully flattened: inherited properties and facets are
//! already merged in, so consumers never walk a base chain. Named types are
//! referenced by canonical name (`TypeNode::Ref`) wherever a property or item
//! simply points at them, which keeps recursive structures finite.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::model::Annotation;

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScalarKind {
    String,
    Number,
    Integer,
    Boolean,
    DateOnly,
    TimeOnly,
    DatetimeOnly,
    Datetime,
    File,
}

impl ScalarKind {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "string" => Self::String,
            "number" => Self::Number,
            "integer" => Self::Integer,
            "boolean" => Self::Boolean,
            "date-only" => Self::DateOnly,
            "time-only" => Self::TimeOnly,
            "datetime-only" => Self::DatetimeOnly,
            "datetime" => Self::Datetime,
            "file" => Self::File,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub node: TypeNode,
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObjectShape {
    pub properties: BTreeMap<String, Property>,
    /// `/regex/` property declarations.
    pub pattern_properties: BTreeMap<String, TypeNode>,
    pub additional_properties: Option<bool>,
    pub discriminator: Option<String>,
    pub discriminator_value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TypeShape {
    Any,
    Nil,
    Scalar { scalar: ScalarKind },
    Object(ObjectShape),
    Array { items: Option<Box<TypeNode>> },
    Union { variants: Vec<TypeNode> },
    /// JSON or XML schema text kept verbatim.
    External { schema: String },
}

impl TypeShape {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Nil => "nil",
            Self::Scalar { .. } => "scalar",
            Self::Object(_) => "object",
            Self::Array { .. } => "array",
            Self::Union { .. } => "union",
            Self::External { .. } => "external",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", content = "value", rename_all = "kebab-case")]
pub enum TypeNode {
    /// Reference to a named type by canonical name.
    Ref(String),
    Inline(Box<ResolvedType>),
}

impl TypeNode {
    pub fn inline(ty: ResolvedType) -> Self {
        Self::Inline(Box::new(ty))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Inline(t) if t.shape == TypeShape::Nil)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedType {
    /// Canonical name for declared types, `None` for inline types.
    pub name: Option<String>,
    /// Direct named ancestors, for information only.
    pub bases: Vec<String>,
    pub shape: TypeShape,
    /// Validation facets (`pattern`, `minimum`, `enum`, ...), already merged
    /// with every ancestor's.
    pub facets: BTreeMap<String, Value>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub default: Option<Value>,
    pub example: Option<Value>,
    pub examples: BTreeMap<String, Value>,
    pub annotations: Vec<Annotation>,
}

impl ResolvedType {
    pub fn of(shape: TypeShape) -> Self {
        Self {
            name: None,
            bases: Vec::new(),
            shape,
            facets: BTreeMap::new(),
            display_name: None,
            description: None,
            default: None,
            example: None,
            examples: BTreeMap::new(),
            annotations: Vec::new(),
        }
    }

    pub fn scalar(scalar: ScalarKind) -> Self {
        Self::of(TypeShape::Scalar { scalar })
    }

    pub fn object(&self) -> Option<&ObjectShape> {
        match &self.shape {
            TypeShape::Object(o) => Some(o),
            _ => None,
        }
    }
}
