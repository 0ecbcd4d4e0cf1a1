//! Dialect header helpers.
//!
//! Every RAML document may start with a header line of the form
//! `#%RAML 1.0 <Kind>`. The header decides how the loader treats the document:
//! root APIs, libraries and overlays/extensions are loaded differently, while
//! typed fragments (`DataType`, `Trait`, ...) are plain include targets.
//!
//! Parsing is strict: a header naming an unknown version or kind is rejected.

use serde::Serialize;

use crate::errors::{RamliftError, RamliftResult};

/// Supported dialect version.
pub const RAML_VERSION: &str = "1.0";

const HEADER_PREFIX: &str = "#%RAML";

/// Kind of a source document, as declared by its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DocumentKind {
    Api,
    Library,
    Overlay,
    Extension,
    DataType,
    Trait,
    ResourceType,
    DocumentationItem,
    NamedExample,
    AnnotationTypeDeclaration,
    SecurityScheme,
    /// Included document without a header (plain YAML or raw text).
    Fragment,
}

impl DocumentKind {
    /// Parse the kind token following the version (empty means `Api`).
    pub fn parse(s: &str) -> RamliftResult<Self> {
        match s.trim() {
            "" => Ok(Self::Api),
            "Library" => Ok(Self::Library),
            "Overlay" => Ok(Self::Overlay),
            "Extension" => Ok(Self::Extension),
            "DataType" => Ok(Self::DataType),
            "Trait" => Ok(Self::Trait),
            "ResourceType" => Ok(Self::ResourceType),
            "DocumentationItem" => Ok(Self::DocumentationItem),
            "NamedExample" => Ok(Self::NamedExample),
            "AnnotationTypeDeclaration" => Ok(Self::AnnotationTypeDeclaration),
            "SecurityScheme" => Ok(Self::SecurityScheme),
            other => Err(RamliftError::invalid_argument(format!(
                "unsupported document kind: {other}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "Api",
            Self::Library => "Library",
            Self::Overlay => "Overlay",
            Self::Extension => "Extension",
            Self::DataType => "DataType",
            Self::Trait => "Trait",
            Self::ResourceType => "ResourceType",
            Self::DocumentationItem => "DocumentationItem",
            Self::NamedExample => "NamedExample",
            Self::AnnotationTypeDeclaration => "AnnotationTypeDeclaration",
            Self::SecurityScheme => "SecurityScheme",
            Self::Fragment => "Fragment",
        }
    }

    /// Overlays and extensions carry an `extends` reference to their master.
    pub fn is_extension_like(&self) -> bool {
        matches!(self, Self::Overlay | Self::Extension)
    }

    /// Kinds that may be the root of a compilation.
    pub fn is_root_kind(&self) -> bool {
        matches!(self, Self::Api | Self::Overlay | Self::Extension)
    }
}

/// Read the dialect header from the first line of `text`.
///
/// Returns `Ok(None)` if the text carries no `#%` header at all.
pub fn parse_header(text: &str) -> RamliftResult<Option<DocumentKind>> {
    let first = text
        .trim_start_matches('\u{FEFF}')
        .lines()
        .next()
        .unwrap_or("")
        .trim_end();

    if !first.starts_with("#%") {
        return Ok(None);
    }

    let rest = first.strip_prefix(HEADER_PREFIX).ok_or_else(|| {
        RamliftError::invalid_argument(format!("unsupported dialect header: {first}"))
    })?;

    let mut parts = rest.trim().splitn(2, char::is_whitespace);
    let version = parts.next().unwrap_or("");
    if version != RAML_VERSION {
        return Err(RamliftError::invalid_argument(format!(
            "unsupported RAML version: expected {RAML_VERSION}, got {}",
            if version.is_empty() { "<none>" } else { version }
        )));
    }

    DocumentKind::parse(parts.next().unwrap_or("")).map(Some)
}
