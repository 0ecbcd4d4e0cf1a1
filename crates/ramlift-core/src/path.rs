//! Location types used throughout the pipeline.
//!
//! Two kinds of "paths" exist in ramlift:
//! - `DocumentRef`: the canonical location of a source document (file path or URL).
//!   Relative references (`!include`, `uses`, `extends`) are resolved against the
//!   location of the document that contains them.
//! - `NodePath`: the position of a node inside the document tree, rendered as a
//!   JSON pointer (`#/~1users/get/responses/200`). Every error and diagnostic
//!   carries one.

use std::fmt;
use std::path::PathBuf;

use path_clean::PathClean;
use serde::{Serialize, Serializer};

/// Canonical document location.
///
/// Normalization rules:
/// - `\` separators become `/`
/// - `.` and `..` segments are folded (`a/./b/../c` -> `a/c`)
/// - URLs (`scheme://authority/path`) keep their authority; only the path is folded
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentRef(String);

impl DocumentRef {
    pub fn new(location: impl AsRef<str>) -> Self {
        Self(normalize_location(location.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve `reference` relative to this document.
    pub fn resolve(&self, reference: &str) -> DocumentRef {
        let reference = reference.trim();
        if is_absolute(reference) {
            return DocumentRef::new(reference);
        }
        let base = match self.0.rfind('/') {
            Some(idx) => &self.0[..=idx],
            None => "",
        };
        DocumentRef::new(format!("{base}{reference}"))
    }

    /// Lowercased file extension, if any.
    pub fn extension(&self) -> Option<String> {
        let file = self.0.rsplit('/').next().unwrap_or(&self.0);
        let (_, ext) = file.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_ascii_lowercase())
        }
    }

    /// True if the referenced document is parsed as a YAML tree when included.
    pub fn is_structured(&self) -> bool {
        matches!(self.extension().as_deref(), Some("raml" | "yaml" | "yml"))
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for DocumentRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

fn is_absolute(reference: &str) -> bool {
    reference.starts_with('/') || reference.contains("://")
}

fn normalize_location(raw: &str) -> String {
    let raw = raw.trim().replace('\\', "/");
    if let Some((scheme, rest)) = raw.split_once("://") {
        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };
        return format!("{scheme}://{authority}{}", clean_path(path));
    }
    clean_path(&raw)
}

fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    PathBuf::from(path)
        .clean()
        .to_string_lossy()
        .replace('\\', "/")
}

/// Position of a node in the document tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodePath(Vec<String>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Return a new path with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut next = self.0.clone();
        next.push(segment.into());
        Self(next)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(|s| s.as_str())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("#")?;
        for seg in &self.0 {
            f.write_str("/")?;
            f.write_str(&seg.replace('~', "~0").replace('/', "~1"))?;
        }
        Ok(())
    }
}

impl Serialize for NodePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_includes() {
        let root = DocumentRef::new("specs/api.raml");
        assert_eq!(root.resolve("types/user.raml").as_str(), "specs/types/user.raml");
        assert_eq!(root.resolve("../shared/lib.raml").as_str(), "shared/lib.raml");
        assert_eq!(root.resolve("/abs/x.raml").as_str(), "/abs/x.raml");
    }

    #[test]
    fn url_authority_survives_cleaning() {
        let root = DocumentRef::new("https://example.com/raml/api.raml");
        assert_eq!(
            root.resolve("../libs/common.raml").as_str(),
            "https://example.com/libs/common.raml"
        );
    }

    #[test]
    fn structured_extensions() {
        assert!(DocumentRef::new("a/b.RAML").is_structured());
        assert!(DocumentRef::new("a/b.yml").is_structured());
        assert!(!DocumentRef::new("a/schema.json").is_structured());
        assert!(!DocumentRef::new("README").is_structured());
    }

    #[test]
    fn node_path_renders_as_json_pointer() {
        let p = NodePath::root().child("/users").child("{id}~x").child("get");
        assert_eq!(p.to_string(), "#/~1users/{id}~0x/get");
        assert_eq!(NodePath::root().to_string(), "#");
        assert!(NodePath::root().is_root());
        assert!(!p.is_root());
    }
}
