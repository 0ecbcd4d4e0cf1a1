//! Document loader.
//!
//! Reads the root document plus every transitively referenced document and
//! returns a `DocumentGraph` in which all names (types, traits, resource types,
//! library prefixes) are still symbolic.
//!
//! Reference kinds followed:
//! - `!include <location>`: structured targets (`.raml`, `.yaml`, `.yml`) are
//!   parsed and inlined as trees; anything else is inlined as raw text
//! - `uses: {ns: location}`: libraries, loaded once into an arena keyed by
//!   canonical location no matter how many documents import them
//! - `extends: location`: followed when the root is an overlay or extension;
//!   the chain is flattened into an ordered overlay list ending at the master
//!
//! Cycles are detected with explicit visitation stacks (one for includes, one
//! for library imports, one for the `extends` chain) and reported with the full
//! chain of locations.

pub mod yaml;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::LimitsConfig;
use crate::determinism::hashing::digest_bytes;
use crate::determinism::normalize_text::normalize_text_with_limit;
use crate::dialect::{parse_header, DocumentKind};
use crate::errors::{CycleKind, RamliftError, RamliftResult};
use crate::path::{DocumentRef, NodePath};
use crate::source::DocumentSource;

/// Record of one fetched document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedDocument {
    pub location: DocumentRef,
    pub kind: DocumentKind,
    pub digest: String,
    pub bytes: usize,
}

/// A library imported through `uses`.
#[derive(Debug, Clone, PartialEq)]
pub struct Library {
    pub location: DocumentRef,
    /// Library body with `uses` and `usage` removed.
    pub tree: Value,
    /// Namespaces imported by this library.
    pub uses: BTreeMap<String, DocumentRef>,
}

/// An overlay or extension waiting to be merged onto the base document.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayDocument {
    pub location: DocumentRef,
    pub kind: DocumentKind,
    pub tree: Value,
    pub uses: BTreeMap<String, DocumentRef>,
}

/// Output of the loader: the master document plus everything it references.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentGraph {
    /// Location of the master API document.
    pub root_location: DocumentRef,
    /// Master API tree with includes inlined and `uses` removed.
    pub root: Value,
    /// Namespaces imported by the master document (and, after merging, by its overlays).
    pub uses: BTreeMap<String, DocumentRef>,
    pub libraries: BTreeMap<DocumentRef, Library>,
    /// Overlays in application order.
    pub overlays: Vec<OverlayDocument>,
    /// Every fetched document, in load order.
    pub documents: Vec<LoadedDocument>,
}

/// Loader state for a single compilation.
pub struct Loader<'a, S: DocumentSource + ?Sized> {
    source: &'a S,
    limits: &'a LimitsConfig,
    records: BTreeMap<DocumentRef, LoadedDocument>,
    order: Vec<DocumentRef>,
    texts: BTreeMap<DocumentRef, String>,
    libraries: BTreeMap<DocumentRef, Library>,
    include_stack: Vec<DocumentRef>,
    library_stack: Vec<DocumentRef>,
}

impl<'a, S: DocumentSource + ?Sized> Loader<'a, S> {
    pub fn new(source: &'a S, limits: &'a LimitsConfig) -> Self {
        Self {
            source,
            limits,
            records: BTreeMap::new(),
            order: Vec::new(),
            texts: BTreeMap::new(),
            libraries: BTreeMap::new(),
            include_stack: Vec::new(),
            library_stack: Vec::new(),
        }
    }

    /// Load `root` and the caller-supplied `overlays` (applied after any
    /// overlays implied by the root's own `extends` chain).
    pub fn load(mut self, root: &DocumentRef, overlays: &[DocumentRef]) -> RamliftResult<DocumentGraph> {
        let top = NodePath::root();
        let (kind, tree) = self.parse_document(root, &top)?;
        if !kind.is_root_kind() {
            return Err(RamliftError::include(
                root.as_str(),
                format!(
                    "root document must be an Api, Overlay or Extension, found {}",
                    kind.as_str()
                ),
                top,
            ));
        }

        // Walk `extends` from the entry document down to the master API.
        let mut chain = vec![(root.clone(), kind, tree)];
        loop {
            let (location, kind, tree) = match chain.last() {
                Some(last) => last,
                None => return Err(RamliftError::invariant("empty extends chain")),
            };
            if !kind.is_extension_like() {
                break;
            }
            let path = NodePath::root().child("extends");
            let reference = tree
                .get("extends")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    RamliftError::structure(
                        format!("{} document must declare `extends`", kind.as_str()),
                        path.clone(),
                    )
                })?;
            let master = location.resolve(reference);
            if let Some(pos) = chain.iter().position(|(l, _, _)| *l == master) {
                let mut names: Vec<String> =
                    chain[pos..].iter().map(|(l, _, _)| l.to_string()).collect();
                names.push(master.to_string());
                return Err(RamliftError::cycle(CycleKind::Extension, names, path));
            }
            let (master_kind, master_tree) = self.parse_document(&master, &path)?;
            if !master_kind.is_root_kind() {
                return Err(RamliftError::include(
                    master.as_str(),
                    format!("`extends` target must be an Api, Overlay or Extension, found {}", master_kind.as_str()),
                    path,
                ));
            }
            chain.push((master, master_kind, master_tree));
        }

        let (root_location, _, mut root_tree) = match chain.pop() {
            Some(master) => master,
            None => return Err(RamliftError::invariant("empty extends chain")),
        };
        let uses = self.take_uses(&mut root_tree, &root_location, &NodePath::root())?;

        let mut queued = Vec::new();
        for (location, kind, tree) in chain.into_iter().rev() {
            queued.push(self.overlay_document(location, kind, tree)?);
        }
        for location in overlays {
            let (kind, tree) = self.parse_document(location, &NodePath::root())?;
            if !kind.is_extension_like() {
                return Err(RamliftError::include(
                    location.as_str(),
                    format!("expected an Overlay or Extension document, found {}", kind.as_str()),
                    NodePath::root(),
                ));
            }
            queued.push(self.overlay_document(location.clone(), kind, tree)?);
        }

        let documents = self
            .order
            .iter()
            .filter_map(|l| self.records.get(l).cloned())
            .collect();

        Ok(DocumentGraph {
            root_location,
            root: root_tree,
            uses,
            libraries: self.libraries,
            overlays: queued,
            documents,
        })
    }

    fn overlay_document(
        &mut self,
        location: DocumentRef,
        kind: DocumentKind,
        mut tree: Value,
    ) -> RamliftResult<OverlayDocument> {
        let uses = self.take_uses(&mut tree, &location, &NodePath::root())?;
        Ok(OverlayDocument {
            location,
            kind,
            tree,
            uses,
        })
    }

    /// Fetch, normalize and record a document's text.
    fn fetch_text(&mut self, location: &DocumentRef, path: &NodePath) -> RamliftResult<String> {
        if let Some(text) = self.texts.get(location) {
            return Ok(text.clone());
        }
        if self.records.len() >= self.limits.max_documents {
            return Err(RamliftError::include(
                location.as_str(),
                format!("document count exceeds limit of {}", self.limits.max_documents),
                path.clone(),
            ));
        }

        let raw = self
            .source
            .fetch(location)
            .map_err(|e| RamliftError::include(location.as_str(), format!("{e:#}"), path.clone()))?;
        let text = normalize_text_with_limit(&raw, self.limits.max_document_bytes)
            .map_err(|e| RamliftError::include(location.as_str(), e.to_string(), path.clone()))?;

        let record = LoadedDocument {
            location: location.clone(),
            kind: DocumentKind::Fragment,
            digest: digest_bytes(text.as_bytes()),
            bytes: text.len(),
        };
        debug!(location = %location, bytes = record.bytes, "fetched document");
        self.records.insert(location.clone(), record);
        self.order.push(location.clone());
        self.texts.insert(location.clone(), text.clone());
        Ok(text)
    }

    /// Parse a structured document, inlining its includes.
    fn parse_document(&mut self, location: &DocumentRef, path: &NodePath) -> RamliftResult<(DocumentKind, Value)> {
        let text = self.fetch_text(location, path)?;
        let kind = parse_header(&text)
            .map_err(|e| RamliftError::include(location.as_str(), e.to_string(), path.clone()))?
            .unwrap_or(DocumentKind::Fragment);
        if let Some(record) = self.records.get_mut(location) {
            record.kind = kind;
        }

        let parsed = yaml::parse_yaml(&text).map_err(|e| {
            RamliftError::include(location.as_str(), format!("invalid YAML: {e}"), path.clone())
        })?;

        self.include_stack.push(location.clone());
        let base = location.clone();
        let tree = yaml::to_tree(parsed, path, &mut |reference, at| self.include(&base, reference, at));
        self.include_stack.pop();

        Ok((kind, tree?))
    }

    fn include(&mut self, from: &DocumentRef, reference: &str, path: &NodePath) -> RamliftResult<Value> {
        let target = from.resolve(reference);

        if let Some(pos) = self.include_stack.iter().position(|l| *l == target) {
            let mut chain: Vec<String> = self.include_stack[pos..].iter().map(|l| l.to_string()).collect();
            chain.push(target.to_string());
            return Err(RamliftError::cycle(CycleKind::Include, chain, path.clone()));
        }
        // The stack holds the including documents, so its length is the
        // nesting level `target` would sit at.
        if self.include_stack.len() > self.limits.max_include_depth {
            return Err(RamliftError::include(
                target.as_str(),
                format!("include depth exceeds limit of {}", self.limits.max_include_depth),
                path.clone(),
            ));
        }

        if !target.is_structured() {
            return self.fetch_text(&target, path).map(Value::String);
        }
        let (_, tree) = self.parse_document(&target, path)?;
        if tree.get("uses").is_some() {
            return Err(RamliftError::structure(
                format!("`uses` is not supported inside included fragment `{target}`"),
                path.child("uses"),
            ));
        }
        Ok(tree)
    }

    /// Remove `uses` from a document tree and load every library it names.
    fn take_uses(
        &mut self,
        tree: &mut Value,
        from: &DocumentRef,
        path: &NodePath,
    ) -> RamliftResult<BTreeMap<String, DocumentRef>> {
        let mut out = BTreeMap::new();
        let Some(obj) = tree.as_object_mut() else {
            return Ok(out);
        };
        let Some(uses) = obj.remove("uses") else {
            return Ok(out);
        };
        let uses_path = path.child("uses");
        let entries = match uses {
            Value::Null => return Ok(out),
            Value::Object(map) => map,
            _ => {
                return Err(RamliftError::structure(
                    "`uses` must map namespaces to library locations",
                    uses_path,
                ))
            }
        };

        for (ns, location) in entries {
            let at = uses_path.child(ns.clone());
            let location = location
                .as_str()
                .ok_or_else(|| RamliftError::structure("library location must be a string", at.clone()))?;
            let target = from.resolve(location);
            self.load_library(&target, &at)?;
            out.insert(ns, target);
        }
        Ok(out)
    }

    fn load_library(&mut self, location: &DocumentRef, path: &NodePath) -> RamliftResult<()> {
        if let Some(pos) = self.library_stack.iter().position(|l| l == location) {
            let mut chain: Vec<String> = self.library_stack[pos..].iter().map(|l| l.to_string()).collect();
            chain.push(location.to_string());
            return Err(RamliftError::cycle(CycleKind::Library, chain, path.clone()));
        }
        if self.libraries.contains_key(location) {
            return Ok(());
        }

        self.library_stack.push(location.clone());
        let (kind, mut tree) = self.parse_document(location, path)?;
        if kind != DocumentKind::Library {
            return Err(RamliftError::include(
                location.as_str(),
                format!("expected a Library document, found {}", kind.as_str()),
                path.clone(),
            ));
        }
        if tree.is_null() {
            tree = Value::Object(Default::default());
        }
        let uses = self.take_uses(&mut tree, location, path)?;
        if let Some(obj) = tree.as_object_mut() {
            obj.remove("usage");
        }
        self.library_stack.pop();

        debug!(location = %location, namespaces = uses.len(), "loaded library");
        self.libraries.insert(
            location.clone(),
            Library {
                location: location.clone(),
                tree,
                uses,
            },
        );
        Ok(())
    }
}

/// Convenience wrapper around `Loader`.
pub fn load_graph<S: DocumentSource + ?Sized>(
    source: &S,
    limits: &LimitsConfig,
    root: &DocumentRef,
    overlays: &[DocumentRef],
) -> RamliftResult<DocumentGraph> {
    Loader::new(source, limits).load(root, overlays)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::source::MemorySource;
    use assert_matches::assert_matches;

    fn load(src: &MemorySource, root: &str) -> RamliftResult<DocumentGraph> {
        load_graph(src, &LimitsConfig::default(), &DocumentRef::new(root), &[])
    }

    #[test]
    fn inlines_structured_and_raw_includes() {
        let src = MemorySource::new()
            .with("api/api.raml", "#%RAML 1.0\ntitle: T\ntypes:\n  User: !include types/user.raml\n  Legacy: !include schemas/legacy.json\n")
            .with("api/types/user.raml", "#%RAML 1.0 DataType\ntype: object\n")
            .with("api/schemas/legacy.json", "{\"type\":\"object\"}");
        let g = load(&src, "api/api.raml").unwrap();
        assert_eq!(g.root["types"]["User"]["type"], "object");
        assert_eq!(g.root["types"]["Legacy"], "{\"type\":\"object\"}");
        assert_eq!(g.documents.len(), 3);
        assert_eq!(g.documents[1].kind, DocumentKind::DataType);
        assert!(g.documents[0].digest.starts_with("sha256:"));
    }

    #[test]
    fn include_cycle_reports_chain() {
        let src = MemorySource::new()
            .with("api.raml", "#%RAML 1.0\ntitle: T\ndocumentation: !include a.yaml\n")
            .with("a.yaml", "x: !include b.yaml\n")
            .with("b.yaml", "y: !include a.yaml\n");
        let err = load(&src, "api.raml").unwrap_err();
        assert_matches!(err.kind(), ErrorKind::CircularInheritance);
        assert_eq!(
            err.chain().unwrap(),
            &["a.yaml".to_string(), "b.yaml".to_string(), "a.yaml".to_string()]
        );
    }

    #[test]
    fn library_loaded_once_and_cycles_detected() {
        let src = MemorySource::new()
            .with("api.raml", "#%RAML 1.0\ntitle: T\nuses:\n  a: libs/a.raml\n  b: libs/b.raml\n")
            .with("libs/a.raml", "#%RAML 1.0 Library\nuses:\n  b: b.raml\ntypes:\n  A: string\n")
            .with("libs/b.raml", "#%RAML 1.0 Library\ntypes:\n  B: string\n");
        let g = load(&src, "api.raml").unwrap();
        assert_eq!(g.libraries.len(), 2);
        assert_eq!(g.documents.len(), 3);
        assert_eq!(g.libraries[&DocumentRef::new("libs/a.raml")].uses["b"].as_str(), "libs/b.raml");

        let src = MemorySource::new()
            .with("api.raml", "#%RAML 1.0\ntitle: T\nuses:\n  a: a.raml\n")
            .with("a.raml", "#%RAML 1.0 Library\nuses:\n  b: b.raml\n")
            .with("b.raml", "#%RAML 1.0 Library\nuses:\n  a: a.raml\n");
        let err = load(&src, "api.raml").unwrap_err();
        assert_matches!(err, RamliftError::CircularInheritance { kind: CycleKind::Library, .. });
    }

    #[test]
    fn uses_inside_included_fragment_is_rejected() {
        let src = MemorySource::new()
            .with("api.raml", "#%RAML 1.0\ntitle: T\ntypes:\n  User: !include user.raml\n")
            .with("user.raml", "#%RAML 1.0 DataType\nuses:\n  lib: lib.raml\ntype: object\n");
        let err = load(&src, "api.raml").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structure);
        assert_eq!(err.path().unwrap().to_string(), "#/types/User/uses");
    }

    #[test]
    fn include_depth_limit_counts_nested_includes() {
        let src = MemorySource::new()
            .with("api.raml", "#%RAML 1.0\ntitle: T\ntypes: !include a.raml\n")
            .with("a.raml", "User: !include b.raml\n")
            .with("b.raml", "type: object\n");
        let root = DocumentRef::new("api.raml");
        let limits = |depth| LimitsConfig {
            max_include_depth: depth,
            ..LimitsConfig::default()
        };

        let g = load_graph(&src, &limits(2), &root, &[]).unwrap();
        assert_eq!(g.root["types"]["User"]["type"], "object");

        let err = load_graph(&src, &limits(1), &root, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Include);
        assert_eq!(err.path().unwrap().to_string(), "#/types/User");
    }

    #[test]
    fn missing_document_is_include_error() {
        let src = MemorySource::new().with("api.raml", "#%RAML 1.0\ntitle: T\ntypes: !include nope.raml\n");
        let err = load(&src, "api.raml").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Include);
        assert_eq!(err.path().unwrap().to_string(), "#/types");
    }

    #[test]
    fn extension_root_follows_extends() {
        let src = MemorySource::new()
            .with("api.raml", "#%RAML 1.0\ntitle: Base\n")
            .with("ext1.raml", "#%RAML 1.0 Extension\nextends: api.raml\nversion: v1\n")
            .with("ext2.raml", "#%RAML 1.0 Overlay\nextends: ext1.raml\ndescription: d\n");
        let g = load(&src, "ext2.raml").unwrap();
        assert_eq!(g.root_location.as_str(), "api.raml");
        let order: Vec<&str> = g.overlays.iter().map(|o| o.location.as_str()).collect();
        assert_eq!(order, vec!["ext1.raml", "ext2.raml"]);
    }

    #[test]
    fn library_root_rejected() {
        let src = MemorySource::new().with("lib.raml", "#%RAML 1.0 Library\n");
        let err = load(&src, "lib.raml").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Include);
    }
}
