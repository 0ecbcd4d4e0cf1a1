//! Library namespaces and qualified-name lookup.
//!
//! Declarations are addressed by canonical names: unqualified for the master
//! document (`User`) and prefixed with the namespace path under which the
//! library was first reached for library declarations (`common.User`,
//! `common.geo.Point`). References are always resolved relative to the scope
//! that declares them: `Name` looks in the current document, `ns.Name` follows
//! the current document's `uses` table.

use std::collections::{BTreeMap, VecDeque};

use crate::loader::DocumentGraph;
use crate::path::DocumentRef;

/// Declaring document of a declaration or reference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    Root,
    Library(DocumentRef),
}

/// Namespace table for a document graph.
#[derive(Debug, Clone, Default)]
pub struct Namespaces {
    root_uses: BTreeMap<String, DocumentRef>,
    library_uses: BTreeMap<DocumentRef, BTreeMap<String, DocumentRef>>,
    prefixes: BTreeMap<DocumentRef, String>,
}

impl Namespaces {
    /// Assign each library its canonical prefix (breadth-first from the root,
    /// namespaces visited in sorted order).
    pub fn build(graph: &DocumentGraph) -> Self {
        let library_uses: BTreeMap<DocumentRef, BTreeMap<String, DocumentRef>> = graph
            .libraries
            .iter()
            .map(|(loc, lib)| (loc.clone(), lib.uses.clone()))
            .collect();

        let mut prefixes = BTreeMap::new();
        let mut queue: VecDeque<(String, DocumentRef)> = graph
            .uses
            .iter()
            .map(|(ns, loc)| (ns.clone(), loc.clone()))
            .collect();

        while let Some((prefix, location)) = queue.pop_front() {
            if prefixes.contains_key(&location) {
                continue;
            }
            if let Some(uses) = library_uses.get(&location) {
                for (ns, loc) in uses {
                    queue.push_back((format!("{prefix}.{ns}"), loc.clone()));
                }
            }
            prefixes.insert(location, prefix);
        }

        Self {
            root_uses: graph.uses.clone(),
            library_uses,
            prefixes,
        }
    }

    /// Canonical prefix of a library, `None` for the root scope.
    pub fn prefix(&self, scope: &Scope) -> Option<&str> {
        match scope {
            Scope::Root => None,
            Scope::Library(loc) => self.prefixes.get(loc).map(|s| s.as_str()),
        }
    }

    /// Canonical name of `name` declared in `scope`.
    pub fn canonical(&self, scope: &Scope, name: &str) -> String {
        match self.prefix(scope) {
            Some(prefix) => format!("{prefix}.{name}"),
            None => name.to_string(),
        }
    }

    fn uses_of(&self, scope: &Scope) -> Option<&BTreeMap<String, DocumentRef>> {
        match scope {
            Scope::Root => Some(&self.root_uses),
            Scope::Library(loc) => self.library_uses.get(loc),
        }
    }

    /// Resolve a possibly qualified reference made from `scope` into the
    /// declaring scope and the bare declaration name.
    ///
    /// Returns `None` if a namespace segment is unknown.
    pub fn locate(&self, scope: &Scope, reference: &str) -> Option<(Scope, String)> {
        let mut segments: Vec<&str> = reference.split('.').collect();
        let name = segments.pop()?.to_string();
        let mut current = scope.clone();
        for ns in segments {
            let target = self.uses_of(&current)?.get(ns)?;
            current = Scope::Library(target.clone());
        }
        Some((current, name))
    }

    /// Resolve a reference to a canonical name.
    pub fn resolve(&self, scope: &Scope, reference: &str) -> Option<String> {
        let (target, name) = self.locate(scope, reference)?;
        Some(self.canonical(&target, &name))
    }

    /// `(prefix, location)` for every reachable library, in prefix order.
    pub fn libraries(&self) -> Vec<(String, DocumentRef)> {
        let mut out: Vec<(String, DocumentRef)> =
            self.prefixes.iter().map(|(l, p)| (p.clone(), l.clone())).collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimitsConfig;
    use crate::loader::load_graph;
    use crate::source::MemorySource;

    #[test]
    fn nested_library_prefixes() {
        let src = MemorySource::new()
            .with("api.raml", "#%RAML 1.0\ntitle: T\nuses:\n  common: common.raml\n")
            .with("common.raml", "#%RAML 1.0 Library\nuses:\n  geo: geo.raml\n")
            .with("geo.raml", "#%RAML 1.0 Library\ntypes:\n  Point: object\n");
        let g = load_graph(&src, &LimitsConfig::default(), &DocumentRef::new("api.raml"), &[]).unwrap();
        let ns = Namespaces::build(&g);

        assert_eq!(ns.resolve(&Scope::Root, "common.geo.Point").as_deref(), Some("common.geo.Point"));
        let common = Scope::Library(DocumentRef::new("common.raml"));
        assert_eq!(ns.resolve(&common, "geo.Point").as_deref(), Some("common.geo.Point"));
        assert_eq!(ns.resolve(&common, "Local").as_deref(), Some("common.Local"));
        assert_eq!(ns.resolve(&Scope::Root, "nope.Point"), None);
        assert_eq!(ns.libraries().len(), 2);
    }
}
