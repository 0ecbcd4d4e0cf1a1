//! Document retrieval boundary.
//!
//! The core never touches the filesystem or network. Callers hand the loader a
//! `DocumentSource` that maps a canonical `DocumentRef` to the document's text.
//! `MemorySource` is the in-process implementation used by tests and embedders;
//! the CLI provides a filesystem source.

use std::collections::BTreeMap;

use crate::path::DocumentRef;

/// "Fetch by reference, return text or fail."
pub trait DocumentSource {
    fn fetch(&self, location: &DocumentRef) -> anyhow::Result<String>;
}

impl<S: DocumentSource + ?Sized> DocumentSource for &S {
    fn fetch(&self, location: &DocumentRef) -> anyhow::Result<String> {
        (**self).fetch(location)
    }
}

/// In-memory document store keyed by canonical location.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    docs: BTreeMap<DocumentRef, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, location: impl AsRef<str>, text: impl Into<String>) -> Self {
        self.insert(location, text);
        self
    }

    pub fn insert(&mut self, location: impl AsRef<str>, text: impl Into<String>) {
        self.docs.insert(DocumentRef::new(location), text.into());
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

impl DocumentSource for MemorySource {
    fn fetch(&self, location: &DocumentRef) -> anyhow::Result<String> {
        self.docs
            .get(location)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("document not found: {location}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_normalizes_keys() {
        let src = MemorySource::new().with("./a/../api.raml", "#%RAML 1.0\n");
        assert!(src.fetch(&DocumentRef::new("api.raml")).is_ok());
        assert!(src.fetch(&DocumentRef::new("other.raml")).is_err());
    }
}
