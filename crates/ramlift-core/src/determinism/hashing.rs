//! Deterministic hashing utilities.
//!
//! Digests recorded in compile reports:
//! - per loaded document: sha256 of the normalized source text
//! - per output: sha256 of the canonical JSON bytes of the emitted document
//!
//! All digests are lowercase hex and prefixed with the algorithm
//! (`sha256:<hex>`), so a future algorithm change stays distinguishable.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::determinism::canonical_json;
use crate::errors::RamliftResult;

/// Hash algorithm identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlg {
    Sha256,
}

impl HashAlg {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlg::Sha256 => "sha256",
        }
    }
}

/// Hash raw bytes using the selected algorithm.
pub fn hash_bytes(alg: HashAlg, bytes: &[u8]) -> Vec<u8> {
    match alg {
        HashAlg::Sha256 => {
            let mut h = Sha256::new();
            h.update(bytes);
            h.finalize().to_vec()
        }
    }
}

/// Prefixed hex digest of raw bytes.
pub fn digest_bytes(bytes: &[u8]) -> String {
    let alg = HashAlg::Sha256;
    format!("{}:{}", alg.as_str(), hex::encode(hash_bytes(alg, bytes)))
}

/// Prefixed hex digest of a JSON value in canonical form.
pub fn digest_json(value: &Value) -> RamliftResult<String> {
    let bytes = canonical_json::to_canonical_bytes(value)?;
    Ok(digest_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn digest_is_stable_and_prefixed() {
        let a = digest_bytes(b"abc");
        assert_eq!(a, digest_bytes(b"abc"));
        assert_eq!(
            a,
            "sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn json_digest_ignores_insertion_order() {
        let a = digest_json(&json!({"x": 1, "y": 2})).unwrap();
        let b = digest_json(&json!({"y": 2, "x": 1})).unwrap();
        assert_eq!(a, b);
    }
}
