//! Determinism helpers.
//!
//! Compilation output must be a pure function of the loaded documents and the
//! configuration. These helpers normalize source text before parsing, render
//! JSON in one canonical form, and compute the digests recorded in reports.

pub mod canonical_json;
pub mod hashing;
pub mod normalize_text;
