//! Source text normalization.
//!
//! Applied to every fetched document before header detection and YAML parsing,
//! so that documents authored on different platforms load identically.

use crate::errors::{RamliftError, RamliftResult};

/// Normalize document text deterministically.
///
/// Rules:
/// - remove UTF-8 BOM if present
/// - convert CRLF and CR to LF
///
/// Trailing whitespace is preserved; block scalars may depend on it.
pub fn normalize_text(input: &str) -> String {
    let s = input.strip_prefix('\u{FEFF}').unwrap_or(input);
    if !s.contains('\r') {
        return s.to_string();
    }
    s.replace("\r\n", "\n").replace('\r', "\n")
}

/// Normalize text and enforce a maximum byte size on the raw input.
pub fn normalize_text_with_limit(input: &str, max_bytes: usize) -> RamliftResult<String> {
    if input.len() > max_bytes {
        return Err(RamliftError::invalid_argument(format!(
            "document exceeds maximum size of {max_bytes} bytes"
        )));
    }
    Ok(normalize_text(input))
}
