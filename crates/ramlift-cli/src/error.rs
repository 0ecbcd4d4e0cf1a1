use std::io;

use thiserror::Error;

/// Failures of the command-line layer itself (files, config, flags).
#[derive(Debug, Error)]
pub enum CliError {
    #[error("reading {path}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid {format} in {path}: {message}")]
    Parse {
        format: &'static str,
        path: String,
        message: String,
    },

    #[error("remote documents are not supported: {0}")]
    Remote(String),

    #[error("unknown output format `{0}` (expected json or yaml)")]
    UnknownFormat(String),
}

impl CliError {
    /// Stable kind reported in JSON mode.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Read { .. } => "ReadError",
            Self::Parse { .. } => "ConfigError",
            Self::Remote(_) => "UnsupportedSourceError",
            Self::UnknownFormat(_) => "UsageError",
        }
    }
}
