use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::de::DeserializeOwned;

use ramlift_core::path::DocumentRef;
use ramlift_core::source::DocumentSource;

use crate::error::CliError;

/// Filesystem document source. Relative locations resolve against `base`.
#[derive(Debug, Clone)]
pub struct FsSource {
    base: PathBuf,
}

impl FsSource {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Source rooted at the current directory.
    pub fn cwd() -> Self {
        Self::new(".")
    }

    fn resolve(&self, location: &DocumentRef) -> PathBuf {
        let path = Path::new(location.as_str());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base.join(path)
        }
    }
}

impl DocumentSource for FsSource {
    fn fetch(&self, location: &DocumentRef) -> Result<String> {
        if location.as_str().contains("://") {
            return Err(CliError::Remote(location.to_string()).into());
        }
        Ok(read_text(&self.resolve(location))?)
    }
}

/// Location string handed to the compiler for a command-line path.
pub fn location_of(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn read_text(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.display().to_string(),
        source,
    })
}

/// Deserialize a JSON file, or YAML when the extension is `.yaml`/`.yml`.
pub fn read_structured_file<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, CliError> {
    let path = path.as_ref();
    let raw = read_text(path)?;
    let yaml = matches!(path.extension().and_then(|e| e.to_str()), Some("yaml" | "yml"));
    let parse_err = |format: &'static str, message: String| CliError::Parse {
        format,
        path: path.display().to_string(),
        message,
    };
    if yaml {
        serde_yaml::from_str(&raw).map_err(|e| parse_err("yaml", e.to_string()))
    } else {
        serde_json::from_str(&raw).map_err(|e| parse_err("json", e.to_string()))
    }
}
