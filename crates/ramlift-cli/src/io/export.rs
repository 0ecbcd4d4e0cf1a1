use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use ramlift_core::config::OutputFormat;

use crate::error::CliError;

/// Pick the output format: explicit flag, then output extension, then the configured default.
pub fn choose_format(explicit: Option<&str>, out: Option<&Path>, configured: OutputFormat) -> Result<OutputFormat> {
    if let Some(name) = explicit {
        return OutputFormat::parse(name).map_err(|_| CliError::UnknownFormat(name.to_string()).into());
    }
    let by_extension = out
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .and_then(|e| OutputFormat::parse(e).ok());
    Ok(by_extension.unwrap_or(configured))
}

/// Write rendered output to `out`, or stdout when `out` is `None`.
pub fn write_output(out: Option<&Path>, text: &str) -> Result<()> {
    match out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
            }
            fs::write(path, with_newline(text)).with_context(|| format!("writing {}", path.display()))
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(with_newline(text).as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn with_newline(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{text}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_resolution_order() {
        let yaml = Path::new("out/api.yaml");
        assert_eq!(choose_format(None, Some(yaml), OutputFormat::Json).unwrap(), OutputFormat::Yaml);
        assert_eq!(choose_format(Some("json"), Some(yaml), OutputFormat::Yaml).unwrap(), OutputFormat::Json);
        assert_eq!(
            choose_format(None, Some(Path::new("api.txt")), OutputFormat::Yaml).unwrap(),
            OutputFormat::Yaml
        );
        assert!(choose_format(Some("xml"), None, OutputFormat::Json).is_err());
    }

    #[test]
    fn write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.json");
        write_output(Some(&path), "{}").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "{}\n");
    }
}
