use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use ramlift_core::pipeline::{DiagnosticLevel, PipelineDiagnostic};

use crate::error::CliError;

static JSON_MODE: AtomicBool = AtomicBool::new(false);

pub fn init(json: bool) {
    JSON_MODE.store(json, Ordering::Relaxed);
}

pub fn is_json() -> bool {
    JSON_MODE.load(Ordering::Relaxed)
}

pub fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    println!("{s}");
    Ok(())
}

pub fn eprintln_line(msg: &str) {
    let _ = writeln!(io::stderr(), "{msg}");
}

pub fn stderr() -> StandardStream {
    StandardStream::stderr(ColorChoice::Auto)
}

fn level_color(level: DiagnosticLevel) -> Color {
    match level {
        DiagnosticLevel::Info => Color::Cyan,
        DiagnosticLevel::Warning => Color::Yellow,
    }
}

/// Human-readable diagnostic lines on stderr. Info diagnostics are skipped.
pub fn print_diagnostics<'a>(diagnostics: impl IntoIterator<Item = &'a PipelineDiagnostic>) -> anyhow::Result<()> {
    let mut err = stderr();
    for d in diagnostics {
        if d.level == DiagnosticLevel::Info {
            continue;
        }
        err.set_color(ColorSpec::new().set_fg(Some(level_color(d.level))).set_bold(true))?;
        write!(err, "{}", d.level.as_str())?;
        err.reset()?;
        write!(err, "[{}]: {}", d.code, d.message)?;
        if let Some(path) = &d.path {
            write!(err, " at {path}")?;
        }
        writeln!(err)?;
    }
    Ok(())
}

/// Print a fatal error: a JSON object on stdout in JSON mode, a red line on stderr otherwise.
pub fn print_error(error: &anyhow::Error) {
    if is_json() {
        let mut value = serde_json::json!({ "ok": false, "error": format!("{error:#}") });
        if let Some(e) = error.downcast_ref::<ramlift_core::RamliftError>() {
            value["kind"] = serde_json::Value::String(e.kind().as_str().to_string());
            if let Some(path) = e.path() {
                value["path"] = serde_json::Value::String(path.to_string());
            }
        } else if let Some(e) = error.downcast_ref::<CliError>() {
            value["kind"] = serde_json::Value::String(e.kind().to_string());
        }
        let _ = print(&value);
        return;
    }
    let mut err = stderr();
    let _ = err.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
    let _ = write!(err, "error");
    let _ = err.reset();
    let _ = writeln!(err, ": {error:#}");
}
