use anyhow::Result;
use serde::Serialize;

use ramlift_core::loader::LoadedDocument;
use ramlift_core::pipeline::compile::CompileStats;
use ramlift_core::pipeline::PipelineDiagnostic;

use crate::args::SourceArgs;
use crate::config::CliConfig;
use crate::output;

#[derive(Debug, Serialize)]
pub struct CheckOut<'a> {
    pub ok: bool,
    pub title: Option<&'a str>,
    pub stats: &'a CompileStats,
    pub documents: &'a [LoadedDocument],
    pub diagnostics: Vec<&'a PipelineDiagnostic>,
}

pub fn run(args: &SourceArgs, cfg: &CliConfig) -> Result<()> {
    let core = super::core_config(args, cfg);
    let report = super::run_compile(args, core, cfg)?;
    let title = report.document.pointer("/info/title").and_then(|v| v.as_str());

    if output::is_json() {
        return output::print(&CheckOut {
            ok: true,
            title,
            stats: &report.stats,
            documents: &report.documents,
            diagnostics: report.warnings().collect(),
        });
    }

    output::print_diagnostics(&report.diagnostics)?;
    let s = &report.stats;
    println!(
        "ok: {} ({} documents, {} resources, {} methods, {} types, {} warnings)",
        title.unwrap_or("untitled"),
        s.documents,
        s.resources,
        s.methods,
        s.types,
        s.warnings
    );
    Ok(())
}
