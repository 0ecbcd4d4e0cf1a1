use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use ramlift_core::pipeline::compile::CompileStats;
use ramlift_core::pipeline::PipelineDiagnostic;

use crate::args::CompileArgs;
use crate::config::CliConfig;
use crate::io::export;
use crate::output;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOut<'a> {
    pub ok: bool,
    pub format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out: Option<String>,
    /// Inline document when no output file was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<&'a Value>,
    pub stats: &'a CompileStats,
    pub diagnostics: Vec<&'a PipelineDiagnostic>,
}

pub fn run(args: &CompileArgs, cfg: &CliConfig) -> Result<()> {
    let core = super::core_config(&args.source, cfg);
    let format = export::choose_format(args.format.as_deref(), args.out.as_deref(), core.build.output_format)?;
    let report = super::run_compile(&args.source, core, cfg)?;
    let text = report.render(format)?;

    if output::is_json() {
        if let Some(path) = args.out.as_deref() {
            export::write_output(Some(path), &text)?;
        }
        return output::print(&CompileOut {
            ok: true,
            format: format.as_str(),
            out: args.out.as_ref().map(|p| p.display().to_string()),
            document: args.out.is_none().then_some(&report.document),
            stats: &report.stats,
            diagnostics: report.warnings().collect(),
        });
    }

    output::print_diagnostics(&report.diagnostics)?;
    export::write_output(args.out.as_deref(), &text)?;
    if let Some(path) = &args.out {
        output::eprintln_line(&format!(
            "wrote {} ({} paths, {} warnings, {})",
            path.display(),
            report.stats.resources,
            report.stats.warnings,
            report.stats.digest
        ));
    }
    Ok(())
}
