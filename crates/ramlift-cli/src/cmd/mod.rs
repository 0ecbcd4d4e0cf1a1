use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use ramlift_core::config::CoreConfig;
use ramlift_core::host::PluginHost;
use ramlift_core::pipeline::compile::{compile, CompileReport, CompileRequest};
use ramlift_plugins::builtin::builtin_registry;

use crate::args::{Cli, Command, SourceArgs};
use crate::config::CliConfig;
use crate::io::input::{location_of, FsSource};
use crate::output;

mod check;
mod compile;
mod plugins;

pub fn dispatch(cli: Cli) -> Result<()> {
    let cfg = CliConfig::load(cli.config.as_deref())?;
    match cli.command {
        Command::Compile(args) => compile::run(&args, &cfg),
        Command::Check(args) => check::run(&args, &cfg),
        Command::Plugins => plugins::run(&cfg),
    }
}

/// Spinner on stderr, hidden in JSON mode and when stderr is not a terminal.
fn spinner() -> ProgressBar {
    if output::is_json() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Core config with command-line overrides applied.
fn core_config(args: &SourceArgs, cfg: &CliConfig) -> CoreConfig {
    let mut core = cfg.core.clone();
    if args.strict {
        core.build.strict = true;
    }
    core
}

fn plugin_host(args: &SourceArgs, cfg: &CliConfig) -> Result<PluginHost> {
    let ids: &[String] = if args.plugins.is_empty() {
        &cfg.plugins
    } else {
        &args.plugins
    };
    let registry = builtin_registry(&cfg.builtin)?;
    let host = registry.host(ids, &cfg.policy)?;
    debug!(plugins = ?host.names(), "plugin host ready");
    Ok(host)
}

/// Run the compiler on the command-line inputs.
fn run_compile(args: &SourceArgs, core: CoreConfig, cfg: &CliConfig) -> Result<CompileReport> {
    let pb = spinner();

    pb.set_message("loading plugins");
    let host = plugin_host(args, cfg)?;

    let mut request = CompileRequest::new(location_of(&args.input)).config(core);
    for overlay in &args.overlays {
        request = request.overlay(location_of(overlay));
    }

    pb.set_message(format!("compiling {}", args.input.display()));
    let result = compile(&FsSource::cwd(), &request, &host);
    pb.finish_and_clear();
    Ok(result?)
}
