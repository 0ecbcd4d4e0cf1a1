use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "ramlift", version, about = "Compile RAML 1.0 APIs to OpenAPI 3.0")]
pub struct Cli {
    /// Emit JSON output on stdout (and JSON logs on stderr).
    #[arg(long, global = true)]
    pub json: bool,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// JSON config file with `core`, `plugins`, `builtin` and `policy` sections.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compile a RAML document into an OpenAPI document.
    Compile(CompileArgs),

    /// Compile without writing output; report diagnostics and stats.
    Check(SourceArgs),

    /// List available plugins.
    Plugins,
}

/// Inputs shared by `compile` and `check`.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Root RAML document.
    pub input: PathBuf,

    /// Overlay or extension applied after the root (repeatable, in order).
    #[arg(long = "overlay")]
    pub overlays: Vec<PathBuf>,

    /// Fail on constructs OpenAPI 3.0 cannot express instead of warning.
    #[arg(long)]
    pub strict: bool,

    /// Plugin to enable (repeatable, runs in the given order). Overrides the config file.
    #[arg(long = "plugin")]
    pub plugins: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CompileArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output file (default: stdout).
    #[arg(long, short)]
    pub out: Option<PathBuf>,

    /// Output format: json|yaml (default: from the output extension, else config).
    #[arg(long)]
    pub format: Option<String>,
}
