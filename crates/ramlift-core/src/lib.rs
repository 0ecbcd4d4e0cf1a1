//! ramlift-core
//!
//! Compiles RAML 1.0 API descriptions into OpenAPI 3.0 documents:
//! - loader: documents, includes, libraries, overlays (`loader`, `source`)
//! - overlay and extension merging (`merge`)
//! - resource type and trait expansion (`template`)
//! - type resolution and lowering into the API model (`types`, `model`)
//! - builder registry and plugin hooks (`builder`, `host`)
//! - pipeline stages and compile orchestration (`pipeline`)
//!
//! The crate performs no filesystem or network I/O; documents are fetched
//! through a caller-supplied `DocumentSource`.

pub mod builder;
pub mod config;
pub mod determinism;
pub mod dialect;
pub mod errors;
pub mod host;
pub mod loader;
pub mod merge;
pub mod model;
pub mod path;
pub mod pipeline;
pub mod scope;
pub mod source;
pub mod template;
pub mod types;

pub use crate::errors::{ErrorKind, RamliftError, RamliftResult};

/// Target dialect version emitted by default.
pub const OPENAPI_VERSION: &str = "3.0.3";

/// Convenience re-exports.
pub mod prelude {
    pub use crate::builder::{BuildCx, BuilderFn, BuilderRegistry, Children, Fragment};
    pub use crate::config::{BuildConfig, CoreConfig, LimitsConfig, OutputFormat, TemplateConfig, TemplatePrecedence};
    pub use crate::host::{BuildHook, HookAction, HookContext, HookPhase, PluginHost};
    pub use crate::model::{Api, NodeKind, NodeRef};
    pub use crate::path::{DocumentRef, NodePath};
    pub use crate::pipeline::compile::{compile, compile_with, render, CompileReport, CompileRequest, CompileStats};
    pub use crate::pipeline::{DiagnosticLevel, PipelineDiagnostic};
    pub use crate::source::{DocumentSource, MemorySource};
    pub use crate::{ErrorKind, RamliftError, RamliftResult};
}
