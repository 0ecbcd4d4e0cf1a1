//! High-level compile orchestration.
//!
//! `compile` assembles the standard pipeline (load, overlay merge, template
//! expansion, type resolution, build, verification) and turns its report
//! into a `CompileReport`.
//!
//! Determinism contract:
//! - all maps are ordered (`BTreeMap`, serde_json without `preserve_order`)
//! - no time, environment or randomness is read
//! - equal inputs, configuration and plugins yield byte-identical output

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::builder::BuilderRegistry;
use crate::config::{validate_config, CoreConfig, OutputFormat};
use crate::determinism::canonical_json::to_canonical_pretty;
use crate::determinism::hashing::digest_json;
use crate::errors::{RamliftError, RamliftResult};
use crate::host::PluginHost;
use crate::loader::LoadedDocument;
use crate::path::DocumentRef;
use crate::pipeline::stages::{
    BuildStage, LoadStage, MergeOverlaysStage, ResolveTemplatesStage, ResolveTypesStage, VerifyOutputStage,
};
use crate::pipeline::{DiagnosticLevel, Pipeline, PipelineContext, PipelineData, PipelineDiagnostic};
use crate::source::DocumentSource;

/// Compile request.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub root: DocumentRef,
    /// Overlays and extensions applied after the root's own `extends` chain.
    pub overlays: Vec<DocumentRef>,
    pub config: CoreConfig,
}

impl CompileRequest {
    pub fn new(root: impl AsRef<str>) -> Self {
        Self {
            root: DocumentRef::new(root),
            overlays: Vec::new(),
            config: CoreConfig::default(),
        }
    }

    pub fn overlay(mut self, location: impl AsRef<str>) -> Self {
        self.overlays.push(DocumentRef::new(location));
        self
    }

    pub fn config(mut self, config: CoreConfig) -> Self {
        self.config = config;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileStats {
    pub documents: usize,
    pub libraries: usize,
    pub overlays: usize,
    pub expansions: usize,
    pub resources: usize,
    pub methods: usize,
    pub types: usize,
    pub warnings: usize,
    /// `sha256:<hex>` over the canonical output bytes.
    pub digest: String,
}

/// Compile result.
#[derive(Debug, Clone, Serialize)]
pub struct CompileReport {
    pub document: Value,
    pub diagnostics: Vec<PipelineDiagnostic>,
    pub documents: Vec<LoadedDocument>,
    pub stats: CompileStats,
}

impl CompileReport {
    pub fn warnings(&self) -> impl Iterator<Item = &PipelineDiagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Warning)
    }

    pub fn render(&self, format: OutputFormat) -> RamliftResult<String> {
        render(&self.document, format)
    }
}

/// Compile with the default OpenAPI builders.
pub fn compile<S: DocumentSource + ?Sized>(
    source: &S,
    request: &CompileRequest,
    host: &PluginHost,
) -> RamliftResult<CompileReport> {
    compile_with(source, request, BuilderRegistry::openapi(), host)
}

/// Compile with a caller-supplied builder registry.
pub fn compile_with<S: DocumentSource + ?Sized>(
    source: &S,
    request: &CompileRequest,
    registry: BuilderRegistry,
    host: &PluginHost,
) -> RamliftResult<CompileReport> {
    validate_config(&request.config)?;

    let mut pipeline = Pipeline::new();
    pipeline
        .push_stage(LoadStage::new(source, request.root.clone(), request.overlays.clone()))
        .push_stage(MergeOverlaysStage)
        .push_stage(ResolveTemplatesStage)
        .push_stage(ResolveTypesStage)
        .push_stage(BuildStage::new(registry, host))
        .push_stage(VerifyOutputStage);

    let report = pipeline.run(PipelineContext::new(request.config.clone()), PipelineData::None)?;
    let warnings = report.warnings();
    let counters = report.counters.clone();
    let documents = report.documents.clone();
    let diagnostics = report.diagnostics.clone();
    let document = report.require_document()?;

    let count = |k: &str| counters.get(k).copied().unwrap_or(0);
    let stats = CompileStats {
        documents: count("documents"),
        libraries: count("libraries"),
        overlays: count("overlays"),
        expansions: count("expansions"),
        resources: count("resources"),
        methods: count("methods"),
        types: count("types"),
        warnings,
        digest: digest_json(&document)?,
    };
    info!(
        root = %request.root,
        documents = stats.documents,
        methods = stats.methods,
        warnings = stats.warnings,
        digest = %stats.digest,
        "compiled"
    );

    Ok(CompileReport {
        document,
        diagnostics,
        documents,
        stats,
    })
}

/// Serialize a target document.
pub fn render(document: &Value, format: OutputFormat) -> RamliftResult<String> {
    match format {
        OutputFormat::Json => to_canonical_pretty(document),
        OutputFormat::Yaml => render_yaml(document),
    }
}

#[cfg(feature = "yaml-output")]
fn render_yaml(document: &Value) -> RamliftResult<String> {
    serde_yaml::to_string(document).map_err(|e| RamliftError::serialization(e.to_string()))
}

#[cfg(not(feature = "yaml-output"))]
fn render_yaml(_document: &Value) -> RamliftResult<String> {
    Err(RamliftError::invalid_argument(
        "YAML output requires the `yaml-output` feature",
    ))
}
