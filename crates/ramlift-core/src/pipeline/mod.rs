//! Compilation pipeline primitives.
//!
//! A compilation is an ordered list of stages, each consuming the previous
//! stage's output:
//! - load the document graph
//! - merge overlays and extensions
//! - expand templates
//! - resolve types and lower the model
//! - build the target document (with plugin hooks)
//! - verify the output
//!
//! This module defines:
//! - `Pipeline` and `Stage`
//! - `PipelineContext` (configuration, counters, diagnostics)
//! - `PipelineReport` (final output plus diagnostics)
//!
//! The core crate does no filesystem or network I/O of its own; documents come
//! in through a `DocumentSource`.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use tracing::info_span;

use crate::config::CoreConfig;
use crate::errors::{RamliftError, RamliftResult};
use crate::loader::{DocumentGraph, LoadedDocument};
use crate::model::Api;
use crate::path::NodePath;
use crate::template::ExpandedDocument;

pub mod compile;
pub mod stages;
pub mod verify;

/// A structured diagnostic emitted by pipeline stages, builders or plugins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineDiagnostic {
    pub level: DiagnosticLevel,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<NodePath>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Info,
    Warning,
}

impl DiagnosticLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
        }
    }
}

impl PipelineDiagnostic {
    pub fn new(level: DiagnosticLevel, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            code: code.into(),
            message: message.into(),
            path: None,
            data: BTreeMap::new(),
        }
    }

    pub fn info(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Info, code, message)
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Warning, code, message)
    }

    pub fn at(mut self, path: NodePath) -> Self {
        self.path = Some(path);
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Pipeline context shared by all stages.
#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
    pub config: CoreConfig,

    /// Named counters recorded by stages (`documents`, `expansions`, ...).
    pub counters: BTreeMap<String, usize>,

    /// Every fetched document, recorded by the load stage.
    pub documents: Vec<LoadedDocument>,

    /// Collected diagnostics, append-only.
    pub diagnostics: Vec<PipelineDiagnostic>,
}

impl PipelineContext {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn push_info(&mut self, code: impl Into<String>, message: impl Into<String>) {
        self.diagnostics.push(PipelineDiagnostic::info(code, message));
    }

    pub fn set_counter(&mut self, k: impl Into<String>, v: usize) {
        self.counters.insert(k.into(), v);
    }

}

/// A stage input/output carrier.
#[derive(Debug, Clone)]
pub enum PipelineData {
    None,
    Graph(DocumentGraph),
    Expanded(ExpandedDocument),
    Api(Box<Api>),
    /// The built target document.
    Document(Value),
}

impl PipelineData {
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Graph(_) => "document graph",
            Self::Expanded(_) => "expanded document",
            Self::Api(_) => "api model",
            Self::Document(_) => "target document",
        }
    }
}

/// A pipeline stage.
pub trait Stage {
    fn id(&self) -> &str;
    fn run(&self, ctx: &mut PipelineContext, input: PipelineData) -> RamliftResult<PipelineData>;
}

/// A pipeline is an ordered list of stages.
#[derive(Default)]
pub struct Pipeline<'a> {
    stages: Vec<Box<dyn Stage + 'a>>,
}

impl<'a> Pipeline<'a> {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn push_stage<S: Stage + 'a>(&mut self, s: S) -> &mut Self {
        self.stages.push(Box::new(s));
        self
    }

    pub fn stages(&self) -> usize {
        self.stages.len()
    }

    /// Run the pipeline and return a structured report.
    pub fn run(&self, mut ctx: PipelineContext, input: PipelineData) -> RamliftResult<PipelineReport> {
        let mut data = input;

        for st in &self.stages {
            let span = info_span!("stage", id = st.id());
            let _guard = span.enter();

            ctx.push_info("pipeline.stage.start", format!("starting stage {}", st.id()));
            data = st.run(&mut ctx, data)?;
            ctx.push_info("pipeline.stage.end", format!("completed stage {}", st.id()));
        }

        Ok(PipelineReport {
            output: data,
            counters: ctx.counters,
            documents: ctx.documents,
            diagnostics: ctx.diagnostics,
        })
    }
}

/// Pipeline run result.
#[derive(Debug)]
pub struct PipelineReport {
    pub output: PipelineData,
    pub counters: BTreeMap<String, usize>,
    pub documents: Vec<LoadedDocument>,
    pub diagnostics: Vec<PipelineDiagnostic>,
}

impl PipelineReport {
    pub fn warnings(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d.level, DiagnosticLevel::Warning))
            .count()
    }

    pub fn require_document(self) -> RamliftResult<Value> {
        match self.output {
            PipelineData::Document(v) => Ok(v),
            other => Err(RamliftError::invalid_argument(format!(
                "expected a target document as pipeline output, got {}",
                other.label()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct PassThroughStage;
    impl Stage for PassThroughStage {
        fn id(&self) -> &str {
            "test.pass"
        }
        fn run(&self, _ctx: &mut PipelineContext, input: PipelineData) -> RamliftResult<PipelineData> {
            Ok(input)
        }
    }

    struct ErrorStage;
    impl Stage for ErrorStage {
        fn id(&self) -> &str {
            "test.error"
        }
        fn run(&self, _ctx: &mut PipelineContext, _input: PipelineData) -> RamliftResult<PipelineData> {
            Err(RamliftError::invariant("stage failed"))
        }
    }

    #[test]
    fn pipeline_runs_stages() {
        let mut p = Pipeline::new();
        p.push_stage(PassThroughStage);

        let report = p
            .run(PipelineContext::default(), PipelineData::Document(json!({"a": 1})))
            .unwrap();
        assert_eq!(report.warnings(), 0);
        assert_eq!(report.require_document().unwrap(), json!({"a": 1}));
    }

    #[test]
    fn pipeline_propagates_error() {
        let mut p = Pipeline::new();
        p.push_stage(ErrorStage);

        let r = p.run(PipelineContext::default(), PipelineData::None);
        assert!(r.is_err());
    }

    #[test]
    fn diagnostics_serialize_with_path() {
        let d = PipelineDiagnostic::warning("build.unsupported", "nope")
            .at(NodePath::root().child("/a"))
            .with("plugin", "p");
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["level"], "warning");
        assert_eq!(v["path"], "#/~1a");
        assert_eq!(v["data"]["plugin"], "p");
    }
}
