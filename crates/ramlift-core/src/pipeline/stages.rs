//! Built-in pipeline stages.
//!
//! One stage per compilation phase. Every stage checks that it received the
//! data shape it expects and fails with `InvalidArgument` otherwise.

use tracing::{debug, info};

use crate::builder::{build_document, BuilderRegistry};
use crate::errors::{RamliftError, RamliftResult};
use crate::host::PluginHost;
use crate::loader::load_graph;
use crate::merge::apply_overlays;
use crate::model::lower::lower;
use crate::path::DocumentRef;
use crate::pipeline::{PipelineContext, PipelineData, Stage};
use crate::source::DocumentSource;
use crate::template::resolve_templates;

fn unexpected(stage: &str, expected: &str, got: &PipelineData) -> RamliftError {
    RamliftError::invalid_argument(format!(
        "stage {stage} expected {expected}, got {}",
        got.label()
    ))
}

/// Stage: fetch the root document, its includes, libraries and overlays.
pub struct LoadStage<'s, S: DocumentSource + ?Sized> {
    source: &'s S,
    root: DocumentRef,
    overlays: Vec<DocumentRef>,
}

impl<'s, S: DocumentSource + ?Sized> LoadStage<'s, S> {
    pub fn new(source: &'s S, root: DocumentRef, overlays: Vec<DocumentRef>) -> Self {
        Self { source, root, overlays }
    }
}

impl<'s, S: DocumentSource + ?Sized> Stage for LoadStage<'s, S> {
    fn id(&self) -> &str {
        "load"
    }

    fn run(&self, ctx: &mut PipelineContext, _input: PipelineData) -> RamliftResult<PipelineData> {
        let graph = load_graph(self.source, &ctx.config.limits, &self.root, &self.overlays)?;
        for doc in &graph.documents {
            debug!(location = %doc.location, kind = doc.kind.as_str(), digest = %doc.digest, "loaded document");
        }
        ctx.set_counter("documents", graph.documents.len());
        ctx.set_counter("libraries", graph.libraries.len());
        ctx.documents = graph.documents.clone();
        Ok(PipelineData::Graph(graph))
    }
}

/// Stage: merge overlays and extensions onto the master tree.
pub struct MergeOverlaysStage;

impl Stage for MergeOverlaysStage {
    fn id(&self) -> &str {
        "overlay.merge"
    }

    fn run(&self, ctx: &mut PipelineContext, input: PipelineData) -> RamliftResult<PipelineData> {
        let mut graph = match input {
            PipelineData::Graph(v) => v,
            other => return Err(unexpected(self.id(), "a document graph", &other)),
        };
        let applied = apply_overlays(&mut graph)?;
        if applied > 0 {
            ctx.push_info("overlay.applied", format!("merged {applied} overlay document(s)"));
        }
        ctx.set_counter("overlays", applied);
        Ok(PipelineData::Graph(graph))
    }
}

/// Stage: expand resource types and traits.
pub struct ResolveTemplatesStage;

impl Stage for ResolveTemplatesStage {
    fn id(&self) -> &str {
        "template.resolve"
    }

    fn run(&self, ctx: &mut PipelineContext, input: PipelineData) -> RamliftResult<PipelineData> {
        let graph = match input {
            PipelineData::Graph(v) => v,
            other => return Err(unexpected(self.id(), "a document graph", &other)),
        };
        let expanded = resolve_templates(graph, &ctx.config)?;
        ctx.set_counter("expansions", expanded.expansions);
        Ok(PipelineData::Expanded(expanded))
    }
}

/// Stage: resolve types and lower the expanded tree into the API model.
pub struct ResolveTypesStage;

impl Stage for ResolveTypesStage {
    fn id(&self) -> &str {
        "type.resolve"
    }

    fn run(&self, ctx: &mut PipelineContext, input: PipelineData) -> RamliftResult<PipelineData> {
        let expanded = match input {
            PipelineData::Expanded(v) => v,
            other => return Err(unexpected(self.id(), "an expanded document", &other)),
        };
        let api = lower(&expanded, &ctx.config)?;
        ctx.set_counter("resources", api.all_resources().len());
        ctx.set_counter("methods", api.method_count());
        ctx.set_counter("types", api.types.len());
        Ok(PipelineData::Api(Box::new(api)))
    }
}

/// Stage: run the builder registry (and plugin hooks) over the model.
pub struct BuildStage<'h> {
    registry: BuilderRegistry,
    host: &'h PluginHost,
}

impl<'h> BuildStage<'h> {
    pub fn new(registry: BuilderRegistry, host: &'h PluginHost) -> Self {
        Self { registry, host }
    }
}

impl<'h> Stage for BuildStage<'h> {
    fn id(&self) -> &str {
        "build"
    }

    fn run(&self, ctx: &mut PipelineContext, input: PipelineData) -> RamliftResult<PipelineData> {
        let api = match input {
            PipelineData::Api(v) => v,
            other => return Err(unexpected(self.id(), "an api model", &other)),
        };
        let config = ctx.config.build.clone();
        let document = build_document(&api, &self.registry, self.host, &config, &mut ctx.diagnostics)?;
        info!(
            paths = document.get("paths").and_then(|p| p.as_object()).map(|p| p.len()).unwrap_or(0),
            hooks = self.host.len(),
            "built target document"
        );
        Ok(PipelineData::Document(document))
    }
}

/// Stage: check the emitted document is well-formed OpenAPI.
pub struct VerifyOutputStage;

impl Stage for VerifyOutputStage {
    fn id(&self) -> &str {
        "verify.output"
    }

    fn run(&self, _ctx: &mut PipelineContext, input: PipelineData) -> RamliftResult<PipelineData> {
        let document = match input {
            PipelineData::Document(v) => v,
            other => return Err(unexpected(self.id(), "a target document", &other)),
        };
        crate::pipeline::verify::verify_document(&document)?;
        Ok(PipelineData::Document(document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::errors::ErrorKind;
    use crate::pipeline::Pipeline;
    use crate::source::MemorySource;

    #[test]
    fn stages_reject_wrong_input() {
        let mut ctx = PipelineContext::new(CoreConfig::default());
        let err = ResolveTypesStage.run(&mut ctx, PipelineData::None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("type.resolve"));
    }

    #[test]
    fn load_through_types_records_counters() {
        let src = MemorySource::new().with(
            "api.raml",
            "#%RAML 1.0\ntitle: T\ntypes:\n  A: string\n/a:\n  get:\n  /b:\n    post:\n",
        );
        let mut p = Pipeline::new();
        p.push_stage(LoadStage::new(&src, DocumentRef::new("api.raml"), Vec::new()))
            .push_stage(MergeOverlaysStage)
            .push_stage(ResolveTemplatesStage)
            .push_stage(ResolveTypesStage);
        let report = p.run(PipelineContext::new(CoreConfig::default()), PipelineData::None).unwrap();
        assert_eq!(report.counters["documents"], 1);
        assert_eq!(report.counters["resources"], 2);
        assert_eq!(report.counters["methods"], 2);
        assert_eq!(report.counters["types"], 1);
        assert!(matches!(report.output, PipelineData::Api(_)));
    }
}
