//! Plugin host.
//!
//! Hooks observe a set of node kinds and run either before or after the
//! node's builder. Each hook may keep the fragment, extend it with fields,
//! replace it, or veto it (omit the node). Hooks run in registration order, so
//! for the same output field the later hook wins. Hook state lives in the hook
//! value; the host holds no globals.
//!
//! Failure semantics: a hook error aborts the build as `RamliftError::Plugin`.
//! Warnings raised through `HookContext::warn` become diagnostics.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::{RamliftError, RamliftResult};
use crate::model::{Api, NodeKind, NodeRef};
use crate::path::NodePath;
use crate::pipeline::PipelineDiagnostic;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookPhase {
    BeforeBuild,
    #[default]
    AfterBuild,
}

impl HookPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeBuild => "before-build",
            Self::AfterBuild => "after-build",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HookAction {
    Keep,
    /// Insert fields into the fragment (existing fields are overwritten).
    Extend(Map<String, Value>),
    Replace(Value),
    /// Omit the node from the output.
    Veto,
}

impl HookAction {
    fn label(&self) -> &'static str {
        match self {
            Self::Keep => "keep",
            Self::Extend(_) => "extend",
            Self::Replace(_) => "replace",
            Self::Veto => "veto",
        }
    }
}

/// What a hook sees besides the node itself.
pub struct HookContext<'a> {
    pub path: &'a NodePath,
    pub api: &'a Api,
    warnings: Vec<String>,
}

impl<'a> HookContext<'a> {
    pub fn new(path: &'a NodePath, api: &'a Api) -> Self {
        Self {
            path,
            api,
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

pub trait BuildHook: Send + Sync {
    /// Unique name, used in diagnostics and for unregistering.
    fn name(&self) -> &str;

    fn observes(&self) -> &[NodeKind];

    fn phase(&self) -> HookPhase {
        HookPhase::AfterBuild
    }

    /// `fragment` is `None` in the before phase and when an earlier step
    /// omitted the node.
    fn on_node(
        &self,
        node: NodeRef<'_>,
        fragment: Option<&Value>,
        cx: &mut HookContext<'_>,
    ) -> anyhow::Result<HookAction>;
}

/// Outcome of the before-build hooks of one node.
pub(crate) struct BeforeOutcome {
    /// `Some` when a hook replaced (`Some(Some(v))`) or vetoed (`Some(None)`)
    /// the node; the builder is skipped either way.
    pub replaced: Option<Option<Value>>,
    /// Extensions to apply once the fragment exists.
    pub extensions: Vec<(String, Map<String, Value>)>,
}

/// Ordered list of registered hooks.
#[derive(Clone, Default)]
pub struct PluginHost {
    hooks: Vec<Arc<dyn BuildHook>>,
}

impl std::fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHost").field("hooks", &self.names()).finish()
    }
}

impl PluginHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H: BuildHook + 'static>(&mut self, hook: H) -> RamliftResult<()> {
        self.register_shared(Arc::new(hook))
    }

    pub fn register_shared(&mut self, hook: Arc<dyn BuildHook>) -> RamliftResult<()> {
        if self.hooks.iter().any(|h| h.name() == hook.name()) {
            return Err(RamliftError::invalid_argument(format!(
                "hook already registered: {}",
                hook.name()
            )));
        }
        debug!(hook = hook.name(), phase = hook.phase().as_str(), "registered build hook");
        self.hooks.push(hook);
        Ok(())
    }

    /// Remove a hook by name. Returns false if no such hook exists.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|h| h.name() != name);
        self.hooks.len() != before
    }

    pub fn names(&self) -> Vec<&str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    fn hooks_for(&self, kind: NodeKind, phase: HookPhase) -> impl Iterator<Item = &Arc<dyn BuildHook>> + '_ {
        self.hooks
            .iter()
            .filter(move |h| h.phase() == phase && h.observes().contains(&kind))
    }

    fn call(
        hook: &dyn BuildHook,
        node: NodeRef<'_>,
        fragment: Option<&Value>,
        path: &NodePath,
        api: &Api,
        diagnostics: &mut Vec<PipelineDiagnostic>,
    ) -> RamliftResult<HookAction> {
        let mut cx = HookContext::new(path, api);
        let action = hook
            .on_node(node, fragment, &mut cx)
            .map_err(|e| RamliftError::plugin(hook.name(), format!("{e:#}"), path.clone()))?;
        for warning in cx.warnings {
            diagnostics.push(
                PipelineDiagnostic::warning("plugin.warning", warning)
                    .at(path.clone())
                    .with("plugin", hook.name()),
            );
        }
        debug!(hook = hook.name(), kind = %node.kind(), path = %path, action = action.label(), "hook ran");
        Ok(action)
    }

    pub(crate) fn before(
        &self,
        node: NodeRef<'_>,
        path: &NodePath,
        api: &Api,
        diagnostics: &mut Vec<PipelineDiagnostic>,
    ) -> RamliftResult<BeforeOutcome> {
        let mut outcome = BeforeOutcome {
            replaced: None,
            extensions: Vec::new(),
        };
        for hook in self.hooks_for(node.kind(), HookPhase::BeforeBuild) {
            match Self::call(hook.as_ref(), node, None, path, api, diagnostics)? {
                HookAction::Keep => {}
                HookAction::Extend(fields) => outcome.extensions.push((hook.name().to_string(), fields)),
                HookAction::Replace(value) => outcome.replaced = Some(Some(value)),
                HookAction::Veto => {
                    outcome.replaced = Some(None);
                    break;
                }
            }
        }
        Ok(outcome)
    }

    pub(crate) fn after(
        &self,
        node: NodeRef<'_>,
        mut fragment: Option<Value>,
        path: &NodePath,
        api: &Api,
        diagnostics: &mut Vec<PipelineDiagnostic>,
    ) -> RamliftResult<Option<Value>> {
        for hook in self.hooks_for(node.kind(), HookPhase::AfterBuild) {
            match Self::call(hook.as_ref(), node, fragment.as_ref(), path, api, diagnostics)? {
                HookAction::Keep => {}
                HookAction::Extend(fields) => {
                    if let Some(value) = fragment.take() {
                        fragment = Some(Self::apply_extensions(value, vec![(hook.name().to_string(), fields)], path)?);
                    }
                }
                HookAction::Replace(value) => fragment = Some(value),
                HookAction::Veto => return Ok(None),
            }
        }
        Ok(fragment)
    }

    /// Insert extension fields into an object fragment, later entries winning.
    pub(crate) fn apply_extensions(
        mut fragment: Value,
        extensions: Vec<(String, Map<String, Value>)>,
        path: &NodePath,
    ) -> RamliftResult<Value> {
        for (hook, fields) in extensions {
            let Some(map) = fragment.as_object_mut() else {
                return Err(RamliftError::plugin(
                    hook,
                    "cannot extend a fragment that is not an object",
                    path.clone(),
                ));
            };
            map.extend(fields);
        }
        Ok(fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    struct Named(&'static str);

    impl BuildHook for Named {
        fn name(&self) -> &str {
            self.0
        }
        fn observes(&self) -> &[NodeKind] {
            &[NodeKind::Resource]
        }
        fn on_node(&self, _: NodeRef<'_>, _: Option<&Value>, _: &mut HookContext<'_>) -> anyhow::Result<HookAction> {
            Ok(HookAction::Keep)
        }
    }

    #[test]
    fn register_rejects_duplicate_names() {
        let mut host = PluginHost::new();
        host.register(Named("a")).unwrap();
        host.register(Named("b")).unwrap();
        assert_matches!(host.register(Named("a")), Err(RamliftError::InvalidArgument(_)));
        assert_eq!(host.names(), ["a", "b"]);

        assert!(host.unregister("a"));
        assert!(!host.unregister("a"));
        assert_eq!(host.len(), 1);
    }

    #[test]
    fn extensions_require_object_fragments() {
        let mut fields = Map::new();
        fields.insert("x-a".into(), Value::Bool(true));
        let err = PluginHost::apply_extensions(Value::Bool(false), vec![("h".into(), fields.clone())], &NodePath::root())
            .unwrap_err();
        assert_matches!(err, RamliftError::Plugin { .. });

        let mut later = Map::new();
        later.insert("x-a".into(), Value::Bool(false));
        let v = PluginHost::apply_extensions(
            Value::Object(Map::new()),
            vec![("h1".into(), fields), ("h2".into(), later)],
            &NodePath::root(),
        )
        .unwrap();
        assert_eq!(v["x-a"], false);
    }
}
