//! Plugin registry and host assembly.
//!
//! The registry stores plugin specs alongside their hook instances, keyed by
//! plugin id. Iteration is in id order; the order hooks run in is the order
//! the caller enables them in `PluginRegistry::host`, never registration
//! order.
//!
//! The registry does not run hooks itself; it hands guarded hooks to a
//! `ramlift_core::host::PluginHost`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use ramlift_core::host::{BuildHook, PluginHost};

use crate::plugin::{HostPolicy, PluginCapability, PolicyGuard};
use crate::spec::{evaluate_spec, PluginSpec};

/// Registry failures. Returned inside `anyhow::Error`; downcast to inspect.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("plugin id already registered: {0}")]
    Duplicate(String),

    #[error("plugin not found: {0}")]
    NotFound(String),

    #[error("plugin enabled twice: {0}")]
    EnabledTwice(String),

    #[error("plugin {id} does not match its spec: {detail}")]
    SpecMismatch { id: String, detail: String },

    #[error("plugin {id} is not allowed under host policy: {reason}; missing={missing:?}")]
    Denied {
        id: String,
        reason: String,
        missing: Vec<String>,
    },
}

fn mismatch(id: &str, detail: impl Into<String>) -> anyhow::Error {
    RegistryError::SpecMismatch {
        id: id.to_string(),
        detail: detail.into(),
    }
    .into()
}

/// A hook instance plus its static spec.
pub struct RegisteredPlugin {
    pub spec: PluginSpec,
    pub hook: Arc<dyn BuildHook>,
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, RegisteredPlugin>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Register a hook with its spec.
    ///
    /// `spec` must describe the hook: same id as the hook name, same phase,
    /// same observed node kinds.
    pub fn register<H: BuildHook + 'static>(&mut self, spec: PluginSpec, hook: H) -> anyhow::Result<()> {
        self.register_shared(spec, Arc::new(hook))
    }

    pub fn register_shared(&mut self, spec: PluginSpec, hook: Arc<dyn BuildHook>) -> anyhow::Result<()> {
        spec.validate()?;

        let id = spec.id.as_str().to_string();
        if self.plugins.contains_key(&id) {
            return Err(RegistryError::Duplicate(id).into());
        }
        if hook.name() != id {
            return Err(mismatch(&id, format!("hook is named `{}`", hook.name())));
        }
        if hook.phase() != spec.phase {
            return Err(mismatch(
                &id,
                format!(
                    "spec declares phase {} but the hook runs {}",
                    spec.phase.as_str(),
                    hook.phase().as_str()
                ),
            ));
        }
        let declared: BTreeSet<_> = spec.observes.iter().copied().collect();
        let actual: BTreeSet<_> = hook.observes().iter().copied().collect();
        if declared != actual {
            return Err(mismatch(&id, "hook observes different node kinds"));
        }

        debug!(plugin = %id, version = %spec.version, "registered plugin");
        self.plugins.insert(id, RegisteredPlugin { spec, hook });
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&RegisteredPlugin> {
        self.plugins.get(id)
    }

    /// Plugin ids in deterministic order.
    pub fn list_ids(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }

    /// Specs in deterministic id order.
    pub fn list(&self) -> Vec<&PluginSpec> {
        self.plugins.values().map(|p| &p.spec).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RegisteredPlugin)> {
        self.plugins.iter()
    }

    /// Build a host running the given plugins in the given order.
    ///
    /// Fails on unknown or repeated ids and on plugins whose wanted
    /// capabilities the policy does not grant.
    pub fn host<S: AsRef<str>>(&self, ids: &[S], policy: &HostPolicy) -> anyhow::Result<PluginHost> {
        let mut host = PluginHost::new();
        let mut seen = BTreeSet::new();

        for id in ids {
            let id = id.as_ref();
            if !seen.insert(id) {
                return Err(RegistryError::EnabledTwice(id.to_string()).into());
            }
            let reg = self
                .get(id)
                .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

            let ev = evaluate_spec(&reg.spec, policy);
            if !ev.allowed {
                return Err(RegistryError::Denied {
                    id: id.to_string(),
                    reason: ev.reason.unwrap_or_else(|| "denied".to_string()),
                    missing: ev.missing.iter().map(|c| c.as_str().to_string()).collect(),
                }
                .into());
            }

            let granted: Vec<PluginCapability> = reg.spec.wants.iter().copied().collect();
            host.register(PolicyGuard::new(Arc::clone(&reg.hook), granted))?;
        }

        Ok(host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use ramlift_core::host::{HookAction, HookContext, HookPhase};
    use ramlift_core::model::{NodeKind, NodeRef};
    use serde_json::Value;

    struct TestHook(&'static str);

    impl BuildHook for TestHook {
        fn name(&self) -> &str {
            self.0
        }
        fn observes(&self) -> &[NodeKind] {
            &[NodeKind::Method]
        }
        fn on_node(&self, _: NodeRef<'_>, _: Option<&Value>, _: &mut HookContext<'_>) -> anyhow::Result<HookAction> {
            Ok(HookAction::Keep)
        }
    }

    fn spec(id: &str) -> PluginSpec {
        PluginSpec::new(id, "Test", "0.1.0").observe(NodeKind::Method)
    }

    #[test]
    fn host_follows_requested_order() {
        let mut reg = PluginRegistry::new();
        reg.register(spec("test.b"), TestHook("test.b")).unwrap();
        reg.register(spec("test.a"), TestHook("test.a")).unwrap();

        assert_eq!(reg.list_ids(), vec!["test.a", "test.b"]);
        let host = reg.host(&["test.b", "test.a"], &HostPolicy::default()).unwrap();
        assert_eq!(host.names(), vec!["test.b", "test.a"]);
    }

    #[test]
    fn mismatched_spec_is_rejected() {
        let mut reg = PluginRegistry::new();
        assert!(reg.register(spec("test.a"), TestHook("test.other")).is_err());
        let before = spec("test.a").phase(HookPhase::BeforeBuild);
        assert!(reg.register(before, TestHook("test.a")).is_err());
        let kinds = PluginSpec::new("test.a", "Test", "0.1.0").observe(NodeKind::Root);
        assert!(reg.register(kinds, TestHook("test.a")).is_err());
        assert!(reg.is_empty());
    }

    #[test]
    fn host_rejects_unknown_duplicate_and_denied() {
        let mut reg = PluginRegistry::new();
        reg.register(spec("test.a"), TestHook("test.a")).unwrap();
        reg.register(spec("test.r").want(PluginCapability::Replace), TestHook("test.r"))
            .unwrap();

        let err = reg.host(&["test.missing"], &HostPolicy::default()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<RegistryError>(),
            Some(&RegistryError::NotFound("test.missing".to_string()))
        );
        let err = reg.host(&["test.a", "test.a"], &HostPolicy::default()).unwrap_err();
        assert_matches!(err.downcast_ref::<RegistryError>(), Some(RegistryError::EnabledTwice(_)));

        let err = reg.host(&["test.r"], &HostPolicy::extend_only()).unwrap_err();
        assert!(err.to_string().contains("replace"));
        assert_eq!(reg.host(&["test.r"], &HostPolicy::default()).unwrap().len(), 1);
    }
}
