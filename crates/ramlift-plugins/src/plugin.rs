//! Host policy and capability enforcement for build plugins.
//!
//! Every hook installed through the registry is wrapped in a `PolicyGuard`,
//! so a plugin that returns an action its spec did not declare (or that the
//! host does not grant) fails the build instead of silently rewriting output.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ramlift_core::host::{BuildHook, HookAction, HookContext, HookPhase};
use ramlift_core::model::{NodeKind, NodeRef};

/// What a plugin may do to a fragment. Keeping a fragment needs no capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginCapability {
    Extend,
    Replace,
    Veto,
}

impl PluginCapability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extend => "extend",
            Self::Replace => "replace",
            Self::Veto => "veto",
        }
    }

    /// Capability an action requires, `None` for `Keep`.
    pub fn required_by(action: &HookAction) -> Option<Self> {
        match action {
            HookAction::Keep => None,
            HookAction::Extend(_) => Some(Self::Extend),
            HookAction::Replace(_) => Some(Self::Replace),
            HookAction::Veto => Some(Self::Veto),
        }
    }
}

impl fmt::Display for PluginCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities the host grants to plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HostPolicy {
    pub allow_extend: bool,
    pub allow_replace: bool,
    pub allow_veto: bool,
}

impl Default for HostPolicy {
    fn default() -> Self {
        Self {
            allow_extend: true,
            allow_replace: true,
            allow_veto: true,
        }
    }
}

impl HostPolicy {
    /// Plugins may only add fields.
    pub fn extend_only() -> Self {
        Self {
            allow_extend: true,
            allow_replace: false,
            allow_veto: false,
        }
    }

    pub fn grants(&self, capability: PluginCapability) -> bool {
        match capability {
            PluginCapability::Extend => self.allow_extend,
            PluginCapability::Replace => self.allow_replace,
            PluginCapability::Veto => self.allow_veto,
        }
    }
}

/// Hook wrapper that rejects actions outside the granted capability set.
pub struct PolicyGuard {
    inner: Arc<dyn BuildHook>,
    granted: Vec<PluginCapability>,
}

impl PolicyGuard {
    pub fn new(inner: Arc<dyn BuildHook>, granted: Vec<PluginCapability>) -> Self {
        Self { inner, granted }
    }
}

impl BuildHook for PolicyGuard {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn observes(&self) -> &[NodeKind] {
        self.inner.observes()
    }

    fn phase(&self) -> HookPhase {
        self.inner.phase()
    }

    fn on_node(
        &self,
        node: NodeRef<'_>,
        fragment: Option<&Value>,
        cx: &mut HookContext<'_>,
    ) -> anyhow::Result<HookAction> {
        let action = self.inner.on_node(node, fragment, cx)?;
        if let Some(needed) = PluginCapability::required_by(&action) {
            if !self.granted.contains(&needed) {
                anyhow::bail!("action `{needed}` is not granted to this plugin");
            }
        }
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ramlift_core::model::Api;
    use ramlift_core::path::NodePath;

    struct Vetoer;

    impl BuildHook for Vetoer {
        fn name(&self) -> &str {
            "test.veto"
        }
        fn observes(&self) -> &[NodeKind] {
            &[NodeKind::Root]
        }
        fn on_node(&self, _: NodeRef<'_>, _: Option<&Value>, _: &mut HookContext<'_>) -> anyhow::Result<HookAction> {
            Ok(HookAction::Veto)
        }
    }

    fn api() -> Api {
        Api {
            title: "T".to_string(),
            version: None,
            description: None,
            base_uri: None,
            base_uri_parameters: Vec::new(),
            protocols: Vec::new(),
            media_types: Vec::new(),
            documentation: Vec::new(),
            secured_by: Vec::new(),
            resources: Vec::new(),
            types: Default::default(),
            traits: Default::default(),
            resource_types: Default::default(),
            security_schemes: Default::default(),
            annotation_types: Default::default(),
            annotations: Vec::new(),
            libraries: Vec::new(),
        }
    }

    #[test]
    fn extend_only_policy() {
        let p = HostPolicy::extend_only();
        assert!(p.grants(PluginCapability::Extend));
        assert!(!p.grants(PluginCapability::Replace));
        assert!(!p.grants(PluginCapability::Veto));
    }

    #[test]
    fn guard_rejects_ungranted_action() {
        let api = api();
        let path = NodePath::root();
        let mut cx = HookContext::new(&path, &api);

        let guard = PolicyGuard::new(Arc::new(Vetoer), vec![PluginCapability::Extend]);
        let err = guard.on_node(NodeRef::Root(&api), None, &mut cx).unwrap_err();
        assert!(err.to_string().contains("veto"));

        let guard = PolicyGuard::new(Arc::new(Vetoer), vec![PluginCapability::Veto]);
        assert_eq!(guard.on_node(NodeRef::Root(&api), None, &mut cx).unwrap(), HookAction::Veto);
        assert_eq!(guard.name(), "test.veto");
    }
}
