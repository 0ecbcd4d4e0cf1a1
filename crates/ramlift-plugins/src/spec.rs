//! Plugin specification types.
//!
//! A `PluginSpec` is the static declaration of a build plugin:
//! - identity (id, display name, version)
//! - the hook phase it runs in and the node kinds it observes
//! - the capabilities it needs from the host (extend, replace, veto)
//!
//! Specs are data-only. The registry validates them against the hook they
//! describe and evaluates them against the host policy before a hook is
//! allowed into a `PluginHost`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use anyhow::Result;
use serde::Serialize;

use ramlift_core::host::HookPhase;
use ramlift_core::model::NodeKind;

use crate::plugin::{HostPolicy, PluginCapability};

/// Stable plugin identifier, e.g. `builtin.tags`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PluginId(pub String);

impl PluginId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PluginSpec {
    pub id: PluginId,
    pub name: String,
    pub version: String,
    pub phase: HookPhase,
    /// Node kinds the hook is invoked for.
    pub observes: Vec<NodeKind>,
    /// Capabilities the plugin needs; the host policy grants or denies them.
    pub wants: BTreeSet<PluginCapability>,
    pub description: Option<String>,
    /// Arbitrary metadata for listings.
    pub meta: BTreeMap<String, String>,
}

impl PluginSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: PluginId::new(id),
            name: name.into(),
            version: version.into(),
            phase: HookPhase::default(),
            observes: Vec::new(),
            wants: BTreeSet::new(),
            description: None,
            meta: BTreeMap::new(),
        }
    }

    pub fn phase(mut self, phase: HookPhase) -> Self {
        self.phase = phase;
        self
    }

    pub fn observe(mut self, kind: NodeKind) -> Self {
        if !self.observes.contains(&kind) {
            self.observes.push(kind);
        }
        self
    }

    pub fn observe_all(mut self, kinds: &[NodeKind]) -> Self {
        for kind in kinds {
            self = self.observe(*kind);
        }
        self
    }

    pub fn want(mut self, capability: PluginCapability) -> Self {
        self.wants.insert(capability);
        self
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn observes_kind(&self, kind: NodeKind) -> bool {
        self.observes.contains(&kind)
    }

    /// Validate spec for basic quality constraints.
    pub fn validate(&self) -> Result<()> {
        let id = self.id.as_str();
        if id.trim().is_empty() {
            anyhow::bail!("plugin id is empty");
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '-' | '_'))
        {
            anyhow::bail!("plugin id must be lowercase ASCII: {id}");
        }
        if self.name.trim().is_empty() {
            anyhow::bail!("plugin name is empty");
        }
        if self.version.trim().is_empty() {
            anyhow::bail!("plugin version is empty");
        }
        if self.observes.is_empty() {
            anyhow::bail!("plugin {id} observes no node kinds");
        }
        Ok(())
    }
}

/// Host policy evaluation for a spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecEvaluation {
    pub allowed: bool,
    pub reason: Option<String>,
    /// Capabilities wanted by the plugin and denied by the host.
    pub missing: Vec<PluginCapability>,
}

impl SpecEvaluation {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            missing: Vec::new(),
        }
    }

    pub fn denied(reason: impl Into<String>, missing: Vec<PluginCapability>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            missing,
        }
    }
}

/// Evaluate whether a plugin spec is compatible with the host policy.
pub fn evaluate_spec(spec: &PluginSpec, policy: &HostPolicy) -> SpecEvaluation {
    let missing: Vec<PluginCapability> = spec
        .wants
        .iter()
        .copied()
        .filter(|c| !policy.grants(*c))
        .collect();

    if missing.is_empty() {
        SpecEvaluation::allowed()
    } else {
        SpecEvaluation::denied("host policy does not grant plugin capabilities", missing)
    }
}
