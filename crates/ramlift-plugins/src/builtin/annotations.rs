//! `builtin.annotations`: copy annotation instances into `x-` extension fields.
//!
//! `(rateLimit): 10` on a method becomes `x-rateLimit: 10` on the operation;
//! library annotations keep their prefix (`(lib.owner)` -> `x-lib-owner`).
//! Annotations without a value become `true`.

use serde_json::{Map, Value};

use ramlift_core::host::{BuildHook, HookAction, HookContext};
use ramlift_core::model::{NodeKind, NodeRef};

use crate::builtin::config::AnnotationsConfig;
use crate::plugin::PluginCapability;
use crate::spec::PluginSpec;

pub const ID: &str = "builtin.annotations";

pub fn spec() -> PluginSpec {
    PluginSpec::new(ID, "Annotation Extensions", env!("CARGO_PKG_VERSION"))
        .observe_all(&NodeKind::ALL)
        .want(PluginCapability::Extend)
        .describe("emit annotation instances as specification extensions")
        .meta("category", "extensions")
}

pub struct AnnotationsPlugin {
    config: AnnotationsConfig,
}

impl AnnotationsPlugin {
    pub fn new(config: AnnotationsConfig) -> Self {
        Self { config }
    }

    fn extension_key(&self, name: &str) -> String {
        format!("{}{}", self.config.prefix, name.replace('.', "-"))
    }
}

impl BuildHook for AnnotationsPlugin {
    fn name(&self) -> &str {
        ID
    }

    fn observes(&self) -> &[NodeKind] {
        &NodeKind::ALL
    }

    fn on_node(
        &self,
        node: NodeRef<'_>,
        fragment: Option<&Value>,
        cx: &mut HookContext<'_>,
    ) -> anyhow::Result<HookAction> {
        let annotations = node.annotations();
        if annotations.is_empty() {
            return Ok(HookAction::Keep);
        }
        if !matches!(fragment, Some(Value::Object(_))) {
            cx.warn(format!(
                "{} annotation(s) dropped: {} fragment is not an object",
                annotations.len(),
                node.kind()
            ));
            return Ok(HookAction::Keep);
        }

        let fields: Map<String, Value> = annotations
            .iter()
            .filter(|a| self.config.admits(&a.name))
            .map(|a| {
                let value = match &a.value {
                    Value::Null => Value::Bool(true),
                    other => other.clone(),
                };
                (self.extension_key(&a.name), value)
            })
            .collect();

        if fields.is_empty() {
            Ok(HookAction::Keep)
        } else {
            Ok(HookAction::Extend(fields))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_keep_library_prefix() {
        let p = AnnotationsPlugin::new(AnnotationsConfig::default());
        assert_eq!(p.extension_key("rateLimit"), "x-rateLimit");
        assert_eq!(p.extension_key("lib.owner"), "x-lib-owner");
    }

    #[test]
    fn spec_matches_hook() {
        let p = AnnotationsPlugin::new(AnnotationsConfig::default());
        let s = spec();
        s.validate().unwrap();
        assert_eq!(s.observes.as_slice(), p.observes());
    }
}
