//! `builtin.operation-ids`: give every operation a stable `operationId`.
//!
//! Ids derive from the verb and the full resource URI (`GET /users/{id}` ->
//! `getUsersById`), so they depend only on the document. With
//! `preferDisplayName`, a method's display name is used instead unless another
//! method's display name maps to the same id.

use serde_json::{Map, Value};

use ramlift_core::host::{BuildHook, HookAction, HookContext};
use ramlift_core::model::{Api, Method, NodeKind, NodeRef};
use ramlift_core::template::params::transform;

use crate::builtin::config::{IdStyle, OperationIdsConfig};
use crate::plugin::PluginCapability;
use crate::spec::PluginSpec;

pub const ID: &str = "builtin.operation-ids";

const KINDS: [NodeKind; 1] = [NodeKind::Method];

pub fn spec() -> PluginSpec {
    PluginSpec::new(ID, "Operation Ids", env!("CARGO_PKG_VERSION"))
        .observe_all(&KINDS)
        .want(PluginCapability::Extend)
        .describe("derive operationId from verb and resource path")
        .meta("category", "naming")
}

/// Path-derived id: the verb, then each URI segment, `{x}` read as `by x`.
pub fn path_operation_id(verb: &str, full_uri: &str, style: IdStyle) -> anyhow::Result<String> {
    let mut words = vec![verb.to_string()];
    for segment in full_uri.split('/').filter(|s| !s.is_empty()) {
        match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(param) => {
                words.push("by".to_string());
                words.push(param.to_string());
            }
            None => words.push(segment.to_string()),
        }
    }
    transform(style.transformer(), &words.join(" ")).map_err(anyhow::Error::msg)
}

pub struct OperationIdsPlugin {
    config: OperationIdsConfig,
}

impl OperationIdsPlugin {
    pub fn new(config: OperationIdsConfig) -> Self {
        Self { config }
    }

    fn display_id(&self, method: &Method) -> Option<String> {
        let name = method.display_name.as_deref()?.trim();
        if name.is_empty() {
            return None;
        }
        transform(self.config.style.transformer(), name).ok()
    }

    /// True if another method's display name maps to `id`.
    fn display_id_collides(&self, api: &Api, method: &Method, id: &str) -> bool {
        api.all_resources()
            .iter()
            .flat_map(|r| r.methods.iter())
            .filter(|m| m.path != method.path)
            .any(|m| self.display_id(m).as_deref() == Some(id))
    }
}

impl BuildHook for OperationIdsPlugin {
    fn name(&self) -> &str {
        ID
    }

    fn observes(&self) -> &[NodeKind] {
        &KINDS
    }

    fn on_node(
        &self,
        node: NodeRef<'_>,
        fragment: Option<&Value>,
        cx: &mut HookContext<'_>,
    ) -> anyhow::Result<HookAction> {
        let NodeRef::Method(resource, method) = node else {
            return Ok(HookAction::Keep);
        };
        let Some(Value::Object(operation)) = fragment else {
            return Ok(HookAction::Keep);
        };
        if operation.contains_key("operationId") && !self.config.overwrite {
            return Ok(HookAction::Keep);
        }

        let by_path = path_operation_id(&method.verb, &resource.full_uri, self.config.style)?;
        let id = match self.display_id(method).filter(|_| self.config.prefer_display_name) {
            Some(id) if self.display_id_collides(cx.api, method, &id) => {
                cx.warn(format!("display name id `{id}` is ambiguous, using `{by_path}`"));
                by_path
            }
            Some(id) => id,
            None => by_path,
        };

        let mut fields = Map::new();
        fields.insert("operationId".into(), Value::String(id));
        Ok(HookAction::Extend(fields))
    }
}
