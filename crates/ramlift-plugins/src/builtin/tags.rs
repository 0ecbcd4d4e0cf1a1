//! `builtin.tags`: tag operations by their top-level resource.
//!
//! Every operation under `/users/...` gets the tag `users` (or the display
//! name of `/users`). The root document gets a `tags` list, one entry per
//! top-level resource with at least one operation, carrying its description.

use serde_json::{json, Map, Value};

use ramlift_core::host::{BuildHook, HookAction, HookContext};
use ramlift_core::model::{Api, NodeKind, NodeRef, Resource};

use crate::builtin::config::TagsConfig;
use crate::plugin::PluginCapability;
use crate::spec::PluginSpec;

pub const ID: &str = "builtin.tags";

const KINDS: [NodeKind; 2] = [NodeKind::Method, NodeKind::Root];

pub fn spec() -> PluginSpec {
    PluginSpec::new(ID, "Resource Tags", env!("CARGO_PKG_VERSION"))
        .observe_all(&KINDS)
        .want(PluginCapability::Extend)
        .describe("tag operations by top-level resource")
        .meta("category", "grouping")
}

pub struct TagsPlugin {
    config: TagsConfig,
}

impl TagsPlugin {
    pub fn new(config: TagsConfig) -> Self {
        Self { config }
    }

    fn tag_name(&self, top: &Resource) -> String {
        if self.config.use_display_name {
            if let Some(name) = top.display_name.as_deref().filter(|n| !n.trim().is_empty()) {
                return name.to_string();
            }
        }
        let name = top
            .relative_uri
            .trim_matches('/')
            .replace(['{', '}'], "");
        if name.is_empty() {
            self.config.default_tag.clone()
        } else {
            name
        }
    }

    fn root_tags(&self, api: &Api) -> Vec<Value> {
        let mut tags: Vec<Value> = Vec::new();
        let mut names: Vec<String> = Vec::new();
        for top in &api.resources {
            if top.walk().iter().all(|r| r.methods.is_empty()) {
                continue;
            }
            let name = self.tag_name(top);
            if names.contains(&name) {
                continue;
            }
            let mut tag = json!({ "name": name });
            if let Some(description) = &top.description {
                tag["description"] = Value::String(description.clone());
            }
            names.push(name);
            tags.push(tag);
        }
        tags
    }
}

fn top_level<'a>(api: &'a Api, resource: &'a Resource) -> &'a Resource {
    api.resources
        .iter()
        .find(|top| top.walk().iter().any(|r| r.path == resource.path))
        .unwrap_or(resource)
}

impl BuildHook for TagsPlugin {
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
        let Some(Value::Object(existing)) = fragment else {
            return Ok(HookAction::Keep);
        };
        let mut fields = Map::new();

        match node {
            NodeRef::Method(resource, _) => {
                let tag = Value::String(self.tag_name(top_level(cx.api, resource)));
                let mut tags = existing
                    .get("tags")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                if tags.contains(&tag) {
                    return Ok(HookAction::Keep);
                }
                tags.push(tag);
                fields.insert("tags".into(), Value::Array(tags));
            }
            NodeRef::Root(api) if self.config.describe => {
                let tags = self.root_tags(api);
                if tags.is_empty() {
                    return Ok(HookAction::Keep);
                }
                fields.insert("tags".into(), Value::Array(tags));
            }
            _ => return Ok(HookAction::Keep),
        }

        Ok(HookAction::Extend(fields))
    }
}
