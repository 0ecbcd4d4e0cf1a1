//! Contract tests for registry-built plugin hosts.
//!
//! These drive the whole compiler through the in-memory source with the
//! built-in plugins enabled, and check guarantees that hold for any plugin:
//! deterministic output, requested run order, policy enforcement.

use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::{json, Map, Value};

use ramlift_core::prelude::*;
use ramlift_plugins::builtin::{builtin_registry, BuiltinConfig, BUILTIN_PLUGIN_IDS};
use ramlift_plugins::{HostPolicy, PluginCapability, PluginRegistry, PluginSpec};

const API: &str = "#%RAML 1.0
title: Shop
version: v1
annotationTypes:
  owner: string
  internal: nil
/users:
  displayName: Users
  description: People who buy things
  (owner): identity-team
  get:
    (internal):
  /{id}:
    get:
      displayName: Fetch user
    delete:
/orders:
  post:
    (owner): billing
/health:
";

fn compile_with_host(host: &PluginHost) -> RamliftResult<CompileReport> {
    let src = MemorySource::new().with("api.raml", API);
    compile(&src, &CompileRequest::new("api.raml"), host)
}

fn builtin_host(config: &BuiltinConfig, ids: &[&str]) -> PluginHost {
    builtin_registry(config).unwrap().host(ids, &HostPolicy::default()).unwrap()
}

#[test]
fn empty_registry_is_stable() {
    let r1 = PluginRegistry::default();
    let r2 = PluginRegistry::default();
    assert!(r1.is_empty());
    assert_eq!(r1.list_ids(), r2.list_ids());
    assert!(r1.host::<&str>(&[], &HostPolicy::default()).unwrap().is_empty());
}

#[test]
fn registry_order_is_deterministic() {
    let registry = builtin_registry(&BuiltinConfig::default()).unwrap();
    let ids = registry.list_ids();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
    assert_eq!(ids.len(), BUILTIN_PLUGIN_IDS.len());
}

#[test]
fn builtins_produce_identical_output_across_runs() {
    let host = builtin_host(&BuiltinConfig::default(), &BUILTIN_PLUGIN_IDS);
    let a = compile_with_host(&host).unwrap();
    let b = compile_with_host(&host).unwrap();
    assert_eq!(a.stats.digest, b.stats.digest);
    assert_eq!(
        a.render(OutputFormat::Json).unwrap(),
        b.render(OutputFormat::Json).unwrap()
    );
}

#[test]
fn annotations_become_extensions() {
    let host = builtin_host(&BuiltinConfig::default(), &["builtin.annotations"]);
    let doc = compile_with_host(&host).unwrap().document;

    assert_eq!(doc["paths"]["/users"]["x-owner"], "identity-team");
    assert_eq!(doc["paths"]["/users"]["get"]["x-internal"], true);
    assert_eq!(doc["paths"]["/orders"]["post"]["x-owner"], "billing");
    assert!(doc["paths"]["/orders"].get("x-owner").is_none());
}

#[test]
fn excluded_annotations_are_not_emitted() {
    let mut config = BuiltinConfig::default();
    config.annotations.exclude = vec!["internal".to_string()];
    let host = builtin_host(&config, &["builtin.annotations"]);
    let doc = compile_with_host(&host).unwrap().document;

    assert!(doc["paths"]["/users"]["get"].get("x-internal").is_none());
    assert_eq!(doc["paths"]["/users"]["x-owner"], "identity-team");
}

#[test]
fn operation_ids_are_unique_and_path_derived() {
    let host = builtin_host(&BuiltinConfig::default(), &["builtin.operation-ids"]);
    let doc = compile_with_host(&host).unwrap().document;

    assert_eq!(doc["paths"]["/users"]["get"]["operationId"], "getUsers");
    assert_eq!(doc["paths"]["/users/{id}"]["get"]["operationId"], "getUsersById");
    assert_eq!(doc["paths"]["/users/{id}"]["delete"]["operationId"], "deleteUsersById");
    assert_eq!(doc["paths"]["/orders"]["post"]["operationId"], "postOrders");
}

#[test]
fn display_names_can_drive_operation_ids() {
    let mut config = BuiltinConfig::default();
    config.operation_ids.prefer_display_name = true;
    let host = builtin_host(&config, &["builtin.operation-ids"]);
    let doc = compile_with_host(&host).unwrap().document;

    assert_eq!(doc["paths"]["/users/{id}"]["get"]["operationId"], "fetchUser");
    assert_eq!(doc["paths"]["/users/{id}"]["delete"]["operationId"], "deleteUsersById");
}

#[test]
fn tags_group_operations_by_top_level_resource() {
    let host = builtin_host(&BuiltinConfig::default(), &["builtin.tags"]);
    let doc = compile_with_host(&host).unwrap().document;

    assert_eq!(doc["paths"]["/users"]["get"]["tags"], json!(["Users"]));
    assert_eq!(doc["paths"]["/users/{id}"]["delete"]["tags"], json!(["Users"]));
    assert_eq!(doc["paths"]["/orders"]["post"]["tags"], json!(["orders"]));
    assert_eq!(
        doc["tags"],
        json!([
            { "name": "Users", "description": "People who buy things" },
            { "name": "orders" }
        ])
    );
}

struct Overrider;

impl BuildHook for Overrider {
    fn name(&self) -> &str {
        "test.overrider"
    }
    fn observes(&self) -> &[NodeKind] {
        &[NodeKind::Method]
    }
    fn on_node(&self, _: NodeRef<'_>, _: Option<&Value>, _: &mut HookContext<'_>) -> anyhow::Result<HookAction> {
        let mut fields = Map::new();
        fields.insert("operationId".into(), json!("custom"));
        Ok(HookAction::Extend(fields))
    }
}

struct Replacer;

impl BuildHook for Replacer {
    fn name(&self) -> &str {
        "test.replacer"
    }
    fn observes(&self) -> &[NodeKind] {
        &[NodeKind::Method]
    }
    fn on_node(&self, _: NodeRef<'_>, _: Option<&Value>, _: &mut HookContext<'_>) -> anyhow::Result<HookAction> {
        Ok(HookAction::Replace(json!({ "responses": {} })))
    }
}

fn registry_with_test_hooks(replacer_spec: PluginSpec) -> PluginRegistry {
    let mut registry = builtin_registry(&BuiltinConfig::default()).unwrap();
    registry
        .register(
            PluginSpec::new("test.overrider", "Overrider", "0.1.0")
                .observe(NodeKind::Method)
                .want(PluginCapability::Extend),
            Overrider,
        )
        .unwrap();
    registry
        .register_shared(replacer_spec, Arc::new(Replacer))
        .unwrap();
    registry
}

fn replacer_spec() -> PluginSpec {
    PluginSpec::new("test.replacer", "Replacer", "0.1.0").observe(NodeKind::Method)
}

#[test]
fn later_plugin_wins_for_the_same_field() {
    let registry = registry_with_test_hooks(replacer_spec());

    let host = registry
        .host(&["builtin.operation-ids", "test.overrider"], &HostPolicy::default())
        .unwrap();
    let doc = compile_with_host(&host).unwrap().document;
    assert_eq!(doc["paths"]["/orders"]["post"]["operationId"], "custom");

    // operation-ids does not overwrite an existing id by default
    let host = registry
        .host(&["test.overrider", "builtin.operation-ids"], &HostPolicy::default())
        .unwrap();
    let doc = compile_with_host(&host).unwrap().document;
    assert_eq!(doc["paths"]["/orders"]["post"]["operationId"], "custom");

    let mut config = BuiltinConfig::default();
    config.operation_ids.overwrite = true;
    let mut registry = builtin_registry(&config).unwrap();
    registry
        .register(
            PluginSpec::new("test.overrider", "Overrider", "0.1.0")
                .observe(NodeKind::Method)
                .want(PluginCapability::Extend),
            Overrider,
        )
        .unwrap();
    let host = registry
        .host(&["test.overrider", "builtin.operation-ids"], &HostPolicy::default())
        .unwrap();
    let doc = compile_with_host(&host).unwrap().document;
    assert_eq!(doc["paths"]["/orders"]["post"]["operationId"], "postOrders");
}

#[test]
fn undeclared_capability_fails_the_build() {
    let registry = registry_with_test_hooks(replacer_spec());
    let host = registry.host(&["test.replacer"], &HostPolicy::default()).unwrap();

    let err = compile_with_host(&host).unwrap_err();
    assert_matches!(err, RamliftError::Plugin { ref plugin, .. } if plugin == "test.replacer");
    assert!(err.to_string().contains("replace"));
}

#[test]
fn policy_denies_plugins_wanting_replace() {
    let registry = registry_with_test_hooks(replacer_spec().want(PluginCapability::Replace));

    assert!(registry
        .host(&["test.replacer"], &HostPolicy::extend_only())
        .is_err());

    let host = registry.host(&["test.replacer"], &HostPolicy::default()).unwrap();
    let doc = compile_with_host(&host).unwrap().document;
    assert_eq!(doc["paths"]["/orders"]["post"], json!({ "responses": {} }));
}
