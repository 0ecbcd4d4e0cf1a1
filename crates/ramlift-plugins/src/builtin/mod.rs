//! Built-in plugins and their catalog.
//!
//! The catalog is independent from host configuration: listings (`ramlift
//! plugins`) read `builtin_specs()` without instantiating anything.

use crate::registry::PluginRegistry;
use crate::spec::PluginSpec;

pub mod annotations;
pub mod config;
pub mod operation_ids;
pub mod tags;

pub use self::config::BuiltinConfig;

/// Built-in plugin ids, in the order `register_all` registers them.
pub const BUILTIN_PLUGIN_IDS: [&str; 3] = [annotations::ID, operation_ids::ID, tags::ID];

pub fn builtin_specs() -> Vec<PluginSpec> {
    vec![annotations::spec(), operation_ids::spec(), tags::spec()]
}

/// Register all built-in plugins into the provided registry.
pub fn register_all(registry: &mut PluginRegistry, config: &BuiltinConfig) -> anyhow::Result<()> {
    config.validate()?;
    registry.register(
        annotations::spec(),
        annotations::AnnotationsPlugin::new(config.annotations.clone()),
    )?;
    registry.register(
        operation_ids::spec(),
        operation_ids::OperationIdsPlugin::new(config.operation_ids.clone()),
    )?;
    registry.register(tags::spec(), tags::TagsPlugin::new(config.tags.clone()))?;
    Ok(())
}

/// A registry holding every built-in plugin.
pub fn builtin_registry(config: &BuiltinConfig) -> anyhow::Result<PluginRegistry> {
    let mut registry = PluginRegistry::new();
    register_all(&mut registry, config)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_match_specs() {
        let specs = builtin_specs();
        let ids: Vec<&str> = specs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, BUILTIN_PLUGIN_IDS);
    }

    #[test]
    fn registry_lists_builtins_sorted() {
        let registry = builtin_registry(&BuiltinConfig::default()).unwrap();
        assert_eq!(
            registry.list_ids(),
            vec!["builtin.annotations", "builtin.operation-ids", "builtin.tags"]
        );
        for spec in registry.list() {
            spec.validate().unwrap();
        }
    }
}
