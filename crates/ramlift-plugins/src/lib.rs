//! ramlift-plugins
//!
//! Build plugins for the ramlift compiler:
//! - `spec`: static plugin declarations (phase, observed node kinds, wanted capabilities)
//! - `plugin`: host policy and the guard enforcing it at run time
//! - `registry`: deterministic plugin catalog and `PluginHost` assembly
//! - `builtin`: plugins shipped with ramlift (feature `builtin`)

pub mod plugin;
pub mod registry;
pub mod spec;

#[cfg(feature = "builtin")]
pub mod builtin;

pub use crate::plugin::{HostPolicy, PluginCapability, PolicyGuard};
pub use crate::registry::{PluginRegistry, RegisteredPlugin, RegistryError};
pub use crate::spec::{evaluate_spec, PluginId, PluginSpec, SpecEvaluation};
