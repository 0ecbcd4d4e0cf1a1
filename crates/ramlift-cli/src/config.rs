use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use ramlift_core::config::{validate_config, CoreConfig};
use ramlift_plugins::builtin::BuiltinConfig;
use ramlift_plugins::HostPolicy;

use crate::io::input::read_structured_file;

/// Contents of the `--config` file (JSON, or YAML by extension). Every
/// section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CliConfig {
    pub core: CoreConfig,
    /// Plugin ids enabled by default, in run order.
    pub plugins: Vec<String>,
    pub builtin: BuiltinConfig,
    pub policy: HostPolicy,
}

impl CliConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cfg: Self = match path {
            Some(p) => read_structured_file(p).with_context(|| format!("loading config {}", p.display()))?,
            None => Self::default(),
        };
        validate_config(&cfg.core)?;
        cfg.builtin.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_are_optional() {
        let cfg: CliConfig = serde_json::from_str(
            r#"{"plugins":["builtin.tags"],"core":{"build":{"strict":true}},"policy":{"allowVeto":false}}"#,
        )
        .unwrap();
        assert_eq!(cfg.plugins, vec!["builtin.tags"]);
        assert!(cfg.core.build.strict);
        assert!(!cfg.policy.allow_veto);
        assert!(cfg.policy.allow_extend);
        assert_eq!(cfg.builtin, BuiltinConfig::default());
    }

    #[test]
    fn load_without_path_is_default() {
        assert_eq!(CliConfig::load(None).unwrap(), CliConfig::default());
    }
}
