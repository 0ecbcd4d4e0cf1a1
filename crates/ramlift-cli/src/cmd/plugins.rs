use anyhow::Result;
use serde::Serialize;

use ramlift_plugins::builtin::builtin_registry;

use crate::config::CliConfig;
use crate::output;

#[derive(Debug, Serialize)]
pub struct PluginInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub phase: &'static str,
    pub observes: Vec<&'static str>,
    pub wants: Vec<&'static str>,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PluginsOut {
    pub plugins: Vec<PluginInfo>,
}

pub fn run(cfg: &CliConfig) -> Result<()> {
    let reg = builtin_registry(&cfg.builtin)?;

    let plugins: Vec<PluginInfo> = reg
        .list()
        .into_iter()
        .map(|s| PluginInfo {
            id: s.id.to_string(),
            name: s.name.clone(),
            version: s.version.clone(),
            phase: s.phase.as_str(),
            observes: s.observes.iter().map(|k| k.as_str()).collect(),
            wants: s.wants.iter().map(|c| c.as_str()).collect(),
            enabled: cfg.plugins.iter().any(|id| id == s.id.as_str()),
            description: s.description.clone(),
        })
        .collect();

    if output::is_json() {
        return output::print(&PluginsOut { plugins });
    }
    for p in &plugins {
        let mark = if p.enabled { "*" } else { " " };
        println!(
            "{mark} {:<24} {:<8} {:<12} {}",
            p.id,
            p.version,
            p.phase,
            p.description.as_deref().unwrap_or(&p.name)
        );
    }
    Ok(())
}
