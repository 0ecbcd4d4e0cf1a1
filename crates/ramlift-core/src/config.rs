//! Configuration structures for ramlift-core.
//!
//! This module defines explicit, serializable configuration objects used by
//! higher-level components (CLI, plugins, embedding hosts) to control
//! resolution limits, template precedence and the build policy.
//!
//! The core crate itself does not read environment variables or files. All
//! configuration must be provided explicitly by the caller.

use serde::{Deserialize, Serialize};

use crate::errors::{RamliftError, RamliftResult};

/// Global configuration container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoreConfig {
    pub limits: LimitsConfig,
    pub templates: TemplateConfig,
    pub build: BuildConfig,
}

/// Resource and complexity limits for the loader and template resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LimitsConfig {
    pub max_documents: usize,
    pub max_document_bytes: usize,
    pub max_include_depth: usize,
    pub max_template_depth: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_documents: 1_000,
            max_document_bytes: 16 * 1024 * 1024,
            max_include_depth: 64,
            max_template_depth: 64,
        }
    }
}

/// Which template layer wins when a resource type method and a trait set the
/// same property on one method. Explicit method properties always win.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplatePrecedence {
    /// Resource type method first, traits after it (traits win).
    #[default]
    TraitsOverResourceType,
    /// Traits first, resource type method after them (resource type wins).
    ResourceTypeOverTraits,
}

impl TemplatePrecedence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TraitsOverResourceType => "traits-over-resource-type",
            Self::ResourceTypeOverTraits => "resource-type-over-traits",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TemplateConfig {
    pub precedence: TemplatePrecedence,
    /// Fail when an application site supplies an argument the template never uses.
    pub reject_unused_arguments: bool,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            precedence: TemplatePrecedence::default(),
            reject_unused_arguments: true,
        }
    }
}

/// Serialization format of the emitted document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }

    pub fn parse(s: &str) -> RamliftResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(RamliftError::invalid_argument(format!(
                "unsupported output format: {other}"
            ))),
        }
    }
}

/// Builder policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildConfig {
    /// Promote unsupported constructs to fatal errors.
    pub strict: bool,
    pub openapi_version: String,
    pub output_format: OutputFormat,
    /// Media type used when neither the body nor the root declares one.
    pub default_media_type: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            strict: false,
            openapi_version: crate::OPENAPI_VERSION.to_string(),
            output_format: OutputFormat::Json,
            default_media_type: "application/json".to_string(),
        }
    }
}

/// Validate a full configuration object.
pub fn validate_config(cfg: &CoreConfig) -> RamliftResult<()> {
    if cfg.limits.max_documents == 0 {
        return Err(RamliftError::invalid_argument(
            "max_documents must be greater than zero",
        ));
    }

    if cfg.limits.max_include_depth == 0 || cfg.limits.max_template_depth == 0 {
        return Err(RamliftError::invalid_argument(
            "depth limits must be greater than zero",
        ));
    }

    if !cfg.build.openapi_version.starts_with("3.0.") {
        return Err(RamliftError::invalid_argument(format!(
            "unsupported openapi version: {}",
            cfg.build.openapi_version
        )));
    }

    if !cfg.build.default_media_type.contains('/') {
        return Err(RamliftError::invalid_argument(
            "default media type must look like type/subtype",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = CoreConfig::default();
        validate_config(&cfg).unwrap();
    }

    #[test]
    fn invalid_limits_detected() {
        let mut cfg = CoreConfig::default();
        cfg.limits.max_documents = 0;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn openapi_31_rejected() {
        let mut cfg = CoreConfig::default();
        cfg.build.openapi_version = "3.1.0".to_string();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn partial_json_config_uses_defaults() {
        let cfg: CoreConfig = serde_json::from_str(
            r#"{"templates":{"precedence":"resource-type-over-traits"},"build":{"strict":true}}"#,
        )
        .unwrap();
        assert_eq!(cfg.templates.precedence, TemplatePrecedence::ResourceTypeOverTraits);
        assert!(cfg.templates.reject_unused_arguments);
        assert!(cfg.build.strict);
        assert_eq!(cfg.build.openapi_version, "3.0.3");
    }
}
