//! Built-in plugin configuration.
//!
//! One serializable root for every plugin shipped in `crate::builtin`. The
//! host (the CLI, or an embedding program) decides where it comes from; this
//! module does no I/O.
//!
//! All fields have defaults, so a partial JSON object is a valid config.

#![cfg(feature = "builtin")]

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltinConfig {
    #[serde(default)]
    pub annotations: AnnotationsConfig,
    #[serde(default)]
    pub operation_ids: OperationIdsConfig,
    #[serde(default)]
    pub tags: TagsConfig,
}

impl BuiltinConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.annotations.prefix.starts_with("x-") {
            anyhow::bail!(
                "annotation extension prefix must start with `x-`, got `{}`",
                self.annotations.prefix
            );
        }
        if self.tags.default_tag.trim().is_empty() {
            anyhow::bail!("default tag must not be empty");
        }
        Ok(())
    }
}

/// `builtin.annotations` configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationsConfig {
    /// Prefix of emitted extension fields.
    #[serde(default = "AnnotationsConfig::default_prefix")]
    pub prefix: String,

    /// Annotation names to emit. If empty, emit all.
    #[serde(default)]
    pub include: Vec<String>,

    /// Annotation names never emitted.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for AnnotationsConfig {
    fn default() -> Self {
        Self {
            prefix: Self::default_prefix(),
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

impl AnnotationsConfig {
    fn default_prefix() -> String {
        "x-".to_string()
    }

    pub fn admits(&self, name: &str) -> bool {
        (self.include.is_empty() || self.include.iter().any(|n| n == name))
            && !self.exclude.iter().any(|n| n == name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdStyle {
    /// `getUsersById`
    #[default]
    Camel,
    /// `get_users_by_id`
    Snake,
}

impl IdStyle {
    /// Name of the template transformer producing this style.
    pub fn transformer(&self) -> &'static str {
        match self {
            Self::Camel => "lowercamelcase",
            Self::Snake => "lowerunderscorecase",
        }
    }
}

/// `builtin.operation-ids` configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationIdsConfig {
    #[serde(default)]
    pub style: IdStyle,

    /// Derive ids from method display names when present and unambiguous.
    #[serde(default)]
    pub prefer_display_name: bool,

    /// Replace an `operationId` set by an earlier plugin.
    #[serde(default)]
    pub overwrite: bool,
}

/// `builtin.tags` configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagsConfig {
    /// Name tags after the top-level resource's display name when it has one.
    #[serde(default = "TagsConfig::default_use_display_name")]
    pub use_display_name: bool,

    /// Emit a root `tags` list carrying resource descriptions.
    #[serde(default = "TagsConfig::default_describe")]
    pub describe: bool,

    /// Tag for operations on `/` itself.
    #[serde(default = "TagsConfig::default_default_tag")]
    pub default_tag: String,
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            use_display_name: Self::default_use_display_name(),
            describe: Self::default_describe(),
            default_tag: Self::default_default_tag(),
        }
    }
}

impl TagsConfig {
    fn default_use_display_name() -> bool {
        true
    }
    fn default_describe() -> bool {
        true
    }
    fn default_default_tag() -> String {
        "root".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let c = BuiltinConfig::default();
        c.validate().unwrap();
        assert_eq!(c.annotations.prefix, "x-");
        assert_eq!(c.operation_ids.style, IdStyle::Camel);
        assert!(c.tags.describe);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let c: BuiltinConfig = serde_json::from_str(
            r#"{"operationIds":{"style":"snake"},"annotations":{"exclude":["internal"]}}"#,
        )
        .unwrap();
        assert_eq!(c.operation_ids.style, IdStyle::Snake);
        assert_eq!(c.annotations.prefix, "x-");
        assert!(!c.annotations.admits("internal"));
        assert!(c.annotations.admits("rateLimit"));
        assert_eq!(c.tags.default_tag, "root");
    }

    #[test]
    fn bad_prefix_rejected() {
        let mut c = BuiltinConfig::default();
        c.annotations.prefix = "ext-".to_string();
        assert!(c.validate().is_err());
    }
}
