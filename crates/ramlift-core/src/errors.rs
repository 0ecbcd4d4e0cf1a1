//! Error types for ramlift-core.
//!
//! Every failure carries the `NodePath` at which it occurred. Resolution errors
//! (include, cycle, template, type, overlay, structure) are terminal: the
//! compilation aborts on the first one. `UnsupportedConstruct` is the only soft
//! error; the builder records it as a diagnostic unless strict mode is on.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::path::NodePath;

pub type RamliftResult<T> = Result<T, RamliftError>;

/// The graph in which an inheritance/reference cycle was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CycleKind {
    Include,
    Library,
    Extension,
    ResourceType,
    Type,
}

impl CycleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Include => "include",
            Self::Library => "library",
            Self::Extension => "extension",
            Self::ResourceType => "resource-type",
            Self::Type => "type",
        }
    }
}

impl fmt::Display for CycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Copyable error classification, for matching without destructuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Include,
    CircularInheritance,
    TemplateParameter,
    TypeResolution,
    OverlayMerge,
    Structure,
    UnsupportedConstruct,
    Plugin,
    InvalidArgument,
    Serialization,
    Invariant,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Include => "IncludeError",
            Self::CircularInheritance => "CircularInheritanceError",
            Self::TemplateParameter => "TemplateParameterError",
            Self::TypeResolution => "TypeResolutionError",
            Self::OverlayMerge => "OverlayMergeError",
            Self::Structure => "StructureError",
            Self::UnsupportedConstruct => "UnsupportedConstructError",
            Self::Plugin => "PluginError",
            Self::InvalidArgument => "InvalidArgument",
            Self::Serialization => "SerializationError",
            Self::Invariant => "InvariantError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum RamliftError {
    #[error("cannot include `{location}` at {path}: {reason}")]
    Include {
        location: String,
        reason: String,
        path: NodePath,
    },

    #[error("circular {kind} inheritance at {path}: {}", chain.join(" -> "))]
    CircularInheritance {
        kind: CycleKind,
        chain: Vec<String>,
        path: NodePath,
    },

    #[error("template `{template}` at {path}: {message}")]
    TemplateParameter {
        template: String,
        message: String,
        path: NodePath,
    },

    #[error("type resolution failed at {path}: {message}")]
    TypeResolution { message: String, path: NodePath },

    #[error("overlay merge failed at {path}: {message}")]
    OverlayMerge { message: String, path: NodePath },

    #[error("invalid document structure at {path}: {message}")]
    Structure { message: String, path: NodePath },

    #[error("unsupported construct at {path}: {message}")]
    UnsupportedConstruct { message: String, path: NodePath },

    #[error("plugin `{plugin}` failed at {path}: {message}")]
    Plugin {
        plugin: String,
        message: String,
        path: NodePath,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl RamliftError {
    pub fn include(location: impl Into<String>, reason: impl Into<String>, path: NodePath) -> Self {
        Self::Include {
            location: location.into(),
            reason: reason.into(),
            path,
        }
    }

    pub fn cycle(kind: CycleKind, chain: Vec<String>, path: NodePath) -> Self {
        Self::CircularInheritance { kind, chain, path }
    }

    pub fn template(template: impl Into<String>, message: impl Into<String>, path: NodePath) -> Self {
        Self::TemplateParameter {
            template: template.into(),
            message: message.into(),
            path,
        }
    }

    pub fn type_resolution(message: impl Into<String>, path: NodePath) -> Self {
        Self::TypeResolution {
            message: message.into(),
            path,
        }
    }

    pub fn overlay(message: impl Into<String>, path: NodePath) -> Self {
        Self::OverlayMerge {
            message: message.into(),
            path,
        }
    }

    pub fn structure(message: impl Into<String>, path: NodePath) -> Self {
        Self::Structure {
            message: message.into(),
            path,
        }
    }

    pub fn unsupported(message: impl Into<String>, path: NodePath) -> Self {
        Self::UnsupportedConstruct {
            message: message.into(),
            path,
        }
    }

    pub fn plugin(plugin: impl Into<String>, message: impl Into<String>, path: NodePath) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            message: message.into(),
            path,
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Include { .. } => ErrorKind::Include,
            Self::CircularInheritance { .. } => ErrorKind::CircularInheritance,
            Self::TemplateParameter { .. } => ErrorKind::TemplateParameter,
            Self::TypeResolution { .. } => ErrorKind::TypeResolution,
            Self::OverlayMerge { .. } => ErrorKind::OverlayMerge,
            Self::Structure { .. } => ErrorKind::Structure,
            Self::UnsupportedConstruct { .. } => ErrorKind::UnsupportedConstruct,
            Self::Plugin { .. } => ErrorKind::Plugin,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Invariant(_) => ErrorKind::Invariant,
        }
    }

    /// Node path at which the error occurred, if it is tied to one.
    pub fn path(&self) -> Option<&NodePath> {
        match self {
            Self::Include { path, .. }
            | Self::CircularInheritance { path, .. }
            | Self::TemplateParameter { path, .. }
            | Self::TypeResolution { path, .. }
            | Self::OverlayMerge { path, .. }
            | Self::Structure { path, .. }
            | Self::UnsupportedConstruct { path, .. }
            | Self::Plugin { path, .. } => Some(path),
            Self::InvalidArgument(_) | Self::Serialization(_) | Self::Invariant(_) => None,
        }
    }

    /// Cycle chain for `CircularInheritance` errors.
    pub fn chain(&self) -> Option<&[String]> {
        match self {
            Self::CircularInheritance { chain, .. } => Some(chain),
            _ => None,
        }
    }

    /// True for errors the builder may recover from by omitting a construct.
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::UnsupportedConstruct { .. })
    }
}

impl From<serde_json::Error> for RamliftError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_names_full_chain() {
        let e = RamliftError::cycle(
            CycleKind::Type,
            vec!["T1".into(), "T2".into(), "T1".into()],
            NodePath::root().child("types").child("T1"),
        );
        assert_eq!(e.kind(), ErrorKind::CircularInheritance);
        let s = e.to_string();
        assert!(s.contains("T1 -> T2 -> T1"));
        assert!(s.contains("#/types/T1"));
        assert_eq!(e.chain().map(|c| c.len()), Some(3));
    }

    #[test]
    fn only_unsupported_is_soft() {
        assert!(RamliftError::unsupported("x", NodePath::root()).is_soft());
        assert!(!RamliftError::structure("x", NodePath::root()).is_soft());
        assert!(RamliftError::invariant("x").path().is_none());
    }
}
