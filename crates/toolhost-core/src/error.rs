//! Error taxonomy for plugin discovery and tool registration.
//!
//! Every [`LoadError`] is scoped to a single archive or plugin: the manager logs
//! it, records the terminal state, and moves on to the next archive.

use std::path::PathBuf;

use thiserror::Error;

use crate::capability::CapabilityViolation;
use crate::manager::PluginState;

/// Malformed version or constraint text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid version '{input}': expected major.minor.patch")]
    InvalidVersion { input: String },

    #[error("invalid version component '{component}'")]
    InvalidComponent { component: String },

    #[error("unknown operator '{operator}' in constraint clause '{clause}'")]
    UnknownOperator { operator: String, clause: String },

    #[error("empty clause in version constraint")]
    EmptyClause,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool '{name}' is already registered by plugin '{owner}'")]
    DuplicateTool { name: String, owner: String },
}

/// Reasons a single archive or plugin is removed from consideration.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no {descriptor} descriptor in {}", .path.display())]
    ManifestNotFound {
        path: PathBuf,
        descriptor: &'static str,
    },

    #[error("invalid manifest in {}: {message}", .path.display())]
    ManifestInvalid { path: PathBuf, message: String },

    #[error("plugin id '{id}' is already loaded")]
    DuplicatePlugin { id: String },

    #[error("plugin '{id}' version check failed: {message}")]
    RejectedVersion { id: String, message: String },

    #[error(transparent)]
    RejectedCapability(#[from] CapabilityViolation),

    #[error("plugin '{id}' names unknown implementation '{implementation}'")]
    RejectedFactory { id: String, implementation: String },

    #[error("plugin '{id}' failed to initialise: {message}")]
    InitFailed { id: String, message: String },

    #[error("plugin '{id}' tool registration aborted: {source}")]
    DuplicateTool {
        id: String,
        #[source]
        source: RegistryError,
    },
}

impl LoadError {
    /// Terminal state reached by the plugin that produced this error.
    pub fn state(&self) -> PluginState {
        match self {
            LoadError::ManifestNotFound { .. }
            | LoadError::ManifestInvalid { .. }
            | LoadError::DuplicatePlugin { .. } => PluginState::RejectedManifest,
            LoadError::RejectedVersion { .. } => PluginState::RejectedVersion,
            LoadError::RejectedCapability(_) => PluginState::RejectedCapability,
            LoadError::RejectedFactory { .. } => PluginState::RejectedFactory,
            LoadError::InitFailed { .. } => PluginState::InitFailed,
            LoadError::DuplicateTool { .. } => PluginState::RejectedTools,
        }
    }

    pub(crate) fn invalid(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        LoadError::ManifestInvalid {
            path: path.into(),
            message: message.into(),
        }
    }
}
