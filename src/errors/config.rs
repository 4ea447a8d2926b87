// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use thiserror::Error;

use crate::engine::Phase;

/// Errors that can occur during plugin dependency graph validation
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A circular dependency was detected in the plugin graph
    CyclicDependency {
        /// The cycle path showing the circular dependency
        cycle: Vec<String>,
    },
    /// A plugin references a dependency that isn't registered
    UnresolvedDependency {
        /// The plugin that has the unresolved dependency
        plugin_id: String,
        /// The dependency that couldn't be resolved
        missing_dependency: String,
    },
    /// Two plugins were registered under the same id
    DuplicatePluginId {
        /// The duplicate plugin ID
        plugin_id: String,
    },
    /// A plugin depends on a plugin that runs in a later phase
    PhaseInversion {
        plugin_id: String,
        phase: Phase,
        dependency: String,
        dependency_phase: Phase,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::CyclicDependency { cycle } => {
                write!(f, "Cyclic dependency detected: {}", cycle.join(" -> "))
            }
            ValidationError::UnresolvedDependency {
                plugin_id,
                missing_dependency,
            } => {
                write!(
                    f,
                    "Plugin '{}' depends on '{}' which is not registered",
                    plugin_id, missing_dependency
                )
            }
            ValidationError::DuplicatePluginId { plugin_id } => {
                write!(f, "Duplicate plugin ID: '{}'", plugin_id)
            }
            ValidationError::PhaseInversion {
                plugin_id,
                phase,
                dependency,
                dependency_phase,
            } => {
                write!(
                    f,
                    "Plugin '{}' ({:?}) depends on '{}' which runs later ({:?})",
                    plugin_id, phase, dependency, dependency_phase
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors raised while loading or interpreting a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File I/O error while reading the configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The YAML document could not be parsed into a configuration.
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A key entry carries malformed or missing material.
    #[error("Invalid key '{name}': {reason}")]
    InvalidKey { name: String, reason: String },

    /// A modification entry cannot be registered.
    #[error("Invalid modification '{name}': {reason}")]
    InvalidModification { name: String, reason: String },

    /// The plugin pipeline failed validation.
    #[error("Plugin graph is invalid: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    InvalidPipeline(Vec<ValidationError>),
}
