// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for startup: configuration loading and plugin graph resolution.

use std::fmt::{Display, Formatter};

use tracing::Span;

use crate::errors::ValidationError;
use crate::observability::messages::StructuredLog;

/// Configuration file parsed.
///
/// # Log Level
/// `info!` - Startup event
///
/// # Example
/// ```
/// use wiretree::observability::messages::validation::ConfigLoaded;
///
/// let msg = ConfigLoaded {
///     path: "wiretree.yaml",
///     keys: 2,
///     modifications: 1,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ConfigLoaded<'a> {
    pub path: &'a str,
    pub keys: usize,
    pub modifications: usize,
}

impl Display for ConfigLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Loaded configuration from {}: {} keys, {} modifications",
            self.path, self.keys, self.modifications
        )
    }
}

impl StructuredLog for ConfigLoaded<'_> {
    fn log(&self) {
        tracing::info!(
            path = self.path,
            keys = self.keys,
            modifications = self.modifications,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("config", span_name = name, path = self.path)
    }
}

/// Plugin pipeline validated and ordered.
///
/// # Log Level
/// `info!` - Startup event
pub struct PipelineResolved<'a> {
    pub order: &'a [&'a str],
}

impl Display for PipelineResolved<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Plugin pipeline resolved: {}", self.order.join(" -> "))
    }
}

impl StructuredLog for PipelineResolved<'_> {
    fn log(&self) {
        tracing::info!(
            order = self.order.join(" -> "),
            plugin_count = self.order.len(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "pipeline",
            span_name = name,
            plugin_count = self.order.len(),
        )
    }
}

/// Plugin graph rejected.
///
/// # Log Level
/// `error!` - The runtime cannot start
pub struct PipelineValidationFailed<'a> {
    pub errors: &'a [ValidationError],
}

impl Display for PipelineValidationFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let rendered: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(
            f,
            "Plugin pipeline invalid ({} errors): {}",
            self.errors.len(),
            rendered.join("; ")
        )
    }
}

impl StructuredLog for PipelineValidationFailed<'_> {
    fn log(&self) {
        tracing::error!(error_count = self.errors.len(), "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "pipeline_invalid",
            span_name = name,
            error_count = self.errors.len(),
        )
    }
}
