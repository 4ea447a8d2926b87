// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for converter runs.
//!
//! This module contains message types for logging events related to:
//! * Conversion start and completion
//! * Plugins converting, skipping or failing on an element

use std::fmt::{Display, Formatter};
use std::time::Duration;

use tracing::Span;

use crate::errors::ConversionError;
use crate::observability::messages::StructuredLog;
use crate::traits::SkipReason;

/// A converter run started on an entry element.
///
/// # Log Level
/// `debug!` - Runs once per message
///
/// # Example
/// ```
/// use wiretree::observability::messages::conversion::ConversionStarted;
///
/// let msg = ConversionStarted {
///     content_length: 512,
///     lenient: true,
///     plugin_count: 7,
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct ConversionStarted {
    pub content_length: usize,
    pub lenient: bool,
    pub plugin_count: usize,
}

impl Display for ConversionStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Converting {} bytes with {} plugins ({})",
            self.content_length,
            self.plugin_count,
            if self.lenient { "lenient" } else { "strict" }
        )
    }
}

impl StructuredLog for ConversionStarted {
    fn log(&self) {
        tracing::debug!(
            content_length = self.content_length,
            lenient = self.lenient,
            plugin_count = self.plugin_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "conversion",
            span_name = name,
            content_length = self.content_length,
            lenient = self.lenient,
        )
    }
}

/// The work queue drained.
///
/// # Log Level
/// `debug!` - Runs once per message
pub struct ConversionCompleted {
    pub elements: usize,
    pub duration: Duration,
}

impl Display for ConversionCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Conversion finished: {} elements in {:?}",
            self.elements, self.duration
        )
    }
}

impl StructuredLog for ConversionCompleted {
    fn log(&self) {
        tracing::debug!(
            elements = self.elements,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "conversion_completed",
            span_name = name,
            elements = self.elements,
        )
    }
}

/// A plugin attached facets to an element.
///
/// # Log Level
/// `trace!` - Fires for every recognised structure
pub struct PluginConverted<'a> {
    pub plugin_id: &'a str,
    pub depth: usize,
    pub children: usize,
}

impl Display for PluginConverted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Plugin '{}' converted element at depth {} ({} children queued)",
            self.plugin_id, self.depth, self.children
        )
    }
}

impl StructuredLog for PluginConverted<'_> {
    fn log(&self) {
        tracing::trace!(
            plugin_id = self.plugin_id,
            depth = self.depth,
            children = self.children,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!(
            "plugin",
            span_name = name,
            plugin_id = self.plugin_id,
            depth = self.depth,
        )
    }
}

/// A plugin declined an element it would otherwise handle.
///
/// # Log Level
/// `info!` - Content was left unstructured on purpose
///
/// # Example
/// ```
/// use wiretree::observability::messages::conversion::PluginSkipped;
/// use wiretree::traits::SkipReason;
///
/// let reason = SkipReason::ContentTooLarge { size: 20, limit: 10 };
/// let msg = PluginSkipped {
///     plugin_id: "json",
///     reason: &reason,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct PluginSkipped<'a> {
    pub plugin_id: &'a str,
    pub reason: &'a SkipReason,
}

impl Display for PluginSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.reason {
            SkipReason::ContentTooLarge { size, limit } => write!(
                f,
                "Plugin '{}' skipped {} bytes (limit {})",
                self.plugin_id, size, limit
            ),
        }
    }
}

impl StructuredLog for PluginSkipped<'_> {
    fn log(&self) {
        tracing::info!(
            plugin_id = self.plugin_id,
            reason = ?self.reason,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "plugin_skipped",
            span_name = name,
            plugin_id = self.plugin_id,
        )
    }
}

/// A plugin returned an error for an element.
///
/// # Log Level
/// `error!` when the element stops, `warn!` when lenient mode recovers
pub struct PluginFailed<'a> {
    pub plugin_id: &'a str,
    pub error: &'a ConversionError,
    pub fatal: bool,
}

impl Display for PluginFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Plugin '{}' failed{}: {}",
            self.plugin_id,
            if self.fatal { "" } else { " (recovered)" },
            self.error
        )
    }
}

impl StructuredLog for PluginFailed<'_> {
    fn log(&self) {
        if self.fatal {
            tracing::error!(
                plugin_id = self.plugin_id,
                error = %self.error,
                "{}", self
            );
        } else {
            tracing::warn!(
                plugin_id = self.plugin_id,
                error = %self.error,
                "{}", self
            );
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "plugin_failed",
            span_name = name,
            plugin_id = self.plugin_id,
            fatal = self.fatal,
        )
    }
}
