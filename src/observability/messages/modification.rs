// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the modification registry and the modifier.

use std::fmt::{Display, Formatter};

use tracing::Span;

use crate::errors::ModificationError;
use crate::observability::messages::StructuredLog;

/// A modification was added to (or replaced in) the registry.
///
/// # Log Level
/// `info!` - Changes what happens to future messages
///
/// # Example
/// ```
/// use wiretree::observability::messages::modification::ModificationRegistered;
///
/// let msg = ModificationRegistered {
///     name: "swap-host",
///     target: "$.header.Host",
///     remaining: Some(3),
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ModificationRegistered<'a> {
    pub name: &'a str,
    pub target: &'a str,
    pub remaining: Option<u32>,
}

impl Display for ModificationRegistered<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.remaining {
            Some(n) => write!(
                f,
                "Registered modification '{}' on {} ({} executions)",
                self.name, self.target, n
            ),
            None => write!(
                f,
                "Registered modification '{}' on {} (unbounded)",
                self.name, self.target
            ),
        }
    }
}

impl StructuredLog for ModificationRegistered<'_> {
    fn log(&self) {
        tracing::info!(
            name = self.name,
            target = self.target,
            remaining = ?self.remaining,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "modification_registered",
            span_name = name,
            modification = self.name,
        )
    }
}

/// A modification changed the message.
///
/// # Log Level
/// `info!` - The message on the wire differs from what was captured
pub struct ModificationApplied<'a> {
    pub name: &'a str,
    pub target: &'a str,
    pub old_length: usize,
    pub new_length: usize,
}

impl Display for ModificationApplied<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Applied modification '{}' at {}: {} -> {} bytes",
            self.name, self.target, self.old_length, self.new_length
        )
    }
}

impl StructuredLog for ModificationApplied<'_> {
    fn log(&self) {
        tracing::info!(
            name = self.name,
            target = self.target,
            old_length = self.old_length,
            new_length = self.new_length,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "modification",
            span_name = name,
            modification = self.name,
            target = self.target,
        )
    }
}

/// Condition false, no target, or nothing to change.
///
/// # Log Level
/// `debug!` - Normal for most messages
pub struct ModificationNotApplicable<'a> {
    pub name: &'a str,
    pub target: &'a str,
}

impl Display for ModificationNotApplicable<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Modification '{}' did not apply to {}",
            self.name, self.target
        )
    }
}

impl StructuredLog for ModificationNotApplicable<'_> {
    fn log(&self) {
        tracing::debug!(name = self.name, target = self.target, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("modification_skipped", span_name = name, modification = self.name)
    }
}

/// A modification failed; the rest of the pass continues.
///
/// # Log Level
/// `warn!` - The message went out unmodified by this entry
pub struct ModificationFailed<'a> {
    pub name: &'a str,
    pub error: &'a ModificationError,
}

impl Display for ModificationFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Modification '{}' failed: {}", self.name, self.error)
    }
}

impl StructuredLog for ModificationFailed<'_> {
    fn log(&self) {
        tracing::warn!(name = self.name, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("modification_failed", span_name = name, modification = self.name)
    }
}

/// The last execution of a modification was spent and the entry removed.
///
/// # Log Level
/// `info!`
pub struct ModificationExpired<'a> {
    pub name: &'a str,
}

impl Display for ModificationExpired<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Modification '{}' exhausted and removed", self.name)
    }
}

impl StructuredLog for ModificationExpired<'_> {
    fn log(&self) {
        tracing::info!(name = self.name, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("modification_expired", span_name = name, modification = self.name)
    }
}
