// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for structured logging, one module per subsystem.

pub mod conversion;
pub mod modification;
pub mod validation;

use tracing::Span;

/// Emit a message as a `tracing` event, or open a span carrying its fields.
pub trait StructuredLog {
    fn log(&self);

    fn span(&self, name: &str) -> Span;
}
