// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised while turning raw bytes into an element tree.

use thiserror::Error;

/// Failure of a single decoder on a single element.
///
/// Decoder errors never cross element boundaries: the converter decides, per
/// lenient/strict mode, whether the element keeps being processed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    /// The content announced a structure but breaks it (bad chunk size, body past
    /// the end of the buffer, unterminated header block).
    #[error("{decoder}: malformed structure: {reason}")]
    StructuralParse { decoder: &'static str, reason: String },

    /// A content or transfer coding token nobody knows how to undo.
    #[error("unsupported encoding '{token}'")]
    UnsupportedEncoding { token: String },

    /// A facet from an exclusive group was added twice.
    #[error("facet {adding} conflicts with existing facet {existing}")]
    FacetConflict {
        adding: &'static str,
        existing: &'static str,
    },
}

impl ConversionError {
    pub fn structural(decoder: &'static str, reason: impl Into<String>) -> Self {
        ConversionError::StructuralParse {
            decoder,
            reason: reason.into(),
        }
    }

    /// Whether lenient mode may downgrade this error to a note.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ConversionError::StructuralParse { .. })
    }
}

pub type ConversionResult<T> = Result<T, ConversionError>;

/// A consumer asked an element for a facet it does not carry.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("facet {requested} not found; element carries [{}]", .present.join(", "))]
pub struct FacetNotFoundError {
    pub requested: &'static str,
    pub present: Vec<&'static str>,
}
