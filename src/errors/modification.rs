// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use super::{ConversionError, CryptoError};

/// Path or condition expressions the default evaluators cannot handle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathError {
    #[error("path must start with '$': {0}")]
    MissingRoot(String),

    #[error("unexpected '{found}' at offset {offset} in path '{path}'")]
    Syntax {
        path: String,
        offset: usize,
        found: char,
    },

    #[error("unsupported path feature in '{0}'")]
    Unsupported(String),

    #[error("invalid condition '{expression}': {reason}")]
    Condition { expression: String, reason: String },
}

/// Reasons a single modification could not be applied.
///
/// Every variant aborts only the modification that raised it; the rest of the
/// registry is still evaluated for the message.
#[derive(Error, Debug)]
pub enum ModificationError {
    /// An ancestor of the target carries no facet any writer understands.
    #[error("no writer for element with facets [{}]", .facets.join(", "))]
    NoWriterForFacet { facets: Vec<&'static str> },

    /// No private key is available to produce a valid signature.
    #[error("cannot produce a valid signature: {reason}")]
    InvalidSignature { reason: String },

    /// A key was requested by name but is not in the key store.
    #[error("key '{key}' not found")]
    KeyNotFound { key: String },

    #[error("invalid target path: {0}")]
    InvalidPath(#[from] PathError),

    #[error("invalid regex filter '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    /// Encryption or decryption failed while rebuilding an encrypted parent.
    #[error("crypto failure: {0}")]
    Crypto(#[from] CryptoError),

    /// The writer claims the parent but cannot rewrite that particular child.
    #[error("{writer} cannot rewrite child '{child}'")]
    UnsupportedTarget { writer: &'static str, child: String },

    /// The rewritten root no longer converts.
    #[error("rewritten message failed to convert: {0}")]
    Reconversion(#[from] ConversionError),
}
