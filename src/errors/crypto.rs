// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Failures of the signing and encryption helpers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CryptoError {
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("unsupported algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
}
