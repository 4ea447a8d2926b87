// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use super::facet_variant;
use crate::element::ElementRef;

/// Fixed layouts of the AEAD transport envelopes.
///
/// ```text
/// Keyed:     [key id: 32][nonce: 12][ciphertext || tag: 16]
/// Ephemeral: [0x01][ephemeral X25519 public key: 32][nonce: 12][ciphertext || tag: 16]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeFlavor {
    Keyed,
    Ephemeral,
}

impl EnvelopeFlavor {
    /// Length of everything before the nonce.
    pub fn prefix_len(&self) -> usize {
        match self {
            EnvelopeFlavor::Keyed => 32,
            EnvelopeFlavor::Ephemeral => 33,
        }
    }

    pub fn prefix_key(&self) -> &'static str {
        match self {
            EnvelopeFlavor::Keyed => "keyId",
            EnvelopeFlavor::Ephemeral => "ephemeralPublicKey",
        }
    }
}

/// A decrypted envelope. Only attached when the tag authenticated.
#[derive(Debug, Clone)]
pub struct AeadEnvelopeFacet {
    pub flavor: EnvelopeFlavor,
    pub prefix: ElementRef,
    pub nonce: ElementRef,
    pub body: ElementRef,
    /// Key-store entry that opened the envelope.
    pub key_name: String,
}

facet_variant!(AeadEnvelopeFacet, AeadEnvelope, "AeadEnvelope" {
    fn children(&self) -> Vec<(String, ElementRef)> {
        vec![
            (self.flavor.prefix_key().to_string(), self.prefix.clone()),
            ("nonce".to_string(), self.nonce.clone()),
            ("body".to_string(), self.body.clone()),
        ]
    }
});
