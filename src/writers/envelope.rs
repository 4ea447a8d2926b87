// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};

use super::{unsupported, WriteContext};
use crate::crypto::aead::{self, NONCE_LEN};
use crate::crypto::{random_bytes, KeyMaterial};
use crate::element::ElementRef;
use crate::errors::{CryptoError, ModificationError};
use crate::facets::{AeadEnvelopeFacet, EnvelopeFlavor};
use crate::traits::ElementWriter;

/// Re-seals an envelope whose body changed. The prefix is kept. Keyed
/// envelopes get a fresh nonce; ephemeral ones keep theirs since the key is
/// bound to the sender's ephemeral public key.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvelopeWriter;

impl ElementWriter for EnvelopeWriter {
    fn name(&self) -> &'static str {
        "aead-envelope"
    }

    fn can_write(&self, parent: &ElementRef) -> bool {
        parent.has_facet::<AeadEnvelopeFacet>()
    }

    fn write(
        &self,
        parent: &ElementRef,
        old_child: &ElementRef,
        new_child: Bytes,
        ctx: &WriteContext<'_>,
    ) -> Result<Bytes, ModificationError> {
        let envelope = parent
            .facet::<AeadEnvelopeFacet>()
            .filter(|e| Arc::ptr_eq(&e.body, old_child))
            .ok_or_else(|| unsupported(self.name(), parent, old_child))?;
        let named = ctx
            .keys()
            .get(&envelope.key_name)
            .ok_or_else(|| ModificationError::KeyNotFound {
                key: envelope.key_name.clone(),
            })?;

        let (key, nonce) = match (envelope.flavor, &named.material) {
            (EnvelopeFlavor::Keyed, KeyMaterial::Symmetric { key, .. }) => {
                (*key, random_bytes::<NONCE_LEN>())
            }
            (EnvelopeFlavor::Ephemeral, KeyMaterial::X25519(secret)) => {
                let sender = aead::to_array::<32>(&envelope.prefix.content()[1..])
                    .ok_or_else(|| CryptoError::InvalidKeyMaterial("ephemeral public key".into()))?;
                let nonce = aead::to_array::<NONCE_LEN>(envelope.nonce.content())
                    .ok_or_else(|| CryptoError::InvalidKeyMaterial("envelope nonce".into()))?;
                (aead::derive_envelope_key(secret, sender)?, nonce)
            }
            (_, other) => {
                return Err(CryptoError::InvalidKeyMaterial(format!(
                    "{} key cannot seal a {:?} envelope",
                    other.kind(),
                    envelope.flavor
                ))
                .into())
            }
        };

        let sealed = aead::seal(&key, &nonce, &new_child, &[])?;
        let mut out = BytesMut::with_capacity(envelope.prefix.len() + NONCE_LEN + sealed.len());
        out.put_slice(envelope.prefix.content());
        out.put_slice(&nonce);
        out.put_slice(&sealed);
        Ok(out.freeze())
    }
}
