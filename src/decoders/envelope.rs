// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Binary ChaCha20-Poly1305 envelopes.
//!
//! Two layouts are recognised:
//!
//! * keyed: `[key id: 32][nonce: 12][ciphertext || tag]`
//! * ephemeral: `[0x01][sender X25519 public: 32][nonce: 12][ciphertext || tag]`
//!
//! An envelope is only claimed once a key authenticates it; random binary
//! content that happens to be long enough is left alone.

use bytes::Bytes;

use crate::crypto::aead::{self, NONCE_LEN, TAG_LEN};
use crate::crypto::{KeyMaterial, KeyStore};
use crate::element::{Element, ElementRef};
use crate::engine::{ConversionContext, Phase};
use crate::errors::ConversionError;
use crate::facets::{AeadEnvelopeFacet, EnvelopeFlavor};
use crate::traits::{ConversionPlugin, PluginOutcome};

pub const ID: &str = "aead-envelope";

/// Leading byte of the ephemeral layout.
pub const EPHEMERAL_MARKER: u8 = 0x01;

#[derive(Debug, Default, Clone, Copy)]
pub struct EnvelopeDecoder;

impl ConversionPlugin for EnvelopeDecoder {
    fn id(&self) -> &'static str {
        ID
    }

    fn phase(&self) -> Phase {
        Phase::ProtocolParsing
    }

    fn priority(&self) -> i32 {
        20
    }

    fn convert(
        &self,
        element: &ElementRef,
        ctx: &mut ConversionContext<'_>,
    ) -> Result<PluginOutcome, ConversionError> {
        let content = element.content();
        if content.len() < EnvelopeFlavor::Keyed.prefix_len() + NONCE_LEN + TAG_LEN {
            return Ok(PluginOutcome::NotApplicable);
        }
        if let Some(skip) = ctx.size_guard(content.len()) {
            return Ok(skip);
        }

        let opened = open_ephemeral(content, ctx.keys())
            .map(|(name, plain)| (EnvelopeFlavor::Ephemeral, name, plain))
            .or_else(|| {
                open_keyed(content, ctx.keys()).map(|(name, plain)| (EnvelopeFlavor::Keyed, name, plain))
            });
        let Some((flavor, key_name, plaintext)) = opened else {
            return Ok(PluginOutcome::NotApplicable);
        };

        let nonce_start = flavor.prefix_len();
        let prefix = Element::new_child(content.slice(..nonce_start), element);
        let nonce = Element::new_child(content.slice(nonce_start..nonce_start + NONCE_LEN), element);
        let body = Element::new_child(Bytes::from(plaintext), element);
        ctx.queue(body.clone());

        element.add_facet(AeadEnvelopeFacet {
            flavor,
            prefix,
            nonce,
            body,
            key_name,
        })?;
        element.set_used_bytes(content.len());
        Ok(PluginOutcome::Converted)
    }
}

fn split(content: &[u8], prefix_len: usize) -> Option<(&[u8], &[u8], &[u8])> {
    if content.len() < prefix_len + NONCE_LEN + TAG_LEN {
        return None;
    }
    let (prefix, rest) = content.split_at(prefix_len);
    let (nonce, sealed) = rest.split_at(NONCE_LEN);
    Some((prefix, nonce, sealed))
}

fn open_ephemeral(content: &[u8], keys: &KeyStore) -> Option<(String, Vec<u8>)> {
    if content.first() != Some(&EPHEMERAL_MARKER) {
        return None;
    }
    let (prefix, nonce, sealed) = split(content, EnvelopeFlavor::Ephemeral.prefix_len())?;
    let sender: [u8; 32] = aead::to_array(&prefix[1..])?;
    keys.iter().find_map(|k| match &k.material {
        KeyMaterial::X25519(secret) => {
            let key = aead::derive_envelope_key(secret, sender).ok()?;
            aead::open(&key, nonce, sealed, &[]).map(|plain| (k.name.clone(), plain))
        }
        _ => None,
    })
}

fn open_keyed(content: &[u8], keys: &KeyStore) -> Option<(String, Vec<u8>)> {
    let (key_id, nonce, sealed) = split(content, EnvelopeFlavor::Keyed.prefix_len())?;
    let named = keys.by_key_id(key_id)?;
    match &named.material {
        KeyMaterial::Symmetric { key, .. } => {
            aead::open(key, nonce, sealed, &[]).map(|plain| (named.name.clone(), plain))
        }
        _ => None,
    }
}
