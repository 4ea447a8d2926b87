// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Key material and the primitives the JOSE and envelope codecs are built on.
//!
//! Everything here is synchronous and allocation-light; the key store is
//! read-only once built and shared behind an `Arc`.

pub mod aead;
pub mod jose;
mod keys;

pub use keys::{KeyMaterial, KeyStore, NamedKey};

use rand::RngCore;

/// Fresh random bytes for nonces, IVs and ephemeral secrets.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}
