// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! ChaCha20-Poly1305 helpers shared by the envelope and JWE codecs.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

use crate::errors::CryptoError;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// HKDF info string binding derived keys to the ephemeral envelope layout.
pub const ENVELOPE_INFO: &[u8] = b"wiretree-envelope-v1";

/// Encrypt and append the tag.
pub fn seal(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = ChaCha20Poly1305::new(key.into());
    cipher
        .encrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::Encrypt(e.to_string()))
}

/// Decrypt `ciphertext || tag`. `None` when the tag does not authenticate.
pub fn open(key: &[u8; KEY_LEN], nonce: &[u8], sealed: &[u8], aad: &[u8]) -> Option<Vec<u8>> {
    if nonce.len() != NONCE_LEN || sealed.len() < TAG_LEN {
        return None;
    }
    let cipher = ChaCha20Poly1305::new(key.into());
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: sealed, aad })
        .ok()
}

/// Envelope key for an ephemeral sender: HKDF-SHA256 over the X25519 shared secret.
pub fn derive_envelope_key(
    recipient: &StaticSecret,
    ephemeral_public: [u8; 32],
) -> Result<[u8; KEY_LEN], CryptoError> {
    let shared = recipient.diffie_hellman(&X25519PublicKey::from(ephemeral_public));
    let hkdf = Hkdf::<Sha256>::new(None, shared.as_bytes());
    let mut key = [0u8; KEY_LEN];
    hkdf.expand(ENVELOPE_INFO, &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

pub fn to_array<const N: usize>(bytes: &[u8]) -> Option<[u8; N]> {
    bytes.try_into().ok()
}
