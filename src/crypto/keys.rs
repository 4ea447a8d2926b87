// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

use ed25519_dalek::{SigningKey, VerifyingKey};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

/// One kind of key the codecs know how to use.
#[derive(Clone)]
pub enum KeyMaterial {
    /// HS256/384/512 shared secret.
    Hmac(Vec<u8>),
    /// EdDSA key. Without the signing half it can verify but not re-sign.
    Ed25519 {
        signing: Option<SigningKey>,
        verifying: VerifyingKey,
    },
    /// Static X25519 secret for ECDH-ES tokens and ephemeral envelopes.
    X25519(StaticSecret),
    /// 32-byte ChaCha20-Poly1305 key, optionally addressable by a 32-byte key id.
    Symmetric {
        key: [u8; 32],
        key_id: Option<[u8; 32]>,
    },
}

impl KeyMaterial {
    pub fn ed25519_signing(secret: [u8; 32]) -> Self {
        let signing = SigningKey::from_bytes(&secret);
        let verifying = signing.verifying_key();
        KeyMaterial::Ed25519 {
            signing: Some(signing),
            verifying,
        }
    }

    pub fn x25519(secret: [u8; 32]) -> Self {
        KeyMaterial::X25519(StaticSecret::from(secret))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            KeyMaterial::Hmac(_) => "hmac",
            KeyMaterial::Ed25519 { .. } => "ed25519",
            KeyMaterial::X25519(_) => "x25519",
            KeyMaterial::Symmetric { .. } => "symmetric",
        }
    }

    pub fn x25519_public(&self) -> Option<X25519PublicKey> {
        match self {
            KeyMaterial::X25519(secret) => Some(X25519PublicKey::from(secret)),
            _ => None,
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMaterial::Ed25519 { signing, verifying } => f
                .debug_struct("Ed25519")
                .field("public", &hex::encode(verifying.as_bytes()))
                .field("can_sign", &signing.is_some())
                .finish(),
            KeyMaterial::Symmetric { key_id, .. } => f
                .debug_struct("Symmetric")
                .field("key_id", &key_id.map(hex::encode))
                .finish(),
            other => write!(f, "{}", other.kind()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NamedKey {
    pub name: String,
    pub material: KeyMaterial,
}

/// Named keys used to verify, decrypt, re-sign and re-encrypt.
///
/// Lookups preserve insertion order, so when several keys could open a token
/// the first configured one is reported.
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    keys: Vec<NamedKey>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key; a key with the same name is replaced in place.
    pub fn insert(&mut self, name: impl Into<String>, material: KeyMaterial) {
        let name = name.into();
        match self.keys.iter_mut().find(|k| k.name == name) {
            Some(existing) => existing.material = material,
            None => self.keys.push(NamedKey { name, material }),
        }
    }

    pub fn with_key(mut self, name: impl Into<String>, material: KeyMaterial) -> Self {
        self.insert(name, material);
        self
    }

    pub fn get(&self, name: &str) -> Option<&NamedKey> {
        self.keys.iter().find(|k| k.name == name)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedKey> {
        self.keys.iter()
    }

    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a NamedKey> + 'a {
        self.keys.iter().filter(move |k| k.material.kind() == kind)
    }

    /// Symmetric key registered under the given 32-byte key id.
    pub fn by_key_id(&self, key_id: &[u8]) -> Option<&NamedKey> {
        self.keys.iter().find(|k| match &k.material {
            KeyMaterial::Symmetric { key_id: Some(id), .. } => id.as_slice() == key_id,
            _ => false,
        })
    }
}
