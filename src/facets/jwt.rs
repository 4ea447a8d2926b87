// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use super::facet_variant;
use crate::element::ElementRef;

/// A compact-serialised JWS. Header and body hold the decoded JSON text, the
/// signature the raw signature bytes.
#[derive(Debug, Clone)]
pub struct JwtFacet {
    pub header: ElementRef,
    pub body: ElementRef,
    pub signature: ElementRef,
}

facet_variant!(JwtFacet, Jwt, "Jwt" {
    fn children(&self) -> Vec<(String, ElementRef)> {
        vec![
            ("header".to_string(), self.header.clone()),
            ("body".to_string(), self.body.clone()),
            ("signature".to_string(), self.signature.clone()),
        ]
    }
});

/// Verification result attached to a JWT's signature element.
#[derive(Debug, Clone, PartialEq)]
pub struct JwtSignatureFacet {
    pub algorithm: String,
    /// Name of the key-store entry that verified the signature.
    pub verified_using: Option<String>,
}

impl JwtSignatureFacet {
    pub fn is_valid(&self) -> bool {
        self.verified_using.is_some()
    }
}

facet_variant!(JwtSignatureFacet, JwtSignature, "JwtSignature" {});

#[derive(Debug, Clone, PartialEq)]
pub struct JweEncryptionInfo {
    pub algorithm: String,
    pub encryption: String,
    /// Name of the key-store entry that decrypted the token.
    pub decrypted_using: Option<String>,
}

/// A compact-serialised JWE. `body` holds the plaintext and is absent when no
/// key in the store could decrypt the token.
#[derive(Debug, Clone)]
pub struct JweFacet {
    pub header: ElementRef,
    pub body: Option<ElementRef>,
    pub encryption_info: JweEncryptionInfo,
}

facet_variant!(JweFacet, Jwe, "Jwe" {
    fn children(&self) -> Vec<(String, ElementRef)> {
        let mut children = vec![("header".to_string(), self.header.clone())];
        if let Some(body) = &self.body {
            children.push(("body".to_string(), body.clone()));
        }
        children
    }
});
