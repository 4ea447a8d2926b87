// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use regex::Regex;
use serde_json::Value;

use super::{pick, unsupported, WriteContext};
use crate::crypto::aead::{self, NONCE_LEN, TAG_LEN};
use crate::crypto::jose::{b64_encode, sender_content_key, sign, JweAlgorithm, JwsAlgorithm, JWE_ENC_C20P};
use crate::crypto::random_bytes;
use crate::element::ElementRef;
use crate::errors::{CryptoError, ModificationError};
use crate::facets::{JweFacet, JwtFacet, JwtSignatureFacet};
use crate::traits::ElementWriter;

/// Writing `SIGN_WITH_KEY(name)` to a JWT signature re-signs with that key.
pub const SIGN_WITH_KEY: &str = "SIGN_WITH_KEY";

fn sign_with_key() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^SIGN_WITH_KEY\(([^()]+)\)$").expect("sign-with-key pattern is valid")
    })
}

fn header_alg(header: &[u8]) -> Option<String> {
    let header: Value = serde_json::from_slice(header).ok()?;
    header.get("alg")?.as_str().map(str::to_string)
}

/// Compact JWS. Header or body changes are re-signed with the key that
/// verified the original signature.
#[derive(Debug, Default, Clone, Copy)]
pub struct JwtWriter;

impl JwtWriter {
    fn sign_with(
        ctx: &WriteContext<'_>,
        key: &str,
        alg: &str,
        input: &str,
    ) -> Result<Vec<u8>, ModificationError> {
        let named = ctx.keys().get(key).ok_or_else(|| ModificationError::KeyNotFound {
            key: key.to_string(),
        })?;
        let alg = JwsAlgorithm::parse(alg)
            .ok_or_else(|| CryptoError::UnsupportedAlgorithm(alg.to_string()))?;
        sign(alg, &named.material, input.as_bytes()).map_err(|e| match e {
            CryptoError::InvalidKeyMaterial(reason) => ModificationError::InvalidSignature { reason },
            other => ModificationError::Crypto(other),
        })
    }
}

impl ElementWriter for JwtWriter {
    fn name(&self) -> &'static str {
        "jwt"
    }

    fn can_write(&self, parent: &ElementRef) -> bool {
        parent.has_facet::<JwtFacet>()
    }

    fn write(
        &self,
        parent: &ElementRef,
        old_child: &ElementRef,
        new_child: Bytes,
        ctx: &WriteContext<'_>,
    ) -> Result<Bytes, ModificationError> {
        let jwt = parent
            .facet::<JwtFacet>()
            .ok_or_else(|| unsupported(self.name(), parent, old_child))?;
        let signature = jwt
            .signature
            .facet::<JwtSignatureFacet>()
            .ok_or_else(|| unsupported(self.name(), parent, old_child))?;

        let header = pick(&jwt.header, old_child, &new_child);
        let body = pick(&jwt.body, old_child, &new_child);
        let input = format!("{}.{}", b64_encode(&header), b64_encode(&body));
        let alg = header_alg(&header).unwrap_or_else(|| signature.algorithm.clone());

        let signature_bytes = if Arc::ptr_eq(&jwt.signature, old_child) {
            let requested = String::from_utf8_lossy(&new_child).into_owned();
            match sign_with_key().captures(requested.trim()) {
                Some(caps) => Self::sign_with(ctx, &caps[1], &alg, &input)?,
                None => new_child.to_vec(),
            }
        } else if Arc::ptr_eq(&jwt.header, old_child) || Arc::ptr_eq(&jwt.body, old_child) {
            let key = signature.verified_using.as_deref().ok_or_else(|| {
                ModificationError::InvalidSignature {
                    reason: format!("no key in the store verified the original {} signature", signature.algorithm),
                }
            })?;
            Self::sign_with(ctx, key, &alg, &input)?
        } else {
            return Err(unsupported(self.name(), parent, old_child));
        };

        Ok(Bytes::from(format!("{}.{}", input, b64_encode(&signature_bytes))))
    }
}

/// Compact JWE. The new token is addressed to the key that decrypted the
/// original, with a fresh IV (and a fresh ephemeral key for ECDH-ES).
#[derive(Debug, Default, Clone, Copy)]
pub struct JweWriter;

impl ElementWriter for JweWriter {
    fn name(&self) -> &'static str {
        "jwe"
    }

    fn can_write(&self, parent: &ElementRef) -> bool {
        parent.has_facet::<JweFacet>()
    }

    fn write(
        &self,
        parent: &ElementRef,
        old_child: &ElementRef,
        new_child: Bytes,
        ctx: &WriteContext<'_>,
    ) -> Result<Bytes, ModificationError> {
        let jwe = parent
            .facet::<JweFacet>()
            .ok_or_else(|| unsupported(self.name(), parent, old_child))?;
        let Some(body) = jwe.body.as_ref() else {
            return Err(unsupported(self.name(), parent, old_child));
        };
        let key_name = jwe
            .encryption_info
            .decrypted_using
            .as_deref()
            .ok_or_else(|| unsupported(self.name(), parent, old_child))?;
        let named = ctx.keys().get(key_name).ok_or_else(|| ModificationError::KeyNotFound {
            key: key_name.to_string(),
        })?;

        let header_changed = Arc::ptr_eq(&jwe.header, old_child);
        let plaintext = pick(body, old_child, &new_child);
        let header_bytes = pick(&jwe.header, old_child, &new_child);
        let mut header: Value = serde_json::from_slice(&header_bytes)
            .map_err(|e| CryptoError::InvalidKeyMaterial(format!("JWE header is not JSON: {}", e)))?;
        let alg_text = header.get("alg").and_then(Value::as_str).unwrap_or_default().to_string();
        let enc = header.get("enc").and_then(Value::as_str).unwrap_or_default().to_string();
        let alg = JweAlgorithm::parse(&alg_text)
            .ok_or_else(|| CryptoError::UnsupportedAlgorithm(alg_text.clone()))?;
        if enc != JWE_ENC_C20P {
            return Err(CryptoError::UnsupportedAlgorithm(enc).into());
        }

        let cek = sender_content_key(alg, &enc, &mut header, &named.material)?;
        let encoded_header = match alg {
            // The protected header is the AAD; keep its exact encoding when untouched.
            JweAlgorithm::Direct if !header_changed => {
                let original = parent.content();
                let end = original.iter().position(|b| *b == b'.').unwrap_or(original.len());
                String::from_utf8_lossy(&original[..end]).into_owned()
            }
            _ => b64_encode(
                &serde_json::to_vec(&header)
                    .map_err(|e| CryptoError::Encrypt(e.to_string()))?,
            ),
        };

        let iv = random_bytes::<NONCE_LEN>();
        let sealed = aead::seal(&cek, &iv, &plaintext, encoded_header.as_bytes())?;
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);
        Ok(Bytes::from(format!(
            "{}..{}.{}.{}",
            encoded_header,
            b64_encode(&iv),
            b64_encode(ciphertext),
            b64_encode(tag)
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::jose::verify;
    use crate::crypto::{KeyMaterial, KeyStore};
    use crate::decoders::{JweDecoder, JwtDecoder};
    use crate::element::Element;
    use crate::engine::{ConversionContext, ConverterSettings};
    use crate::traits::ConversionPlugin;

    fn decode(plugin: &dyn ConversionPlugin, keys: &KeyStore, token: &str) -> ElementRef {
        let settings = ConverterSettings::default();
        let mut ctx = ConversionContext::new(&settings, keys);
        let root = Element::new_root(token.to_string());
        plugin.convert(&root, &mut ctx).unwrap();
        root
    }

    fn signed(keys: &KeyStore, key: &str, alg: &str) -> String {
        let header = format!(r#"{{"alg":"{}"}}"#, alg);
        let input = format!("{}.{}", b64_encode(header.as_bytes()), b64_encode(br#"{"sub":"a"}"#));
        let sig = sign(JwsAlgorithm::parse(alg).unwrap(), &keys.get(key).unwrap().material, input.as_bytes()).unwrap();
        format!("{}.{}", input, b64_encode(&sig))
    }

    fn verifies(keys: &KeyStore, key: &str, alg: JwsAlgorithm, token: &[u8]) -> bool {
        let token = std::str::from_utf8(token).unwrap();
        let (input, sig) = token.rsplit_once('.').unwrap();
        let sig = crate::crypto::jose::b64_decode(sig).unwrap();
        verify(alg, &keys.get(key).unwrap().material, input.as_bytes(), &sig)
    }

    #[test]
    fn test_body_change_is_resigned_with_verifying_key() {
        struct TestCase {
            alg: &'static str,
            key: &'static str,
        }

        let keys = KeyStore::new()
            .with_key("hs", KeyMaterial::Hmac(b"secret".to_vec()))
            .with_key("ed", KeyMaterial::ed25519_signing([8u8; 32]));
        let cases = vec![TestCase { alg: "HS256", key: "hs" }, TestCase { alg: "EdDSA", key: "ed" }];

        for case in cases {
            let root = decode(&JwtDecoder, &keys, &signed(&keys, case.key, case.alg));
            let jwt = root.facet::<JwtFacet>().unwrap();
            let out = JwtWriter
                .write(&root, &jwt.body, Bytes::from_static(br#"{"sub":"b"}"#), &WriteContext::new(&keys))
                .unwrap();
            assert!(verifies(&keys, case.key, JwsAlgorithm::parse(case.alg).unwrap(), &out), "{}", case.alg);
        }
    }

    #[test]
    fn test_unverified_token_cannot_be_resigned() {
        let signer = KeyStore::new().with_key("hs", KeyMaterial::Hmac(b"secret".to_vec()));
        let empty = KeyStore::new();
        let root = decode(&JwtDecoder, &empty, &signed(&signer, "hs", "HS256"));
        let jwt = root.facet::<JwtFacet>().unwrap();

        let err = JwtWriter
            .write(&root, &jwt.body, Bytes::from_static(b"{}"), &WriteContext::new(&empty))
            .unwrap_err();
        assert!(matches!(err, ModificationError::InvalidSignature { .. }));
    }

    #[test]
    fn test_sign_with_named_key() {
        let keys = KeyStore::new()
            .with_key("old", KeyMaterial::Hmac(b"old".to_vec()))
            .with_key("new", KeyMaterial::Hmac(b"new".to_vec()));
        let root = decode(&JwtDecoder, &keys, &signed(&keys, "old", "HS256"));
        let jwt = root.facet::<JwtFacet>().unwrap();
        let ctx = WriteContext::new(&keys);

        let out = JwtWriter
            .write(&root, &jwt.signature, Bytes::from_static(b"SIGN_WITH_KEY(new)"), &ctx)
            .unwrap();
        assert!(verifies(&keys, "new", JwsAlgorithm::Hs256, &out));

        let err = JwtWriter
            .write(&root, &jwt.signature, Bytes::from_static(b"SIGN_WITH_KEY(missing)"), &ctx)
            .unwrap_err();
        assert!(matches!(err, ModificationError::KeyNotFound { key } if key == "missing"));
    }

    #[test]
    fn test_jwe_reencrypts_for_same_recipient() {
        let recipient = KeyMaterial::x25519([6u8; 32]);
        let keys = KeyStore::new().with_key("rcpt", recipient.clone());
        let mut header = serde_json::json!({"alg": "ECDH-ES", "enc": "C20P"});
        let cek = sender_content_key(JweAlgorithm::EcdhEs, JWE_ENC_C20P, &mut header, &recipient).unwrap();
        let encoded = b64_encode(&serde_json::to_vec(&header).unwrap());
        let iv = [1u8; NONCE_LEN];
        let sealed = aead::seal(&cek, &iv, b"secret body", encoded.as_bytes()).unwrap();
        let (ct, tag) = sealed.split_at(sealed.len() - TAG_LEN);
        let token = format!("{}..{}.{}.{}", encoded, b64_encode(&iv), b64_encode(ct), b64_encode(tag));

        let root = decode(&JweDecoder, &keys, &token);
        let jwe = root.facet::<JweFacet>().unwrap();
        let out = JweWriter
            .write(&root, &jwe.body.unwrap(), Bytes::from_static(b"new body"), &WriteContext::new(&keys))
            .unwrap();
        assert_ne!(out.as_ref(), token.as_bytes());

        let reopened = decode(&JweDecoder, &keys, std::str::from_utf8(&out).unwrap());
        let jwe = reopened.facet::<JweFacet>().unwrap();
        assert_eq!(jwe.body.unwrap().text(), "new body");
        assert_eq!(jwe.encryption_info.decrypted_using.as_deref(), Some("rcpt"));
    }
}
