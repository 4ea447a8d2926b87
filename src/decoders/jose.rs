// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Compact JWT and JWE tokens.

use serde_json::Value;

use crate::crypto::aead;
use crate::crypto::jose::{
    b64_decode, find_verifying_key, recipient_content_key, JweAlgorithm, JwsAlgorithm,
    JWE_ENC_C20P,
};
use crate::element::{Element, ElementRef};
use crate::engine::{ConversionContext, Phase};
use crate::errors::ConversionError;
use crate::facets::{JweEncryptionInfo, JweFacet, JwtFacet, JwtSignatureFacet, NoteLevel};
use crate::traits::{ConversionPlugin, PluginOutcome};

pub const JWT_ID: &str = "jwt";
pub const JWE_ID: &str = "jwe";

/// Splits trimmed ASCII content into exactly `N` dot-separated parts.
fn compact_parts<const N: usize>(content: &[u8]) -> Option<[&str; N]> {
    let text = std::str::from_utf8(content).ok()?;
    let mut parts = [""; N];
    let mut split = text.split('.');
    for slot in parts.iter_mut() {
        *slot = split.next()?;
    }
    if split.next().is_some() {
        return None;
    }
    let alphabet = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '=';
    parts
        .iter()
        .all(|p| p.chars().all(alphabet))
        .then_some(parts)
}

fn protected_header(encoded: &str) -> Option<(Vec<u8>, Value)> {
    let raw = b64_decode(encoded)?;
    let header: Value = serde_json::from_slice(&raw).ok()?;
    header.as_object()?;
    Some((raw, header))
}

fn header_str<'a>(header: &'a Value, field: &str) -> Option<&'a str> {
    header.get(field).and_then(Value::as_str)
}

/// `header.body.signature` with a JSON header carrying `alg`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JwtDecoder;

impl ConversionPlugin for JwtDecoder {
    fn id(&self) -> &'static str {
        JWT_ID
    }

    fn phase(&self) -> Phase {
        Phase::ProtocolParsing
    }

    fn convert(
        &self,
        element: &ElementRef,
        ctx: &mut ConversionContext<'_>,
    ) -> Result<PluginOutcome, ConversionError> {
        let Some([header_part, body_part, signature_part]) =
            compact_parts::<3>(element.content())
        else {
            return Ok(PluginOutcome::NotApplicable);
        };
        if let Some(skip) = ctx.size_guard(element.len()) {
            return Ok(skip);
        }
        let Some((header_raw, header)) = protected_header(header_part) else {
            return Ok(PluginOutcome::NotApplicable);
        };
        let Some(algorithm) = header_str(&header, "alg").map(str::to_string) else {
            return Ok(PluginOutcome::NotApplicable);
        };
        let (Some(body_raw), Some(signature_raw)) =
            (b64_decode(body_part), b64_decode(signature_part))
        else {
            return Ok(PluginOutcome::NotApplicable);
        };

        let signing_input = format!("{}.{}", header_part, body_part);
        let verified_using = JwsAlgorithm::parse(&algorithm).and_then(|alg| {
            find_verifying_key(
                ctx.keys().iter(),
                alg,
                signing_input.as_bytes(),
                &signature_raw,
            )
            .map(|key| key.name.clone())
        });

        let header_el = Element::new_child(header_raw, element);
        let body_el = Element::new_child(body_raw, element);
        let signature_el = Element::new_child(signature_raw, element);
        let signature = JwtSignatureFacet {
            algorithm,
            verified_using,
        };
        if !signature.is_valid() {
            signature_el.add_note(
                NoteLevel::Info,
                format!("{} signature not verified by any key", signature.algorithm),
            );
        }
        signature_el.add_facet(signature)?;
        ctx.queue(header_el.clone());
        ctx.queue(body_el.clone());

        element.add_facet(JwtFacet {
            header: header_el,
            body: body_el,
            signature: signature_el,
        })?;
        element.set_used_bytes(element.len());
        Ok(PluginOutcome::Converted)
    }
}

/// Five-part compact JWE. Tokens no key opens keep only their header.
#[derive(Debug, Default, Clone, Copy)]
pub struct JweDecoder;

impl ConversionPlugin for JweDecoder {
    fn id(&self) -> &'static str {
        JWE_ID
    }

    fn phase(&self) -> Phase {
        Phase::ProtocolParsing
    }

    fn convert(
        &self,
        element: &ElementRef,
        ctx: &mut ConversionContext<'_>,
    ) -> Result<PluginOutcome, ConversionError> {
        let Some([header_part, _encrypted_key, iv_part, ciphertext_part, tag_part]) =
            compact_parts::<5>(element.content())
        else {
            return Ok(PluginOutcome::NotApplicable);
        };
        if let Some(skip) = ctx.size_guard(element.len()) {
            return Ok(skip);
        }
        let Some((header_raw, header)) = protected_header(header_part) else {
            return Ok(PluginOutcome::NotApplicable);
        };
        let (Some(algorithm), Some(encryption)) =
            (header_str(&header, "alg"), header_str(&header, "enc"))
        else {
            return Ok(PluginOutcome::NotApplicable);
        };

        let opened = match (
            JweAlgorithm::parse(algorithm),
            b64_decode(iv_part),
            b64_decode(ciphertext_part),
            b64_decode(tag_part),
        ) {
            (Some(alg), Some(iv), Some(mut sealed), Some(tag)) if encryption == JWE_ENC_C20P => {
                sealed.extend_from_slice(&tag);
                ctx.keys()
                    .iter()
                    .filter(|k| alg.accepts(&k.material))
                    .find_map(|k| {
                        let cek = recipient_content_key(alg, encryption, &header, &k.material)?;
                        aead::open(&cek, &iv, &sealed, header_part.as_bytes())
                            .map(|plain| (k.name.clone(), plain))
                    })
            }
            _ => None,
        };

        let header_el = Element::new_child(header_raw, element);
        ctx.queue(header_el.clone());
        let (body, decrypted_using) = match opened {
            Some((key, plaintext)) => {
                let body = Element::new_child(plaintext, element);
                ctx.queue(body.clone());
                (Some(body), Some(key))
            }
            None => {
                element.add_note(
                    NoteLevel::Info,
                    format!("JWE ({}/{}) not decryptable with any key", algorithm, encryption),
                );
                (None, None)
            }
        };

        element.add_facet(JweFacet {
            header: header_el,
            body,
            encryption_info: JweEncryptionInfo {
                algorithm: algorithm.to_string(),
                encryption: encryption.to_string(),
                decrypted_using,
            },
        })?;
        element.set_used_bytes(element.len());
        Ok(PluginOutcome::Converted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::jose::{b64_encode, sign};
    use crate::crypto::{KeyMaterial, KeyStore};
    use crate::engine::ConverterSettings;

    fn hs256_token(secret: &[u8], body: &str) -> String {
        let input = format!(
            "{}.{}",
            b64_encode(br#"{"alg":"HS256","typ":"JWT"}"#),
            b64_encode(body.as_bytes())
        );
        let sig = sign(JwsAlgorithm::Hs256, &KeyMaterial::Hmac(secret.to_vec()), input.as_bytes())
            .unwrap();
        format!("{}.{}", input, b64_encode(&sig))
    }

    fn run(plugin: &dyn ConversionPlugin, keys: &KeyStore, content: &str) -> (ElementRef, PluginOutcome) {
        let settings = ConverterSettings::default();
        let mut ctx = ConversionContext::new(&settings, keys);
        let root = Element::new_root(content.to_string());
        let outcome = plugin.convert(&root, &mut ctx).unwrap();
        (root, outcome)
    }

    #[test]
    fn test_jwt_verified_key_is_recorded() {
        let keys = KeyStore::new()
            .with_key("other", KeyMaterial::Hmac(b"nope".to_vec()))
            .with_key("api", KeyMaterial::Hmac(b"s3cret".to_vec()));
        let (root, outcome) = run(&JwtDecoder, &keys, &hs256_token(b"s3cret", r#"{"sub":"42"}"#));

        assert_eq!(outcome, PluginOutcome::Converted);
        let jwt = root.facet::<JwtFacet>().unwrap();
        assert_eq!(jwt.body.text(), r#"{"sub":"42"}"#);
        let signature = jwt.signature.facet::<JwtSignatureFacet>().unwrap();
        assert_eq!(signature.algorithm, "HS256");
        assert_eq!(signature.verified_using.as_deref(), Some("api"));
    }

    #[test]
    fn test_jwt_unverified_still_structured() {
        let keys = KeyStore::new();
        let (root, _) = run(&JwtDecoder, &keys, &hs256_token(b"s3cret", "{}"));

        let jwt = root.facet::<JwtFacet>().unwrap();
        let signature = jwt.signature.facet::<JwtSignatureFacet>().unwrap();
        assert!(!signature.is_valid());
        assert_eq!(jwt.signature.notes().len(), 1);
    }

    #[test]
    fn test_not_tokens() {
        let keys = KeyStore::new();
        let no_alg = format!("{}.{}.", b64_encode(b"{}"), b64_encode(b"{}"));
        for content in ["a.b", "www.example.com", "not a token", no_alg.as_str()] {
            let (_, outcome) = run(&JwtDecoder, &keys, content);
            assert_eq!(outcome, PluginOutcome::NotApplicable, "{}", content);
        }
    }

    #[test]
    fn test_jwe_direct_decrypts() {
        let key = [9u8; 32];
        let header = b64_encode(br#"{"alg":"dir","enc":"C20P"}"#);
        let iv = [3u8; aead::NONCE_LEN];
        let sealed = aead::seal(&key, &iv, b"inner", header.as_bytes()).unwrap();
        let (ciphertext, tag) = sealed.split_at(sealed.len() - aead::TAG_LEN);
        let token = format!(
            "{}..{}.{}.{}",
            header,
            b64_encode(&iv),
            b64_encode(ciphertext),
            b64_encode(tag)
        );
        let keys = KeyStore::new().with_key("cek", KeyMaterial::Symmetric { key, key_id: None });

        let (root, outcome) = run(&JweDecoder, &keys, &token);
        assert_eq!(outcome, PluginOutcome::Converted);
        let jwe = root.facet::<JweFacet>().unwrap();
        assert_eq!(jwe.body.unwrap().text(), "inner");
        assert_eq!(jwe.encryption_info.decrypted_using.as_deref(), Some("cek"));

        let (locked, _) = run(&JweDecoder, &KeyStore::new(), &token);
        let jwe = locked.facet::<JweFacet>().unwrap();
        assert!(jwe.body.is_none());
        assert_eq!(jwe.encryption_info.algorithm, "dir");
        assert_eq!(locked.children().len(), 1);
    }
}
