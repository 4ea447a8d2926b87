// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! End-to-end scenarios: bytes in, modifications applied, bytes out.

use std::sync::Arc;

use bytes::Bytes;

use crate::crypto::jose::{b64_encode, sign, JwsAlgorithm};
use crate::crypto::{aead, KeyMaterial, KeyStore};
use crate::decoders::codings::dechunk;
use crate::decoders::{default_plugins, HttpDecoder};
use crate::element::ElementRef;
use crate::engine::{
    Converter, ConverterSettings, DefaultPathEvaluator, Modification, ModificationRegistry,
    Modifier, PluginPipeline,
};
use crate::errors::{ConversionError, ModificationError};
use crate::facets::{
    AeadEnvelopeFacet, HttpHeaderFacet, HttpMessageFacet, HttpRequestFacet, JsonFacet, JweFacet,
    JwtFacet, JwtSignatureFacet, NoteLevel, UriFacet,
};
use crate::traits::PathEvaluator;
use crate::writers::WriterRegistry;

struct Harness {
    converter: Arc<Converter>,
    modifier: Modifier,
}

impl Harness {
    fn new(keys: KeyStore, settings: ConverterSettings) -> Self {
        let pipeline = Arc::new(PluginPipeline::new(default_plugins()).unwrap());
        let converter = Arc::new(Converter::new(pipeline, Arc::new(keys), settings));
        let modifier = Modifier::new(converter.clone(), Arc::new(WriterRegistry::with_defaults()));
        Self {
            converter,
            modifier,
        }
    }

    fn plain() -> Self {
        Self::new(KeyStore::new(), ConverterSettings::default())
    }

    fn convert(&self, bytes: &[u8]) -> ElementRef {
        self.converter.convert(Bytes::copy_from_slice(bytes), None).unwrap()
    }

    fn modify(&self, bytes: &[u8], modification: Modification) -> Vec<u8> {
        let registry = ModificationRegistry::new();
        registry.register(modification);
        let report = self
            .modifier
            .apply_modifications(&self.convert(bytes), &registry);
        assert!(report.failures.is_empty(), "{:?}", report.failures);
        report.bytes().to_vec()
    }
}

fn find(root: &ElementRef, path: &str) -> ElementRef {
    DefaultPathEvaluator
        .find_elements(root, path)
        .unwrap()
        .into_iter()
        .next()
        .unwrap_or_else(|| panic!("nothing at {}", path))
}

fn hs256_token(secret: &[u8], body: &str) -> String {
    let input = format!(
        "{}.{}",
        b64_encode(br#"{"alg":"HS256","typ":"JWT"}"#),
        b64_encode(body.as_bytes())
    );
    let sig = sign(JwsAlgorithm::Hs256, &KeyMaterial::Hmac(secret.to_vec()), input.as_bytes()).unwrap();
    format!("{}.{}", input, b64_encode(&sig))
}

fn tlv(tag: u8, value: &[u8]) -> Vec<u8> {
    let mut out = vec![tag, value.len() as u8];
    out.extend_from_slice(value);
    out
}

#[test]
fn test_round_trip_identity_with_empty_registry() {
    let harness = Harness::plain();
    let registry = ModificationRegistry::new();
    let messages: Vec<&[u8]> = vec![
        b"GET /foo?x=bar1&x=bar2 HTTP/1.1\r\nHost: h\r\n\r\n",
        b"POST /api HTTP/1.1\r\nHost: h\r\nContent-Type: application/json\r\nContent-Length: 13\r\n\r\n{\"a\": [1, 2]}",
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n",
        b"\x00\x01 not a protocol at all",
    ];

    for message in messages {
        let report = harness
            .modifier
            .apply_modifications(&harness.convert(message), &registry);
        assert!(!report.changed());
        assert_eq!(report.bytes().as_ref(), message);
    }
}

/// Rebuilding every level with unchanged content reproduces the input.
#[test]
fn test_rewrite_with_same_content_is_identity() {
    let harness = Harness::plain();
    let message = b"POST /p?a=1&b HTTP/1.1\r\nHost:  spaced\r\nContent-Length: 4\r\n\r\nbody";
    let root = harness.convert(message);

    for path in ["$.header.Host", "$.path.a.value", "$.path.b.key", "$.method"] {
        let target = find(&root, path);
        let rebuilt = harness
            .modifier
            .rewrite(&target, target.content().clone())
            .unwrap();
        assert_eq!(rebuilt.as_ref(), &message[..], "{}", path);
    }
}

#[test]
fn test_repeated_query_parameter_scenario() {
    let harness = Harness::plain();
    let out = harness.modify(
        b"GET /foo?x=bar1&x=bar2 HTTP/1.1\r\nHost: h\r\n\r\n",
        Modification::new("$.path.x[1].value", "bar3"),
    );

    assert_eq!(out, b"GET /foo?x=bar1&x=bar3 HTTP/1.1\r\nHost: h\r\n\r\n");
}

#[test]
fn test_content_length_follows_body() {
    let harness = Harness::plain();
    let out = harness.modify(
        b"POST /submit HTTP/1.1\r\nHost: h\r\nContent-Length: 5\r\n\r\nhello",
        Modification::new("$.body", "hello, world"),
    );

    assert_eq!(
        out,
        b"POST /submit HTTP/1.1\r\nHost: h\r\nContent-Length: 12\r\n\r\nhello, world"
    );
    let root = harness.convert(&out);
    let message = root.facet::<HttpMessageFacet>().unwrap();
    let headers = message.header.facet::<HttpHeaderFacet>().unwrap();
    assert_eq!(
        headers.get_text("content-length").unwrap(),
        message.body.len().to_string()
    );
}

#[test]
fn test_header_list_keeps_uneven_spacing() {
    let harness = Harness::plain();
    let out = harness.modify(
        b"GET / HTTP/1.1\r\nAccept: a,b, c\r\n\r\n",
        Modification::new("$.header.Accept[2]", "x"),
    );

    assert_eq!(out, b"GET / HTTP/1.1\r\nAccept: a,b, x\r\n\r\n");
}

#[test]
fn test_utf16_body_keeps_byte_order_mark() {
    let harness = Harness::plain();
    let out = harness.modify(
        b"HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-16\r\nContent-Length: 4\r\n\r\n\xff\xfeh\x00",
        Modification::new("$.body", "ac"),
    );

    assert_eq!(
        out,
        b"HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-16\r\nContent-Length: 6\r\n\r\n\xff\xfea\x00c\x00"
    );
}

#[test]
fn test_chunked_body_is_reframed_as_one_chunk() {
    let harness = Harness::plain();
    let out = harness.modify(
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nhe\r\n3\r\nllo\r\n0\r\n\r\n",
        Modification::new("$.body", "goodbye!"),
    );

    assert_eq!(
        out,
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n8\r\ngoodbye!\r\n0\r\n\r\n"
    );
    let body_start = out.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
    let decoded = dechunk(&out[body_start..]).unwrap();
    assert_eq!(decoded.data, b"goodbye!");
    assert_eq!(decoded.consumed, out.len() - body_start);
}

#[test]
fn test_regex_filter_replaces_matches_only() {
    let harness = Harness::plain();
    let out = harness.modify(
        b"GET / HTTP/1.1\r\nHost: api.example.org\r\n\r\n",
        Modification::new("$.header.host", "$1.internal").with_regex(r"^(\w+)\.example\.org$"),
    );

    assert_eq!(out, b"GET / HTTP/1.1\r\nHost: api.internal\r\n\r\n");
}

/// Undecodable body bytes survive a regex that matches nothing.
#[test]
fn test_unmatched_regex_leaves_binary_body_untouched() {
    let harness = Harness::plain();
    let wire = b"POST / HTTP/1.1\r\nContent-Length: 4\r\n\r\n\xff\xfeab";
    let registry = ModificationRegistry::new();
    registry.register(
        Modification::new("$.body", "zzz")
            .named("binary")
            .with_regex("nomatch")
            .times(1),
    );

    let report = harness
        .modifier
        .apply_modifications(&harness.convert(wire), &registry);

    assert!(!report.changed());
    assert!(report.applied.is_empty());
    assert_eq!(report.bytes().as_ref(), wire.as_slice());
    assert_eq!(registry.get("binary").unwrap().remaining_executions, Some(1));
}

#[test]
fn test_json_body_inside_http() {
    let harness = Harness::plain();
    let out = harness.modify(
        b"POST /api HTTP/1.1\r\nContent-Length: 25\r\n\r\n{\"user\":\"bob\",\"admin\":no}",
        Modification::new("$.body.user", "alice"),
    );
    // Not valid JSON, so the body is plain bytes and `user` does not exist.
    assert!(out.ends_with(b"{\"user\":\"bob\",\"admin\":no}"));

    let out = harness.modify(
        b"POST /api HTTP/1.1\r\nContent-Length: 28\r\n\r\n{\"user\":\"bob\",\"admin\":false}",
        Modification::new("$.body.admin", "true"),
    );
    assert!(out.ends_with(b"\r\n\r\n{\"user\":\"bob\",\"admin\":true}"));
    let root = harness.convert(&out);
    let body = root.facet::<HttpMessageFacet>().unwrap().body;
    assert!(body.has_facet::<JsonFacet>());
    assert_eq!(
        root.facet::<HttpMessageFacet>()
            .unwrap()
            .header
            .facet::<HttpHeaderFacet>()
            .unwrap()
            .get_text("Content-Length")
            .unwrap(),
        "27"
    );
}

#[test]
fn test_jwt_is_resigned_after_body_change() {
    let keys = KeyStore::new().with_key("api", KeyMaterial::Hmac(b"s3cret".to_vec()));
    let harness = Harness::new(keys, ConverterSettings::default());
    let token = hs256_token(b"s3cret", r#"{"sub":"alice","admin":false}"#);

    let out = harness.modify(token.as_bytes(), Modification::new("$.body.admin", "true"));

    assert_ne!(out, token.as_bytes());
    let root = harness.convert(&out);
    let jwt = root.facet::<JwtFacet>().unwrap();
    let body: serde_json::Value = serde_json::from_slice(jwt.body.content()).unwrap();
    assert_eq!(body, serde_json::json!({"sub": "alice", "admin": true}));
    let signature = jwt.signature.facet::<JwtSignatureFacet>().unwrap();
    assert_eq!(signature.verified_using.as_deref(), Some("api"));
}

#[test]
fn test_unverified_jwt_cannot_be_rewritten() {
    let harness = Harness::plain();
    let token = hs256_token(b"unknown", r#"{"sub":"alice"}"#);
    let registry = ModificationRegistry::new();
    registry.register(Modification::new("$.body.sub", "mallory").named("forge"));

    let report = harness
        .modifier
        .apply_modifications(&harness.convert(token.as_bytes()), &registry);

    assert!(!report.changed());
    assert_eq!(report.bytes().as_ref(), token.as_bytes());
    assert!(matches!(
        report.failures.as_slice(),
        [(name, ModificationError::InvalidSignature { .. })] if name == "forge"
    ));
}

#[test]
fn test_execution_counters() {
    struct TestCase {
        name: &'static str,
        executions: Option<u32>,
        passes: usize,
        expected_applied: usize,
        still_registered: bool,
    }

    let test_cases = vec![
        TestCase {
            name: "bounded",
            executions: Some(2),
            passes: 3,
            expected_applied: 2,
            still_registered: false,
        },
        TestCase {
            name: "zero never applies",
            executions: Some(0),
            passes: 2,
            expected_applied: 0,
            still_registered: false,
        },
        TestCase {
            name: "unbounded",
            executions: None,
            passes: 4,
            expected_applied: 4,
            still_registered: true,
        },
    ];

    let harness = Harness::plain();
    let message = b"GET / HTTP/1.1\r\nHost: a\r\n\r\n";

    for test_case in test_cases {
        let registry = ModificationRegistry::new();
        let mut modification = Modification::new("$.header.Host", "b").named("ttl");
        modification.remaining_executions = test_case.executions;
        registry.register(modification);

        let mut applied = 0;
        for _ in 0..test_case.passes {
            let report = harness
                .modifier
                .apply_modifications(&harness.convert(message), &registry);
            applied += report.applied.len();
        }

        assert_eq!(applied, test_case.expected_applied, "{}", test_case.name);
        assert_eq!(
            registry.get("ttl").is_some(),
            test_case.still_registered,
            "{}",
            test_case.name
        );
    }
}

/// Only applications that change the message spend an execution.
#[test]
fn test_false_condition_does_not_spend_execution() {
    let harness = Harness::plain();
    let registry = ModificationRegistry::new();
    registry.register(
        Modification::new("$.header.Host", "b")
            .named("posts-only")
            .with_condition("$.method == 'POST'")
            .times(1),
    );

    let report = harness
        .modifier
        .apply_modifications(&harness.convert(b"GET / HTTP/1.1\r\nHost: a\r\n\r\n"), &registry);
    assert!(!report.changed());
    assert_eq!(registry.get("posts-only").unwrap().remaining_executions, Some(1));

    let report = harness
        .modifier
        .apply_modifications(&harness.convert(b"POST / HTTP/1.1\r\nHost: a\r\n\r\n"), &registry);
    assert_eq!(report.bytes().as_ref(), b"POST / HTTP/1.1\r\nHost: b\r\n\r\n");
    assert!(registry.is_empty());
}

/// Later modifications see the tree produced by earlier ones.
#[test]
fn test_modifications_chain_in_registration_order() {
    let harness = Harness::plain();
    let registry = ModificationRegistry::new();
    registry.register(Modification::new("$.header.Host", "staging").named("first"));
    registry.register(
        Modification::new("$.path", "/staging")
            .named("second")
            .with_condition("$.header.Host == 'staging'"),
    );

    let report = harness.modifier.apply_modifications(
        &harness.convert(b"GET /prod HTTP/1.1\r\nHost: prod\r\n\r\n"),
        &registry,
    );

    assert_eq!(report.applied, vec!["first", "second"]);
    assert_eq!(
        report.bytes().as_ref(),
        b"GET /staging HTTP/1.1\r\nHost: staging\r\n\r\n"
    );
}

#[test]
fn test_keyed_envelope_is_resealed() {
    let key = [5u8; 32];
    let key_id = [7u8; 32];
    let keys = KeyStore::new().with_key(
        "transport",
        KeyMaterial::Symmetric {
            key,
            key_id: Some(key_id),
        },
    );
    let harness = Harness::new(keys, ConverterSettings::default());

    let nonce = [1u8; aead::NONCE_LEN];
    let mut wire = key_id.to_vec();
    wire.extend_from_slice(&nonce);
    wire.extend(aead::seal(&key, &nonce, b"GET / HTTP/1.1\r\nHost: a\r\n\r\n", &[]).unwrap());

    let out = harness.modify(&wire, Modification::new("$.body.header.Host", "b"));

    assert_eq!(&out[..32], &key_id);
    let root = harness.convert(&out);
    let envelope = root.facet::<AeadEnvelopeFacet>().unwrap();
    assert_eq!(envelope.key_name, "transport");
    assert_eq!(envelope.body.text(), "GET / HTTP/1.1\r\nHost: b\r\n\r\n");
}

#[test]
fn test_jwe_is_reencrypted() {
    let key = [9u8; 32];
    let keys = KeyStore::new().with_key("cek", KeyMaterial::Symmetric { key, key_id: None });
    let harness = Harness::new(keys, ConverterSettings::default());

    let header = b64_encode(br#"{"alg":"dir","enc":"C20P"}"#);
    let iv = [3u8; aead::NONCE_LEN];
    let sealed = aead::seal(&key, &iv, br#"{"role":"user"}"#, header.as_bytes()).unwrap();
    let (ciphertext, tag) = sealed.split_at(sealed.len() - aead::TAG_LEN);
    let token = format!(
        "{}..{}.{}.{}",
        header,
        b64_encode(&iv),
        b64_encode(ciphertext),
        b64_encode(tag)
    );

    let out = harness.modify(token.as_bytes(), Modification::new("$.body.role", "admin"));

    assert!(out.starts_with(format!("{}..", header).as_bytes()));
    let root = harness.convert(&out);
    let jwe = root.facet::<JweFacet>().unwrap();
    assert_eq!(jwe.body.unwrap().text(), r#"{"role":"admin"}"#);
    assert_eq!(jwe.encryption_info.decrypted_using.as_deref(), Some("cek"));
}

#[test]
fn test_ldap_targets_have_no_writer() {
    let settings = ConverterSettings::default().with_protocol("ldap");
    let harness = Harness::new(KeyStore::new(), settings);
    let bind = tlv(
        0x60,
        &[tlv(0x02, &[3]), tlv(0x04, b"cn=admin"), tlv(0x80, b"pw")].concat(),
    );
    let wire = tlv(0x30, &[tlv(0x02, &[1]), bind].concat());

    let registry = ModificationRegistry::new();
    registry.register(Modification::new("$.protocolOperation.dn", "cn=root").named("ldap").times(1));
    let report = harness
        .modifier
        .apply_modifications(&harness.convert(&wire), &registry);

    assert_eq!(report.bytes().as_ref(), wire.as_slice());
    match report.failures.as_slice() {
        [(_, ModificationError::NoWriterForFacet { facets })] => {
            assert!(facets.contains(&"LdapOperation"), "{:?}", facets)
        }
        other => panic!("unexpected failures {:?}", other),
    }
    assert_eq!(registry.get("ldap").unwrap().remaining_executions, Some(1));
}

#[test]
fn test_missing_target_is_a_silent_no_op() {
    let harness = Harness::plain();
    let registry = ModificationRegistry::new();
    registry.register(Modification::new("$.header.X-Missing", "v").times(1));

    let report = harness
        .modifier
        .apply_modifications(&harness.convert(b"GET / HTTP/1.1\r\n\r\n"), &registry);

    assert!(!report.changed());
    assert!(report.failures.is_empty());
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_oversized_content_is_left_unstructured() {
    let settings = ConverterSettings {
        max_content_size: 16,
        ..ConverterSettings::default()
    };
    let harness = Harness::new(KeyStore::new(), settings);

    let root = harness.convert(br#"{"key":"a value longer than the limit"}"#);

    assert!(!root.has_facet::<JsonFacet>());
    assert!(root.children().is_empty());
}

#[test]
fn test_lenient_and_strict_framing_errors() {
    let message = b"HTTP/1.1 200 OK\r\nContent-Length: 50\r\n\r\nshort";

    let lenient = Harness::plain().convert(message);
    let body = lenient.facet::<HttpMessageFacet>().unwrap().body;
    assert_eq!(body.text(), "short");
    assert!(lenient.notes().iter().any(|n| n.level == NoteLevel::Warn));

    let strict = Harness::new(KeyStore::new(), ConverterSettings::strict());
    let err = strict
        .converter
        .convert(Bytes::from_static(message), None)
        .unwrap_err();
    assert!(matches!(err, ConversionError::StructuralParse { decoder: "http", .. }));
}

/// Enrichment can be re-run over a tree that was parsed without it.
#[test]
fn test_convert_element_enriches_parsed_tree() {
    let parse_only = Converter::new(
        Arc::new(PluginPipeline::new(vec![Arc::new(HttpDecoder)]).unwrap()),
        Arc::new(KeyStore::new()),
        ConverterSettings::default(),
    );
    let root = parse_only
        .convert(
            Bytes::from_static(b"GET /search?q=rust&page=2 HTTP/1.1\r\nHost: h\r\n\r\n"),
            None,
        )
        .unwrap();
    let path = root.facet::<HttpRequestFacet>().unwrap().path;
    assert!(!path.has_facet::<UriFacet>());

    let harness = Harness::plain();
    harness.converter.convert_element(&root).unwrap();

    let uri = path.facet::<UriFacet>().unwrap();
    assert_eq!(uri.basic_path.text(), "/search");
    let keys: Vec<&str> = uri.parameters.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["q", "page"]);

    let children = path.children().len();
    harness.converter.convert_element(&root).unwrap();
    assert_eq!(path.children().len(), children);
    assert!(path.notes().is_empty());
}
