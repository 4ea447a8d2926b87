// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Built-in conversion plugins.
//!
//! | id              | recognises                                   |
//! |-----------------|----------------------------------------------|
//! | `http`          | HTTP/1.x requests and responses              |
//! | `uri`           | the request target of an HTTP request        |
//! | `json`          | JSON objects and arrays                      |
//! | `jwt`           | compact JWS tokens                           |
//! | `jwe`           | compact JWE tokens                           |
//! | `aead-envelope` | keyed and ephemeral ChaCha20-Poly1305 frames |
//! | `ldap`          | LDAPv3 messages, when `ldap` is activated    |
//!
//! `uri` runs in the content-enrichment phase; the rest parse protocols.

pub mod ber;
pub mod codings;
pub mod envelope;
pub mod http;
pub mod jose;
pub mod json;
pub mod ldap;
pub mod uri;

use std::sync::Arc;

use crate::traits::ConversionPlugin;

pub use envelope::EnvelopeDecoder;
pub use http::HttpDecoder;
pub use jose::{JweDecoder, JwtDecoder};
pub use json::JsonDecoder;
pub use ldap::LdapDecoder;
pub use uri::UriDecoder;

/// Every built-in plugin, ready to hand to `PluginPipeline::new`.
pub fn default_plugins() -> Vec<Arc<dyn ConversionPlugin>> {
    vec![
        Arc::new(HttpDecoder),
        Arc::new(UriDecoder),
        Arc::new(JsonDecoder),
        Arc::new(JwtDecoder),
        Arc::new(JweDecoder),
        Arc::new(EnvelopeDecoder),
        Arc::new(LdapDecoder),
    ]
}
