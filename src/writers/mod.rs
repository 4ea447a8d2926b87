// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Writers rebuild a parent's bytes after one of its children changed.
//!
//! The registry is an ordered list of strategies. The first writer whose
//! `can_write` accepts the parent rebuilds it; more specific facets are
//! registered ahead of general ones (JSON before `List`, since a header value
//! may carry both).

mod envelope;
mod http;
mod jose;
mod json;
mod list;
mod uri;

pub use envelope::EnvelopeWriter;
pub use http::{HttpHeaderWriter, HttpMessageWriter};
pub use jose::{JweWriter, JwtWriter, SIGN_WITH_KEY};
pub use json::JsonWriter;
pub use list::ListWriter;
pub use uri::{UriParameterWriter, UriWriter};

use std::fmt;
use std::sync::Arc;

use crate::crypto::KeyStore;
use crate::element::ElementRef;
use crate::errors::ModificationError;
use crate::traits::ElementWriter;

/// What writers may consult besides the tree itself.
#[derive(Debug, Clone, Copy)]
pub struct WriteContext<'a> {
    keys: &'a KeyStore,
}

impl<'a> WriteContext<'a> {
    pub fn new(keys: &'a KeyStore) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &'a KeyStore {
        self.keys
    }
}

#[derive(Default, Clone)]
pub struct WriterRegistry {
    writers: Vec<Arc<dyn ElementWriter>>,
}

impl WriterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writers for every facet the built-in decoders produce.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(HttpMessageWriter));
        registry.register(Arc::new(HttpHeaderWriter));
        registry.register(Arc::new(UriWriter));
        registry.register(Arc::new(UriParameterWriter));
        registry.register(Arc::new(JsonWriter));
        registry.register(Arc::new(JwtWriter));
        registry.register(Arc::new(JweWriter));
        registry.register(Arc::new(EnvelopeWriter));
        registry.register(Arc::new(ListWriter));
        registry
    }

    /// Append a writer; it is consulted after the ones already registered.
    pub fn register(&mut self, writer: Arc<dyn ElementWriter>) {
        self.writers.push(writer);
    }

    pub fn find(&self, parent: &ElementRef) -> Option<&Arc<dyn ElementWriter>> {
        self.writers.iter().find(|w| w.can_write(parent))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.writers.iter().map(|w| w.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

impl fmt::Debug for WriterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterRegistry")
            .field("writers", &self.names())
            .finish()
    }
}

/// Content of `child` after the rewrite: the new bytes when it is the changed
/// child, its current content otherwise.
pub(crate) fn pick(child: &ElementRef, old_child: &ElementRef, new_child: &bytes::Bytes) -> bytes::Bytes {
    if Arc::ptr_eq(child, old_child) {
        new_child.clone()
    } else {
        child.content().clone()
    }
}

pub(crate) fn unsupported(writer: &'static str, parent: &ElementRef, old_child: &ElementRef) -> ModificationError {
    ModificationError::UnsupportedTarget {
        writer,
        child: parent.key_of(old_child).unwrap_or_else(|| "<unknown>".to_string()),
    }
}
