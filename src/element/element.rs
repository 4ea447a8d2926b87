// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::{Arc, Weak};

use super::Charset;
use crate::errors::{ConversionError, ConversionResult, FacetNotFoundError};
use crate::facets::{Facet, FacetVariant, NoteFacet, NoteLevel};

/// Shared handle to an element. Trees are built from these.
pub type ElementRef = Arc<Element>;

/// A node of the parsed message tree.
///
/// The content never changes after creation. Decoders only append facets and,
/// once, record how many bytes of the content they consumed. Rewriting a message
/// always produces a fresh tree.
pub struct Element {
    content: Bytes,
    parent: Weak<Element>,
    charset: Charset,
    facets: RwLock<Vec<Facet>>,
    used_bytes: Mutex<Option<usize>>,
}

impl Element {
    /// Create a root element, as the capture layer does for every message.
    pub fn new_root(content: impl Into<Bytes>) -> ElementRef {
        Arc::new(Self {
            content: content.into(),
            parent: Weak::new(),
            charset: Charset::default(),
            facets: RwLock::new(Vec::new()),
            used_bytes: Mutex::new(None),
        })
    }

    /// Create a child that inherits the parent's charset.
    pub fn new_child(content: impl Into<Bytes>, parent: &ElementRef) -> ElementRef {
        Self::new_child_with_charset(content, parent, parent.charset)
    }

    pub fn new_child_with_charset(
        content: impl Into<Bytes>,
        parent: &ElementRef,
        charset: Charset,
    ) -> ElementRef {
        Arc::new(Self {
            content: content.into(),
            parent: Arc::downgrade(parent),
            charset,
            facets: RwLock::new(Vec::new()),
            used_bytes: Mutex::new(None),
        })
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Content decoded with the element's charset.
    pub fn text(&self) -> String {
        self.charset.decode(&self.content)
    }

    pub fn parent(&self) -> Option<ElementRef> {
        self.parent.upgrade()
    }

    pub fn is_root(&self) -> bool {
        self.parent.upgrade().is_none()
    }

    /// Walk the parent chain up to the root.
    pub fn root_of(element: &ElementRef) -> ElementRef {
        let mut current = element.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent();
        while let Some(parent) = current {
            depth += 1;
            current = parent.parent();
        }
        depth
    }

    /// Number of content bytes a decoder consumed, when one recorded it.
    pub fn used_bytes(&self) -> Option<usize> {
        *self.used_bytes.lock()
    }

    /// Record consumption. The first decoder to record wins.
    pub fn set_used_bytes(&self, used: usize) {
        let mut slot = self.used_bytes.lock();
        if slot.is_none() {
            *slot = Some(used.min(self.content.len()));
        }
    }

    /// Append a facet. Existing facets are never removed.
    ///
    /// Fails when the facet belongs to an exclusive group another facet of this
    /// element already occupies (an element is never both request and response).
    pub fn add_facet(&self, facet: impl Into<Facet>) -> ConversionResult<()> {
        let facet = facet.into();
        let mut facets = self.facets.write();
        if let Some(group) = facet.exclusive_group() {
            if let Some(existing) = facets
                .iter()
                .find(|f| f.exclusive_group() == Some(group))
            {
                return Err(ConversionError::FacetConflict {
                    adding: facet.name(),
                    existing: existing.name(),
                });
            }
        }
        facets.push(facet);
        Ok(())
    }

    /// Attach a diagnostic note. Notes belong to no exclusive group.
    pub fn add_note(&self, level: NoteLevel, text: impl Into<String>) {
        self.facets.write().push(NoteFacet::new(level, text).into());
    }

    /// First facet of the requested variant, if attached.
    pub fn facet<T: FacetVariant>(&self) -> Option<T> {
        self.facets.read().iter().find_map(|f| T::from_facet(f).cloned())
    }

    pub fn facet_or_fail<T: FacetVariant>(&self) -> Result<T, FacetNotFoundError> {
        self.facet::<T>().ok_or_else(|| FacetNotFoundError {
            requested: T::NAME,
            present: self.facet_names(),
        })
    }

    pub fn has_facet<T: FacetVariant>(&self) -> bool {
        self.facets.read().iter().any(|f| T::from_facet(f).is_some())
    }

    /// Snapshot of all attached facets in attachment order.
    pub fn facets(&self) -> Vec<Facet> {
        self.facets.read().clone()
    }

    pub fn facet_names(&self) -> Vec<&'static str> {
        self.facets.read().iter().map(Facet::name).collect()
    }

    /// Diagnostic notes attached by decoders.
    pub fn notes(&self) -> Vec<NoteFacet> {
        self.facets
            .read()
            .iter()
            .filter_map(|f| NoteFacet::from_facet(f).cloned())
            .collect()
    }

    /// Named children across all facets, in facet order then facet-declared order.
    pub fn children(&self) -> Vec<(String, ElementRef)> {
        self.facets
            .read()
            .iter()
            .flat_map(|f| f.children())
            .collect()
    }

    /// Children whose key matches `name` under the owning facet's key rules.
    pub fn children_named(&self, name: &str) -> Vec<ElementRef> {
        self.facets
            .read()
            .iter()
            .flat_map(|f| {
                f.children()
                    .into_iter()
                    .filter(|(key, _)| f.key_matches(key, name))
                    .map(|(_, child)| child)
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// The key under which `child` hangs off this element, if it does.
    pub fn key_of(&self, child: &ElementRef) -> Option<String> {
        self.children()
            .into_iter()
            .find(|(_, candidate)| Arc::ptr_eq(candidate, child))
            .map(|(key, _)| key)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("len", &self.content.len())
            .field("charset", &self.charset)
            .field("facets", &self.facet_names())
            .field("used_bytes", &self.used_bytes())
            .finish()
    }
}
