// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

use super::facet_variant;
use crate::element::ElementRef;

/// Ordered items split out of one piece of content.
///
/// Used for comma-separated header values and for LDAP value sets. An empty
/// separator marks a view over binary structure that cannot be joined back.
#[derive(Debug, Clone)]
pub struct ListFacet {
    pub items: Vec<ElementRef>,
    pub separator: String,
    /// Exact text around the items as parsed: before the first, between each
    /// pair, after the last. Empty when items are joined with `separator`.
    pub gaps: Vec<String>,
}

impl ListFacet {
    pub fn new(items: Vec<ElementRef>, separator: impl Into<String>) -> Self {
        Self {
            items,
            separator: separator.into(),
            gaps: Vec::new(),
        }
    }

    /// List whose original spacing is replayed verbatim on rewrite.
    pub fn with_gaps(items: Vec<ElementRef>, separator: impl Into<String>, gaps: Vec<String>) -> Self {
        Self {
            items,
            separator: separator.into(),
            gaps,
        }
    }

    /// Text written before item `index`.
    pub fn gap_before(&self, index: usize) -> &str {
        if self.gaps.len() == self.items.len() + 1 {
            &self.gaps[index]
        } else if index == 0 {
            ""
        } else {
            &self.separator
        }
    }

    /// Text written after the last item.
    pub fn trailer(&self) -> &str {
        if self.gaps.len() == self.items.len() + 1 {
            &self.gaps[self.items.len()]
        } else {
            ""
        }
    }
}

facet_variant!(ListFacet, List, "List" {
    fn children(&self) -> Vec<(String, ElementRef)> {
        self.items
            .iter()
            .enumerate()
            .map(|(index, item)| (index.to_string(), item.clone()))
            .collect()
    }
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NoteLevel {
    Info,
    Warn,
    Error,
}

/// Diagnostic left by a decoder, e.g. bare LF line endings or a recovered parse.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteFacet {
    pub level: NoteLevel,
    pub text: String,
}

impl NoteFacet {
    pub fn new(level: NoteLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

impl fmt::Display for NoteFacet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.level, self.text)
    }
}

facet_variant!(NoteFacet, Note, "Note" {});

/// Marks an element as a request of the named protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestFacet {
    pub protocol: &'static str,
}

facet_variant!(RequestFacet, Request, "Request" {
    fn exclusive_group(&self) -> Option<&'static str> {
        Some("direction")
    }
});

/// Marks an element as a response of the named protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFacet {
    pub protocol: &'static str,
}

facet_variant!(ResponseFacet, Response, "Response" {
    fn exclusive_group(&self) -> Option<&'static str> {
        Some("direction")
    }
});

/// Links a response to the request it answers.
///
/// The request belongs to another tree, so it is deliberately not exposed as a
/// child: path lookups and rewrites stay inside the response's own tree.
#[derive(Debug, Clone)]
pub struct PairingFacet {
    pub request: ElementRef,
}

facet_variant!(PairingFacet, Pairing, "Pairing" {});
