// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use super::facet_variant;
use crate::element::ElementRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    Object,
    Array,
    String,
    Number,
    Bool,
    Null,
}

impl JsonKind {
    pub fn of(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(_) => JsonKind::Object,
            serde_json::Value::Array(_) => JsonKind::Array,
            serde_json::Value::String(_) => JsonKind::String,
            serde_json::Value::Number(_) => JsonKind::Number,
            serde_json::Value::Bool(_) => JsonKind::Bool,
            serde_json::Value::Null => JsonKind::Null,
        }
    }
}

/// One member of an object or item of an array.
///
/// String children hold the unquoted string; the writer needs `kind` to know
/// whether to quote a replacement.
#[derive(Debug, Clone)]
pub struct JsonChild {
    pub key: String,
    pub element: ElementRef,
    pub kind: JsonKind,
}

/// A JSON object or array. Array children are keyed by their index.
#[derive(Debug, Clone)]
pub struct JsonFacet {
    pub kind: JsonKind,
    pub children: Vec<JsonChild>,
    /// Source spanned several lines; rewrites pretty-print to match.
    pub pretty: bool,
}

facet_variant!(JsonFacet, Json, "Json" {
    fn children(&self) -> Vec<(String, ElementRef)> {
        self.children
            .iter()
            .map(|c| (c.key.clone(), c.element.clone()))
            .collect()
    }
});
