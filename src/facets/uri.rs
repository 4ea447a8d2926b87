// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use super::facet_variant;
use crate::element::ElementRef;

/// A request target split into path, query parameters and fragment.
///
/// Parameters keep their raw (percent-encoded) form and their order; a name may
/// appear more than once.
#[derive(Debug, Clone)]
pub struct UriFacet {
    pub basic_path: ElementRef,
    pub parameters: Vec<(String, ElementRef)>,
    /// A `?` was present, even if the query is empty.
    pub query_marker: bool,
    /// Text after `#`, without the marker.
    pub fragment: Option<String>,
}

facet_variant!(UriFacet, Uri, "Uri" {
    fn children(&self) -> Vec<(String, ElementRef)> {
        let mut children = vec![("basicPath".to_string(), self.basic_path.clone())];
        children.extend(self.parameters.iter().cloned());
        children
    }
});

/// One `key=value` query parameter. `value` is absent for a bare `key`.
#[derive(Debug, Clone)]
pub struct UriParameterFacet {
    pub key: ElementRef,
    pub value: Option<ElementRef>,
}

facet_variant!(UriParameterFacet, UriParameter, "UriParameter" {
    fn children(&self) -> Vec<(String, ElementRef)> {
        let mut children = vec![("key".to_string(), self.key.clone())];
        if let Some(value) = &self.value {
            children.push(("value".to_string(), value.clone()));
        }
        children
    }
});
