// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use bytes::Bytes;

use super::facet_variant;
use crate::element::ElementRef;

/// Line terminator the message was framed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSeparator {
    Crlf,
    Lf,
}

impl LineSeparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineSeparator::Crlf => "\r\n",
            LineSeparator::Lf => "\n",
        }
    }
}

/// How the body length was determined on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyFraming {
    ContentLength(usize),
    Chunked,
    /// Body runs to the end of the buffer (lenient recovery or unframed response).
    CloseDelimited,
    /// No framing header: zero-length body.
    Unframed,
}

/// A parsed HTTP/1.x message.
///
/// Besides the `header` and `body` children it keeps what the writer needs to
/// reproduce the untouched parts byte for byte: the raw title line, the wire
/// form of the body and the codings that were undone to produce `body`.
#[derive(Debug, Clone)]
pub struct HttpMessageFacet {
    pub header: ElementRef,
    pub body: ElementRef,
    pub line_separator: LineSeparator,
    pub framing: BodyFraming,
    /// Content codings followed by non-chunked transfer codings, as listed.
    pub codings: Vec<String>,
    pub title_line: Bytes,
    pub raw_body: Bytes,
}

facet_variant!(HttpMessageFacet, HttpMessage, "HttpMessage" {
    fn children(&self) -> Vec<(String, ElementRef)> {
        vec![
            ("header".to_string(), self.header.clone()),
            ("body".to_string(), self.body.clone()),
        ]
    }
});

#[derive(Debug, Clone)]
pub struct HttpRequestFacet {
    pub method: ElementRef,
    pub path: ElementRef,
    pub http_version: ElementRef,
}

facet_variant!(HttpRequestFacet, HttpRequest, "HttpRequest" {
    fn children(&self) -> Vec<(String, ElementRef)> {
        vec![
            ("method".to_string(), self.method.clone()),
            ("path".to_string(), self.path.clone()),
            ("httpVersion".to_string(), self.http_version.clone()),
        ]
    }

    fn exclusive_group(&self) -> Option<&'static str> {
        Some("http-message-kind")
    }
});

#[derive(Debug, Clone)]
pub struct HttpResponseFacet {
    pub response_code: ElementRef,
    pub reason_phrase: Option<ElementRef>,
    pub http_version: ElementRef,
}

facet_variant!(HttpResponseFacet, HttpResponse, "HttpResponse" {
    fn children(&self) -> Vec<(String, ElementRef)> {
        let mut children = vec![("responseCode".to_string(), self.response_code.clone())];
        if let Some(reason) = &self.reason_phrase {
            children.push(("reasonPhrase".to_string(), reason.clone()));
        }
        children.push(("httpVersion".to_string(), self.http_version.clone()));
        children
    }

    fn exclusive_group(&self) -> Option<&'static str> {
        Some("http-message-kind")
    }
});

/// One header line. `separator` is whatever sat between the name and the value
/// (usually `": "`).
#[derive(Debug, Clone)]
pub struct HeaderEntry {
    pub name: String,
    pub separator: String,
    pub value: ElementRef,
}

/// Ordered header lines; names keep their case but match case-insensitively.
#[derive(Debug, Clone)]
pub struct HttpHeaderFacet {
    pub entries: Vec<HeaderEntry>,
    pub line_separator: LineSeparator,
}

impl HttpHeaderFacet {
    /// First value of the named header.
    pub fn get(&self, name: &str) -> Option<ElementRef> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .map(|e| e.value.clone())
    }

    pub fn get_text(&self, name: &str) -> Option<String> {
        self.get(name).map(|v| v.text().trim().to_string())
    }

    /// All values of the named header, in message order.
    pub fn values(&self, name: &str) -> Vec<ElementRef> {
        self.entries
            .iter()
            .filter(|e| e.name.eq_ignore_ascii_case(name))
            .map(|e| e.value.clone())
            .collect()
    }

    /// Comma-joined tokens of every instance of a list-valued header.
    pub fn tokens(&self, name: &str) -> Vec<String> {
        self.values(name)
            .iter()
            .flat_map(|v| {
                v.text()
                    .split(',')
                    .map(|t| t.trim().to_ascii_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

facet_variant!(HttpHeaderFacet, HttpHeaders, "HttpHeaders" {
    fn children(&self) -> Vec<(String, ElementRef)> {
        self.entries
            .iter()
            .map(|e| (e.name.clone(), e.value.clone()))
            .collect()
    }

    fn key_matches(&self, key: &str, wanted: &str) -> bool {
        key.eq_ignore_ascii_case(wanted)
    }
});
