// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};

use super::{pick, unsupported, WriteContext};
use crate::decoders::codings::chunk;
use crate::element::ElementRef;
use crate::errors::ModificationError;
use crate::facets::{
    BodyFraming, HttpHeaderFacet, HttpMessageFacet, HttpRequestFacet, HttpResponseFacet,
    LineSeparator,
};
use crate::traits::ElementWriter;

/// One header line as it will be written.
struct Line {
    name: String,
    separator: String,
    value: Bytes,
}

fn header_lines(headers: &HttpHeaderFacet, changed: Option<(&ElementRef, &Bytes)>) -> Vec<Line> {
    headers
        .entries
        .iter()
        .map(|entry| Line {
            name: entry.name.clone(),
            separator: entry.separator.clone(),
            value: match changed {
                Some((old_child, new_child)) => pick(&entry.value, old_child, new_child),
                None => entry.value.content().clone(),
            },
        })
        .collect()
}

fn render_lines(lines: &[Line], separator: LineSeparator) -> Bytes {
    let mut out = BytesMut::new();
    for line in lines {
        out.put_slice(line.name.as_bytes());
        out.put_slice(line.separator.as_bytes());
        out.put_slice(&line.value);
        out.put_slice(separator.as_str().as_bytes());
    }
    out.freeze()
}

/// Header block. Lines are written with the separator detected at parse time.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpHeaderWriter;

impl ElementWriter for HttpHeaderWriter {
    fn name(&self) -> &'static str {
        "http-headers"
    }

    fn can_write(&self, parent: &ElementRef) -> bool {
        parent.has_facet::<HttpHeaderFacet>()
    }

    fn write(
        &self,
        parent: &ElementRef,
        old_child: &ElementRef,
        new_child: Bytes,
        _ctx: &WriteContext<'_>,
    ) -> Result<Bytes, ModificationError> {
        let headers = parent.facet_or_fail::<HttpHeaderFacet>().map_err(|_| {
            unsupported(self.name(), parent, old_child)
        })?;
        if !headers.entries.iter().any(|e| Arc::ptr_eq(&e.value, old_child)) {
            return Err(unsupported(self.name(), parent, old_child));
        }
        Ok(render_lines(
            &header_lines(&headers, Some((old_child, &new_child))),
            headers.line_separator,
        ))
    }
}

/// Whole HTTP message: title line, header block and body.
///
/// A new body is sent without content codings. Chunked messages are re-framed
/// as a single chunk; everything else gets an exact `Content-Length`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpMessageWriter;

impl HttpMessageWriter {
    fn title(
        &self,
        parent: &ElementRef,
        message: &HttpMessageFacet,
        old_child: &ElementRef,
        new_child: &Bytes,
    ) -> Option<Bytes> {
        let sep = message.line_separator.as_str().as_bytes();
        let mut out = BytesMut::new();
        if let Some(request) = parent.facet::<HttpRequestFacet>() {
            let parts = [&request.method, &request.path, &request.http_version];
            if !parts.iter().any(|p| Arc::ptr_eq(p, old_child)) {
                return None;
            }
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    out.put_u8(b' ');
                }
                out.put_slice(&pick(part, old_child, new_child));
            }
        } else if let Some(response) = parent.facet::<HttpResponseFacet>() {
            let touched = Arc::ptr_eq(&response.http_version, old_child)
                || Arc::ptr_eq(&response.response_code, old_child)
                || response
                    .reason_phrase
                    .as_ref()
                    .is_some_and(|r| Arc::ptr_eq(r, old_child));
            if !touched {
                return None;
            }
            out.put_slice(&pick(&response.http_version, old_child, new_child));
            out.put_u8(b' ');
            out.put_slice(&pick(&response.response_code, old_child, new_child));
            if let Some(reason) = &response.reason_phrase {
                out.put_u8(b' ');
                out.put_slice(&pick(reason, old_child, new_child));
            }
        } else {
            return None;
        }
        out.put_slice(sep);
        Some(out.freeze())
    }

    /// Header block and wire body for a replaced body.
    fn reframe(message: &HttpMessageFacet, body: &Bytes) -> Result<(Bytes, Bytes), ModificationError> {
        let headers = message
            .header
            .facet::<HttpHeaderFacet>()
            .ok_or_else(|| ModificationError::NoWriterForFacet {
                facets: message.header.facet_names(),
            })?;
        let mut lines: Vec<Line> = header_lines(&headers, None)
            .into_iter()
            .filter(|l| !l.name.eq_ignore_ascii_case("content-encoding"))
            .collect();

        let chunked = message.framing == BodyFraming::Chunked;
        let (drop, keep, value, wire) = if chunked {
            (
                "content-length",
                "transfer-encoding",
                Bytes::from_static(b"chunked"),
                Bytes::from(chunk(body)),
            )
        } else {
            (
                "transfer-encoding",
                "content-length",
                Bytes::from(body.len().to_string()),
                body.clone(),
            )
        };
        lines.retain(|l| !l.name.eq_ignore_ascii_case(drop));

        let mut seen = false;
        lines.retain_mut(|l| {
            if !l.name.eq_ignore_ascii_case(keep) {
                return true;
            }
            if seen {
                return false;
            }
            seen = true;
            l.value = value.clone();
            true
        });
        if !seen {
            let name = if chunked { "Transfer-Encoding" } else { "Content-Length" };
            lines.push(Line {
                name: name.to_string(),
                separator: ": ".to_string(),
                value,
            });
        }
        Ok((render_lines(&lines, message.line_separator), wire))
    }
}

impl ElementWriter for HttpMessageWriter {
    fn name(&self) -> &'static str {
        "http-message"
    }

    fn can_write(&self, parent: &ElementRef) -> bool {
        parent.has_facet::<HttpMessageFacet>()
    }

    fn write(
        &self,
        parent: &ElementRef,
        old_child: &ElementRef,
        new_child: Bytes,
        _ctx: &WriteContext<'_>,
    ) -> Result<Bytes, ModificationError> {
        let message = parent
            .facet::<HttpMessageFacet>()
            .ok_or_else(|| unsupported(self.name(), parent, old_child))?;

        let title = self.title(parent, &message, old_child, &new_child);
        let (header, raw_body) = if Arc::ptr_eq(&message.body, old_child) {
            Self::reframe(&message, &new_child)?
        } else if Arc::ptr_eq(&message.header, old_child) {
            (new_child.clone(), message.raw_body.clone())
        } else if title.is_some() {
            (message.header.content().clone(), message.raw_body.clone())
        } else {
            return Err(unsupported(self.name(), parent, old_child));
        };

        let content = parent.content();
        let used = parent.used_bytes().unwrap_or(content.len());
        let mut out = BytesMut::with_capacity(content.len() + new_child.len());
        out.put_slice(&title.unwrap_or_else(|| message.title_line.clone()));
        out.put_slice(&header);
        out.put_slice(message.line_separator.as_str().as_bytes());
        out.put_slice(&raw_body);
        out.put_slice(&content[used..]);
        Ok(out.freeze())
    }
}
