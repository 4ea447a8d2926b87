// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! HTTP/1.x message decoder.

use std::sync::OnceLock;

use bytes::Bytes;
use regex::bytes::Regex;

use super::codings::{decode_chain, dechunk};
use crate::element::{Charset, Element, ElementRef};
use crate::engine::{ConversionContext, Phase};
use crate::errors::ConversionError;
use crate::facets::{
    BodyFraming, HeaderEntry, HttpHeaderFacet, HttpMessageFacet, HttpRequestFacet,
    HttpResponseFacet, LineSeparator, ListFacet, NoteLevel, RequestFacet, ResponseFacet,
};
use crate::traits::{ConversionPlugin, PluginOutcome};

pub const ID: &str = "http";

/// Headers whose values contain commas that do not separate list items.
const NOT_LISTS: &[&str] = &[
    "date",
    "expires",
    "last-modified",
    "if-modified-since",
    "if-unmodified-since",
    "retry-after",
    "set-cookie",
    "cookie",
    "user-agent",
];

fn request_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Z][A-Z0-9_-]*) ([^ \r\n]+) (HTTP/\d\.\d)\r?$")
            .expect("request line pattern is valid")
    })
}

fn status_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(HTTP/\d\.\d) (\d{3})(?: ([^\r\n]*))?\r?$")
            .expect("status line pattern is valid")
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HttpDecoder;

enum Title {
    Request {
        method: (usize, usize),
        path: (usize, usize),
        version: (usize, usize),
    },
    Response {
        version: (usize, usize),
        code: (usize, usize),
        reason: Option<(usize, usize)>,
    },
}

struct ParsedHeader {
    name: String,
    separator: String,
    value: (usize, usize),
}

impl ConversionPlugin for HttpDecoder {
    fn id(&self) -> &'static str {
        ID
    }

    fn phase(&self) -> Phase {
        Phase::ProtocolParsing
    }

    fn convert(
        &self,
        element: &ElementRef,
        ctx: &mut ConversionContext<'_>,
    ) -> Result<PluginOutcome, ConversionError> {
        let buf = element.content().clone();
        let first_newline = buf.iter().position(|b| *b == b'\n');
        let title_end = first_newline.unwrap_or(buf.len());
        let Some(title) = parse_title(&buf[..title_end]) else {
            return Ok(PluginOutcome::NotApplicable);
        };
        if let Some(skip) = ctx.size_guard(buf.len()) {
            return Ok(skip);
        }
        let Some(first_newline) = first_newline else {
            return Err(ConversionError::structural(ID, "unterminated header block"));
        };

        let line_separator = if first_newline > 0 && buf[first_newline - 1] == b'\r' {
            LineSeparator::Crlf
        } else {
            LineSeparator::Lf
        };

        // Header lines up to the first empty line.
        let header_start = first_newline + 1;
        let mut pos = header_start;
        let mut headers = Vec::new();
        let mut skipped_lines = 0;
        let (header_end, body_start) = loop {
            let Some(newline) = buf[pos..].iter().position(|b| *b == b'\n') else {
                return Err(ConversionError::structural(ID, "unterminated header block"));
            };
            let line_end = pos + newline;
            let content_end = if line_end > pos && buf[line_end - 1] == b'\r' {
                line_end - 1
            } else {
                line_end
            };
            if content_end == pos {
                break (pos, line_end + 1);
            }
            match parse_header(&buf, pos, content_end) {
                Some(header) => headers.push(header),
                None => skipped_lines += 1,
            }
            pos = line_end + 1;
        };

        let header_text = |name: &str| -> Vec<String> {
            headers
                .iter()
                .filter(|h| h.name.eq_ignore_ascii_case(name))
                .map(|h| String::from_utf8_lossy(&buf[h.value.0..h.value.1]).trim().to_string())
                .collect()
        };
        let tokens = |name: &str| -> Vec<String> {
            header_text(name)
                .iter()
                .flat_map(|v| v.split(',').map(|t| t.trim().to_ascii_lowercase()).collect::<Vec<_>>())
                .filter(|t| !t.is_empty())
                .collect()
        };

        let is_response = matches!(title, Title::Response { .. });
        let content_length = header_text("content-length").into_iter().next();
        let transfer_codings = tokens("transfer-encoding");
        let chunked = transfer_codings.iter().any(|t| t == "chunked");
        let remaining = buf.len() - body_start;

        let mut notes: Vec<(NoteLevel, String)> = Vec::new();
        if line_separator == LineSeparator::Lf {
            notes.push((NoteLevel::Info, "message uses bare LF line endings".to_string()));
        }
        if skipped_lines > 0 {
            notes.push((
                NoteLevel::Warn,
                format!("{} malformed header line(s) ignored", skipped_lines),
            ));
        }

        // Framing: Content-Length, then chunked, then nothing.
        let (framing, raw_body, wire_body) = if let Some(length) = content_length {
            let length: usize = length.parse().map_err(|_| {
                ConversionError::structural(ID, format!("invalid Content-Length '{}'", length))
            })?;
            if length <= remaining {
                let raw = buf.slice(body_start..body_start + length);
                (BodyFraming::ContentLength(length), raw.clone(), raw.to_vec())
            } else if ctx.lenient() {
                notes.push((
                    NoteLevel::Warn,
                    format!("Content-Length {} exceeds the {} available bytes", length, remaining),
                ));
                let raw = buf.slice(body_start..);
                (BodyFraming::CloseDelimited, raw.clone(), raw.to_vec())
            } else {
                return Err(ConversionError::structural(
                    ID,
                    format!("Content-Length {} exceeds the {} available bytes", length, remaining),
                ));
            }
        } else if chunked {
            match dechunk(&buf[body_start..]) {
                Ok(decoded) => (
                    BodyFraming::Chunked,
                    buf.slice(body_start..body_start + decoded.consumed),
                    decoded.data,
                ),
                Err(err) if ctx.lenient() => {
                    notes.push((NoteLevel::Warn, format!("{}; body taken as is", err)));
                    let raw = buf.slice(body_start..);
                    (BodyFraming::CloseDelimited, raw.clone(), raw.to_vec())
                }
                Err(err) => return Err(err),
            }
        } else if remaining > 0 && is_response && ctx.lenient() {
            notes.push((
                NoteLevel::Info,
                "response without framing headers; body runs to the end of the buffer".to_string(),
            ));
            let raw = buf.slice(body_start..);
            (BodyFraming::CloseDelimited, raw.clone(), raw.to_vec())
        } else {
            if remaining > 0 {
                notes.push((
                    NoteLevel::Info,
                    format!("{} bytes follow a message without a body", remaining),
                ));
            }
            (BodyFraming::Unframed, Bytes::new(), Vec::new())
        };

        // Content codings then transfer codings, in the order the sender applied them.
        let codings: Vec<String> = tokens("content-encoding")
            .into_iter()
            .chain(transfer_codings.into_iter().filter(|t| t != "chunked"))
            .collect();
        let body = if codings.is_empty() {
            wire_body
        } else {
            match decode_chain(&wire_body, &codings, ctx.max_content_size()) {
                Ok(Some(decoded)) => decoded,
                Ok(None) => {
                    notes.push((
                        NoteLevel::Info,
                        "decoded body exceeds the size limit; kept encoded".to_string(),
                    ));
                    wire_body
                }
                Err(err) if err.is_recoverable() && ctx.lenient() => {
                    notes.push((NoteLevel::Warn, format!("{}; body kept encoded", err)));
                    wire_body
                }
                Err(err) => return Err(err),
            }
        };

        let charset = header_text("content-type")
            .first()
            .map(|ct| Charset::from_content_type(ct))
            .unwrap_or_default();

        // Everything is known; build the subtree.
        let header_element = Element::new_child(buf.slice(header_start..header_end), element);
        let mut entries = Vec::with_capacity(headers.len());
        for header in headers {
            let value = Element::new_child(buf.slice(header.value.0..header.value.1), &header_element);
            split_list(&header.name, &value)?;
            ctx.queue(value.clone());
            entries.push(HeaderEntry {
                name: header.name,
                separator: header.separator,
                value,
            });
        }
        header_element.add_facet(HttpHeaderFacet {
            entries,
            line_separator,
        })?;
        header_element.set_used_bytes(header_element.len());

        let body_element = Element::new_child_with_charset(body, element, charset);
        ctx.queue(body_element.clone());

        element.add_facet(HttpMessageFacet {
            header: header_element,
            body: body_element,
            line_separator,
            framing,
            codings,
            title_line: buf.slice(..header_start),
            raw_body: raw_body.clone(),
        })?;

        let slice = |(start, end): (usize, usize)| Element::new_child(buf.slice(start..end), element);
        match title {
            Title::Request {
                method,
                path,
                version,
            } => {
                let path = slice(path);
                ctx.queue(path.clone());
                element.add_facet(HttpRequestFacet {
                    method: slice(method),
                    path,
                    http_version: slice(version),
                })?;
                element.add_facet(RequestFacet { protocol: ID })?;
            }
            Title::Response {
                version,
                code,
                reason,
            } => {
                element.add_facet(HttpResponseFacet {
                    response_code: slice(code),
                    reason_phrase: reason.map(slice),
                    http_version: slice(version),
                })?;
                element.add_facet(ResponseFacet { protocol: ID })?;
            }
        }

        for (level, text) in notes {
            element.add_note(level, text);
        }
        element.set_used_bytes(body_start + raw_body.len());
        Ok(PluginOutcome::Converted)
    }
}

fn parse_title(line: &[u8]) -> Option<Title> {
    let span = |m: Option<regex::bytes::Match<'_>>| m.map(|m| (m.start(), m.end()));
    if let Some(caps) = request_line().captures(line) {
        return Some(Title::Request {
            method: span(caps.get(1))?,
            path: span(caps.get(2))?,
            version: span(caps.get(3))?,
        });
    }
    let caps = status_line().captures(line)?;
    Some(Title::Response {
        version: span(caps.get(1))?,
        code: span(caps.get(2))?,
        reason: span(caps.get(3)),
    })
}

/// `Name: value` between `start` and `end` (terminator excluded).
fn parse_header(buf: &[u8], start: usize, end: usize) -> Option<ParsedHeader> {
    let line = &buf[start..end];
    let colon = line.iter().position(|b| *b == b':')?;
    let name = std::str::from_utf8(&line[..colon]).ok()?;
    if name.is_empty() || name.bytes().any(|b| b.is_ascii_whitespace()) {
        return None;
    }
    let spaces = line[colon + 1..]
        .iter()
        .take_while(|b| **b == b' ' || **b == b'\t')
        .count();
    let value_start = start + colon + 1 + spaces;
    Some(ParsedHeader {
        name: name.to_string(),
        separator: String::from_utf8_lossy(&line[colon..colon + 1 + spaces]).into_owned(),
        value: (value_start, end),
    })
}

/// Attach a `List` facet to comma-separated header values.
fn split_list(name: &str, value: &ElementRef) -> Result<(), ConversionError> {
    let text = value.text();
    if !text.contains(',')
        || text.contains('"')
        || NOT_LISTS.iter().any(|n| n.eq_ignore_ascii_case(name))
    {
        return Ok(());
    }
    let mut items = Vec::new();
    let mut gaps = Vec::new();
    let mut pending = String::new();
    for (i, raw) in text.split(',').enumerate() {
        if i > 0 {
            pending.push(',');
        }
        let trimmed = raw.trim();
        let leading = raw.len() - raw.trim_start().len();
        pending.push_str(&raw[..leading]);
        gaps.push(std::mem::take(&mut pending));
        items.push(Element::new_child(trimmed.to_string(), value));
        pending.push_str(&raw[leading + trimmed.len()..]);
    }
    gaps.push(pending);
    value.add_facet(ListFacet::with_gaps(items, ",", gaps))
}
