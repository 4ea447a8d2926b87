// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

/// Character encoding hint carried by every element.
///
/// Only the encodings the HTTP decoder can meet in practice are modelled; anything
/// else is treated as UTF-8 with lossy decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Charset {
    #[default]
    Utf8,
    Latin1,
    Ascii,
    Utf16,
}

/// Alias fragments checked in order; the first fragment found in the label wins.
const ALIASES: &[(&str, Charset)] = &[
    ("utf-16", Charset::Utf16),
    ("utf16", Charset::Utf16),
    ("ucs-2", Charset::Utf16),
    ("utf-8", Charset::Utf8),
    ("utf8", Charset::Utf8),
    ("8859-1", Charset::Latin1),
    ("8859_1", Charset::Latin1),
    ("latin1", Charset::Latin1),
    ("latin-1", Charset::Latin1),
    ("cp1252", Charset::Latin1),
    ("windows-1252", Charset::Latin1),
    ("ascii", Charset::Ascii),
    ("646", Charset::Ascii),
];

impl Charset {
    /// Best-effort match of an encoding label by alias substring.
    pub fn guess(label: &str) -> Option<Charset> {
        let label = label.trim().trim_matches('"').to_ascii_lowercase();
        ALIASES
            .iter()
            .find(|(alias, _)| label.contains(alias))
            .map(|(_, charset)| *charset)
    }

    /// Resolve the `charset` parameter of a `Content-Type` value.
    ///
    /// Falls back to [`Charset::guess`] on the whole value when no parameter is
    /// present, and to UTF-8 when nothing matches.
    pub fn from_content_type(content_type: &str) -> Charset {
        let parameter = content_type.split(';').skip(1).find_map(|param| {
            let (name, value) = param.split_once('=')?;
            name.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim().to_string())
        });
        parameter
            .as_deref()
            .and_then(Charset::guess)
            .or_else(|| Charset::guess(content_type))
            .unwrap_or_default()
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Charset::Utf8 | Charset::Ascii => String::from_utf8_lossy(bytes).into_owned(),
            Charset::Latin1 => bytes.iter().map(|b| *b as char).collect(),
            Charset::Utf16 => decode_utf16(bytes),
        }
    }

    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Charset::Utf8 | Charset::Ascii => text.as_bytes().to_vec(),
            Charset::Latin1 => text
                .chars()
                .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
                .collect(),
            Charset::Utf16 => encode_utf16(text, Utf16Order::BigEndian, false),
        }
    }

    /// Encode `text` the way `original` was encoded. UTF-16 keeps the byte
    /// order and byte order mark of `original`; other charsets ignore it.
    pub fn encode_like(&self, text: &str, original: &[u8]) -> Vec<u8> {
        match (self, original) {
            (Charset::Utf16, [0xFF, 0xFE, ..]) => encode_utf16(text, Utf16Order::LittleEndian, true),
            (Charset::Utf16, [0xFE, 0xFF, ..]) => encode_utf16(text, Utf16Order::BigEndian, true),
            _ => self.encode(text),
        }
    }
}

#[derive(Clone, Copy)]
enum Utf16Order {
    BigEndian,
    LittleEndian,
}

fn encode_utf16(text: &str, order: Utf16Order, bom: bool) -> Vec<u8> {
    let units = bom.then_some(0xFEFF).into_iter().chain(text.encode_utf16());
    units
        .flat_map(|unit| match order {
            Utf16Order::BigEndian => unit.to_be_bytes(),
            Utf16Order::LittleEndian => unit.to_le_bytes(),
        })
        .collect()
}

fn decode_utf16(bytes: &[u8]) -> String {
    let (little_endian, body) = match bytes {
        [0xFF, 0xFE, rest @ ..] => (true, rest),
        [0xFE, 0xFF, rest @ ..] => (false, rest),
        _ => (false, bytes),
    };
    let units = body.chunks_exact(2).map(|pair| {
        if little_endian {
            u16::from_le_bytes([pair[0], pair[1]])
        } else {
            u16::from_be_bytes([pair[0], pair[1]])
        }
    });
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Charset::Utf8 => "UTF-8",
            Charset::Latin1 => "ISO-8859-1",
            Charset::Ascii => "US-ASCII",
            Charset::Utf16 => "UTF-16",
        };
        f.write_str(name)
    }
}
