// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! HTTP content/transfer codings and chunked framing.

use std::io::Read;

use flate2::bufread::{DeflateDecoder, GzDecoder, ZlibDecoder};

use crate::errors::ConversionError;

const DECODER: &str = "http";

/// Undo a coding chain listed in the order the sender applied it.
///
/// `limit` caps the decoded size; exceeding it is reported as `Ok(None)` so
/// the caller can keep the encoded body.
pub fn decode_chain(
    body: &[u8],
    codings: &[String],
    limit: usize,
) -> Result<Option<Vec<u8>>, ConversionError> {
    // Reject unknown tokens before doing any work.
    if let Some(unknown) = codings.iter().find(|t| !is_known(t)) {
        return Err(ConversionError::UnsupportedEncoding {
            token: unknown.clone(),
        });
    }

    let mut data = body.to_vec();
    for token in codings.iter().rev() {
        data = match token.as_str() {
            "identity" => data,
            "gzip" | "x-gzip" => inflate(GzDecoder::new(data.as_slice()), limit, token)?,
            "deflate" => match inflate(ZlibDecoder::new(data.as_slice()), limit, token) {
                Ok(decoded) => decoded,
                // Some servers send raw deflate without the zlib wrapper.
                Err(_) => inflate(DeflateDecoder::new(data.as_slice()), limit, token)?,
            },
            other => {
                return Err(ConversionError::UnsupportedEncoding {
                    token: other.to_string(),
                })
            }
        };
        if data.len() > limit {
            return Ok(None);
        }
    }
    Ok(Some(data))
}

fn is_known(token: &str) -> bool {
    matches!(token, "identity" | "gzip" | "x-gzip" | "deflate")
}

fn inflate(reader: impl Read, limit: usize, token: &str) -> Result<Vec<u8>, ConversionError> {
    let mut out = Vec::new();
    reader
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| ConversionError::structural(DECODER, format!("{} decoding failed: {}", token, e)))?;
    Ok(out)
}

/// Result of walking a chunked body.
#[derive(Debug, PartialEq)]
pub struct Dechunked {
    pub data: Vec<u8>,
    /// Wire bytes consumed, including the last chunk and trailers.
    pub consumed: usize,
}

/// Decode `size[;ext]\r\n data\r\n ... 0\r\n [trailers]\r\n`. Bare LF is accepted.
pub fn dechunk(wire: &[u8]) -> Result<Dechunked, ConversionError> {
    let mut data = Vec::new();
    let mut pos = 0;
    loop {
        let (line, next) = read_line(wire, pos)
            .ok_or_else(|| ConversionError::structural(DECODER, "chunk size line is not terminated"))?;
        let size_text = String::from_utf8_lossy(line);
        let size_text = size_text.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_text, 16).map_err(|_| {
            ConversionError::structural(DECODER, format!("invalid chunk size '{}'", size_text))
        })?;
        pos = next;

        if size == 0 {
            // Trailer section ends with an empty line.
            loop {
                let (line, next) = read_line(wire, pos).ok_or_else(|| {
                    ConversionError::structural(DECODER, "chunked body ends inside trailers")
                })?;
                pos = next;
                if line.is_empty() {
                    return Ok(Dechunked { data, consumed: pos });
                }
            }
        }

        let end = pos
            .checked_add(size)
            .filter(|end| *end <= wire.len())
            .ok_or_else(|| ConversionError::structural(DECODER, "chunk exceeds the buffer"))?;
        data.extend_from_slice(&wire[pos..end]);
        pos = end;
        match read_line(wire, pos) {
            Some((line, next)) if line.is_empty() => pos = next,
            _ => {
                return Err(ConversionError::structural(
                    DECODER,
                    "chunk data is not followed by a line break",
                ))
            }
        }
    }
}

/// Line starting at `pos` without its terminator, and the offset after it.
fn read_line(buf: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    let rest = buf.get(pos..)?;
    let newline = rest.iter().position(|b| *b == b'\n')?;
    let line = &rest[..newline];
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    Some((line, pos + newline + 1))
}

/// Frame a body as one chunk followed by the terminating chunk.
pub fn chunk(body: &[u8]) -> Vec<u8> {
    let mut out = format!("{:x}\r\n", body.len()).into_bytes();
    out.extend_from_slice(body);
    out.extend_from_slice(b"\r\n0\r\n\r\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_chain_is_undone_in_reverse() {
        // Sender applied deflate, then gzip.
        let wire = gzip(&zlib(b"hello"));
        let codings = vec!["deflate".to_string(), "gzip".to_string()];

        let decoded = decode_chain(&wire, &codings, 1024).unwrap().unwrap();
        assert_eq!(decoded, b"hello");
    }

    #[test]
    fn test_unknown_coding_is_rejected() {
        let err = decode_chain(b"x", &["br".to_string()], 1024).unwrap_err();
        assert_eq!(
            err,
            ConversionError::UnsupportedEncoding {
                token: "br".to_string()
            }
        );
    }

    #[test]
    fn test_decoded_size_limit() {
        let wire = gzip(&[b'a'; 4096]);
        assert_eq!(decode_chain(&wire, &["gzip".to_string()], 100).unwrap(), None);
    }

    #[test]
    fn test_dechunk() {
        let wire = b"4;ext=1\r\nWiki\r\n5\r\npedia\r\n0\r\nX-Trailer: 1\r\n\r\nrest";
        let decoded = dechunk(wire).unwrap();

        assert_eq!(decoded.data, b"Wikipedia");
        assert_eq!(decoded.consumed, wire.len() - 4);
    }

    #[test]
    fn test_dechunk_errors() {
        for wire in [&b"zz\r\nabc\r\n0\r\n\r\n"[..], b"10\r\nshort\r\n", b"3\r\nabc"] {
            assert!(matches!(
                dechunk(wire),
                Err(ConversionError::StructuralParse { .. })
            ));
        }
    }

    #[test]
    fn test_chunk_then_dechunk() {
        let framed = chunk(b"new body");
        assert_eq!(framed, b"8\r\nnew body\r\n0\r\n\r\n");
        assert_eq!(dechunk(&framed).unwrap().data, b"new body");
    }
}
