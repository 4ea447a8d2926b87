// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Minimal BER reader for LDAP messages.
//!
//! Definite lengths only. Offsets are absolute within the buffer the reader
//! was created over, so decoders can slice child elements out of the shared
//! content without copying.

use std::ops::Range;

use thiserror::Error;

use crate::errors::ConversionError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BerError {
    #[error("unexpected end of data at offset {0}")]
    UnexpectedEof(usize),

    #[error("indefinite length at offset {0}")]
    IndefiniteLength(usize),

    #[error("length at offset {0} does not fit")]
    LengthOverflow(usize),

    #[error("tag number at offset {0} does not fit")]
    TagOverflow(usize),

    #[error("expected {expected}, found tag {found:#04x} at offset {offset}")]
    UnexpectedTag {
        expected: &'static str,
        found: u8,
        offset: usize,
    },

    #[error("integer at offset {0} is too large")]
    IntegerOverflow(usize),
}

impl From<BerError> for ConversionError {
    fn from(e: BerError) -> Self {
        ConversionError::structural(super::ldap::ID, e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagClass {
    Universal,
    Application,
    Context,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub class: TagClass,
    pub constructed: bool,
    pub number: u32,
    /// First identifier octet as it appeared on the wire.
    pub leading: u8,
}

impl Tag {
    pub fn is(&self, class: TagClass, number: u32) -> bool {
        self.class == class && self.number == number
    }
}

pub const INTEGER: u32 = 2;
pub const OCTET_STRING: u32 = 4;
pub const ENUMERATED: u32 = 10;
pub const SEQUENCE: u32 = 16;

/// One tag-length-value triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    pub tag: Tag,
    /// Whole encoding, identifier octets included.
    pub span: Range<usize>,
    pub value: Range<usize>,
}

/// Cursor over `data[start..end]`.
pub struct BerReader<'a> {
    data: &'a [u8],
    x: usize,
    end: usize,
}

impl<'a> BerReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            x: 0,
            end: data.len(),
        }
    }

    /// Reader over the value of a constructed TLV read from the same buffer.
    pub fn inside(data: &'a [u8], tlv: &Tlv) -> Self {
        Self {
            data,
            x: tlv.value.start,
            end: tlv.value.end,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x >= self.end
    }

    pub fn offset(&self) -> usize {
        self.x
    }

    fn byte(&mut self) -> Result<u8, BerError> {
        if self.x >= self.end {
            return Err(BerError::UnexpectedEof(self.x));
        }
        let b = self.data[self.x];
        self.x += 1;
        Ok(b)
    }

    fn tag(&mut self) -> Result<Tag, BerError> {
        let start = self.x;
        let leading = self.byte()?;
        let class = match leading >> 6 {
            0 => TagClass::Universal,
            1 => TagClass::Application,
            2 => TagClass::Context,
            _ => TagClass::Private,
        };
        let mut number = u32::from(leading & 0x1f);
        if number == 0x1f {
            number = 0;
            loop {
                let b = self.byte()?;
                number = number
                    .checked_mul(128)
                    .map(|n| n | u32::from(b & 0x7f))
                    .ok_or(BerError::TagOverflow(start))?;
                if b & 0x80 == 0 {
                    break;
                }
            }
        }
        Ok(Tag {
            class,
            constructed: leading & 0x20 != 0,
            number,
            leading,
        })
    }

    fn length(&mut self) -> Result<usize, BerError> {
        let start = self.x;
        let first = self.byte()?;
        if first < 0x80 {
            return Ok(usize::from(first));
        }
        let count = usize::from(first & 0x7f);
        if count == 0 {
            return Err(BerError::IndefiniteLength(start));
        }
        if count > std::mem::size_of::<usize>() {
            return Err(BerError::LengthOverflow(start));
        }
        let mut length = 0usize;
        for _ in 0..count {
            length = (length << 8) | usize::from(self.byte()?);
        }
        Ok(length)
    }

    /// Read the next TLV and step over its value.
    pub fn read(&mut self) -> Result<Tlv, BerError> {
        let start = self.x;
        let tag = self.tag()?;
        let length = self.length()?;
        let value_start = self.x;
        let value_end = value_start
            .checked_add(length)
            .filter(|end| *end <= self.end)
            .ok_or(BerError::UnexpectedEof(value_start))?;
        self.x = value_end;
        Ok(Tlv {
            tag,
            span: start..value_end,
            value: value_start..value_end,
        })
    }

    /// Next TLV only if it carries the given tag.
    pub fn read_optional(&mut self, class: TagClass, number: u32) -> Result<Option<Tlv>, BerError> {
        if self.is_empty() {
            return Ok(None);
        }
        let saved = self.x;
        let tlv = self.read()?;
        if tlv.tag.is(class, number) {
            Ok(Some(tlv))
        } else {
            self.x = saved;
            Ok(None)
        }
    }

    pub fn expect(&mut self, class: TagClass, number: u32, expected: &'static str) -> Result<Tlv, BerError> {
        let offset = self.x;
        let tlv = self.read()?;
        if !tlv.tag.is(class, number) {
            return Err(BerError::UnexpectedTag {
                expected,
                found: tlv.tag.leading,
                offset,
            });
        }
        Ok(tlv)
    }

    /// All TLVs up to the end of this reader's window.
    pub fn read_all(&mut self) -> Result<Vec<Tlv>, BerError> {
        let mut items = Vec::new();
        while !self.is_empty() {
            items.push(self.read()?);
        }
        Ok(items)
    }

    pub fn value(&self, tlv: &Tlv) -> &'a [u8] {
        &self.data[tlv.value.clone()]
    }
}

/// Two's complement big-endian integer.
pub fn integer(bytes: &[u8], offset: usize) -> Result<i64, BerError> {
    if bytes.len() > 8 {
        return Err(BerError::IntegerOverflow(offset));
    }
    let Some(first) = bytes.first() else {
        return Ok(0);
    };
    let mut value: i64 = if first & 0x80 != 0 { -1 } else { 0 };
    for b in bytes {
        value = (value << 8) | i64::from(*b);
    }
    Ok(value)
}

pub fn boolean(bytes: &[u8]) -> bool {
    bytes.iter().any(|b| *b != 0)
}
