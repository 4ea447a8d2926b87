// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use bytes::Bytes;

use crate::element::ElementRef;
use crate::errors::ModificationError;
use crate::writers::WriteContext;

/// Rebuilds a parent's bytes after one of its children changed.
///
/// Writers never touch the old tree; they return the new content for
/// `parent` and the modifier climbs one level up with it.
pub trait ElementWriter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this writer understands the facets on `parent`.
    fn can_write(&self, parent: &ElementRef) -> bool;

    fn write(
        &self,
        parent: &ElementRef,
        old_child: &ElementRef,
        new_child: Bytes,
        ctx: &WriteContext<'_>,
    ) -> Result<Bytes, ModificationError>;
}
