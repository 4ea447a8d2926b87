// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};

use super::{pick, unsupported, WriteContext};
use crate::element::ElementRef;
use crate::errors::ModificationError;
use crate::facets::ListFacet;
use crate::traits::ElementWriter;

/// Joins list items with the spacing recorded at parse time.
///
/// Lists without a separator are views over binary structures (LDAP value
/// sets) and cannot be joined back.
#[derive(Debug, Default, Clone, Copy)]
pub struct ListWriter;

impl ElementWriter for ListWriter {
    fn name(&self) -> &'static str {
        "list"
    }

    fn can_write(&self, parent: &ElementRef) -> bool {
        parent
            .facet::<ListFacet>()
            .is_some_and(|list| !list.separator.is_empty())
    }

    fn write(
        &self,
        parent: &ElementRef,
        old_child: &ElementRef,
        new_child: Bytes,
        _ctx: &WriteContext<'_>,
    ) -> Result<Bytes, ModificationError> {
        let list = parent
            .facet::<ListFacet>()
            .filter(|list| list.items.iter().any(|i| Arc::ptr_eq(i, old_child)))
            .ok_or_else(|| unsupported(self.name(), parent, old_child))?;

        let mut out = BytesMut::new();
        for (i, item) in list.items.iter().enumerate() {
            out.put_slice(list.gap_before(i).as_bytes());
            out.put_slice(&pick(item, old_child, &new_child));
        }
        out.put_slice(list.trailer().as_bytes());
        Ok(out.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyStore;
    use crate::element::Element;

    #[test]
    fn test_join_with_recorded_separator() {
        let root = Element::new_root("a, b, c");
        let items: Vec<ElementRef> = ["a", "b", "c"]
            .iter()
            .map(|s| Element::new_child(s.to_string(), &root))
            .collect();
        root.add_facet(ListFacet::new(items.clone(), ", "))
        .unwrap();
        let keys = KeyStore::new();

        let out = ListWriter
            .write(&root, &items[1], Bytes::from_static(b"B"), &WriteContext::new(&keys))
            .unwrap();
        assert_eq!(out.as_ref(), b"a, B, c");
    }

    #[test]
    fn test_recorded_gaps_are_replayed() {
        let root = Element::new_root("a,b , c");
        let items: Vec<ElementRef> = ["a", "b", "c"]
            .iter()
            .map(|s| Element::new_child(s.to_string(), &root))
            .collect();
        let gaps = ["", ",", " , ", ""].iter().map(|g| g.to_string()).collect();
        root.add_facet(ListFacet::with_gaps(items.clone(), ",", gaps)).unwrap();
        let keys = KeyStore::new();

        let out = ListWriter
            .write(&root, &items[2], Bytes::from_static(b"C"), &WriteContext::new(&keys))
            .unwrap();
        assert_eq!(out.as_ref(), b"a,b , C");
    }

    #[test]
    fn test_binary_lists_are_not_claimed() {
        let root = Element::new_root("xy");
        root.add_facet(ListFacet::new(vec![Element::new_child("x", &root)], ""))
        .unwrap();

        assert!(!ListWriter.can_write(&root));
    }
}
