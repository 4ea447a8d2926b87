// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use bytes::{BufMut, Bytes, BytesMut};

use super::{pick, unsupported, WriteContext};
use crate::element::ElementRef;
use crate::errors::ModificationError;
use crate::facets::{UriFacet, UriParameterFacet};
use crate::traits::ElementWriter;

/// `path[?p1&p2...][#fragment]`. Empty parameters dropped at parse time stay dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct UriWriter;

impl ElementWriter for UriWriter {
    fn name(&self) -> &'static str {
        "uri"
    }

    fn can_write(&self, parent: &ElementRef) -> bool {
        parent.has_facet::<UriFacet>()
    }

    fn write(
        &self,
        parent: &ElementRef,
        old_child: &ElementRef,
        new_child: Bytes,
        _ctx: &WriteContext<'_>,
    ) -> Result<Bytes, ModificationError> {
        let uri = parent
            .facet::<UriFacet>()
            .ok_or_else(|| unsupported(self.name(), parent, old_child))?;

        let mut out = BytesMut::new();
        out.put_slice(&pick(&uri.basic_path, old_child, &new_child));
        if uri.query_marker || !uri.parameters.is_empty() {
            out.put_u8(b'?');
        }
        for (i, (_, parameter)) in uri.parameters.iter().enumerate() {
            if i > 0 {
                out.put_u8(b'&');
            }
            out.put_slice(&pick(parameter, old_child, &new_child));
        }
        if let Some(fragment) = &uri.fragment {
            out.put_u8(b'#');
            out.put_slice(fragment.as_bytes());
        }
        Ok(out.freeze())
    }
}

/// `key[=value]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UriParameterWriter;

impl ElementWriter for UriParameterWriter {
    fn name(&self) -> &'static str {
        "uri-parameter"
    }

    fn can_write(&self, parent: &ElementRef) -> bool {
        parent.has_facet::<UriParameterFacet>()
    }

    fn write(
        &self,
        parent: &ElementRef,
        old_child: &ElementRef,
        new_child: Bytes,
        _ctx: &WriteContext<'_>,
    ) -> Result<Bytes, ModificationError> {
        let parameter = parent
            .facet::<UriParameterFacet>()
            .ok_or_else(|| unsupported(self.name(), parent, old_child))?;

        let mut out = BytesMut::new();
        out.put_slice(&pick(&parameter.key, old_child, &new_child));
        if let Some(value) = &parameter.value {
            out.put_u8(b'=');
            out.put_slice(&pick(value, old_child, &new_child));
        }
        Ok(out.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyStore;
    use crate::element::Element;

    #[test]
    fn test_parameter_and_uri_rebuild() {
        let root = Element::new_root("/p?x=1&y#frag");
        let x = Element::new_child("x=1", &root);
        let x_value = Element::new_child("1", &x);
        x.add_facet(UriParameterFacet {
            key: Element::new_child("x", &x),
            value: Some(x_value.clone()),
        })
        .unwrap();
        let y = Element::new_child("y", &root);
        root.add_facet(UriFacet {
            basic_path: Element::new_child("/p", &root),
            parameters: vec![("x".to_string(), x.clone()), ("y".to_string(), y)],
            query_marker: true,
            fragment: Some("frag".to_string()),
        })
        .unwrap();
        let keys = KeyStore::new();
        let ctx = WriteContext::new(&keys);

        let new_x = UriParameterWriter
            .write(&x, &x_value, Bytes::from_static(b"2"), &ctx)
            .unwrap();
        assert_eq!(new_x.as_ref(), b"x=2");
        let new_uri = UriWriter.write(&root, &x, new_x, &ctx).unwrap();
        assert_eq!(new_uri.as_ref(), b"/p?x=2&y#frag");
    }
}
