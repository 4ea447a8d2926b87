// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Typed interpretations attached to elements.
//!
//! Every recognised structure is one variant of the closed [`Facet`] enum. A
//! variant owns references to the child elements it decomposed its element's
//! content into and exposes them, in a stable order, through
//! [`FacetVariant::children`]. Keys may repeat (duplicate HTTP headers, repeated
//! query parameters).
//!
//! Consumers never match on [`Facet`] directly; they ask an element for a
//! variant type:
//!
//! ```
//! use wiretree::element::Element;
//! use wiretree::facets::{RequestFacet, ResponseFacet};
//!
//! let root = Element::new_root("GET / HTTP/1.1\r\n\r\n");
//! root.add_facet(RequestFacet { protocol: "http" }).unwrap();
//!
//! assert!(root.facet::<RequestFacet>().is_some());
//! assert!(root.facet::<ResponseFacet>().is_none());
//! ```

mod common;
mod envelope;
mod http;
mod json;
mod jwt;
mod ldap;
mod uri;

pub use common::{ListFacet, NoteFacet, NoteLevel, PairingFacet, RequestFacet, ResponseFacet};
pub use envelope::{AeadEnvelopeFacet, EnvelopeFlavor};
pub use http::{
    BodyFraming, HeaderEntry, HttpHeaderFacet, HttpMessageFacet, HttpRequestFacet,
    HttpResponseFacet, LineSeparator,
};
pub use json::{JsonChild, JsonFacet, JsonKind};
pub use jwt::{JweEncryptionInfo, JweFacet, JwtFacet, JwtSignatureFacet};
pub use ldap::{
    LdapAttributeFacet, LdapMessageFacet, LdapOperationFacet, LdapOperationType, OID_CANCEL,
    OID_PASSWORD_MODIFY, OID_START_TLS, OID_WHO_AM_I,
};
pub use uri::{UriFacet, UriParameterFacet};

use crate::element::ElementRef;

/// Implemented by every facet payload type so elements can hand out typed copies.
pub trait FacetVariant: Clone + Into<Facet> {
    const NAME: &'static str;

    fn from_facet(facet: &Facet) -> Option<&Self>;

    /// Ordered `(key, child)` pairs this facet decomposed its element into.
    fn children(&self) -> Vec<(String, ElementRef)> {
        Vec::new()
    }

    /// Key comparison used by path lookups. Exact by default.
    fn key_matches(&self, key: &str, wanted: &str) -> bool {
        key == wanted
    }

    /// Facets sharing a group name are mutually exclusive on one element.
    fn exclusive_group(&self) -> Option<&'static str> {
        None
    }
}

macro_rules! facet_enum {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        /// All interpretations an element can carry.
        #[derive(Debug, Clone)]
        pub enum Facet {
            $($variant($ty)),+
        }

        impl Facet {
            pub fn name(&self) -> &'static str {
                match self {
                    $(Facet::$variant(_) => <$ty as FacetVariant>::NAME),+
                }
            }

            pub fn children(&self) -> Vec<(String, ElementRef)> {
                match self {
                    $(Facet::$variant(inner) => inner.children()),+
                }
            }

            pub fn key_matches(&self, key: &str, wanted: &str) -> bool {
                match self {
                    $(Facet::$variant(inner) => inner.key_matches(key, wanted)),+
                }
            }

            pub fn exclusive_group(&self) -> Option<&'static str> {
                match self {
                    $(Facet::$variant(inner) => inner.exclusive_group()),+
                }
            }
        }

        $(
            impl From<$ty> for Facet {
                fn from(inner: $ty) -> Self {
                    Facet::$variant(inner)
                }
            }
        )+
    };
}

facet_enum! {
    HttpMessage(HttpMessageFacet),
    HttpRequest(HttpRequestFacet),
    HttpResponse(HttpResponseFacet),
    HttpHeaders(HttpHeaderFacet),
    Uri(UriFacet),
    UriParameter(UriParameterFacet),
    Json(JsonFacet),
    Jwt(JwtFacet),
    JwtSignature(JwtSignatureFacet),
    Jwe(JweFacet),
    LdapMessage(LdapMessageFacet),
    LdapOperation(LdapOperationFacet),
    LdapAttribute(LdapAttributeFacet),
    AeadEnvelope(AeadEnvelopeFacet),
    List(ListFacet),
    Note(NoteFacet),
    Request(RequestFacet),
    Response(ResponseFacet),
    Pairing(PairingFacet),
}

/// Implements [`FacetVariant`] for a payload type; the braces may override the
/// trait's default methods.
macro_rules! facet_variant {
    ($ty:ty, $variant:ident, $name:literal { $($body:tt)* }) => {
        impl $crate::facets::FacetVariant for $ty {
            const NAME: &'static str = $name;

            fn from_facet(facet: &$crate::facets::Facet) -> Option<&Self> {
                match facet {
                    $crate::facets::Facet::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            $($body)*
        }
    };
}

pub(crate) use facet_variant;
