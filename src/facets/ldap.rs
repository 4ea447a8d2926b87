// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

use super::facet_variant;
use crate::element::ElementRef;

pub const OID_START_TLS: &str = "1.3.6.1.4.1.1466.20037";
pub const OID_PASSWORD_MODIFY: &str = "1.3.6.1.4.1.4203.1.11.1";
pub const OID_WHO_AM_I: &str = "1.3.6.1.4.1.4203.1.11.3";
pub const OID_CANCEL: &str = "1.3.6.1.1.8";

/// LDAPv3 protocol operations, including the well-known extended operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LdapOperationType {
    BindRequest,
    BindResponse,
    UnbindRequest,
    SearchRequest,
    SearchResultEntry,
    SearchResultDone,
    SearchResultReference,
    ModifyRequest,
    ModifyResponse,
    AddRequest,
    AddResponse,
    DelRequest,
    DelResponse,
    ModifyDnRequest,
    ModifyDnResponse,
    CompareRequest,
    CompareResponse,
    AbandonRequest,
    ExtendedRequest,
    ExtendedResponse,
    IntermediateResponse,
    StartTlsRequest,
    StartTlsResponse,
    PasswordModifyRequest,
    PasswordModifyResponse,
    WhoAmIRequest,
    WhoAmIResponse,
    CancelRequest,
    CancelResponse,
    Unknown,
}

impl LdapOperationType {
    /// Standard operation for an application tag number (RFC 4511 section 4.2).
    pub fn from_tag_number(number: u32) -> Self {
        use LdapOperationType::*;
        match number {
            0 => BindRequest,
            1 => BindResponse,
            2 => UnbindRequest,
            3 => SearchRequest,
            4 => SearchResultEntry,
            5 => SearchResultDone,
            6 => ModifyRequest,
            7 => ModifyResponse,
            8 => AddRequest,
            9 => AddResponse,
            10 => DelRequest,
            11 => DelResponse,
            12 => ModifyDnRequest,
            13 => ModifyDnResponse,
            14 => CompareRequest,
            15 => CompareResponse,
            16 => AbandonRequest,
            19 => SearchResultReference,
            23 => ExtendedRequest,
            24 => ExtendedResponse,
            25 => IntermediateResponse,
            _ => Unknown,
        }
    }

    /// Refine a generic extended operation by the OID it carries.
    pub fn refine_extended(self, oid: &str) -> Self {
        use LdapOperationType::*;
        let request = match self {
            ExtendedRequest => true,
            ExtendedResponse | IntermediateResponse => false,
            other => return other,
        };
        match (oid, request) {
            (OID_START_TLS, true) => StartTlsRequest,
            (OID_START_TLS, false) => StartTlsResponse,
            (OID_PASSWORD_MODIFY, true) => PasswordModifyRequest,
            (OID_PASSWORD_MODIFY, false) => PasswordModifyResponse,
            (OID_WHO_AM_I, true) => WhoAmIRequest,
            (OID_WHO_AM_I, false) => WhoAmIResponse,
            (OID_CANCEL, true) => CancelRequest,
            (OID_CANCEL, false) => CancelResponse,
            _ => self,
        }
    }

    pub fn is_extended(&self) -> bool {
        use LdapOperationType::*;
        !matches!(
            self,
            BindRequest
                | BindResponse
                | UnbindRequest
                | SearchRequest
                | SearchResultEntry
                | SearchResultDone
                | SearchResultReference
                | ModifyRequest
                | ModifyResponse
                | AddRequest
                | AddResponse
                | DelRequest
                | DelResponse
                | ModifyDnRequest
                | ModifyDnResponse
                | CompareRequest
                | CompareResponse
                | AbandonRequest
                | Unknown
        )
    }

    /// Whether the operation body is an LDAPResult.
    pub fn is_result(&self) -> bool {
        use LdapOperationType::*;
        matches!(
            self,
            BindResponse
                | SearchResultDone
                | ModifyResponse
                | AddResponse
                | DelResponse
                | ModifyDnResponse
                | CompareResponse
                | ExtendedResponse
                | StartTlsResponse
                | PasswordModifyResponse
                | WhoAmIResponse
                | CancelResponse
        )
    }

    pub fn is_request(&self) -> bool {
        use LdapOperationType::*;
        matches!(
            self,
            BindRequest
                | UnbindRequest
                | SearchRequest
                | ModifyRequest
                | AddRequest
                | DelRequest
                | ModifyDnRequest
                | CompareRequest
                | AbandonRequest
                | ExtendedRequest
                | StartTlsRequest
                | PasswordModifyRequest
                | WhoAmIRequest
                | CancelRequest
        )
    }
}

impl fmt::Display for LdapOperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The LDAPMessage envelope: message id and the protocol operation.
#[derive(Debug, Clone)]
pub struct LdapMessageFacet {
    pub message_id: ElementRef,
    pub protocol_operation: ElementRef,
}

facet_variant!(LdapMessageFacet, LdapMessage, "LdapMessage" {
    fn children(&self) -> Vec<(String, ElementRef)> {
        vec![
            ("messageId".to_string(), self.message_id.clone()),
            ("protocolOperation".to_string(), self.protocol_operation.clone()),
        ]
    }
});

/// A protocol operation and the fields it declares. Fields that do not apply
/// to the operation are simply absent.
#[derive(Debug, Clone)]
pub struct LdapOperationFacet {
    pub operation: LdapOperationType,
    pub fields: Vec<(String, ElementRef)>,
}

impl LdapOperationFacet {
    pub fn field(&self, name: &str) -> Option<ElementRef> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, element)| element.clone())
    }
}

facet_variant!(LdapOperationFacet, LdapOperation, "LdapOperation" {
    fn children(&self) -> Vec<(String, ElementRef)> {
        self.fields.clone()
    }
});

/// An attribute (or a modify change) with its value set. `values` carries a
/// `List` facet with one item per value.
#[derive(Debug, Clone)]
pub struct LdapAttributeFacet {
    /// Modify operation (`add`, `delete`, `replace`, `increment`); changes only.
    pub operation: Option<ElementRef>,
    pub attribute_type: ElementRef,
    pub values: ElementRef,
}

facet_variant!(LdapAttributeFacet, LdapAttribute, "LdapAttribute" {
    fn children(&self) -> Vec<(String, ElementRef)> {
        let mut children = Vec::new();
        if let Some(operation) = &self.operation {
            children.push(("operation".to_string(), operation.clone()));
        }
        children.push(("type".to_string(), self.attribute_type.clone()));
        children.push(("values".to_string(), self.values.clone()));
        children
    }
});
