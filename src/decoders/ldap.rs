// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! LDAPv3 messages (RFC 4511) in BER.
//!
//! Only runs on converters that activated the `ldap` protocol: a leading
//! SEQUENCE is far too common in binary content to claim it unprompted.

use bytes::Bytes;

use super::ber::{self, BerError, BerReader, TagClass, Tlv, ENUMERATED, INTEGER, OCTET_STRING, SEQUENCE};
use crate::element::{Element, ElementRef};
use crate::engine::{ConversionContext, Phase};
use crate::errors::{ConversionError, ConversionResult};
use crate::facets::{
    LdapAttributeFacet, LdapMessageFacet, LdapOperationFacet, LdapOperationType, ListFacet,
    NoteLevel, RequestFacet, ResponseFacet,
};
use crate::traits::{ConversionPlugin, PluginOutcome};

pub const ID: &str = "ldap";
pub const PROTOCOL: &str = "ldap";

const BOOLEAN: u32 = 1;
const SET: u32 = 17;

#[derive(Debug, Default, Clone, Copy)]
pub struct LdapDecoder;

impl ConversionPlugin for LdapDecoder {
    fn id(&self) -> &'static str {
        ID
    }

    fn phase(&self) -> Phase {
        Phase::ProtocolParsing
    }

    fn active_only_for(&self) -> Option<&'static str> {
        Some(PROTOCOL)
    }

    fn convert(
        &self,
        element: &ElementRef,
        ctx: &mut ConversionContext<'_>,
    ) -> Result<PluginOutcome, ConversionError> {
        let content = element.content().clone();
        if content.first() != Some(&0x30) {
            return Ok(PluginOutcome::NotApplicable);
        }
        if let Some(skip) = ctx.size_guard(content.len()) {
            return Ok(skip);
        }

        // A leading '0' byte is common in text; an unreadable outer SEQUENCE is
        // not an LDAP message.
        let Ok(message) = BerReader::new(&content).read() else {
            return Ok(PluginOutcome::NotApplicable);
        };
        let Ok(items) = BerReader::inside(&content, &message).read_all() else {
            return Ok(PluginOutcome::NotApplicable);
        };
        if items.len() < 2 || !items[0].tag.is(TagClass::Universal, INTEGER) {
            return Ok(PluginOutcome::NotApplicable);
        }
        let message_id = ber::integer(&content[items[0].value.clone()], items[0].value.start)?;
        let op = &items[1];
        let operation = infer_operation(&content, op);

        let message_id_el = Element::new_child(message_id.to_string(), element);
        let op_el = Element::new_child(content.slice(op.span.clone()), element);
        if operation == LdapOperationType::Unknown {
            op_el.add_note(
                NoteLevel::Info,
                format!("unrecognized protocol operation tag 0x{:02x}", op.tag.leading),
            );
        }

        let mut fields = Fields::new(&content, &op_el);
        if let Err(e) = fields.decode(operation, op) {
            if !ctx.lenient() || !e.is_recoverable() {
                return Err(e);
            }
            op_el.add_note(NoteLevel::Warn, format!("{} fields incomplete: {}", operation, e));
        }
        let Fields { entries, queued, .. } = fields;
        for value in queued {
            ctx.queue(value);
        }

        op_el.add_facet(LdapOperationFacet {
            operation,
            fields: entries,
        })?;
        element.add_facet(LdapMessageFacet {
            message_id: message_id_el,
            protocol_operation: op_el,
        })?;
        if operation.is_request() {
            element.add_facet(RequestFacet { protocol: PROTOCOL })?;
        } else if operation != LdapOperationType::Unknown {
            element.add_facet(ResponseFacet { protocol: PROTOCOL })?;
        }
        if items.len() > 2 {
            element.add_note(NoteLevel::Info, "message controls present, not decoded");
        }
        element.set_used_bytes(message.span.end);
        Ok(PluginOutcome::Converted)
    }
}

/// Application tag first, then the extended-operation OID when there is one.
/// Any other tag class is not a protocol operation.
fn infer_operation(content: &[u8], op: &Tlv) -> LdapOperationType {
    use LdapOperationType::*;
    if op.tag.class != TagClass::Application {
        return Unknown;
    }
    let base = LdapOperationType::from_tag_number(op.tag.number);
    let name_tag = match base {
        ExtendedRequest | IntermediateResponse => 0,
        ExtendedResponse => 10,
        _ => return base,
    };
    let mut reader = BerReader::inside(content, op);
    while let Ok(tlv) = reader.read() {
        if tlv.tag.is(TagClass::Context, name_tag) {
            return base.refine_extended(&String::from_utf8_lossy(reader.value(&tlv)));
        }
    }
    base
}

/// Field elements collected for one operation.
struct Fields<'a> {
    content: &'a Bytes,
    op: &'a ElementRef,
    entries: Vec<(String, ElementRef)>,
    queued: Vec<ElementRef>,
}

impl<'a> Fields<'a> {
    fn new(content: &'a Bytes, op: &'a ElementRef) -> Self {
        Self {
            content,
            op,
            entries: Vec::new(),
            queued: Vec::new(),
        }
    }

    fn push(&mut self, name: &str, element: ElementRef) {
        self.entries.push((name.to_string(), element));
    }

    /// Field holding the raw value octets.
    fn raw(&mut self, name: &str, tlv: &Tlv) {
        let element = Element::new_child(self.content.slice(tlv.value.clone()), self.op);
        self.push(name, element);
    }

    fn text(&mut self, name: &str, text: impl Into<String>) {
        let element = Element::new_child(text.into(), self.op);
        self.push(name, element);
    }

    fn number(&mut self, name: &str, tlv: &Tlv) -> ConversionResult<i64> {
        let value = ber::integer(&self.content[tlv.value.clone()], tlv.value.start)?;
        self.text(name, value.to_string());
        Ok(value)
    }

    fn flag(&mut self, name: &str, tlv: &Tlv) {
        let value = ber::boolean(&self.content[tlv.value.clone()]);
        self.text(name, value.to_string());
    }

    fn reader(&self, tlv: &Tlv) -> BerReader<'a> {
        BerReader::inside(self.content, tlv)
    }

    fn octets(&self, reader: &mut BerReader<'_>, what: &'static str) -> Result<Tlv, BerError> {
        reader.expect(TagClass::Universal, OCTET_STRING, what)
    }

    /// List of OCTET STRINGs, e.g. requested attributes or referral URIs.
    fn string_list(&mut self, name: &str, tlv: &Tlv) -> ConversionResult<()> {
        let list = Element::new_child(self.content.slice(tlv.value.clone()), self.op);
        let items = self
            .reader(tlv)
            .read_all()?
            .iter()
            .map(|item| Element::new_child(self.content.slice(item.value.clone()), &list))
            .collect();
        list.add_facet(ListFacet::new(items, ""))?;
        self.push(name, list);
        Ok(())
    }

    /// Decorate `target` with `type` plus `SET OF value` read from `tlv`;
    /// the values are queued.
    fn attribute(
        &mut self,
        target: &ElementRef,
        tlv: &Tlv,
        operation: Option<ElementRef>,
    ) -> ConversionResult<()> {
        let mut reader = self.reader(tlv);
        let attribute_type = self.octets(&mut reader, "attribute type")?;
        let vals = reader.expect(TagClass::Universal, SET, "attribute values")?;

        let values = Element::new_child(self.content.slice(vals.value.clone()), target);
        let mut items = Vec::new();
        for value in self.reader(&vals).read_all()? {
            let item = Element::new_child(self.content.slice(value.value.clone()), &values);
            self.queued.push(item.clone());
            items.push(item);
        }
        values.add_facet(ListFacet::new(items, ""))?;
        target.add_facet(LdapAttributeFacet {
            operation,
            attribute_type: Element::new_child(
                self.content.slice(attribute_type.value.clone()),
                target,
            ),
            values,
        })?;
        Ok(())
    }

    /// `SEQUENCE OF PartialAttribute` as a list of attribute elements.
    fn attributes(&mut self, name: &str, tlv: &Tlv) -> ConversionResult<()> {
        let list = Element::new_child(self.content.slice(tlv.span.clone()), self.op);
        let mut items = Vec::new();
        for entry in self.reader(tlv).read_all()? {
            let attribute = Element::new_child(self.content.slice(entry.span.clone()), &list);
            self.attribute(&attribute, &entry, None)?;
            items.push(attribute);
        }
        list.add_facet(ListFacet::new(items, ""))?;
        self.push(name, list);
        Ok(())
    }

    fn changes(&mut self, tlv: &Tlv) -> ConversionResult<()> {
        let list = Element::new_child(self.content.slice(tlv.span.clone()), self.op);
        let mut items = Vec::new();
        for change in self.reader(tlv).read_all()? {
            let mut reader = self.reader(&change);
            let operation = reader.expect(TagClass::Universal, ENUMERATED, "change operation")?;
            let code = ber::integer(&self.content[operation.value.clone()], operation.value.start)?;
            let modification = reader.expect(TagClass::Universal, SEQUENCE, "modification")?;
            let change_el = Element::new_child(self.content.slice(change.span.clone()), &list);
            let operation_el = Element::new_child(change_operation(code), &change_el);
            self.queued.push(change_el.clone());
            self.attribute(&change_el, &modification, Some(operation_el))?;
            items.push(change_el);
        }
        list.add_facet(ListFacet::new(items, ""))?;
        self.push("changes", list);
        Ok(())
    }

    fn result(&mut self, reader: &mut BerReader<'_>) -> ConversionResult<()> {
        let code = reader.expect(TagClass::Universal, ENUMERATED, "resultCode")?;
        self.number("resultCode", &code)?;
        let matched = self.octets(reader, "matchedDN")?;
        self.raw("matchedDn", &matched);
        let diagnostic = self.octets(reader, "diagnosticMessage")?;
        self.raw("diagnosticMessage", &diagnostic);
        if let Some(referral) = reader.read_optional(TagClass::Context, 3)? {
            self.string_list("referral", &referral)?;
        }
        Ok(())
    }

    fn decode(&mut self, operation: LdapOperationType, op: &Tlv) -> ConversionResult<()> {
        use LdapOperationType::*;
        let mut reader = self.reader(op);
        match operation {
            BindRequest => {
                let version = reader.expect(TagClass::Universal, INTEGER, "version")?;
                self.number("version", &version)?;
                let dn = self.octets(&mut reader, "bind dn")?;
                self.raw("dn", &dn);
                let auth = reader.read()?;
                match (auth.tag.class, auth.tag.number) {
                    (TagClass::Context, 0) => self.text("authType", "simple"),
                    (TagClass::Context, 3) => {
                        self.text("authType", "sasl");
                        let mut sasl = self.reader(&auth);
                        let mechanism = self.octets(&mut sasl, "sasl mechanism")?;
                        self.raw("saslMechanism", &mechanism);
                    }
                    (_, number) => self.text("authType", number.to_string()),
                }
            }
            UnbindRequest => {}
            SearchRequest => {
                let base = self.octets(&mut reader, "baseObject")?;
                self.raw("baseDn", &base);
                let scope = reader.expect(TagClass::Universal, ENUMERATED, "scope")?;
                let scope = ber::integer(&self.content[scope.value.clone()], scope.value.start)?;
                self.text("scope", search_scope(scope));
                let deref = reader.expect(TagClass::Universal, ENUMERATED, "derefAliases")?;
                let deref = ber::integer(&self.content[deref.value.clone()], deref.value.start)?;
                self.text("derefAliases", deref_aliases(deref));
                let size = reader.expect(TagClass::Universal, INTEGER, "sizeLimit")?;
                self.number("sizeLimit", &size)?;
                let time = reader.expect(TagClass::Universal, INTEGER, "timeLimit")?;
                self.number("timeLimit", &time)?;
                let types_only = reader.expect(TagClass::Universal, BOOLEAN, "typesOnly")?;
                self.flag("typesOnly", &types_only);
                let filter = reader.read()?;
                let rendered = render_filter(self.content, &filter)?;
                self.text("filter", rendered);
                let attributes = reader.expect(TagClass::Universal, SEQUENCE, "attributes")?;
                self.string_list("attributes", &attributes)?;
            }
            SearchResultEntry | AddRequest => {
                let dn = self.octets(&mut reader, "object name")?;
                self.raw("dn", &dn);
                let attributes = reader.expect(TagClass::Universal, SEQUENCE, "attributes")?;
                self.attributes("attributes", &attributes)?;
            }
            SearchResultReference => {
                self.string_list("uris", op)?;
            }
            ModifyRequest => {
                let dn = self.octets(&mut reader, "object")?;
                self.raw("dn", &dn);
                let changes = reader.expect(TagClass::Universal, SEQUENCE, "changes")?;
                self.changes(&changes)?;
            }
            DelRequest => self.raw("dn", op),
            ModifyDnRequest => {
                let dn = self.octets(&mut reader, "entry")?;
                self.raw("dn", &dn);
                let rdn = self.octets(&mut reader, "newrdn")?;
                self.raw("newRdn", &rdn);
                let delete_old = reader.expect(TagClass::Universal, BOOLEAN, "deleteoldrdn")?;
                self.flag("deleteOldRdn", &delete_old);
                if let Some(superior) = reader.read_optional(TagClass::Context, 0)? {
                    self.raw("newSuperior", &superior);
                }
            }
            CompareRequest => {
                let dn = self.octets(&mut reader, "entry")?;
                self.raw("dn", &dn);
                let ava = reader.expect(TagClass::Universal, SEQUENCE, "ava")?;
                let mut ava_reader = self.reader(&ava);
                let attribute = self.octets(&mut ava_reader, "attributeDesc")?;
                self.raw("attribute", &attribute);
                let value = self.octets(&mut ava_reader, "assertionValue")?;
                self.raw("assertionValue", &value);
            }
            AbandonRequest => {
                self.number("abandonId", op)?;
            }
            ExtendedRequest | StartTlsRequest | PasswordModifyRequest | WhoAmIRequest
            | CancelRequest => {
                let name = reader.expect(TagClass::Context, 0, "requestName")?;
                self.raw("requestName", &name);
                if let Some(value) = reader.read_optional(TagClass::Context, 1)? {
                    self.raw("requestValue", &value);
                    self.extended_request_value(operation, &value)?;
                }
            }
            BindResponse | SearchResultDone | ModifyResponse | AddResponse | DelResponse
            | ModifyDnResponse | CompareResponse => {
                self.result(&mut reader)?;
                if operation == BindResponse {
                    if let Some(creds) = reader.read_optional(TagClass::Context, 7)? {
                        self.raw("serverSaslCreds", &creds);
                    }
                }
            }
            ExtendedResponse | StartTlsResponse | PasswordModifyResponse | WhoAmIResponse
            | CancelResponse => {
                self.result(&mut reader)?;
                if let Some(name) = reader.read_optional(TagClass::Context, 10)? {
                    self.raw("responseName", &name);
                }
                if let Some(value) = reader.read_optional(TagClass::Context, 11)? {
                    self.raw("responseValue", &value);
                    self.extended_response_value(operation, &value)?;
                }
            }
            IntermediateResponse => {
                if let Some(name) = reader.read_optional(TagClass::Context, 0)? {
                    self.raw("responseName", &name);
                }
                if let Some(value) = reader.read_optional(TagClass::Context, 1)? {
                    self.raw("responseValue", &value);
                }
            }
            Unknown => {}
        }
        Ok(())
    }

    fn extended_request_value(&mut self, operation: LdapOperationType, value: &Tlv) -> ConversionResult<()> {
        let inner = BerReader::inside(self.content, value).read_all()?;
        let Some(sequence) = inner.first() else {
            return Ok(());
        };
        match operation {
            LdapOperationType::PasswordModifyRequest => {
                let mut reader = self.reader(sequence);
                if let Some(user) = reader.read_optional(TagClass::Context, 0)? {
                    self.raw("userIdentity", &user);
                }
                if let Some(old) = reader.read_optional(TagClass::Context, 1)? {
                    self.raw("oldPassword", &old);
                }
                if let Some(new) = reader.read_optional(TagClass::Context, 2)? {
                    self.raw("newPassword", &new);
                }
            }
            LdapOperationType::CancelRequest => {
                let mut reader = self.reader(sequence);
                let id = reader.expect(TagClass::Universal, INTEGER, "cancelID")?;
                self.number("cancelId", &id)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn extended_response_value(&mut self, operation: LdapOperationType, value: &Tlv) -> ConversionResult<()> {
        match operation {
            LdapOperationType::WhoAmIResponse => self.raw("authzId", value),
            LdapOperationType::PasswordModifyResponse => {
                let inner = BerReader::inside(self.content, value).read_all()?;
                if let Some(sequence) = inner.first() {
                    if let Some(generated) = self.reader(sequence).read_optional(TagClass::Context, 0)? {
                        self.raw("genPassword", &generated);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn search_scope(code: i64) -> String {
    match code {
        0 => "baseObject".to_string(),
        1 => "singleLevel".to_string(),
        2 => "wholeSubtree".to_string(),
        3 => "subordinateSubtree".to_string(),
        other => other.to_string(),
    }
}

fn deref_aliases(code: i64) -> String {
    match code {
        0 => "neverDerefAliases".to_string(),
        1 => "derefInSearching".to_string(),
        2 => "derefFindingBaseObj".to_string(),
        3 => "derefAlways".to_string(),
        other => other.to_string(),
    }
}

fn change_operation(code: i64) -> String {
    match code {
        0 => "add".to_string(),
        1 => "delete".to_string(),
        2 => "replace".to_string(),
        3 => "increment".to_string(),
        other => other.to_string(),
    }
}

/// Escape a filter value per RFC 4515 section 3.
fn escape_filter_value(value: &[u8]) -> String {
    let mut out = String::with_capacity(value.len());
    match std::str::from_utf8(value) {
        Ok(text) => {
            for c in text.chars() {
                match c {
                    '*' => out.push_str("\\2a"),
                    '(' => out.push_str("\\28"),
                    ')' => out.push_str("\\29"),
                    '\\' => out.push_str("\\5c"),
                    '\0' => out.push_str("\\00"),
                    c => out.push(c),
                }
            }
        }
        Err(_) => {
            for b in value {
                out.push_str(&format!("\\{:02x}", b));
            }
        }
    }
    out
}

/// String representation of a search filter (RFC 4515).
pub fn render_filter(content: &[u8], filter: &Tlv) -> Result<String, BerError> {
    let value = &content[filter.value.clone()];
    let text = |bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned();
    let ava = |op: &str| -> Result<String, BerError> {
        let mut reader = BerReader::inside(content, filter);
        let attribute = reader.expect(TagClass::Universal, OCTET_STRING, "attributeDesc")?;
        let assertion = reader.expect(TagClass::Universal, OCTET_STRING, "assertionValue")?;
        Ok(format!(
            "({}{}{})",
            text(reader.value(&attribute)),
            op,
            escape_filter_value(reader.value(&assertion))
        ))
    };

    if filter.tag.class != TagClass::Context {
        return Err(BerError::UnexpectedTag {
            expected: "filter",
            found: filter.tag.leading,
            offset: filter.span.start,
        });
    }
    match filter.tag.number {
        0 | 1 => {
            let mut out = String::from(if filter.tag.number == 0 { "(&" } else { "(|" });
            for inner in BerReader::inside(content, filter).read_all()? {
                out.push_str(&render_filter(content, &inner)?);
            }
            out.push(')');
            Ok(out)
        }
        2 => {
            let inner = BerReader::inside(content, filter).read()?;
            Ok(format!("(!{})", render_filter(content, &inner)?))
        }
        3 => ava("="),
        5 => ava(">="),
        6 => ava("<="),
        8 => ava("~="),
        4 => {
            let mut reader = BerReader::inside(content, filter);
            let attribute = reader.expect(TagClass::Universal, OCTET_STRING, "type")?;
            let parts = reader.expect(TagClass::Universal, SEQUENCE, "substrings")?;
            let mut initial = String::new();
            let mut any = Vec::new();
            let mut last = String::new();
            for part in BerReader::inside(content, &parts).read_all()? {
                let escaped = escape_filter_value(&content[part.value.clone()]);
                match part.tag.number {
                    0 => initial = escaped,
                    1 => any.push(escaped),
                    _ => last = escaped,
                }
            }
            let mut middle = String::from("*");
            for piece in any {
                middle.push_str(&piece);
                middle.push('*');
            }
            Ok(format!(
                "({}={}{}{})",
                text(reader.value(&attribute)),
                initial,
                middle,
                last
            ))
        }
        7 => Ok(format!("({}=*)", text(value))),
        9 => {
            let mut rule = None;
            let mut attribute = None;
            let mut assertion = Vec::new();
            let mut dn_attributes = false;
            for part in BerReader::inside(content, filter).read_all()? {
                let bytes = &content[part.value.clone()];
                match part.tag.number {
                    1 => rule = Some(text(bytes)),
                    2 => attribute = Some(text(bytes)),
                    3 => assertion = bytes.to_vec(),
                    4 => dn_attributes = ber::boolean(bytes),
                    _ => {}
                }
            }
            let mut out = String::from("(");
            out.push_str(attribute.as_deref().unwrap_or(""));
            if dn_attributes {
                out.push_str(":dn");
            }
            if let Some(rule) = rule {
                out.push(':');
                out.push_str(&rule);
            }
            out.push_str(":=");
            out.push_str(&escape_filter_value(&assertion));
            out.push(')');
            Ok(out)
        }
        _ => Err(BerError::UnexpectedTag {
            expected: "filter",
            found: filter.tag.leading,
            offset: filter.span.start,
        }),
    }
}
