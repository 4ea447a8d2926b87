// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Map, Value};

use super::{unsupported, WriteContext};
use crate::element::ElementRef;
use crate::errors::ModificationError;
use crate::facets::{JsonFacet, JsonKind};
use crate::traits::ElementWriter;

/// Re-serialises an object or array, keeping member order.
///
/// String members are written back as strings. Anything else must parse as
/// JSON; text that does not is written as a string.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonWriter;

fn member_value(kind: JsonKind, text: String) -> Value {
    if kind == JsonKind::String {
        return Value::String(text);
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

impl ElementWriter for JsonWriter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn can_write(&self, parent: &ElementRef) -> bool {
        parent.has_facet::<JsonFacet>()
    }

    fn write(
        &self,
        parent: &ElementRef,
        old_child: &ElementRef,
        new_child: Bytes,
        _ctx: &WriteContext<'_>,
    ) -> Result<Bytes, ModificationError> {
        let json = parent
            .facet::<JsonFacet>()
            .filter(|j| j.children.iter().any(|c| Arc::ptr_eq(&c.element, old_child)))
            .ok_or_else(|| unsupported(self.name(), parent, old_child))?;

        let members = json.children.iter().map(|child| {
            let text = if Arc::ptr_eq(&child.element, old_child) {
                child.element.charset().decode(&new_child)
            } else {
                child.element.text()
            };
            (child.key.clone(), member_value(child.kind, text))
        });
        let value = match json.kind {
            JsonKind::Object => Value::Object(members.collect::<Map<String, Value>>()),
            _ => Value::Array(members.map(|(_, v)| v).collect()),
        };

        let text = if json.pretty {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        }
        .map_err(|_| unsupported(self.name(), parent, old_child))?;
        Ok(Bytes::from(parent.charset().encode_like(&text, parent.content())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyStore;
    use crate::decoders::JsonDecoder;
    use crate::element::Element;
    use crate::engine::{ConversionContext, ConverterSettings};
    use crate::traits::ConversionPlugin;

    fn rewrite(source: &str, key: &str, new: &str) -> String {
        let settings = ConverterSettings::default();
        let keys = KeyStore::new();
        let mut ctx = ConversionContext::new(&settings, &keys);
        let root = Element::new_root(source.to_string());
        JsonDecoder.convert(&root, &mut ctx).unwrap();
        let child = root.children_named(key).remove(0);
        let out = JsonWriter
            .write(&root, &child, Bytes::from(new.to_string()), &WriteContext::new(&keys))
            .unwrap();
        String::from_utf8(out.to_vec()).unwrap()
    }

    #[test]
    fn test_member_kinds() {
        struct TestCase {
            source: &'static str,
            key: &'static str,
            new: &'static str,
            expected: &'static str,
        }

        let cases = vec![
            TestCase { source: r#"{"b":"x","a":1}"#, key: "b", new: "say \"hi\"", expected: r#"{"b":"say \"hi\"","a":1}"# },
            TestCase { source: r#"{"b":"x","a":1}"#, key: "a", new: "2.50", expected: r#"{"b":"x","a":2.50}"# },
            TestCase { source: r#"{"a":1}"#, key: "a", new: "not json", expected: r#"{"a":"not json"}"# },
            TestCase { source: r#"[true,{"k":null}]"#, key: "0", new: "false", expected: r#"[false,{"k":null}]"# },
        ];

        for case in cases {
            assert_eq!(rewrite(case.source, case.key, case.new), case.expected, "{}", case.source);
        }
    }

    #[test]
    fn test_pretty_source_stays_pretty() {
        let out = rewrite("{\n  \"a\": \"x\"\n}", "a", "y");
        assert_eq!(out, "{\n  \"a\": \"y\"\n}");
    }
}
