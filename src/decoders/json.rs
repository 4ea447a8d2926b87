// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::Value;

use crate::element::{Element, ElementRef};
use crate::engine::{ConversionContext, Phase};
use crate::errors::ConversionError;
use crate::facets::{JsonChild, JsonFacet, JsonKind};
use crate::traits::{ConversionPlugin, PluginOutcome};

pub const ID: &str = "json";

/// Structures JSON objects and arrays one level deep per element; nested
/// containers are queued and structured when their turn comes.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDecoder;

impl ConversionPlugin for JsonDecoder {
    fn id(&self) -> &'static str {
        ID
    }

    fn phase(&self) -> Phase {
        Phase::ProtocolParsing
    }

    fn priority(&self) -> i32 {
        10
    }

    fn convert(
        &self,
        element: &ElementRef,
        ctx: &mut ConversionContext<'_>,
    ) -> Result<PluginOutcome, ConversionError> {
        let content = element.content();
        let Some(first) = content.iter().find(|b| !b.is_ascii_whitespace()) else {
            return Ok(PluginOutcome::NotApplicable);
        };
        if *first != b'{' && *first != b'[' {
            return Ok(PluginOutcome::NotApplicable);
        }
        if let Some(skip) = ctx.size_guard(content.len()) {
            return Ok(skip);
        }
        let text = element.text();
        let Ok(value) = serde_json::from_str::<Value>(&text) else {
            return Ok(PluginOutcome::NotApplicable);
        };

        let members: Vec<(String, Value)> = match value {
            Value::Object(map) => map.into_iter().collect(),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
            _ => return Ok(PluginOutcome::NotApplicable),
        };
        let kind = if *first == b'{' {
            JsonKind::Object
        } else {
            JsonKind::Array
        };

        let mut children = Vec::with_capacity(members.len());
        for (key, member) in members {
            let member_kind = JsonKind::of(&member);
            let child_text = match &member {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let child = Element::new_child(element.charset().encode(&child_text), element);
            if matches!(member_kind, JsonKind::String | JsonKind::Object | JsonKind::Array) {
                ctx.queue(child.clone());
            }
            children.push(JsonChild {
                key,
                element: child,
                kind: member_kind,
            });
        }

        element.add_facet(JsonFacet {
            kind,
            children,
            pretty: text.trim().contains('\n'),
        })?;
        element.set_used_bytes(element.len());
        Ok(PluginOutcome::Converted)
    }
}
