// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use crate::element::{Element, ElementRef};
use crate::engine::{ConversionContext, Phase};
use crate::errors::ConversionError;
use crate::facets::{HttpRequestFacet, UriFacet, UriParameterFacet};
use crate::traits::{ConversionPlugin, PluginOutcome};

pub const ID: &str = "uri";

/// Splits the request target of an HTTP request into path, query parameters
/// and fragment. Parameters stay percent-encoded.
///
/// Enrichment rather than parsing: it reads the parent's `HttpRequest` facet, and
/// re-enriching an existing tree adds the facet where it is missing.
#[derive(Debug, Default, Clone, Copy)]
pub struct UriDecoder;

impl ConversionPlugin for UriDecoder {
    fn id(&self) -> &'static str {
        ID
    }

    fn phase(&self) -> Phase {
        Phase::ContentEnrichment
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &[super::http::ID]
    }

    fn convert(
        &self,
        element: &ElementRef,
        ctx: &mut ConversionContext<'_>,
    ) -> Result<PluginOutcome, ConversionError> {
        let is_request_path = element
            .parent()
            .and_then(|p| p.facet::<HttpRequestFacet>())
            .map(|request| Arc::ptr_eq(&request.path, element))
            .unwrap_or(false);
        if !is_request_path || element.has_facet::<UriFacet>() {
            return Ok(PluginOutcome::NotApplicable);
        }

        let content = element.content().clone();
        let (before_fragment, fragment) = match content.iter().position(|b| *b == b'#') {
            Some(hash) => (
                hash,
                Some(String::from_utf8_lossy(&content[hash + 1..]).into_owned()),
            ),
            None => (content.len(), None),
        };
        let question = content[..before_fragment].iter().position(|b| *b == b'?');
        let path_end = question.unwrap_or(before_fragment);
        let basic_path = Element::new_child(content.slice(..path_end), element);

        let mut parameters = Vec::new();
        if let Some(question) = question {
            let mut start = question + 1;
            while start <= before_fragment {
                let end = content[start..before_fragment]
                    .iter()
                    .position(|b| *b == b'&')
                    .map(|i| start + i)
                    .unwrap_or(before_fragment);
                if end > start || end < before_fragment {
                    let parameter = Element::new_child(content.slice(start..end), element);
                    let key = decode_parameter(&parameter, ctx)?;
                    parameters.push((key, parameter));
                }
                start = end + 1;
            }
        }

        element.add_facet(UriFacet {
            basic_path,
            parameters,
            query_marker: question.is_some(),
            fragment,
        })?;
        element.set_used_bytes(element.len());
        Ok(PluginOutcome::Converted)
    }
}

fn decode_parameter(
    parameter: &ElementRef,
    ctx: &mut ConversionContext<'_>,
) -> Result<String, ConversionError> {
    let content = parameter.content().clone();
    let (key, value) = match content.iter().position(|b| *b == b'=') {
        Some(eq) => (
            Element::new_child(content.slice(..eq), parameter),
            Some(Element::new_child(content.slice(eq + 1..), parameter)),
        ),
        None => (Element::new_child(content.clone(), parameter), None),
    };
    if let Some(value) = &value {
        ctx.queue(value.clone());
    }
    let name = key.text();
    parameter.add_facet(UriParameterFacet { key, value })?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyStore;
    use crate::engine::ConverterSettings;

    fn request_path(target: &str) -> (ElementRef, ElementRef) {
        let root = Element::new_root(format!("GET {} HTTP/1.1\r\n\r\n", target));
        let path = Element::new_child(target.to_string(), &root);
        root.add_facet(HttpRequestFacet {
            method: Element::new_child("GET", &root),
            path: path.clone(),
            http_version: Element::new_child("HTTP/1.1", &root),
        })
        .unwrap();
        (root, path)
    }

    fn decode(path: &ElementRef) -> UriFacet {
        let settings = ConverterSettings::default();
        let keys = KeyStore::new();
        let mut ctx = ConversionContext::new(&settings, &keys);
        UriDecoder.convert(path, &mut ctx).unwrap();
        path.facet::<UriFacet>().unwrap()
    }

    #[test]
    fn test_repeated_parameters_and_fragment() {
        let (_root, path) = request_path("/foo?x=bar1&x=bar2&flag#top");
        let uri = decode(&path);

        assert_eq!(uri.basic_path.text(), "/foo");
        assert_eq!(uri.fragment.as_deref(), Some("top"));
        let keys: Vec<&str> = uri.parameters.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["x", "x", "flag"]);

        let second = uri.parameters[1].1.facet::<UriParameterFacet>().unwrap();
        assert_eq!(second.value.unwrap().text(), "bar2");
        let flag = uri.parameters[2].1.facet::<UriParameterFacet>().unwrap();
        assert!(flag.value.is_none());
        assert_eq!(path.children_named("x").len(), 2);
    }

    #[test]
    fn test_percent_encoding_is_kept() {
        let (_root, path) = request_path("/a%20b?q=a%26b");
        let uri = decode(&path);

        assert_eq!(uri.basic_path.text(), "/a%20b");
        let q = uri.parameters[0].1.facet::<UriParameterFacet>().unwrap();
        assert_eq!(q.value.unwrap().text(), "a%26b");
    }

    #[test]
    fn test_only_request_paths() {
        let settings = ConverterSettings::default();
        let keys = KeyStore::new();
        let mut ctx = ConversionContext::new(&settings, &keys);
        let root = Element::new_root("/not/a/request?x=1");

        assert_eq!(
            UriDecoder.convert(&root, &mut ctx).unwrap(),
            PluginOutcome::NotApplicable
        );
    }

    #[test]
    fn test_already_enriched_path_is_left_alone() {
        let (_root, path) = request_path("/a?b=c");
        decode(&path);

        let settings = ConverterSettings::default();
        let keys = KeyStore::new();
        let mut ctx = ConversionContext::new(&settings, &keys);
        assert_eq!(
            UriDecoder.convert(&path, &mut ctx).unwrap(),
            PluginOutcome::NotApplicable
        );
        assert_eq!(path.facets().len(), 1);
    }
}
