// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Work-queue driven conversion of raw bytes into an element tree.
//!
//! The converter never recurses. Every element, starting with the one created
//! for the input, is popped from a FIFO queue and offered to each active plugin
//! in pipeline order. Children a plugin registers through the
//! [`ConversionContext`] go to the back of the queue.
//!
//! Errors stay with the element that raised them:
//!
//! | error                | lenient                   | strict                    |
//! |----------------------|---------------------------|---------------------------|
//! | `StructuralParse`    | warn note, next plugin    | error note, element stops |
//! | `UnsupportedEncoding`| error note, element stops | error note, element stops |
//! | `FacetConflict`      | error note, element stops | error note, element stops |
//!
//! When the element that stops is the one `convert` was called for, the error
//! is also returned to the caller.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;

use super::{Phase, PluginPipeline};
use crate::config::consts::DEFAULT_MAX_CONTENT_SIZE;
use crate::crypto::KeyStore;
use crate::element::{Element, ElementRef};
use crate::errors::{ConversionError, ConversionResult};
use crate::facets::{NoteLevel, PairingFacet};
use crate::observability::messages::conversion::{
    ConversionCompleted, ConversionStarted, PluginConverted, PluginFailed, PluginSkipped,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{PluginOutcome, SkipReason};

/// Behaviour switches of a converter.
#[derive(Debug, Clone, PartialEq)]
pub struct ConverterSettings {
    /// Downgrade structural errors to notes and keep going.
    pub lenient: bool,
    /// Content above this size is not decoded further.
    pub max_content_size: usize,
    /// Protocols whose opt-in plugins may run (e.g. `ldap`).
    pub activated_protocols: HashSet<String>,
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            lenient: true,
            max_content_size: DEFAULT_MAX_CONTENT_SIZE,
            activated_protocols: HashSet::new(),
        }
    }
}

impl ConverterSettings {
    pub fn strict() -> Self {
        Self {
            lenient: false,
            ..Self::default()
        }
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.activated_protocols.insert(protocol.into());
        self
    }
}

/// What a plugin may see and do beyond the element it is given.
pub struct ConversionContext<'a> {
    settings: &'a ConverterSettings,
    keys: &'a KeyStore,
    queued: Vec<ElementRef>,
}

impl<'a> ConversionContext<'a> {
    pub fn new(settings: &'a ConverterSettings, keys: &'a KeyStore) -> Self {
        Self {
            settings,
            keys,
            queued: Vec::new(),
        }
    }

    pub fn lenient(&self) -> bool {
        self.settings.lenient
    }

    pub fn keys(&self) -> &KeyStore {
        self.keys
    }

    pub fn max_content_size(&self) -> usize {
        self.settings.max_content_size
    }

    /// Schedule a child for conversion.
    pub fn queue(&mut self, child: ElementRef) {
        self.queued.push(child);
    }

    /// A skip outcome when `size` bytes exceed the configured limit.
    pub fn size_guard(&self, size: usize) -> Option<PluginOutcome> {
        let limit = self.settings.max_content_size;
        (size > limit).then_some(PluginOutcome::Skipped(SkipReason::ContentTooLarge { size, limit }))
    }

    pub fn take_queued(&mut self) -> Vec<ElementRef> {
        std::mem::take(&mut self.queued)
    }
}

/// Entry point of the parse-tree engine. Shareable across threads; every call
/// owns its tree and queue.
#[derive(Debug, Clone)]
pub struct Converter {
    pipeline: Arc<PluginPipeline>,
    keys: Arc<KeyStore>,
    settings: ConverterSettings,
}

impl Converter {
    pub fn new(pipeline: Arc<PluginPipeline>, keys: Arc<KeyStore>, settings: ConverterSettings) -> Self {
        Self {
            pipeline,
            keys,
            settings,
        }
    }

    pub fn settings(&self) -> &ConverterSettings {
        &self.settings
    }

    pub fn keys(&self) -> &Arc<KeyStore> {
        &self.keys
    }

    /// Build the tree for `bytes`, optionally hanging it below `parent`.
    pub fn convert(
        &self,
        bytes: impl Into<Bytes>,
        parent: Option<&ElementRef>,
    ) -> ConversionResult<ElementRef> {
        let element = match parent {
            Some(parent) => Element::new_child(bytes, parent),
            None => Element::new_root(bytes),
        };
        self.drain(&element, &Phase::ALL)?;
        Ok(element)
    }

    /// Convert a response and link it to the request it answers.
    pub fn convert_response(
        &self,
        bytes: impl Into<Bytes>,
        request: &ElementRef,
    ) -> ConversionResult<ElementRef> {
        let response = self.convert(bytes, None)?;
        response.add_facet(PairingFacet {
            request: request.clone(),
        })?;
        Ok(response)
    }

    /// Re-run the content-enrichment phase over an existing subtree.
    pub fn convert_element(&self, element: &ElementRef) -> ConversionResult<()> {
        self.drain(element, &[Phase::ContentEnrichment])
    }

    fn drain(&self, entry: &ElementRef, phases: &[Phase]) -> ConversionResult<()> {
        let started = Instant::now();
        let span = ConversionStarted {
            content_length: entry.len(),
            lenient: self.settings.lenient,
            plugin_count: self.pipeline.len(),
        };
        span.log();
        let _guard = span.span("convert").entered();

        let mut queue = VecDeque::from([entry.clone()]);
        let mut processed = 0usize;
        // Re-enrichment queues children that already exist.
        let requeue_children = phases == [Phase::ContentEnrichment];

        while let Some(element) = queue.pop_front() {
            processed += 1;
            let is_entry = Arc::ptr_eq(&element, entry);
            if let Err(err) = self.run_plugins(&element, phases, &mut queue) {
                if is_entry {
                    return Err(err);
                }
            }
            if requeue_children {
                queue.extend(element.children().into_iter().map(|(_, child)| child));
            }
        }

        ConversionCompleted {
            elements: processed,
            duration: started.elapsed(),
        }
        .log();
        Ok(())
    }

    /// Offer one element to every active plugin. Returns the error that stopped
    /// the element, if any.
    fn run_plugins(
        &self,
        element: &ElementRef,
        phases: &[Phase],
        queue: &mut VecDeque<ElementRef>,
    ) -> ConversionResult<()> {
        let plugins = self
            .pipeline
            .plugins()
            .iter()
            .filter(|p| phases.contains(&p.phase()))
            .filter(|p| match p.active_only_for() {
                Some(protocol) => self.settings.activated_protocols.contains(protocol),
                None => true,
            });

        for plugin in plugins {
            let mut ctx = ConversionContext::new(&self.settings, &self.keys);
            match plugin.convert(element, &mut ctx) {
                Ok(PluginOutcome::Converted) => {
                    let children = ctx.take_queued();
                    PluginConverted {
                        plugin_id: plugin.id(),
                        depth: element.depth(),
                        children: children.len(),
                    }
                    .log();
                    queue.extend(children);
                }
                Ok(PluginOutcome::NotApplicable) => {}
                Ok(PluginOutcome::Skipped(reason)) => {
                    PluginSkipped {
                        plugin_id: plugin.id(),
                        reason: &reason,
                    }
                    .log();
                    queue.extend(ctx.take_queued());
                }
                Err(err) => {
                    let fatal = !self.settings.lenient || !err.is_recoverable();
                    PluginFailed {
                        plugin_id: plugin.id(),
                        error: &err,
                        fatal,
                    }
                    .log();
                    let level = if fatal { NoteLevel::Error } else { NoteLevel::Warn };
                    let text = match &err {
                        ConversionError::StructuralParse { .. } => err.to_string(),
                        _ => format!("{}: {}", plugin.id(), err),
                    };
                    element.add_note(level, text);
                    if fatal {
                        return Err(err);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Phase;
    use crate::errors::ConversionError;
    use crate::facets::{ListFacet, RequestFacet};
    use crate::traits::ConversionPlugin;
    use parking_lot::Mutex;

    /// Splits `a,b,c` into list items and records every element it sees.
    struct SplitPlugin {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl ConversionPlugin for SplitPlugin {
        fn id(&self) -> &'static str {
            "split"
        }
        fn phase(&self) -> Phase {
            Phase::ProtocolParsing
        }
        fn convert(
            &self,
            element: &ElementRef,
            ctx: &mut ConversionContext<'_>,
        ) -> Result<PluginOutcome, ConversionError> {
            self.seen.lock().push(element.text());
            if let Some(skip) = ctx.size_guard(element.len()) {
                return Ok(skip);
            }
            let text = element.text();
            if !text.contains(',') {
                return Ok(PluginOutcome::NotApplicable);
            }
            let items: Vec<ElementRef> = text
                .split(',')
                .map(|part| Element::new_child(part.to_string(), element))
                .collect();
            for item in &items {
                ctx.queue(item.clone());
            }
            element.add_facet(ListFacet::new(items, ","))?;
            Ok(PluginOutcome::Converted)
        }
    }

    /// Fails on anything starting with `!`.
    struct FailingPlugin {
        error: ConversionError,
    }

    impl ConversionPlugin for FailingPlugin {
        fn id(&self) -> &'static str {
            "failing"
        }
        fn phase(&self) -> Phase {
            Phase::Preparation
        }
        fn convert(
            &self,
            element: &ElementRef,
            _ctx: &mut ConversionContext<'_>,
        ) -> Result<PluginOutcome, ConversionError> {
            if element.content().starts_with(b"!") {
                Err(self.error.clone())
            } else {
                Ok(PluginOutcome::NotApplicable)
            }
        }
    }

    struct LdapOnly;

    impl ConversionPlugin for LdapOnly {
        fn id(&self) -> &'static str {
            "ldap-only"
        }
        fn phase(&self) -> Phase {
            Phase::ProtocolParsing
        }
        fn active_only_for(&self) -> Option<&'static str> {
            Some("ldap")
        }
        fn convert(
            &self,
            element: &ElementRef,
            _ctx: &mut ConversionContext<'_>,
        ) -> Result<PluginOutcome, ConversionError> {
            element.add_facet(RequestFacet { protocol: "ldap" })?;
            Ok(PluginOutcome::Converted)
        }
    }

    fn converter(
        plugins: Vec<Arc<dyn ConversionPlugin>>,
        settings: ConverterSettings,
    ) -> Converter {
        Converter::new(
            Arc::new(PluginPipeline::new(plugins).unwrap()),
            Arc::new(KeyStore::new()),
            settings,
        )
    }

    fn split(seen: &Arc<Mutex<Vec<String>>>) -> Arc<dyn ConversionPlugin> {
        Arc::new(SplitPlugin { seen: seen.clone() })
    }

    #[test]
    fn test_children_are_processed_breadth_first() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let converter = converter(vec![split(&seen)], ConverterSettings::default());

        let root = converter.convert("a,b", None).unwrap();

        assert_eq!(root.facet::<ListFacet>().unwrap().items.len(), 2);
        assert_eq!(*seen.lock(), vec!["a,b", "a", "b"]);
    }

    #[test]
    fn test_oversized_content_is_skipped_not_failed() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let settings = ConverterSettings {
            max_content_size: 3,
            ..ConverterSettings::default()
        };
        let converter = converter(vec![split(&seen)], settings);

        let root = converter.convert("a,b,c,d", None).unwrap();

        assert!(root.facet::<ListFacet>().is_none());
        assert!(root.notes().is_empty());
    }

    #[test]
    fn test_error_matrix() {
        struct TestCase {
            name: &'static str,
            lenient: bool,
            error: ConversionError,
            caller_sees_error: bool,
            note_level: NoteLevel,
            later_plugins_ran: bool,
        }

        let cases = vec![
            TestCase {
                name: "lenient structural",
                lenient: true,
                error: ConversionError::structural("test", "broken"),
                caller_sees_error: false,
                note_level: NoteLevel::Warn,
                later_plugins_ran: true,
            },
            TestCase {
                name: "strict structural",
                lenient: false,
                error: ConversionError::structural("test", "broken"),
                caller_sees_error: true,
                note_level: NoteLevel::Error,
                later_plugins_ran: false,
            },
            TestCase {
                name: "lenient unsupported encoding",
                lenient: true,
                error: ConversionError::UnsupportedEncoding {
                    token: "br".to_string(),
                },
                caller_sees_error: true,
                note_level: NoteLevel::Error,
                later_plugins_ran: false,
            },
        ];

        for case in cases {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let settings = ConverterSettings {
                lenient: case.lenient,
                ..ConverterSettings::default()
            };
            let converter = converter(
                vec![
                    Arc::new(FailingPlugin { error: case.error.clone() }),
                    split(&seen),
                ],
                settings,
            );

            let result = converter.convert("!x,y", None);
            assert_eq!(result.is_err(), case.caller_sees_error, "{}", case.name);
            assert_eq!(!seen.lock().is_empty(), case.later_plugins_ran, "{}", case.name);

            if let Ok(root) = result {
                assert_eq!(root.notes()[0].level, case.note_level, "{}", case.name);
            }
        }
    }

    #[test]
    fn test_child_errors_stay_local_in_strict_mode() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let converter = converter(
            vec![
                Arc::new(FailingPlugin {
                    error: ConversionError::structural("test", "broken"),
                }),
                split(&seen),
            ],
            ConverterSettings::strict(),
        );

        let root = converter.convert("ok,!bad", None).unwrap();
        let list = root.facet::<ListFacet>().unwrap();

        assert!(list.items[0].notes().is_empty());
        let note = &list.items[1].notes()[0];
        assert_eq!(note.level, NoteLevel::Error);
        assert_eq!(note.text, "test: malformed structure: broken");
    }

    #[test]
    fn test_protocol_filter() {
        let plain = converter(vec![Arc::new(LdapOnly)], ConverterSettings::default());
        assert!(!plain.convert("x", None).unwrap().has_facet::<RequestFacet>());

        let ldap = converter(
            vec![Arc::new(LdapOnly)],
            ConverterSettings::default().with_protocol("ldap"),
        );
        assert!(ldap.convert("x", None).unwrap().has_facet::<RequestFacet>());
    }

    #[test]
    fn test_convert_below_parent_links_child() {
        let converter = converter(vec![], ConverterSettings::default());
        let parent = Element::new_root("outer");
        let child = converter.convert("inner", Some(&parent)).unwrap();

        assert!(Arc::ptr_eq(&child.parent().unwrap(), &parent));
    }

    #[test]
    fn test_convert_response_pairs_with_request() {
        let converter = converter(vec![], ConverterSettings::default());
        let request = converter.convert("req", None).unwrap();
        let response = converter.convert_response("resp", &request).unwrap();

        let pairing = response.facet::<PairingFacet>().unwrap();
        assert!(Arc::ptr_eq(&pairing.request, &request));
        assert!(response.children().is_empty());
    }
}
