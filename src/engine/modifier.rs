// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Applies registered modifications and rebuilds the message bottom-up.
//!
//! For each modification, in registration order:
//!
//! 1. evaluate the condition; false leaves the counter untouched
//! 2. resolve the target path; no match is a silent no-op
//! 3. compute the new content of the first target
//! 4. climb from the target to the root, letting a writer rebuild each parent
//! 5. reconvert the new root bytes into a fresh tree
//!
//! Later modifications see the tree produced by earlier ones.

use std::sync::Arc;

use bytes::Bytes;
use regex::Regex;

use super::{
    Converter, DefaultConditionEvaluator, DefaultPathEvaluator, Modification,
    ModificationRegistry,
};
use crate::element::ElementRef;
use crate::errors::ModificationError;
use crate::facets::PairingFacet;
use crate::observability::messages::modification::{
    ModificationApplied, ModificationExpired, ModificationFailed, ModificationNotApplicable,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{ConditionEvaluator, PathEvaluator};
use crate::writers::{WriteContext, WriterRegistry};

/// Outcome of one modification pass over a message.
#[derive(Debug)]
pub struct ModificationReport {
    /// Root of the final tree; the input root when nothing applied.
    pub root: ElementRef,
    /// Names of the modifications that changed the message, in order.
    pub applied: Vec<String>,
    pub failures: Vec<(String, ModificationError)>,
}

impl ModificationReport {
    pub fn bytes(&self) -> &Bytes {
        self.root.content()
    }

    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

pub struct Modifier {
    converter: Arc<Converter>,
    writers: Arc<WriterRegistry>,
    paths: Arc<dyn PathEvaluator>,
    conditions: Arc<dyn ConditionEvaluator>,
}

impl Modifier {
    pub fn new(converter: Arc<Converter>, writers: Arc<WriterRegistry>) -> Self {
        Self {
            converter,
            writers,
            paths: Arc::new(DefaultPathEvaluator),
            conditions: Arc::new(DefaultConditionEvaluator::default()),
        }
    }

    /// Swap in external path and condition languages.
    pub fn with_evaluators(
        mut self,
        paths: Arc<dyn PathEvaluator>,
        conditions: Arc<dyn ConditionEvaluator>,
    ) -> Self {
        self.paths = paths;
        self.conditions = conditions;
        self
    }

    pub fn converter(&self) -> &Arc<Converter> {
        &self.converter
    }

    /// Run every registered modification against the message.
    ///
    /// The registry stays locked for the whole pass. Exhausted entries are
    /// purged before the pass and as soon as their last execution is spent.
    pub fn apply_modifications(
        &self,
        root: &ElementRef,
        registry: &ModificationRegistry,
    ) -> ModificationReport {
        let mut entries = registry.lock();
        entries.retain(|m| !m.is_exhausted());

        let mut current = root.clone();
        let mut applied = Vec::new();
        let mut failures = Vec::new();
        let mut index = 0;

        while index < entries.len() {
            let modification = &entries[index];
            match self.apply(&current, modification) {
                Ok(Some(new_root)) => {
                    ModificationApplied {
                        name: &modification.name,
                        target: &modification.target,
                        old_length: current.len(),
                        new_length: new_root.len(),
                    }
                    .log();
                    current = new_root;
                    applied.push(modification.name.clone());

                    let entry = &mut entries[index];
                    if let Some(remaining) = entry.remaining_executions.as_mut() {
                        *remaining = remaining.saturating_sub(1);
                        if *remaining == 0 {
                            ModificationExpired { name: &entry.name }.log();
                            entries.remove(index);
                            continue;
                        }
                    }
                }
                Ok(None) => ModificationNotApplicable {
                    name: &modification.name,
                    target: &modification.target,
                }
                .log(),
                Err(error) => {
                    ModificationFailed {
                        name: &modification.name,
                        error: &error,
                    }
                    .log();
                    failures.push((modification.name.clone(), error));
                }
            }
            index += 1;
        }

        ModificationReport {
            root: current,
            applied,
            failures,
        }
    }

    /// Apply one modification. `Ok(None)` when the condition is false, no
    /// target matched, or the content would not change.
    pub fn apply(
        &self,
        root: &ElementRef,
        modification: &Modification,
    ) -> Result<Option<ElementRef>, ModificationError> {
        if let Some(condition) = &modification.condition {
            if !self.conditions.matches(root, condition)? {
                return Ok(None);
            }
        }

        let Some(target) = self
            .paths
            .find_elements(root, &modification.target)?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };

        let old_text = target.text();
        let new_text = match &modification.regex_filter {
            Some(pattern) => {
                let regex = Regex::new(pattern).map_err(|e| ModificationError::InvalidRegex {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
                if !regex.is_match(&old_text) {
                    return Ok(None);
                }
                regex
                    .replace_all(&old_text, modification.replace_with.as_str())
                    .into_owned()
            }
            None => modification.replace_with.clone(),
        };

        // `text()` is lossy for undecodable bytes, so compare before re-encoding.
        if new_text == old_text {
            return Ok(None);
        }
        let new_content = Bytes::from(target.charset().encode_like(&new_text, target.content()));
        if &new_content == target.content() {
            return Ok(None);
        }
        self.replace(&target, new_content).map(Some)
    }

    /// Give `target` new content and return the reconverted tree it belongs to.
    pub fn replace(
        &self,
        target: &ElementRef,
        new_content: Bytes,
    ) -> Result<ElementRef, ModificationError> {
        let old_root = crate::element::Element::root_of(target);
        let root_bytes = self.rewrite(target, new_content)?;
        let new_root = self.converter.convert(root_bytes, None)?;
        if let Some(pairing) = old_root.facet::<PairingFacet>() {
            new_root.add_facet(pairing)?;
        }
        Ok(new_root)
    }

    /// Climb from `target` to the root, rebuilding each parent.
    pub fn rewrite(&self, target: &ElementRef, new_content: Bytes) -> Result<Bytes, ModificationError> {
        let ctx = WriteContext::new(self.converter.keys());
        let mut child = target.clone();
        let mut content = new_content;
        while let Some(parent) = child.parent() {
            let writer = self
                .writers
                .find(&parent)
                .ok_or_else(|| ModificationError::NoWriterForFacet {
                    facets: parent.facet_names(),
                })?;
            content = writer.write(&parent, &child, content, &ctx)?;
            child = parent;
        }
        Ok(content)
    }
}
