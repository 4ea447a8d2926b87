// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use parking_lot::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::observability::messages::modification::ModificationRegistered;
use crate::observability::messages::StructuredLog;

/// A rewrite rule applied to every message passing through the modifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modification {
    pub name: String,
    /// Path expression selecting the element to rewrite.
    pub target: String,
    /// When set, only the matches of this regex inside the target are replaced.
    pub regex_filter: Option<String>,
    /// Replacement text; may reference regex groups (`$1`) when a filter is set.
    pub replace_with: String,
    /// Condition that must hold on the message for the rule to apply.
    pub condition: Option<String>,
    /// Applications left; `None` is unbounded.
    pub remaining_executions: Option<u32>,
}

impl Modification {
    /// A literal replacement under a generated name.
    pub fn new(target: impl Into<String>, replace_with: impl Into<String>) -> Self {
        Self {
            name: Uuid::new_v4().to_string(),
            target: target.into(),
            regex_filter: None,
            replace_with: replace_with.into(),
            condition: None,
            remaining_executions: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_regex(mut self, pattern: impl Into<String>) -> Self {
        self.regex_filter = Some(pattern.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn times(mut self, executions: u32) -> Self {
        self.remaining_executions = Some(executions);
        self
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_executions == Some(0)
    }
}

/// Ordered, name-keyed set of modifications.
///
/// One lock guards the whole set; the modifier holds it for an entire pass so
/// counters cannot be spent twice by concurrent messages.
#[derive(Debug, Default)]
pub struct ModificationRegistry {
    entries: Mutex<Vec<Modification>>,
}

impl ModificationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a modification, replacing one with the same name in place.
    /// Returns the name it was registered under.
    pub fn register(&self, modification: Modification) -> String {
        ModificationRegistered {
            name: &modification.name,
            target: &modification.target,
            remaining: modification.remaining_executions,
        }
        .log();
        let name = modification.name.clone();
        let mut entries = self.entries.lock();
        match entries.iter_mut().find(|m| m.name == name) {
            Some(existing) => *existing = modification,
            None => entries.push(modification),
        }
        name
    }

    pub fn remove(&self, name: &str) -> Option<Modification> {
        let mut entries = self.entries.lock();
        let index = entries.iter().position(|m| m.name == name)?;
        Some(entries.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<Modification> {
        self.entries.lock().iter().find(|m| m.name == name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.lock().iter().map(|m| m.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Vec<Modification>> {
        self.entries.lock()
    }
}
