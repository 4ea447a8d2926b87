// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Configuration validation.
//!
//! Checks run in file order and stop at the first problem:
//!
//! 1. key names are unique and every key decodes
//! 2. modification names are unique
//! 3. every modification's target path and condition parse, and its regex compiles
//!
//! Path and condition syntax is checked by evaluating them against an empty
//! element with the default evaluators, which parse before they walk.

use std::collections::HashSet;

use regex::Regex;

use crate::config::Config;
use crate::element::Element;
use crate::engine::{DefaultConditionEvaluator, DefaultPathEvaluator};
use crate::errors::ConfigError;
use crate::traits::{ConditionEvaluator, PathEvaluator};

/// Validate a configuration before a runtime is built from it.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut key_names = HashSet::new();
    for key in &config.keys {
        if !key_names.insert(key.name.as_str()) {
            return Err(ConfigError::InvalidKey {
                name: key.name.clone(),
                reason: "duplicate key name".to_string(),
            });
        }
        key.material()?;
    }

    let empty = Element::new_root("");
    let paths = DefaultPathEvaluator;
    let conditions = DefaultConditionEvaluator::default();
    let mut modification_names = HashSet::new();

    for entry in &config.modifications {
        let name = entry.name.clone().unwrap_or_else(|| entry.target.clone());
        let invalid = |reason: String| ConfigError::InvalidModification {
            name: name.clone(),
            reason,
        };

        if entry.name.is_some() && !modification_names.insert(name.clone()) {
            return Err(invalid("duplicate modification name".to_string()));
        }
        paths
            .find_elements(&empty, &entry.target)
            .map_err(|e| invalid(e.to_string()))?;
        if let Some(condition) = &entry.condition {
            conditions
                .matches(&empty, condition)
                .map_err(|e| invalid(e.to_string()))?;
        }
        if let Some(pattern) = &entry.regex_filter {
            Regex::new(pattern).map_err(|e| invalid(format!("regex_filter: {}", e)))?;
        }
    }

    Ok(())
}
