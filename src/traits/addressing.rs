// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::element::ElementRef;
use crate::errors::PathError;

/// Resolves a path expression to elements, in document order.
pub trait PathEvaluator: Send + Sync {
    fn find_elements(&self, root: &ElementRef, path: &str) -> Result<Vec<ElementRef>, PathError>;
}

/// Evaluates a boolean condition against a message tree.
pub trait ConditionEvaluator: Send + Sync {
    fn matches(&self, root: &ElementRef, expression: &str) -> Result<bool, PathError>;
}
