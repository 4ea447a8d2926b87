// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Default condition evaluator: a path, optionally compared with a quoted literal.
//!
//! ```text
//! $.method                      at least one element matches the path
//! $.method == 'POST'            some matched element's text equals the literal
//! $.header.Host != 'internal'   no matched element's text equals the literal
//! $.path =~ '^/api/'            some matched element's text matches the regex
//! ```

use regex::Regex;

use super::DefaultPathEvaluator;
use crate::element::ElementRef;
use crate::errors::PathError;
use crate::traits::{ConditionEvaluator, PathEvaluator};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Operator {
    Equals,
    NotEquals,
    Matches,
}

const OPERATORS: [(&str, Operator); 3] = [
    ("==", Operator::Equals),
    ("!=", Operator::NotEquals),
    ("=~", Operator::Matches),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConditionEvaluator {
    paths: DefaultPathEvaluator,
}

impl ConditionEvaluator for DefaultConditionEvaluator {
    fn matches(&self, root: &ElementRef, expression: &str) -> Result<bool, PathError> {
        let Some((path, operator, literal)) = split(expression)? else {
            return Ok(!self.paths.find_elements(root, expression.trim())?.is_empty());
        };

        let texts: Vec<String> = self
            .paths
            .find_elements(root, path)?
            .iter()
            .map(|e| e.text())
            .collect();

        Ok(match operator {
            Operator::Equals => texts.iter().any(|t| t == literal),
            Operator::NotEquals => texts.iter().all(|t| t != literal),
            Operator::Matches => {
                let regex = Regex::new(literal).map_err(|e| PathError::Condition {
                    expression: expression.to_string(),
                    reason: e.to_string(),
                })?;
                texts.iter().any(|t| regex.is_match(t))
            }
        })
    }
}

/// Split at the first operator outside quotes. `None` for a bare path.
fn split(expression: &str) -> Result<Option<(&str, Operator, &str)>, PathError> {
    let mut quote: Option<char> = None;
    for (offset, c) in expression.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, _) => {
                let rest = &expression[offset..];
                if let Some((token, operator)) =
                    OPERATORS.iter().find(|(token, _)| rest.starts_with(token))
                {
                    let path = expression[..offset].trim();
                    let literal = unquote(rest[token.len()..].trim()).ok_or_else(|| {
                        PathError::Condition {
                            expression: expression.to_string(),
                            reason: "right-hand side must be a quoted literal".to_string(),
                        }
                    })?;
                    return Ok(Some((path, *operator, literal)));
                }
            }
        }
    }
    Ok(None)
}

fn unquote(text: &str) -> Option<&str> {
    let quote = text.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let inner = text.strip_prefix(quote)?.strip_suffix(quote)?;
    Some(inner)
}
