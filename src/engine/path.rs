// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Default path evaluator over element trees.
//!
//! Supported syntax:
//!
//! | form        | selects                                                     |
//! |-------------|-------------------------------------------------------------|
//! | `$`         | the root                                                    |
//! | `.name`     | children keyed `name`                                       |
//! | `['name']`  | same, for keys with dots or spaces                          |
//! | `.*`, `[*]` | all children                                                |
//! | `..name`    | descendants keyed `name`, at any depth                      |
//! | `[n]`       | n-th element of the current set; on a single array or list  |
//! |             | element, its n-th item                                      |
//!
//! Keys are matched by the owning facet, so HTTP header names match without
//! regard to case.

use crate::element::ElementRef;
use crate::errors::PathError;
use crate::facets::{JsonFacet, JsonKind, ListFacet};
use crate::traits::PathEvaluator;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Child(String),
    Wildcard,
    Descendant(String),
    DescendantWildcard,
    Index(usize),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPathEvaluator;

impl PathEvaluator for DefaultPathEvaluator {
    fn find_elements(&self, root: &ElementRef, path: &str) -> Result<Vec<ElementRef>, PathError> {
        let segments = parse(path)?;
        let mut current = vec![root.clone()];
        for segment in &segments {
            current = step(current, segment);
            if current.is_empty() {
                break;
            }
        }
        Ok(current)
    }
}

fn step(current: Vec<ElementRef>, segment: &Segment) -> Vec<ElementRef> {
    match segment {
        Segment::Child(name) => current.iter().flat_map(|e| e.children_named(name)).collect(),
        Segment::Wildcard => current
            .iter()
            .flat_map(|e| e.children().into_iter().map(|(_, child)| child))
            .collect(),
        Segment::Descendant(name) => current
            .iter()
            .flat_map(|e| descendants_named(e, Some(name)))
            .collect(),
        Segment::DescendantWildcard => current
            .iter()
            .flat_map(|e| descendants_named(e, None))
            .collect(),
        Segment::Index(n) => {
            if current.len() == 1 && is_indexable(&current[0]) {
                current[0].children_named(&n.to_string())
            } else {
                current.into_iter().nth(*n).into_iter().collect()
            }
        }
    }
}

fn is_indexable(element: &ElementRef) -> bool {
    element.has_facet::<ListFacet>()
        || element
            .facet::<JsonFacet>()
            .map(|json| json.kind == JsonKind::Array)
            .unwrap_or(false)
}

/// Pre-order walk below `element`, collecting children whose key matches.
fn descendants_named(element: &ElementRef, name: Option<&str>) -> Vec<ElementRef> {
    let mut found = Vec::new();
    for (_, child) in element.children() {
        match name {
            Some(name) => {
                if element
                    .children_named(name)
                    .iter()
                    .any(|m| std::sync::Arc::ptr_eq(m, &child))
                {
                    found.push(child.clone());
                }
            }
            None => found.push(child.clone()),
        }
        found.extend(descendants_named(&child, name));
    }
    found
}

fn parse(path: &str) -> Result<Vec<Segment>, PathError> {
    let trimmed = path.trim();
    let rest = trimmed
        .strip_prefix('$')
        .ok_or_else(|| PathError::MissingRoot(path.to_string()))?;
    let chars: Vec<(usize, char)> = rest.char_indices().collect();
    let offset_of = |i: usize| chars.get(i).map(|(o, _)| o + 1).unwrap_or(trimmed.len());
    let syntax = |i: usize| PathError::Syntax {
        path: path.to_string(),
        offset: offset_of(i),
        found: chars.get(i).map(|(_, c)| *c).unwrap_or(' '),
    };

    let mut segments = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i].1 {
            '.' => {
                let descendant = chars.get(i + 1).map(|(_, c)| *c) == Some('.');
                i += if descendant { 2 } else { 1 };
                let start = i;
                while i < chars.len() && chars[i].1 != '.' && chars[i].1 != '[' {
                    i += 1;
                }
                let name: String = chars[start..i].iter().map(|(_, c)| *c).collect();
                let segment = match (descendant, name.as_str()) {
                    (_, "") => {
                        // `..['name']` is a descendant lookup with a quoted key.
                        if descendant && chars.get(i).map(|(_, c)| *c) == Some('[') {
                            let (key, next) = parse_bracket(&chars, i, &syntax, path)?;
                            i = next;
                            match key {
                                Segment::Child(name) => Segment::Descendant(name),
                                Segment::Wildcard => Segment::DescendantWildcard,
                                _ => return Err(syntax(start)),
                            }
                        } else {
                            return Err(syntax(start));
                        }
                    }
                    (false, "*") => Segment::Wildcard,
                    (true, "*") => Segment::DescendantWildcard,
                    (false, _) => Segment::Child(name),
                    (true, _) => Segment::Descendant(name),
                };
                segments.push(segment);
            }
            '[' => {
                let (segment, next) = parse_bracket(&chars, i, &syntax, path)?;
                segments.push(segment);
                i = next;
            }
            _ => return Err(syntax(i)),
        }
    }
    Ok(segments)
}

/// Parse `[...]` starting at `open`; returns the segment and the index after `]`.
fn parse_bracket(
    chars: &[(usize, char)],
    open: usize,
    syntax: &dyn Fn(usize) -> PathError,
    path: &str,
) -> Result<(Segment, usize), PathError> {
    let mut i = open + 1;
    let segment = match chars.get(i).map(|(_, c)| *c) {
        Some(quote @ ('\'' | '"')) => {
            i += 1;
            let start = i;
            while i < chars.len() && chars[i].1 != quote {
                i += 1;
            }
            if i >= chars.len() {
                return Err(syntax(i));
            }
            let name: String = chars[start..i].iter().map(|(_, c)| *c).collect();
            i += 1;
            Segment::Child(name)
        }
        Some('*') => {
            i += 1;
            Segment::Wildcard
        }
        Some(c) if c.is_ascii_digit() => {
            let start = i;
            while i < chars.len() && chars[i].1.is_ascii_digit() {
                i += 1;
            }
            let digits: String = chars[start..i].iter().map(|(_, c)| *c).collect();
            let n = digits.parse::<usize>().map_err(|_| syntax(start))?;
            Segment::Index(n)
        }
        Some('?') | Some('(') => return Err(PathError::Unsupported(path.to_string())),
        _ => return Err(syntax(i)),
    };
    if chars.get(i).map(|(_, c)| *c) != Some(']') {
        return Err(syntax(i));
    }
    Ok((segment, i + 1))
}
