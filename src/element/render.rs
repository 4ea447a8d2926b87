// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt::Write;

use super::{Element, ElementRef};

const PREVIEW_LIMIT: usize = 60;

impl Element {
    /// Indented text dump of the subtree, one line per element.
    ///
    /// Used by the CLI and by debug logging; not a report format.
    pub fn render_tree(element: &ElementRef) -> String {
        let mut out = String::new();
        render_into(&mut out, "$", element, 0);
        out
    }
}

fn render_into(out: &mut String, key: &str, element: &ElementRef, indent: usize) {
    let _ = writeln!(
        out,
        "{:indent$}{} [{}] {}",
        "",
        key,
        element.facet_names().join(", "),
        preview(element),
        indent = indent * 2
    );
    for note in element.notes() {
        let _ = writeln!(out, "{:indent$}  ! {}", "", note, indent = indent * 2);
    }
    for (child_key, child) in element.children() {
        render_into(out, &child_key, &child, indent + 1);
    }
}

fn preview(element: &Element) -> String {
    let text = element.text();
    let printable = text
        .chars()
        .all(|c| !c.is_control() || c == '\r' || c == '\n' || c == '\t');
    if !printable {
        return format!("<{} bytes>", element.len());
    }
    let flat: String = text.escape_debug().collect();
    if flat.chars().count() > PREVIEW_LIMIT {
        let cut: String = flat.chars().take(PREVIEW_LIMIT).collect();
        format!("\"{}…\" ({} bytes)", cut, element.len())
    } else {
        format!("\"{}\"", flat)
    }
}
