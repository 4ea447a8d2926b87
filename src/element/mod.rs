// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The element tree.
//!
//! An [`Element`] wraps an immutable byte range and collects facets as decoders
//! recognise structure in it. Children hold a weak link to their parent so a
//! subtree never keeps its ancestors alive, and the whole tree is dropped with
//! its root.

mod charset;
#[allow(clippy::module_inception)]
mod element;
mod render;

pub use charset::Charset;
pub use element::{Element, ElementRef};
