// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::element::ElementRef;
use crate::engine::{ConversionContext, Phase};
use crate::errors::ConversionError;

/// Why a plugin declined to look at an element it would otherwise handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    ContentTooLarge { size: usize, limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginOutcome {
    /// The plugin recognised the content and attached facets.
    Converted,
    /// The content is not for this plugin.
    NotApplicable,
    Skipped(SkipReason),
}

/// A decoder that recognises one kind of structure in an element's content.
///
/// Plugins are stateless with respect to messages: everything they produce goes
/// onto the element (facets, used bytes) or through the context (new children,
/// notes). Ordering is declared, never implied by registration.
pub trait ConversionPlugin: Send + Sync {
    /// Unique id other plugins refer to in [`ConversionPlugin::depends_on`].
    fn id(&self) -> &'static str;

    fn phase(&self) -> Phase;

    /// Lower runs first within a phase.
    fn priority(&self) -> i32 {
        0
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &[]
    }

    /// Protocol that must be activated on the converter for this plugin to run.
    fn active_only_for(&self) -> Option<&'static str> {
        None
    }

    fn convert(
        &self,
        element: &ElementRef,
        ctx: &mut ConversionContext<'_>,
    ) -> Result<PluginOutcome, ConversionError>;
}
