// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The parse-tree engine.
//!
//! * [`PluginPipeline`] validates the decoder graph and fixes the running order
//! * [`Converter`] drains a work queue of elements through the pipeline
//! * [`Modifier`] applies [`Modification`]s from a [`ModificationRegistry`],
//!   rebuilding parents bottom-up with the writers and reconverting the result
//! * [`DefaultPathEvaluator`] and [`DefaultConditionEvaluator`] address
//!   elements for the modifier

pub mod condition;
pub mod converter;
pub mod modifier;
pub mod path;
pub mod pipeline;
pub mod registry;
#[cfg(test)]
mod integration_tests;

pub use condition::DefaultConditionEvaluator;
pub use converter::{ConversionContext, Converter, ConverterSettings};
pub use modifier::{ModificationReport, Modifier};
pub use path::DefaultPathEvaluator;
pub use pipeline::{Phase, PluginPipeline};
pub use registry::{Modification, ModificationRegistry};
