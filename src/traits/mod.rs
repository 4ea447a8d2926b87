// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod addressing;
pub mod conversion;
pub mod writer;

pub use addressing::{ConditionEvaluator, PathEvaluator};
pub use conversion::{ConversionPlugin, PluginOutcome, SkipReason};
pub use writer::ElementWriter;
