// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structured logging.
//!
//! Every diagnostic the library emits is a small struct in [`messages`] with a
//! `Display` impl for the human-readable line and a [`messages::StructuredLog`]
//! impl that attaches the same data as `tracing` fields. Call sites never
//! format log strings themselves:
//!
//! ```rust
//! use wiretree::observability::messages::modification::ModificationExpired;
//! use wiretree::observability::messages::StructuredLog;
//!
//! ModificationExpired { name: "strip-auth" }.log();
//! ```
//!
//! Messages are grouped by subsystem:
//! * `messages::conversion` - converter runs and plugin outcomes
//! * `messages::modification` - registry changes and modification results
//! * `messages::validation` - plugin graph resolution and configuration loading

pub mod messages;
