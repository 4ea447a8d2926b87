// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod config;     // YAML config + runtime builder
pub mod crypto;     // key store, JOSE and AEAD primitives
pub mod decoders;   // conversion plugins
pub mod element;    // element tree
pub mod engine;     // converter, modifier, path and condition evaluators
pub mod errors;     // error handling
pub mod facets;     // typed interpretations of elements
pub mod observability;
pub mod traits;     // unified abstractions
pub mod writers;    // parent rebuilders used by the modifier
