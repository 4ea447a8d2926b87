// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod conversion;
mod crypto;
mod modification;

pub use config::{ConfigError, ValidationError};
pub use conversion::{ConversionError, ConversionResult, FacetNotFoundError};
pub use crypto::CryptoError;
pub use modification::{ModificationError, PathError};
