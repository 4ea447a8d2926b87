// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Content above this size is left undecoded (10 MiB).
pub const DEFAULT_MAX_CONTENT_SIZE: usize = 10 * 1024 * 1024;
/// Structural errors become notes unless a configuration says otherwise.
pub const DEFAULT_LENIENT: bool = true;
/// Length of symmetric keys, key ids and curve25519 secrets, in bytes.
pub const KEY_MATERIAL_LEN: usize = 32;
