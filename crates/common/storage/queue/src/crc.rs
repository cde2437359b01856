// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! CRC32 checksum utilities for record integrity verification.
//!
//! Uses CRC-32 (IEEE polynomial) via crc32fast. The checksum covers the
//! payload text exactly as stored on disk; it catches accidental damage, not
//! deliberate tampering.

use crc32fast::Hasher;

/// Calculates the CRC32 checksum of a record payload.
#[inline]
pub(crate) fn payload_checksum(payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}
