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

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

use crate::{
    Result,
    error::ConfigurationSnafu,
    record::is_reserved,
    serial::{MAX_PAGE_SHIFT, MIN_PAGE_SHIFT},
};

/// Default number of records per page file.
pub const DEFAULT_PAGE_CAPACITY: u32 = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault)]
#[serde(default)]
pub struct QueueConfig {
    /// Directory holding the counters and page files.
    #[default(_code = "PathBuf::from(\"./queue_data\")")]
    pub path:                 PathBuf,
    /// Requested records per page file, rounded up to a power of two.
    #[default(DEFAULT_PAGE_CAPACITY)]
    pub page_capacity:        u32,
    pub reserved_byte_policy: ReservedBytePolicy,
    pub flush_mode:           FlushMode,
}

impl QueueConfig {
    /// Page shift derived from `page_capacity`: `ceil(log2(capacity))`,
    /// at least 1, at most 12.
    pub fn page_shift(&self) -> Result<u32> {
        let capacity = self.page_capacity.max(1);
        let shift = (u32::BITS - (capacity - 1).leading_zeros()).max(MIN_PAGE_SHIFT);
        if shift > MAX_PAGE_SHIFT {
            return ConfigurationSnafu {
                message: format!(
                    "page capacity {capacity} exceeds the maximum of {}",
                    1u32 << MAX_PAGE_SHIFT
                ),
            }
            .fail();
        }
        Ok(shift)
    }

    pub(crate) fn validate(&self) -> Result<u32> {
        if let ReservedBytePolicy::Substitute(c) = self.reserved_byte_policy
            && c.is_ascii()
            && is_reserved(c as u8)
        {
            return ConfigurationSnafu {
                message: format!("substitute {c:?} must not be a reserved byte"),
            }
            .fail();
        }
        self.page_shift()
    }
}

/// What to do with `\n`, `\r` or NUL inside a serialized payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservedBytePolicy {
    /// Rewrite each reserved byte to this character.
    Substitute(char),
    /// Fail the enqueue with `MalformedPayload`.
    Reject,
}

impl Default for ReservedBytePolicy {
    fn default() -> Self { Self::Substitute(' ') }
}

/// Durability of page appends and counter writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushMode {
    /// Leave flushing to the OS page cache.
    Async,
    /// `fsync` every page append and counter write before it is published.
    #[default]
    Sync,
}
