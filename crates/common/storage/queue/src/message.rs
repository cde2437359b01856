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

//! Values handed back to consumers.

use crate::{
    error::RecordError,
    serial::{PageId, Serial},
};

/// A record taken off the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message<T> {
    /// Serial allocated when the record was enqueued.
    pub serial: Serial,
    pub item:   T,
}

/// A stored line a dequeue scan could not decode and stepped over.
///
/// The line stays on disk until its page is removed; it is never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub page:   PageId,
    /// 1-based line number within the page file.
    pub line:   usize,
    pub reason: RecordError,
}

/// Outcome of one dequeue scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DequeueReport<T> {
    /// The oldest committed, unconsumed record, if any.
    pub message: Option<Message<T>>,
    /// Lines that were skipped while looking for it.
    pub skipped: Vec<SkippedRecord>,
    /// Pages removed because the consumer had moved past them.
    pub removed: Vec<PageId>,
}

impl<T> DequeueReport<T> {
    pub(crate) const fn empty() -> Self {
        Self {
            message: None,
            skipped: Vec::new(),
            removed: Vec::new(),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool { self.message.is_none() }

    /// Converts the item, keeping the scan details.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> DequeueReport<U> {
        DequeueReport {
            message: self.message.map(|m| Message {
                serial: m.serial,
                item:   f(m.item),
            }),
            skipped: self.skipped,
            removed: self.removed,
        }
    }
}
