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

//! Main queue struct.
//!
//! A [`Queue`] is a handle on a directory. It keeps no in-memory state
//! between operations: every enqueue and dequeue coordinates with other
//! handles, in this process or any other, through the counter locks alone.
//!
//! ## Usage
//!
//! ```ignore
//! let queue = QueueBuilder::new("/path/to/queue")
//!     .page_capacity(8)
//!     .codec(TextCodec)
//!     .build()?;
//!
//! let serial = queue.enqueue(&"hello".to_string())?;
//! assert_eq!(queue.dequeue()?, Some("hello".to_string()));
//! assert_eq!(queue.dequeue()?, None);
//! ```

use std::path::Path;

use snafu::ResultExt;
use tracing::info;

use crate::{
    QueueConfig, Result,
    appender::Appender,
    codec::PayloadCodec,
    counter::{COMMIT, Counter, PROGRESS, TIP},
    error::{CreateDirSnafu, DeserializeSnafu, SerializeSnafu},
    message::{DequeueReport, Message},
    page::PageStore,
    serial::{PageId, Serial},
    tailer::Tailer,
};

/// A durable FIFO queue stored in a directory.
///
/// `Queue` is `Send + Sync` whenever its codec is. Any number of handles,
/// in any number of processes, may point at the same directory.
pub struct Queue<C> {
    config:   QueueConfig,
    shift:    u32,
    codec:    C,
    tip:      Counter,
    commit:   Counter,
    progress: Counter,
    pages:    PageStore,
}

impl<C: PayloadCodec> Queue<C> {
    /// Opens the queue described by `config`, creating its directory.
    pub(crate) fn new(config: QueueConfig, codec: C) -> Result<Self> {
        let shift = config.validate()?;
        std::fs::create_dir_all(&config.path).context(CreateDirSnafu {
            path: config.path.clone(),
        })?;

        let dir = config.path.as_path();
        let flush_mode = config.flush_mode;
        let queue = Self {
            tip: Counter::new(dir, TIP, flush_mode),
            commit: Counter::new(dir, COMMIT, flush_mode),
            progress: Counter::new(dir, PROGRESS, flush_mode),
            pages: PageStore::new(config.path.clone(), flush_mode),
            shift,
            codec,
            config,
        };

        info!(
            path = ?queue.config.path,
            page_capacity = 1u32 << shift,
            flush_mode = ?flush_mode,
            "Queue opened"
        );
        Ok(queue)
    }

    /// Serializes `item`, appends it and publishes it to consumers.
    ///
    /// # Errors
    ///
    /// Fails without touching the directory when the codec rejects the item
    /// or the payload holds a reserved byte under
    /// [`ReservedBytePolicy::Reject`](crate::ReservedBytePolicy::Reject).
    /// Fails with [`CounterUpdate`](crate::QueueError::CounterUpdate) when a
    /// counter cannot be written; the caller may retry.
    pub fn enqueue(&self, item: &C::Item) -> Result<Serial> {
        let payload = self.codec.serialize(item).context(SerializeSnafu)?;
        self.appender().append(&payload)
    }

    /// Takes the oldest committed item, or `None` when the queue is empty.
    ///
    /// # Errors
    ///
    /// Fails on I/O or counter errors. A stored payload the codec cannot
    /// read yields [`Deserialize`](crate::QueueError::Deserialize); the record
    /// is consumed regardless.
    pub fn dequeue(&self) -> Result<Option<C::Item>> {
        Ok(self.dequeue_message()?.map(|message| message.item))
    }

    /// Like [`dequeue`](Self::dequeue), keeping the record's serial.
    ///
    /// # Errors
    ///
    /// See [`dequeue`](Self::dequeue).
    pub fn dequeue_message(&self) -> Result<Option<Message<C::Item>>> {
        Ok(self.dequeue_with_report()?.message)
    }

    /// Like [`dequeue`](Self::dequeue), also reporting skipped lines and
    /// removed pages.
    ///
    /// # Errors
    ///
    /// See [`dequeue`](Self::dequeue).
    pub fn dequeue_with_report(&self) -> Result<DequeueReport<C::Item>> {
        let DequeueReport {
            message,
            skipped,
            removed,
        } = self.tailer().take_next()?;

        let message = match message {
            Some(Message { serial, item }) => Some(Message {
                serial,
                item: self
                    .codec
                    .deserialize(&item)
                    .context(DeserializeSnafu { serial })?,
            }),
            None => None,
        };
        Ok(DequeueReport {
            message,
            skipped,
            removed,
        })
    }

    /// Snapshot of the counters and the page files on disk, the pages in
    /// the order a dequeue would scan them.
    ///
    /// # Errors
    ///
    /// Fails when a lock cannot be taken or the directory cannot be listed.
    pub fn stat(&self) -> Result<QueueStat> {
        let tip = self.tip.snapshot()?;
        let commit = self.commit.snapshot()?;
        let progress = self.progress.snapshot()?;
        let (_, pages) = self.pages.ordered_pages(
            self.shift,
            progress.map(|serial| serial.page(self.shift)),
            commit.map(|serial| serial.page(self.shift)),
        )?;

        Ok(QueueStat {
            tip,
            commit,
            progress,
            pages,
        })
    }
}

impl<C> Queue<C> {
    #[must_use]
    pub fn path(&self) -> &Path { &self.config.path }

    /// Records per page are `1 << page_shift()`.
    #[must_use]
    pub const fn page_shift(&self) -> u32 { self.shift }

    #[must_use]
    pub const fn config(&self) -> &QueueConfig { &self.config }

    #[must_use]
    pub const fn codec(&self) -> &C { &self.codec }

    const fn appender(&self) -> Appender<'_> {
        Appender {
            tip:    &self.tip,
            commit: &self.commit,
            pages:  &self.pages,
            shift:  self.shift,
            policy: self.config.reserved_byte_policy,
        }
    }

    const fn tailer(&self) -> Tailer<'_> {
        Tailer {
            commit:   &self.commit,
            progress: &self.progress,
            pages:    &self.pages,
            shift:    self.shift,
        }
    }
}

/// Point-in-time view of a queue directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStat {
    /// Next serial to allocate.
    pub tip:      Option<Serial>,
    /// Last serial published to consumers.
    pub commit:   Option<Serial>,
    /// Last serial consumed.
    pub progress: Option<Serial>,
    /// Page files on disk, oldest first.
    pub pages:    Vec<PageId>,
}

impl QueueStat {
    /// Committed records not yet consumed.
    ///
    /// A queue that was never consumed counts from serial 0. Records lost to
    /// corruption are still counted until a dequeue steps past them.
    #[must_use]
    pub fn pending(&self) -> u32 {
        let Some(commit) = self.commit else {
            return 0;
        };
        let consumed = self.progress.unwrap_or(Serial::new(0));
        if commit.is_after(consumed) {
            commit.distance_from(consumed)
        } else {
            0
        }
    }
}
