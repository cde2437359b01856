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

//! Durable cross-process FIFO queue backed by plain files in a directory.
//!
//! ```text
//! <dir>/
//!   tip.txt       .tip.lock        next serial to allocate
//!   commit.txt    .commit.lock     last serial visible to consumers
//!   progress.txt  .progress.lock   last serial consumed
//!   q-<page>.txt                   records with serial >> shift == page
//! ```

mod appender;
pub mod builder;
pub mod codec;
pub mod config;
mod counter;
mod crc;
pub mod error;
pub mod message;
mod page;
pub mod path;
mod queue;
mod record;
pub mod serial;
mod tailer;

pub use builder::QueueBuilder;
pub use codec::{CodecError, FnCodec, JsonCodec, PayloadCodec, TextCodec};
pub use config::{DEFAULT_PAGE_CAPACITY, FlushMode, QueueConfig, ReservedBytePolicy};
pub use error::{QueueError, RecordError, Result};
pub use message::{DequeueReport, Message, SkippedRecord};
pub use queue::{Queue, QueueStat};
pub use serial::{PageId, Serial};
