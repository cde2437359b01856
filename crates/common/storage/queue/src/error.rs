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

use snafu::Snafu;

use crate::{codec::CodecError, serial::Serial};

/// Queue operation errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum QueueError {
    /// Invalid queue construction parameters. Not retryable.
    #[snafu(display("Invalid queue configuration: {message}"))]
    Configuration { message: String },

    /// A counter file could not be written. The caller may retry.
    #[snafu(display("Failed to update the {counter} counter to {serial}"))]
    CounterUpdate {
        counter: &'static str,
        serial:  Serial,
    },

    /// Payload contains a reserved byte and substitution is disabled.
    #[snafu(display("Payload contains reserved byte {byte:#04x} at offset {offset}"))]
    MalformedPayload { byte: u8, offset: usize },

    #[snafu(display("Failed to lock {}", path.display()))]
    Lock {
        path:   PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to create queue directory {}", path.display()))]
    CreateDir {
        path:   PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to append to page file {}", path.display()))]
    PageWrite {
        path:   PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to read {}", path.display()))]
    PageRead {
        path:   PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to serialize item: {source}"))]
    Serialize { source: CodecError },

    #[snafu(display("Failed to deserialize record {serial}: {source}"))]
    Deserialize { serial: Serial, source: CodecError },
}

/// Why a stored line could not be turned back into a record.
///
/// These never reach a dequeue caller: the scan logs the line, reports it in
/// [`DequeueReport::skipped`](crate::DequeueReport) and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum RecordError {
    #[snafu(display("Malformed record: {reason}"))]
    Decode { reason: String },

    #[snafu(display("Checksum mismatch for record {serial}: stored {stored}, computed {computed}"))]
    ChecksumMismatch {
        serial:   Serial,
        stored:   u32,
        computed: u32,
    },
}

impl RecordError {
    /// Serial of the damaged record, when the line still names one.
    #[must_use]
    pub const fn serial(&self) -> Option<Serial> {
        match self {
            Self::ChecksumMismatch { serial, .. } => Some(*serial),
            Self::Decode { .. } => None,
        }
    }
}

/// Result type for queue operations.
pub type Result<T, E = QueueError> = std::result::Result<T, E>;
