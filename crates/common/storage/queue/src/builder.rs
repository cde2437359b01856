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

use crate::{
    FlushMode, Queue, QueueConfig, ReservedBytePolicy, Result, codec::PayloadCodec,
    error::ConfigurationSnafu,
};

pub struct QueueBuilder<C> {
    config: QueueConfig,
    codec:  Option<C>,
}

impl<C: PayloadCodec> QueueBuilder<C> {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self::from_config(QueueConfig {
            path: path.into(),
            ..Default::default()
        })
    }

    pub const fn from_config(config: QueueConfig) -> Self {
        Self {
            config,
            codec: None,
        }
    }

    /// Requested records per page; rounded up to a power of two.
    pub const fn page_capacity(mut self, capacity: u32) -> Self {
        self.config.page_capacity = capacity;
        self
    }

    /// Rewrite reserved bytes in payloads to `c`.
    pub const fn substitute(mut self, c: char) -> Self {
        self.config.reserved_byte_policy = ReservedBytePolicy::Substitute(c);
        self
    }

    /// Fail enqueues whose payload holds a reserved byte.
    pub const fn reject_reserved_bytes(mut self) -> Self {
        self.config.reserved_byte_policy = ReservedBytePolicy::Reject;
        self
    }

    pub const fn flush_mode(mut self, mode: FlushMode) -> Self {
        self.config.flush_mode = mode;
        self
    }

    pub fn codec(mut self, codec: C) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Validates the configuration, creates the directory and opens the queue.
    ///
    /// # Errors
    ///
    /// [`Configuration`](crate::QueueError::Configuration) when no codec was
    /// given, the page capacity exceeds 4096 or the substitute is itself a
    /// reserved byte; [`CreateDir`](crate::QueueError::CreateDir) when the
    /// directory cannot be created.
    pub fn build(self) -> Result<Queue<C>> {
        let Some(codec) = self.codec else {
            return ConfigurationSnafu {
                message: "a payload codec is required",
            }
            .fail();
        };
        Queue::new(self.config, codec)
    }
}
