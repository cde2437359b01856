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

//! Record writer (appender) for producing to the queue.
//!
//! Publishing one record takes two short critical sections:
//!
//! 1. Under the `tip` lock: allocate a serial and append the packed line to
//!    its page. Producers are serialized here.
//! 2. Under the `commit` lock: advance the commit watermark to the serial,
//!    which makes the record visible to consumers.
//!
//! A crash between the two leaves the record on disk but unpublished. It
//! only becomes visible if a later enqueue commits a larger serial.

use snafu::ensure;
use tracing::debug;

use crate::{
    Result,
    config::ReservedBytePolicy,
    counter::{COMMIT, Counter, TIP},
    error::CounterUpdateSnafu,
    page::PageStore,
    record::{pack, sanitize},
    serial::Serial,
};

/// Borrowed view of the queue state the enqueue path touches.
pub(crate) struct Appender<'q> {
    pub(crate) tip:    &'q Counter,
    pub(crate) commit: &'q Counter,
    pub(crate) pages:  &'q PageStore,
    pub(crate) shift:  u32,
    pub(crate) policy: ReservedBytePolicy,
}

impl Appender<'_> {
    /// Durably appends `payload` and returns its serial.
    ///
    /// The payload is sanitized before any lock is taken, so a rejected
    /// payload leaves the directory untouched.
    pub(crate) fn append(&self, payload: &str) -> Result<Serial> {
        let payload = sanitize(payload, self.policy)?;

        let serial = {
            let mut tip_lock = self.tip.lock_file()?;
            let tip = tip_lock.acquire()?;
            let (serial, ok) = tip.increment_and_read_previous();
            ensure!(
                ok,
                CounterUpdateSnafu {
                    counter: TIP,
                    serial:  serial.next(),
                }
            );
            let line = pack(serial, &payload, self.policy)?;
            self.pages.append(serial.page(self.shift), &line)?;
            serial
        };

        let mut commit_lock = self.commit.lock_file()?;
        let commit = commit_lock.acquire()?;
        ensure!(
            commit.advance_if_newer(serial),
            CounterUpdateSnafu {
                counter: COMMIT,
                serial,
            }
        );

        debug!(%serial, page = %serial.page(self.shift), "Enqueued record");
        Ok(serial)
    }
}
