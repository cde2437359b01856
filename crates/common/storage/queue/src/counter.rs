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

//! Lock-guarded counter files.
//!
//! Each counter lives in `{name}.txt` as decimal ASCII and is guarded by an
//! exclusive advisory lock on `.{name}.lock`. Counter operations are methods
//! on [`LockedCounter`], so they cannot run outside the critical section:
//!
//! ```text
//! Counter ──lock_file()──▶ CounterLock ──acquire()──▶ LockedCounter
//!                                                     read / write / ...
//! ```
//!
//! The lock is released when the [`LockedCounter`] is dropped. Locks are
//! per open file description, so two threads of one process exclude each
//! other as long as each goes through its own [`CounterLock`].

use std::{
    fs::{self, File, OpenOptions},
    io::{self, ErrorKind, Write},
    path::{Path, PathBuf},
};

use fd_lock::{RwLock, RwLockWriteGuard};
use snafu::ResultExt;
use tracing::{trace, warn};

use crate::{Result, config::FlushMode, error::LockSnafu, serial::Serial};

pub(crate) const TIP: &str = "tip";
pub(crate) const COMMIT: &str = "commit";
pub(crate) const PROGRESS: &str = "progress";

/// One named counter inside a queue directory.
#[derive(Debug, Clone)]
pub(crate) struct Counter {
    name:       &'static str,
    data_path:  PathBuf,
    lock_path:  PathBuf,
    flush_mode: FlushMode,
}

impl Counter {
    pub(crate) fn new(dir: &Path, name: &'static str, flush_mode: FlushMode) -> Self {
        Self {
            name,
            data_path: dir.join(format!("{name}.txt")),
            lock_path: dir.join(format!(".{name}.lock")),
            flush_mode,
        }
    }

    /// Opens (creating if needed) the lock file without locking it yet.
    pub(crate) fn lock_file(&self) -> Result<CounterLock<'_>> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .context(LockSnafu {
                path: self.lock_path.clone(),
            })?;
        Ok(CounterLock {
            counter: self,
            lock:    RwLock::new(file),
        })
    }

    /// Reads the counter under a briefly held lock.
    pub(crate) fn snapshot(&self) -> Result<Option<Serial>> {
        let mut lock = self.lock_file()?;
        let locked = lock.acquire()?;
        Ok(locked.read())
    }

    fn tmp_path(&self) -> PathBuf { self.data_path.with_extension("txt.tmp") }
}

/// An open, not yet locked, counter lock file.
pub(crate) struct CounterLock<'a> {
    counter: &'a Counter,
    lock:    RwLock<File>,
}

impl CounterLock<'_> {
    /// Blocks until the exclusive lock is held.
    pub(crate) fn acquire(&mut self) -> Result<LockedCounter<'_>> {
        let counter = self.counter;
        let guard = self.lock.write().context(LockSnafu {
            path: counter.lock_path.clone(),
        })?;
        trace!(counter = counter.name, "Counter lock acquired");
        Ok(LockedCounter {
            counter,
            _guard: guard,
        })
    }
}

/// A counter whose lock is held for the lifetime of this value.
pub(crate) struct LockedCounter<'a> {
    counter: &'a Counter,
    _guard:  RwLockWriteGuard<'a, File>,
}

impl LockedCounter<'_> {
    /// Current value, or `None` when the file is missing or unusable.
    pub(crate) fn read(&self) -> Option<Serial> {
        let counter = self.counter;
        let text = match fs::read_to_string(&counter.data_path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(counter = counter.name, path = ?counter.data_path, error = %e, "Failed to read counter");
                return None;
            }
        };
        match text.parse::<Serial>() {
            Ok(serial) => Some(serial),
            Err(e) => {
                warn!(counter = counter.name, content = %text.trim(), error = %e, "Ignoring unparsable counter");
                None
            }
        }
    }

    /// Replaces the stored value. Failures are logged and reported as `false`.
    pub(crate) fn write(&self, serial: Serial) -> bool {
        match self.replace(serial) {
            Ok(()) => {
                trace!(counter = self.counter.name, %serial, "Counter written");
                true
            }
            Err(e) => {
                warn!(counter = self.counter.name, %serial, error = %e, "Failed to write counter");
                false
            }
        }
    }

    /// Allocates the current value and stores its successor.
    ///
    /// A missing counter starts at [`Serial::FIRST`].
    pub(crate) fn increment_and_read_previous(&self) -> (Serial, bool) {
        let previous = self.read().unwrap_or(Serial::FIRST);
        (previous, self.write(previous.next()))
    }

    /// Moves the counter to `candidate` unless it already is at or past it.
    pub(crate) fn advance_if_newer(&self, candidate: Serial) -> bool {
        match self.read() {
            Some(current) if !candidate.is_after(current) => true,
            _ => self.write(candidate),
        }
    }

    fn replace(&self, serial: Serial) -> io::Result<()> {
        let counter = self.counter;
        let tmp = counter.tmp_path();
        {
            let mut file = File::create(&tmp)?;
            write!(file, "{serial}")?;
            if counter.flush_mode == FlushMode::Sync {
                file.sync_all()?;
            }
        }
        fs::rename(&tmp, &counter.data_path)
    }
}
