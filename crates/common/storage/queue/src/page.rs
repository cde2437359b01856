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

//! Append-only page files.
//!
//! A page holds every record whose `serial >> shift` equals its id, in
//! allocation order. Pages are created by the first append, never rewritten,
//! and removed whole once a dequeue scan finds them behind the consumer.

use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::PathBuf,
};

use snafu::ResultExt;
use tracing::{info, warn};

use crate::{
    Result,
    config::FlushMode,
    error::{PageReadSnafu, PageWriteSnafu, RecordError},
    path::{page_file_path, scan_page_files},
    record::decode_line,
    serial::{PageId, PageOrder, Serial},
};

/// One line of a page: its 1-based number and what it decoded to.
pub(crate) type PageLine = (usize, std::result::Result<(Serial, String), RecordError>);

#[derive(Debug, Clone)]
pub(crate) struct PageStore {
    dir:        PathBuf,
    flush_mode: FlushMode,
}

impl PageStore {
    pub(crate) const fn new(dir: PathBuf, flush_mode: FlushMode) -> Self { Self { dir, flush_mode } }

    /// Appends one packed record line to `page`, creating the file if needed.
    pub(crate) fn append(&self, page: PageId, line: &str) -> Result<()> {
        let path = page_file_path(&self.dir, page);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context(PageWriteSnafu { path: &path })?;
        file.write_all(line.as_bytes())
            .context(PageWriteSnafu { path: &path })?;
        if self.flush_mode == FlushMode::Sync {
            file.sync_data().context(PageWriteSnafu { path: &path })?;
        }
        Ok(())
    }

    /// Decodes every non-empty line of `page`.
    ///
    /// Returns `None` when the page does not exist, e.g. because another
    /// consumer removed it between listing and reading.
    pub(crate) fn read_records(&self, page: PageId) -> Result<Option<Vec<PageLine>>> {
        let path = page_file_path(&self.dir, page);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context(PageReadSnafu { path }),
        };

        let lines = bytes
            .split(|&b| b == b'\n')
            .enumerate()
            .filter(|(_, line)| !line.iter().all(|&b| b == b'\r' || b == 0))
            .map(|(idx, line)| {
                let record = decode_line(line).map(|(serial, payload)| (serial, payload.to_owned()));
                (idx + 1, record)
            })
            .collect();
        Ok(Some(lines))
    }

    /// Deletes a fully consumed page. Failure is logged, never raised.
    pub(crate) fn remove(&self, page: PageId) -> bool {
        let path = page_file_path(&self.dir, page);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(%page, path = ?path, "Removed consumed page");
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                warn!(%page, path = ?path, error = %e, "Failed to remove consumed page");
                false
            }
        }
    }

    /// Page ids on disk, unordered.
    pub(crate) fn pages(&self) -> Result<Vec<PageId>> { scan_page_files(&self.dir) }

    /// Page ids on disk sorted oldest first, with the ordering used to sort
    /// them. The `min` and `bound` pages take part in the wrap decision.
    pub(crate) fn ordered_pages(
        &self,
        shift: u32,
        min: Option<PageId>,
        bound: Option<PageId>,
    ) -> Result<(PageOrder, Vec<PageId>)> {
        let mut pages = self.pages()?;
        let order = PageOrder::new(shift, pages.iter().copied().chain(min).chain(bound));
        pages.sort_by_key(|&page| order.key(page));
        Ok((order, pages))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::{config::ReservedBytePolicy, record::pack};

    fn store(dir: &Path) -> PageStore { PageStore::new(dir.to_path_buf(), FlushMode::Sync) }

    fn line(serial: u32, payload: &str) -> String {
        pack(Serial::new(serial), payload, ReservedBytePolicy::default()).unwrap()
    }

    #[test]
    fn test_append_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let pages = store(dir.path());
        pages.append(PageId(0), &line(1, "one")).unwrap();
        pages.append(PageId(0), &line(2, "two")).unwrap();

        let records = pages.read_records(PageId(0)).unwrap().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], (1, Ok((Serial::new(1), "one".to_string()))));
        assert_eq!(records[1], (2, Ok((Serial::new(2), "two".to_string()))));
    }

    #[test]
    fn test_missing_page_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store(dir.path()).read_records(PageId(9)).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_line_is_reported_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let pages = store(dir.path());
        pages.append(PageId(0), &line(1, "one")).unwrap();
        pages.append(PageId(0), "not a record\n").unwrap();
        pages.append(PageId(0), &line(2, "two")).unwrap();

        let records = pages.read_records(PageId(0)).unwrap().unwrap();
        assert_eq!(records.len(), 3);
        assert!(matches!(records[1], (2, Err(RecordError::Decode { .. }))));
        assert!(records[2].1.is_ok());
    }

    #[test]
    fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let pages = store(dir.path());
        pages.append(PageId(4), &line(32, "x")).unwrap();
        assert!(pages.remove(PageId(4)));
        assert!(!dir.path().join("q-4.txt").exists());
        assert!(pages.remove(PageId(4)));
    }

    #[test]
    fn test_ordered_pages_plain() {
        let dir = tempfile::tempdir().unwrap();
        let pages = store(dir.path());
        for page in [5, 0, 2] {
            pages.append(PageId(page), &line(page << 3, "x")).unwrap();
        }
        let (order, sorted) = pages.ordered_pages(3, Some(PageId(0)), Some(PageId(5))).unwrap();
        assert!(!order.is_rotated());
        assert_eq!(sorted, vec![PageId(0), PageId(2), PageId(5)]);
    }

    #[test]
    fn test_ordered_pages_across_wrap() {
        let dir = tempfile::tempdir().unwrap();
        let pages = store(dir.path());
        let top = Serial::MAX.page(3);
        for page in [PageId(1), PageId(0), top] {
            pages.append(page, &line(page.0 << 3, "x")).unwrap();
        }
        let (order, sorted) = pages.ordered_pages(3, Some(top), Some(PageId(1))).unwrap();
        assert!(order.is_rotated());
        assert_eq!(sorted, vec![top, PageId(0), PageId(1)]);
    }

    #[test]
    fn test_ordered_pages_wrap_decided_by_counters() {
        let dir = tempfile::tempdir().unwrap();
        let pages = store(dir.path());
        pages.append(PageId(0), &line(0, "x")).unwrap();
        let top = Serial::MAX.page(3);

        let (order, _) = pages.ordered_pages(3, None, Some(PageId(0))).unwrap();
        assert!(!order.is_rotated());
        let (order, sorted) = pages.ordered_pages(3, Some(top), Some(PageId(0))).unwrap();
        assert!(order.is_rotated());
        assert!(order.key(top) < order.key(PageId(0)));
        assert_eq!(sorted, vec![PageId(0)]);
    }
}
