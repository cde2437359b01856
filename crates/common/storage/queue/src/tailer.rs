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

//! Record reader (tailer) for consuming from the queue.
//!
//! A dequeue holds the `progress` lock for its whole duration, so consumers
//! are serialized against each other. It reads the `commit` watermark under
//! the `commit` lock, then walks page files oldest first:
//!
//! ```text
//!   pages:   [ q-0 ][ q-1 ][ q-2 ][ q-3 ][ q-4 ]
//!              ▲      ▲                    ▲
//!              │      min page             bound page
//!              removed (behind consumer)   scan stops after it
//! ```
//!
//! Within a page every decodable record `progress < serial <= commit` is a
//! candidate and the smallest wins. The first page that yields a candidate
//! ends the walk. Lines that fail to decode are reported and stepped over,
//! unless they name a serial the consumer has already passed.

use snafu::ensure;
use tracing::{debug, trace, warn};

use crate::{
    Result,
    counter::{Counter, PROGRESS},
    error::CounterUpdateSnafu,
    message::{DequeueReport, Message, SkippedRecord},
    page::PageStore,
    serial::Serial,
};

/// Borrowed view of the queue state the dequeue path touches.
pub(crate) struct Tailer<'q> {
    pub(crate) commit:   &'q Counter,
    pub(crate) progress: &'q Counter,
    pub(crate) pages:    &'q PageStore,
    pub(crate) shift:    u32,
}

impl Tailer<'_> {
    /// Consumes the oldest committed record, advancing `progress` to it.
    ///
    /// The returned report has no message when the queue is empty.
    pub(crate) fn take_next(&self) -> Result<DequeueReport<String>> {
        let mut progress_lock = self.progress.lock_file()?;
        let progress = progress_lock.acquire()?;

        let bound = {
            let mut commit_lock = self.commit.lock_file()?;
            commit_lock.acquire()?.read()
        };
        let Some(bound) = bound else {
            return Ok(DequeueReport::empty());
        };
        let consumed = progress.read();

        let mut report = DequeueReport::empty();
        let picked = self.scan(consumed, bound, &mut report)?;
        let Some((serial, payload)) = picked else {
            return Ok(report);
        };

        ensure!(
            progress.write(serial),
            CounterUpdateSnafu {
                counter: PROGRESS,
                serial,
            }
        );
        debug!(%serial, skipped = report.skipped.len(), "Dequeued record");

        report.message = Some(Message {
            serial,
            item: payload,
        });
        Ok(report)
    }

    fn scan(
        &self,
        consumed: Option<Serial>,
        bound: Serial,
        report: &mut DequeueReport<String>,
    ) -> Result<Option<(Serial, String)>> {
        let min_page = consumed.map(|serial| serial.page(self.shift));
        let bound_page = bound.page(self.shift);
        let (order, pages) = self.pages.ordered_pages(self.shift, min_page, Some(bound_page))?;
        let bound_key = order.key(bound_page);
        let min_key = min_page.map(|page| order.key(page));

        let mut picked: Option<(Serial, String)> = None;
        for page in pages {
            let key = order.key(page);
            if key > bound_key {
                break;
            }
            if min_key.is_some_and(|min| key < min) {
                if self.pages.remove(page) {
                    report.removed.push(page);
                }
                continue;
            }

            let Some(lines) = self.pages.read_records(page)? else {
                continue;
            };
            for (line, record) in lines {
                let (serial, payload) = match record {
                    Ok(record) => record,
                    Err(reason)
                        if reason
                            .serial()
                            .zip(consumed)
                            .is_some_and(|(serial, p)| !serial.is_after(p)) =>
                    {
                        trace!(%page, line, error = %reason, "Ignoring damaged consumed record");
                        continue;
                    }
                    Err(reason) => {
                        warn!(%page, line, error = %reason, "Skipping unreadable record");
                        report.skipped.push(SkippedRecord { page, line, reason });
                        continue;
                    }
                };
                let unconsumed = consumed.is_none_or(|p| serial.is_after(p));
                let committed = !serial.is_after(bound);
                let older = picked.as_ref().is_none_or(|(best, _)| best.is_after(serial));
                if unconsumed && committed && older {
                    picked = Some((serial, payload));
                }
            }
            if picked.is_some() {
                break;
            }
        }
        Ok(picked)
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use super::*;
    use crate::{
        appender::Appender,
        config::{FlushMode, ReservedBytePolicy},
        counter::{COMMIT, TIP},
        error::RecordError,
        serial::PageId,
    };

    struct Fixture {
        tip:      Counter,
        commit:   Counter,
        progress: Counter,
        pages:    PageStore,
    }

    impl Fixture {
        fn new(dir: &Path) -> Self {
            Self {
                tip:      Counter::new(dir, TIP, FlushMode::Async),
                commit:   Counter::new(dir, COMMIT, FlushMode::Async),
                progress: Counter::new(dir, PROGRESS, FlushMode::Async),
                pages:    PageStore::new(dir.to_path_buf(), FlushMode::Async),
            }
        }

        fn push(&self, payload: &str) -> Serial {
            Appender {
                tip:    &self.tip,
                commit: &self.commit,
                pages:  &self.pages,
                shift:  3,
                policy: ReservedBytePolicy::default(),
            }
            .append(payload)
            .unwrap()
        }

        fn pop(&self) -> DequeueReport<String> {
            Tailer {
                commit:   &self.commit,
                progress: &self.progress,
                pages:    &self.pages,
                shift:    3,
            }
            .take_next()
            .unwrap()
        }
    }

    fn item(report: &DequeueReport<String>) -> Option<&str> {
        report.message.as_ref().map(|m| m.item.as_str())
    }

    #[test]
    fn test_empty_queue() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = Fixture::new(dir.path());
        for _ in 0..3 {
            assert!(fixture.pop().is_empty());
        }
        assert!(!dir.path().join("progress.txt").exists());
    }

    #[test]
    fn test_fifo_and_progress() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = Fixture::new(dir.path());
        fixture.push("alpha");
        fixture.push("beta");

        let first = fixture.pop();
        assert_eq!(item(&first), Some("alpha"));
        assert_eq!(fixture.progress.snapshot().unwrap(), Some(Serial::new(1)));
        assert_eq!(item(&fixture.pop()), Some("beta"));
        assert_eq!(fixture.progress.snapshot().unwrap(), Some(Serial::new(2)));
        assert!(fixture.pop().is_empty());
    }

    #[test]
    fn test_uncommitted_record_is_invisible() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = Fixture::new(dir.path());
        fixture.push("visible");
        // A record appended without a commit, as after a crash mid-enqueue.
        let line = crate::record::pack(Serial::new(2), "hidden", ReservedBytePolicy::default())
            .unwrap();
        fixture.pages.append(PageId(0), &line).unwrap();

        assert_eq!(item(&fixture.pop()), Some("visible"));
        assert!(fixture.pop().is_empty());
    }

    #[test]
    fn test_corrupt_record_is_skipped_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = Fixture::new(dir.path());
        fixture.push("first");
        fixture.push("second");

        let path = dir.path().join("q-0.txt");
        let content = fs::read_to_string(&path).unwrap();
        fs::write(&path, content.replacen("first", "fir5t", 1)).unwrap();

        let report = fixture.pop();
        assert_eq!(item(&report), Some("second"));
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].page, PageId(0));
        assert_eq!(report.skipped[0].line, 1);
        assert!(matches!(
            report.skipped[0].reason,
            RecordError::ChecksumMismatch { .. }
        ));
    }

    #[test]
    fn test_corrupt_record_reported_once_passed() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = Fixture::new(dir.path());
        fixture.push("first");
        fixture.push("second");

        let path = dir.path().join("q-0.txt");
        let content = fs::read_to_string(&path).unwrap();
        fs::write(&path, content.replacen("first", "fir5t", 1)).unwrap();

        let report = fixture.pop();
        assert_eq!(item(&report), Some("second"));
        assert_eq!(report.skipped.len(), 1);

        for i in 0..3 {
            let payload = format!("n{i}");
            fixture.push(&payload);
            let report = fixture.pop();
            assert_eq!(item(&report), Some(payload.as_str()));
            assert!(report.skipped.is_empty());
        }
        let report = fixture.pop();
        assert!(report.is_empty());
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_undecodable_line_still_reported() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = Fixture::new(dir.path());
        fixture.push("one");
        fixture.pages.append(PageId(0), "garbage\n").unwrap();
        fixture.push("two");

        assert_eq!(fixture.pop().skipped.len(), 1);
        // Without a serial the line cannot be placed behind the consumer.
        let report = fixture.pop();
        assert_eq!(item(&report), Some("two"));
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn test_progress_write_failure_keeps_record() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = Fixture::new(dir.path());
        fixture.push("a");

        let blocker = dir.path().join("progress.txt.tmp");
        fs::create_dir(&blocker).unwrap();
        let err = Tailer {
            commit:   &fixture.commit,
            progress: &fixture.progress,
            pages:    &fixture.pages,
            shift:    3,
        }
        .take_next()
        .unwrap_err();
        assert!(matches!(
            err,
            crate::QueueError::CounterUpdate { counter: PROGRESS, serial } if serial == Serial::new(1)
        ));
        assert_eq!(fixture.progress.snapshot().unwrap(), None);

        fs::remove_dir(&blocker).unwrap();
        assert_eq!(item(&fixture.pop()), Some("a"));
        assert!(fixture.pop().is_empty());
    }

    #[test]
    fn test_consumed_pages_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = Fixture::new(dir.path());
        for i in 0..10 {
            fixture.push(&format!("item-{i}"));
        }
        for _ in 0..8 {
            assert!(!fixture.pop().is_empty());
        }
        // progress is 8, on page 1; page 0 goes on the next scan.
        assert!(dir.path().join("q-0.txt").exists());
        let report = fixture.pop();
        assert_eq!(item(&report), Some("item-8"));
        assert_eq!(report.removed, vec![PageId(0)]);
        assert!(!dir.path().join("q-0.txt").exists());
        assert!(dir.path().join("q-1.txt").exists());
    }

    #[test]
    fn test_scan_across_wrap() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = Fixture::new(dir.path());
        fs::write(dir.path().join("tip.txt"), "16777214").unwrap();
        fs::write(dir.path().join("progress.txt"), "16777213").unwrap();

        let serials: Vec<_> = ["a", "b", "c", "d"].iter().map(|p| fixture.push(p)).collect();
        assert_eq!(
            serials,
            vec![
                Serial::new(0xFF_FFFE),
                Serial::MAX,
                Serial::new(0),
                Serial::new(1)
            ]
        );

        let taken: Vec<_> = (0..4)
            .map(|_| fixture.pop().message.unwrap().item)
            .collect();
        assert_eq!(taken, vec!["a", "b", "c", "d"]);
        assert!(fixture.pop().is_empty());
        assert!(!dir.path().join(format!("q-{}.txt", Serial::MAX.page(3))).exists());
    }
}
