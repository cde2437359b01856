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

use std::path::{Path, PathBuf};

use snafu::ResultExt;

use crate::{Result, error::PageReadSnafu, serial::PageId};

const PAGE_PREFIX: &str = "q-";
const PAGE_SUFFIX: &str = ".txt";

/// Generates a page file name: `q-<pageid>.txt`.
pub fn page_file_name(page: PageId) -> String { format!("{PAGE_PREFIX}{page}{PAGE_SUFFIX}") }

/// Returns the full path of a page file inside `dir`.
pub fn page_file_path<P: AsRef<Path>>(dir: P, page: PageId) -> PathBuf {
    dir.as_ref().join(page_file_name(page))
}

/// Parses `q-<pageid>.txt`, returning `None` for any other name.
pub fn parse_page_file_name(name: &str) -> Option<PageId> {
    let digits = name.strip_prefix(PAGE_PREFIX)?.strip_suffix(PAGE_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(PageId)
}

/// Lists the page ids present in `dir`, unordered.
pub fn scan_page_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PageId>> {
    let dir = dir.as_ref();
    let mut pages = Vec::new();
    for entry in std::fs::read_dir(dir).context(PageReadSnafu { path: dir })? {
        let entry = entry.context(PageReadSnafu { path: dir })?;
        if let Some(page) = entry.file_name().to_str().and_then(parse_page_file_name) {
            pages.push(page);
        }
    }
    Ok(pages)
}
