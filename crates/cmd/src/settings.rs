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

//! Layered CLI settings: serde defaults, then an optional TOML file, then
//! `DIRQ_*` environment variables. Command-line flags are applied last by
//! the caller.
//!
//! ```toml
//! [queue]
//! path = "/var/spool/dirq"
//! page_capacity = 256
//! flush_mode = "async"
//!
//! [logging]
//! level = "info,dirq_queue=debug"
//! ```
//!
//! Nested keys map to environment variables with a double underscore, e.g.
//! `DIRQ_QUEUE__PAGE_CAPACITY=256`.

use std::path::Path;

use config::{Config, ConfigError, Environment, File, FileFormat};
use dirq_common_telemetry::LoggingOptions;
use dirq_queue::QueueConfig;
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "DIRQ";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub queue:   QueueConfig,
    pub logging: LoggingOptions,
}

impl Settings {
    /// Loads settings, reading `file` when given. A given file must exist.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use dirq_queue::{FlushMode, ReservedBytePolicy};

    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.queue.page_capacity, dirq_queue::DEFAULT_PAGE_CAPACITY);
        assert_eq!(settings.queue.flush_mode, FlushMode::Sync);
        assert!(settings.logging.append_stderr);
    }

    #[test]
    fn test_toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dirq.toml");
        fs::write(
            &path,
            r#"
[queue]
path = "/tmp/dirq-settings-test"
page_capacity = 256
flush_mode = "async"
reserved_byte_policy = "reject"

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(path.as_path())).unwrap();
        assert_eq!(settings.queue.path, PathBuf::from("/tmp/dirq-settings-test"));
        assert_eq!(settings.queue.page_capacity, 256);
        assert_eq!(settings.queue.flush_mode, FlushMode::Async);
        assert_eq!(settings.queue.reserved_byte_policy, ReservedBytePolicy::Reject);
        assert_eq!(settings.logging.level.as_deref(), Some("debug"));
        assert_eq!(settings.logging.max_log_files, 720);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(dir.path().join("absent.toml").as_path())).is_err());
    }
}
