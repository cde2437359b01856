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

use std::{
    env,
    io::IsTerminal,
    sync::{Arc, Mutex, Once},
};

use bon::Builder;
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, de};
use smart_default::SmartDefault;
use tracing::Subscriber;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter, fmt::MakeWriter, layer::SubscriberExt,
    registry::LookupSpan,
};

/// Deserializes a string value, using `Default::default()` if the string is
/// empty.
///
/// # Errors
/// Returns an error if deserialization fails.
pub fn empty_string_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        Ok(T::default())
    } else {
        T::deserialize(de::value::StrDeserializer::new(&s)).map_err(|e: de::value::Error| {
            de::Error::custom(format!("invalid value, expect empty string, err: {e}"))
        })
    }
}

/// The default directory name for log files when file logging is enabled.
pub const DEFAULT_LOGGING_DIR: &str = "logs";

/// Configuration options for the logging system.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, Builder)]
#[serde(default)]
pub struct LoggingOptions {
    /// Directory for rolling log files. Empty means no file output.
    #[default = ""]
    #[builder(default)]
    pub dir: String,

    /// Filter string such as `"info"` or `"info,dirq_queue=debug"`. Falls
    /// back to `RUST_LOG`, then `"info"`.
    pub level: Option<String>,

    #[serde(default, deserialize_with = "empty_string_as_default")]
    #[builder(default)]
    pub log_format: LogFormat,

    /// Rotated files kept per log stream.
    #[default = 720]
    #[builder(default = 720)]
    pub max_log_files: usize,

    /// Mirror logs to stderr. Stdout is left to command output.
    #[default = true]
    #[builder(default = true)]
    pub append_stderr: bool,
}

/// Available log output formats.
#[derive(
    Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize, Default, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per event, for log aggregation.
    Json,
    /// Human-readable lines.
    #[default]
    Text,
}

/// Initialize logging with default options: text to stderr, no files.
///
/// Keep the returned guards alive; dropping them stops the writer threads.
#[must_use]
pub fn init_tracing_subscriber(app_name: &str) -> Vec<WorkerGuard> {
    init_global_logging(app_name, &LoggingOptions::default())
}

/// Initialize logging for tests. Safe to call from every test.
///
/// # Environment Variables
///
/// * `UNITTEST_LOG_DIR` - Directory for test logs (default:
///   "/tmp/__unittest_logs")
/// * `UNITTEST_LOG_LEVEL` - Log level filter (default: "debug")
pub fn init_default_ut_logging() {
    static START: Once = Once::new();

    START.call_once(|| {
        let Ok(mut g) = GLOBAL_UT_LOG_GUARD.as_ref().lock() else {
            return;
        };

        let dir =
            env::var("UNITTEST_LOG_DIR").unwrap_or_else(|_| "/tmp/__unittest_logs".to_string());
        let level = env::var("UNITTEST_LOG_LEVEL").unwrap_or_else(|_| "debug".to_string());

        let opts = LoggingOptions {
            dir: dir.clone(),
            level: Some(level),
            append_stderr: false,
            ..Default::default()
        };
        *g = Some(init_global_logging("unittest", &opts));

        tracing::info!("logs dir = {}", dir);
    });
}

/// Keeps unit test writer guards alive for the whole test binary.
static GLOBAL_UT_LOG_GUARD: Lazy<Arc<Mutex<Option<Vec<WorkerGuard>>>>> =
    Lazy::new(|| Arc::new(Mutex::new(None)));

const DEFAULT_LOG_TARGETS: &str = "info";

/// Initialize the global subscriber.
///
/// Layers, depending on `opts`:
///
/// - **Stderr Layer**: if `append_stderr` is true
/// - **File Layer**: hourly `{app_name}.*` files if `dir` is set
/// - **Error File Layer**: error-only `{app_name}-err.*` files if `dir` is set
///
/// Only the first call in a process has any effect. Misconfiguration (an
/// unusable directory or an invalid level string) is reported on stderr and
/// the affected part falls back to its default.
#[allow(clippy::print_stderr)]
pub fn init_global_logging(app_name: &str, opts: &LoggingOptions) -> Vec<WorkerGuard> {
    static START: Once = Once::new();
    let mut guards = vec![];

    START.call_once(|| {
        if let Err(e) = LogTracer::init() {
            eprintln!("log tracer already set: {e}");
        }

        let stderr_logging_layer = opts.append_stderr.then(|| {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
            guards.push(guard);
            fmt_layer(writer, opts.log_format, std::io::stderr().is_terminal())
        });

        let file_logging_layer = rolling_writer(app_name, opts).map(|writer| {
            let (writer, guard) = tracing_appender::non_blocking(writer);
            guards.push(guard);
            fmt_layer(writer, opts.log_format, false)
        });

        let err_file_logging_layer = rolling_writer(&format!("{app_name}-err"), opts).map(|writer| {
            let (writer, guard) = tracing_appender::non_blocking(writer);
            guards.push(guard);
            fmt_layer(writer, opts.log_format, false)
                .with_filter(filter::LevelFilter::ERROR)
                .boxed()
        });

        let level = opts
            .level
            .clone()
            .or_else(|| env::var(EnvFilter::DEFAULT_ENV).ok())
            .unwrap_or_else(|| DEFAULT_LOG_TARGETS.to_string());
        let filter = level.parse::<filter::Targets>().unwrap_or_else(|e| {
            eprintln!("invalid log level {level:?} ({e}), using {DEFAULT_LOG_TARGETS}");
            filter::Targets::new().with_default(filter::LevelFilter::INFO)
        });

        let subscriber = Registry::default()
            .with(filter)
            .with(stderr_logging_layer)
            .with(file_logging_layer)
            .with(err_file_logging_layer);

        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("error setting global tracing subscriber: {e}");
        }
    });

    guards
}

fn fmt_layer<S, W>(writer: W, format: LogFormat, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span> + 'static,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => tracing_subscriber::fmt::Layer::new()
            .json()
            .with_writer(writer)
            .with_ansi(false)
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::Layer::new()
            .with_writer(writer)
            .with_ansi(ansi)
            .boxed(),
    }
}

#[allow(clippy::print_stderr)]
fn rolling_writer(prefix: &str, opts: &LoggingOptions) -> Option<RollingFileAppender> {
    if opts.dir.is_empty() {
        return None;
    }
    RollingFileAppender::builder()
        .rotation(Rotation::HOURLY)
        .filename_prefix(prefix)
        .max_log_files(opts.max_log_files)
        .build(&opts.dir)
        .inspect_err(|e| {
            eprintln!("initializing rolling file appender at {} failed: {e}", opts.dir);
        })
        .ok()
}
