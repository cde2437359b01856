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

use clap::{Args, Parser, Subcommand};
use dirq_common_telemetry::init_global_logging;
use dirq_queue::{Queue, QueueBuilder, ReservedBytePolicy, TextCodec};
use snafu::{ResultExt, Whatever};
use tracing::{debug, warn};

mod build_info;
mod settings;

use settings::Settings;

#[derive(Debug, Parser)]
#[clap(
name = "dirq",
about = "A durable FIFO queue in a directory",
author = build_info::AUTHOR,
version = build_info::FULL_VERSION)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Clone, Args)]
struct GlobalArgs {
    /// TOML settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Records per page file (rounded up to a power of two)
    #[arg(long, global = true)]
    page_capacity: Option<u32>,

    /// Character written in place of newline, carriage return and NUL
    #[arg(long, global = true, conflicts_with = "reject_reserved")]
    substitute: Option<char>,

    /// Refuse payloads containing newline, carriage return or NUL
    #[arg(long, global = true)]
    reject_reserved: bool,

    /// Log filter, e.g. "debug" or "info,dirq_queue=trace"
    #[arg(long, global = true)]
    log_level: Option<String>,
}

impl GlobalArgs {
    fn settings(&self) -> Result<Settings, Whatever> {
        let mut settings =
            Settings::load(self.config.as_deref()).whatever_context("failed to load settings")?;
        if let Some(capacity) = self.page_capacity {
            settings.queue.page_capacity = capacity;
        }
        if let Some(c) = self.substitute {
            settings.queue.reserved_byte_policy = ReservedBytePolicy::Substitute(c);
        }
        if self.reject_reserved {
            settings.queue.reserved_byte_policy = ReservedBytePolicy::Reject;
        }
        if self.log_level.is_some() {
            settings.logging.level.clone_from(&self.log_level);
        }
        Ok(settings)
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    Enqueue(EnqueueArgs),
    Dequeue(DequeueArgs),
    Stat(StatArgs),
}

impl Commands {
    fn dir(&self) -> &Path {
        match self {
            Self::Enqueue(args) => &args.dir,
            Self::Dequeue(args) => &args.dir,
            Self::Stat(args) => &args.dir,
        }
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Appends payloads to the queue and prints the serial of each.
Examples:

dirq enqueue /tmp/q hello world

")]
struct EnqueueArgs {
    /// Queue directory
    dir: PathBuf,

    #[arg(required = true)]
    payloads: Vec<String>,
}

impl EnqueueArgs {
    fn run(&self, queue: &Queue<TextCodec>) -> Result<(), Whatever> {
        for payload in &self.payloads {
            let serial = queue
                .enqueue(payload)
                .whatever_context("failed to enqueue")?;
            println!("{serial}");
        }
        debug!(count = self.payloads.len(), "Enqueue command finished");
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Removes payloads from the head of the queue and prints them, one per line.
Stops early when the queue is empty.
Examples:

dirq dequeue /tmp/q --count 10

")]
struct DequeueArgs {
    /// Queue directory
    dir: PathBuf,

    /// Maximum number of payloads to take
    #[arg(short = 'n', long, default_value_t = 1)]
    count: usize,
}

impl DequeueArgs {
    fn run(&self, queue: &Queue<TextCodec>) -> Result<(), Whatever> {
        let mut taken = 0;
        for _ in 0..self.count {
            let report = queue
                .dequeue_with_report()
                .whatever_context("failed to dequeue")?;
            for skipped in &report.skipped {
                warn!(
                    page = %skipped.page,
                    line = skipped.line,
                    reason = %skipped.reason,
                    "Skipped unreadable record"
                );
            }
            let Some(message) = report.message else {
                break;
            };
            println!("{}", message.item);
            taken += 1;
        }
        debug!(requested = self.count, taken, "Dequeue command finished");
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Prints the queue counters and the page files on disk.
Examples:

dirq stat /tmp/q

")]
struct StatArgs {
    /// Queue directory
    dir: PathBuf,
}

impl StatArgs {
    fn run(&self, queue: &Queue<TextCodec>) -> Result<(), Whatever> {
        let stat = queue.stat().whatever_context("failed to read queue state")?;
        let show = |serial: Option<dirq_queue::Serial>| {
            serial.map_or_else(|| "-".to_string(), |s| s.to_string())
        };
        println!("path:     {}", self.dir.display());
        println!("tip:      {}", show(stat.tip));
        println!("commit:   {}", show(stat.commit));
        println!("progress: {}", show(stat.progress));
        println!("pending:  {}", stat.pending());
        let pages: Vec<String> = stat.pages.iter().map(ToString::to_string).collect();
        println!("pages:    {}", pages.join(" "));
        Ok(())
    }
}

fn main() -> Result<(), Whatever> {
    human_panic::setup_panic!();

    let cli = Cli::parse();
    let mut settings = cli.global.settings()?;
    settings.queue.path = cli.commands.dir().to_path_buf();
    let _guards = init_global_logging("dirq", &settings.logging);

    let queue = QueueBuilder::from_config(settings.queue)
        .codec(TextCodec)
        .build()
        .whatever_context("failed to open queue")?;

    match cli.commands {
        Commands::Enqueue(ea) => ea.run(&queue),
        Commands::Dequeue(da) => da.run(&queue),
        Commands::Stat(sa) => sa.run(&queue),
    }
}
