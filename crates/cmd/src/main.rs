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

use std::{io::BufRead, path::PathBuf};

use clap::{Args, Parser, ValueEnum};
use filesyncer_app::{
    AppConfig, DEFAULT_HISTORY_PATH, DEFAULT_TARGETS_PATH, presenter::ColorChoice,
};
use filesyncer_common_telemetry::{
    logging::{self, LogFormat, LoggingOptions},
    panic_hook,
};
use filesyncer_sync::{DEFAULT_CONCURRENCY, SyncConfig};
use tokio::sync::oneshot;
use tracing::debug;

mod build_info;

#[derive(Debug, Parser)]
#[clap(
name = "filesyncer",
about = "Fetch remote files and keep local copies in sync",
author = build_info::AUTHOR,
version = build_info::FULL_VERSION)]
#[command(long_about = r"

Fetches every target listed in the target list, replaces local files whose
content changed, prints a diff preview for updated files and records the run
in the history file. With no target list, a template with two example targets
is written and used.

Examples:

filesyncer
filesyncer --config targets.json --concurrency 8 --no-pause

")]
struct Cli {
    /// Target list file
    #[arg(long = "config", value_name = "PATH", default_value = DEFAULT_TARGETS_PATH)]
    targets: PathBuf,

    /// Run history file
    #[arg(long, value_name = "PATH", default_value = DEFAULT_HISTORY_PATH)]
    history: PathBuf,

    /// Targets reconciled at the same time
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CONCURRENCY, value_parser = parse_concurrency)]
    concurrency: usize,

    /// Exit right after the run instead of waiting for Enter
    #[arg(long)]
    no_pause: bool,

    /// Colored output: auto, always or never
    #[arg(long, value_name = "WHEN", default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    #[command(flatten)]
    logging: LoggingArgs,
}

#[derive(Debug, Clone, Args)]
struct LoggingArgs {
    /// Log filter, e.g. "info" or "warn,filesyncer_sync=debug" (default:
    /// RUST_LOG, then "warn")
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,

    /// Also write rotated log files to this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormatArg::Text)]
    log_format: LogFormatArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

impl LoggingArgs {
    fn options(&self) -> LoggingOptions {
        LoggingOptions {
            dir: self
                .log_dir
                .as_ref()
                .map(|dir| dir.display().to_string())
                .unwrap_or_default(),
            level: self.log_level.clone(),
            log_format: self.log_format.into(),
            ..Default::default()
        }
    }
}

impl Cli {
    fn app_config(&self) -> AppConfig {
        AppConfig::builder()
            .targets_path(self.targets.clone())
            .history_path(self.history.clone())
            .sync(SyncConfig::builder().concurrency(self.concurrency).build())
            .color(self.color)
            .build()
    }
}

fn parse_concurrency(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(err) => Err(err.to_string()),
    }
}

/// Block until Enter, end of input or Ctrl-C
async fn wait_for_exit() {
    println!();
    println!("press Enter to exit...");
    let read_line = || {
        let mut line = String::new();
        let _ = std::io::stdin().lock().read_line(&mut line);
    };
    let interrupted = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    wait_for_read_or(read_line, interrupted).await;
}

/// Run the blocking `read` on a detached thread and return once it finishes
/// or `interrupted` resolves. A read still pending afterwards does not hold
/// the runtime open on shutdown.
async fn wait_for_read_or(
    read: impl FnOnce() + Send + 'static,
    interrupted: impl Future<Output = ()>,
) {
    let (read_tx, read_rx) = oneshot::channel();
    let spawned = std::thread::Builder::new()
        .name("exit-prompt".to_string())
        .spawn(move || {
            read();
            let _ = read_tx.send(());
        });
    if let Err(err) = spawned {
        debug!(error = %err, "exit prompt unavailable");
        return;
    }
    tokio::select! {
        _ = read_rx => {},
        () = interrupted => {},
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let _guards = match logging::init_global_logging("filesyncer", &cli.logging.options()) {
        Ok(guards) => guards,
        Err(err) => {
            eprintln!("logging disabled: {err}");
            Vec::new()
        }
    };
    panic_hook::set_panic_hook();
    debug!(?cli, "starting");

    let app = cli.app_config().open();
    app.run_until_interrupted().await;

    if !cli.no_pause {
        wait_for_exit().await;
    }
}
