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
    sync::{
        LazyLock,
        atomic::{AtomicBool, Ordering},
    },
};

use bon::Builder;
use parking_lot::Mutex;
use smart_default::SmartDefault;
use snafu::{ResultExt, Snafu};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, Layer, Registry, filter, layer::SubscriberExt};

/// The default directory name for log files when file logging is enabled.
pub const DEFAULT_LOGGING_DIR: &str = "logs";

/// Default log level filter when neither `LoggingOptions::level` nor
/// `RUST_LOG` is set. Console logs share the terminal with the sync report,
/// so only problems are shown.
const DEFAULT_LOG_TARGETS: &str = "warn";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LoggingError {
    #[snafu(display("invalid log level filter '{filter}': {source}"))]
    InvalidFilter {
        filter: String,
        source: filter::ParseError,
    },

    #[snafu(display("initializing rolling file appender at {dir} failed: {source}"))]
    FileAppender {
        dir:    String,
        source: tracing_appender::rolling::InitError,
    },

    #[snafu(display("failed to bridge log records: {source}"))]
    LogBridge { source: tracing_log::log::SetLoggerError },

    #[snafu(display("failed to install global subscriber: {source}"))]
    GlobalSubscriber {
        source: tracing::subscriber::SetGlobalDefaultError,
    },
}

/// Configuration options for the logging system.
#[derive(Clone, Debug, PartialEq, Eq, SmartDefault, Builder)]
pub struct LoggingOptions {
    /// Directory for rotated log files.
    ///
    /// When non-empty, hourly rotated files `<app>.*` and error-only files
    /// `<app>-err.*` are written there. Empty disables file logging.
    #[default = ""]
    #[builder(default, into)]
    pub dir: String,

    /// Log level filter such as "info" or "warn,filesyncer_sync=debug".
    /// Falls back to `RUST_LOG`, then to "warn".
    #[builder(into)]
    pub level: Option<String>,

    #[builder(default)]
    pub log_format: LogFormat,

    /// Maximum number of rotated files kept per log stream (default: 720,
    /// thirty days of hourly files).
    #[default = 720]
    #[builder(default = 720)]
    pub max_log_files: usize,

    /// Whether to write logs to stderr in addition to files.
    #[default = true]
    #[builder(default = true)]
    pub append_stderr: bool,
}

/// Available log output formats.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Default, derive_more::Display)]
pub enum LogFormat {
    /// One JSON object per event, with the current span and span list.
    #[display("json")]
    Json,

    /// Human-readable lines.
    #[default]
    #[display("text")]
    Text,
}

/// Initialize logging specifically designed for unit tests.
///
/// Logs go to files under `UNITTEST_LOG_DIR` (default
/// "/tmp/__unittest_logs") at `UNITTEST_LOG_LEVEL` (default "debug" with
/// noisy HTTP crates turned down). Safe to call from every test; only the
/// first call has an effect.
pub fn init_default_ut_logging() {
    let mut guards = GLOBAL_UT_LOG_GUARD.lock();
    if guards.is_some() {
        return;
    }

    let dir = env::var("UNITTEST_LOG_DIR").unwrap_or_else(|_| "/tmp/__unittest_logs".to_string());
    let level = env::var("UNITTEST_LOG_LEVEL").unwrap_or_else(|_| {
        "debug,hyper=warn,hyper_util=warn,tower=warn,reqwest=warn,h2=info".to_string()
    });
    let opts = LoggingOptions {
        dir: dir.clone(),
        level: Some(level),
        append_stderr: false,
        ..Default::default()
    };

    match init_global_logging("unittest", &opts) {
        Ok(installed) => {
            *guards = Some(installed);
            tracing::info!("logs dir = {}", dir);
        }
        Err(err) => {
            eprintln!("unit test logging disabled: {err}");
            *guards = Some(Vec::new());
        }
    }
}

/// Worker guards of unit test logging, kept alive for the whole test binary.
static GLOBAL_UT_LOG_GUARD: LazyLock<Mutex<Option<Vec<WorkerGuard>>>> =
    LazyLock::new(|| Mutex::new(None));

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Install the global tracing subscriber.
///
/// Layers, depending on `opts`:
///
/// - **Stderr layer**: if `append_stderr` is true
/// - **File layer**: hourly rotated files under `dir`
/// - **Error file layer**: error-only hourly rotated files under `dir`
///
/// Returns the `WorkerGuard`s of the non-blocking writers; dropping them
/// flushes and stops logging. Only the first call installs a subscriber,
/// later calls return no guards.
pub fn init_global_logging(
    app_name: &str,
    opts: &LoggingOptions,
) -> Result<Vec<WorkerGuard>, LoggingError> {
    let level = opts
        .level
        .clone()
        .or_else(|| env::var(EnvFilter::DEFAULT_ENV).ok())
        .unwrap_or_else(|| DEFAULT_LOG_TARGETS.to_string());
    let filter = level
        .parse::<filter::Targets>()
        .context(InvalidFilterSnafu { filter: &level })?;

    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(Vec::new());
    }
    let mut guards = vec![];

    let stderr_logging_layer = if opts.append_stderr {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
        guards.push(guard);
        let ansi = std::io::stderr().is_terminal();

        Some(if opts.log_format == LogFormat::Json {
            tracing_subscriber::fmt::Layer::new()
                .json()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_current_span(true)
                .with_span_list(true)
                .boxed()
        } else {
            tracing_subscriber::fmt::Layer::new()
                .with_writer(writer)
                .with_ansi(ansi)
                .boxed()
        })
    } else {
        None
    };

    let (file_logging_layer, err_file_logging_layer) = if opts.dir.is_empty() {
        (None, None)
    } else {
        let (writer, guard) =
            tracing_appender::non_blocking(rolling_appender(opts, app_name.to_string())?);
        guards.push(guard);
        let (err_writer, err_guard) =
            tracing_appender::non_blocking(rolling_appender(opts, format!("{app_name}-err"))?);
        guards.push(err_guard);

        if opts.log_format == LogFormat::Json {
            (
                Some(
                    tracing_subscriber::fmt::Layer::new()
                        .json()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_current_span(true)
                        .with_span_list(true)
                        .boxed(),
                ),
                Some(
                    tracing_subscriber::fmt::Layer::new()
                        .json()
                        .with_writer(err_writer)
                        .with_ansi(false)
                        .with_filter(filter::LevelFilter::ERROR)
                        .boxed(),
                ),
            )
        } else {
            (
                Some(
                    tracing_subscriber::fmt::Layer::new()
                        .with_writer(writer)
                        .with_ansi(false)
                        .boxed(),
                ),
                Some(
                    tracing_subscriber::fmt::Layer::new()
                        .with_writer(err_writer)
                        .with_ansi(false)
                        .with_filter(filter::LevelFilter::ERROR)
                        .boxed(),
                ),
            )
        }
    };

    let subscriber = Registry::default()
        .with(filter)
        .with(stderr_logging_layer)
        .with(file_logging_layer)
        .with(err_file_logging_layer);

    LogTracer::init().context(LogBridgeSnafu)?;
    tracing::subscriber::set_global_default(subscriber).context(GlobalSubscriberSnafu)?;

    Ok(guards)
}

fn rolling_appender(
    opts: &LoggingOptions,
    prefix: String,
) -> Result<RollingFileAppender, LoggingError> {
    RollingFileAppender::builder()
        .rotation(Rotation::HOURLY)
        .filename_prefix(prefix)
        .max_log_files(opts.max_log_files)
        .build(&opts.dir)
        .context(FileAppenderSnafu { dir: &opts.dir })
}
