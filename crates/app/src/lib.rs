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

//! One filesyncer run: load targets and history, sync, report, persist.

pub mod presenter;

use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use bon::Builder;
use downloader::{FetcherConfig, HttpFetcher, error_chain};
use filesyncer_sync::{
    Error as SyncError, HistoryLedger, HistoryLog, HistoryStore, JsonHistoryFile, JsonTargetFile,
    RunSummary, SyncConfig, SyncOrchestrator, Target, TargetListSource, TargetOrigin,
};
use smart_default::SmartDefault;
use snafu::{ResultExt, Whatever};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::presenter::{ColorChoice, Presenter, ProgressView, Tone};

pub const DEFAULT_TARGETS_PATH: &str = "config.json";
pub const DEFAULT_HISTORY_PATH: &str = "sync_history.json";

/// Configuration for the application
#[derive(Debug, Clone, SmartDefault, Builder)]
pub struct AppConfig {
    /// Target list file
    #[default(PathBuf::from(DEFAULT_TARGETS_PATH))]
    #[builder(default = PathBuf::from(DEFAULT_TARGETS_PATH), into)]
    pub targets_path:       PathBuf,
    /// Run history file
    #[default(PathBuf::from(DEFAULT_HISTORY_PATH))]
    #[builder(default = PathBuf::from(DEFAULT_HISTORY_PATH), into)]
    pub history_path:       PathBuf,
    #[builder(default)]
    pub sync:               SyncConfig,
    #[builder(default)]
    pub fetcher:            FetcherConfig,
    #[builder(default)]
    pub history:            HistoryLedger,
    /// Runs listed in the closing summary
    #[default = 5]
    #[builder(default = 5)]
    pub trailing_runs:      usize,
    /// Diff lines shown per updated target
    #[default = 10]
    #[builder(default = 10)]
    pub diff_preview_lines: usize,
    #[builder(default)]
    pub color:              ColorChoice,
}

impl AppConfig {
    /// Build the app, rendering to stdout as `color` dictates
    #[must_use]
    pub fn open(self) -> App {
        let presenter = self.color.stdout_presenter();
        App::new(self, presenter)
    }
}

/// What a completed run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary:  RunSummary,
    pub duration: Duration,
}

pub struct App {
    config:             AppConfig,
    presenter:          Arc<dyn Presenter>,
    /// Cancelling it interrupts [`App::run_until_interrupted`]
    cancellation_token: CancellationToken,
}

impl App {
    #[must_use]
    pub fn new(config: AppConfig, presenter: Arc<dyn Presenter>) -> Self {
        Self {
            config,
            presenter,
            cancellation_token: CancellationToken::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &AppConfig { &self.config }

    #[must_use]
    pub fn presenter(&self) -> &Arc<dyn Presenter> { &self.presenter }

    /// Request the running [`App::run_until_interrupted`] to stop
    pub fn shutdown(&self) {
        info!("shutdown requested");
        self.cancellation_token.cancel();
    }

    /// Perform one run.
    ///
    /// Returns `None` when there is nothing to sync; history is left
    /// untouched in that case. Problems with the target list or history
    /// files degrade to warnings; only a broken HTTP client setup is an
    /// error.
    pub async fn run(&self) -> Result<Option<RunReport>, Whatever> {
        let started = Instant::now();
        self.presenter.banner();

        let targets = self.load_targets();
        if targets.is_empty() {
            warn!(path = %self.config.targets_path.display(), "no targets to sync");
            self.presenter.failure("no valid targets");
            return Ok(None);
        }

        let history_store = JsonHistoryFile::new(&self.config.history_path);
        let log = self.load_history(&history_store);
        self.presenter.last_sync(log.most_recent());

        let fetcher =
            HttpFetcher::new(&self.config.fetcher).whatever_context("failed to set up HTTP client")?;
        let orchestrator = SyncOrchestrator::new(Arc::new(fetcher), self.config.sync.clone())
            .with_observer(Arc::new(ProgressView::new(Arc::clone(&self.presenter))));
        let summary = orchestrator.run(&targets).await;

        for outcome in &summary.outcomes {
            self.presenter.outcome(outcome, self.config.diff_preview_lines);
        }

        let log = self.config.history.append(log, summary.clone());
        if let Err(err) = history_store.save(&log) {
            warn!(error = %err, "failed to save history");
            self.presenter.failure(&format!("failed to save history: {err}"));
        }

        let duration = started.elapsed();
        self.presenter.closing(duration, log.tail(self.config.trailing_runs));
        info!(elapsed = ?duration, "run complete");
        Ok(Some(RunReport { summary, duration }))
    }

    /// [`App::run`], raced against Ctrl-C, SIGTERM and [`App::shutdown`].
    ///
    /// Interruption and errors are reported through the presenter rather
    /// than returned.
    pub async fn run_until_interrupted(&self) -> Option<RunReport> {
        tokio::select! {
            result = self.run() => match result {
                Ok(report) => report,
                Err(err) => {
                    let cause = error_chain(&err);
                    error!(error = %cause, "run failed");
                    self.presenter.failure(&format!("unexpected error: {cause}"));
                    None
                }
            },
            () = shutdown_signal(self.cancellation_token.clone()) => {
                self.presenter.line(Tone::Plain, "");
                self.presenter.warning("cancelled by user");
                None
            }
        }
    }

    fn load_targets(&self) -> Vec<Target> {
        let source = JsonTargetFile::new(&self.config.targets_path);
        let path = source.path().display();
        match source.load_or_init() {
            Ok(list) => {
                if let TargetOrigin::Defaults { template_error } = list.origin {
                    self.presenter
                        .warning(&format!("target list {path} not found, using defaults"));
                    match template_error {
                        None => self.presenter.line(
                            Tone::Success,
                            &format!("created default target list {path}"),
                        ),
                        Some(err) => {
                            warn!(error = %err, "failed to write target list template");
                            self.presenter
                                .failure(&format!("failed to create target list: {err}"));
                        }
                    }
                }
                list.targets
            }
            Err(err) => {
                warn!(error = %err, "target list unusable");
                self.presenter.failure(&err.to_string());
                Vec::new()
            }
        }
    }

    fn load_history(&self, store: &JsonHistoryFile) -> HistoryLog {
        match store.load_or_init() {
            Ok(log) => log,
            Err(err @ SyncError::ConfigFormat { .. }) => {
                warn!(error = %err, "history unreadable, starting empty");
                self.presenter.failure(&err.to_string());
                HistoryLog::new()
            }
            Err(err) => {
                warn!(error = %err, "history unavailable, starting empty");
                self.presenter.failure(&format!("history unavailable: {err}"));
                HistoryLog::new()
            }
        }
    }
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C signal"); },
        () = terminate => { info!("Received terminate signal"); },
        () = token.cancelled() => { info!("Received shutdown signal"); },
    }
}
