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
    collections::{HashMap, HashSet},
    sync::Arc,
};

use bon::Builder;
use downloader::Fetch;
use jiff::{SignedDuration, Timestamp};
use smart_default::SmartDefault;
use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::task::AbortOnDropHandle;
use tracing::{error, info, warn};

use crate::{
    diff::DiffEngine,
    progress::{ProgressObserver, ProgressTracker, watch_progress},
    reconcile::Reconciler,
    types::{ReconcileOutcome, RunSummary, Target},
};

/// Number of targets reconciled at the same time
pub const DEFAULT_CONCURRENCY: usize = 5;

/// How often the progress observer is handed a snapshot
pub const DEFAULT_PROGRESS_INTERVAL: SignedDuration = SignedDuration::from_millis(500);

/// Configuration for a sync run
#[derive(Debug, Clone, SmartDefault, Builder)]
pub struct SyncConfig {
    /// Upper bound on concurrently running reconcile tasks (default: 5)
    #[default(DEFAULT_CONCURRENCY)]
    #[builder(default = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Progress polling interval (default: 500ms)
    #[default(DEFAULT_PROGRESS_INTERVAL)]
    #[builder(default = DEFAULT_PROGRESS_INTERVAL)]
    pub progress_interval: SignedDuration,
}

/// Runs one reconcile task per target on a bounded pool and gathers the
/// outcomes into a [`RunSummary`].
pub struct SyncOrchestrator {
    fetcher:  Arc<dyn Fetch>,
    config:   SyncConfig,
    diff:     DiffEngine,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl SyncOrchestrator {
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetch>, config: SyncConfig) -> Self {
        Self {
            fetcher,
            config,
            diff: DiffEngine::default(),
            observer: None,
        }
    }

    /// Render progress snapshots to `observer` while runs are in flight
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    #[must_use]
    pub fn with_diff_engine(mut self, diff: DiffEngine) -> Self {
        self.diff = diff;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &SyncConfig { &self.config }

    /// Reconcile every target and return the run's summary.
    ///
    /// Blocks until all tasks have completed; outcomes appear in completion
    /// order. Per-target failures are recorded as `error` outcomes and never
    /// abort the run. A target reusing an earlier target's name is not run
    /// and is reported as an `error` outcome.
    ///
    /// Dropping the returned future aborts every task and the progress
    /// renderer; each progress entry is still marked finished.
    pub async fn run(&self, targets: &[Target]) -> RunSummary {
        let timestamp = Timestamp::now().to_string();
        let tracker = ProgressTracker::new();
        info!(targets = targets.len(), concurrency = self.config.concurrency, "sync run started");

        // Names key the progress table, so only the first target with a
        // given name runs.
        let mut seen = HashSet::with_capacity(targets.len());
        let mut unique = Vec::with_capacity(targets.len());
        let mut rejected = Vec::new();
        for target in targets {
            if seen.insert(target.name.as_str()) {
                unique.push(target.clone());
            } else {
                warn!(
                    target = %target.name,
                    url = %target.source_url,
                    "duplicate target name skipped"
                );
                rejected.push(ReconcileOutcome::error(&target.name, "duplicate target name"));
            }
        }

        // Register every entry up front so the renderer cannot observe an
        // empty, vacuously finished table before the first task starts.
        for target in &unique {
            tracker.start(&target.name);
        }

        // Dropping the run, e.g. on interrupt, stops the renderer too.
        let watcher = self.observer.as_ref().map(|observer| {
            AbortOnDropHandle::new(tokio::spawn(watch_progress(
                tracker.clone(),
                self.poll_interval(),
                Arc::clone(observer),
            )))
        });

        let mut outcomes = self.dispatch(&unique, &tracker).await;
        outcomes.extend(rejected);

        if let Some(watcher) = watcher {
            if let Err(err) = watcher.await {
                error!(error = %err, "progress renderer stopped abnormally");
            }
        }

        let summary = RunSummary {
            timestamp,
            outcomes,
        };
        let counts = summary.counts();
        info!(
            new = counts.new,
            updated = counts.updated,
            unchanged = counts.unchanged,
            error = counts.error,
            "sync run finished"
        );
        summary
    }

    async fn dispatch(&self, targets: &[Target], tracker: &ProgressTracker) -> Vec<ReconcileOutcome> {
        let permits = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let reconciler = Reconciler {
            fetcher: Arc::clone(&self.fetcher),
            diff:    self.diff.clone(),
            tracker: tracker.clone(),
        };

        let mut tasks = JoinSet::new();
        let mut names = HashMap::with_capacity(targets.len());
        for target in targets {
            let reconciler = reconciler.clone();
            let permits = Arc::clone(&permits);
            let target = target.clone();
            let name = target.name.clone();
            // Owned by the task from the start, so an entry still waiting for
            // a permit is finalized when the task is aborted.
            let guard = tracker.guard(&name);
            let handle = tasks.spawn(async move {
                // The semaphore is never closed, so acquiring cannot fail.
                let _permit = permits.acquire_owned().await;
                reconciler.reconcile(&target, guard).await
            });
            names.insert(handle.id(), name);
        }

        let mut outcomes = Vec::with_capacity(targets.len());
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, outcome)) => outcomes.push(outcome),
                Err(err) => {
                    let name = names.remove(&err.id()).unwrap_or_default();
                    error!(target = %name, error = %err, "reconcile task panicked");
                    outcomes.push(ReconcileOutcome::error(name, format!("task panicked: {err}")));
                }
            }
        }
        outcomes
    }

    fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::try_from(self.config.progress_interval)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(std::time::Duration::from_millis(500))
    }
}
