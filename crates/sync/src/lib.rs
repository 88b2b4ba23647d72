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

//! Fetch-and-reconcile engine for filesyncer.
//!
//! A run takes a list of [`Target`]s, fetches each remote resource on a
//! bounded pool of tasks, compares it with the local file by
//! [`Fingerprint`], writes changed content and reports one
//! [`ReconcileOutcome`] per target. Outcomes are gathered into a
//! [`RunSummary`] that [`HistoryLedger`] appends to a bounded
//! [`HistoryLog`].

mod diff;
mod error;
mod hasher;
mod ledger;
mod orchestrator;
mod progress;
mod reconcile;
mod store;
mod types;

pub use diff::{BINARY_CONTENT_LINE, Comparison, DiffEngine, NEW_CONTENT_LINE};
pub use error::{Error, Result};
pub use hasher::{Fingerprint, fingerprint, fingerprint_of_local_file};
pub use ledger::{DEFAULT_HISTORY_CAPACITY, HistoryLedger, HistoryLog};
pub use orchestrator::{DEFAULT_CONCURRENCY, DEFAULT_PROGRESS_INTERVAL, SyncConfig, SyncOrchestrator};
pub use progress::{ProgressEntry, ProgressGuard, ProgressObserver, ProgressTracker, TaskPhase, watch_progress};
pub use store::{
    HistoryStore, JsonHistoryFile, JsonTargetFile, TargetList, TargetListSource, TargetOrigin,
    default_targets,
};
pub use types::{OutcomeStatus, ReconcileOutcome, RunSummary, StatusCounts, Target};
