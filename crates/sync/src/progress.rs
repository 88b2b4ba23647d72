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

//! Shared per-target transfer progress.
//!
//! Every task owns exactly one entry and mutates it through the tracker; the
//! renderer only ever reads snapshots. The lock is held for a single field
//! update or one table copy, never across I/O.

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::Mutex;
use serde::Serialize;
use strum_macros::{Display, EnumString};

/// Position of a target in the reconcile state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskPhase {
    Pending,
    Fetching,
    Comparing,
    Writing,
    Done,
    Failed,
}

/// Transfer progress of one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEntry {
    pub target_name:      String,
    /// Advertised length; 0 while unknown
    pub total_bytes:      u64,
    pub downloaded_bytes: u64,
    pub finished:         bool,
    pub phase:            TaskPhase,
}

impl ProgressEntry {
    fn pending(target_name: &str) -> Self {
        Self {
            target_name:      target_name.to_string(),
            total_bytes:      0,
            downloaded_bytes: 0,
            finished:         false,
            phase:            TaskPhase::Pending,
        }
    }

    /// Completion percentage. Without a known total this is 100 once
    /// finished and 0 before.
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.total_bytes > 0 {
            let percent = self.downloaded_bytes.saturating_mul(100) / self.total_bytes;
            #[allow(clippy::cast_possible_truncation)]
            let percent = percent.min(100) as u8;
            percent
        } else if self.finished {
            100
        } else {
            0
        }
    }
}

#[derive(Debug, Default)]
struct Table {
    entries: Vec<ProgressEntry>,
    index:   HashMap<String, usize>,
}

impl Table {
    fn get_mut(&mut self, name: &str) -> Option<&mut ProgressEntry> {
        let idx = *self.index.get(name)?;
        self.entries.get_mut(idx)
    }
}

/// Concurrent table of progress entries keyed by target name.
///
/// Cloning yields another handle onto the same table. Entries are never
/// removed; they live as long as the tracker.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    table: Arc<Mutex<Table>>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register `name`, or reset its entry if already present
    pub fn start(&self, name: &str) {
        let mut table = self.table.lock();
        if let Some(entry) = table.get_mut(name) {
            *entry = ProgressEntry::pending(name);
            return;
        }
        let idx = table.entries.len();
        table.entries.push(ProgressEntry::pending(name));
        table.index.insert(name.to_string(), idx);
    }

    /// Record bytes received so far. Unknown names are ignored.
    pub fn update(&self, name: &str, downloaded: u64, total: Option<u64>) {
        if let Some(entry) = self.table.lock().get_mut(name) {
            entry.downloaded_bytes = downloaded;
            entry.total_bytes = total.unwrap_or(0);
        }
    }

    pub fn set_phase(&self, name: &str, phase: TaskPhase) {
        if let Some(entry) = self.table.lock().get_mut(name) {
            entry.phase = phase;
        }
    }

    /// Mark `name` finished, ending in `Done` or `Failed`
    pub fn finish(&self, name: &str, succeeded: bool) {
        if let Some(entry) = self.table.lock().get_mut(name) {
            entry.finished = true;
            entry.phase = if succeeded {
                TaskPhase::Done
            } else {
                TaskPhase::Failed
            };
        }
    }

    /// Copy of the whole table in registration order
    #[must_use]
    pub fn snapshot(&self) -> Vec<ProgressEntry> { self.table.lock().entries.clone() }

    /// True when every registered entry is finished (vacuously true when
    /// empty)
    #[must_use]
    pub fn all_finished(&self) -> bool { self.table.lock().entries.iter().all(|e| e.finished) }

    #[must_use]
    pub fn len(&self) -> usize { self.table.lock().entries.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Guard that finishes `name` when dropped
    #[must_use]
    pub fn guard(&self, name: &str) -> ProgressGuard {
        ProgressGuard {
            tracker:   self.clone(),
            name:      name.to_string(),
            succeeded: false,
        }
    }
}

/// Finalizes one entry on every exit path of its task, including early
/// returns, panics and aborts.
///
/// The entry ends as `Failed` unless [`ProgressGuard::succeed`] was called.
#[derive(Debug)]
pub struct ProgressGuard {
    tracker:   ProgressTracker,
    name:      String,
    succeeded: bool,
}

impl ProgressGuard {
    pub fn succeed(&mut self) { self.succeeded = true; }
}

impl Drop for ProgressGuard {
    fn drop(&mut self) { self.tracker.finish(&self.name, self.succeeded); }
}

/// Receives progress snapshots from [`watch_progress`]
pub trait ProgressObserver: Send + Sync {
    fn render(&self, entries: &[ProgressEntry]);
}

/// Poll `tracker` every `interval` and hand each snapshot to `observer`
/// until every entry has finished. The final, all-finished frame is rendered
/// too.
pub async fn watch_progress(
    tracker: ProgressTracker,
    interval: Duration,
    observer: Arc<dyn ProgressObserver>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let snapshot = tracker.snapshot();
        let done = snapshot.iter().all(|e| e.finished);
        observer.render(&snapshot);
        if done {
            break;
        }
    }
}
