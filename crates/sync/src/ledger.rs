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

use bon::Builder;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

use crate::types::RunSummary;

/// Runs kept in the history log
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Past run summaries, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryLog {
    #[serde(rename = "history", default)]
    runs: Vec<RunSummary>,
}

impl HistoryLog {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn runs(&self) -> &[RunSummary] { &self.runs }

    #[must_use]
    pub fn len(&self) -> usize { self.runs.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.runs.is_empty() }

    /// The newest run, if any
    #[must_use]
    pub fn most_recent(&self) -> Option<&RunSummary> { self.runs.last() }

    /// The newest `n` runs, still oldest first
    #[must_use]
    pub fn tail(&self, n: usize) -> &[RunSummary] {
        &self.runs[self.runs.len().saturating_sub(n)..]
    }
}

/// Appends run summaries to a [`HistoryLog`], evicting the oldest beyond
/// its capacity.
#[derive(Debug, Clone, Copy, SmartDefault, Builder)]
pub struct HistoryLedger {
    /// Maximum number of runs retained (default: 10)
    #[default(DEFAULT_HISTORY_CAPACITY)]
    #[builder(default = DEFAULT_HISTORY_CAPACITY)]
    capacity: usize,
}

impl HistoryLedger {
    #[must_use]
    pub const fn capacity(&self) -> usize { self.capacity }

    /// Return `log` with `summary` appended as its newest entry. A capacity
    /// below one is treated as one, so the latest run is always kept.
    #[must_use]
    pub fn append(&self, mut log: HistoryLog, summary: RunSummary) -> HistoryLog {
        log.runs.push(summary);
        let capacity = self.capacity.max(1);
        if log.runs.len() > capacity {
            let excess = log.runs.len() - capacity;
            log.runs.drain(..excess);
        }
        log
    }
}
