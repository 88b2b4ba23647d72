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

use std::path::PathBuf;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::hasher::Fingerprint;

/// One remote resource mapped onto one local file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[builder(on(String, into), on(PathBuf, into))]
pub struct Target {
    /// Unique name within a run
    pub name:       String,
    /// URL the content is fetched from
    #[serde(rename = "url")]
    pub source_url: String,
    /// File the content is written to
    pub local_path: PathBuf,
}

/// Result class of reconciling one target
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutcomeStatus {
    /// Local content already matched the remote
    Unchanged,
    /// No local file existed; it was created
    New,
    /// Local file existed and was replaced
    Updated,
    /// The target could not be reconciled in this run
    Error,
}

/// Per-target result of one reconciliation attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    #[serde(rename = "name")]
    pub target_name: String,
    pub status:      OutcomeStatus,
    pub message:     String,
    /// Unified diff lines; empty unless `status` is `Updated`
    #[serde(rename = "diff", default)]
    pub diff_lines:  Vec<String>,
}

impl ReconcileOutcome {
    #[must_use]
    pub fn unchanged(target_name: impl Into<String>) -> Self {
        Self {
            target_name: target_name.into(),
            status:      OutcomeStatus::Unchanged,
            message:     "content unchanged".to_string(),
            diff_lines:  Vec::new(),
        }
    }

    #[must_use]
    pub fn new_file(target_name: impl Into<String>, digest: &Fingerprint) -> Self {
        Self {
            target_name: target_name.into(),
            status:      OutcomeStatus::New,
            message:     format!("new file (sha256: {digest})"),
            diff_lines:  Vec::new(),
        }
    }

    #[must_use]
    pub fn updated(
        target_name: impl Into<String>,
        old: &Fingerprint,
        new: &Fingerprint,
        diff_lines: Vec<String>,
    ) -> Self {
        Self {
            target_name: target_name.into(),
            status: OutcomeStatus::Updated,
            message: format!("updated (old sha256: {old}, new sha256: {new})"),
            diff_lines,
        }
    }

    #[must_use]
    pub fn error(target_name: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self {
            target_name: target_name.into(),
            status:      OutcomeStatus::Error,
            message:     format!("update failed: {cause}"),
            diff_lines:  Vec::new(),
        }
    }
}

/// Outcomes of one run over every target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// RFC 3339 instant the run started at
    pub timestamp: String,
    /// Outcomes in completion order
    #[serde(rename = "files", default)]
    pub outcomes:  Vec<ReconcileOutcome>,
}

impl RunSummary {
    #[must_use]
    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for outcome in &self.outcomes {
            match outcome.status {
                OutcomeStatus::Unchanged => counts.unchanged += 1,
                OutcomeStatus::New => counts.new += 1,
                OutcomeStatus::Updated => counts.updated += 1,
                OutcomeStatus::Error => counts.error += 1,
            }
        }
        counts
    }

    #[must_use]
    pub fn outcome(&self, target_name: &str) -> Option<&ReconcileOutcome> {
        self.outcomes.iter().find(|o| o.target_name == target_name)
    }
}

/// Number of outcomes per status in one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub new:       usize,
    pub updated:   usize,
    pub unchanged: usize,
    pub error:     usize,
}
