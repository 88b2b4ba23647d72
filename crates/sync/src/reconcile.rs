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

//! One target's pass through the state machine:
//! `Pending -> Fetching -> Comparing -> (Unchanged | Writing -> Written) ->
//! Done`, with any failure ending the target in `Error`.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    sync::Arc,
};

use downloader::Fetch;
use snafu::{OptionExt, ResultExt};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{Instrument, debug, error, info_span};

use crate::{
    diff::DiffEngine,
    error::{
        DiffTaskSnafu, InvalidLocalPathSnafu, LocalReadSnafu, PersistenceSnafu, Result,
        TransferSnafu,
    },
    hasher::{fingerprint, fingerprint_of_local_file},
    progress::{ProgressGuard, ProgressTracker, TaskPhase},
    types::{ReconcileOutcome, Target},
};

/// Everything a reconcile task needs, cloned into each spawned task
#[derive(Clone)]
pub(crate) struct Reconciler {
    pub(crate) fetcher: Arc<dyn Fetch>,
    pub(crate) diff:    DiffEngine,
    pub(crate) tracker: ProgressTracker,
}

impl Reconciler {
    /// Reconcile `target`, containing any failure in its outcome. `guard`
    /// finalizes the target's progress entry.
    pub(crate) async fn reconcile(
        &self,
        target: &Target,
        mut guard: ProgressGuard,
    ) -> ReconcileOutcome {
        let span = info_span!("reconcile", target = %target.name);

        match self.try_reconcile(target).instrument(span).await {
            Ok(outcome) => {
                guard.succeed();
                debug!(target = %target.name, status = %outcome.status, "reconciled");
                outcome
            }
            Err(err) => {
                error!(target = %target.name, url = %target.source_url, error = %err, "reconcile failed");
                ReconcileOutcome::error(&target.name, err)
            }
        }
    }

    async fn try_reconcile(&self, target: &Target) -> Result<ReconcileOutcome> {
        let name = target.name.as_str();
        let tracker = &self.tracker;
        let sink = |downloaded: u64, total: Option<u64>| tracker.update(name, downloaded, total);

        tracker.set_phase(name, TaskPhase::Fetching);
        debug!(url = %target.source_url, "fetching");
        // The local fingerprint only touches local storage, so it is taken
        // while the transfer is in flight.
        let (fetched, local) = tokio::join!(
            self.fetcher.fetch(&target.source_url, &sink),
            fingerprint_of_local_file(&target.local_path)
        );
        let fetched = fetched.context(TransferSnafu)?;
        let local = local?;

        tracker.set_phase(name, TaskPhase::Comparing);
        let remote = fingerprint(&fetched.bytes);
        if local == Some(remote) {
            return Ok(ReconcileOutcome::unchanged(name));
        }

        let previous = match local {
            Some(_) => Some(
                fs::read(&target.local_path)
                    .await
                    .context(LocalReadSnafu {
                        path: &target.local_path,
                    })?,
            ),
            None => None,
        };
        // Line diffing is CPU-bound on up to several MiB per side.
        let diff = self.diff.clone();
        let label = diff_label(&target.local_path);
        let new_bytes = fetched.bytes.clone();
        let comparison = tokio::task::spawn_blocking(move || {
            diff.compare(&label, previous.as_deref(), &new_bytes)
        })
        .await
        .context(DiffTaskSnafu)?;

        tracker.set_phase(name, TaskPhase::Writing);
        write_replacing(&target.local_path, &fetched.bytes).await?;
        debug!(path = %target.local_path.display(), size = fetched.size, "written");

        Ok(match local {
            None => ReconcileOutcome::new_file(name, &remote),
            Some(old) => ReconcileOutcome::updated(name, &old, &remote, comparison.diff),
        })
    }
}

fn diff_label(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Write `bytes` beside `path` and rename over it, creating parent
/// directories as needed.
async fn write_replacing(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .context(InvalidLocalPathSnafu { path })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .context(PersistenceSnafu { path: parent })?;
    }

    let temp_path = temp_path_for(path, file_name.to_os_string());
    let mut file = fs::File::create(&temp_path)
        .await
        .context(PersistenceSnafu { path: &temp_path })?;
    file.write_all(bytes)
        .await
        .context(PersistenceSnafu { path: &temp_path })?;
    file.sync_all()
        .await
        .context(PersistenceSnafu { path: &temp_path })?;
    drop(file);

    fs::rename(&temp_path, path)
        .await
        .context(PersistenceSnafu { path })
}

fn temp_path_for(path: &Path, mut file_name: OsString) -> PathBuf {
    file_name.push(".download");
    path.with_file_name(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_path_keeps_extension() {
        let path = Path::new("files/a.txt");
        assert_eq!(
            temp_path_for(path, OsString::from("a.txt")),
            PathBuf::from("files/a.txt.download")
        );
    }

    #[test]
    fn test_diff_label_is_file_name() {
        assert_eq!(diff_label(Path::new("files/nested/a.txt")), "a.txt");
    }

    #[tokio::test]
    async fn test_write_creates_parents_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep/er/file.txt");

        write_replacing(&path, b"first").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"first");

        write_replacing(&path, b"second").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert!(!path.with_file_name("file.txt.download").exists());
    }

    #[tokio::test]
    async fn test_write_rejects_path_without_file_name() {
        let err = write_replacing(Path::new("/"), b"x").await.unwrap_err();
        assert!(matches!(err, crate::Error::InvalidLocalPath { .. }));
    }
}
