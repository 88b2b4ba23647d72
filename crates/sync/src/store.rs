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

//! JSON-file persistence for the target list and the run history.
//!
//! Both stores report absence and malformed content as explicit errors;
//! `load_or_init` applies the fallback policy of creating a fresh file.

use std::{
    collections::HashSet,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use snafu::ResultExt;
use tracing::{info, warn};

use crate::{
    error::{
        ConfigFormatSnafu, ConfigReadSnafu, DuplicateTargetSnafu, EncodeSnafu, Error,
        HistoryNotFoundSnafu, PersistenceSnafu, Result, TargetsNotFoundSnafu,
    },
    ledger::HistoryLog,
    types::Target,
};

/// Targets used, and written out as a template, when no list exists yet
#[must_use]
pub fn default_targets() -> Vec<Target> {
    vec![
        Target::builder()
            .name("example-1")
            .source_url("https://httpbin.org/uuid")
            .local_path("files/file1.txt")
            .build(),
        Target::builder()
            .name("example-2")
            .source_url("https://httpbin.org/user-agent")
            .local_path("files/file2.txt")
            .build(),
    ]
}

/// Where a loaded target list came from
#[derive(Debug)]
pub enum TargetOrigin {
    /// Read from the store
    File,
    /// Built-in defaults; `template_error` is set when writing them out as a
    /// template failed
    Defaults { template_error: Option<Error> },
}

#[derive(Debug)]
pub struct TargetList {
    pub targets: Vec<Target>,
    pub origin:  TargetOrigin,
}

/// Supplies the targets of a run
pub trait TargetListSource: Send + Sync {
    /// Fails with `TargetsNotFound` when no list exists, `ConfigFormat`
    /// when it cannot be parsed and `DuplicateTarget` when two targets share
    /// a name.
    fn load(&self) -> Result<Vec<Target>>;

    fn save(&self, targets: &[Target]) -> Result<()>;

    /// Load the list, falling back to [`default_targets`] (and saving them
    /// as a template) when none exists. Other errors are returned as is.
    fn load_or_init(&self) -> Result<TargetList> {
        match self.load() {
            Ok(targets) => Ok(TargetList {
                targets,
                origin: TargetOrigin::File,
            }),
            Err(Error::TargetsNotFound { .. }) => {
                let targets = default_targets();
                let template_error = self.save(&targets).err();
                Ok(TargetList {
                    targets,
                    origin: TargetOrigin::Defaults { template_error },
                })
            }
            Err(err) => Err(err),
        }
    }
}

/// Persists the history of past runs
pub trait HistoryStore: Send + Sync {
    /// Fails with `HistoryNotFound` when no history exists and
    /// `ConfigFormat` when it cannot be parsed.
    fn load(&self) -> Result<HistoryLog>;

    fn save(&self, log: &HistoryLog) -> Result<()>;

    /// Load the history, creating an empty one when none exists
    fn load_or_init(&self) -> Result<HistoryLog> {
        match self.load() {
            Err(Error::HistoryNotFound { .. }) => {
                let log = HistoryLog::new();
                self.save(&log)?;
                Ok(log)
            }
            other => other,
        }
    }
}

/// On-disk layout of the target list. The bare array is the legacy layout
/// and is still accepted on read.
#[derive(Deserialize)]
#[serde(untagged)]
enum TargetRecord {
    Current { files: Vec<Target> },
    Legacy(Vec<Target>),
}

#[derive(Serialize)]
struct TargetRecordRef<'a> {
    files: &'a [Target],
}

/// Target list stored as `{ "files": [ {name, url, local_path}, ... ] }`
#[derive(Debug, Clone)]
pub struct JsonTargetFile {
    path: PathBuf,
}

impl JsonTargetFile {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

    #[must_use]
    pub fn path(&self) -> &Path { &self.path }
}

impl TargetListSource for JsonTargetFile {
    fn load(&self) -> Result<Vec<Target>> {
        let Some(record) = read_record::<TargetRecord>(&self.path)? else {
            return TargetsNotFoundSnafu { path: &self.path }.fail();
        };
        let targets = match record {
            TargetRecord::Current { files } => files,
            TargetRecord::Legacy(files) => {
                info!(path = %self.path.display(), "read legacy target list layout");
                files
            }
        };

        let mut seen = HashSet::with_capacity(targets.len());
        if let Some(duplicate) = targets.iter().find(|t| !seen.insert(t.name.as_str())) {
            return DuplicateTargetSnafu {
                name: &duplicate.name,
                path: &self.path,
            }
            .fail();
        }
        Ok(targets)
    }

    fn save(&self, targets: &[Target]) -> Result<()> {
        write_record(&self.path, &TargetRecordRef { files: targets })
    }
}

/// Run history stored as `{ "history": [ {timestamp, files: [...]}, ... ] }`
#[derive(Debug, Clone)]
pub struct JsonHistoryFile {
    path: PathBuf,
}

impl JsonHistoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

    #[must_use]
    pub fn path(&self) -> &Path { &self.path }
}

impl HistoryStore for JsonHistoryFile {
    fn load(&self) -> Result<HistoryLog> {
        match read_record::<HistoryLog>(&self.path)? {
            Some(log) => Ok(log),
            None => HistoryNotFoundSnafu { path: &self.path }.fail(),
        }
    }

    fn save(&self, log: &HistoryLog) -> Result<()> { write_record(&self.path, log) }
}

/// Read and parse `path`; `Ok(None)` when it does not exist
fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).context(ConfigReadSnafu { path }),
    };
    let record = serde_json::from_slice(&bytes).context(ConfigFormatSnafu { path })?;
    Ok(Some(record))
}

/// Pretty-print `record` to a sibling temp file and rename it over `path`
fn write_record<T: Serialize + ?Sized>(path: &Path, record: &T) -> Result<()> {
    let mut content = serde_json::to_string_pretty(record).context(EncodeSnafu)?;
    content.push('\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context(PersistenceSnafu { path: parent })?;
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);
    fs::write(&temp_path, content).context(PersistenceSnafu { path: &temp_path })?;
    if let Err(err) = fs::rename(&temp_path, path) {
        warn!(path = %path.display(), error = %err, "failed to move record into place");
        let _ = fs::remove_file(&temp_path);
        return Err(err).context(PersistenceSnafu { path });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ledger::HistoryLedger, types::RunSummary};

    #[test]
    fn test_missing_target_list_is_explicit() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonTargetFile::new(dir.path().join("config.json"));
        assert!(matches!(source.load(), Err(Error::TargetsNotFound { .. })));
    }

    #[test]
    fn test_load_or_init_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonTargetFile::new(dir.path().join("config.json"));

        let list = source.load_or_init().unwrap();
        assert_eq!(list.targets, default_targets());
        assert!(matches!(list.origin, TargetOrigin::Defaults {
            template_error: None
        }));

        // The template is now a regular list.
        let reloaded = source.load_or_init().unwrap();
        assert_eq!(reloaded.targets, default_targets());
        assert!(matches!(reloaded.origin, TargetOrigin::File));
    }

    struct ReadOnlyMissing;

    impl TargetListSource for ReadOnlyMissing {
        fn load(&self) -> Result<Vec<Target>> {
            TargetsNotFoundSnafu { path: "config.json" }.fail()
        }

        fn save(&self, _targets: &[Target]) -> Result<()> {
            Err(std::io::Error::from(ErrorKind::PermissionDenied))
                .context(PersistenceSnafu { path: "config.json" })
        }
    }

    #[test]
    fn test_template_write_failure_is_reported() {
        let list = ReadOnlyMissing.load_or_init().unwrap();
        assert_eq!(list.targets, default_targets());
        assert!(matches!(list.origin, TargetOrigin::Defaults {
            template_error: Some(Error::Persistence { .. })
        }));
    }

    #[test]
    fn test_current_and_legacy_layouts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let source = JsonTargetFile::new(&path);

        std::fs::write(
            &path,
            r#"{"files": [{"name": "A", "url": "http://x/a", "local_path": "f/a.txt"}]}"#,
        )
        .unwrap();
        let current = source.load().unwrap();

        std::fs::write(
            &path,
            r#"[{"name": "A", "url": "http://x/a", "local_path": "f/a.txt"}]"#,
        )
        .unwrap();
        let legacy = source.load().unwrap();

        assert_eq!(current, legacy);
        assert_eq!(current[0].source_url, "http://x/a");
        assert_eq!(current[0].local_path, PathBuf::from("f/a.txt"));
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"files": [
                {"name": "A", "url": "http://x/a", "local_path": "a.txt"},
                {"name": "B", "url": "http://x/b", "local_path": "b.txt"},
                {"name": "A", "url": "http://x/c", "local_path": "c.txt"}
            ]}"#,
        )
        .unwrap();
        let source = JsonTargetFile::new(&path);

        let err = source.load_or_init().unwrap_err();
        assert!(matches!(&err, Error::DuplicateTarget { name, .. } if name == "A"));
        assert!(err.to_string().starts_with("target name 'A' appears more than once"));
    }

    #[test]
    fn test_malformed_target_list_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let source = JsonTargetFile::new(&path);

        for content in ["{not json", r#"{"targets": []}"#, r#"{"files": [{"name": 1}]}"#] {
            std::fs::write(&path, content).unwrap();
            assert!(
                matches!(source.load_or_init(), Err(Error::ConfigFormat { .. })),
                "{content}"
            );
        }
    }

    #[test]
    fn test_save_keeps_non_ascii_and_only_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let source = JsonTargetFile::new(&path);
        let targets = vec![
            Target::builder()
                .name("示例文件")
                .source_url("http://x/a")
                .local_path("f/a.txt")
                .build(),
        ];

        source.save(&targets).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("示例文件"));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value.as_object().unwrap().len(), 1);
        assert_eq!(source.load().unwrap(), targets);
    }

    #[test]
    fn test_history_load_or_init_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync_history.json");
        let store = JsonHistoryFile::new(&path);

        let log = store.load_or_init().unwrap();
        assert!(log.is_empty());
        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({"history": []}));
    }

    #[test]
    fn test_malformed_history_is_format_error_and_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync_history.json");
        std::fs::write(&path, "[[[").unwrap();
        let store = JsonHistoryFile::new(&path);

        assert!(matches!(store.load_or_init(), Err(Error::ConfigFormat { .. })));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[[[");
    }

    #[test]
    fn test_history_round_trips_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHistoryFile::new(dir.path().join("nested/sync_history.json"));
        let summary = RunSummary {
            timestamp: "2025-01-01T00:00:00Z".to_string(),
            outcomes:  vec![crate::ReconcileOutcome::unchanged("A")],
        };
        let log = HistoryLedger::default().append(HistoryLog::new(), summary);

        store.save(&log).unwrap();

        assert_eq!(store.load().unwrap(), log);
        assert!(!dir.path().join("nested/sync_history.json.tmp").exists());
    }
}
