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

use std::{io::Write, path::Path, sync::Arc, time::Duration};

use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use axum_test::TestServer;
use filesyncer_app::{
    App, AppConfig,
    presenter::{PlainPresenter, Presenter},
};
use filesyncer_common_telemetry::logging::init_default_ut_logging;
use filesyncer_sync::{OutcomeStatus, SyncConfig};
use jiff::SignedDuration;
use parking_lot::Mutex;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn text(&self) -> String { String::from_utf8_lossy(&self.0.lock()).into_owned() }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
}

async fn handle_hello() -> &'static str { "hello\n" }

async fn handle_slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(30)).await;
    "late"
}

async fn handle_broken() -> impl IntoResponse { (StatusCode::BAD_GATEWAY, "nope") }

fn create_test_server() -> TestServer {
    let app = Router::new()
        .route("/hello", get(handle_hello))
        .route("/slow", get(handle_slow))
        .route("/broken", get(handle_broken));

    TestServer::builder()
        .http_transport()
        .try_build(app)
        .expect("failed to create test server")
}

fn url_for(server: &TestServer, path: &str) -> String {
    let base = server
        .server_address()
        .expect("server should have HTTP address")
        .to_string();
    format!("{}/{path}", base.trim_end_matches('/'))
}

fn write_targets(dir: &Path, targets: &[(&str, String, &str)]) {
    let files: Vec<serde_json::Value> = targets
        .iter()
        .map(|(name, url, local)| {
            serde_json::json!({
                "name": name,
                "url": url,
                "local_path": dir.join(local),
            })
        })
        .collect();
    std::fs::write(
        dir.join("config.json"),
        serde_json::to_vec(&serde_json::json!({ "files": files })).unwrap(),
    )
    .unwrap();
}

fn open_app(dir: &Path) -> (App, SharedBuffer) {
    init_default_ut_logging();
    let buffer = SharedBuffer::default();
    let presenter: Arc<dyn Presenter> = Arc::new(PlainPresenter::new(buffer.clone()));
    let config = AppConfig::builder()
        .targets_path(dir.join("config.json"))
        .history_path(dir.join("sync_history.json"))
        .sync(
            SyncConfig::builder()
                .progress_interval(SignedDuration::from_millis(20))
                .build(),
        )
        .build();
    (App::new(config, presenter), buffer)
}

fn history_runs(dir: &Path) -> Vec<serde_json::Value> {
    let value: serde_json::Value =
        serde_json::from_slice(&std::fs::read(dir.join("sync_history.json")).unwrap()).unwrap();
    value["history"].as_array().unwrap().clone()
}

#[tokio::test]
async fn test_first_then_repeat_run() {
    let server = create_test_server();
    let dir = tempfile::tempdir().unwrap();
    write_targets(dir.path(), &[("A", url_for(&server, "hello"), "f/a.txt")]);

    let (app, buffer) = open_app(dir.path());
    let report = app.run().await.unwrap().unwrap();

    assert_eq!(report.summary.outcomes.len(), 1);
    assert_eq!(report.summary.outcomes[0].status, OutcomeStatus::New);
    assert_eq!(std::fs::read(dir.path().join("f/a.txt")).unwrap(), b"hello\n");
    let out = buffer.text();
    assert!(out.starts_with("FileSyncer\n"));
    assert!(out.contains("first sync\n"));
    assert!(out.contains("+ A: new file (sha256: "));
    assert!(out.contains("sync finished in "));
    assert!(out.contains("recent syncs:\n  "));
    assert_eq!(history_runs(dir.path()).len(), 1);

    let (app, buffer) = open_app(dir.path());
    let report = app.run().await.unwrap().unwrap();

    assert_eq!(report.summary.outcomes[0].status, OutcomeStatus::Unchanged);
    let out = buffer.text();
    assert!(out.contains(&format!("last sync: {}", history_runs(dir.path())[0]["timestamp"].as_str().unwrap())));
    assert!(out.contains("✓ A: content unchanged"));
    let runs = history_runs(dir.path());
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[1]["files"][0]["status"], "unchanged");
    assert_eq!(runs[1]["files"][0]["name"], "A");
}

#[tokio::test]
async fn test_failed_target_is_reported_and_recorded() {
    let server = create_test_server();
    let dir = tempfile::tempdir().unwrap();
    write_targets(dir.path(), &[
        ("good", url_for(&server, "hello"), "good.txt"),
        ("bad", url_for(&server, "broken"), "bad.txt"),
    ]);

    let (app, buffer) = open_app(dir.path());
    let report = app.run_until_interrupted().await.unwrap();

    let counts = report.summary.counts();
    assert_eq!((counts.new, counts.error), (1, 1));
    assert!(buffer.text().contains("✗ bad: update failed: HTTP error 502"));
    assert!(buffer.text().contains("new:1 updated:0 unchanged:0 error:1"));
    assert!(!dir.path().join("bad.txt").exists());
}

#[tokio::test]
async fn test_empty_target_list_aborts_without_history() {
    let dir = tempfile::tempdir().unwrap();
    write_targets(dir.path(), &[]);

    let (app, buffer) = open_app(dir.path());

    assert!(app.run().await.unwrap().is_none());
    assert!(buffer.text().contains("no valid targets"));
    assert!(!dir.path().join("sync_history.json").exists());
}

#[tokio::test]
async fn test_duplicate_target_names_abort_run() {
    let server = create_test_server();
    let dir = tempfile::tempdir().unwrap();
    write_targets(dir.path(), &[
        ("A", url_for(&server, "hello"), "a.txt"),
        ("A", url_for(&server, "hello"), "other.txt"),
    ]);

    let (app, buffer) = open_app(dir.path());

    assert!(app.run().await.unwrap().is_none());
    let out = buffer.text();
    assert!(out.contains("target name 'A' appears more than once"));
    assert!(out.contains("no valid targets"));
    assert!(!dir.path().join("a.txt").exists());
}

#[tokio::test]
async fn test_malformed_target_list_is_a_warning() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.json"), "{ nope").unwrap();

    let (app, buffer) = open_app(dir.path());

    assert!(app.run_until_interrupted().await.is_none());
    let out = buffer.text();
    assert!(out.contains("malformed record in "));
    assert!(out.contains("no valid targets"));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("config.json")).unwrap(),
        "{ nope"
    );
}

#[tokio::test]
async fn test_malformed_history_starts_fresh() {
    let server = create_test_server();
    let dir = tempfile::tempdir().unwrap();
    write_targets(dir.path(), &[("A", url_for(&server, "hello"), "a.txt")]);
    std::fs::write(dir.path().join("sync_history.json"), "not json").unwrap();

    let (app, buffer) = open_app(dir.path());
    app.run().await.unwrap().unwrap();

    let out = buffer.text();
    assert!(out.contains("malformed record in "));
    assert!(out.contains("first sync"));
    assert_eq!(history_runs(dir.path()).len(), 1);
}

#[tokio::test]
async fn test_shutdown_cancels_run() {
    let server = create_test_server();
    let dir = tempfile::tempdir().unwrap();
    write_targets(dir.path(), &[("slow", url_for(&server, "slow"), "slow.txt")]);

    let (app, buffer) = open_app(dir.path());
    let (report, ()) = tokio::join!(app.run_until_interrupted(), async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        app.shutdown();
    });

    assert!(report.is_none());
    assert!(buffer.text().contains("cancelled by user"));
    assert!(!dir.path().join("slow.txt").exists());
    // The interrupted run is not recorded.
    assert!(history_runs(dir.path()).is_empty());
}

#[tokio::test]
async fn test_shutdown_with_queued_targets_stops_rendering() {
    let server = create_test_server();
    let dir = tempfile::tempdir().unwrap();
    let targets: Vec<(String, String, String)> = (0..6)
        .map(|i| (format!("slow-{i}"), url_for(&server, "slow"), format!("slow-{i}.txt")))
        .collect();
    let refs: Vec<(&str, String, &str)> = targets
        .iter()
        .map(|(name, url, local)| (name.as_str(), url.clone(), local.as_str()))
        .collect();
    write_targets(dir.path(), &refs);

    init_default_ut_logging();
    let buffer = SharedBuffer::default();
    let presenter: Arc<dyn Presenter> = Arc::new(PlainPresenter::new(buffer.clone()));
    let config = AppConfig::builder()
        .targets_path(dir.path().join("config.json"))
        .history_path(dir.path().join("sync_history.json"))
        .sync(
            SyncConfig::builder()
                .concurrency(2)
                .progress_interval(SignedDuration::from_millis(10))
                .build(),
        )
        .build();
    let app = App::new(config, presenter);

    let (report, ()) = tokio::join!(app.run_until_interrupted(), async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        app.shutdown();
    });
    assert!(report.is_none());

    let settled = buffer.text();
    assert!(settled.trim_end().ends_with("cancelled by user"));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(buffer.text(), settled);
}
