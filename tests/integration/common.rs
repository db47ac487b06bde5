//! Shared fixtures

use driftwatch::config::{FetcherConfig, OutputConfig, SourceConfig};
use driftwatch::fetch::Fetcher;
use driftwatch::snapshot::SnapshotWriter;
use driftwatch::storage::{SourceRecord, SqliteStorage, Storage};
use driftwatch::RunController;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Output locations inside a temporary directory
pub fn output_config(dir: &TempDir) -> OutputConfig {
    let join = |name: &str| dir.path().join(name).to_string_lossy().into_owned();
    OutputConfig {
        database_path: join("driftwatch.db"),
        snapshots_dir: join("snapshots"),
        exports_dir: join("exports"),
    }
}

pub fn fetcher() -> Fetcher {
    Fetcher::new(&FetcherConfig {
        timeout_secs: 5,
        ..FetcherConfig::default()
    })
    .unwrap()
}

/// A controller on its own connection to the test database
pub fn controller(output: &OutputConfig) -> RunController<SqliteStorage> {
    RunController::new(
        SqliteStorage::new(Path::new(&output.database_path)).unwrap(),
        fetcher(),
        SnapshotWriter::new(&output.snapshots_dir),
    )
}

pub fn register(
    controller: &mut RunController<SqliteStorage>,
    source: &SourceConfig,
) -> SourceRecord {
    controller.storage_mut().upsert_source(source).unwrap()
}

/// Serves `body` with a 200 at `route`, replacing any earlier mocks
pub async fn serve(server: &MockServer, route: &str, body: &str) {
    server.reset().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

/// Structured listing with three containers, two of which carry links
pub fn structured_listing(first_body: &str, second_body: &str) -> String {
    format!(
        r#"<html><body>
          <div class="item">
            <h2><a href="/items/1">First item</a></h2>
            <div class="body">{}</div>
          </div>
          <div class="item">
            <h2><a href="items/2?ref=list">Second item</a></h2>
            <div class="body">{}</div>
          </div>
          <div class="item">
            <h2>No link here</h2>
            <div class="body">Orphan</div>
          </div>
        </body></html>"#,
        first_body, second_body
    )
}

pub fn structured_source(name: &str, url: String) -> SourceConfig {
    SourceConfig {
        list_selector: Some("div.item".to_string()),
        title_selector: Some("h2".to_string()),
        content_selector: Some(".body".to_string()),
        ..SourceConfig::new(name, url)
    }
}
