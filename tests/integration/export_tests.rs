//! Exports and notifications after a run

use crate::common::{fetcher, output_config, serve, structured_listing, structured_source};
use driftwatch::config::NotifyConfig;
use driftwatch::notify::{self, NoopNotifier};
use driftwatch::runner::WorkerContext;
use driftwatch::storage::{RunStatus, SqliteStorage, Storage};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_run_exports_current_items() {
    let server = MockServer::start().await;
    serve(&server, "/listing", &structured_listing("Alpha", "Beta")).await;

    let dir = TempDir::new().unwrap();
    let output = output_config(&dir);
    let source = SqliteStorage::new(Path::new(&output.database_path))
        .unwrap()
        .upsert_source(&structured_source(
            "catalog",
            format!("{}/listing", server.uri()),
        ))
        .unwrap();

    let context = WorkerContext::new(&output, fetcher(), Arc::new(NoopNotifier));
    let run = context.run_source(&source).await;
    assert_eq!(run.status, RunStatus::Success);

    let csv_path = run.export_csv_path.clone().expect("csv path");
    assert!(Path::new(&csv_path)
        .starts_with(Path::new(&output.exports_dir).join(format!("source_{}", source.id))));

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "item_id,source_id,title,url,first_seen,last_seen,latest_version_hash,price_value"
    );
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains(&format!("{}/items/1", server.uri())));
    assert!(lines[1].contains(&driftwatch::fingerprint(Some("Alpha")).unwrap()));

    let json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(run.export_json_path.as_ref().unwrap()).unwrap(),
    )
    .unwrap();
    assert_eq!(json.as_array().unwrap().len(), 2);
    assert_eq!(json[1]["title"], "Second item");

    let md = std::fs::read_to_string(run.export_md_path.as_ref().unwrap()).unwrap();
    assert!(md.contains(&format!(
        "[{0}/items/1]({0}/items/1)",
        server.uri()
    )));

    let storage = SqliteStorage::new(Path::new(&output.database_path)).unwrap();
    let stored = storage.get_run(run.id).unwrap();
    assert_eq!(stored.export_csv_path, Some(csv_path));
}

#[tokio::test]
async fn test_failed_run_still_exports_and_notifies() {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&site)
        .await;

    let hook = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/notify"))
        .and(body_partial_json(serde_json::json!({
            "to": "ops@example.com",
            "subject": "[driftwatch] catalog: error",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&hook)
        .await;

    let dir = TempDir::new().unwrap();
    let output = output_config(&dir);
    let source = SqliteStorage::new(Path::new(&output.database_path))
        .unwrap()
        .upsert_source(&structured_source("catalog", site.uri()))
        .unwrap();

    let notifier = notify::from_config(Some(&NotifyConfig {
        webhook_url: Some(format!("{}/notify", hook.uri())),
        recipient: Some("ops@example.com".to_string()),
    }));
    let context = WorkerContext::new(&output, fetcher(), notifier);
    let run = context.run_source(&source).await;

    assert_eq!(run.status, RunStatus::Error);
    assert_eq!(run.error_message.as_deref(), Some("HTTP 500"));

    let csv = std::fs::read_to_string(run.export_csv_path.unwrap()).unwrap();
    assert_eq!(csv.lines().count(), 1);
}

#[tokio::test]
async fn test_unreachable_webhook_does_not_affect_run() {
    let site = MockServer::start().await;
    serve(&site, "/listing", &structured_listing("Alpha", "Beta")).await;

    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let dir = TempDir::new().unwrap();
    let output = output_config(&dir);
    let source = SqliteStorage::new(Path::new(&output.database_path))
        .unwrap()
        .upsert_source(&structured_source(
            "catalog",
            format!("{}/listing", site.uri()),
        ))
        .unwrap();

    let notifier = notify::from_config(Some(&NotifyConfig {
        webhook_url: Some(format!("http://127.0.0.1:{}/notify", port)),
        recipient: None,
    }));
    let context = WorkerContext::new(&output, fetcher(), notifier);
    let run = context.run_source(&source).await;

    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.created_items, 2);
}
