//! End-to-end run scenarios

use crate::common::{
    controller, fetcher, output_config, register, serve, structured_listing, structured_source,
};
use driftwatch::config::SourceConfig;
use driftwatch::fingerprint;
use driftwatch::notify::NoopNotifier;
use driftwatch::runner::WorkerContext;
use driftwatch::storage::{RunStatus, SqliteStorage, Storage};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinSet;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_structured_source_creates_linked_items() {
    let server = MockServer::start().await;
    serve(&server, "/listing", &structured_listing("Alpha", "Beta")).await;

    let dir = TempDir::new().unwrap();
    let output = output_config(&dir);
    let mut controller = controller(&output);
    let source = register(
        &mut controller,
        &structured_source("catalog", format!("{}/listing", server.uri())),
    );

    let run = controller.run(&source).await;

    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.created_items, 2);
    assert_eq!(run.changed_items, 0);
    assert!(run.error_message.is_none());

    let storage = controller.storage();
    let items = storage.list_items(source.id).unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].url, format!("{}/items/1", server.uri()));
    assert_eq!(items[0].title.as_deref(), Some("First item"));
    assert_eq!(items[1].url, format!("{}/items/2?ref=list", server.uri()));

    for item in &items {
        let versions = storage.list_versions(item.id).unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(item.latest_version_id, Some(versions[0].id));
        assert!(versions[0].snapshot_path.is_some());
    }

    let stored = storage.get_run(run.id).unwrap();
    assert_eq!(stored.status, RunStatus::Success);
    assert!(stored.ended_at.is_some());
}

#[tokio::test]
async fn test_changed_content_adds_one_version() {
    let server = MockServer::start().await;
    serve(&server, "/listing", &structured_listing("Alpha", "Beta")).await;

    let dir = TempDir::new().unwrap();
    let output = output_config(&dir);
    let mut controller = controller(&output);
    let source = register(
        &mut controller,
        &structured_source("catalog", format!("{}/listing", server.uri())),
    );

    controller.run(&source).await;
    let before = controller.storage().list_items(source.id).unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    serve(&server, "/listing", &structured_listing("Alpha", "Beta, revised")).await;
    let run = controller.run(&source).await;

    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.created_items, 0);
    assert_eq!(run.changed_items, 1);

    let storage = controller.storage();
    let after = storage.list_items(source.id).unwrap();
    assert_eq!(after.len(), 2);

    // First item unchanged: same latest version, one version row
    assert_eq!(after[0].latest_version_id, before[0].latest_version_id);
    assert_eq!(storage.list_versions(after[0].id).unwrap().len(), 1);

    // Second item changed: latest points at a new version
    assert_ne!(after[1].latest_version_id, before[1].latest_version_id);
    let versions = storage.list_versions(after[1].id).unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(after[1].latest_version_id, Some(versions[1].id));
    assert_eq!(
        versions[1].content_hash,
        fingerprint(Some("Beta, revised"))
    );

    for (old, new) in before.iter().zip(&after) {
        assert!(new.last_seen > old.last_seen);
        assert_eq!(new.first_seen, old.first_seen);
    }
}

#[tokio::test]
async fn test_http_404_records_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string(structured_listing("A", "B")))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = output_config(&dir);
    let mut controller = controller(&output);
    let source = register(
        &mut controller,
        &structured_source("catalog", format!("{}/listing", server.uri())),
    );

    let run = controller.run(&source).await;

    assert_eq!(run.status, RunStatus::Error);
    assert_eq!(run.error_message.as_deref(), Some("HTTP 404"));
    assert_eq!(run.created_items, 0);
    assert!(controller.storage().list_items(source.id).unwrap().is_empty());

    let stored = controller.storage().get_run(run.id).unwrap();
    assert_eq!(stored.error_message.as_deref(), Some("HTTP 404"));
}

#[tokio::test]
async fn test_connection_refused_records_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let dir = TempDir::new().unwrap();
    let output = output_config(&dir);
    let mut controller = controller(&output);
    let source = register(
        &mut controller,
        &SourceConfig::new("down", format!("http://127.0.0.1:{}/", port)),
    );

    let run = controller.run(&source).await;

    assert_eq!(run.status, RunStatus::Error);
    assert!(run.ended_at.is_some());
    let message = run.error_message.expect("error message");
    assert!(message.contains("127.0.0.1"), "message: {}", message);

    let stored = controller.storage().get_run(run.id).unwrap();
    assert_eq!(stored.status, RunStatus::Error);
    assert!(stored.ended_at.is_some());
}

#[tokio::test]
async fn test_repeated_runs_are_idempotent() {
    let server = MockServer::start().await;
    let page = r#"
        <ul>
          <li><a href="/news/1">Launch</a><p>We launched.</p></li>
          <li><a href="/news/2">Update</a></li>
          <li><a href="/news/2">Update again</a></li>
        </ul>
    "#;
    serve(&server, "/news", page).await;

    let dir = TempDir::new().unwrap();
    let output = output_config(&dir);
    let mut controller = controller(&output);
    let source = register(
        &mut controller,
        &SourceConfig::new("news", format!("{}/news", server.uri())),
    );

    let first = controller.run(&source).await;
    assert_eq!(first.created_items, 2);
    let before = controller.storage().list_items(source.id).unwrap();

    for _ in 0..2 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let again = controller.run(&source).await;
        assert_eq!(again.status, RunStatus::Success);
        assert_eq!(again.created_items, 0);
        assert_eq!(again.changed_items, 0);
    }

    let storage = controller.storage();
    let after = storage.list_items(source.id).unwrap();
    assert_eq!(after.len(), 2);
    for (old, new) in before.iter().zip(&after) {
        assert_eq!(storage.list_versions(new.id).unwrap().len(), 1);
        assert!(new.last_seen > old.last_seen);
    }
    assert_eq!(storage.list_runs(10).unwrap().len(), 3);
}

#[tokio::test]
async fn test_query_strings_are_distinct_items() {
    let server = MockServer::start().await;
    let page = r#"
        <article><a href="/list?page=1">Page one</a></article>
        <article><a href="/list?page=2">Page two</a></article>
        <article><a href="/list?page=1#top">Page one again</a></article>
    "#;
    serve(&server, "/", page).await;

    let dir = TempDir::new().unwrap();
    let output = output_config(&dir);
    let mut controller = controller(&output);
    let source = register(&mut controller, &SourceConfig::new("paged", server.uri()));

    let run = controller.run(&source).await;
    assert_eq!(run.created_items, 3);

    let urls: Vec<String> = controller
        .storage()
        .list_items(source.id)
        .unwrap()
        .into_iter()
        .map(|item| item.url)
        .collect();
    assert!(urls.contains(&format!("{}/list?page=1", server.uri())));
    assert!(urls.contains(&format!("{}/list?page=2", server.uri())));
}

#[tokio::test]
async fn test_prices_parsed_or_absent() {
    let server = MockServer::start().await;
    let page = r#"
        <div class="product"><a href="/p/lamp">Lamp</a><span class="price">$1,234.56</span></div>
        <div class="product"><a href="/p/sample">Sample</a><span class="price">Free</span></div>
    "#;
    serve(&server, "/shop", page).await;

    let dir = TempDir::new().unwrap();
    let output = output_config(&dir);
    let mut controller = controller(&output);
    let source = register(
        &mut controller,
        &SourceConfig {
            list_selector: Some(".product".to_string()),
            price_selector: Some(".price".to_string()),
            ..SourceConfig::new("shop", format!("{}/shop", server.uri()))
        },
    );

    let run = controller.run(&source).await;
    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.created_items, 2);

    let storage = controller.storage();
    let items = storage.list_items(source.id).unwrap();
    let lamp = storage.latest_version_for(items[0].id).unwrap().unwrap();
    let sample = storage.latest_version_for(items[1].id).unwrap().unwrap();
    assert_eq!(lamp.price_value, Some(1234.56));
    assert_eq!(sample.price_value, None);
}

#[tokio::test]
async fn test_snapshot_artifact_contents() {
    let server = MockServer::start().await;
    serve(&server, "/listing", &structured_listing("Alpha", "Beta")).await;

    let dir = TempDir::new().unwrap();
    let output = output_config(&dir);
    let mut controller = controller(&output);
    let source = register(
        &mut controller,
        &structured_source("catalog", format!("{}/listing", server.uri())),
    );
    controller.run(&source).await;

    let storage = controller.storage();
    let item = &storage.list_items(source.id).unwrap()[0];
    let version = storage.latest_version_for(item.id).unwrap().unwrap();
    let snapshot = version.snapshot_path.clone().unwrap();

    assert!(Path::new(&snapshot).starts_with(&output.snapshots_dir));
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&snapshot).unwrap()).unwrap();
    assert_eq!(json["item_id"], item.id);
    assert_eq!(json["content_text"], "Alpha");
    assert_eq!(json["content_hash"], version.content_hash.unwrap().as_str());
    assert!(json["price_value"].is_null());
    assert!(json["seen_at"].is_string());
}

#[tokio::test]
async fn test_concurrent_runs_share_one_history() {
    let server = MockServer::start().await;
    serve(&server, "/listing", &structured_listing("Alpha", "Beta")).await;

    let dir = TempDir::new().unwrap();
    let output = output_config(&dir);
    let source = {
        let mut storage = SqliteStorage::new(Path::new(&output.database_path)).unwrap();
        storage
            .upsert_source(&structured_source(
                "catalog",
                format!("{}/listing", server.uri()),
            ))
            .unwrap()
    };

    let context = WorkerContext::new(&output, fetcher(), Arc::new(NoopNotifier));
    let mut workers = JoinSet::new();
    for _ in 0..3 {
        let context = context.clone();
        let source = source.clone();
        workers.spawn(async move { context.run_source(&source).await });
    }

    let mut created = 0;
    while let Some(run) = workers.join_next().await {
        let run = run.unwrap();
        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.changed_items, 0);
        created += run.created_items;
    }
    assert_eq!(created, 2);

    let storage = SqliteStorage::new(Path::new(&output.database_path)).unwrap();
    let items = storage.list_items(source.id).unwrap();
    assert_eq!(items.len(), 2);
    for item in items {
        assert_eq!(storage.list_versions(item.id).unwrap().len(), 1);
    }
}
