// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use datapress_model::{ContainerId, DatasetId, UserId};
use datapress_publish::{
    demo_draft, BaselineValidator, DraftRepository, LocalRegistrar, MemoryRegistry, Publisher,
    PublisherConfig, PublisherDeps,
};
use datapress_server::{build_router, AppState};
use datapress_store::{MemoryStore, Namespace};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

async fn spawn_app() -> (SocketAddr, Arc<MemoryStore>, Arc<MemoryRegistry>) {
    let store = Arc::new(MemoryStore::new());
    let registry = Arc::new(MemoryRegistry::new());
    let publisher = Arc::new(Publisher::new(
        PublisherDeps {
            store: store.clone(),
            drafts: registry.clone(),
            status: registry.clone(),
            published: registry.clone(),
            validator: Arc::new(BaselineValidator::default()),
            registrar: Arc::new(LocalRegistrar::default()),
        },
        &PublisherConfig::default(),
    ));
    let app = build_router(AppState::new(publisher));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve app");
    });
    (addr, store, registry)
}

async fn seed_dataset(store: &MemoryStore, registry: &MemoryRegistry) -> (DatasetId, UserId) {
    let dataset = DatasetId::parse("ds-retina").expect("dataset id");
    let container = ContainerId::parse("draft-retina").expect("container id");
    let user = UserId::parse("alice").expect("user id");
    registry
        .put(&demo_draft(&dataset, &container, &user))
        .await
        .expect("seed draft");
    store.put_file(Namespace::Draft, &container, "a.csv", b"h1,h2\n1,2\n");
    store.put_directory(Namespace::Draft, &container, "b");
    store.put_file(Namespace::Draft, &container, "b/c.json", b"{\"k\":1}");
    store.put_file(Namespace::Draft, &container, "b/d.txt", b"notes");
    (dataset, user)
}

async fn send(addr: SocketAddr, request: String) -> String {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    stream
        .write_all(request.as_bytes())
        .await
        .expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    response
}

fn post(addr: SocketAddr, path: &str, user: Option<&str>) -> String {
    let mut request = format!("POST {path} HTTP/1.1\r\nHost: {addr}\r\n");
    if let Some(user) = user {
        request.push_str(&format!("x-user-id: {user}\r\n"));
    }
    request.push_str("Content-Length: 0\r\nConnection: close\r\n\r\n");
    request
}

fn get(addr: SocketAddr, path: &str) -> String {
    format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n")
}

#[tokio::test]
async fn publish_endpoint_returns_the_receipt() {
    let (addr, store, registry) = spawn_app().await;
    let (dataset, _) = seed_dataset(&store, &registry).await;

    let response = send(addr, post(addr, "/v1/datasets/ds-retina/publish", Some("alice"))).await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains(&format!("\"dataset_id\":\"{dataset}\"")));
    assert!(response.contains("\"published_id\":1"));
    assert!(response.contains("\"identifier\":\"10.60775/dataset.1\""));
    assert!(response.contains("\"files_copied\":3"));
    assert!(response.contains("x-request-id: req-"));
}

#[tokio::test]
async fn missing_user_header_is_a_bad_request() {
    let (addr, store, registry) = spawn_app().await;
    seed_dataset(&store, &registry).await;

    let response = send(addr, post(addr, "/v1/datasets/ds-retina/publish", None)).await;
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(response.contains("\"code\":\"invalid_request\""));
    assert!(response.contains("x-user-id"));
}

#[tokio::test]
async fn validation_failure_reports_field_errors_and_sticks_in_status() {
    let (addr, store, registry) = spawn_app().await;
    let (dataset, user) = seed_dataset(&store, &registry).await;
    let container = ContainerId::parse("draft-retina").expect("container id");
    let mut draft = demo_draft(&dataset, &container, &user);
    draft.description.clear();
    registry.put(&draft).await.expect("reseed draft");

    let response = send(addr, post(addr, "/v1/datasets/ds-retina/publish", Some("alice"))).await;
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(response.contains("\"code\":\"validation_failed\""));
    assert!(response.contains("\"stage\":\"validating-dataset-metadata\""));
    assert!(response.contains("\"description\""));

    let status = send(addr, get(addr, "/v1/datasets/ds-retina/publish/status")).await;
    assert!(status.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(status.contains("\"stage\":\"validating-dataset-metadata\""));
}

#[tokio::test]
async fn unknown_dataset_maps_to_not_found() {
    let (addr, _store, _registry) = spawn_app().await;

    let response = send(addr, post(addr, "/v1/datasets/ds-ghost/publish", Some("alice"))).await;
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(response.contains("\"code\":\"not_found\""));

    let status = send(addr, get(addr, "/v1/datasets/ds-ghost/publish/status")).await;
    assert!(status.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(status.contains("no publishing status recorded"));
}

#[tokio::test]
async fn background_publish_accepts_then_completes() {
    let (addr, store, registry) = spawn_app().await;
    seed_dataset(&store, &registry).await;

    let response = send(
        addr,
        post(
            addr,
            "/v1/datasets/ds-retina/publish?background=true",
            Some("alice"),
        ),
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 202 Accepted\r\n"));
    assert!(response.contains("\"status_url\":\"/v1/datasets/ds-retina/publish/status\""));

    let mut completed = false;
    for _ in 0..100 {
        let status = send(addr, get(addr, "/v1/datasets/ds-retina/publish/status")).await;
        if status.contains("\"stage\":\"completed\"") {
            completed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(completed, "background attempt never reached completed");
}

#[tokio::test]
async fn request_ids_are_propagated_from_the_caller() {
    let (addr, _store, _registry) = spawn_app().await;

    let request = format!(
        "GET /v1/datasets/ds-ghost/publish/status HTTP/1.1\r\nHost: {addr}\r\nx-request-id: probe-42\r\nConnection: close\r\n\r\n"
    );
    let response = send(addr, request).await;
    assert!(response.contains("x-request-id: probe-42"));
}

#[tokio::test]
async fn operational_endpoints_respond() {
    let (addr, _store, _registry) = spawn_app().await;

    let health = send(addr, get(addr, "/healthz")).await;
    assert!(health.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(health.ends_with("ok"));

    let ready = send(addr, get(addr, "/readyz")).await;
    assert!(ready.starts_with("HTTP/1.1 200 OK\r\n"));

    let version = send(addr, get(addr, "/v1/version")).await;
    assert!(version.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(version.contains("\"crate\":\"datapress-server\""));
    assert!(version.contains("\"default_prefix\":\"10.60775\""));

    let metrics = send(addr, get(addr, "/metrics")).await;
    assert!(metrics.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(metrics.contains("datapress_publish_attempts_started{subsystem=\"datapress\""));
    assert!(metrics.contains("datapress_requests_total{subsystem=\"datapress\""));
    assert!(metrics.contains("route=\"/healthz\""));
}
