// File: auxbot-controller/tests/http_api_tests.rs

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use auxbot_common::traits::TracingReporter;
use auxbot_controller::http_api::{router, ApiState};
use auxbot_controller::worker_client::WorkerClient;

use common::{registry_with, AlwaysHealthy, FakeCluster};

fn app(cluster: Arc<FakeCluster>) -> Router {
    let registry = registry_with(cluster, Arc::new(AlwaysHealthy));
    let workers = WorkerClient::with_resolver(
        Arc::new(|_: &str| "http://127.0.0.1:1".to_string()),
        Duration::from_millis(300),
        Arc::new(TracingReporter),
    );
    router(ApiState { registry, workers })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_endpoint() {
    let app = app(Arc::new(FakeCluster::new()));
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn provision_list_and_delete() {
    let cluster = Arc::new(FakeCluster::new());
    let app = app(cluster.clone());

    let req = json!({ "guildId": "111", "channelId": "222" });
    let (status, created) = send(&app, "POST", "/workers", Some(req.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["created"], true);
    let pod_name = created["podName"].as_str().unwrap().to_string();

    let (status, existing) = send(&app, "POST", "/workers", Some(req)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(existing["podName"], pod_name.as_str());

    let (status, list) = send(&app, "GET", "/workers", None).await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["guildId"], "111");
    assert_eq!(list[0]["serviceName"], "auxbot-worker-111");
    assert_eq!(list[0]["healthy"], false);

    let (status, _) = send(&app, "DELETE", &format!("/workers/{pod_name}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(cluster.pod_names().is_empty());

    let (status, body) = send(&app, "DELETE", &format!("/workers/{pod_name}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].as_str().unwrap().contains(&pod_name));
}

#[tokio::test]
async fn blank_ids_are_rejected() {
    let cluster = Arc::new(FakeCluster::new());
    let app = app(cluster.clone());
    let (status, _) = send(
        &app,
        "POST",
        "/workers",
        Some(json!({ "guildId": " ", "channelId": "222" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(cluster.pod_names().is_empty());
}

#[tokio::test]
async fn status_of_unreachable_worker_is_bad_gateway() {
    let app = app(Arc::new(FakeCluster::new()));

    let (status, _) = send(&app, "GET", "/workers/nope/status", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, created) = send(
        &app,
        "POST",
        "/workers",
        Some(json!({ "guildId": "111", "channelId": "222" })),
    )
    .await;
    let pod_name = created["podName"].as_str().unwrap().to_string();
    let (status, _) = send(&app, "GET", &format!("/workers/{pod_name}/status"), None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}
