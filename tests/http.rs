//! Router tests over a file-backed catalog in a temp directory.

use appgen_sdk::{router, AppState, FileStore, FsSink, GenerationService};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn app(dir: &std::path::Path, body_limit: usize) -> Router {
    let service = GenerationService::load(Arc::new(FileStore::for_output(dir)), Arc::new(FsSink::new(dir)))
        .await
        .unwrap();
    router(AppState::new(Arc::new(service), None), body_limit)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let res = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn shop() -> Value {
    json!({
        "name": "Shop",
        "models": [
            {"name": "Order", "fields": [
                {"name": "total", "type": "DecimalField", "options": "max_digits=10,decimal_places=2"}
            ], "relationships": [
                {"name": "customer", "type": "ForeignKey", "related_model": "Customer", "options": "on_delete=models.CASCADE"}
            ]},
            {"name": "Customer", "fields": [{"name": "email", "type": "EmailField"}]}
        ]
    })
}

#[tokio::test]
async fn health_and_ready() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), 1 << 20).await;
    let (status, body) = send_json(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    let (status, body) = send_json(&app, Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["applications"], 0);
}

#[tokio::test]
async fn create_generate_and_regenerate() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), 1 << 20).await;

    let (status, body) = send_json(&app, Method::POST, "/api/v1/applications", Some(shop())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["name"], "shop");

    let (status, body) = send_json(&app, Method::POST, "/api/v1/applications", Some(shop())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");

    let (status, body) = send_json(&app, Method::POST, "/api/v1/applications/shop/generate", None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["data"]["entries"].as_array().unwrap().clone();
    assert!(entries.iter().all(|e| e["outcome"] == "written"));
    assert_eq!(body["meta"]["written"], entries.len());
    assert!(dir.path().join("shop/models/order.py").exists());
    assert!(dir.path().join(".appgen/index.json").exists());

    let (_, body) = send_json(&app, Method::POST, "/api/v1/applications/shop/generate", None).await;
    let entries = body["data"]["entries"].as_array().unwrap();
    assert!(entries.iter().all(|e| e["outcome"] == "skipped"));
    assert_eq!(entries[0]["reason"], "exists, overwrite disabled");

    let (_, body) = send_json(
        &app,
        Method::POST,
        "/api/v1/applications/shop/generate",
        Some(json!({"overwrite": true})),
    )
    .await;
    let entries = body["data"]["entries"].as_array().unwrap();
    assert!(entries.iter().all(|e| e["outcome"] == "overwritten"));

    let (status, body) = send_json(&app, Method::GET, "/api/v1/applications", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 1);
}

#[tokio::test]
async fn malformed_generate_bodies_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), 1 << 20).await;
    send_json(&app, Method::POST, "/api/v1/applications", Some(shop())).await;

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/api/v1/applications/shop/generate",
        Some(json!({"overwrite": "yes"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(!dir.path().join("shop").exists());

    let (status, _) = send_json(&app, Method::POST, "/api/v1/applications/shop/generate", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn validate_reports_every_problem() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), 1 << 20).await;
    let bad = json!({
        "name": "shop",
        "models": [
            {"name": "Order", "fields": [
                {"name": "total", "type": "DecimalField"},
                {"name": "class", "type": "CharField", "options": "max_length=5"}
            ]}
        ]
    });
    let (status, body) = send_json(&app, Method::POST, "/api/v1/applications/validate", Some(bad)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "validation_error");
    assert!(body["error"]["details"].as_array().unwrap().len() >= 2);

    let (status, body) = send_json(&app, Method::POST, "/api/v1/applications/validate", Some(shop())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order"]["models"], json!(["Customer", "Order"]));
}

#[tokio::test]
async fn cycles_conflict_and_unknown_targets_are_unprocessable() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), 1 << 20).await;
    let cycle = json!({"name": "loop", "models": [
        {"name": "A", "relationships": [{"name": "b", "type": "ForeignKey", "related_model": "B", "options": "on_delete=models.CASCADE"}]},
        {"name": "B", "relationships": [{"name": "a", "type": "ForeignKey", "related_model": "A", "options": "on_delete=models.CASCADE"}]}
    ]});
    let (status, body) = send_json(&app, Method::POST, "/api/v1/applications", Some(cycle)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "dependency_cycle");
    assert_eq!(body["error"]["details"]["models_in_cycle"], json!(["A", "B"]));

    let unknown = json!({"name": "sales", "models": [
        {"name": "Line", "relationships": [{"name": "thing", "type": "ForeignKey", "related_model": "other_app.Thing", "options": "on_delete=models.CASCADE"}]}
    ]});
    let (status, body) = send_json(&app, Method::POST, "/api/v1/applications", Some(unknown)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["details"][0]["target"], "other_app.Thing");
}

#[tokio::test]
async fn bundle_and_logical_delete() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), 1 << 20).await;
    send_json(&app, Method::POST, "/api/v1/applications", Some(shop())).await;

    let (status, bytes) = send(&app, Method::GET, "/api/v1/applications/shop/bundle", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&bytes[..2], b"PK");
    assert!(!dir.path().join("shop").exists());

    send_json(&app, Method::POST, "/api/v1/applications/shop/generate", None).await;
    let (status, _) = send(&app, Method::DELETE, "/api/v1/applications/shop", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send_json(&app, Method::GET, "/api/v1/applications/shop", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
    assert!(dir.path().join("shop/models/order.py").exists());
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), 64).await;
    let (status, _) = send(&app, Method::POST, "/api/v1/applications", Some(shop())).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
