mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use inception_core::{Dispatcher, ImageRecord, ImageStore, InferenceEngine, InputTensor, Ranker};
use inception_server::{HtmlPresenter, ServerState, assemble_dispatcher, server_router};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn app(dir: &std::path::Path) -> Router {
    let dispatcher = assemble_dispatcher(common::engine(), &common::config(dir)).unwrap();
    let html = HtmlPresenter::new().unwrap().with_hostname("test-host");
    server_router(ServerState::new(dispatcher, html))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

fn json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn health_reports_pool_and_labels() {
    let dir = common::image_dir();
    let (status, body) = get(app(dir.path()), "/health").await;

    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "inception-server");
    assert_eq!(body["images"], 2);
    assert_eq!(body["labels"], 3);
}

#[tokio::test]
async fn index_renders_html_page() {
    let dir = common::image_dir();
    let response = app(dir.path())
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let page = String::from_utf8(body.to_vec()).unwrap();
    assert!(page.contains("data:image/jpeg;base64,"));
    assert!(page.contains("85.0% likely"));
    assert!(page.contains("bird"));
    assert!(page.contains("host: test-host"));
}

#[tokio::test]
async fn random_prediction_as_json() {
    let dir = common::image_dir();
    let (status, body) = get(app(dir.path()), "/predict").await;

    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    let id = body["image_id"].as_str().unwrap();
    assert!(id == "a.jpg" || id == "b.jpg");

    let predictions = body["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 2);
    assert_eq!(predictions[0]["label"], "bird");
    assert_eq!(predictions[1]["label"], "cat");
    assert!(body["elapsed_ms"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn prediction_by_id() {
    let dir = common::image_dir();
    let (status, body) = get(app(dir.path()), "/images/b.jpg/predict").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["image_id"], "b.jpg");
}

#[tokio::test]
async fn unknown_image_is_404() {
    let dir = common::image_dir();
    let (status, body) = get(app(dir.path()), "/images/nonexistent.jpg/predict").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&body)["code"], "NOT_FOUND");
}

#[tokio::test]
async fn uploaded_image_is_classified() {
    let dir = common::image_dir();
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "image/png")
        .body(Body::from(common::png_bytes()))
        .unwrap();
    let (status, body) = send(app(dir.path()), request).await;

    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert!(body.get("image_id").is_none());
    assert_eq!(body["predictions"][0]["label"], "bird");
}

#[tokio::test]
async fn undecodable_upload_is_400() {
    let dir = common::image_dir();
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .body(Body::from("definitely not an image"))
        .unwrap();
    let (status, body) = send(app(dir.path()), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn inference_failure_is_generic_500() {
    let engine =
        InferenceEngine::from_backend(Box::new(common::FailingBackend), common::labels()).unwrap();
    let mut store = ImageStore::new();
    store.insert(ImageRecord::new(
        "a.jpg",
        b"raw".to_vec(),
        InputTensor::new(vec![1, 3], vec![0.0; 3]).unwrap(),
    ));
    let engine = Arc::new(engine);
    let dispatcher = Dispatcher::new(engine.clone(), Arc::new(store), Ranker::new(3, 0.0005));
    let app = server_router(ServerState::new(dispatcher, HtmlPresenter::new().unwrap()));

    let (status, body) = get(app.clone(), "/predict").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let text = String::from_utf8(body.clone()).unwrap();
    assert!(!text.contains("device lost"));
    assert_eq!(json(&body)["message"], "Internal Error");

    let (status, _) = get(app, "/").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(engine.active_contexts(), 0);
}

#[tokio::test]
async fn concurrent_requests_all_succeed() {
    let dir = common::image_dir();
    let app = app(dir.path());

    let mut handles = Vec::new();
    for _ in 0..32 {
        let app = app.clone();
        handles.push(tokio::spawn(async move { get(app, "/predict").await.0 }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }
}
