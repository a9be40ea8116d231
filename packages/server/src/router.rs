//! Axum routes for the prediction server
//!
//! Every prediction runs on the blocking pool. The blocking task owns its
//! execution context, so a client that disconnects mid-request still lets
//! the context be released when inference returns.

use crate::error::ServerError;
use crate::render::{HtmlPresenter, JsonPresenter, PredictionResponse};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use inception_core::{Dispatcher, Prediction, Presenter};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Uploaded images larger than this are rejected before decoding
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Shared server state
pub struct ServerState {
    pub dispatcher: Dispatcher,
    pub html: HtmlPresenter,
}

impl ServerState {
    pub fn new(dispatcher: Dispatcher, html: HtmlPresenter) -> Self {
        Self { dispatcher, html }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub images: usize,
    pub labels: usize,
}

/// Construct the server router with all endpoints
pub fn server_router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/predict", get(predict_random).post(predict_upload))
        .route("/images/{id}/predict", get(predict_image))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

async fn health_check(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "inception-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        images: state.dispatcher.store().size(),
        labels: state.dispatcher.engine().labels().len(),
    })
}

/// HTML page for a randomly sampled image
///
/// GET /
async fn index(State(state): State<Arc<ServerState>>) -> Result<Html<String>, ServerError> {
    let page =
        tokio::task::spawn_blocking(move || state.dispatcher.dispatch(&state.html)).await??;
    Ok(Html(page))
}

/// GET /predict
async fn predict_random(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<PredictionResponse>, ServerError> {
    let response =
        tokio::task::spawn_blocking(move || state.dispatcher.dispatch(&JsonPresenter)).await??;
    Ok(Json(response))
}

/// GET /images/{id}/predict
async fn predict_image(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<Json<PredictionResponse>, ServerError> {
    let prediction =
        tokio::task::spawn_blocking(move || state.dispatcher.predict_image(&id)).await??;
    Ok(Json(present(prediction)))
}

/// Classify the request body as an encoded image
///
/// POST /predict
async fn predict_upload(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<PredictionResponse>, ServerError> {
    let prediction =
        tokio::task::spawn_blocking(move || state.dispatcher.predict_bytes(body)).await??;
    Ok(Json(present(prediction)))
}

fn present(prediction: Prediction) -> PredictionResponse {
    let Ok(response) = JsonPresenter.render(prediction);
    response
}
