use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inception_core::{DispatchError, IngestError, LoadError};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Anything that stops the server from coming up.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("TOP_K = {top_k} exceeds the {labels} labels of the graph")]
    TopKTooLarge { top_k: usize, labels: usize },

    #[error("Failed to build page renderer: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Smoke prediction failed: {0}")]
    SmokeTest(#[source] DispatchError),

    #[error("Failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to predict {path}: {source}")]
    PredictFile {
        path: PathBuf,
        #[source]
        source: DispatchError,
    },
}

/// Per-request failure. Only the status and a generic message reach the client.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("Prediction task did not finish: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: &'static str,
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Dispatch(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            ServerError::Dispatch(e) if e.is_bad_input() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match status {
            StatusCode::NOT_FOUND => ("NOT_FOUND", "Image not found"),
            StatusCode::BAD_REQUEST => ("BAD_REQUEST", "Image could not be decoded"),
            _ => ("INTERNAL_ERROR", "Internal Error"),
        };

        // Dispatch failures are logged where they happen
        if let ServerError::Join(e) = &self {
            tracing::error!(error = %e, "Prediction task failed");
        }

        (status, Json(ErrorBody { code, message })).into_response()
    }
}
