//! Startup phase: everything that must succeed before the server listens

use crate::error::StartupError;
use crate::render::HtmlPresenter;
use crate::router::ServerState;
use inception_core::{Dispatcher, ImageStore, InferenceEngine, Prediction, ServingConfig};
use std::path::Path;
use std::sync::Arc;

/// Load the graph and images described by `config` and prove they work together.
pub fn build_dispatcher(config: &ServingConfig) -> Result<Dispatcher, StartupError> {
    let engine = InferenceEngine::load_from_dir(&config.model, &config.graph_config())?;
    assemble_dispatcher(engine, config)
}

/// Pair an already loaded engine with the configured images.
///
/// Fails on an unsatisfiable `top_k`, an image directory without usable
/// images or a failing smoke prediction. A `predict_file` that cannot be
/// read or classified is logged and startup continues.
pub fn assemble_dispatcher(
    engine: InferenceEngine,
    config: &ServingConfig,
) -> Result<Dispatcher, StartupError> {
    let labels = engine.labels().len();
    if config.top_k > labels {
        return Err(StartupError::TopKTooLarge {
            top_k: config.top_k,
            labels,
        });
    }

    let codec = Arc::new(config.codec.build());
    let mut store = ImageStore::new();
    store.ingest(&config.image_dir, codec.as_ref(), &config.extensions)?;

    let dispatcher =
        Dispatcher::new(Arc::new(engine), Arc::new(store), config.ranker()).with_codec(codec);

    let prediction = dispatcher
        .predict_random()
        .map_err(StartupError::SmokeTest)?;
    log_prediction("Smoke prediction", &prediction);

    if let Some(path) = &config.predict_file {
        if let Err(e) = predict_file(&dispatcher, path) {
            tracing::error!(error = %e, "Startup prediction skipped");
        }
    }

    Ok(dispatcher)
}

/// Classify one image file and log the result.
pub fn predict_file(dispatcher: &Dispatcher, path: &Path) -> Result<Prediction, StartupError> {
    let raw = std::fs::read(path).map_err(|source| StartupError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let prediction = dispatcher
        .predict_bytes(raw)
        .map_err(|source| StartupError::PredictFile {
            path: path.to_path_buf(),
            source,
        })?;
    log_prediction(&path.display().to_string(), &prediction);
    Ok(prediction)
}

/// Full server state: dispatcher plus page renderer.
pub fn build_state(config: &ServingConfig) -> Result<ServerState, StartupError> {
    let dispatcher = build_dispatcher(config)?;
    Ok(ServerState::new(dispatcher, HtmlPresenter::new()?))
}

fn log_prediction(source: &str, prediction: &Prediction) {
    tracing::info!(
        image_id = prediction.image_id.as_deref().unwrap_or("-"),
        elapsed_ms = prediction.elapsed.as_secs_f64() * 1000.0,
        "{source}:\n{}",
        prediction.result
    );
}
