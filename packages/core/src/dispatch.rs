//! # Request Dispatcher
//! Drives one prediction request from image selection to presentation.
//!
//! A request walks `Received -> Sampling -> Inferring -> Ranking -> Rendering
//! -> Completed`, with `Normalizing` in place of `Sampling` when the caller
//! supplies its own bytes. Any stage may end in `Failed`; the error carries
//! the stage it failed in. Nothing here blocks on I/O, but inference is CPU
//! bound so async callers should run it on a blocking thread.

use crate::codec::TensorCodec;
use crate::engine::InferenceEngine;
use crate::error::{DispatchError, DispatchErrorKind};
use crate::ranking::Ranker;
use crate::store::ImageStore;
use crate::types::{InputTensor, PredictionResult};
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestStage {
    Received,
    Sampling,
    Normalizing,
    Inferring,
    Ranking,
    Rendering,
    Completed,
    Failed,
}

impl RequestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStage::Received => "received",
            RequestStage::Sampling => "sampling",
            RequestStage::Normalizing => "normalizing",
            RequestStage::Inferring => "inferring",
            RequestStage::Ranking => "ranking",
            RequestStage::Rendering => "rendering",
            RequestStage::Completed => "completed",
            RequestStage::Failed => "failed",
        }
    }
}

impl fmt::Display for RequestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ranked result together with the image it was computed for.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Store id, `None` for caller-supplied bytes
    pub image_id: Option<String>,
    pub raw: Bytes,
    pub result: PredictionResult,
    /// Wall time from request receipt until ranking finished
    pub elapsed: Duration,
}

/// Turns a finished prediction into whatever the caller sends back.
pub trait Presenter {
    type Output;
    type Error: fmt::Display;

    fn render(&self, prediction: Prediction) -> Result<Self::Output, Self::Error>;
}

/// Stage bookkeeping for one request.
struct Request {
    stage: RequestStage,
    started: Instant,
}

impl Request {
    fn start() -> Self {
        Self {
            stage: RequestStage::Received,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, stage: RequestStage) {
        tracing::trace!(from = %self.stage, to = %stage, "Request stage");
        self.stage = stage;
    }

    fn fail(&mut self, kind: impl Into<DispatchErrorKind>) -> DispatchError {
        let stage = self.stage;
        self.stage = RequestStage::Failed;
        let error = DispatchError::new(stage, kind);
        if error.is_client_error() {
            metrics::counter!("prediction_rejections_total", "stage" => stage.as_str())
                .increment(1);
            tracing::warn!(stage = %stage, error = %error.kind, "Prediction rejected");
        } else {
            metrics::counter!("prediction_failures_total", "stage" => stage.as_str()).increment(1);
            tracing::error!(stage = %stage, error = %error.kind, "Prediction failed");
        }
        error
    }

    fn complete(mut self) {
        self.advance(RequestStage::Completed);
        let elapsed = self.started.elapsed();
        metrics::counter!("predictions_total").increment(1);
        metrics::histogram!("prediction_duration_seconds").record(elapsed.as_secs_f64());
        tracing::debug!(elapsed_ms = elapsed.as_secs_f64() * 1000.0, "Prediction completed");
    }
}

/// Shared, read-only request handler. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    engine: Arc<InferenceEngine>,
    store: Arc<ImageStore>,
    ranker: Ranker,
    codec: Option<Arc<dyn TensorCodec>>,
}

impl Dispatcher {
    pub fn new(engine: Arc<InferenceEngine>, store: Arc<ImageStore>, ranker: Ranker) -> Self {
        Self {
            engine,
            store,
            ranker,
            codec: None,
        }
    }

    /// Enable [`Dispatcher::predict_bytes`] with the codec the store was built with.
    pub fn with_codec(mut self, codec: Arc<dyn TensorCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Predict a random stored image and hand the result to `presenter`.
    pub fn dispatch<P: Presenter>(&self, presenter: &P) -> Result<P::Output, DispatchError> {
        let mut request = Request::start();
        let prediction = self.sample_and_classify(&mut request)?;

        request.advance(RequestStage::Rendering);
        let output = presenter
            .render(prediction)
            .map_err(|e| request.fail(DispatchErrorKind::Render(e.to_string())))?;

        request.complete();
        Ok(output)
    }

    /// Predict a random stored image.
    pub fn predict_random(&self) -> Result<Prediction, DispatchError> {
        let mut request = Request::start();
        let prediction = self.sample_and_classify(&mut request)?;
        request.complete();
        Ok(prediction)
    }

    /// Predict the stored image with the given id.
    pub fn predict_image(&self, id: &str) -> Result<Prediction, DispatchError> {
        let mut request = Request::start();
        request.advance(RequestStage::Sampling);
        let record = self.store.get(id).map_err(|e| request.fail(e))?;

        let prediction = self.classify(
            &mut request,
            Some(record.id.clone()),
            record.raw.clone(),
            &record.tensor,
        )?;
        request.complete();
        Ok(prediction)
    }

    /// Normalize caller-supplied image bytes and predict them.
    pub fn predict_bytes(&self, raw: impl Into<Bytes>) -> Result<Prediction, DispatchError> {
        let raw = raw.into();
        let mut request = Request::start();
        request.advance(RequestStage::Normalizing);

        let Some(codec) = &self.codec else {
            return Err(request.fail(DispatchErrorKind::CodecUnavailable));
        };
        let tensor = codec.normalize(&raw).map_err(|e| request.fail(e))?;

        let prediction = self.classify(&mut request, None, raw, &tensor)?;
        request.complete();
        Ok(prediction)
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    pub fn ranker(&self) -> Ranker {
        self.ranker
    }

    fn sample_and_classify(&self, request: &mut Request) -> Result<Prediction, DispatchError> {
        request.advance(RequestStage::Sampling);
        let record = self
            .store
            .sample()
            .and_then(|id| self.store.get(id))
            .map_err(|e| request.fail(e))?;

        self.classify(request, Some(record.id.clone()), record.raw.clone(), &record.tensor)
    }

    fn classify(
        &self,
        request: &mut Request,
        image_id: Option<String>,
        raw: Bytes,
        tensor: &InputTensor,
    ) -> Result<Prediction, DispatchError> {
        request.advance(RequestStage::Inferring);
        let scores = self.engine.infer(tensor).map_err(|e| request.fail(e))?;

        request.advance(RequestStage::Ranking);
        let result = self
            .ranker
            .rank(&scores, self.engine.labels())
            .map_err(|e| request.fail(e))?;

        Ok(Prediction {
            image_id,
            raw,
            result,
            elapsed: request.started.elapsed(),
        })
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("images", &self.store.size())
            .field("labels", &self.engine.labels().len())
            .field("ranker", &self.ranker)
            .field("accepts_bytes", &self.codec.is_some())
            .finish()
    }
}
