//! Inception Serve core
//!
//! The inference serving pipeline behind the prediction server:
//! - `codec`: raw image bytes to a fixed-shape input tensor
//! - `engine`: graph lifecycle and scoped execution contexts
//! - `ranking`: top-k selection with a confidence cutoff
//! - `store`: in-memory image pool with cached tensors
//! - `dispatch`: per-request orchestration handed to a presenter
//!
//! ## Usage
//!
//! ```rust,ignore
//! use inception_core::{Dispatcher, ImageStore, InferenceEngine, Ranker, ServingConfig};
//!
//! let config = ServingConfig::from_env()?;
//! let engine = InferenceEngine::load_from_dir(&config.model, &config.graph_config())?;
//! let mut store = ImageStore::new();
//! store.ingest(&config.image_dir, &config.codec.build(), &config.extensions)?;
//! let dispatcher = Dispatcher::new(engine.into(), store.into(), config.ranker());
//! let prediction = dispatcher.predict_random()?;
//! ```

pub mod codec;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod ranking;
pub mod store;
pub mod types;

pub use codec::{ImageCodec, TensorCodec, TensorLayout};
pub use config::{CodecConfig, ModelConfig, ServingConfig};
pub use dispatch::{Dispatcher, Prediction, Presenter, RequestStage};
pub use engine::{ClassificationGraph, GraphBackend, GraphConfig, GraphFormat, InferenceEngine};
pub use error::{
    CodecError, ConfigError, DispatchError, DispatchErrorKind, InferenceError, IngestError,
    LoadError, RankingError, StoreError,
};
pub use ranking::{Ranker, top_k};
pub use store::ImageStore;
pub use types::{ImageRecord, InputTensor, PredictionResult, ProbabilityVector, RankedEntry};
