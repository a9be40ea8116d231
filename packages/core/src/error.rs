//! Error types for the serving pipeline

use crate::dispatch::RequestStage;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while loading the graph or its labels. Fatal at startup.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Model file not found: {0}")]
    MissingFile(PathBuf),

    #[error("Unsupported graph format for {0} (expected .pb or .onnx)")]
    UnsupportedFormat(PathBuf),

    #[error("Failed to parse graph: {0}")]
    Graph(String),

    #[error("Operation '{0}' not found in graph")]
    OperationNotFound(String),

    #[error("Label list is empty")]
    EmptyLabels,

    #[error("Graph produces {outputs} scores but {labels} labels were loaded")]
    LabelMismatch { outputs: usize, labels: usize },
}

/// Failures while ingesting the image directory. Fatal at startup.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to list image directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No usable images in {0}")]
    NoImages(PathBuf),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Image store is empty")]
    EmptyStore,

    #[error("Image '{0}' not found")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Graph execution failed: {0}")]
    Execution(String),

    #[error("Graph produced no output")]
    MissingOutput,

    #[error("Graph produced {actual} scores, expected {expected}")]
    OutputLength { expected: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Invalid codec parameters: {0}")]
    InvalidParameters(String),

    #[error("Tensor shape {shape:?} does not hold {len} values")]
    Shape { shape: Vec<usize>, len: usize },
}

/// Caller bugs in the ranking preconditions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RankingError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for: {0}")]
    InvalidValue(String),
}

/// Per-request failure, tagged with the stage that failed.
#[derive(Error, Debug)]
#[error("Prediction failed while {stage}: {kind}")]
pub struct DispatchError {
    pub stage: RequestStage,
    #[source]
    pub kind: DispatchErrorKind,
}

#[derive(Error, Debug)]
pub enum DispatchErrorKind {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Ranking(#[from] RankingError),

    #[error("No codec configured for raw image prediction")]
    CodecUnavailable,

    #[error("Failed to render prediction: {0}")]
    Render(String),
}

impl DispatchError {
    pub fn new(stage: RequestStage, kind: impl Into<DispatchErrorKind>) -> Self {
        Self {
            stage,
            kind: kind.into(),
        }
    }

    /// True when the request named an image that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, DispatchErrorKind::Store(StoreError::NotFound(_)))
    }

    /// True when caller-supplied bytes could not be turned into a tensor.
    pub fn is_bad_input(&self) -> bool {
        matches!(self.kind, DispatchErrorKind::Codec(_))
    }

    /// Caused by the request rather than by the graph or the server.
    pub fn is_client_error(&self) -> bool {
        self.is_not_found() || self.is_bad_input()
    }
}
