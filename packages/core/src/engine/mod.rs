//! # Inference Engine
//! Owns the classification graph and runs one input through it per call.
//!
//! The graph is loaded once and only read afterwards, so any number of
//! workers may call [`InferenceEngine::infer`] on a shared reference. Each
//! call holds an [`ExecutionContext`] for exactly its own duration; the
//! context is released when it goes out of scope, which covers early
//! returns and unwinding as well as the success path.

use crate::config::ModelConfig;
use crate::error::{InferenceError, LoadError};
use crate::types::{InputTensor, ProbabilityVector};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

mod labels;
mod tract;

pub use labels::parse_labels;
pub use tract::TractBackend;

/// Executes a loaded graph. Implementations must be safe to call from many
/// threads at once and must not keep per-call state between calls.
pub trait GraphBackend: Send + Sync {
    /// Number of scores one execution yields, when the graph declares it.
    fn output_len(&self) -> Option<usize> {
        None
    }

    fn execute(&self, input: &InputTensor) -> Result<ProbabilityVector, InferenceError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphFormat {
    /// Frozen TensorFlow `GraphDef` (`.pb`)
    TensorFlow,
    Onnx,
}

impl GraphFormat {
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("pb") => Ok(GraphFormat::TensorFlow),
            Some("onnx") => Ok(GraphFormat::Onnx),
            _ => Err(LoadError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Input and output operation names used when none are configured.
    pub fn default_ops(&self) -> (Option<&'static str>, Option<&'static str>) {
        match self {
            GraphFormat::TensorFlow => (Some("input"), Some("output")),
            GraphFormat::Onnx => (None, None),
        }
    }
}

/// Where the graph reads its input and writes its scores
#[derive(Clone, Debug, PartialEq)]
pub struct GraphConfig {
    pub input_op: Option<String>,
    pub output_op: Option<String>,
    pub input_shape: Vec<usize>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            input_op: Some("input".to_string()),
            output_op: Some("output".to_string()),
            input_shape: vec![1, 224, 224, 3],
        }
    }
}

/// A loaded graph plus its index-aligned labels. Read-only after load.
///
/// When the graph declares its output width, the label count must match it
/// exactly or loading fails with [`LoadError::LabelMismatch`]. A label file
/// shorter than the output, such as the 1001 names shipped with the
/// inception5h graph against its 1008 scores, must be padded with blank
/// lines; [`parse_labels`] keeps those as labels.
pub struct ClassificationGraph {
    backend: Box<dyn GraphBackend>,
    labels: Vec<String>,
}

impl ClassificationGraph {
    pub fn new(backend: Box<dyn GraphBackend>, labels: Vec<String>) -> Result<Self, LoadError> {
        if labels.is_empty() {
            return Err(LoadError::EmptyLabels);
        }
        if let Some(outputs) = backend.output_len() {
            if outputs != labels.len() {
                return Err(LoadError::LabelMismatch {
                    outputs,
                    labels: labels.len(),
                });
            }
        }
        Ok(Self { backend, labels })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl fmt::Debug for ClassificationGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassificationGraph")
            .field("labels", &self.labels.len())
            .finish_non_exhaustive()
    }
}

/// Scoped handle for one execution against the shared graph
struct ExecutionContext<'a> {
    active: &'a AtomicUsize,
    started: Instant,
}

impl<'a> ExecutionContext<'a> {
    fn acquire(active: &'a AtomicUsize) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        metrics::gauge!("inference_active_contexts").increment(1.0);
        Self {
            active,
            started: Instant::now(),
        }
    }

    fn run(
        &self,
        backend: &dyn GraphBackend,
        input: &InputTensor,
    ) -> Result<ProbabilityVector, InferenceError> {
        backend.execute(input)
    }
}

impl Drop for ExecutionContext<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        metrics::gauge!("inference_active_contexts").decrement(1.0);

        let elapsed = self.started.elapsed();
        metrics::histogram!("inference_duration_seconds").record(elapsed.as_secs_f64());
        tracing::debug!(elapsed_ms = elapsed.as_secs_f64() * 1000.0, "predict took");
    }
}

#[derive(Debug)]
pub struct InferenceEngine {
    graph: ClassificationGraph,
    active: AtomicUsize,
}

impl InferenceEngine {
    /// Parse a serialized graph with tract and pair it with its labels.
    pub fn load(
        model_bytes: &[u8],
        labels: Vec<String>,
        format: GraphFormat,
        config: &GraphConfig,
    ) -> Result<Self, LoadError> {
        if labels.is_empty() {
            return Err(LoadError::EmptyLabels);
        }
        let backend = TractBackend::load(model_bytes, format, config)?;
        Self::from_backend(Box::new(backend), labels)
    }

    pub fn from_backend(
        backend: Box<dyn GraphBackend>,
        labels: Vec<String>,
    ) -> Result<Self, LoadError> {
        Ok(Self {
            graph: ClassificationGraph::new(backend, labels)?,
            active: AtomicUsize::new(0),
        })
    }

    /// Locate the graph and label files in the model directory and load them.
    pub fn load_from_dir(model: &ModelConfig, config: &GraphConfig) -> Result<Self, LoadError> {
        let graph_path = model.dir.join(&model.graph_file);
        let labels_path = model.dir.join(&model.labels_file);
        for path in [&graph_path, &labels_path] {
            if !path.is_file() {
                return Err(LoadError::MissingFile(path.clone()));
            }
        }

        let format = GraphFormat::from_path(&graph_path)?;
        tracing::info!(path = %graph_path.display(), ?format, "Loading graph");
        let bytes = std::fs::read(&graph_path).map_err(|source| LoadError::Io {
            path: graph_path.clone(),
            source,
        })?;
        let text = std::fs::read_to_string(&labels_path).map_err(|source| LoadError::Io {
            path: labels_path.clone(),
            source,
        })?;
        let labels = parse_labels(&text);
        tracing::info!(
            count = labels.len(),
            path = %labels_path.display(),
            "Loaded labels"
        );

        Self::load(&bytes, labels, format, config)
    }

    /// Run one tensor through the graph.
    pub fn infer(&self, tensor: &InputTensor) -> Result<ProbabilityVector, InferenceError> {
        let context = ExecutionContext::acquire(&self.active);
        let scores = context.run(self.graph.backend.as_ref(), tensor)?;

        let expected = self.graph.labels.len();
        if scores.len() != expected {
            return Err(InferenceError::OutputLength {
                expected,
                actual: scores.len(),
            });
        }
        Ok(scores)
    }

    pub fn graph(&self) -> &ClassificationGraph {
        &self.graph
    }

    pub fn labels(&self) -> &[String] {
        self.graph.labels()
    }

    /// Execution contexts currently held by in-flight `infer` calls.
    pub fn active_contexts(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}
