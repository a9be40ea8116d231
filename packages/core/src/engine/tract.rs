//! tract-backed graph execution for TensorFlow frozen graphs and ONNX models

use super::{GraphBackend, GraphConfig, GraphFormat};
use crate::error::{InferenceError, LoadError};
use crate::types::{InputTensor, ProbabilityVector};
use std::io::Cursor;
use tract_onnx::prelude::*;

pub struct TractBackend {
    plan: TypedRunnableModel<TypedModel>,
    output_len: Option<usize>,
}

impl TractBackend {
    /// Parse, pin the input shape, optimize and compile the graph once.
    pub fn load(
        bytes: &[u8],
        format: GraphFormat,
        config: &GraphConfig,
    ) -> Result<Self, LoadError> {
        let graph_err = |e: TractError| LoadError::Graph(e.to_string());

        let mut reader = Cursor::new(bytes);
        let mut model: InferenceModel = match format {
            GraphFormat::TensorFlow => tract_tensorflow::tensorflow().model_for_read(&mut reader),
            GraphFormat::Onnx => tract_onnx::onnx().model_for_read(&mut reader),
        }
        .map_err(graph_err)?;

        if let Some(input) = &config.input_op {
            if model.node_by_name(input).is_err() {
                return Err(LoadError::OperationNotFound(input.clone()));
            }
            model = model.with_input_names([input.as_str()]).map_err(graph_err)?;
        }
        if let Some(output) = &config.output_op {
            if model.node_by_name(output).is_err() {
                return Err(LoadError::OperationNotFound(output.clone()));
            }
            model = model.with_output_names([output.as_str()]).map_err(graph_err)?;
        }

        let typed = model
            .with_input_fact(0, f32::fact(config.input_shape.clone()).into())
            .map_err(graph_err)?
            .into_optimized()
            .map_err(graph_err)?;

        let output_len = typed
            .output_fact(0)
            .ok()
            .and_then(|fact| fact.shape.as_concrete().map(|dims| dims.iter().product()));

        let plan = typed.into_runnable().map_err(graph_err)?;

        tracing::debug!(?format, ?output_len, "Compiled graph");
        Ok(Self { plan, output_len })
    }
}

impl GraphBackend for TractBackend {
    fn output_len(&self) -> Option<usize> {
        self.output_len
    }

    fn execute(&self, input: &InputTensor) -> Result<ProbabilityVector, InferenceError> {
        let exec_err = |e: TractError| InferenceError::Execution(e.to_string());

        let tensor = Tensor::from_shape(input.shape(), input.data()).map_err(exec_err)?;
        let outputs = self.plan.run(tvec!(tensor.into())).map_err(exec_err)?;
        let output = outputs.first().ok_or(InferenceError::MissingOutput)?;

        // [1, classes] for a batch of one
        let scores = output.to_array_view::<f32>().map_err(exec_err)?;
        Ok(scores.iter().copied().collect())
    }
}
