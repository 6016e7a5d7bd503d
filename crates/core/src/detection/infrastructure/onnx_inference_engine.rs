//! Detection model backed by ONNX Runtime via `ort`.
//!
//! Expects one NHWC float input and four outputs bound to fixed indices:
//! boxes, class indices, scores, count.

use std::path::Path;

use ndarray::{Ix1, Ix2, Ix3};

use crate::detection::domain::inference_engine::{
    validate_model_shapes, InferenceEngine, InferenceError, NormalizedTensor, OutputSlot,
    RawModelOutput,
};
use crate::shared::config::PipelineConfig;

pub struct OnnxInferenceEngine {
    session: ort::session::Session,
    input_shape: [usize; 4],
    candidate_count: usize,
}

impl OnnxInferenceEngine {
    /// Loads the model and checks its declared shapes against `config`.
    ///
    /// Any mismatch is returned here; a successfully built engine is never
    /// asked to run a model of the wrong shape.
    pub fn new(model_path: &Path, config: &PipelineConfig) -> Result<Self, InferenceError> {
        let session = ort::session::Session::builder()
            .map_err(load_error(model_path))?
            .commit_from_file(model_path)
            .map_err(load_error(model_path))?;

        let input = session
            .inputs()
            .first()
            .and_then(|input| declared_shape(input.dtype()))
            .unwrap_or_default();
        let outputs: Vec<Vec<i64>> = session
            .outputs()
            .iter()
            .map(|output| declared_shape(output.dtype()).unwrap_or_default())
            .collect();

        validate_model_shapes(&input, &outputs, config)?;
        log::info!(
            "Loaded detection model {} (input {:?}, {} candidates)",
            model_path.display(),
            input,
            config.candidate_count
        );

        Ok(Self {
            session,
            input_shape: config.input_shape(),
            candidate_count: config.candidate_count,
        })
    }
}

impl InferenceEngine for OnnxInferenceEngine {
    fn predict(&mut self, tensor: NormalizedTensor) -> Result<RawModelOutput, InferenceError> {
        if tensor.shape() != &self.input_shape[..] {
            return Err(InferenceError::InputShapeMismatch {
                expected: self.input_shape.iter().map(|&d| d as i64).collect(),
                actual: tensor.shape().iter().map(|&d| d as i64).collect(),
            });
        }

        let input_value = ort::value::Tensor::from_array(tensor.into_array()).map_err(backend)?;
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(backend)?;
        if outputs.len() != OutputSlot::ALL.len() {
            return Err(InferenceError::OutputCount {
                expected: OutputSlot::ALL.len(),
                actual: outputs.len(),
            });
        }

        let boxes = outputs[OutputSlot::Boxes.index()]
            .try_extract_array::<f32>()
            .map_err(backend)?
            .to_owned()
            .into_dimensionality::<Ix3>()
            .map_err(backend)?;
        let class_indices = outputs[OutputSlot::ClassIndices.index()]
            .try_extract_array::<f32>()
            .map_err(backend)?
            .to_owned()
            .into_dimensionality::<Ix2>()
            .map_err(backend)?;
        let scores = outputs[OutputSlot::Scores.index()]
            .try_extract_array::<f32>()
            .map_err(backend)?
            .to_owned()
            .into_dimensionality::<Ix2>()
            .map_err(backend)?;
        let count = outputs[OutputSlot::Count.index()]
            .try_extract_array::<f32>()
            .map_err(backend)?
            .to_owned()
            .into_dimensionality::<Ix1>()
            .map_err(backend)?;

        RawModelOutput::new(boxes, class_indices, scores, count)?
            .require_candidates(self.candidate_count)
    }
}

fn declared_shape(dtype: &ort::value::ValueType) -> Option<Vec<i64>> {
    if let ort::value::ValueType::Tensor { ref shape, .. } = dtype {
        Some(shape.iter().copied().collect())
    } else {
        None
    }
}

fn load_error<E: std::fmt::Display>(path: &Path) -> impl Fn(E) -> InferenceError + '_ {
    move |e| InferenceError::ModelLoad(format!("{}: {e}", path.display()))
}

fn backend(e: impl std::fmt::Display) -> InferenceError {
    InferenceError::Backend(e.to_string())
}
