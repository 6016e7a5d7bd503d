use ndarray::{Array1, Array2, Array3, Array4, ArrayView4};
use thiserror::Error;

use crate::shared::config::PipelineConfig;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("failed to load model: {0}")]
    ModelLoad(String),
    #[error("model input shape {actual:?} does not match expected {expected:?}")]
    InputShapeMismatch { expected: Vec<i64>, actual: Vec<i64> },
    #[error("model declares {actual} outputs, expected {expected}")]
    OutputCount { expected: usize, actual: usize },
    #[error("model output {slot} has shape {actual:?}, expected {expected:?}")]
    OutputShapeMismatch {
        slot: OutputSlot,
        expected: Vec<i64>,
        actual: Vec<i64>,
    },
    #[error("inference failed: {0}")]
    Backend(String),
}

/// Fixed binding of model outputs to indices. The order is part of the
/// model contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputSlot {
    Boxes = 0,
    ClassIndices = 1,
    Scores = 2,
    Count = 3,
}

impl OutputSlot {
    pub const ALL: [OutputSlot; 4] = [
        OutputSlot::Boxes,
        OutputSlot::ClassIndices,
        OutputSlot::Scores,
        OutputSlot::Count,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Expected shape for `candidates` slots.
    pub fn expected_shape(self, candidates: usize) -> Vec<i64> {
        let n = candidates as i64;
        match self {
            OutputSlot::Boxes => vec![1, n, 4],
            OutputSlot::ClassIndices | OutputSlot::Scores => vec![1, n],
            OutputSlot::Count => vec![1],
        }
    }
}

impl std::fmt::Display for OutputSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OutputSlot::Boxes => "boxes",
            OutputSlot::ClassIndices => "class_indices",
            OutputSlot::Scores => "scores",
            OutputSlot::Count => "count",
        };
        write!(f, "{} ({name})", self.index())
    }
}

/// Model-ready `[1, H, W, 3]` float tensor. Moved into the engine, so each
/// tensor is consumed exactly once.
#[derive(Debug)]
pub struct NormalizedTensor(Array4<f32>);

impl NormalizedTensor {
    pub fn from_array(array: Array4<f32>) -> Self {
        Self(array)
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.0.view()
    }

    pub fn into_array(self) -> Array4<f32> {
        self.0
    }
}

/// The four output tensors of one inference call.
#[derive(Clone, Debug)]
pub struct RawModelOutput {
    boxes: Array3<f32>,
    class_indices: Array2<f32>,
    scores: Array2<f32>,
    count: Array1<f32>,
}

impl RawModelOutput {
    /// Checks that all four arrays agree on a single candidate count `N`:
    /// boxes `[1,N,4]`, class indices `[1,N]`, scores `[1,N]`, count `[1]`.
    pub fn new(
        boxes: Array3<f32>,
        class_indices: Array2<f32>,
        scores: Array2<f32>,
        count: Array1<f32>,
    ) -> Result<Self, InferenceError> {
        let n = boxes.shape()[1];
        let checks: [(OutputSlot, &[usize]); 4] = [
            (OutputSlot::Boxes, boxes.shape()),
            (OutputSlot::ClassIndices, class_indices.shape()),
            (OutputSlot::Scores, scores.shape()),
            (OutputSlot::Count, count.shape()),
        ];
        for (slot, shape) in checks {
            let actual: Vec<i64> = shape.iter().map(|&d| d as i64).collect();
            let expected = slot.expected_shape(n);
            if actual != expected {
                return Err(InferenceError::OutputShapeMismatch {
                    slot,
                    expected,
                    actual,
                });
            }
        }
        Ok(Self {
            boxes,
            class_indices,
            scores,
            count,
        })
    }

    pub fn candidate_count(&self) -> usize {
        self.boxes.shape()[1]
    }

    /// Rejects an output whose candidate count differs from `candidates`.
    ///
    /// A dynamic candidate dimension passes setup validation, so this is
    /// checked again on every inference.
    pub fn require_candidates(self, candidates: usize) -> Result<Self, InferenceError> {
        if self.candidate_count() == candidates {
            return Ok(self);
        }
        Err(InferenceError::OutputShapeMismatch {
            slot: OutputSlot::Boxes,
            expected: OutputSlot::Boxes.expected_shape(candidates),
            actual: self.boxes.shape().iter().map(|&d| d as i64).collect(),
        })
    }

    /// Raw box for candidate `i` in model order `[top, left, bottom, right]`.
    pub fn raw_box(&self, i: usize) -> [f32; 4] {
        [
            self.boxes[[0, i, 0]],
            self.boxes[[0, i, 1]],
            self.boxes[[0, i, 2]],
            self.boxes[[0, i, 3]],
        ]
    }

    pub fn class_index(&self, i: usize) -> f32 {
        self.class_indices[[0, i]]
    }

    pub fn score(&self, i: usize) -> f32 {
        self.scores[[0, i]]
    }

    /// Number of detections the model itself reports as meaningful.
    pub fn reported_count(&self) -> f32 {
        self.count[0]
    }
}

/// Opaque detection model: one tensor in, four fixed-shape tensors out.
///
/// Implementations are not assumed reentrant; `&mut self` keeps calls
/// serialized on the owning worker.
pub trait InferenceEngine: Send {
    fn predict(&mut self, tensor: NormalizedTensor) -> Result<RawModelOutput, InferenceError>;
}

/// Validates declared model shapes against the pipeline configuration.
///
/// Negative dimensions are dynamic and accepted as wildcards.
pub fn validate_model_shapes(
    input: &[i64],
    outputs: &[Vec<i64>],
    config: &PipelineConfig,
) -> Result<(), InferenceError> {
    let expected_input: Vec<i64> = config.input_shape().iter().map(|&d| d as i64).collect();
    if !shape_matches(input, &expected_input) {
        return Err(InferenceError::InputShapeMismatch {
            expected: expected_input,
            actual: input.to_vec(),
        });
    }

    if outputs.len() != OutputSlot::ALL.len() {
        return Err(InferenceError::OutputCount {
            expected: OutputSlot::ALL.len(),
            actual: outputs.len(),
        });
    }

    for slot in OutputSlot::ALL {
        let expected = slot.expected_shape(config.candidate_count);
        let actual = &outputs[slot.index()];
        if !shape_matches(actual, &expected) {
            return Err(InferenceError::OutputShapeMismatch {
                slot,
                expected,
                actual: actual.clone(),
            });
        }
    }
    Ok(())
}

fn shape_matches(actual: &[i64], expected: &[i64]) -> bool {
    actual.len() == expected.len()
        && actual
            .iter()
            .zip(expected)
            .all(|(&a, &e)| a < 0 || a == e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2, Array3};

    fn declared_outputs(n: i64) -> Vec<Vec<i64>> {
        vec![vec![1, n, 4], vec![1, n], vec![1, n], vec![1]]
    }

    #[test]
    fn test_slot_indices_are_fixed() {
        let indices: Vec<usize> = OutputSlot::ALL.iter().map(|s| s.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_validate_accepts_matching_model() {
        let config = PipelineConfig::default();
        assert!(validate_model_shapes(&[1, 128, 128, 3], &declared_outputs(10), &config).is_ok());
    }

    #[test]
    fn test_validate_accepts_dynamic_batch() {
        let config = PipelineConfig::default();
        assert!(validate_model_shapes(&[-1, 128, 128, 3], &declared_outputs(10), &config).is_ok());
    }

    #[test]
    fn test_validate_rejects_wrong_input_size() {
        let config = PipelineConfig::default();
        let err =
            validate_model_shapes(&[1, 192, 192, 3], &declared_outputs(10), &config).unwrap_err();
        assert!(matches!(err, InferenceError::InputShapeMismatch { .. }));
    }

    #[test]
    fn test_validate_rejects_nchw_input() {
        let config = PipelineConfig::default();
        let err =
            validate_model_shapes(&[1, 3, 128, 128], &declared_outputs(10), &config).unwrap_err();
        assert!(matches!(err, InferenceError::InputShapeMismatch { .. }));
    }

    #[test]
    fn test_validate_rejects_missing_output() {
        let config = PipelineConfig::default();
        let outputs = vec![vec![1, 10, 4], vec![1, 10], vec![1, 10]];
        let err = validate_model_shapes(&[1, 128, 128, 3], &outputs, &config).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::OutputCount {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_validate_rejects_wrong_candidate_count() {
        let config = PipelineConfig::default();
        let err =
            validate_model_shapes(&[1, 128, 128, 3], &declared_outputs(25), &config).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::OutputShapeMismatch {
                slot: OutputSlot::Boxes,
                ..
            }
        ));
    }

    #[test]
    fn test_raw_output_rejects_inconsistent_scores() {
        let result = RawModelOutput::new(
            Array3::zeros((1, 10, 4)),
            Array2::zeros((1, 10)),
            Array2::zeros((1, 9)),
            Array1::zeros(1),
        );
        assert!(matches!(
            result,
            Err(InferenceError::OutputShapeMismatch {
                slot: OutputSlot::Scores,
                ..
            })
        ));
    }

    #[test]
    fn test_raw_output_accessors() {
        let mut boxes = Array3::zeros((1, 2, 4));
        boxes[[0, 1, 0]] = 0.1;
        boxes[[0, 1, 3]] = 0.8;
        let mut scores = Array2::zeros((1, 2));
        scores[[0, 1]] = 0.7;
        let output = RawModelOutput::new(
            boxes,
            Array2::ones((1, 2)),
            scores,
            Array1::from_elem(1, 2.0),
        )
        .unwrap();

        assert_eq!(output.candidate_count(), 2);
        assert_eq!(output.raw_box(1), [0.1, 0.0, 0.0, 0.8]);
        assert_eq!(output.class_index(0), 1.0);
        assert_eq!(output.score(1), 0.7);
        assert_eq!(output.reported_count(), 2.0);
    }

    fn output_with(n: usize) -> RawModelOutput {
        RawModelOutput::new(
            Array3::zeros((1, n, 4)),
            Array2::zeros((1, n)),
            Array2::zeros((1, n)),
            Array1::zeros(1),
        )
        .unwrap()
    }

    #[test]
    fn test_require_candidates_accepts_configured_count() {
        assert_eq!(output_with(10).require_candidates(10).unwrap().candidate_count(), 10);
    }

    #[test]
    fn test_require_candidates_rejects_other_count() {
        match output_with(7).require_candidates(3) {
            Err(InferenceError::OutputShapeMismatch {
                slot,
                expected,
                actual,
            }) => {
                assert_eq!(slot, OutputSlot::Boxes);
                assert_eq!(expected, vec![1, 3, 4]);
                assert_eq!(actual, vec![1, 7, 4]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_output_slot_display() {
        assert_eq!(OutputSlot::Scores.to_string(), "2 (scores)");
    }
}
