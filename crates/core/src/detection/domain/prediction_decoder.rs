use thiserror::Error;

use crate::detection::domain::inference_engine::RawModelOutput;
use crate::shared::label_table::LabelTable;
use crate::shared::prediction::{BoundingBox, Prediction};

#[derive(Error, Debug, PartialEq)]
pub enum DecodeError {
    #[error("candidate {slot}: class index {index} is outside label table of {labels}")]
    LabelIndexOutOfRange {
        slot: usize,
        index: i64,
        labels: usize,
    },
    #[error("candidate {slot}: class index {value} is not a finite number")]
    NonFiniteIndex { slot: usize, value: f32 },
}

/// Converts raw model tensors into labeled predictions.
pub struct PredictionDecoder {
    labels: LabelTable,
}

impl PredictionDecoder {
    pub fn new(labels: LabelTable) -> Self {
        Self { labels }
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Decodes every candidate slot, in slot order.
    ///
    /// A candidate whose class index cannot be resolved is dropped and
    /// logged; the remaining candidates are still returned.
    pub fn decode(&self, output: &RawModelOutput) -> Vec<Prediction> {
        let mut predictions = Vec::with_capacity(output.candidate_count());
        for slot in 0..output.candidate_count() {
            match self.decode_candidate(output, slot) {
                Ok(prediction) => predictions.push(prediction),
                Err(e) => log::warn!("Dropping candidate: {e}"),
            }
        }
        predictions
    }

    pub fn decode_candidate(
        &self,
        output: &RawModelOutput,
        slot: usize,
    ) -> Result<Prediction, DecodeError> {
        let label = self.resolve_label(slot, output.class_index(slot))?;
        let [top, left, bottom, right] = output.raw_box(slot);
        Ok(Prediction {
            label: label.to_string(),
            score: output.score(slot),
            location: BoundingBox {
                left,
                top,
                right,
                bottom,
            },
        })
    }

    fn resolve_label(&self, slot: usize, raw_index: f32) -> Result<&str, DecodeError> {
        if !raw_index.is_finite() {
            return Err(DecodeError::NonFiniteIndex {
                slot,
                value: raw_index,
            });
        }
        let index = raw_index.round() as i64;
        usize::try_from(index)
            .ok()
            .and_then(|i| self.labels.get(i))
            .ok_or(DecodeError::LabelIndexOutOfRange {
                slot,
                index,
                labels: self.labels.len(),
            })
    }
}
