use crate::shared::config::{PipelineConfig, UnknownLabelPolicy};
use crate::shared::prediction::Prediction;

/// Debounce phase derived from the consecutive-positive counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StabilityPhase {
    Idle,
    Accumulating(u32),
}

/// Result of feeding one frame's prediction to the tracker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StabilityOutcome {
    /// Counter is zero after this frame.
    Idle,
    /// Counter advanced (or held) below the threshold.
    Accumulating(u32),
    /// Threshold reached on this frame; the counter has already been reset.
    FreezeRequested,
}

/// Counts consecutive positive detections and fires once at the threshold.
///
/// The counter lives in `[0, threshold)` between calls: reaching the
/// threshold resets it in the same call that reports `FreezeRequested`.
pub struct StabilityTracker {
    counter: u32,
    threshold: u32,
    positive_label: String,
    negative_label: String,
    unknown_label_policy: UnknownLabelPolicy,
}

impl StabilityTracker {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            counter: 0,
            threshold: config.debounce_threshold.max(1),
            positive_label: config.positive_label.clone(),
            negative_label: config.negative_label.clone(),
            unknown_label_policy: config.unknown_label_policy,
        }
    }

    pub fn observe(&mut self, prediction: Option<&Prediction>) -> StabilityOutcome {
        match prediction {
            Some(p) if p.label == self.positive_label => {
                self.counter += 1;
                if self.counter >= self.threshold {
                    self.counter = 0;
                    return StabilityOutcome::FreezeRequested;
                }
            }
            Some(p) if p.label == self.negative_label => self.counter = 0,
            None => self.counter = 0,
            Some(p) => match self.unknown_label_policy {
                UnknownLabelPolicy::Hold => {
                    log::trace!("Label '{}' leaves stability counter at {}", p.label, self.counter)
                }
                UnknownLabelPolicy::Reset => self.counter = 0,
            },
        }
        self.outcome()
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn phase(&self) -> StabilityPhase {
        match self.counter {
            0 => StabilityPhase::Idle,
            n => StabilityPhase::Accumulating(n),
        }
    }

    fn outcome(&self) -> StabilityOutcome {
        match self.phase() {
            StabilityPhase::Idle => StabilityOutcome::Idle,
            StabilityPhase::Accumulating(n) => StabilityOutcome::Accumulating(n),
        }
    }
}
