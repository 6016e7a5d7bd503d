use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Whether live analysis runs, and where a captured snapshot stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
    Streaming = 0,
    Frozen = 1,
    AwaitingSaveDecision = 2,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PipelineState::Frozen,
            2 => PipelineState::AwaitingSaveDecision,
            _ => PipelineState::Streaming,
        }
    }
}

/// Cross-context handle on the pipeline's state.
///
/// The worker reads it at the top of every frame cycle; the presentation
/// layer writes it (freeze acknowledgement, resume, capture request).
/// Cloning shares the same underlying state.
#[derive(Clone, Debug)]
pub struct PipelineControl {
    state: Arc<AtomicU8>,
    capture_requested: Arc<AtomicBool>,
}

impl PipelineControl {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(PipelineState::Streaming as u8)),
            capture_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_streaming(&self) -> bool {
        self.state() == PipelineState::Streaming
    }

    /// `Streaming → Frozen`. Returns false if the pipeline was not streaming.
    pub fn freeze(&self) -> bool {
        self.transition(PipelineState::Streaming, PipelineState::Frozen)
    }

    /// `Frozen → AwaitingSaveDecision`, once the user has seen the snapshot.
    pub fn acknowledge_freeze(&self) -> bool {
        self.transition(PipelineState::Frozen, PipelineState::AwaitingSaveDecision)
    }

    /// Back to `Streaming` from any state. Clears a pending capture request.
    pub fn resume(&self) {
        self.capture_requested.store(false, Ordering::Release);
        self.state
            .store(PipelineState::Streaming as u8, Ordering::Release);
    }

    /// Asks the worker to freeze on the next frame it takes, without waiting
    /// for the stability threshold. Ignored unless streaming.
    pub fn request_capture(&self) -> bool {
        if !self.is_streaming() {
            return false;
        }
        self.capture_requested.store(true, Ordering::Release);
        true
    }

    /// Consumes a pending capture request.
    pub(crate) fn take_capture_request(&self) -> bool {
        self.capture_requested.swap(false, Ordering::AcqRel)
    }

    fn transition(&self, from: PipelineState, to: PipelineState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for PipelineControl {
    fn default() -> Self {
        Self::new()
    }
}
