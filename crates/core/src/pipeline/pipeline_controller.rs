use std::time::Instant;

use crossbeam_channel::Sender;

use crate::detection::domain::inference_engine::InferenceEngine;
use crate::detection::domain::prediction_decoder::PredictionDecoder;
use crate::detection::domain::preprocessor::Preprocessor;
use crate::detection::domain::ranker;
use crate::detection::domain::stability_tracker::{StabilityOutcome, StabilityTracker};
use crate::pipeline::fps_meter::{Clock, FpsMeter, MonotonicClock};
use crate::pipeline::pipeline_event::{FreezeTrigger, PipelineEvent, Snapshot};
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::pipeline::pipeline_state::PipelineControl;
use crate::shared::config::{ConfigError, PipelineConfig};
use crate::shared::frame::RawFrame;
use crate::shared::label_table::LabelTable;
use crate::shared::prediction::Prediction;

/// What happened to one frame handed to the controller.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    /// The pipeline is not streaming; the frame was accepted and discarded.
    Paused,
    /// A pending capture request froze the pipeline on this frame.
    Captured,
    /// Inference failed or returned the wrong number of candidates; the frame
    /// was skipped and no state changed.
    Skipped,
    Processed {
        prediction: Option<Prediction>,
        stability: StabilityOutcome,
    },
}

/// Runs one frame through preprocess → infer → decode → rank → debounce and
/// reports the results as [`PipelineEvent`]s.
///
/// Owned by a single worker; only the [`PipelineControl`] is shared.
pub struct PipelineController {
    preprocessor: Preprocessor,
    engine: Box<dyn InferenceEngine>,
    decoder: PredictionDecoder,
    tracker: StabilityTracker,
    fps: FpsMeter,
    fps_window: u32,
    candidate_count: usize,
    tensor_size: (u32, u32),
    clock: Box<dyn Clock>,
    control: PipelineControl,
    events: Sender<PipelineEvent>,
    logger: Box<dyn PipelineLogger>,
}

impl PipelineController {
    pub fn new(
        config: &PipelineConfig,
        engine: Box<dyn InferenceEngine>,
        labels: LabelTable,
        control: PipelineControl,
        events: Sender<PipelineEvent>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let decoder = PredictionDecoder::new(labels);
        for label in [&config.positive_label, &config.negative_label] {
            if !decoder.labels().contains(label) {
                log::warn!("Label '{label}' is not in the model's label table");
            }
        }

        let clock: Box<dyn Clock> = Box::new(MonotonicClock::new());
        Ok(Self {
            preprocessor: Preprocessor::new(config),
            engine,
            decoder,
            tracker: StabilityTracker::new(config),
            fps: FpsMeter::new(config.fps_window, clock.now_ms()),
            fps_window: config.fps_window,
            candidate_count: config.candidate_count,
            tensor_size: (config.input_width, config.input_height),
            clock,
            control,
            events,
            logger: Box::new(NullPipelineLogger),
        })
    }

    /// Replaces the time source; FPS measurement restarts from its current time.
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.fps = FpsMeter::new(self.fps_window, clock.now_ms());
        self.clock = clock;
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn control(&self) -> &PipelineControl {
        &self.control
    }

    pub fn stability_counter(&self) -> u32 {
        self.tracker.counter()
    }

    pub fn logger_mut(&mut self) -> &mut dyn PipelineLogger {
        self.logger.as_mut()
    }

    pub fn process_frame(&mut self, frame: RawFrame) -> FrameOutcome {
        if !self.control.is_streaming() {
            log::trace!("Frame {} ignored while {:?}", frame.sequence(), self.control.state());
            return FrameOutcome::Paused;
        }

        if self.control.take_capture_request() {
            return if self.freeze(&frame, FreezeTrigger::Manual) {
                FrameOutcome::Captured
            } else {
                FrameOutcome::Paused
            };
        }

        let started = Instant::now();
        let tensor = self.preprocessor.process(&frame);
        self.logger.timing("preprocess", elapsed_ms(started));

        let started = Instant::now();
        let expected = self.candidate_count;
        let predicted = self
            .engine
            .predict(tensor)
            .and_then(|output| output.require_candidates(expected));
        let output = match predicted {
            Ok(output) => output,
            Err(e) => {
                log::warn!("Skipping frame {}: {e}", frame.sequence());
                self.logger.count("inference_errors", 1);
                return FrameOutcome::Skipped;
            }
        };
        self.logger.timing("inference", elapsed_ms(started));

        log::trace!("Model reports {} detections", output.reported_count());
        let started = Instant::now();
        let candidates = self.decoder.decode(&output);
        let best = ranker::select(&candidates).cloned();
        self.logger.timing("decode", elapsed_ms(started));

        let (label, score) = best
            .as_ref()
            .map(|p| (p.label.clone(), p.score))
            .unwrap_or_default();
        log::debug!("Frame {}: {score:.2} {label}", frame.sequence());
        self.emit(PipelineEvent::PredictionUpdated { label, score });

        let stability = self.tracker.observe(best.as_ref());
        if stability == StabilityOutcome::FreezeRequested {
            self.freeze(&frame, FreezeTrigger::Stability);
        }

        if let Some(fps) = self.fps.tick(self.clock.now_ms()) {
            log::debug!(
                "FPS: {fps:.2} with tensor size {} x {}",
                self.tensor_size.0,
                self.tensor_size.1
            );
            self.emit(PipelineEvent::FpsSample(fps));
        }
        self.logger.frame_processed(frame.sequence());

        FrameOutcome::Processed {
            prediction: best,
            stability,
        }
    }

    /// Emits the end-of-run summary through the configured logger.
    pub fn finish(&self) {
        self.logger.summary();
    }

    fn freeze(&mut self, frame: &RawFrame, trigger: FreezeTrigger) -> bool {
        if !self.control.freeze() {
            return false;
        }
        self.tracker.reset();
        log::info!("Freezing on frame {} ({trigger:?})", frame.sequence());
        self.emit(PipelineEvent::FreezeRequested {
            snapshot: Snapshot::from_frame(frame),
            rotation: frame.rotation(),
            trigger,
        });
        true
    }

    fn emit(&self, event: PipelineEvent) {
        if self.events.send(event).is_err() {
            log::debug!("Event receiver dropped; event discarded");
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
