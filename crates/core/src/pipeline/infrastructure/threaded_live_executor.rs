use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use thiserror::Error;

use crate::camera::domain::frame_source::FrameSource;
use crate::detection::domain::inference_engine::{InferenceEngine, InferenceError};
use crate::detection::infrastructure::model_resolver::ModelResolveError;
use crate::pipeline::latest_frame_slot::{
    latest_frame_slot, FramePublisher, FrameSubscriber, PublishOutcome,
};
use crate::pipeline::pipeline_controller::PipelineController;
use crate::pipeline::pipeline_event::PipelineEvent;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::pipeline_state::PipelineControl;
use crate::shared::config::{ConfigError, PipelineConfig};
use crate::shared::frame::RawFrame;
use crate::shared::label_table::LabelTable;
use crate::shared::rotation::Rotation;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    ModelResolve(#[from] ModelResolveError),
    #[error("Frame source failed: {0}")]
    Source(String),
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

/// Counters reported once both threads have finished.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LiveStats {
    /// Ready frames taken from the source.
    pub frames_read: u64,
    /// Frames displaced from the slot before the worker picked them up.
    pub dropped_frames: u64,
}

/// Runs the live pipeline on two dedicated threads.
///
/// Layout: `reader → [latest-frame slot] → worker [controller] → events`
///
/// The reader never blocks on the worker: a frame still waiting in the slot
/// is replaced by the newer one.
pub struct ThreadedLiveExecutor {
    poll_interval: Duration,
}

impl ThreadedLiveExecutor {
    pub fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// How often an idle worker re-checks the cancellation flag.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Validates the setup and starts both threads.
    ///
    /// The display rotation is read from the source once here and mapped to
    /// the preprocessing rotation; an unsupported value fails setup.
    pub fn start(
        &self,
        source: Box<dyn FrameSource>,
        config: &PipelineConfig,
        engine: Box<dyn InferenceEngine>,
        labels: LabelTable,
        logger: Box<dyn PipelineLogger>,
    ) -> Result<LivePipeline, PipelineError> {
        let display = Rotation::from_degrees(source.display_rotation())?;
        let rotation = display.display_to_preprocess();
        log::info!("Display rotation {display}, preprocessing rotation {rotation}");

        let control = PipelineControl::new();
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let controller =
            PipelineController::new(config, engine, labels, control.clone(), events_tx)?
                .with_logger(logger);

        let cancelled = Arc::new(AtomicBool::new(false));
        let dropped = Arc::new(AtomicU64::new(0));
        let (publisher, subscriber) = latest_frame_slot();

        let reader = spawn_reader(
            source,
            publisher,
            rotation,
            cancelled.clone(),
            dropped.clone(),
        );
        let worker = spawn_worker(
            controller,
            subscriber,
            self.poll_interval,
            cancelled.clone(),
            dropped.clone(),
        );

        Ok(LivePipeline {
            control,
            events: events_rx,
            cancelled,
            dropped,
            reader: Some(reader),
            worker: Some(worker),
        })
    }
}

impl Default for ThreadedLiveExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a running pipeline.
///
/// The event channel disconnects once the worker has exited, so iterating
/// [`events`](Self::events) ends with the stream.
pub struct LivePipeline {
    control: PipelineControl,
    events: Receiver<PipelineEvent>,
    cancelled: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
    reader: Option<JoinHandle<Result<u64, String>>>,
    worker: Option<JoinHandle<()>>,
}

impl LivePipeline {
    pub fn control(&self) -> &PipelineControl {
        &self.control
    }

    pub fn events(&self) -> &Receiver<PipelineEvent> {
        &self.events
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Asks both threads to stop. The reader notices after its next frame.
    pub fn stop(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Waits for both threads and reports the first failure.
    pub fn join(mut self) -> Result<LiveStats, PipelineError> {
        self.join_threads()
    }

    fn join_threads(&mut self) -> Result<LiveStats, PipelineError> {
        let mut first_error: Option<PipelineError> = None;
        let mut frames_read = 0;

        if let Some(reader) = self.reader.take() {
            match reader.join() {
                Ok(Ok(count)) => frames_read = count,
                Ok(Err(e)) => first_error = Some(PipelineError::Source(e)),
                Err(_) => first_error = Some(PipelineError::ThreadPanicked("Reader")),
            }
        }

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() && first_error.is_none() {
                first_error = Some(PipelineError::ThreadPanicked("Worker"));
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(LiveStats {
                frames_read,
                dropped_frames: self.dropped_frames(),
            }),
        }
    }
}

impl Drop for LivePipeline {
    fn drop(&mut self) {
        if self.reader.is_none() && self.worker.is_none() {
            return;
        }
        self.stop();
        if let Err(e) = self.join_threads() {
            log::warn!("Live pipeline ended with error: {e}");
        }
    }
}

fn spawn_reader(
    mut source: Box<dyn FrameSource>,
    publisher: FramePublisher,
    rotation: Rotation,
    cancelled: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
) -> JoinHandle<Result<u64, String>> {
    std::thread::spawn(move || {
        let mut sequence = 0u64;
        let result = {
            let mut outcome = Ok(());
            for frame_result in source.frames() {
                if cancelled.load(Ordering::Relaxed) {
                    break;
                }
                let frame = match frame_result {
                    Ok(frame) => frame,
                    Err(e) => {
                        outcome = Err(e.to_string());
                        break;
                    }
                };
                if !frame.ready {
                    continue;
                }

                let raw = match RawFrame::try_new(
                    frame.data,
                    frame.width,
                    frame.height,
                    rotation,
                    frame.timestamp_ms,
                    sequence,
                ) {
                    Ok(raw) => raw,
                    Err(e) => {
                        log::warn!("Skipping malformed camera frame: {e}");
                        continue;
                    }
                };
                sequence += 1;
                if let PublishOutcome::Replaced { dropped_sequence } = publisher.publish(raw) {
                    log::trace!("Dropped frame {dropped_sequence}");
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
            outcome
        };
        source.close();
        result.map(|()| sequence)
    })
}

fn spawn_worker(
    mut controller: PipelineController,
    subscriber: FrameSubscriber,
    poll_interval: Duration,
    cancelled: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        controller.logger_mut().info("Pipeline worker started");
        while !cancelled.load(Ordering::Relaxed) {
            match subscriber.recv_timeout(poll_interval) {
                Ok(frame) => {
                    controller.process_frame(frame);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        controller
            .logger_mut()
            .count("dropped_frames", dropped.load(Ordering::Relaxed));
        controller.finish();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::domain::frame_source::CameraFrame;
    use crate::detection::domain::inference_engine::{NormalizedTensor, RawModelOutput};
    use crate::pipeline::pipeline_event::FreezeTrigger;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::pipeline::pipeline_state::PipelineState;
    use crossbeam_channel::Sender;
    use ndarray::{Array1, Array2, Array3};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    type Item = Result<CameraFrame, Box<dyn std::error::Error + Send + Sync>>;

    const WAIT: Duration = Duration::from_secs(5);

    /// Frames pushed by the test through a channel.
    struct ChannelSource {
        rx: Receiver<Item>,
        rotation: i32,
    }

    impl FrameSource for ChannelSource {
        fn display_rotation(&self) -> i32 {
            self.rotation
        }

        fn frames(&mut self) -> Box<dyn Iterator<Item = Item> + '_> {
            Box::new(self.rx.iter())
        }

        fn close(&mut self) {}
    }

    struct FaceEngine {
        calls: Arc<AtomicUsize>,
        panic: bool,
    }

    impl InferenceEngine for FaceEngine {
        fn predict(&mut self, _tensor: NormalizedTensor) -> Result<RawModelOutput, InferenceError> {
            if self.panic {
                panic!("engine blew up");
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut scores = Array2::zeros((1, 2));
            scores[[0, 0]] = 0.95;
            Ok(RawModelOutput::new(
                Array3::zeros((1, 2, 4)),
                Array2::zeros((1, 2)),
                scores,
                Array1::zeros(1),
            )
            .unwrap())
        }
    }

    // `tx` is declared first so it drops before the pipeline joins the reader.
    struct Running {
        tx: Sender<Item>,
        pipeline: LivePipeline,
        calls: Arc<AtomicUsize>,
    }

    fn start(rotation: i32, panic: bool) -> Result<Running, PipelineError> {
        start_with_logger(rotation, panic, Box::new(NullPipelineLogger))
    }

    fn start_with_logger(
        rotation: i32,
        panic: bool,
        logger: Box<dyn PipelineLogger>,
    ) -> Result<Running, PipelineError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let calls = Arc::new(AtomicUsize::new(0));
        let config = PipelineConfig {
            input_width: 4,
            input_height: 4,
            candidate_count: 2,
            ..Default::default()
        };
        let pipeline = ThreadedLiveExecutor::new()
            .with_poll_interval(Duration::from_millis(5))
            .start(
                Box::new(ChannelSource { rx, rotation }),
                &config,
                Box::new(FaceEngine {
                    calls: calls.clone(),
                    panic,
                }),
                LabelTable::default(),
                logger,
            )?;
        Ok(Running {
            pipeline,
            tx,
            calls,
        })
    }

    fn camera_frame() -> Item {
        Ok(CameraFrame::ready(vec![90u8; 4 * 2 * 3], 4, 2, 0))
    }

    fn next_event(running: &Running) -> PipelineEvent {
        running.pipeline.events().recv_timeout(WAIT).unwrap()
    }

    #[test]
    fn test_unsupported_display_rotation_fails_setup() {
        let result = start(45, false);
        assert!(matches!(
            result,
            Err(PipelineError::Config(ConfigError::InvalidRotation(45)))
        ));
    }

    #[test]
    fn test_freeze_after_stable_run_and_pause() {
        let running = start(90, false).unwrap();
        for _ in 0..5 {
            running.tx.send(camera_frame()).unwrap();
            assert!(matches!(
                next_event(&running),
                PipelineEvent::PredictionUpdated { .. }
            ));
        }
        match next_event(&running) {
            PipelineEvent::FreezeRequested {
                snapshot,
                rotation,
                trigger,
            } => {
                assert_eq!(rotation, Rotation::Deg270);
                assert_eq!(trigger, FreezeTrigger::Stability);
                assert_eq!((snapshot.width(), snapshot.height()), (4, 2));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(running.pipeline.control().state(), PipelineState::Frozen);

        for _ in 0..3 {
            running.tx.send(camera_frame()).unwrap();
        }
        let Running {
            pipeline,
            tx,
            calls,
        } = running;
        drop(tx);
        let stats = pipeline.join().unwrap();
        assert_eq!(stats.frames_read, 8);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_not_ready_frames_are_skipped() {
        let running = start(0, false).unwrap();
        running.tx.send(Ok(CameraFrame::not_ready(0))).unwrap();
        running.tx.send(camera_frame()).unwrap();
        assert!(matches!(
            next_event(&running),
            PipelineEvent::PredictionUpdated { .. }
        ));

        let Running {
            pipeline,
            tx,
            calls,
        } = running;
        drop(tx);
        assert_eq!(pipeline.join().unwrap().frames_read, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_malformed_frame_is_skipped() {
        let running = start(0, false).unwrap();
        running
            .tx
            .send(Ok(CameraFrame::ready(vec![0u8; 5], 4, 2, 0)))
            .unwrap();
        running.tx.send(camera_frame()).unwrap();
        assert!(matches!(
            next_event(&running),
            PipelineEvent::PredictionUpdated { .. }
        ));

        let Running {
            pipeline,
            tx,
            calls,
        } = running;
        drop(tx);
        assert_eq!(pipeline.join().unwrap().frames_read, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_manual_capture_through_handle() {
        let running = start(180, false).unwrap();
        assert!(running.pipeline.control().request_capture());
        running.tx.send(camera_frame()).unwrap();
        match next_event(&running) {
            PipelineEvent::FreezeRequested {
                trigger, rotation, ..
            } => {
                assert_eq!(trigger, FreezeTrigger::Manual);
                assert_eq!(rotation, Rotation::Deg180);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(running.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_source_error_surfaces_on_join() {
        let running = start(0, false).unwrap();
        running.tx.send(Err("sensor unplugged".into())).unwrap();
        let Running { pipeline, tx, .. } = running;
        drop(tx);
        match pipeline.join() {
            Err(PipelineError::Source(message)) => assert!(message.contains("sensor unplugged")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_worker_panic_surfaces_on_join() {
        let running = start(0, true).unwrap();
        running.tx.send(camera_frame()).unwrap();
        let Running { pipeline, tx, .. } = running;
        drop(tx);
        assert!(matches!(
            pipeline.join(),
            Err(PipelineError::ThreadPanicked("Worker"))
        ));
    }

    #[test]
    fn test_stop_ends_both_threads() {
        let running = start(0, false).unwrap();
        running.pipeline.stop();
        // wakes the reader so it can observe the flag
        running.tx.send(camera_frame()).unwrap();
        let Running { pipeline, tx, .. } = running;
        assert!(pipeline.join().is_ok());
        drop(tx);
    }

    #[derive(Default)]
    struct Recorded {
        messages: Vec<String>,
        counters: Vec<(String, u64)>,
        frames: u64,
    }

    struct RecordingLogger(Arc<Mutex<Recorded>>);

    impl PipelineLogger for RecordingLogger {
        fn frame_processed(&mut self, _sequence: u64) {
            self.0.lock().unwrap().frames += 1;
        }
        fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
        fn count(&mut self, name: &str, amount: u64) {
            self.0
                .lock()
                .unwrap()
                .counters
                .push((name.to_string(), amount));
        }
        fn info(&mut self, message: &str) {
            self.0.lock().unwrap().messages.push(message.to_string());
        }
    }

    #[test]
    fn test_worker_reports_through_logger() {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let running =
            start_with_logger(0, false, Box::new(RecordingLogger(recorded.clone()))).unwrap();
        running.tx.send(camera_frame()).unwrap();
        next_event(&running);
        let Running { pipeline, tx, .. } = running;
        drop(tx);
        pipeline.join().unwrap();

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.messages, vec!["Pipeline worker started".to_string()]);
        assert_eq!(recorded.frames, 1);
        assert!(recorded
            .counters
            .iter()
            .any(|(name, _)| name == "dropped_frames"));
    }

    #[test]
    fn test_events_disconnect_when_stream_ends() {
        let running = start(0, false).unwrap();
        running.tx.send(camera_frame()).unwrap();
        let Running { pipeline, tx, .. } = running;
        drop(tx);
        let events: Vec<PipelineEvent> = pipeline.events().iter().collect();
        assert_eq!(events.len(), 1);
        assert!(pipeline.join().is_ok());
    }
}
