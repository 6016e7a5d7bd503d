use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for per-frame pipeline diagnostics.
///
/// Keeps the controller free of any particular output mechanism; the CLI
/// logs through the `log` facade, tests and embedders can stay silent.
pub trait PipelineLogger: Send {
    /// A frame went through the full detection path.
    fn frame_processed(&mut self, sequence: u64);

    /// Duration of a named stage (`preprocess`, `inference`, `decode`) for
    /// one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Increments a named counter (e.g. `dropped_frames`, `inference_errors`).
    fn count(&mut self, name: &str, amount: u64);

    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn frame_processed(&mut self, _sequence: u64) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn count(&mut self, _name: &str, _amount: u64) {}
    fn info(&mut self, _message: &str) {}
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StageStats {
    pub samples: u64,
    pub total_ms: f64,
    pub max_ms: f64,
}

impl StageStats {
    pub fn average_ms(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.total_ms / self.samples as f64
        }
    }

    fn record(&mut self, duration_ms: f64) {
        self.samples += 1;
        self.total_ms += duration_ms;
        self.max_ms = self.max_ms.max(duration_ms);
    }
}

/// Aggregates stage timings and counters, reporting through `log`.
///
/// Stage timings are logged at trace level per frame; a debug line is
/// written every `report_every` processed frames.
pub struct LogPipelineLogger {
    report_every: u64,
    frames: u64,
    stages: BTreeMap<String, StageStats>,
    counters: BTreeMap<String, u64>,
    start_time: Instant,
}

impl LogPipelineLogger {
    pub fn new(report_every: u64) -> Self {
        Self {
            report_every: report_every.max(1),
            frames: 0,
            stages: BTreeMap::new(),
            counters: BTreeMap::new(),
            start_time: Instant::now(),
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn stage(&self, name: &str) -> Option<&StageStats> {
        self.stages.get(name)
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.frames == 0 && self.stages.is_empty() && self.counters.is_empty() {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Pipeline summary ({} frames, {elapsed_s:.1}s):",
            self.frames
        )];
        for (name, stats) in &self.stages {
            lines.push(format!(
                "  {name:12}: avg {:6.1}ms  max {:6.1}ms  ({} samples)",
                stats.average_ms(),
                stats.max_ms,
                stats.samples
            ));
        }
        for (name, value) in &self.counters {
            lines.push(format!("  {name}: {value}"));
        }
        Some(lines.join("\n"))
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn frame_processed(&mut self, sequence: u64) {
        self.frames += 1;
        if self.frames % self.report_every == 0 {
            log::debug!("Processed {} frames (latest #{sequence})", self.frames);
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        log::trace!("{stage}: {duration_ms:.2}ms");
        self.stages
            .entry(stage.to_string())
            .or_default()
            .record(duration_ms);
    }

    fn count(&mut self, name: &str, amount: u64) {
        *self.counters.entry(name.to_string()).or_default() += amount;
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
