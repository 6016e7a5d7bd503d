use std::time::Instant;

/// Millisecond time source, injectable so frame timing can be tested.
pub trait Clock: Send {
    fn now_ms(&self) -> u64;
}

/// Wall clock measured from construction.
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Rolling frame-rate estimate sampled once every `window` frames.
///
/// `fps = 1000 * window / elapsed_ms`, where `elapsed_ms` runs from the
/// previous sample (or from `start`).
pub struct FpsMeter {
    window: u32,
    frames: u32,
    last_sample_ms: u64,
}

impl FpsMeter {
    pub fn new(window: u32, start_ms: u64) -> Self {
        Self {
            window: window.max(1),
            frames: 0,
            last_sample_ms: start_ms,
        }
    }

    /// Records one processed frame. Returns a sample when the window closes.
    ///
    /// A window that closes with zero elapsed time has no meaningful rate and
    /// yields `None`; counting still restarts.
    pub fn tick(&mut self, now_ms: u64) -> Option<f64> {
        self.frames += 1;
        if self.frames < self.window {
            return None;
        }
        self.frames = 0;
        let elapsed = now_ms.saturating_sub(self.last_sample_ms);
        self.last_sample_ms = now_ms;
        if elapsed == 0 {
            log::debug!("FPS window closed with no elapsed time");
            return None;
        }
        Some(1000.0 * self.window as f64 / elapsed as f64)
    }
}
