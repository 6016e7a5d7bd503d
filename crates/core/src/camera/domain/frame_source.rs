/// One frame as delivered by a camera callback.
///
/// `ready == false` means the source had nothing usable this time (e.g. the
/// preview surface was not yet valid); such frames are skipped silently.
#[derive(Clone, Debug)]
pub struct CameraFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp_ms: u64,
    pub ready: bool,
}

impl CameraFrame {
    pub fn ready(data: Vec<u8>, width: u32, height: u32, timestamp_ms: u64) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ms,
            ready: true,
        }
    }

    pub fn not_ready(timestamp_ms: u64) -> Self {
        Self {
            data: Vec::new(),
            width: 0,
            height: 0,
            timestamp_ms,
            ready: false,
        }
    }
}

/// Supplies camera frames to the pipeline.
///
/// The display rotation is read once at setup and validated there; it is
/// not re-checked per frame.
pub trait FrameSource: Send {
    /// Display rotation in degrees as reported by the device.
    fn display_rotation(&self) -> i32;

    /// Frames in delivery order. The iterator ends when the source closes.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<CameraFrame, Box<dyn std::error::Error + Send + Sync>>> + '_>;

    /// Releases any resources held by the source.
    fn close(&mut self);
}
