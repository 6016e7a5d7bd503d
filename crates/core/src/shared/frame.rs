use ndarray::ArrayView3;
use thiserror::Error;

use crate::shared::rotation::Rotation;

/// Number of interleaved channels in every frame (RGB).
pub const CHANNELS: usize = 3;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame {width}x{height} needs {expected} bytes, got {actual}")]
    DataLength {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// One camera frame: contiguous RGB bytes in row-major order, stamped with
/// the rotation that makes it upright and its capture time.
///
/// Owned by the pipeline for a single processing cycle.
#[derive(Clone, Debug)]
pub struct RawFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    rotation: Rotation,
    timestamp_ms: u64,
    sequence: u64,
}

impl RawFrame {
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        rotation: Rotation,
        timestamp_ms: u64,
        sequence: u64,
    ) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            rotation,
            timestamp_ms,
            sequence,
        }
    }

    /// Checked constructor for buffers handed over by a frame source.
    pub fn try_new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        rotation: Rotation,
        timestamp_ms: u64,
        sequence: u64,
    ) -> Result<Self, FrameError> {
        let expected = (width as usize) * (height as usize) * CHANNELS;
        if data.len() != expected {
            return Err(FrameError::DataLength {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self::new(data, width, height, rotation, timestamp_ms, sequence))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Preprocessing rotation (already mapped from the display rotation).
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// Monotonic number assigned by the frame reader; gaps mean frames were
    /// displaced before processing.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, CHANNELS),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }
}
