use ndarray::Array4;

use crate::detection::domain::inference_engine::NormalizedTensor;
use crate::shared::config::PipelineConfig;
use crate::shared::frame::{RawFrame, CHANNELS};
use crate::shared::rotation::Rotation;

/// Turns a raw RGB frame into the model's `[1, H, W, 3]` input.
///
/// Steps, in order: bilinear resize (stretching, no crop), clockwise
/// rotation by the frame's preprocessing rotation, then per-channel
/// `(value - mean) / std`. The resize target is chosen so that the rotated
/// result always has the configured `W x H`.
pub struct Preprocessor {
    width: usize,
    height: usize,
    mean: f32,
    std: f32,
}

impl Preprocessor {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            width: config.input_width as usize,
            height: config.input_height as usize,
            mean: config.mean,
            std: config.std,
        }
    }

    pub fn process(&self, frame: &RawFrame) -> NormalizedTensor {
        let src = frame.as_ndarray();
        let src_w = frame.width() as usize;
        let src_h = frame.height() as usize;
        let rotation = frame.rotation();

        // Size of the resized image before it is rotated into place.
        let (rw, rh) = if rotation.swaps_axes() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        };

        let mut tensor = Array4::<f32>::zeros((1, self.height, self.width, CHANNELS));
        if src_w == 0 || src_h == 0 {
            return NormalizedTensor::from_array(tensor);
        }

        for y in 0..self.height {
            for x in 0..self.width {
                let (u, v) = unrotate(x, y, rw, rh, rotation);
                let (x0, x1, wx) = sample_axis(u, rw, src_w);
                let (y0, y1, wy) = sample_axis(v, rh, src_h);
                for c in 0..CHANNELS {
                    let top = lerp(src[[y0, x0, c]], src[[y0, x1, c]], wx);
                    let bottom = lerp(src[[y1, x0, c]], src[[y1, x1, c]], wx);
                    let value = top + (bottom - top) * wy;
                    tensor[[0, y, x, c]] = (value - self.mean) / self.std;
                }
            }
        }

        NormalizedTensor::from_array(tensor)
    }
}

/// Maps a destination pixel of the rotated image back to the un-rotated
/// `rw x rh` image.
fn unrotate(x: usize, y: usize, rw: usize, rh: usize, rotation: Rotation) -> (usize, usize) {
    match rotation {
        Rotation::Deg0 => (x, y),
        Rotation::Deg90 => (y, rh - 1 - x),
        Rotation::Deg180 => (rw - 1 - x, rh - 1 - y),
        Rotation::Deg270 => (rw - 1 - y, x),
    }
}

/// Half-pixel-centered source coordinate for bilinear sampling along one
/// axis: returns the two neighbouring source indices and the blend weight.
fn sample_axis(dst: usize, dst_len: usize, src_len: usize) -> (usize, usize, f32) {
    let pos = (dst as f32 + 0.5) * src_len as f32 / dst_len as f32 - 0.5;
    let pos = pos.clamp(0.0, (src_len - 1) as f32);
    let i0 = pos.floor() as usize;
    let i1 = (i0 + 1).min(src_len - 1);
    (i0, i1, pos - i0 as f32)
}

fn lerp(a: u8, b: u8, t: f32) -> f32 {
    a as f32 + (b as f32 - a as f32) * t
}
