use crate::shared::frame::RawFrame;
use crate::shared::rotation::Rotation;

/// What caused a freeze.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FreezeTrigger {
    /// The stability threshold was reached.
    Stability,
    /// The presentation layer asked for a capture.
    Manual,
}

/// Pixels of the frame that was on screen when the pipeline froze.
#[derive(Clone, Debug)]
pub struct Snapshot {
    data: Vec<u8>,
    width: u32,
    height: u32,
    rotation: Rotation,
}

impl Snapshot {
    pub fn from_frame(frame: &RawFrame) -> Self {
        Self {
            data: frame.data().to_vec(),
            width: frame.width(),
            height: frame.height(),
            rotation: frame.rotation(),
        }
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

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// The sensor image as captured, without rotation.
    pub fn to_image(&self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// The image rotated clockwise by the snapshot rotation, ready to display.
    pub fn upright(&self) -> Option<image::RgbImage> {
        let img = self.to_image()?;
        Some(match self.rotation {
            Rotation::Deg0 => img,
            Rotation::Deg90 => image::imageops::rotate90(&img),
            Rotation::Deg180 => image::imageops::rotate180(&img),
            Rotation::Deg270 => image::imageops::rotate270(&img),
        })
    }
}

/// Messages from the pipeline worker to the presentation layer, delivered
/// in emission order over a single-consumer channel.
#[derive(Clone, Debug)]
pub enum PipelineEvent {
    /// Best candidate of a processed frame. An empty label with score 0
    /// means the frame produced no usable candidate.
    PredictionUpdated { label: String, score: f32 },
    /// The pipeline froze; the presentation layer should show the snapshot
    /// and ask whether to save it.
    FreezeRequested {
        snapshot: Snapshot,
        rotation: Rotation,
        trigger: FreezeTrigger,
    },
    FpsSample(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_2x1(rotation: Rotation) -> RawFrame {
        // left pixel red, right pixel blue
        RawFrame::new(vec![255, 0, 0, 0, 0, 255], 2, 1, rotation, 0, 0)
    }

    #[test]
    fn test_snapshot_copies_frame() {
        let frame = frame_2x1(Rotation::Deg180);
        let snapshot = Snapshot::from_frame(&frame);
        assert_eq!(snapshot.data(), frame.data());
        assert_eq!((snapshot.width(), snapshot.height()), (2, 1));
        assert_eq!(snapshot.rotation(), Rotation::Deg180);
    }

    #[test]
    fn test_upright_without_rotation_is_unchanged() {
        let img = Snapshot::from_frame(&frame_2x1(Rotation::Deg0))
            .upright()
            .unwrap();
        assert_eq!(img.dimensions(), (2, 1));
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0]);
    }

    #[test]
    fn test_upright_rotates_clockwise() {
        let img = Snapshot::from_frame(&frame_2x1(Rotation::Deg90))
            .upright()
            .unwrap();
        assert_eq!(img.dimensions(), (1, 2));
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(img.get_pixel(0, 1).0, [0, 0, 255]);
    }

    #[test]
    fn test_upright_270() {
        let img = Snapshot::from_frame(&frame_2x1(Rotation::Deg270))
            .upright()
            .unwrap();
        assert_eq!(img.dimensions(), (1, 2));
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 255]);
    }

    #[test]
    fn test_upright_180() {
        let img = Snapshot::from_frame(&frame_2x1(Rotation::Deg180))
            .upright()
            .unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 255]);
        assert_eq!(img.get_pixel(1, 0).0, [255, 0, 0]);
    }
}
