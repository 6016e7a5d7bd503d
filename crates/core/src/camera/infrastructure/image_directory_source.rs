use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::camera::domain::frame_source::{CameraFrame, FrameSource};
use crate::shared::constants::IMAGE_EXTENSIONS;

type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Plays a directory of still images as a camera stream.
///
/// Files are delivered in file-name order, decoded with the `image` crate,
/// and paced by a fixed interval to mimic a live sensor.
pub struct ImageDirectorySource {
    paths: Vec<PathBuf>,
    display_rotation: i32,
    interval: Duration,
    repeat: usize,
}

impl ImageDirectorySource {
    pub fn open(dir: &Path, display_rotation: i32) -> Result<Self, SourceError> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image(p))
            .collect();
        paths.sort();
        if paths.is_empty() {
            return Err(format!("No images found in {}", dir.display()).into());
        }
        log::info!("Replaying {} images from {}", paths.len(), dir.display());
        Ok(Self {
            paths,
            display_rotation,
            interval: Duration::ZERO,
            repeat: 1,
        })
    }

    /// Delay between consecutive frames.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Plays the whole directory this many times.
    pub fn with_repeat(mut self, repeat: usize) -> Self {
        self.repeat = repeat.max(1);
        self
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageDirectorySource {
    fn display_rotation(&self) -> i32 {
        self.display_rotation
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<CameraFrame, SourceError>> + '_> {
        let start = Instant::now();
        let interval = self.interval;
        let total = self.paths.len() * self.repeat;
        Box::new(
            self.paths
                .iter()
                .cycle()
                .take(total)
                .enumerate()
                .map(move |(i, path)| {
                    if i > 0 && !interval.is_zero() {
                        thread::sleep(interval);
                    }
                    load_frame(path, start.elapsed().as_millis() as u64)
                }),
        )
    }

    fn close(&mut self) {
        self.paths.clear();
    }
}

fn load_frame(path: &Path, timestamp_ms: u64) -> Result<CameraFrame, SourceError> {
    let img = image::open(path)
        .map_err(|e| format!("Failed to decode {}: {e}", path.display()))?
        .to_rgb8();
    let (width, height) = img.dimensions();
    Ok(CameraFrame::ready(
        img.into_raw(),
        width,
        height,
        timestamp_ms,
    ))
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_image(dir: &Path, name: &str, width: u32, height: u32, value: u8) {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([value, value, value]));
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_frames_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "b.png", 4, 2, 20);
        write_image(dir.path(), "a.png", 4, 2, 10);
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let mut source = ImageDirectorySource::open(dir.path(), 90).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.display_rotation(), 90);

        let frames: Vec<CameraFrame> = source.frames().map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data[0], 10);
        assert_eq!(frames[1].data[0], 20);
        assert_eq!((frames[0].width, frames[0].height), (4, 2));
        assert_eq!(frames[0].data.len(), 4 * 2 * 3);
        assert!(frames.iter().all(|f| f.ready));
    }

    #[test]
    fn test_repeat_cycles_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "a.png", 2, 2, 1);
        write_image(dir.path(), "b.png", 2, 2, 2);

        let mut source = ImageDirectorySource::open(dir.path(), 0)
            .unwrap()
            .with_repeat(3);
        let values: Vec<u8> = source.frames().map(|f| f.unwrap().data[0]).collect();
        assert_eq!(values, vec![1, 2, 1, 2, 1, 2]);
    }

    #[test]
    fn test_empty_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ImageDirectorySource::open(dir.path(), 0).is_err());
    }

    #[test]
    fn test_corrupt_image_yields_error_item() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.png"), b"not a png").unwrap();
        let mut source = ImageDirectorySource::open(dir.path(), 0).unwrap();
        let first = source.frames().next().unwrap();
        assert!(first.is_err());
    }

    #[test]
    fn test_is_image_case_insensitive() {
        assert!(is_image(Path::new("x.JPG")));
        assert!(!is_image(Path::new("x.onnx")));
        assert!(!is_image(Path::new("noext")));
    }
}
