use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;

use facesnap_core::pipeline::pipeline_event::Snapshot;

/// Writes frozen snapshots as numbered, upright JPEG files.
pub struct SnapshotWriter {
    dir: PathBuf,
    quality: u8,
    next_index: usize,
}

impl SnapshotWriter {
    pub fn new(dir: &Path, quality: u8) -> Result<Self, Box<dyn std::error::Error>> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            quality,
            next_index: 0,
        })
    }

    pub fn write(&mut self, snapshot: &Snapshot) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let img = snapshot
            .upright()
            .ok_or("Snapshot buffer does not match its dimensions")?;
        let path = self.dir.join(format!("snapshot_{:04}.jpg", self.next_index));
        let file = BufWriter::new(File::create(&path)?);
        JpegEncoder::new_with_quality(file, self.quality).encode_image(&img)?;
        self.next_index += 1;
        Ok(path)
    }
}
