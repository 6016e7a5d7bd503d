mod snapshot_writer;

use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::Parser;

use facesnap_core::camera::infrastructure::image_directory_source::ImageDirectorySource;
use facesnap_core::detection::domain::inference_engine::InferenceEngine;
use facesnap_core::detection::infrastructure::model_resolver::ModelResolver;
use facesnap_core::detection::infrastructure::onnx_inference_engine::OnnxInferenceEngine;
use facesnap_core::pipeline::infrastructure::threaded_live_executor::{
    LivePipeline, ThreadedLiveExecutor,
};
use facesnap_core::pipeline::pipeline_event::{FreezeTrigger, PipelineEvent, Snapshot};
use facesnap_core::pipeline::pipeline_logger::LogPipelineLogger;
use facesnap_core::shared::config::PipelineConfig;
use facesnap_core::shared::constants::MODEL_NAME;
use facesnap_core::shared::label_table::LabelTable;

use crate::snapshot_writer::SnapshotWriter;

/// Live face detection with debounced snapshot capture, fed from a
/// directory of camera frames.
#[derive(Parser)]
#[command(name = "facesnap")]
struct Cli {
    /// Directory of images replayed as camera frames.
    frames: PathBuf,

    /// Detection model file (skips cache lookup and download).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Directory searched for a bundled model after the cache.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Download URL used when the model is not found locally.
    #[arg(long)]
    model_url: Option<String>,

    /// Label file, one label per line.
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Pipeline configuration (JSON). Missing fields use defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Display rotation reported by the device: 0, 90, 180 or 270.
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    display_rotation: i32,

    /// Delay between frames in milliseconds.
    #[arg(long, default_value = "33")]
    interval_ms: u64,

    /// Replay the frame directory this many times.
    #[arg(long, default_value = "1")]
    repeat: usize,

    /// Consecutive face frames required to freeze (overrides the config file).
    #[arg(long)]
    threshold: Option<u32>,

    /// Request a manual capture after this many predictions.
    #[arg(long)]
    capture_after: Option<u64>,

    /// Directory snapshots are written to.
    #[arg(long, default_value = "snapshots")]
    output: PathBuf,

    /// Snapshot save decision: always or never.
    #[arg(long, default_value = "always")]
    save: String,

    /// JPEG quality for saved snapshots (1-100).
    #[arg(long, default_value = "90")]
    jpeg_quality: u8,

    /// Stop after this many snapshots.
    #[arg(long)]
    max_snapshots: Option<usize>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = load_config(&cli)?;
    let labels = match &cli.labels {
        Some(path) => LabelTable::load(path)?,
        None => LabelTable::default(),
    };
    let engine = build_engine(&cli, &config)?;

    let source = ImageDirectorySource::open(&cli.frames, cli.display_rotation)
        .map_err(|e| e as Box<dyn std::error::Error>)?
        .with_interval(Duration::from_millis(cli.interval_ms))
        .with_repeat(cli.repeat);

    let pipeline = ThreadedLiveExecutor::new().start(
        Box::new(source),
        &config,
        engine,
        labels,
        Box::new(LogPipelineLogger::default()),
    )?;

    let mut writer = if cli.save == "always" {
        Some(SnapshotWriter::new(&cli.output, cli.jpeg_quality)?)
    } else {
        None
    };
    let snapshots = present(&pipeline, &cli, writer.as_mut())?;

    let stats = pipeline.join()?;
    log::info!(
        "Done: {} frames read, {} dropped, {snapshots} snapshots",
        stats.frames_read,
        stats.dropped_frames
    );
    Ok(())
}

/// Plays the presentation role: reports predictions, decides on each
/// freeze, and resumes streaming.
fn present(
    pipeline: &LivePipeline,
    cli: &Cli,
    mut writer: Option<&mut SnapshotWriter>,
) -> Result<usize, Box<dyn std::error::Error>> {
    let control = pipeline.control();
    let mut predictions = 0u64;
    let mut snapshots = 0usize;

    for event in pipeline.events().iter() {
        match event {
            PipelineEvent::PredictionUpdated { label, score } => {
                predictions += 1;
                if label.is_empty() {
                    log::debug!("No detection");
                } else {
                    log::info!("{score:.2} {label}");
                }
                if cli.capture_after == Some(predictions) && control.request_capture() {
                    log::info!("Manual capture requested");
                }
            }
            PipelineEvent::FpsSample(fps) => log::info!("{fps:.1} fps"),
            PipelineEvent::FreezeRequested {
                snapshot, trigger, ..
            } => {
                control.acknowledge_freeze();
                snapshots += 1;
                save_snapshot(&snapshot, trigger, writer.as_deref_mut())?;

                if cli.max_snapshots.is_some_and(|max| snapshots >= max) {
                    pipeline.stop();
                    break;
                }
                control.resume();
            }
        }
    }
    Ok(snapshots)
}

fn save_snapshot(
    snapshot: &Snapshot,
    trigger: FreezeTrigger,
    writer: Option<&mut SnapshotWriter>,
) -> Result<(), Box<dyn std::error::Error>> {
    match writer {
        Some(writer) => {
            let path = writer.write(snapshot)?;
            log::info!("Saved {trigger:?} snapshot to {}", path.display());
        }
        None => log::info!("Discarded {trigger:?} snapshot"),
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(threshold) = cli.threshold {
        config.debounce_threshold = threshold;
    }
    config.validate()?;
    Ok(config)
}

fn build_engine(
    cli: &Cli,
    config: &PipelineConfig,
) -> Result<Box<dyn InferenceEngine>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {MODEL_NAME}");
    let model_path = ModelResolver::new(MODEL_NAME)
        .with_explicit_path(cli.model.clone())
        .with_bundled_dir(cli.model_dir.clone().or_else(bundled_model_dir))
        .with_download_url(cli.model_url.clone())
        .resolve()?;
    Ok(Box::new(OnnxInferenceEngine::new(&model_path, config)?))
}

/// `models/` next to the executable.
fn bundled_model_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("models")))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.frames.is_dir() {
        return Err(format!("Frame directory not found: {}", cli.frames.display()).into());
    }
    if let Some(model) = &cli.model {
        check_file("Model", model)?;
    }
    if let Some(labels) = &cli.labels {
        check_file("Label file", labels)?;
    }
    if let Some(config) = &cli.config {
        check_file("Config file", config)?;
    }
    if cli.save != "always" && cli.save != "never" {
        return Err(format!("Save must be 'always' or 'never', got '{}'", cli.save).into());
    }
    if !(1..=100).contains(&cli.jpeg_quality) {
        return Err(format!(
            "JPEG quality must be between 1 and 100, got {}",
            cli.jpeg_quality
        )
        .into());
    }
    if cli.repeat == 0 {
        return Err("Repeat must be at least 1".into());
    }
    if cli.max_snapshots == Some(0) {
        return Err("Max snapshots must be at least 1".into());
    }
    Ok(())
}

fn check_file(what: &str, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if path.is_file() {
        Ok(())
    } else {
        Err(format!("{what} not found: {}", path.display()).into())
    }
}
