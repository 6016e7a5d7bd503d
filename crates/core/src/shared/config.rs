use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    DEFAULT_CANDIDATE_COUNT, DEFAULT_DEBOUNCE_THRESHOLD, DEFAULT_FPS_WINDOW,
    DEFAULT_INPUT_HEIGHT, DEFAULT_INPUT_WIDTH, DEFAULT_MEAN, DEFAULT_NEGATIVE_LABEL,
    DEFAULT_POSITIVE_LABEL, DEFAULT_STD,
};

/// Setup-time configuration defects. None of these are raised per frame.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("rotation must be a multiple of 90 degrees, got {0}")]
    InvalidRotation(i32),
    #[error("model input size must be non-zero, got {width}x{height}")]
    ZeroInputSize { width: u32, height: u32 },
    #[error("normalization std must be finite and positive, got {0}")]
    InvalidStd(f32),
    #[error("normalization mean must be finite, got {0}")]
    InvalidMean(f32),
    #[error("candidate count must be at least 1")]
    ZeroCandidates,
    #[error("debounce threshold must be at least 1")]
    ZeroThreshold,
    #[error("fps window must be at least 1 frame")]
    ZeroFpsWindow,
    #[error("positive and negative labels must differ, both are '{0}'")]
    IdenticalLabels(String),
    #[error("label table is empty")]
    EmptyLabelTable,
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid pipeline config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// What the stability tracker does with a label that is neither the
/// positive nor the negative one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownLabelPolicy {
    /// Leave the consecutive-positive counter untouched.
    #[default]
    Hold,
    /// Treat the label like the negative one.
    Reset,
}

/// Immutable pipeline parameters, fixed once the pipeline is built.
///
/// Every field has a default so partial JSON documents deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input_width: u32,
    pub input_height: u32,
    pub mean: f32,
    pub std: f32,
    pub candidate_count: usize,
    pub positive_label: String,
    pub negative_label: String,
    pub debounce_threshold: u32,
    pub fps_window: u32,
    pub unknown_label_policy: UnknownLabelPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_width: DEFAULT_INPUT_WIDTH,
            input_height: DEFAULT_INPUT_HEIGHT,
            mean: DEFAULT_MEAN,
            std: DEFAULT_STD,
            candidate_count: DEFAULT_CANDIDATE_COUNT,
            positive_label: DEFAULT_POSITIVE_LABEL.to_string(),
            negative_label: DEFAULT_NEGATIVE_LABEL.to_string(),
            debounce_threshold: DEFAULT_DEBOUNCE_THRESHOLD,
            fps_window: DEFAULT_FPS_WINDOW,
            unknown_label_policy: UnknownLabelPolicy::Hold,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_width == 0 || self.input_height == 0 {
            return Err(ConfigError::ZeroInputSize {
                width: self.input_width,
                height: self.input_height,
            });
        }
        if !self.mean.is_finite() {
            return Err(ConfigError::InvalidMean(self.mean));
        }
        if !self.std.is_finite() || self.std <= 0.0 {
            return Err(ConfigError::InvalidStd(self.std));
        }
        if self.candidate_count == 0 {
            return Err(ConfigError::ZeroCandidates);
        }
        if self.debounce_threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        if self.fps_window == 0 {
            return Err(ConfigError::ZeroFpsWindow);
        }
        if self.positive_label == self.negative_label {
            return Err(ConfigError::IdenticalLabels(self.positive_label.clone()));
        }
        Ok(())
    }

    /// Expected model input shape `[1, H, W, 3]`.
    pub fn input_shape(&self) -> [usize; 4] {
        [1, self.input_height as usize, self.input_width as usize, 3]
    }
}
