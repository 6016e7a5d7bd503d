use std::fs;
use std::path::Path;

use crate::shared::config::ConfigError;
use crate::shared::constants::{DEFAULT_NEGATIVE_LABEL, DEFAULT_POSITIVE_LABEL};

/// Class-index → label lookup for a loaded model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    pub fn new(labels: Vec<String>) -> Result<Self, ConfigError> {
        if labels.is_empty() {
            return Err(ConfigError::EmptyLabelTable);
        }
        Ok(Self { labels })
    }

    /// Parses one label per line. Surrounding whitespace and blank lines are
    /// ignored.
    pub fn from_lines(text: &str) -> Result<Self, ConfigError> {
        let labels = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self::new(labels)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_lines(&text)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self {
            labels: vec![
                DEFAULT_POSITIVE_LABEL.to_string(),
                DEFAULT_NEGATIVE_LABEL.to_string(),
            ],
        }
    }
}
