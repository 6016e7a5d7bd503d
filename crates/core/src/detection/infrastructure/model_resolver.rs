use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model '{name}' not found (searched: {searched:?})")]
    NotFound { name: String, searched: Vec<PathBuf> },
    #[error("failed to create cache directory {path}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Locates the detection model file.
///
/// Resolution order:
/// 1. Explicit path (if given, nothing else is tried)
/// 2. User cache directory
/// 3. Bundled directory shipped next to the application
/// 4. Download into the cache directory (only when a URL is configured)
pub struct ModelResolver {
    name: String,
    explicit_path: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    bundled_dir: Option<PathBuf>,
    download_url: Option<String>,
}

impl ModelResolver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            explicit_path: None,
            cache_dir: default_cache_dir(),
            bundled_dir: None,
            download_url: None,
        }
    }

    pub fn with_explicit_path(mut self, path: Option<PathBuf>) -> Self {
        self.explicit_path = path;
        self
    }

    pub fn with_cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.cache_dir = dir;
        self
    }

    pub fn with_bundled_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.bundled_dir = dir;
        self
    }

    pub fn with_download_url(mut self, url: Option<String>) -> Self {
        self.download_url = url;
        self
    }

    pub fn resolve(&self) -> Result<PathBuf, ModelResolveError> {
        if let Some(path) = &self.explicit_path {
            return if path.is_file() {
                Ok(path.clone())
            } else {
                Err(self.not_found(vec![path.clone()]))
            };
        }

        let mut searched = Vec::new();
        for dir in [&self.cache_dir, &self.bundled_dir].into_iter().flatten() {
            let candidate = dir.join(&self.name);
            if candidate.is_file() {
                log::debug!("Found model at {}", candidate.display());
                return Ok(candidate);
            }
            searched.push(candidate);
        }

        match (&self.download_url, &self.cache_dir) {
            (Some(url), Some(cache_dir)) => {
                fs::create_dir_all(cache_dir).map_err(|e| ModelResolveError::CacheDir {
                    path: cache_dir.clone(),
                    source: e,
                })?;
                let dest = cache_dir.join(&self.name);
                log::info!("Downloading model {} from {url}", self.name);
                download(url, &dest)?;
                Ok(dest)
            }
            _ => Err(self.not_found(searched)),
        }
    }

    fn not_found(&self, searched: Vec<PathBuf>) -> ModelResolveError {
        ModelResolveError::NotFound {
            name: self.name.clone(),
            searched,
        }
    }
}

/// Platform cache directory for models, e.g. `~/.cache/FaceSnap/models/`.
pub fn default_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("FaceSnap").join("models"))
}

/// Streams `url` into `dest` through a `.part` file so an interrupted
/// download never leaves a truncated model behind.
fn download(url: &str, dest: &Path) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");
    let result = download_to(url, dest, &temp_path);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn download_to(url: &str, dest: &Path, temp_path: &Path) -> Result<(), ModelResolveError> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let write_error = |path: &Path| {
        let path = path.to_path_buf();
        move |e: io::Error| ModelResolveError::Write { path, source: e }
    };

    let mut file = fs::File::create(temp_path).map_err(write_error(temp_path))?;
    io::copy(&mut response, &mut file).map_err(write_error(temp_path))?;
    file.sync_all().map_err(write_error(temp_path))?;
    drop(file);

    fs::rename(temp_path, dest).map_err(write_error(dest))
}
