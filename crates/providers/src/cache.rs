//! Model file caching.
//!
//! The embedding model is prepared ahead of time (`deepresearch prepare-model`)
//! or fetched from HuggingFace Hub on first load.

use std::path::PathBuf;

use deepresearch_config::ModelConfig;

/// Files required to load a sentence-transformers BERT model.
pub const MODEL_FILES: &[&str] = &["config.json", "tokenizer.json", "model.safetensors"];

/// Model cache location.
#[derive(Debug, Clone)]
pub struct ModelCache {
    /// Cache directory path
    pub cache_dir: PathBuf,
    /// Model repository ID
    pub repo_id: String,
}

impl ModelCache {
    pub fn new(cache_dir: impl Into<PathBuf>, repo_id: impl Into<String>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            repo_id: repo_id.into(),
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(config.cache_dir.clone(), config.repo_id.clone())
    }

    /// Directory holding this model's files, e.g.
    /// `models--sentence-transformers--all-MiniLM-L6-v2`.
    pub fn model_dir(&self) -> PathBuf {
        self.cache_dir
            .join(format!("models--{}", self.repo_id.replace('/', "--")))
    }

    /// Check if all model files are cached
    pub fn is_cached(&self) -> bool {
        let model_dir = self.model_dir();
        MODEL_FILES.iter().all(|f| model_dir.join(f).exists())
    }

    /// Required files that are not on disk yet.
    pub fn missing_files(&self) -> Vec<&'static str> {
        let model_dir = self.model_dir();
        MODEL_FILES
            .iter()
            .copied()
            .filter(|f| !model_dir.join(f).exists())
            .collect()
    }

    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.model_dir().join(filename)
    }

    pub fn paths(&self) -> ModelPaths {
        ModelPaths {
            config: self.file_path("config.json"),
            tokenizer: self.file_path("tokenizer.json"),
            weights: self.file_path("model.safetensors"),
        }
    }
}

/// Paths to model files
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

/// What [`prepare_model`] did.
#[cfg(feature = "local")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prepared {
    AlreadyCached(PathBuf),
    Downloaded(PathBuf),
}

/// Make sure the model files are in the cache, downloading what is missing.
#[cfg(feature = "local")]
pub fn prepare_model(cache: &ModelCache) -> Result<Prepared, deepresearch_core::ResearchError> {
    if cache.is_cached() {
        tracing::debug!(path = %cache.model_dir().display(), "Using cached model");
        return Ok(Prepared::AlreadyCached(cache.model_dir()));
    }

    tracing::info!(repo = %cache.repo_id, "Downloading model files...");
    download_model_files(cache)?;
    Ok(Prepared::Downloaded(cache.model_dir()))
}

/// Get or download model files.
#[cfg(feature = "local")]
pub fn get_or_download_model(
    cache: &ModelCache,
) -> Result<ModelPaths, deepresearch_core::ResearchError> {
    prepare_model(cache)?;
    Ok(cache.paths())
}

#[cfg(feature = "local")]
fn download_model_files(cache: &ModelCache) -> Result<(), deepresearch_core::ResearchError> {
    use deepresearch_core::ResearchError;
    use hf_hub::api::sync::Api;

    let api = Api::new().map_err(|e| {
        ResearchError::Download(format!("Failed to initialize HuggingFace Hub API: {e}"))
    })?;
    let repo = api.model(cache.repo_id.clone());

    std::fs::create_dir_all(cache.model_dir())
        .map_err(|e| ResearchError::Download(format!("Failed to create cache dir: {e}")))?;

    for filename in cache.missing_files() {
        tracing::info!(file = filename, "Downloading...");
        let source_path = repo
            .get(filename)
            .map_err(|e| ResearchError::Download(format!("{filename}: {e}")))?;

        let dest_path = cache.file_path(filename);
        std::fs::copy(&source_path, &dest_path)
            .map_err(|e| ResearchError::Download(format!("{filename}: {e}")))?;
        tracing::debug!(file = filename, dest = %dest_path.display(), "Downloaded");
    }

    Ok(())
}
