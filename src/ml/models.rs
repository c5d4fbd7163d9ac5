//! Model file management for local embeddings
//!
//! Resolves a model identifier to the files needed for inference: either a
//! local directory that already contains them, or a HuggingFace Hub repo whose
//! files are downloaded once into the cache directory.

use crate::error::{Result, SemchunkError};
use hf_hub::api::sync::ApiBuilder;
use std::path::{Path, PathBuf};

/// Files required to run a BERT-style sentence transformer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    /// Model architecture configuration
    pub config: PathBuf,
    /// Serialized tokenizer
    pub tokenizer: PathBuf,
    /// Safetensors weights
    pub weights: PathBuf,
}

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";

/// Model manager for downloading and caching models
pub struct ModelManager {
    cache_dir: PathBuf,
}

impl ModelManager {
    /// Create new model manager
    pub fn new(cache_dir: Option<PathBuf>) -> Result<Self> {
        let cache_dir = cache_dir.unwrap_or_else(default_cache_dir);
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    /// Get cache directory
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Resolve model files, downloading them from the hub when needed
    pub fn resolve(&self, model: &str) -> Result<ModelFiles> {
        let local = Path::new(model);
        if local.is_dir() {
            log::info!("Loading model from local directory {:?}", local);
            return Self::files_in(local);
        }

        log::info!("Fetching model '{}' from HuggingFace Hub", model);
        let api = ApiBuilder::new()
            .with_cache_dir(self.cache_dir.clone())
            .build()
            .map_err(|e| {
                SemchunkError::MachineLearning(format!("Failed to create HF API: {}", e))
            })?;
        let repo = api.model(model.to_string());

        let fetch = |file: &str| {
            repo.get(file).map_err(|e| {
                SemchunkError::MachineLearning(format!("Failed to download {}/{}: {}", model, file, e))
            })
        };

        let files = ModelFiles {
            config: fetch(CONFIG_FILE)?,
            tokenizer: fetch(TOKENIZER_FILE)?,
            weights: fetch(WEIGHTS_FILE)?,
        };
        log::debug!("Model files for '{}': {:?}", model, files);
        Ok(files)
    }

    /// Validate that a directory holds every required model file
    fn files_in(dir: &Path) -> Result<ModelFiles> {
        let require = |file: &str| -> Result<PathBuf> {
            let path = dir.join(file);
            if path.is_file() && path.metadata()?.len() > 0 {
                Ok(path)
            } else {
                Err(SemchunkError::MachineLearning(format!(
                    "Missing model file {:?}",
                    path
                )))
            }
        };

        Ok(ModelFiles {
            config: require(CONFIG_FILE)?,
            tokenizer: require(TOKENIZER_FILE)?,
            weights: require(WEIGHTS_FILE)?,
        })
    }
}

fn default_cache_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".cache")
        .join("semchunk-rs")
        .join("models")
}
