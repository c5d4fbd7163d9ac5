//! Configuration for semchunk-rs
//!
//! All sections have defaults, so a partial JSON file (or none at all) is a
//! valid configuration. Environment variables can override the embedding
//! backend settings.

use crate::error::{Result, SemchunkError};
use crate::ml::EmbeddingConfig;
use crate::text::BreakpointThreshold;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the remote embedding endpoint
pub const ENV_API_URL: &str = "SEMCHUNK_API_URL";
/// Environment variable overriding the remote embedding API key
pub const ENV_API_KEY: &str = "SEMCHUNK_API_KEY";
/// Environment variable overriding the embedding model name
pub const ENV_MODEL: &str = "SEMCHUNK_MODEL";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Semantic chunking parameters
    pub chunking: ChunkingConfig,
    /// Embedding backend selection
    pub embedding: EmbeddingConfig,
    /// Document loading
    pub loader: LoaderConfig,
    /// Chunk output
    pub output: OutputConfig,
}

/// Semantic chunking parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Breakpoint threshold policy
    pub threshold: BreakpointThreshold,
    /// Normalize embeddings to unit length before computing distances
    pub normalize: bool,
    /// Neighbor sentences on each side embedded together with a sentence
    pub buffer_size: usize,
    /// Skip breakpoints that would close a chunk shorter than this many chars
    pub min_chunk_chars: Option<usize>,
    /// Embed in parallel shards of this many sentences
    pub shard_size: Option<usize>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            threshold: BreakpointThreshold::default(),
            normalize: true,
            buffer_size: 0,
            min_chunk_chars: None,
            shard_size: None,
        }
    }
}

impl ChunkingConfig {
    /// Validate chunking parameters
    pub fn validate(&self) -> Result<()> {
        self.threshold.validate()?;
        if self.shard_size == Some(0) {
            return Err(SemchunkError::Config(
                "shard_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Document loading configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// External PDF-to-markdown converter command
    pub pdf_converter: String,
    /// Directory the converter writes into (defaults to `<pdf dir>/output`)
    pub pdf_output_dir: Option<PathBuf>,
    /// Extract PDF text in-process when the converter yields nothing
    pub pdf_fallback: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            pdf_converter: "mineru".to_string(),
            pdf_output_dir: None,
            pdf_fallback: true,
        }
    }
}

/// Chunk output configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root directory for saved chunks (defaults to `<source dir>/output`)
    pub directory: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        log::debug!("Loaded configuration from {:?}", path.as_ref());
        Ok(config)
    }

    /// Write configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Setting the API URL switches the backend to remote.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.embedding.set_api_url(url);
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            self.embedding.set_api_key(key);
        }
        if let Some(model) = lookup(ENV_MODEL).filter(|v| !v.is_empty()) {
            self.embedding.set_model(model);
        }
    }

    /// Validate all sections
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.embedding.validate()?;
        if self.loader.pdf_converter.trim().is_empty() {
            return Err(SemchunkError::Config(
                "pdf_converter must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
