//! Local sentence transformer embeddings using Candle
//!
//! Runs a BERT-style model in-process: tokenization, forward pass,
//! attention-masked mean pooling and optional L2 normalization. The model is
//! loaded once and reused across calls; repeated sentences hit an LRU cache.

use crate::error::{Result, SemchunkError};
use crate::ml::device::DeviceType;
use crate::ml::embedding::{Embedding, EmbeddingProvider, normalize_embedding};
use crate::ml::models::ModelManager;
use crate::ml::text::{TextConfig, TextProcessor};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Mutex;

/// Configuration for the local embedding model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalEmbeddingConfig {
    /// HuggingFace model id or path to a directory with model files
    pub model_name: String,
    /// Maximum sequence length
    pub max_length: usize,
    /// Whether to normalize embeddings
    pub normalize: bool,
    /// Sentences per forward pass
    pub batch_size: usize,
    /// Device to use for inference
    pub device: DeviceType,
    /// Number of cached sentence embeddings (0 disables the cache)
    pub cache_capacity: usize,
    /// Model download cache directory
    pub cache_dir: Option<PathBuf>,
}

impl Default for LocalEmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            max_length: 256,
            normalize: true,
            batch_size: 32,
            device: DeviceType::Cpu,
            cache_capacity: 4096,
            cache_dir: None,
        }
    }
}

impl LocalEmbeddingConfig {
    /// Validate local model parameters
    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(SemchunkError::Config("model_name must not be empty".to_string()));
        }
        if self.batch_size == 0 {
            return Err(SemchunkError::Config("batch_size must be greater than zero".to_string()));
        }
        if self.max_length == 0 {
            return Err(SemchunkError::Config("max_length must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Sentence transformer embedding model running on a candle device
pub struct LocalEmbedding {
    config: LocalEmbeddingConfig,
    model: BertModel,
    text_processor: TextProcessor,
    device: Device,
    dimension: usize,
    cache: Option<Mutex<LruCache<String, Embedding>>>,
}

impl LocalEmbedding {
    /// Load the model, downloading its files on first use
    pub fn new(config: LocalEmbeddingConfig) -> Result<Self> {
        config.validate()?;
        log::info!("Initializing local embedding model: {}", config.model_name);

        let manager = ModelManager::new(config.cache_dir.clone())?;
        let files = manager.resolve(&config.model_name)?;

        let device = config.device.to_device()?;
        log::info!("Using device: {}", config.device);

        let config_json = std::fs::read_to_string(&files.config)?;
        let bert_config: BertConfig = serde_json::from_str(&config_json)?;
        let dimension = serde_json::from_str::<serde_json::Value>(&config_json)?["hidden_size"]
            .as_u64()
            .unwrap_or_default() as usize;

        // SAFETY: the weights file is not modified while mapped
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[files.weights], DTYPE, &device)? };
        let model = BertModel::load(vb, &bert_config)?;

        let text_processor = TextProcessor::from_file(
            &files.tokenizer,
            TextConfig {
                max_length: config.max_length,
                ..Default::default()
            },
        )?;

        let cache =
            NonZeroUsize::new(config.cache_capacity).map(|cap| Mutex::new(LruCache::new(cap)));

        log::info!(
            "Loaded {} ({} dimensions, vocab {})",
            config.model_name,
            dimension,
            text_processor.vocab_size()
        );

        Ok(Self {
            config,
            model,
            text_processor,
            device,
            dimension,
            cache,
        })
    }

    /// Get embedding dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Get model configuration
    pub fn config(&self) -> &LocalEmbeddingConfig {
        &self.config
    }

    /// Number of cached embeddings
    pub fn cache_size(&self) -> usize {
        self.cache
            .as_ref()
            .and_then(|c| c.lock().ok().map(|c| c.len()))
            .unwrap_or(0)
    }

    /// Run one forward pass over a batch and mean-pool the token states
    fn forward_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let batch = self.text_processor.tokenize_batch(texts)?;
        let input_ids = to_tensor(&batch.input_ids, &self.device)?;
        let token_type_ids = to_tensor(&batch.token_type_ids, &self.device)?;
        let attention_mask = to_tensor(&batch.attention_mask, &self.device)?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        // Padding tokens must not contribute to the mean
        let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
        let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?.clamp(1e-9f32, f32::MAX)?;
        let pooled = summed.broadcast_div(&counts)?;

        let mut embeddings = pooled.to_vec2::<f32>()?;
        if self.config.normalize {
            embeddings.iter_mut().for_each(|e| normalize_embedding(e));
        }
        Ok(embeddings)
    }

    fn cached(&self, text: &str) -> Option<Embedding> {
        let cache = self.cache.as_ref()?;
        cache.lock().ok()?.get(text).cloned()
    }

    fn store(&self, text: &str, embedding: &Embedding) {
        if let Some(mut cache) = self.cache.as_ref().and_then(|c| c.lock().ok()) {
            cache.put(text.to_string(), embedding.clone());
        }
    }
}

impl EmbeddingProvider for LocalEmbedding {
    fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut results: Vec<Option<Embedding>> = texts.iter().map(|t| self.cached(t)).collect();
        let misses: Vec<usize> = (0..texts.len()).filter(|&i| results[i].is_none()).collect();

        log::debug!(
            "Embedding {} texts ({} cached)",
            texts.len(),
            texts.len() - misses.len()
        );

        for indices in misses.chunks(self.config.batch_size) {
            let batch: Vec<String> = indices.iter().map(|&i| texts[i].clone()).collect();
            let embeddings = self.forward_batch(&batch)?;
            if embeddings.len() != batch.len() {
                return Err(SemchunkError::Embedding(format!(
                    "Model returned {} embeddings for {} texts",
                    embeddings.len(),
                    batch.len()
                )));
            }
            for (&i, embedding) in indices.iter().zip(embeddings) {
                self.store(&texts[i], &embedding);
                results[i] = Some(embedding);
            }
        }

        results
            .into_iter()
            .map(|e| e.ok_or_else(|| SemchunkError::Embedding("Missing embedding".to_string())))
            .collect()
    }

    fn describe(&self) -> String {
        format!("local model {} on {}", self.config.model_name, self.config.device)
    }
}

fn to_tensor(rows: &[Vec<u32>], device: &Device) -> Result<Tensor> {
    let rows = rows
        .iter()
        .map(|row| Tensor::new(row.as_slice(), device))
        .collect::<candle_core::Result<Vec<_>>>()?;
    Ok(Tensor::stack(&rows, 0)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_config_default() {
        let config = LocalEmbeddingConfig::default();
        assert_eq!(config.model_name, "sentence-transformers/all-MiniLM-L6-v2");
        assert!(config.normalize);
        assert_eq!(config.device, DeviceType::Cpu);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_local_config_validation() {
        let config = LocalEmbeddingConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SemchunkError::Config(_))));
    }

    #[test]
    fn test_to_tensor_shape() {
        let rows = vec![vec![101, 7592, 102], vec![101, 2088, 102]];
        let tensor = to_tensor(&rows, &Device::Cpu).unwrap();
        assert_eq!(tensor.dims(), &[2, 3]);
    }

    #[test]
    fn test_missing_local_model_directory() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = LocalEmbeddingConfig {
            model_name: temp_dir.path().to_str().unwrap().to_string(),
            cache_dir: Some(temp_dir.path().join("cache")),
            ..Default::default()
        };
        assert!(LocalEmbedding::new(config).is_err());
    }

    #[test]
    #[ignore = "downloads all-MiniLM-L6-v2 from the network"]
    fn test_real_embeddings() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let model = LocalEmbedding::new(LocalEmbeddingConfig {
            cache_dir: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        })
        .unwrap();

        let texts = vec![
            "The cat sat on the mat.".to_string(),
            "A kitten rested on the rug.".to_string(),
            "Rockets need a lot of fuel.".to_string(),
        ];
        let embeddings = model.embed(&texts).unwrap();
        assert_eq!(embeddings.len(), 3);
        assert_eq!(embeddings[0].len(), model.dimension());

        let norm: f32 = embeddings[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);

        // Cached path returns identical vectors
        let again = model.embed(&texts[..1]).unwrap();
        assert_eq!(again[0], embeddings[0]);
        assert_eq!(model.cache_size(), 3);
    }
}
