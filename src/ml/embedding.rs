//! Embedding provider capability
//!
//! The chunker only depends on [`EmbeddingProvider`]. Concrete backends are
//! selected at construction time from an [`EmbeddingConfig`].

use crate::error::{Result, SemchunkError};
use crate::ml::local::{LocalEmbedding, LocalEmbeddingConfig};
use crate::ml::remote::{RemoteEmbedding, RemoteEmbeddingConfig};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Embedding vector type
pub type Embedding = Vec<f32>;

/// Maps texts to fixed-dimension vectors.
///
/// Implementations must be length- and order-preserving and deterministic for
/// identical input. Returning fewer vectors than requested is an error, never
/// a partial success.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts in one call
    fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Embed a single text
    fn embed_one(&self, text: &str) -> Result<Embedding> {
        let mut embeddings = self.embed(&[text.to_string()])?;
        if embeddings.len() != 1 {
            return Err(SemchunkError::Embedding(format!(
                "Expected 1 embedding, provider returned {}",
                embeddings.len()
            )));
        }
        Ok(embeddings.remove(0))
    }

    /// Short human-readable description for logs
    fn describe(&self) -> String {
        "embedding provider".to_string()
    }
}

/// Embedding backend selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum EmbeddingConfig {
    /// In-process sentence transformer
    Local(LocalEmbeddingConfig),
    /// OpenAI-compatible HTTP embedding service
    Remote(RemoteEmbeddingConfig),
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig::Local(LocalEmbeddingConfig::default())
    }
}

impl EmbeddingConfig {
    /// Point at a remote endpoint, switching backend if needed
    pub fn set_api_url(&mut self, url: String) {
        match self {
            EmbeddingConfig::Remote(remote) => remote.api_url = url,
            EmbeddingConfig::Local(_) => {
                *self = EmbeddingConfig::Remote(RemoteEmbeddingConfig {
                    api_url: url,
                    ..Default::default()
                });
            }
        }
    }

    /// Set the API key; ignored by the local backend
    pub fn set_api_key(&mut self, key: String) {
        if let EmbeddingConfig::Remote(remote) = self {
            remote.api_key = key;
        }
    }

    /// Set the model name for either backend
    pub fn set_model(&mut self, model: String) {
        match self {
            EmbeddingConfig::Local(local) => local.model_name = model,
            EmbeddingConfig::Remote(remote) => remote.model = model,
        }
    }

    /// Validate backend parameters
    pub fn validate(&self) -> Result<()> {
        match self {
            EmbeddingConfig::Local(local) => local.validate(),
            EmbeddingConfig::Remote(remote) => remote.validate(),
        }
    }
}

/// Build the provider described by the configuration
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    config.validate()?;
    let provider: Arc<dyn EmbeddingProvider> = match config {
        EmbeddingConfig::Local(local) => Arc::new(LocalEmbedding::new(local.clone())?),
        EmbeddingConfig::Remote(remote) => Arc::new(RemoteEmbedding::new(remote.clone())?),
    };
    log::info!("Using {}", provider.describe());
    Ok(provider)
}

/// Normalize embedding to unit length; zero vectors are left unchanged
pub fn normalize_embedding(embedding: &mut [f32]) {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for val in embedding.iter_mut() {
            *val /= norm;
        }
    }
}

/// Dot product of two vectors of equal length
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine distance between two unit-length vectors
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - dot(a, b)
}

/// Distances between each adjacent pair; N vectors yield N-1 distances
pub fn adjacent_distances(embeddings: &[Embedding]) -> Vec<f32> {
    embeddings
        .windows(2)
        .map(|pair| cosine_distance(&pair[0], &pair[1]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Constant;

    impl EmbeddingProvider for Constant {
        fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    struct Empty;

    impl EmbeddingProvider for Empty {
        fn embed(&self, _texts: &[String]) -> Result<Vec<Embedding>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_embed_one_wraps_embed() {
        let embedding = Constant.embed_one("abc").unwrap();
        assert_eq!(embedding, vec![3.0, 1.0]);
    }

    #[test]
    fn test_embed_one_rejects_missing_vector() {
        let err = Empty.embed_one("abc").unwrap_err();
        assert!(matches!(err, SemchunkError::Embedding(_)));
    }

    #[test]
    fn test_normalization() {
        let mut embedding = vec![3.0, 4.0, 0.0];
        normalize_embedding(&mut embedding);

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-6);
        assert_relative_eq!(embedding[0], 0.6, epsilon = 1e-6);
        assert_relative_eq!(embedding[1], 0.8, epsilon = 1e-6);

        let mut zero = vec![0.0, 0.0];
        normalize_embedding(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_adjacent_distances() {
        let embeddings = vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];
        let distances = adjacent_distances(&embeddings);
        assert_eq!(distances.len(), 2);
        assert_relative_eq!(distances[0], 0.0);
        assert_relative_eq!(distances[1], 1.0);
    }

    #[test]
    fn test_backend_switch() {
        let mut config = EmbeddingConfig::default();
        config.set_api_key("ignored".to_string());
        assert!(matches!(config, EmbeddingConfig::Local(_)));

        config.set_api_url("http://localhost:8080/v1/embeddings".to_string());
        config.set_api_key("key".to_string());
        match config {
            EmbeddingConfig::Remote(remote) => assert_eq!(remote.api_key, "key"),
            _ => panic!("Expected remote backend"),
        }
    }
}
