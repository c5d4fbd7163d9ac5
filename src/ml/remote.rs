//! Remote embeddings over an OpenAI-compatible HTTP API
//!
//! Request: `POST {api_url}` with `{"model": ..., "input": [...]}`.
//! Response: `{"data": [{"embedding": [...]}, ...]}` in input order.

use crate::error::{Result, SemchunkError};
use crate::ml::embedding::{Embedding, EmbeddingProvider};
use crate::utils::preview;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the remote embedding service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteEmbeddingConfig {
    /// Full URL of the embeddings endpoint
    pub api_url: String,
    /// Bearer token; empty means no Authorization header
    pub api_key: String,
    /// Model name sent with each request
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RemoteEmbeddingConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000/v1/embeddings".to_string(),
            api_key: String::new(),
            model: "Qwen/Qwen3-Embedding".to_string(),
            timeout_secs: 60,
        }
    }
}

impl RemoteEmbeddingConfig {
    /// Validate remote service parameters
    pub fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(SemchunkError::Config(format!(
                "api_url must be an http(s) URL, got '{}'",
                self.api_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(SemchunkError::Config("timeout_secs must be greater than zero".to_string()));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

/// Embedding provider backed by a remote HTTP service
pub struct RemoteEmbedding {
    config: RemoteEmbeddingConfig,
    client: Client,
}

impl RemoteEmbedding {
    /// Create a client; the connection pool is reused across calls
    pub fn new(config: RemoteEmbeddingConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SemchunkError::Config(format!("Failed to build HTTP client: {}", e)))?;

        log::info!("Remote embeddings initialised, endpoint: {}", config.api_url);
        Ok(Self { config, client })
    }

    /// Get service configuration
    pub fn config(&self) -> &RemoteEmbeddingConfig {
        &self.config
    }
}

impl EmbeddingProvider for RemoteEmbedding {
    fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        log::debug!("Requesting embeddings for {} texts", texts.len());

        let mut request = self.client.post(&self.config.api_url).json(&EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        });
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let response = request.send().map_err(|e| {
            log::error!("Embedding request failed: {}", e);
            SemchunkError::from(e)
        })?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            log::error!("Embedding service returned {}", status);
            return Err(SemchunkError::Embedding(format!(
                "Embedding service returned {}: {}",
                status,
                preview(&body, 200)
            )));
        }

        parse_response(&body, texts.len())
    }

    fn describe(&self) -> String {
        format!("remote model {} at {}", self.config.model, self.config.api_url)
    }
}

/// Parse a response body and check it against the number of inputs
fn parse_response(body: &str, expected: usize) -> Result<Vec<Embedding>> {
    let mut parsed: EmbeddingResponse = serde_json::from_str(body).map_err(|e| {
        SemchunkError::Embedding(format!("Malformed embedding response: {}", e))
    })?;

    if parsed.data.len() != expected {
        return Err(SemchunkError::Embedding(format!(
            "Mismatch embedding count: got {}, expected {}",
            parsed.data.len(),
            expected
        )));
    }

    let indexed = parsed.data.iter().filter(|item| item.index.is_some()).count();
    if indexed == expected && expected > 0 {
        parsed.data.sort_by_key(|item| item.index);
        let in_order = parsed
            .data
            .iter()
            .enumerate()
            .all(|(i, item)| item.index == Some(i));
        if !in_order {
            return Err(SemchunkError::Embedding(format!(
                "Embedding indices are not 0..{}",
                expected
            )));
        }
    } else if indexed > 0 {
        return Err(SemchunkError::Embedding(format!(
            "Only {} of {} embeddings carry an index",
            indexed, expected
        )));
    }

    Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
}
