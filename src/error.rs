//! Error types for semchunk-rs
//!
//! This module provides error handling for chunking, embedding, document
//! loading and configuration.

use thiserror::Error;

/// Main error type for semchunk operations
#[derive(Error, Debug)]
pub enum SemchunkError {
    /// Invalid construction parameters
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding provider failure or malformed provider output
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Embedding provider did not answer within its timeout
    #[error("Embedding timeout: {0}")]
    EmbeddingTimeout(String),

    /// Text processing errors
    #[error("Text processing error: {0}")]
    TextProcessing(String),

    /// Machine learning model errors
    #[error("ML model error: {0}")]
    MachineLearning(String),

    /// PDF processing errors
    #[error("PDF processing error: {0}")]
    Pdf(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Candle ML framework errors
    #[error("Candle ML error: {0}")]
    Candle(#[from] candle_core::Error),

}

impl SemchunkError {
    /// Whether this error came from the embedding provider.
    ///
    /// Timeouts count as embedding failures; callers that retry can match
    /// on [`SemchunkError::EmbeddingTimeout`] directly.
    pub fn is_embedding(&self) -> bool {
        matches!(
            self,
            SemchunkError::Embedding(_) | SemchunkError::EmbeddingTimeout(_)
        )
    }
}

/// Result type alias for semchunk operations
pub type Result<T> = std::result::Result<T, SemchunkError>;

impl From<reqwest::Error> for SemchunkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SemchunkError::EmbeddingTimeout(err.to_string())
        } else {
            SemchunkError::Embedding(err.to_string())
        }
    }
}
