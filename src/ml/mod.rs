//! Embedding backends for semchunk-rs
//!
//! This module provides the [`EmbeddingProvider`] capability used by the
//! chunker, a pure Rust local sentence transformer built on Candle, and a
//! client for OpenAI-compatible embedding services.

pub mod device;
pub mod embedding;
pub mod local;
pub mod models;
pub mod remote;
pub mod text;

// Re-export main types and functions
pub use device::DeviceType;
pub use embedding::{
    adjacent_distances, cosine_distance, create_provider, normalize_embedding, Embedding,
    EmbeddingConfig, EmbeddingProvider,
};
pub use local::{LocalEmbedding, LocalEmbeddingConfig};
pub use models::{ModelFiles, ModelManager};
pub use remote::{RemoteEmbedding, RemoteEmbeddingConfig};
pub use text::{TextConfig, TextProcessor, TokenizedBatch};
