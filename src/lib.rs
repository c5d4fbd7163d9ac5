//! # semchunk-rs
//!
//! Semantic text chunking in Rust. Text is split into sentences, each
//! sentence is embedded, and chunk boundaries are placed where the cosine
//! distance between neighbouring sentences spikes.
//!
//! Embeddings come from a pure Rust sentence transformer (Candle) or from any
//! OpenAI-compatible embedding service.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use semchunk_rs::{Config, SemanticChunker, create_provider};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!
//!     // Downloads the model on first use
//!     let provider = create_provider(&config.embedding)?;
//!     let chunker = SemanticChunker::new(provider, config.chunking.clone())?;
//!
//!     let chunks = chunker.split("Cats sleep all day. Rockets fly to orbit.")?;
//!     for (i, chunk) in chunks.iter().enumerate() {
//!         println!("Chunk {}: {}", i + 1, chunk);
//!     }
//!
//!     Ok(())
//! }
//! ```

// Core modules
pub mod config;
pub mod document;
pub mod error;
pub mod ml;
pub mod text;
pub mod utils;

// Re-export main API types
pub use config::{ChunkingConfig, Config};
pub use document::{ChunkSink, DirectorySink, DocumentLoader, TextLoader};
pub use error::{Result, SemchunkError};
pub use ml::{EmbeddingConfig, EmbeddingProvider, create_provider};

// Re-export commonly used types
pub use text::{BreakpointThreshold, ChunkMetadata, SemanticChunker, ThresholdKind};
