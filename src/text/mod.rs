//! Text processing and semantic chunking for semchunk-rs
//!
//! This module provides sentence segmentation, breakpoint threshold policies,
//! markdown clean-up and the semantic chunker that ties them together.

pub mod chunking;
pub mod markdown;
pub mod segment;
pub mod threshold;

// Re-export main types and functions
pub use chunking::{ChunkMetadata, SemanticChunker, SplitAnalysis};
pub use markdown::clean_markdown;
pub use segment::{Sentence, SentenceSplitter};
pub use threshold::{BreakpointThreshold, ThresholdKind};
