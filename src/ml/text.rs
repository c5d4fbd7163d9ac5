//! Text preprocessing and tokenization for local embedding models

use crate::error::{Result, SemchunkError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use unicode_normalization::UnicodeNormalization;

/// Text preprocessing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextConfig {
    /// Maximum sequence length; longer inputs are truncated
    pub max_length: usize,
    /// Whether to add special tokens (CLS, SEP)
    pub add_special_tokens: bool,
    /// Whether to normalize unicode (NFC)
    pub normalize_unicode: bool,
    /// Whether to lowercase text
    pub lowercase: bool,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            max_length: 256,
            add_special_tokens: true,
            normalize_unicode: true,
            lowercase: false, // SentenceTransformers typically preserve case
        }
    }
}

/// A tokenized batch padded to its longest member
#[derive(Debug, Clone, Default)]
pub struct TokenizedBatch {
    /// Token IDs, one row per input
    pub input_ids: Vec<Vec<u32>>,
    /// Attention mask (1 for real tokens, 0 for padding)
    pub attention_mask: Vec<Vec<u32>>,
    /// Token type IDs (for BERT-style models)
    pub token_type_ids: Vec<Vec<u32>>,
}

impl TokenizedBatch {
    /// Number of rows in the batch
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    /// Whether the batch has no rows
    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

/// Text preprocessor and tokenizer
pub struct TextProcessor {
    tokenizer: Tokenizer,
    config: TextConfig,
}

impl TextProcessor {
    /// Load tokenizer from a `tokenizer.json` file and configure padding/truncation
    pub fn from_file<P: AsRef<Path>>(tokenizer_path: P, config: TextConfig) -> Result<Self> {
        let path = tokenizer_path.as_ref();
        let mut tokenizer = Tokenizer::from_file(path).map_err(|e| {
            SemchunkError::MachineLearning(format!("Failed to load tokenizer from {:?}: {}", path, e))
        })?;

        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_length,
                ..Default::default()
            }))
            .map_err(|e| {
                SemchunkError::MachineLearning(format!("Invalid truncation settings: {}", e))
            })?;

        log::info!("Loaded tokenizer from {:?}", path);
        Ok(Self { tokenizer, config })
    }

    /// Preprocess text (normalize, collapse whitespace)
    pub fn preprocess_text(&self, text: &str) -> String {
        preprocess(text, &self.config)
    }

    /// Tokenize multiple texts in batch
    pub fn tokenize_batch(&self, texts: &[String]) -> Result<TokenizedBatch> {
        let preprocessed: Vec<String> = texts.iter().map(|t| self.preprocess_text(t)).collect();

        let encodings = self
            .tokenizer
            .encode_batch(preprocessed, self.config.add_special_tokens)
            .map_err(|e| {
                SemchunkError::MachineLearning(format!("Batch tokenization failed: {}", e))
            })?;

        let mut batch = TokenizedBatch::default();
        for encoding in &encodings {
            batch.input_ids.push(encoding.get_ids().to_vec());
            batch.attention_mask.push(encoding.get_attention_mask().to_vec());
            batch.token_type_ids.push(encoding.get_type_ids().to_vec());
        }
        Ok(batch)
    }

    /// Get tokenizer vocabulary size
    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(false)
    }

    /// Get configuration
    pub fn config(&self) -> &TextConfig {
        &self.config
    }
}

fn preprocess(text: &str, config: &TextConfig) -> String {
    let mut processed = if config.normalize_unicode {
        text.nfc().collect::<String>()
    } else {
        text.to_string()
    };

    if config.lowercase {
        processed = processed.to_lowercase();
    }

    processed.split_whitespace().collect::<Vec<&str>>().join(" ")
}
