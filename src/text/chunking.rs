//! Semantic chunking
//!
//! Text is segmented into sentences, every sentence is embedded in one batch,
//! and the cosine distance between neighbours decides where the text is cut.
//! Chunks are slices of the source text, so the original whitespace between
//! sentences inside a chunk is preserved.

use crate::config::ChunkingConfig;
use crate::error::{Result, SemchunkError};
use crate::ml::embedding::{Embedding, EmbeddingProvider, adjacent_distances, normalize_embedding};
use crate::text::segment::{Sentence, SentenceSplitter};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Metadata for a text chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    /// Position of the chunk in the document, starting at 0
    pub id: usize,

    /// The actual text content
    pub text: String,

    /// Original document source
    pub source: Option<String>,

    /// Byte offset in the original document
    pub offset: usize,

    /// Length of the chunk in bytes
    pub length: usize,

    /// Number of sentence units in the chunk
    pub sentence_count: usize,
}

/// Intermediate results of one split, for inspection and debugging
#[derive(Debug, Clone, PartialEq)]
pub struct SplitAnalysis {
    /// Number of sentence units found
    pub sentence_count: usize,
    /// Cosine distance between each adjacent sentence pair
    pub distances: Vec<f32>,
    /// Sentence indices after which a cut is made
    pub breakpoints: Vec<usize>,
}

/// Splits text into semantically coherent chunks
pub struct SemanticChunker {
    provider: Arc<dyn EmbeddingProvider>,
    config: ChunkingConfig,
    splitter: SentenceSplitter,
}

impl SemanticChunker {
    /// Create a chunker; fails if the configuration is out of range
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        let splitter = SentenceSplitter::new()?;

        log::info!(
            "Semantic chunker ready ({:?}, buffer {}, normalize {})",
            config.threshold,
            config.buffer_size,
            config.normalize
        );

        Ok(Self {
            provider,
            config,
            splitter,
        })
    }

    /// Get chunking configuration
    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split text into ordered, non-empty chunks
    pub fn split(&self, text: &str) -> Result<Vec<String>> {
        Ok(self
            .split_with_metadata(text, None)?
            .into_iter()
            .map(|chunk| chunk.text)
            .collect())
    }

    /// Split text and keep offsets and sentence counts for every chunk
    pub fn split_with_metadata(
        &self,
        text: &str,
        source: Option<String>,
    ) -> Result<Vec<ChunkMetadata>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let sentences = self.splitter.split(text);
        if sentences.is_empty() {
            log::warn!("No sentences found in {} bytes of text", text.len());
            return Ok(Vec::new());
        }

        let breakpoints = if sentences.len() == 1 {
            Vec::new()
        } else {
            self.detect_breakpoints(&sentences)?.breakpoints
        };

        let chunks = self.assemble(text, &sentences, &breakpoints, source);
        log::info!(
            "Split {} sentences into {} semantic chunks",
            sentences.len(),
            chunks.len()
        );
        Ok(chunks)
    }

    /// Run segmentation, embedding and breakpoint detection without assembling chunks
    pub fn analyze(&self, text: &str) -> Result<SplitAnalysis> {
        let sentences = self.splitter.split(text);
        if sentences.len() <= 1 {
            return Ok(SplitAnalysis {
                sentence_count: sentences.len(),
                distances: Vec::new(),
                breakpoints: Vec::new(),
            });
        }
        self.detect_breakpoints(&sentences)
    }

    fn detect_breakpoints(&self, sentences: &[Sentence<'_>]) -> Result<SplitAnalysis> {
        let embeddings = self.embed_sentences(sentences)?;
        let distances = adjacent_distances(&embeddings);
        let breakpoints = self.config.threshold.detect(&distances);

        log::debug!(
            "{} distances, {} breakpoints ({:?})",
            distances.len(),
            breakpoints.len(),
            self.config.threshold
        );

        Ok(SplitAnalysis {
            sentence_count: sentences.len(),
            distances,
            breakpoints,
        })
    }

    /// Embed all sentences, validating shape and normalizing if configured
    fn embed_sentences(&self, sentences: &[Sentence<'_>]) -> Result<Vec<Embedding>> {
        let inputs = combine_with_neighbors(sentences, self.config.buffer_size);

        let mut embeddings = match self.config.shard_size {
            Some(shard) if inputs.len() > shard => {
                log::debug!("Embedding {} sentences in shards of {}", inputs.len(), shard);
                inputs
                    .par_chunks(shard)
                    .map(|batch| self.embed_batch(batch))
                    .collect::<Result<Vec<_>>>()?
                    .into_iter()
                    .flatten()
                    .collect()
            }
            _ => self.embed_batch(&inputs)?,
        };

        let dimension = embeddings.first().map(Vec::len).unwrap_or_default();
        if let Some(pos) = embeddings.iter().position(|e| e.len() != dimension) {
            return Err(SemchunkError::Embedding(format!(
                "Embedding {} has dimension {}, expected {}",
                pos,
                embeddings[pos].len(),
                dimension
            )));
        }

        if self.config.normalize {
            embeddings.iter_mut().for_each(|e| normalize_embedding(e));
        }
        Ok(embeddings)
    }

    /// One provider call; the result must match the input one-to-one
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let embeddings = self.provider.embed(texts).map_err(|e| {
            if e.is_embedding() {
                e
            } else {
                SemchunkError::Embedding(e.to_string())
            }
        })?;

        if embeddings.len() != texts.len() {
            return Err(SemchunkError::Embedding(format!(
                "Provider returned {} embeddings for {} sentences",
                embeddings.len(),
                texts.len()
            )));
        }
        if let Some(pos) = embeddings.iter().position(|e| e.is_empty()) {
            return Err(SemchunkError::Embedding(format!(
                "Provider returned an empty embedding at position {}",
                pos
            )));
        }
        if let Some(pos) = embeddings
            .iter()
            .position(|e| e.iter().any(|v| !v.is_finite()))
        {
            return Err(SemchunkError::Embedding(format!(
                "Provider returned a non-finite embedding at position {}",
                pos
            )));
        }
        Ok(embeddings)
    }

    /// Cut the sentence run after every breakpoint and slice chunks from the source
    fn assemble(
        &self,
        text: &str,
        sentences: &[Sentence<'_>],
        breakpoints: &[usize],
        source: Option<String>,
    ) -> Vec<ChunkMetadata> {
        let mut ranges = Vec::new();
        let mut start = 0;

        for &breakpoint in breakpoints {
            let span = &text[sentences[start].offset..sentences[breakpoint].end()];
            if let Some(min_chars) = self.config.min_chunk_chars {
                if span.chars().count() < min_chars {
                    continue;
                }
            }
            ranges.push((start, breakpoint + 1));
            start = breakpoint + 1;
        }
        if start < sentences.len() {
            ranges.push((start, sentences.len()));
        }

        ranges
            .into_iter()
            .filter_map(|(first, end)| {
                let offset = sentences[first].offset;
                let chunk_end = sentences[end - 1].end();
                let chunk_text = &text[offset..chunk_end];
                (!chunk_text.trim().is_empty()).then_some((offset, chunk_text, end - first))
            })
            .enumerate()
            .map(|(id, (offset, chunk_text, sentence_count))| ChunkMetadata {
                id,
                text: chunk_text.to_string(),
                source: source.clone(),
                offset,
                length: chunk_text.len(),
                sentence_count,
            })
            .collect()
    }
}

/// Text submitted for each sentence: the sentence and `buffer` neighbours on
/// each side, joined by single spaces
fn combine_with_neighbors(sentences: &[Sentence<'_>], buffer: usize) -> Vec<String> {
    if buffer == 0 {
        return sentences.iter().map(|s| s.text.to_string()).collect();
    }
    (0..sentences.len())
        .map(|i| {
            let lo = i.saturating_sub(buffer);
            let hi = (i + buffer + 1).min(sentences.len());
            sentences[lo..hi]
                .iter()
                .map(|s| s.text)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::BreakpointThreshold;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds by topic keyword so topic shifts produce large distances
    struct TopicProvider {
        calls: AtomicUsize,
        inputs: Mutex<Vec<String>>,
    }

    impl TopicProvider {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                inputs: Mutex::new(Vec::new()),
            })
        }
    }

    impl EmbeddingProvider for TopicProvider {
        fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inputs.lock().unwrap().extend(texts.iter().cloned());
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        if t.contains("cat") { 1.0 } else { 0.0 },
                        if t.contains("rocket") { 1.0 } else { 0.0 },
                        if t.contains("bread") { 1.0 } else { 0.0 },
                        0.1,
                    ]
                })
                .collect())
        }
    }

    /// Returns fixed vectors per sentence text
    struct TableProvider(HashMap<String, Embedding>);

    impl EmbeddingProvider for TableProvider {
        fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            Ok(texts.iter().map(|t| self.0[t].clone()).collect())
        }
    }

    /// Always drops the last vector
    struct ShortProvider;

    impl EmbeddingProvider for ShortProvider {
        fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            Ok(texts.iter().skip(1).map(|_| vec![1.0, 0.0]).collect())
        }
    }

    fn chunker(
        provider: Arc<dyn EmbeddingProvider>,
        threshold: BreakpointThreshold,
    ) -> SemanticChunker {
        SemanticChunker::new(
            provider,
            ChunkingConfig {
                threshold,
                ..Default::default()
            },
        )
        .unwrap()
    }

    const TOPICS: &str = "The cat sleeps. A cat purrs softly. The rocket launches. \
                          The rocket reaches orbit. Bread is baking. Fresh bread smells good.";

    #[test]
    fn test_empty_input_skips_provider() {
        let provider = TopicProvider::new();
        let chunker = chunker(provider.clone(), BreakpointThreshold::default());

        assert!(chunker.split("").unwrap().is_empty());
        assert!(chunker.split("  \n\t").unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_single_sentence_is_one_chunk() {
        let provider = TopicProvider::new();
        let chunker = chunker(provider.clone(), BreakpointThreshold::default());

        let chunks = chunker.split("  Hello world.  ").unwrap();
        assert_eq!(chunks, vec!["Hello world.".to_string()]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_topic_shifts() {
        let provider = TopicProvider::new();
        let chunker = chunker(provider.clone(), BreakpointThreshold::Percentile(50.0));

        let chunks = chunker.split(TOPICS).unwrap();
        assert_eq!(
            chunks,
            vec![
                "The cat sleeps. A cat purrs softly.".to_string(),
                "The rocket launches. The rocket reaches orbit.".to_string(),
                "Bread is baking. Fresh bread smells good.".to_string(),
            ]
        );
        // All sentences embedded in a single call
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_engineered_three_sentences() {
        let table: HashMap<String, Embedding> = [
            ("One.".to_string(), vec![1.0, 0.0]),
            ("Two.".to_string(), vec![0.0, 1.0]),
            ("Three.".to_string(), vec![0.1, 1.0]),
        ]
        .into_iter()
        .collect();
        let chunker = chunker(
            Arc::new(TableProvider(table)),
            BreakpointThreshold::Percentile(50.0),
        );

        let chunks = chunker.split("One. Two. Three.").unwrap();
        assert_eq!(chunks, vec!["One.".to_string(), "Two. Three.".to_string()]);
    }

    #[test]
    fn test_count_mismatch_is_embedding_error() {
        let chunker = chunker(Arc::new(ShortProvider), BreakpointThreshold::default());
        let err = chunker.split("One. Two. Three.").unwrap_err();
        assert!(matches!(err, SemchunkError::Embedding(_)));
    }

    #[test]
    fn test_provider_failure_maps_to_embedding_error() {
        struct Failing;
        impl EmbeddingProvider for Failing {
            fn embed(&self, _texts: &[String]) -> Result<Vec<Embedding>> {
                Err(SemchunkError::MachineLearning("model crashed".to_string()))
            }
        }

        let chunker = chunker(Arc::new(Failing), BreakpointThreshold::default());
        let err = chunker.split("One. Two.").unwrap_err();
        assert!(matches!(err, SemchunkError::Embedding(_)));
    }

    #[test]
    fn test_timeout_is_preserved() {
        struct Slow;
        impl EmbeddingProvider for Slow {
            fn embed(&self, _texts: &[String]) -> Result<Vec<Embedding>> {
                Err(SemchunkError::EmbeddingTimeout("60s elapsed".to_string()))
            }
        }

        let chunker = chunker(Arc::new(Slow), BreakpointThreshold::default());
        let err = chunker.split("One. Two.").unwrap_err();
        assert!(matches!(err, SemchunkError::EmbeddingTimeout(_)));
    }

    #[test]
    fn test_empty_vector_rejected() {
        struct Hollow;
        impl EmbeddingProvider for Hollow {
            fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
                Ok(texts.iter().map(|_| Vec::new()).collect())
            }
        }

        let chunker = chunker(Arc::new(Hollow), BreakpointThreshold::default());
        assert!(matches!(
            chunker.split("One. Two.").unwrap_err(),
            SemchunkError::Embedding(_)
        ));
    }

    #[test]
    fn test_non_finite_vector_rejected() {
        struct Poisoned;
        impl EmbeddingProvider for Poisoned {
            fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
                Ok(texts
                    .iter()
                    .enumerate()
                    .map(|(i, _)| match i {
                        1 => vec![f32::NAN, 1.0],
                        2 => vec![f32::INFINITY, 0.0],
                        _ => vec![1.0, 0.0],
                    })
                    .collect())
            }
        }

        let chunker = chunker(Arc::new(Poisoned), BreakpointThreshold::default());
        assert!(matches!(
            chunker.split("A. B. C. D.").unwrap_err(),
            SemchunkError::Embedding(_)
        ));
    }

    #[test]
    fn test_mixed_dimensions_rejected() {
        struct Ragged;
        impl EmbeddingProvider for Ragged {
            fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
                Ok(texts.iter().enumerate().map(|(i, _)| vec![1.0; i + 1]).collect())
            }
        }

        let chunker = chunker(Arc::new(Ragged), BreakpointThreshold::default());
        assert!(matches!(
            chunker.split("One. Two.").unwrap_err(),
            SemchunkError::Embedding(_)
        ));
    }

    #[test]
    fn test_percentile_100_yields_one_chunk() {
        let chunker = chunker(TopicProvider::new(), BreakpointThreshold::Percentile(100.0));
        let chunks = chunker.split(TOPICS).unwrap();
        assert_eq!(chunks, vec![TOPICS.to_string()]);
    }

    #[test]
    fn test_identical_sentences_one_chunk() {
        let chunker = chunker(TopicProvider::new(), BreakpointThreshold::Percentile(10.0));
        let text = "Same words here. Same words here. Same words here.";
        assert_eq!(chunker.split(text).unwrap(), vec![text.to_string()]);
    }

    #[test]
    fn test_invalid_threshold_rejected_at_construction() {
        let result = SemanticChunker::new(
            TopicProvider::new(),
            ChunkingConfig {
                threshold: BreakpointThreshold::Percentile(101.0),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(SemchunkError::Config(_))));
    }

    #[test]
    fn test_original_whitespace_preserved() {
        let chunker = chunker(TopicProvider::new(), BreakpointThreshold::Percentile(50.0));
        let text = "The cat sleeps.\n  A cat purrs.\n\nThe rocket flies.\nThe rocket lands.";
        let chunks = chunker.split_with_metadata(text, Some("doc.txt".into())).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "The cat sleeps.\n  A cat purrs.");
        assert_eq!(chunks[0].sentence_count, 2);
        assert_eq!(chunks[1].id, 1);
        assert_eq!(chunks[1].source.as_deref(), Some("doc.txt"));
        for chunk in &chunks {
            assert_eq!(&text[chunk.offset..chunk.offset + chunk.length], chunk.text);
        }
    }

    #[test]
    fn test_buffer_combines_neighbors() {
        let provider = TopicProvider::new();
        let chunker = SemanticChunker::new(
            provider.clone(),
            ChunkingConfig {
                buffer_size: 1,
                ..Default::default()
            },
        )
        .unwrap();

        chunker.split("A. B. C.").unwrap();
        let inputs = provider.inputs.lock().unwrap().clone();
        assert_eq!(inputs, vec!["A. B.", "A. B. C.", "B. C."]);
    }

    #[test]
    fn test_sharded_embedding_matches_single_batch() {
        let single = chunker(TopicProvider::new(), BreakpointThreshold::Percentile(50.0));

        let provider = TopicProvider::new();
        let sharded = SemanticChunker::new(
            provider.clone(),
            ChunkingConfig {
                threshold: BreakpointThreshold::Percentile(50.0),
                shard_size: Some(2),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(sharded.split(TOPICS).unwrap(), single.split(TOPICS).unwrap());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_min_chunk_chars_skips_short_chunks() {
        let chunker = SemanticChunker::new(
            TopicProvider::new(),
            ChunkingConfig {
                threshold: BreakpointThreshold::Percentile(50.0),
                min_chunk_chars: Some(60),
                ..Default::default()
            },
        )
        .unwrap();

        let chunks = chunker.split(TOPICS).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(
            chunks[0],
            "The cat sleeps. A cat purrs softly. The rocket launches. The rocket reaches orbit."
        );
    }

    #[test]
    fn test_analyze_reports_breakpoints() {
        let chunker = chunker(TopicProvider::new(), BreakpointThreshold::Percentile(50.0));
        let analysis = chunker.analyze(TOPICS).unwrap();

        assert_eq!(analysis.sentence_count, 6);
        assert_eq!(analysis.distances.len(), 5);
        assert_eq!(analysis.breakpoints, vec![1, 3]);
    }
}
