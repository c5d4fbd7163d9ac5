//! Sentence segmentation
//!
//! A heuristic boundary detector, not an NLP segmenter. ASCII terminators
//! (`.`, `!`, `?`) end a sentence only when followed by whitespace or the end
//! of the text; full-width terminators (`。`, `！`, `？`) end a sentence
//! immediately. Abbreviations ("e.g. this"), numbers ending a clause and
//! quoted dialogue are split wherever the punctuation rule fires.

use crate::error::{Result, SemchunkError};
use regex::Regex;

/// A sentence unit: a trimmed slice of the source text and its byte offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sentence<'a> {
    /// Sentence text, terminal punctuation included
    pub text: &'a str,
    /// Byte offset of the first character in the source text
    pub offset: usize,
}

impl Sentence<'_> {
    /// Byte offset one past the last character
    pub fn end(&self) -> usize {
        self.offset + self.text.len()
    }
}

/// Splits text into sentence units
pub struct SentenceSplitter {
    boundary_regex: Regex,
}

impl SentenceSplitter {
    /// Create a splitter with the default boundary rule
    pub fn new() -> Result<Self> {
        let boundary_regex = Regex::new(r"[.!?]+(?:\s+|$)|[。！？]+\s*").map_err(|e| {
            SemchunkError::TextProcessing(format!("Failed to compile sentence regex: {}", e))
        })?;
        Ok(Self { boundary_regex })
    }

    /// Split text into sentence units in source order.
    ///
    /// Whitespace-only spans are dropped; every returned sentence is
    /// non-empty and trimmed.
    pub fn split<'a>(&self, text: &'a str) -> Vec<Sentence<'a>> {
        let mut sentences = Vec::new();
        let mut cursor = 0;

        for m in self.boundary_regex.find_iter(text) {
            // Terminal punctuation stays with the sentence, trailing whitespace does not
            let punct_end = m.start() + m.as_str().trim_end().len();
            push_trimmed(&mut sentences, text, cursor, punct_end);
            cursor = m.end();
        }

        if cursor < text.len() {
            push_trimmed(&mut sentences, text, cursor, text.len());
        }

        sentences
    }
}

fn push_trimmed<'a>(sentences: &mut Vec<Sentence<'a>>, text: &'a str, start: usize, end: usize) {
    let span = &text[start..end];
    let trimmed = span.trim();
    if trimmed.is_empty() {
        return;
    }
    let leading = span.len() - span.trim_start().len();
    sentences.push(Sentence {
        text: trimmed,
        offset: start + leading,
    });
}
