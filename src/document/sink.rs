//! Chunk persistence
//!
//! Layout under the output root, for a source `paper.pdf`:
//!
//! ```text
//! paper/
//!   paper.chunk.1.txt
//!   paper.chunk.2.txt
//!   paper.all_chunks.txt
//!   paper.manifest.json
//! ```

use crate::error::Result;
use crate::utils::{document_stem, ensure_directory};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Destination for finished chunks
pub trait ChunkSink {
    /// Persist chunks produced from `source`.
    ///
    /// Failures are logged; `None` means nothing was written.
    fn save(&self, chunks: &[String], source: &str) -> Option<SaveReport>;
}

/// Files written by a successful save
#[derive(Debug, Clone)]
pub struct SaveReport {
    pub directory: PathBuf,
    pub chunk_files: Vec<PathBuf>,
    pub combined_file: PathBuf,
    pub manifest_file: PathBuf,
}

/// Manifest describing a saved document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkManifest {
    pub source: String,
    pub chunk_count: usize,
    /// Character length of each chunk, in order
    pub chunk_chars: Vec<usize>,
    pub created_at: DateTime<Utc>,
}

/// Writes chunks as text files grouped by document
pub struct DirectorySink {
    root: Option<PathBuf>,
}

impl DirectorySink {
    /// Create a sink; with no root, output goes to `<source dir>/output`
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    /// Directory that chunks of `source` are written to
    pub fn document_dir(&self, source: &str) -> PathBuf {
        let source_path = Path::new(source);
        let root = self.root.clone().unwrap_or_else(|| {
            source_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("output")
        });
        root.join(document_stem(source_path))
    }

    fn write_all(&self, chunks: &[String], source: &str) -> Result<SaveReport> {
        let stem = document_stem(source);
        let directory = self.document_dir(source);
        ensure_directory(&directory)?;

        let mut chunk_files = Vec::with_capacity(chunks.len());
        let mut combined = String::new();

        for (i, chunk) in chunks.iter().enumerate() {
            let number = i + 1;
            let chunk_path = directory.join(format!("{}.chunk.{}.txt", stem, number));
            std::fs::write(&chunk_path, chunk)?;
            chunk_files.push(chunk_path);

            let _ = write!(combined, "=== Chunk {} ===\n{}\n\n", number, chunk);
        }

        let combined_file = directory.join(format!("{}.all_chunks.txt", stem));
        std::fs::write(&combined_file, combined)?;

        let manifest = ChunkManifest {
            source: source.to_string(),
            chunk_count: chunks.len(),
            chunk_chars: chunks.iter().map(|c| c.chars().count()).collect(),
            created_at: Utc::now(),
        };
        let manifest_file = directory.join(format!("{}.manifest.json", stem));
        std::fs::write(&manifest_file, serde_json::to_string_pretty(&manifest)?)?;

        Ok(SaveReport {
            directory,
            chunk_files,
            combined_file,
            manifest_file,
        })
    }
}

impl ChunkSink for DirectorySink {
    fn save(&self, chunks: &[String], source: &str) -> Option<SaveReport> {
        if chunks.is_empty() {
            log::warn!("No chunks to save for '{}'", source);
            return None;
        }
        match self.write_all(chunks, source) {
            Ok(report) => {
                log::info!(
                    "Saved {} chunks to {:?}",
                    report.chunk_files.len(),
                    report.directory
                );
                Some(report)
            }
            Err(e) => {
                log::error!("Failed to save chunks for '{}': {}", source, e);
                None
            }
        }
    }
}
