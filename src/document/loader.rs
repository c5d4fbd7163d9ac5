//! Document loading
//!
//! Loading is best effort: any failure is logged and an empty string is
//! returned, which callers treat as "nothing to chunk".

use crate::config::LoaderConfig;
use crate::error::{Result, SemchunkError};
use crate::text::clean_markdown;
use crate::utils::{document_stem, ensure_directory, get_file_extension};

use std::path::{Path, PathBuf};
use std::process::Command;

/// Yields raw text from a source document
pub trait TextLoader {
    /// Load a document; returns an empty string on unrecoverable failure
    fn load(&self, path: &Path) -> String;
}

/// Loader dispatching on file extension
pub struct DocumentLoader {
    config: LoaderConfig,
}

impl DocumentLoader {
    /// Create a loader with the given configuration
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Read a plain text file, falling back to GBK when it is not UTF-8
    fn load_text_file(&self, path: &Path) -> String {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::error!("Failed to read {:?}: {}", path, e);
                return String::new();
            }
        };

        match decode_text(&bytes) {
            Some(text) => text,
            None => {
                log::error!("{:?} is neither valid UTF-8 nor GBK", path);
                String::new()
            }
        }
    }

    fn load_markdown_file(&self, path: &Path) -> String {
        clean_markdown(&self.load_text_file(path))
    }

    /// Convert a PDF to markdown with the external converter, then clean it
    fn load_pdf(&self, path: &Path) -> String {
        if let Some(markdown) = self.convert_pdf(path) {
            let cleaned = clean_markdown(&markdown);
            log::info!("Cleaned converted markdown: {} characters", cleaned.chars().count());
            return cleaned;
        }

        if self.config.pdf_fallback {
            log::warn!("Falling back to in-process PDF text extraction for {:?}", path);
            return extract_pdf_text(path).unwrap_or_else(|e| {
                log::error!("{}", e);
                String::new()
            });
        }
        String::new()
    }

    /// Directory the converter writes into
    fn pdf_output_dir(&self, path: &Path) -> PathBuf {
        self.config.pdf_output_dir.clone().unwrap_or_else(|| {
            path.parent()
                .unwrap_or_else(|| Path::new("."))
                .join("output")
        })
    }

    fn convert_pdf(&self, path: &Path) -> Option<String> {
        let output_dir = self.pdf_output_dir(path);
        if let Err(e) = ensure_directory(&output_dir) {
            log::error!("Failed to create converter output directory {:?}: {}", output_dir, e);
            return None;
        }

        let mut parts = self.config.pdf_converter.split_whitespace();
        let program = parts.next()?;
        let mut command = Command::new(program);
        command
            .args(parts)
            .arg("-p")
            .arg(path)
            .arg("-o")
            .arg(&output_dir);

        log::info!("Running PDF converter: {:?}", command);
        match command.status() {
            Ok(status) if !status.success() => {
                // Partial output is still worth looking for
                log::warn!(
                    "PDF converter exited with {}, looking for output anyway",
                    status
                );
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::error!(
                    "PDF converter '{}' not found; make sure it is installed and on PATH",
                    program
                );
                return None;
            }
            Err(e) => {
                log::error!("Failed to run PDF converter '{}': {}", program, e);
                return None;
            }
        }

        let stem = document_stem(path);
        let Some(markdown_path) = find_markdown_output(&output_dir, &stem) else {
            log::error!("No markdown output for '{}' in {:?}", stem, output_dir);
            return None;
        };

        log::info!("Found markdown file: {:?}", markdown_path);
        match std::fs::read_to_string(&markdown_path) {
            Ok(markdown) => Some(markdown),
            Err(e) => {
                log::error!("Failed to read {:?}: {}", markdown_path, e);
                None
            }
        }
    }
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

impl TextLoader for DocumentLoader {
    fn load(&self, path: &Path) -> String {
        log::info!("Loading document {:?}", path);
        match get_file_extension(path).as_deref() {
            Some("txt") => self.load_text_file(path),
            Some("md") | Some("markdown") => self.load_markdown_file(path),
            Some("pdf") => self.load_pdf(path),
            other => {
                log::error!("Unsupported document format {:?} for {:?}", other, path);
                String::new()
            }
        }
    }
}

/// Decode bytes as UTF-8 (BOM stripped), falling back to GBK
pub fn decode_text(bytes: &[u8]) -> Option<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Some(text.to_string()),
        Err(_) => {
            let (text, had_errors) = encoding_rs::GBK.decode_without_bom_handling(bytes);
            if had_errors {
                None
            } else {
                log::debug!("Decoded {} bytes as GBK", bytes.len());
                Some(text.into_owned())
            }
        }
    }
}

/// Locate the converter's markdown output for a document stem.
///
/// Looks in `<dir>/<stem>/auto`, `<dir>/<stem>` and `<dir>`, returning the
/// first (by name) `.md` file whose name starts with the stem.
pub fn find_markdown_output(output_dir: &Path, stem: &str) -> Option<PathBuf> {
    let candidates = [
        output_dir.join(stem).join("auto"),
        output_dir.join(stem),
        output_dir.to_path_buf(),
    ];

    candidates.iter().filter(|dir| dir.is_dir()).find_map(|dir| {
        let mut matches: Vec<PathBuf> = std::fs::read_dir(dir)
            .ok()?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && get_file_extension(p).as_deref() == Some("md")
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(stem))
            })
            .collect();
        matches.sort();
        matches.into_iter().next()
    })
}

/// Extract plain text from a PDF without external tools
pub fn extract_pdf_text(path: &Path) -> Result<String> {
    let text = pdf_extract::extract_text(path).map_err(|e| {
        SemchunkError::Pdf(format!("Text extraction failed for {:?}: {}", path, e))
    })?;
    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_decode_utf8_with_bom() {
        let bytes = b"\xEF\xBB\xBFHello.".to_vec();
        assert_eq!(decode_text(&bytes).as_deref(), Some("Hello."));
    }

    #[test]
    fn test_decode_gbk_fallback() {
        let (bytes, _, _) = encoding_rs::GBK.encode("你好，世界。");
        assert!(std::str::from_utf8(&bytes).is_err());
        assert_eq!(decode_text(&bytes).as_deref(), Some("你好，世界。"));
    }

    #[test]
    fn test_load_text_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.txt");
        std::fs::write(&path, "First. Second.").unwrap();

        let loader = DocumentLoader::default();
        assert_eq!(loader.load(&path), "First. Second.");
    }

    #[test]
    fn test_load_markdown_is_cleaned() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("readme.md");
        std::fs::write(&path, "# Title\n```\ncode\n```\n| a | b |\nText.").unwrap();

        let loader = DocumentLoader::default();
        assert_eq!(loader.load(&path), "# Title\nText.");
    }

    #[test]
    fn test_missing_and_unsupported_files() {
        let temp_dir = TempDir::new().unwrap();
        let loader = DocumentLoader::default();

        assert_eq!(loader.load(&temp_dir.path().join("missing.txt")), "");

        let image = temp_dir.path().join("photo.jpg");
        std::fs::write(&image, [0xFFu8, 0xD8]).unwrap();
        assert_eq!(loader.load(&image), "");
    }

    #[test]
    fn test_find_markdown_output_prefers_auto_dir() {
        let temp_dir = TempDir::new().unwrap();
        let auto_dir = temp_dir.path().join("paper").join("auto");
        std::fs::create_dir_all(&auto_dir).unwrap();
        std::fs::write(auto_dir.join("paper.md"), "auto").unwrap();
        std::fs::write(temp_dir.path().join("paper.md"), "root").unwrap();

        let found = find_markdown_output(temp_dir.path(), "paper").unwrap();
        assert_eq!(found, auto_dir.join("paper.md"));
    }

    #[test]
    fn test_find_markdown_output_ignores_other_documents() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("other.md"), "x").unwrap();
        assert!(find_markdown_output(temp_dir.path(), "paper").is_none());
    }

    #[test]
    fn test_pdf_with_missing_converter_and_no_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let pdf = temp_dir.path().join("scan.pdf");
        std::fs::write(&pdf, b"%PDF-1.4 not really").unwrap();

        let loader = DocumentLoader::new(LoaderConfig {
            pdf_converter: "semchunk-test-no-such-converter".to_string(),
            pdf_output_dir: Some(temp_dir.path().join("out")),
            pdf_fallback: false,
        });
        assert_eq!(loader.load(&pdf), "");
    }

    #[test]
    fn test_extract_pdf_text_rejects_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let pdf = temp_dir.path().join("broken.pdf");
        std::fs::write(&pdf, b"definitely not a pdf").unwrap();

        let err = extract_pdf_text(&pdf).unwrap_err();
        assert!(matches!(err, SemchunkError::Pdf(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_pdf_uses_existing_converter_output() {
        // `true` exits successfully without writing anything; the markdown is pre-seeded
        let temp_dir = TempDir::new().unwrap();
        let pdf = temp_dir.path().join("paper.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();

        let out = temp_dir.path().join("output");
        std::fs::create_dir_all(out.join("paper").join("auto")).unwrap();
        std::fs::write(
            out.join("paper").join("auto").join("paper.md"),
            "Intro.\n| x | y |\nBody text.",
        )
        .unwrap();

        let loader = DocumentLoader::new(LoaderConfig {
            pdf_converter: "true".to_string(),
            pdf_output_dir: None,
            pdf_fallback: false,
        });
        assert_eq!(loader.load(&pdf), "Intro.\nBody text.");
    }

    #[cfg(unix)]
    #[test]
    fn test_pdf_failed_converter_still_finds_output() {
        // `false` exits non-zero; partial output left behind is still used
        let temp_dir = TempDir::new().unwrap();
        let pdf = temp_dir.path().join("paper.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();

        let auto_dir = temp_dir.path().join("output").join("paper").join("auto");
        std::fs::create_dir_all(&auto_dir).unwrap();
        std::fs::write(auto_dir.join("paper.md"), "Partial.\n```\nskipped\n```\nOutput.").unwrap();

        let loader = DocumentLoader::new(LoaderConfig {
            pdf_converter: "false".to_string(),
            pdf_output_dir: None,
            pdf_fallback: false,
        });
        assert_eq!(loader.load(&pdf), "Partial.\nOutput.");
    }
}
