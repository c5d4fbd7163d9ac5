//! Document input and chunk output

pub mod loader;
pub mod sink;

pub use loader::{DocumentLoader, TextLoader, decode_text, extract_pdf_text, find_markdown_output};
pub use sink::{ChunkManifest, ChunkSink, DirectorySink, SaveReport};
