//! semchunk-rs CLI application
//!
//! Command-line interface for the semchunk-rs library.

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use semchunk_rs::config::Config;
use semchunk_rs::ml::{LocalEmbeddingConfig, RemoteEmbeddingConfig};
use semchunk_rs::utils::{format_file_size, is_supported_document, preview};
use semchunk_rs::{
    BreakpointThreshold, ChunkSink, DirectorySink, DocumentLoader, EmbeddingConfig,
    SemanticChunker, TextLoader, ThresholdKind, create_provider,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

const PREVIEW_CHARS: usize = 300;

#[derive(Parser)]
#[command(name = "semchunk-rs")]
#[command(about = "Split documents into semantically coherent chunks using sentence embeddings")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    Local,
    Remote,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a document (pdf, txt, md) into semantic chunks
    Split {
        /// Input document; prompted for when omitted
        input: Option<PathBuf>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Embedding backend
        #[arg(long, value_enum)]
        backend: Option<Backend>,

        /// Embedding model name
        #[arg(short, long)]
        model: Option<String>,

        /// Remote embedding endpoint (implies the remote backend)
        #[arg(long)]
        api_url: Option<String>,

        /// Remote embedding API key
        #[arg(long)]
        api_key: Option<String>,

        /// Breakpoint threshold policy
        #[arg(short = 't', long, value_enum)]
        threshold_type: Option<ThresholdKind>,

        /// Threshold amount (percentile, or k for deviation-based policies)
        #[arg(short = 'a', long)]
        threshold_amount: Option<f64>,

        /// Neighbor sentences embedded together with each sentence
        #[arg(long)]
        buffer_size: Option<usize>,

        /// Output root directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of chunks to preview after splitting
        #[arg(long, default_value = "3")]
        preview: usize,
    },

    /// Print or write the default configuration
    Config {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Command-line overrides applied on top of the configuration file
#[derive(Default)]
struct Overrides {
    backend: Option<Backend>,
    model: Option<String>,
    api_url: Option<String>,
    api_key: Option<String>,
    threshold_type: Option<ThresholdKind>,
    threshold_amount: Option<f64>,
    buffer_size: Option<usize>,
    output: Option<PathBuf>,
}

impl Overrides {
    fn apply(self, config: &mut Config) {
        match (self.backend, &config.embedding) {
            (Some(Backend::Remote), EmbeddingConfig::Local(_)) => {
                config.embedding = EmbeddingConfig::Remote(RemoteEmbeddingConfig::default());
            }
            (Some(Backend::Local), EmbeddingConfig::Remote(_)) => {
                config.embedding = EmbeddingConfig::Local(LocalEmbeddingConfig::default());
            }
            _ => {}
        }
        if let Some(url) = self.api_url {
            config.embedding.set_api_url(url);
        }
        if let Some(key) = self.api_key {
            config.embedding.set_api_key(key);
        }
        if let Some(model) = self.model {
            config.embedding.set_model(model);
        }

        match (self.threshold_type, self.threshold_amount) {
            (Some(kind), amount) => {
                config.chunking.threshold = BreakpointThreshold::from_kind(kind, amount);
            }
            (None, Some(amount)) => {
                let kind = config.chunking.threshold.kind();
                config.chunking.threshold = BreakpointThreshold::from_kind(kind, Some(amount));
            }
            (None, None) => {}
        }
        if let Some(buffer_size) = self.buffer_size {
            config.chunking.buffer_size = buffer_size;
        }
        if let Some(output) = self.output {
            config.output.directory = Some(output);
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Split {
            input,
            config,
            backend,
            model,
            api_url,
            api_key,
            threshold_type,
            threshold_amount,
            buffer_size,
            output,
            preview,
        } => {
            let overrides = Overrides {
                backend,
                model,
                api_url,
                api_key,
                threshold_type,
                threshold_amount,
                buffer_size,
                output,
            };
            split_command(input, config, overrides, preview)?;
        }
        Commands::Config { output } => {
            config_command(output)?;
        }
    }

    Ok(())
}

fn split_command(
    input: Option<PathBuf>,
    config_path: Option<PathBuf>,
    overrides: Overrides,
    preview_count: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let input = match input {
        Some(path) => path,
        None => match prompt_for_path()? {
            Some(path) => path,
            None => return Ok(()),
        },
    };

    if !input.is_file() {
        eprintln!("❌ File not found: {}", input.display());
        return Ok(());
    }
    if !is_supported_document(&input) {
        eprintln!(
            "❌ Unsupported file format: {} (expected pdf, txt or md)",
            input.display()
        );
        return Ok(());
    }

    let mut config = match config_path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env();
    overrides.apply(&mut config);
    config.validate()?;

    let size = std::fs::metadata(&input).map(|m| m.len()).unwrap_or(0);
    println!("📄 Processing: {} ({})", input.display(), format_file_size(size));

    let pb = spinner("Loading document...");
    let loader = DocumentLoader::new(config.loader.clone());
    let text = loader.load(&input);
    pb.finish_and_clear();

    if text.trim().is_empty() {
        eprintln!("❌ No text could be extracted from {}", input.display());
        return Ok(());
    }
    println!("📝 Loaded {} characters", text.chars().count());

    let pb = spinner("Loading embedding model...");
    let provider = create_provider(&config.embedding);
    pb.finish_and_clear();
    let chunker = SemanticChunker::new(provider?, config.chunking.clone())?;

    let start_time = Instant::now();
    let pb = spinner("Splitting into semantic chunks...");
    let chunks = chunker.split(&text);
    pb.finish_and_clear();
    let chunks = chunks?;

    println!("✅ Splitting complete!");
    println!("   📊 Chunks: {}", chunks.len());
    println!("   ⏱️  Time: {:.2}s", start_time.elapsed().as_secs_f64());

    let source = input.to_string_lossy();
    let sink = DirectorySink::new(config.output.directory.clone());
    match sink.save(&chunks, &source) {
        Some(report) => {
            println!("   📁 Output: {}", report.directory.display());
            println!("   📋 Combined: {}", report.combined_file.display());
        }
        None => eprintln!("❌ Failed to save chunks, see log for details"),
    }

    if preview_count > 0 && !chunks.is_empty() {
        println!();
        println!("🔍 Preview:");
        for (i, chunk) in chunks.iter().take(preview_count).enumerate() {
            println!("{}. ({} chars)", i + 1, chunk.chars().count());
            println!("   {}", preview(chunk, PREVIEW_CHARS));
            println!();
        }
    }

    Ok(())
}

fn config_command(output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    match output {
        Some(path) => {
            config.save(&path)?;
            println!("✅ Default configuration written to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&config)?),
    }
    Ok(())
}

/// Ask for a document path on stdin; `None` when the user quits
fn prompt_for_path() -> io::Result<Option<PathBuf>> {
    loop {
        print!("📂 Document path (pdf, txt, md; 'quit' to exit): ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        let input = clean_path_input(&input);

        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            println!("👋 Goodbye!");
            return Ok(None);
        }

        let path = PathBuf::from(input);
        if !path.is_file() {
            eprintln!("❌ File not found: {}", path.display());
            continue;
        }
        if !is_supported_document(&path) {
            eprintln!("❌ Unsupported file format: {}", path.display());
            continue;
        }
        return Ok(Some(path));
    }
}

/// Trim whitespace and surrounding quotes left by drag-and-drop
fn clean_path_input(input: &str) -> &str {
    input.trim().trim_matches(|c| c == '"' || c == '\'')
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner());
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
