//! visionmd CLI: convert a PDF or image to Markdown from the shell.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use visionmd::{ColorSpace, ConversionConfig, Converter, ImageMode};

#[derive(Parser)]
#[command(
    name = "visionmd",
    version,
    about = "Convert PDF documents and images to Markdown using vision language models"
)]
struct Cli {
    /// Input document (.pdf, .png, .jpg, .jpeg)
    input: PathBuf,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "markdown")]
    format: OutputFormat,

    /// Vision model identifier
    #[arg(long, default_value = "gemini-1.5-pro")]
    model: String,

    /// API key (falls back to GEMINI_API_KEY)
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Rendering DPI (72-400)
    #[arg(long, default_value_t = 150)]
    dpi: u32,

    /// Render pages in grayscale
    #[arg(long)]
    grayscale: bool,

    /// Sampling temperature for markdown generation
    #[arg(long, default_value_t = 0.7)]
    temperature: f32,

    /// Nucleus-sampling top-p for markdown generation
    #[arg(long, default_value_t = 0.7)]
    top_p: f32,

    /// Cap on tokens generated per model call
    #[arg(long)]
    max_output_tokens: Option<u32>,

    /// Run the structured analysis pass before generation
    #[arg(long)]
    detailed: bool,

    /// Append extracted image references to each page
    #[arg(long, value_enum)]
    image_mode: Option<ImageModeArg>,

    /// Process pages in concurrent batches
    #[arg(long)]
    concurrent: bool,

    /// Pages per concurrent batch
    #[arg(long)]
    workers: Option<usize>,

    /// Extra instructions appended to the generation prompt
    #[arg(long)]
    prompt: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum ImageModeArg {
    Url,
    Base64,
}

impl From<ImageModeArg> for ImageMode {
    fn from(mode: ImageModeArg) -> Self {
        match mode {
            ImageModeArg::Url => ImageMode::Url,
            ImageModeArg::Base64 => ImageMode::Base64,
        }
    }
}

/// One entry of the JSON output: 1-based page number plus its markdown.
#[derive(Serialize)]
struct PageOut<'a> {
    page: usize,
    content: &'a str,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "visionmd=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut builder = ConversionConfig::builder()
        .model(&cli.model)
        .dpi(cli.dpi)
        .temperature(cli.temperature)
        .top_p(cli.top_p)
        .detailed_extraction(cli.detailed)
        .enable_concurrency(cli.concurrent);
    if cli.grayscale {
        builder = builder.color_space(ColorSpace::Grayscale);
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(max) = cli.max_output_tokens {
        builder = builder.max_output_tokens(max);
    }
    if let Some(mode) = cli.image_mode {
        builder = builder.image_mode(mode.into());
    }
    if let Some(workers) = cli.workers {
        builder = builder.num_workers(workers);
    }
    if let Some(ref prompt) = cli.prompt {
        builder = builder.custom_prompt(prompt);
    }
    let config = builder.build().context("invalid configuration")?;

    let converter = Converter::new(config)?;
    let pages = converter.convert(&cli.input).await?;

    let rendered = match cli.format {
        OutputFormat::Markdown => pages
            .iter()
            .map(|p| p.markdown.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"),
        OutputFormat::Json => {
            let entries: Vec<PageOut<'_>> = pages
                .iter()
                .map(|p| PageOut {
                    page: p.page_number(),
                    content: &p.markdown,
                })
                .collect();
            serde_json::to_string_pretty(&entries).context("failed to serialise output")?
        }
    };

    match cli.output {
        Some(path) => std::fs::write(&path, rendered)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{rendered}"),
    }
    Ok(())
}
