//! # visionmd
//!
//! Convert PDF documents and raster images to Markdown using vision
//! language models.
//!
//! Each page is rasterised to a PNG and handed to a vision-capable LLM that
//! reads it as a human would, producing Markdown that preserves structure,
//! tables, and formulae where plain text extractors garble them.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / PNG / JPEG
//!  │
//!  ├─ 1. Source    open the document (or wrap the image as one page)
//!  ├─ 2. Render    rasterise each page on a dedicated pdfium thread
//!  ├─ 3. Analyze   optional structured pass: what does the page contain?
//!  ├─ 4. Generate  markdown-generation call shaped by the analysis
//!  ├─ 5. Assemble  append extracted image references
//!  └─ 6. Schedule  concurrency-bounded batches, output in page order
//! ```
//!
//! The analysis pass (step 3) runs only with `detailed_extraction` enabled.
//! If it fails, the run degrades to simple extraction for the remaining
//! pages instead of failing; if it reports a page as empty, the page is
//! finished without a generation call at all.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use visionmd::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from GEMINI_API_KEY unless set on the config
//!     let config = ConversionConfig::builder()
//!         .model("gemini-1.5-flash")
//!         .detailed_extraction(true)
//!         .build()?;
//!     for page in convert("document.pdf", &config).await? {
//!         println!("## page {}\n{}", page.page_number(), page.markdown);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `visionmd` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! visionmd = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod output;
pub mod prompts;

mod pipeline;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ColorSpace, ConversionConfig, ConversionConfigBuilder, ImageMode};
pub use convert::{convert, convert_sync, Converter};
pub use error::VisionMdError;
pub use model::{ApiCallError, Detected, ModelError, StructuredDescription, VisionModel};
pub use output::{ExtractedImage, ImageRef, PageResult};
