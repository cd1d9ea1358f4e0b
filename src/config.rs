//! Configuration types for document-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across tasks and diff two runs to understand
//! why their outputs differ.

use crate::error::VisionMdError;
use crate::model::VisionModel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a document-to-Markdown conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use visionmd::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .model("gemini-1.5-flash")
///     .detailed_extraction(true)
///     .enable_concurrency(true)
///     .num_workers(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Rendering DPI used when rasterising each PDF page. Range: 72–400. Default: 150.
    ///
    /// The render transform is built from twice the nominal zoom
    /// (`dpi / 72 * 2` on both axes), so 150 DPI already produces a sharp
    /// oversampled image; raise it only for very small print.
    pub dpi: u32,

    /// Color space of the rendered page image. Default: [`ColorSpace::Rgb`].
    pub color_space: ColorSpace,

    /// Render PDF annotations into the page image. Default: true.
    pub include_annotations: bool,

    /// Keep the alpha channel in the rendered PNG. Default: false.
    pub preserve_transparency: bool,

    /// Vision model identifier. Default: "gemini-1.5-pro".
    ///
    /// Validated against the supported-model allow-list when the converter
    /// is constructed; an unknown name fails with
    /// [`VisionMdError::UnsupportedModel`] before any page is touched.
    pub model: String,

    /// API key for the model provider. Falls back to the `GEMINI_API_KEY`
    /// environment variable when unset.
    pub api_key: Option<String>,

    /// Sampling temperature for markdown generation. Default: 0.7.
    ///
    /// Structured analysis calls always run at temperature 0 regardless of
    /// this setting.
    pub temperature: f32,

    /// Nucleus-sampling top-p for markdown generation. Default: 0.7.
    pub top_p: f32,

    /// Maximum tokens the model may generate per call. Default: None
    /// (provider default).
    pub max_output_tokens: Option<u32>,

    /// How extracted page images are referenced in the output markdown.
    /// Default: None (no image references are appended).
    pub image_mode: Option<ImageMode>,

    /// Run the structured analysis pass before markdown generation.
    /// Default: false.
    ///
    /// When the analysis call fails (retries exhausted or an unparseable
    /// response) the run falls back to simple extraction for the remainder
    /// of the document.
    pub detailed_extraction: bool,

    /// Process pages in concurrent batches. Default: false.
    pub enable_concurrency: bool,

    /// Pages per concurrent batch. Default: available parallelism.
    pub num_workers: usize,

    /// Extra instructions appended to the markdown-generation prompt.
    pub custom_prompt: Option<String>,

    /// Attempts per external model call, including the first. Default: 3.
    pub max_attempts: u32,

    /// First retry delay. Doubles per attempt up to `retry_max_delay`.
    /// Default: 4 s.
    pub retry_base_delay: Duration,

    /// Ceiling on the retry delay. Default: 10 s.
    pub retry_max_delay: Duration,

    /// Per-request deadline on model calls. `None` disables the deadline
    /// and a stalled call blocks its batch indefinitely. Default: 60 s.
    pub api_timeout: Option<Duration>,

    /// Pre-constructed vision model. Takes precedence over `model`.
    ///
    /// Intended for tests (deterministic stubs) and callers that need
    /// custom middleware around the model.
    pub vision_model: Option<Arc<dyn VisionModel>>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dpi: 150,
            color_space: ColorSpace::Rgb,
            include_annotations: true,
            preserve_transparency: false,
            model: "gemini-1.5-pro".to_string(),
            api_key: None,
            temperature: 0.7,
            top_p: 0.7,
            max_output_tokens: None,
            image_mode: None,
            detailed_extraction: false,
            enable_concurrency: false,
            num_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            custom_prompt: None,
            max_attempts: 3,
            retry_base_delay: Duration::from_secs(4),
            retry_max_delay: Duration::from_secs(10),
            api_timeout: Some(Duration::from_secs(60)),
            vision_model: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("dpi", &self.dpi)
            .field("color_space", &self.color_space)
            .field("include_annotations", &self.include_annotations)
            .field("preserve_transparency", &self.preserve_transparency)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("image_mode", &self.image_mode)
            .field("detailed_extraction", &self.detailed_extraction)
            .field("enable_concurrency", &self.enable_concurrency)
            .field("num_workers", &self.num_workers)
            .field("max_attempts", &self.max_attempts)
            .field("vision_model", &self.vision_model.as_ref().map(|_| "<dyn VisionModel>"))
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn color_space(mut self, cs: ColorSpace) -> Self {
        self.config.color_space = cs;
        self
    }

    pub fn include_annotations(mut self, v: bool) -> Self {
        self.config.include_annotations = v;
        self
    }

    pub fn preserve_transparency(mut self, v: bool) -> Self {
        self.config.preserve_transparency = v;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn top_p(mut self, p: f32) -> Self {
        self.config.top_p = p.clamp(0.0, 1.0);
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.config.max_output_tokens = Some(n);
        self
    }

    pub fn image_mode(mut self, mode: ImageMode) -> Self {
        self.config.image_mode = Some(mode);
        self
    }

    pub fn detailed_extraction(mut self, v: bool) -> Self {
        self.config.detailed_extraction = v;
        self
    }

    pub fn enable_concurrency(mut self, v: bool) -> Self {
        self.config.enable_concurrency = v;
        self
    }

    pub fn num_workers(mut self, n: usize) -> Self {
        self.config.num_workers = n.max(1);
        self
    }

    pub fn custom_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.custom_prompt = Some(prompt.into());
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    pub fn retry_base_delay(mut self, d: Duration) -> Self {
        self.config.retry_base_delay = d;
        self
    }

    pub fn retry_max_delay(mut self, d: Duration) -> Self {
        self.config.retry_max_delay = d;
        self
    }

    pub fn api_timeout(mut self, d: Option<Duration>) -> Self {
        self.config.api_timeout = d;
        self
    }

    pub fn vision_model(mut self, model: Arc<dyn VisionModel>) -> Self {
        self.config.vision_model = Some(model);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, VisionMdError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(VisionMdError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.num_workers == 0 {
            return Err(VisionMdError::InvalidConfig(
                "num_workers must be ≥ 1".into(),
            ));
        }
        if c.max_attempts == 0 {
            return Err(VisionMdError::InvalidConfig(
                "max_attempts must be ≥ 1".into(),
            ));
        }
        if c.retry_max_delay < c.retry_base_delay {
            return Err(VisionMdError::InvalidConfig(
                "retry_max_delay must be ≥ retry_base_delay".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Color space of the rendered page image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    /// Full-color rendering. (default)
    #[default]
    Rgb,
    /// Grayscale rendering; smaller payloads for text-only documents.
    Grayscale,
}

/// How extracted page images are referenced in the output markdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageMode {
    /// Each image gets a deterministic per-page locator, emitted as the
    /// reference target.
    Url,
    /// Each image is inlined as a base64 data URI.
    Base64,
}
