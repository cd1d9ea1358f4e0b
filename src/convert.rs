//! Conversion entry points.

use crate::config::ConversionConfig;
use crate::error::VisionMdError;
use crate::model::{self, VisionModel};
use crate::output::PageResult;
use crate::pipeline::extract::ExtractionOrchestrator;
use crate::pipeline::schedule;
use crate::pipeline::source::PageSource;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// A validated conversion setup: the model client plus the run config.
///
/// Construction is the fatal gate for configuration problems — an
/// unrecognised model name fails in [`Converter::new`], before any input
/// file or network is touched. The converter is reusable across documents.
pub struct Converter {
    model: Arc<dyn VisionModel>,
    config: ConversionConfig,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("model", &self.model.name())
            .finish_non_exhaustive()
    }
}

impl Converter {
    /// Validate the configured model against the allow-list and build the
    /// provider client.
    ///
    /// # Errors
    /// [`VisionMdError::UnsupportedModel`] for a model name outside the
    /// allow-list.
    pub fn new(config: ConversionConfig) -> Result<Self, VisionMdError> {
        let model = model::resolve(&config)?;
        Ok(Self { model, config })
    }

    /// Convert a document into ordered per-page markdown results.
    ///
    /// The returned list always covers every page of the source, in page
    /// order. Any page failure aborts the whole conversion — no partial
    /// list is returned.
    ///
    /// # Errors
    /// - [`VisionMdError::NotFound`] / [`VisionMdError::UnsupportedFormat`]
    ///   for unusable inputs
    /// - [`VisionMdError::DocumentOpen`] when the document cannot be parsed
    /// - [`VisionMdError::Conversion`] when a page fails, carrying its
    ///   1-based number and the underlying cause
    pub async fn convert(&self, input: impl AsRef<Path>) -> Result<Vec<PageResult>, VisionMdError> {
        let input = input.as_ref();
        let started = Instant::now();
        info!(input = %input.display(), model = self.model.name(), "starting conversion");

        let source = PageSource::open(input, &self.config).await?;
        let orchestrator =
            ExtractionOrchestrator::new(Arc::clone(&self.model), self.config.clone());
        let results = schedule::run(&source, &orchestrator, &self.config).await?;

        info!(
            pages = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "conversion finished"
        );
        Ok(results)
    }

    /// Blocking wrapper around [`Converter::convert`].
    ///
    /// Creates a temporary tokio runtime internally; do not call from
    /// within an async context.
    pub fn convert_sync(&self, input: impl AsRef<Path>) -> Result<Vec<PageResult>, VisionMdError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| VisionMdError::Internal(format!("failed to create tokio runtime: {e}")))?
            .block_on(self.convert(input))
    }
}

/// Convert a document with a one-shot [`Converter`].
pub async fn convert(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<Vec<PageResult>, VisionMdError> {
    Converter::new(config.clone())?.convert(input).await
}

/// Blocking variant of [`convert`].
pub fn convert_sync(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<Vec<PageResult>, VisionMdError> {
    Converter::new(config.clone())?.convert_sync(input)
}
