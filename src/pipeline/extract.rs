//! Per-page extraction: the analyse → generate → assemble sequence.
//!
//! Detailed mode runs a structured analysis call first and uses its answers
//! to shape the markdown-generation prompt; a page with no detected text is
//! finished immediately with an empty result. When the analysis call fails
//! — retries exhausted or an unparseable response — the orchestrator flips
//! to simple extraction for the remainder of the run, not just the current
//! page, and every later page uses the fixed fallback prompt fields.
//!
//! Only analysis failures are recovered. A failed markdown-generation call
//! is fatal to the page and, through the scheduler, to the whole run.

use crate::config::ConversionConfig;
use crate::error::VisionMdError;
use crate::model::{StructuredDescription, VisionModel};
use crate::output::{ExtractedImage, PageResult};
use crate::pipeline::images;
use crate::pipeline::render::RasterImage;
use crate::prompts;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) struct ExtractionOrchestrator {
    model: Arc<dyn VisionModel>,
    config: ConversionConfig,
    /// Set once the structured analysis has failed. Concurrent pages may
    /// race to set it; the set is idempotent, so the race is benign.
    fallback: AtomicBool,
}

impl ExtractionOrchestrator {
    pub(crate) fn new(model: Arc<dyn VisionModel>, config: ConversionConfig) -> Self {
        let fallback = AtomicBool::new(!config.detailed_extraction);
        Self {
            model,
            config,
            fallback,
        }
    }

    /// Convert one rasterised page into a [`PageResult`].
    pub(crate) async fn extract_page(
        &self,
        raster: RasterImage,
    ) -> Result<PageResult, VisionMdError> {
        let page_index = raster.page_index;
        let page_number = page_index + 1;
        let png_base64 = STANDARD.encode(&raster.png);

        let mut analysis = None;
        let mut extracted: Vec<ExtractedImage> = Vec::new();

        if !self.fallback.load(Ordering::Relaxed) {
            match self
                .model
                .structured_call(&png_base64, prompts::ANALYSIS_PROMPT)
                .await
            {
                Ok(description) => {
                    if !description.text_detected.is_yes() {
                        debug!(page = page_number, "no text detected; page is empty");
                        return Ok(PageResult::empty(page_index));
                    }
                    if description.images_detected.is_yes() {
                        if let Some(mode) = self.config.image_mode {
                            extracted = images::extract(&raster, mode, page_index);
                        }
                    }
                    analysis = Some(description);
                }
                Err(err) => {
                    warn!(
                        page = page_number,
                        error = %err,
                        "structured analysis failed; using simple extraction for the rest of the run"
                    );
                    self.fallback.store(true, Ordering::Relaxed);
                }
            }
        }

        let fallback_description;
        let description = match &analysis {
            Some(description) => description,
            None => {
                fallback_description = StructuredDescription::fallback();
                &fallback_description
            }
        };

        let prompt = prompts::markdown_prompt(description, self.config.custom_prompt.as_deref());
        let markdown = self
            .model
            .freeform_call(&png_base64, &prompt)
            .await
            .map_err(|e| VisionMdError::from(e).on_page(page_number))?;

        Ok(PageResult {
            page_index,
            markdown: assemble(markdown, &extracted),
            images: extracted,
        })
    }
}

/// Append one markdown reference per extracted image.
fn assemble(mut markdown: String, images: &[ExtractedImage]) -> String {
    for image in images {
        markdown.push_str(&format!(
            "\n\n![{}]({})",
            image.name,
            image.reference.target()
        ));
    }
    markdown
}
