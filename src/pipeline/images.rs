//! Embedded-image extraction: rendered-page bitmaps → markdown references.

use crate::config::ImageMode;
use crate::output::{ExtractedImage, ImageRef};
use crate::pipeline::render::RasterImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// Turn the embedded bitmaps of a rendered page into reference-ready
/// images. `url` mode assigns each a deterministic locator; `base64` mode
/// inlines the bytes as a data URI. Empty when the page has no embedded
/// bitmaps.
pub(crate) fn extract(
    raster: &RasterImage,
    mode: ImageMode,
    page_index: usize,
) -> Vec<ExtractedImage> {
    let images: Vec<ExtractedImage> = raster
        .embedded
        .iter()
        .enumerate()
        .map(|(n, png)| {
            let name = locator(page_index, n);
            let reference = match mode {
                ImageMode::Url => ImageRef::Url {
                    locator: name.clone(),
                },
                ImageMode::Base64 => ImageRef::Inline {
                    data_uri: format!("data:image/png;base64,{}", STANDARD.encode(png)),
                },
            };
            ExtractedImage {
                page_index,
                name,
                reference,
            }
        })
        .collect();

    if !images.is_empty() {
        debug!(page = page_index + 1, count = images.len(), "extracted embedded images");
    }
    images
}

/// Deterministic per-page, per-image locator (both parts 1-based).
fn locator(page_index: usize, image_index: usize) -> String {
    format!("page_{}_image_{}.png", page_index + 1, image_index + 1)
}
