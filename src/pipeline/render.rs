//! Page rasterisation: pdfium page (or decoded standalone image) → PNG.
//!
//! Everything here runs on the document worker thread owned by
//! [`PageSource`](crate::pipeline::source::PageSource); pdfium is not
//! async-safe, so no pdfium type ever crosses onto the tokio workers. The
//! produced [`RasterImage`] is plain bytes and moves freely between tasks.

use crate::config::{ColorSpace, ConversionConfig};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::io::Cursor;
use tracing::debug;

/// Render settings fixed for the duration of a run.
#[derive(Debug, Clone)]
pub(crate) struct RenderSettings {
    pub dpi: u32,
    pub color_space: ColorSpace,
    pub include_annotations: bool,
    pub preserve_transparency: bool,
    /// Capture the page's embedded bitmaps alongside the raster. Only set
    /// when the run can actually use them (detailed extraction with an
    /// image mode configured).
    pub capture_embedded: bool,
}

impl RenderSettings {
    pub(crate) fn from_config(config: &ConversionConfig) -> Self {
        Self {
            dpi: config.dpi,
            color_space: config.color_space,
            include_annotations: config.include_annotations,
            preserve_transparency: config.preserve_transparency,
            capture_embedded: config.detailed_extraction && config.image_mode.is_some(),
        }
    }
}

/// One rasterised page. Transient: produced by a single render request,
/// consumed by a single extraction, then dropped.
#[derive(Debug, Clone)]
pub(crate) struct RasterImage {
    /// 0-based page index.
    pub page_index: usize,
    /// PNG-encoded page image.
    pub png: Vec<u8>,
    /// PNG-encoded embedded bitmaps found on the page, in object order.
    pub embedded: Vec<Vec<u8>>,
}

/// Scale factor applied to both axes: nominal DPI zoom, doubled.
pub(crate) fn render_scale(dpi: u32) -> f32 {
    (dpi as f32 / 72.0) * 2.0
}

/// Rasterise one PDF page. Page rotation is applied by pdfium itself, so
/// the raster's orientation always matches the source. Errors return the
/// pdfium detail string; the caller attaches page context.
pub(crate) fn render_pdf_page(
    document: &PdfDocument<'_>,
    page_index: usize,
    settings: &RenderSettings,
) -> Result<RasterImage, String> {
    let page = document
        .pages()
        .get(page_index as u16)
        .map_err(|e| format!("{e:?}"))?;

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(render_scale(settings.dpi))
        .render_annotations(settings.include_annotations);

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| format!("{e:?}"))?;
    let image = bitmap.as_image();
    debug!(
        page = page_index + 1,
        width = image.width(),
        height = image.height(),
        "rendered page"
    );

    let mut embedded = Vec::new();
    if settings.capture_embedded {
        for object in page.objects().iter() {
            if let Some(image_object) = object.as_image_object() {
                match image_object.get_raw_image() {
                    Ok(raw) => match encode_png(&raw) {
                        Ok(png) => embedded.push(png),
                        Err(e) => debug!(page = page_index + 1, "skipping embedded image: {e}"),
                    },
                    Err(e) => debug!(page = page_index + 1, "unreadable embedded image: {e:?}"),
                }
            }
        }
    }

    let png = encode_page_png(&image, settings).map_err(|e| e.to_string())?;
    Ok(RasterImage {
        page_index,
        png,
        embedded,
    })
}

/// Rasterise the synthetic page wrapping a standalone image: the image at
/// full resolution, re-encoded under the configured color settings.
pub(crate) fn render_synthetic_page(
    image: &DynamicImage,
    settings: &RenderSettings,
) -> Result<RasterImage, String> {
    let png = encode_page_png(image, settings).map_err(|e| e.to_string())?;
    let embedded = if settings.capture_embedded {
        vec![encode_png(image).map_err(|e| e.to_string())?]
    } else {
        Vec::new()
    };
    Ok(RasterImage {
        page_index: 0,
        png,
        embedded,
    })
}

/// Encode a page raster, honoring color space and transparency settings.
fn encode_page_png(
    image: &DynamicImage,
    settings: &RenderSettings,
) -> Result<Vec<u8>, image::ImageError> {
    let converted = match (settings.color_space, settings.preserve_transparency) {
        (ColorSpace::Grayscale, false) => DynamicImage::ImageLuma8(image.to_luma8()),
        (ColorSpace::Grayscale, true) => DynamicImage::ImageLumaA8(image.to_luma_alpha8()),
        (ColorSpace::Rgb, false) => DynamicImage::ImageRgb8(image.to_rgb8()),
        (ColorSpace::Rgb, true) => DynamicImage::ImageRgba8(image.to_rgba8()),
    };
    encode_png(&converted)
}

/// PNG-encode an image as-is.
pub(crate) fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn settings(color_space: ColorSpace, preserve_transparency: bool) -> RenderSettings {
        RenderSettings {
            dpi: 150,
            color_space,
            include_annotations: true,
            preserve_transparency,
            capture_embedded: false,
        }
    }

    #[test]
    fn scale_doubles_the_nominal_zoom() {
        assert_eq!(render_scale(72), 2.0);
        assert_eq!(render_scale(150), (150.0 / 72.0) * 2.0);
        assert_eq!(render_scale(300), (300.0 / 72.0) * 2.0);
    }

    #[test]
    fn encoded_page_is_valid_png() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255])));
        let png = encode_page_png(&img, &settings(ColorSpace::Rgb, false)).expect("encode");
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn grayscale_setting_drops_color_channels() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([200, 10, 10, 255])));
        let png = encode_page_png(&img, &settings(ColorSpace::Grayscale, false)).expect("encode");
        let decoded = image::load_from_memory(&png).expect("decode");
        assert_eq!(decoded.color(), image::ColorType::L8);
    }

    #[test]
    fn transparency_is_kept_only_when_asked() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 128])));
        let opaque = encode_page_png(&img, &settings(ColorSpace::Rgb, false)).expect("encode");
        assert_eq!(
            image::load_from_memory(&opaque).unwrap().color(),
            image::ColorType::Rgb8
        );
        let alpha = encode_page_png(&img, &settings(ColorSpace::Rgb, true)).expect("encode");
        assert_eq!(
            image::load_from_memory(&alpha).unwrap().color(),
            image::ColorType::Rgba8
        );
    }

    #[test]
    fn synthetic_page_captures_itself_when_embedding_is_on() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255])));
        let mut s = settings(ColorSpace::Rgb, false);
        s.capture_embedded = true;
        let raster = render_synthetic_page(&img, &s).expect("render");
        assert_eq!(raster.page_index, 0);
        assert_eq!(raster.embedded.len(), 1);

        s.capture_embedded = false;
        let raster = render_synthetic_page(&img, &s).expect("render");
        assert!(raster.embedded.is_empty());
    }
}
