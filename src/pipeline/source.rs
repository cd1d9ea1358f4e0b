//! Document page source.
//!
//! A [`PageSource`] turns an input file into a uniform sequence of
//! renderable pages. The open document lives on a dedicated worker thread
//! for the whole run — pdfium keeps thread-local state and must not be
//! driven from the tokio workers — and page tasks request rasters over a
//! channel. Dropping the source closes the channel; the worker then drops
//! the document and exits, releasing native resources on every exit path.
//!
//! A standalone raster image is wrapped as a single synthetic page so that
//! downstream stages see the same abstraction for both input kinds.

use crate::config::ConversionConfig;
use crate::error::VisionMdError;
use crate::pipeline::render::{self, RasterImage, RenderSettings};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use tokio::sync::oneshot;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentKind {
    Pdf,
    Image,
}

/// Classify the input by its file-name extension. Content is never sniffed.
fn classify(path: &Path) -> Result<DocumentKind, VisionMdError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => Ok(DocumentKind::Pdf),
        "png" | "jpg" | "jpeg" => Ok(DocumentKind::Image),
        _ => Err(VisionMdError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: if extension.is_empty() {
                "<none>".to_string()
            } else {
                format!(".{extension}")
            },
        }),
    }
}

struct RenderRequest {
    page_index: usize,
    reply: oneshot::Sender<Result<RasterImage, String>>,
}

/// An open document and its render worker.
#[derive(Debug)]
pub(crate) struct PageSource {
    requests: mpsc::Sender<RenderRequest>,
    page_count: usize,
}

impl PageSource {
    /// Open a document for conversion.
    ///
    /// Fails with [`VisionMdError::NotFound`] when the path does not point
    /// at a file and [`VisionMdError::UnsupportedFormat`] when the
    /// extension is not a supported kind — both before the worker is
    /// spawned or any document bytes are read.
    pub(crate) async fn open(
        path: impl AsRef<Path>,
        config: &ConversionConfig,
    ) -> Result<Self, VisionMdError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(VisionMdError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let kind = classify(path)?;
        let settings = RenderSettings::from_config(config);

        let (request_tx, request_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let worker_path = path.to_path_buf();
        thread::Builder::new()
            .name("visionmd-render".to_string())
            .spawn(move || match kind {
                DocumentKind::Pdf => pdf_worker(worker_path, settings, ready_tx, request_rx),
                DocumentKind::Image => image_worker(worker_path, settings, ready_tx, request_rx),
            })
            .map_err(|e| VisionMdError::Internal(format!("failed to spawn render worker: {e}")))?;

        let page_count = ready_rx
            .await
            .map_err(|_| {
                VisionMdError::Internal("render worker exited before reporting readiness".into())
            })?
            .map_err(|detail| VisionMdError::DocumentOpen { detail })?;

        info!(path = %path.display(), pages = page_count, "document opened");
        Ok(Self {
            requests: request_tx,
            page_count,
        })
    }

    /// Number of pages in the document; 1 for a standalone image.
    pub(crate) fn page_count(&self) -> usize {
        self.page_count
    }

    /// Rasterise one page. Requests are served by the worker in arrival
    /// order; the returned raster is released when the caller drops it.
    pub(crate) async fn rasterize(&self, page_index: usize) -> Result<RasterImage, VisionMdError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send(RenderRequest {
                page_index,
                reply: reply_tx,
            })
            .map_err(|_| VisionMdError::Internal("render worker is gone".into()))?;
        reply_rx
            .await
            .map_err(|_| VisionMdError::Internal("render worker dropped a request".into()))?
            .map_err(|detail| VisionMdError::Render {
                page: page_index + 1,
                detail,
            })
    }

    /// A source backed by blank rasters instead of a document, for
    /// exercising the scheduler and orchestrator without pdfium.
    #[cfg(test)]
    pub(crate) fn stub(page_count: usize) -> Self {
        let (request_tx, request_rx) = mpsc::channel::<RenderRequest>();
        thread::spawn(move || {
            while let Ok(request) = request_rx.recv() {
                let blank = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
                    2,
                    2,
                    image::Rgb([255, 255, 255]),
                ));
                let result = render::encode_png(&blank)
                    .map(|png| RasterImage {
                        page_index: request.page_index,
                        png,
                        embedded: Vec::new(),
                    })
                    .map_err(|e| e.to_string());
                let _ = request.reply.send(result);
            }
        });
        Self {
            requests: request_tx,
            page_count,
        }
    }
}

/// Worker loop for PDF input: one open document for the whole run.
fn pdf_worker(
    path: PathBuf,
    settings: RenderSettings,
    ready: oneshot::Sender<Result<usize, String>>,
    requests: mpsc::Receiver<RenderRequest>,
) {
    let bindings = match Pdfium::bind_to_system_library() {
        Ok(bindings) => bindings,
        Err(e) => {
            let _ = ready.send(Err(format!("failed to bind pdfium library: {e:?}")));
            return;
        }
    };
    let pdfium = Pdfium::new(bindings);
    let document = match pdfium.load_pdf_from_file(&path, None) {
        Ok(document) => document,
        Err(e) => {
            let _ = ready.send(Err(format!("{e:?}")));
            return;
        }
    };

    let page_count = document.pages().len() as usize;
    if ready.send(Ok(page_count)).is_err() {
        return;
    }

    while let Ok(request) = requests.recv() {
        let result = if request.page_index < page_count {
            render::render_pdf_page(&document, request.page_index, &settings)
        } else {
            Err(format!(
                "page index {} out of range (document has {page_count} pages)",
                request.page_index
            ))
        };
        let _ = request.reply.send(result);
    }
    // channel closed: document and pdfium drop here
}

/// Worker loop for a standalone image: one synthetic page.
fn image_worker(
    path: PathBuf,
    settings: RenderSettings,
    ready: oneshot::Sender<Result<usize, String>>,
    requests: mpsc::Receiver<RenderRequest>,
) {
    let decoded = match image::open(&path) {
        Ok(image) => image,
        Err(e) => {
            let _ = ready.send(Err(format!("failed to decode image: {e}")));
            return;
        }
    };
    if ready.send(Ok(1)).is_err() {
        return;
    }

    while let Ok(request) = requests.recv() {
        let result = if request.page_index == 0 {
            render::render_synthetic_page(&decoded, &settings)
        } else {
            Err(format!(
                "page index {} out of range (standalone image has 1 page)",
                request.page_index
            ))
        };
        let _ = request.reply.send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_by_extension_only() {
        assert_eq!(classify(Path::new("a.pdf")).unwrap(), DocumentKind::Pdf);
        assert_eq!(classify(Path::new("a.PDF")).unwrap(), DocumentKind::Pdf);
        assert_eq!(classify(Path::new("a.png")).unwrap(), DocumentKind::Image);
        assert_eq!(classify(Path::new("a.JPeG")).unwrap(), DocumentKind::Image);
        assert!(matches!(
            classify(Path::new("a.docx")),
            Err(VisionMdError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            classify(Path::new("no_extension")),
            Err(VisionMdError::UnsupportedFormat { .. })
        ));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let config = ConversionConfig::default();
        let err = PageSource::open("/definitely/not/here.pdf", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, VisionMdError::NotFound { .. }));
    }

    #[tokio::test]
    async fn stub_source_serves_rasters() {
        let source = PageSource::stub(3);
        assert_eq!(source.page_count(), 3);
        let raster = source.rasterize(2).await.expect("raster");
        assert_eq!(raster.page_index, 2);
        assert!(!raster.png.is_empty());
    }
}
