//! Error types for the visionmd library.
//!
//! Two distinct error types reflect two distinct layers of failure:
//!
//! * [`VisionMdError`] — the public taxonomy returned from the `convert*`
//!   entry points. Construction-time errors (`UnsupportedModel`,
//!   `InvalidConfig`) abort startup; page-level failures are wrapped in
//!   [`VisionMdError::Conversion`] with the page number and abort the whole
//!   run — the caller never receives a partial page list.
//!
//! * [`ModelError`](crate::model::ModelError) — failures of a single
//!   external model call (retries exhausted, or a structured response that
//!   did not decode). Analysis-phase model errors are recovered internally
//!   via the fallback path and never surface here.

use crate::model::ModelError;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the visionmd library.
#[derive(Debug, Error)]
pub enum VisionMdError {
    // ── Input resolution ──────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("input file not found: '{path}'")]
    NotFound { path: PathBuf },

    /// The file-name extension is not one of the supported kinds.
    ///
    /// Classification is by extension only; file content is never sniffed.
    #[error("unsupported file type '{extension}' for '{path}' (supported: .pdf, .png, .jpg, .jpeg)")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// The input exists and has a supported extension, but could not be
    /// opened (corrupt PDF, undecodable image).
    #[error("failed to open document: {detail}")]
    DocumentOpen { detail: String },

    // ── Model construction ────────────────────────────────────────────────
    /// The configured model name is not in the allow-list. Fatal at
    /// construction; no conversion is attempted.
    #[error("model '{model}' is not supported; supported models are: {supported}")]
    UnsupportedModel { model: String, supported: String },

    // ── Page processing ───────────────────────────────────────────────────
    /// Rasterisation failed for a page (1-based).
    #[error("rasterisation failed for page {page}: {detail}")]
    Render { page: usize, detail: String },

    /// An external model call failed after exhausting its retries.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A page failed during extraction. Fatal to the entire conversion;
    /// pages already completed in the same run are discarded.
    #[error("failed to convert page {page}: {source}")]
    Conversion {
        /// 1-based page number.
        page: usize,
        #[source]
        source: Box<VisionMdError>,
    },

    // ── Config ────────────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (worker thread died, runtime construction).
    #[error("internal error: {0}")]
    Internal(String),
}

impl VisionMdError {
    /// Wrap a page-level failure with its 1-based page number.
    pub(crate) fn on_page(self, page_number: usize) -> Self {
        VisionMdError::Conversion {
            page: page_number,
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_display() {
        let e = VisionMdError::UnsupportedFormat {
            path: PathBuf::from("report.docx"),
            extension: ".docx".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains(".docx"), "got: {msg}");
        assert!(msg.contains("report.docx"));
    }

    #[test]
    fn conversion_wraps_page_and_cause() {
        let cause = VisionMdError::Render {
            page: 3,
            detail: "bitmap allocation failed".into(),
        };
        let e = cause.on_page(3);
        let msg = e.to_string();
        assert!(msg.contains("page 3"), "got: {msg}");
        assert!(
            std::error::Error::source(&e).is_some(),
            "Conversion must expose its cause"
        );
    }

    #[test]
    fn unsupported_model_lists_alternatives() {
        let e = VisionMdError::UnsupportedModel {
            model: "gpt-4o".into(),
            supported: "gemini-1.5-pro".into(),
        };
        assert!(e.to_string().contains("gpt-4o"));
        assert!(e.to_string().contains("gemini-1.5-pro"));
    }
}
