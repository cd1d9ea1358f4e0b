//! Pipeline stages for document-to-Markdown conversion.
//!
//! Each submodule implements one stage; keeping them separate makes each
//! independently testable.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ render ──▶ extract ──▶ schedule
//! (document) (PNG)      (model)     (ordered results)
//! ```
//!
//! 1. [`source`]   — open the document, serve pages from a worker thread
//! 2. [`render`]   — rasterise one page to PNG, capture embedded bitmaps
//! 3. [`images`]   — turn embedded bitmaps into markdown references
//! 4. [`extract`]  — the per-page analyse/generate/assemble sequence; the
//!    only stage with network I/O
//! 5. [`schedule`] — batch pages, bound concurrency, keep output ordered

pub(crate) mod extract;
pub(crate) mod images;
pub(crate) mod render;
pub(crate) mod schedule;
pub(crate) mod source;
