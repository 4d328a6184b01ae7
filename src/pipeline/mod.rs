//! Pipeline stages for PDF-to-deck conversion.
//!
//! Each submodule implements exactly one transformation step. The
//! orchestrator in [`crate::convert`] drives them in order.
//!
//! ## Data Flow
//!
//! ```text
//! render ──▶ watermark ──▶ encode ──▶ notes
//! (pdfium)   (mask)        (PNG/b64)  (provider, timeout, retry)
//! ```
//!
//! 1. [`render`]    : rasterise every page; runs in `spawn_blocking`
//! 2. [`watermark`] : paint over the bottom-right badge (optional)
//! 3. [`encode`]    : PNG-encode for the deck and base64-wrap for providers
//! 4. [`notes`]     : one provider call per slide, never fatal

pub mod encode;
pub mod notes;
pub mod render;
pub mod watermark;

pub use render::{PdfiumRasterizer, Rasterizer, SlideImage};
