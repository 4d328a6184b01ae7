//! Progress-callback trait for per-slide conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline generates notes for each slide. Events fire only for
//! the note-generation stage; rendering and assembly are single steps.
//!
//! # Example
//!
//! ```rust
//! use noteppt::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_slide_complete(&self, slide: usize, total: usize, notes_len: usize) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Slide {}/{} ({} chars of notes)", slide, total, notes_len);
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the conversion pipeline as it processes each slide.
///
/// Implementations must be `Send + Sync`: with `concurrency > 1` the slide
/// events may arrive from different tasks. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once, after rendering, before the first provider call.
    fn on_conversion_start(&self, total_slides: usize) {
        let _ = total_slides;
    }

    /// Called just before the provider request is sent for a slide.
    ///
    /// `slide` is 1-indexed.
    fn on_slide_start(&self, slide: usize, total_slides: usize) {
        let _ = (slide, total_slides);
    }

    /// Called when notes were generated for a slide.
    fn on_slide_complete(&self, slide: usize, total_slides: usize, notes_len: usize) {
        let _ = (slide, total_slides, notes_len);
    }

    /// Called when a slide's notes failed; the slide is kept without notes.
    fn on_slide_error(&self, slide: usize, total_slides: usize, error: String) {
        let _ = (slide, total_slides, error);
    }

    /// Called once after every slide has been attempted.
    ///
    /// `with_notes` counts slides whose notes were generated.
    fn on_conversion_complete(&self, total_slides: usize, with_notes: usize) {
        let _ = (total_slides, with_notes);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
