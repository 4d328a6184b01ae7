//! PDF rasterisation: render every page to an `RgbImage` via pdfium.
//!
//! ## Why a trait?
//!
//! pdfium is a native library that may not be installed where the crate is
//! built or tested. The orchestrator depends on [`Rasterizer`] so tests and
//! embedders can supply pages from anywhere; [`PdfiumRasterizer`] is the real
//! implementation.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is CPU-bound and not async-aware. The orchestrator calls
//! [`Rasterizer::rasterize`] inside `tokio::task::spawn_blocking` so Tokio
//! worker threads never stall while a large deck renders.

use crate::error::NotePptError;
use image::RgbImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the pdfium shared library (file or directory).
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

const POINTS_PER_INCH: f32 = 72.0;

/// One rendered PDF page.
#[derive(Debug, Clone)]
pub struct SlideImage {
    /// 0-based page index; also the slide's position in the deck.
    pub index: usize,
    pub image: RgbImage,
}

impl SlideImage {
    pub fn new(index: usize, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// 1-based slide number, for logs and progress events.
    pub fn slide_num(&self) -> usize {
        self.index + 1
    }
}

/// Turns PDF bytes into one image per page, in page order.
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, pdf: &[u8], dpi: u32) -> Result<Vec<SlideImage>, NotePptError>;
}

/// Uniform page scale for a target DPI (PDF user space is 72 points/inch).
pub fn scale_for_dpi(dpi: u32) -> f32 {
    dpi as f32 / POINTS_PER_INCH
}

/// Reject input that is obviously not a PDF before touching pdfium.
///
/// The header may be preceded by junk; readers accept it anywhere in the
/// first 1024 bytes.
pub fn check_pdf_header(pdf: &[u8]) -> Result<(), NotePptError> {
    let head = &pdf[..pdf.len().min(1024)];
    if head.windows(5).any(|w| w == b"%PDF-") {
        Ok(())
    } else {
        Err(NotePptError::InvalidDocument {
            detail: "missing %PDF header".into(),
        })
    }
}

/// Bind to pdfium.
///
/// Search order: `explicit`, then `PDFIUM_LIB_PATH`, then the working
/// directory, then system library paths. A path may name the library file or
/// the directory containing it.
pub fn bind_pdfium(explicit: Option<&Path>) -> Result<Pdfium, NotePptError> {
    let from_env = std::env::var_os(PDFIUM_LIB_PATH_ENV).map(PathBuf::from);
    let mut candidates: Vec<PathBuf> = explicit.map(Path::to_path_buf).into_iter().collect();
    candidates.extend(from_env);

    let mut last_err = String::from("no candidate paths");
    for path in candidates {
        let lib = if path.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&path)
        } else {
            path.clone()
        };
        match Pdfium::bind_to_library(&lib) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", lib.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => last_err = format!("{}: {:?}", lib.display(), e),
        }
    }

    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| NotePptError::RendererUnavailable(format!("{e:?} (last tried {last_err})")))
}

/// pdfium-backed [`Rasterizer`].
#[derive(Debug, Default, Clone)]
pub struct PdfiumRasterizer {
    library_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefer this library path over the environment and default locations.
    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    /// Check that pdfium can be bound, without loading a document.
    pub fn check_library(&self) -> Result<(), NotePptError> {
        bind_pdfium(self.library_path.as_deref()).map(|_| ())
    }

    /// Number of pages, without rendering.
    pub fn page_count(&self, pdf: &[u8]) -> Result<usize, NotePptError> {
        check_pdf_header(pdf)?;
        let pdfium = bind_pdfium(self.library_path.as_deref())?;
        let document = load_document(&pdfium, pdf)?;
        let count = document.pages().len() as usize;
        Ok(count)
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(&self, pdf: &[u8], dpi: u32) -> Result<Vec<SlideImage>, NotePptError> {
        check_pdf_header(pdf)?;
        let pdfium = bind_pdfium(self.library_path.as_deref())?;
        let document = load_document(&pdfium, pdf)?;

        let pages = document.pages();
        let total = pages.len() as usize;
        info!("PDF loaded: {} pages, rendering at {} DPI", total, dpi);

        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale_for_dpi(dpi));

        let mut slides = Vec::with_capacity(total);
        for (idx, page) in pages.iter().enumerate() {
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| NotePptError::InvalidDocument {
                    detail: format!("page {} could not be rendered: {:?}", idx + 1, e),
                })?;
            let image = bitmap.as_image().to_rgb8();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            slides.push(SlideImage::new(idx, image));
        }
        Ok(slides)
    }
}

fn load_document<'a>(pdfium: &'a Pdfium, pdf: &'a [u8]) -> Result<PdfDocument<'a>, NotePptError> {
    pdfium.load_pdf_from_byte_slice(pdf, None).map_err(|e| {
        let err_str = format!("{e:?}");
        let detail = if err_str.contains("Password") || err_str.contains("password") {
            "document is password-protected".to_string()
        } else {
            err_str
        };
        NotePptError::InvalidDocument { detail }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_is_dpi_over_72() {
        assert_eq!(scale_for_dpi(72), 1.0);
        assert_eq!(scale_for_dpi(144), 2.0);
        assert!((scale_for_dpi(100) - 1.388_889).abs() < 1e-5);
    }

    #[test]
    fn header_check_rejects_non_pdf() {
        let err = check_pdf_header(b"PK\x03\x04 definitely a zip").unwrap_err();
        assert!(matches!(err, NotePptError::InvalidDocument { .. }));
        assert!(check_pdf_header(b"").is_err());
    }

    #[test]
    fn header_check_tolerates_leading_bytes() {
        assert!(check_pdf_header(b"%PDF-1.7\n").is_ok());
        assert!(check_pdf_header(b"\xEF\xBB\xBF%PDF-1.4\n").is_ok());
    }

    #[test]
    fn non_pdf_fails_before_binding() {
        let r = PdfiumRasterizer::with_library_path("/nonexistent/libpdfium.so");
        let err = r.rasterize(b"hello", 144).unwrap_err();
        assert!(matches!(err, NotePptError::InvalidDocument { .. }));
    }

    #[test]
    fn slide_image_dimensions() {
        let s = SlideImage::new(2, RgbImage::new(30, 20));
        assert_eq!((s.width(), s.height()), (30, 20));
        assert_eq!(s.slide_num(), 3);
    }
}
