//! Rendering tests against a real pdfium library.
//!
//! Skipped (with a message) when pdfium cannot be bound. Point
//! `PDFIUM_LIB_PATH` at a library to run them:
//!   PDFIUM_LIB_PATH=/opt/pdfium/lib cargo test --test render -- --nocapture

use noteppt::{NotePptError, PdfiumRasterizer, Rasterizer};

/// Build a minimal valid PDF with `pages` blank pages of `w` × `h` points.
fn blank_pdf(pages: usize, w: u32, h: u32) -> Vec<u8> {
    let mut objects: Vec<String> = Vec::new();
    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", i + 3)).collect();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".into());
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        pages
    ));
    for _ in 0..pages {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {w} {h}] /Resources << >> >>"
        ));
    }

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }
    let xref_at = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for off in offsets {
        pdf.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    pdf
}

macro_rules! skip_unless_pdfium {
    () => {{
        let rasterizer = PdfiumRasterizer::new();
        if let Err(e) = rasterizer.check_library() {
            println!("SKIP: pdfium not available: {}", e.to_string().lines().next().unwrap_or(""));
            return;
        }
        rasterizer
    }};
}

#[test]
fn renders_every_page_in_order() {
    let rasterizer = skip_unless_pdfium!();
    let pdf = blank_pdf(3, 720, 405);

    let slides = rasterizer.rasterize(&pdf, 72).unwrap();
    assert_eq!(slides.len(), 3);
    for (i, s) in slides.iter().enumerate() {
        assert_eq!(s.index, i);
        assert_eq!((s.width(), s.height()), (720, 405));
    }
    assert_eq!(rasterizer.page_count(&pdf).unwrap(), 3);
}

#[test]
fn dpi_scales_pixel_size() {
    let rasterizer = skip_unless_pdfium!();
    let pdf = blank_pdf(1, 720, 405);

    let slides = rasterizer.rasterize(&pdf, 144).unwrap();
    assert_eq!(slides.len(), 1);
    assert!((slides[0].width() as i64 - 1440).abs() <= 1);
    assert!((slides[0].height() as i64 - 810).abs() <= 1);
}

#[test]
fn zero_page_document_renders_nothing() {
    let rasterizer = skip_unless_pdfium!();
    let slides = rasterizer.rasterize(&blank_pdf(0, 720, 405), 72).unwrap();
    assert!(slides.is_empty());
}

#[test]
fn non_pdf_bytes_are_rejected() {
    let err = PdfiumRasterizer::new()
        .rasterize(b"PK\x03\x04 definitely a zip", 144)
        .unwrap_err();
    assert!(matches!(err, NotePptError::InvalidDocument { .. }));
}
