//! Deck assembly: slide images plus optional notes → `.pptx` bytes.
//!
//! A `.pptx` file is a zip container of OOXML parts. The package written here
//! has one slide master with a single blank layout, one slide per image
//! (a single picture covering the whole canvas), and a notes slide only for
//! slides that actually have notes. The part templates live in [`parts`].

pub mod parts;

use crate::error::NotePptError;
use crate::pipeline::encode::encode_png;
use image::RgbImage;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Slide canvas in EMU (914 400 per inch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasSize {
    pub cx: u64,
    pub cy: u64,
}

impl CanvasSize {
    pub const EMU_PER_INCH: u64 = 914_400;

    /// 10 × 5.625 in, the 16:9 on-screen show size.
    pub const WIDESCREEN: CanvasSize = CanvasSize {
        cx: 9_144_000,
        cy: 5_143_500,
    };

    pub fn width_inches(&self) -> f64 {
        self.cx as f64 / Self::EMU_PER_INCH as f64
    }

    pub fn height_inches(&self) -> f64 {
        self.cy as f64 / Self::EMU_PER_INCH as f64
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self::WIDESCREEN
    }
}

/// One slide to place in the deck.
#[derive(Debug, Clone, Copy)]
pub struct DeckSlide<'a> {
    pub image: &'a RgbImage,
    /// Blank notes are treated as no notes.
    pub notes: Option<&'a str>,
}

impl<'a> DeckSlide<'a> {
    fn notes_text(&self) -> Option<&'a str> {
        self.notes.filter(|n| !n.trim().is_empty())
    }
}

/// Build a complete presentation package.
///
/// Zero slides produce a valid, empty presentation.
///
/// # Errors
/// [`NotePptError::AssemblyFailed`] if an image cannot be encoded or the
/// package cannot be written.
pub fn build(slides: &[DeckSlide<'_>], canvas: CanvasSize) -> Result<Vec<u8>, NotePptError> {
    let notes_slides: Vec<usize> = slides
        .iter()
        .enumerate()
        .filter(|(_, s)| s.notes_text().is_some())
        .map(|(i, _)| i + 1)
        .collect();
    let has_notes = !notes_slides.is_empty();
    let count = slides.len();

    let mut pkg = Package::new();

    pkg.add("[Content_Types].xml", parts::content_types(count, &notes_slides))?;
    pkg.add("_rels/.rels", parts::root_rels())?;
    pkg.add("docProps/app.xml", parts::app_props(count, notes_slides.len()))?;
    pkg.add("docProps/core.xml", parts::core_props("Presentation"))?;

    pkg.add("ppt/presentation.xml", parts::presentation(count, canvas, has_notes))?;
    pkg.add(
        "ppt/_rels/presentation.xml.rels",
        parts::presentation_rels(count, has_notes),
    )?;
    pkg.add("ppt/presProps.xml", parts::pres_props())?;
    pkg.add("ppt/viewProps.xml", parts::view_props())?;
    pkg.add("ppt/tableStyles.xml", parts::table_styles())?;

    pkg.add("ppt/slideMasters/slideMaster1.xml", parts::slide_master())?;
    pkg.add(
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        parts::slide_master_rels(),
    )?;
    pkg.add("ppt/slideLayouts/slideLayout1.xml", parts::slide_layout())?;
    pkg.add(
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
        parts::slide_layout_rels(),
    )?;
    pkg.add("ppt/theme/theme1.xml", parts::slide_theme())?;

    if has_notes {
        pkg.add("ppt/notesMasters/notesMaster1.xml", parts::notes_master())?;
        pkg.add(
            "ppt/notesMasters/_rels/notesMaster1.xml.rels",
            parts::notes_master_rels(),
        )?;
        pkg.add("ppt/theme/theme2.xml", parts::notes_theme())?;
    }

    for (i, slide) in slides.iter().enumerate() {
        let n = i + 1;
        let png = encode_png(slide.image).map_err(|e| NotePptError::AssemblyFailed {
            detail: format!("slide {n} image could not be encoded: {e}"),
        })?;
        pkg.add_stored(&format!("ppt/media/image{n}.png"), &png)?;

        let notes = slide.notes_text();
        pkg.add(&format!("ppt/slides/slide{n}.xml"), parts::slide(n, canvas))?;
        pkg.add(
            &format!("ppt/slides/_rels/slide{n}.xml.rels"),
            parts::slide_rels(n, notes.is_some()),
        )?;
        if let Some(text) = notes {
            pkg.add(
                &format!("ppt/notesSlides/notesSlide{n}.xml"),
                parts::notes_slide(text),
            )?;
            pkg.add(
                &format!("ppt/notesSlides/_rels/notesSlide{n}.xml.rels"),
                parts::notes_slide_rels(n),
            )?;
        }
    }

    let bytes = pkg.finish()?;
    debug!(
        "Assembled deck: {} slides, {} with notes, {} bytes",
        count,
        notes_slides.len(),
        bytes.len()
    );
    Ok(bytes)
}

/// Thin wrapper mapping zip errors into [`NotePptError::AssemblyFailed`].
struct Package {
    zip: ZipWriter<Cursor<Vec<u8>>>,
}

impl Package {
    fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    fn add(&mut self, name: &str, xml: String) -> Result<(), NotePptError> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.write(name, xml.as_bytes(), options)
    }

    /// PNG is already compressed; store it as-is.
    fn add_stored(&mut self, name: &str, data: &[u8]) -> Result<(), NotePptError> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        self.write(name, data, options)
    }

    fn write(
        &mut self,
        name: &str,
        data: &[u8],
        options: SimpleFileOptions,
    ) -> Result<(), NotePptError> {
        self.zip
            .start_file(name, options)
            .map_err(|e| part_error(name, e))?;
        self.zip.write_all(data).map_err(|e| part_error(name, e))
    }

    fn finish(self) -> Result<Vec<u8>, NotePptError> {
        self.zip
            .finish()
            .map(Cursor::into_inner)
            .map_err(|e| NotePptError::AssemblyFailed {
                detail: format!("finalising package: {e}"),
            })
    }
}

fn part_error(part: &str, e: impl std::fmt::Display) -> NotePptError {
    NotePptError::AssemblyFailed {
        detail: format!("{part}: {e}"),
    }
}
