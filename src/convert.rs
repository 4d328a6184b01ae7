//! Conversion entry points: PDF bytes in, `.pptx` bytes out.
//!
//! ## Job lifecycle
//!
//! ```text
//! Received ──▶ Rasterized ──▶ NotesGenerated ──▶ Assembled ──▶ Done
//!                   │                                ▲
//!                   └────────▶ NotesSkipped ─────────┘
//! any step ──▶ Errored
//! ```
//!
//! Everything that can be rejected cheaply is rejected before rendering: an
//! unknown provider, a missing credential and an unbuildable transport all
//! fail the job before pdfium is touched. Once rendering succeeds the only
//! remaining fatal step is assembly; per-slide note failures are recorded on
//! the slide and the job carries on.

use crate::config::ConversionConfig;
use crate::credentials::CredentialResolver;
use crate::deck::{self, CanvasSize, DeckSlide};
use crate::error::NotePptError;
use crate::output::{ConversionOutput, ConversionStats, SlideResult};
use crate::pipeline::{notes, watermark, PdfiumRasterizer, Rasterizer, SlideImage};
use crate::provider::{HttpProviderFactory, ProviderFactory, ProviderKind, ProviderOptions, VisionProvider};
use futures::stream::{self, StreamExt};
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Lifecycle of one conversion job, traced at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Received,
    Rasterized,
    NotesGenerated,
    NotesSkipped,
    Assembled,
    Done,
    Errored,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

struct JobTracker {
    state: JobState,
}

impl JobTracker {
    fn new() -> Self {
        debug!("Job state: {}", JobState::Received);
        Self {
            state: JobState::Received,
        }
    }

    fn advance(&mut self, next: JobState) {
        debug!("Job state: {} → {}", self.state, next);
        self.state = next;
    }

    /// Ends the job, moving to `Errored` when `result` failed, and returns
    /// the final state.
    fn finish<T>(mut self, result: &Result<T, NotePptError>) -> JobState {
        if let Err(e) = result {
            debug!("Job state: {} → {} ({})", self.state, JobState::Errored, e);
            self.state = JobState::Errored;
        }
        self.state
    }
}

/// Conversion orchestrator with swappable rendering and provider backends.
///
/// The defaults are [`PdfiumRasterizer`] and [`HttpProviderFactory`]; tests
/// and embedders replace either one.
#[derive(Clone)]
pub struct Converter {
    rasterizer: Arc<dyn Rasterizer>,
    providers: Arc<dyn ProviderFactory>,
    canvas: CanvasSize,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("canvas", &self.canvas)
            .finish_non_exhaustive()
    }
}

impl Converter {
    pub fn new() -> Self {
        Self {
            rasterizer: Arc::new(PdfiumRasterizer::new()),
            providers: Arc::new(HttpProviderFactory),
            canvas: CanvasSize::WIDESCREEN,
        }
    }

    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn with_provider_factory(mut self, providers: Arc<dyn ProviderFactory>) -> Self {
        self.providers = providers;
        self
    }

    /// Convert `pdf` into a presentation.
    ///
    /// # Returns
    /// `Ok(ConversionOutput)` whenever a deck was produced, even if some or
    /// all slides lack notes (check `output.stats.failed_slides`).
    ///
    /// # Errors
    /// Fatal conditions only: unknown provider, no credential, provider
    /// unavailable, unreadable PDF, pdfium missing, assembly failure.
    pub async fn convert(
        &self,
        pdf: &[u8],
        config: &ConversionConfig,
        credentials: &CredentialResolver,
    ) -> Result<ConversionOutput, NotePptError> {
        let mut job = JobTracker::new();
        let result = self.run(pdf, config, credentials, &mut job).await;
        debug!("Job finished: {}", job.finish(&result));
        result
    }

    async fn run(
        &self,
        pdf: &[u8],
        config: &ConversionConfig,
        credentials: &CredentialResolver,
        job: &mut JobTracker,
    ) -> Result<ConversionOutput, NotePptError> {
        let total_start = Instant::now();

        // ── Step 1: Provider and credential pre-flight ───────────────────
        let kind: ProviderKind = config.provider.parse()?;
        let provider = if config.generate_notes {
            let provider_config = credentials
                .resolve_provider_config(
                    kind,
                    config.api_key.as_ref(),
                    config.model.as_deref(),
                    config.user_id.as_deref(),
                )
                .await?;
            Some(
                self.providers
                    .create(&provider_config, &ProviderOptions::from(config))?,
            )
        } else {
            None
        };

        info!(
            "Starting conversion: {} bytes, provider={}, notes={}",
            pdf.len(),
            provider
                .as_ref()
                .map_or("none".to_string(), |p| format!("{}/{}", p.kind(), p.model())),
            config.generate_notes
        );

        // ── Step 2: Rasterise (and mask) ─────────────────────────────────
        let render_start = Instant::now();
        let slides = self.render(pdf, config).await?;
        let render_duration_ms = render_start.elapsed().as_millis() as u64;
        info!("Rendered {} slides in {}ms", slides.len(), render_duration_ms);
        job.advance(JobState::Rasterized);

        if let Some(ref cb) = config.progress_callback {
            cb.on_conversion_start(slides.len());
        }

        // ── Step 3: Speaker notes ────────────────────────────────────────
        let notes_start = Instant::now();
        let results = match &provider {
            Some(provider) => {
                let results = generate_all(Arc::clone(provider), &slides, config).await;
                job.advance(JobState::NotesGenerated);
                results
            }
            None => {
                job.advance(JobState::NotesSkipped);
                slides
                    .iter()
                    .map(|s| SlideResult::without_notes(s.index))
                    .collect()
            }
        };
        let notes_duration_ms = notes_start.elapsed().as_millis() as u64;

        // ── Step 4: Assemble ─────────────────────────────────────────────
        let notes: Vec<Option<String>> = results.iter().map(|r| r.notes.clone()).collect();
        let canvas = self.canvas;
        let deck = tokio::task::spawn_blocking(move || {
            let deck_slides: Vec<DeckSlide<'_>> = slides
                .iter()
                .zip(&notes)
                .map(|(s, n)| DeckSlide {
                    image: &s.image,
                    notes: n.as_deref(),
                })
                .collect();
            deck::build(&deck_slides, canvas)
        })
        .await
        .map_err(|e| NotePptError::Internal(format!("Assembly task panicked: {e}")))??;
        job.advance(JobState::Assembled);

        // ── Step 5: Stats ────────────────────────────────────────────────
        let mut stats = ConversionStats {
            provider: provider.as_ref().map(|p| p.kind().to_string()),
            model: provider.as_ref().map(|p| p.model().to_string()),
            render_duration_ms,
            notes_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
            deck_bytes: deck.len(),
            ..Default::default()
        };
        stats.count_slides(&results);

        info!(
            "Conversion complete: {} slides, {} with notes, {} failed, {}ms total",
            stats.total_slides, stats.slides_with_notes, stats.failed_slides, stats.total_duration_ms
        );

        if let Some(ref cb) = config.progress_callback {
            cb.on_conversion_complete(stats.total_slides, stats.slides_with_notes);
        }
        job.advance(JobState::Done);

        Ok(ConversionOutput {
            deck,
            slides: results,
            stats,
        })
    }

    /// Rasterise on the blocking pool, masking each page when requested.
    async fn render(
        &self,
        pdf: &[u8],
        config: &ConversionConfig,
    ) -> Result<Vec<SlideImage>, NotePptError> {
        let rasterizer = Arc::clone(&self.rasterizer);
        let bytes = pdf.to_vec();
        let dpi = config.dpi;
        let remove_watermark = config.remove_watermark;

        let mut slides = tokio::task::spawn_blocking(move || {
            let slides = rasterizer.rasterize(&bytes, dpi)?;
            Ok::<_, NotePptError>(if remove_watermark {
                slides
                    .into_iter()
                    .map(|s| SlideImage::new(s.index, watermark::mask(s.image)))
                    .collect()
            } else {
                slides
            })
        })
        .await
        .map_err(|e| NotePptError::Internal(format!("Render task panicked: {e}")))??;

        slides.sort_by_key(|s| s.index);
        Ok(slides)
    }
}

/// Generate notes for every slide, preserving slide order.
///
/// At most `config.concurrency` provider calls are in flight. Cancellation is
/// checked as each slide starts.
async fn generate_all(
    provider: Arc<dyn VisionProvider>,
    slides: &[SlideImage],
    config: &ConversionConfig,
) -> Vec<SlideResult> {
    let total = slides.len();
    stream::iter(slides.iter().map(|slide| {
        let provider = Arc::clone(&provider);
        async move {
            let slide_num = slide.slide_num();
            if config.is_cancelled() {
                debug!("Slide {}: skipped, job cancelled", slide_num);
                return SlideResult::cancelled(slide.index);
            }
            if let Some(ref cb) = config.progress_callback {
                cb.on_slide_start(slide_num, total);
            }

            let result = notes::generate_slide_notes(provider.as_ref(), slide, config).await;

            match (&result.error, &result.notes) {
                (Some(e), _) => {
                    warn!("{}", e);
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_slide_error(slide_num, total, e.to_string());
                    }
                }
                (None, notes) => {
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_slide_complete(slide_num, total, notes.as_ref().map_or(0, String::len));
                    }
                }
            }
            result
        }
    }))
    .buffered(config.concurrency.max(1))
    .collect()
    .await
}

/// Convert PDF bytes with the default pdfium renderer and HTTP providers.
///
/// # Example
/// ```rust,no_run
/// use noteppt::{convert, ConversionConfig, CredentialResolver, DeploymentConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pdf = std::fs::read("deck.pdf")?;
/// let credentials = CredentialResolver::from_deployment(DeploymentConfig::from_env())?;
/// let config = ConversionConfig::builder().provider("openai").build()?;
/// let output = convert(&pdf, &config, &credentials).await?;
/// std::fs::write("deck.pptx", &output.deck)?;
/// # Ok(())
/// # }
/// ```
pub async fn convert(
    pdf: &[u8],
    config: &ConversionConfig,
    credentials: &CredentialResolver,
) -> Result<ConversionOutput, NotePptError> {
    Converter::new().convert(pdf, config, credentials).await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally; do not call from inside an
/// async context.
pub fn convert_sync(
    pdf: &[u8],
    config: &ConversionConfig,
    credentials: &CredentialResolver,
) -> Result<ConversionOutput, NotePptError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| NotePptError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(convert(pdf, config, credentials))
}

/// Convert and write the deck to `output_path`.
///
/// The deck is written to a temporary file in the destination directory and
/// renamed into place, so a failed run never leaves a partial file behind.
pub async fn convert_to_file(
    pdf: &[u8],
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
    credentials: &CredentialResolver,
) -> Result<ConversionOutput, NotePptError> {
    let output = convert(pdf, config, credentials).await?;
    write_atomically(output_path.as_ref(), &output.deck)?;
    Ok(output)
}

/// Write `bytes` to `path` via temp file + rename.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), NotePptError> {
    let write_err = |source: std::io::Error| NotePptError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
