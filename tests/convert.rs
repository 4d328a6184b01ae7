//! End-to-end conversion tests with an injected renderer and provider.
//!
//! No pdfium library or network access is needed: `FakeRasterizer` stands in
//! for the PDF renderer and `FakeProviders` for the AI backends, so every
//! orchestration rule can be checked deterministically.

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use noteppt::{
    CancelFlag, ConversionConfig, ConversionProgressCallback, Converter, CredentialResolver,
    DeploymentConfig, InMemoryKeyStore, KeyVault, NotePptError, ProviderConfig, ProviderError,
    ProviderFactory, ProviderKind, ProviderOptions, Rasterizer, SlideError, SlideImage,
    VisionProvider,
};
use secrecy::{ExposeSecret, SecretString};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Produces `pages` white slides (200×100 unless resized) with a dark badge
/// in the corner, or fails like an unreadable document.
struct FakeRasterizer {
    pages: usize,
    size: (u32, u32),
    unreadable: bool,
    calls: AtomicUsize,
}

impl FakeRasterizer {
    fn new(pages: usize) -> Arc<Self> {
        Self::with_page_size(pages, 200, 100)
    }

    fn with_page_size(pages: usize, width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            pages,
            size: (width, height),
            unreadable: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn unreadable() -> Arc<Self> {
        Arc::new(Self {
            pages: 0,
            size: (200, 100),
            unreadable: true,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Rasterizer for FakeRasterizer {
    fn rasterize(&self, _pdf: &[u8], _dpi: u32) -> Result<Vec<SlideImage>, NotePptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreadable {
            return Err(NotePptError::InvalidDocument {
                detail: "xref table is damaged".into(),
            });
        }
        let (width, height) = self.size;
        // Returned in reverse to check the converter restores page order.
        Ok((0..self.pages)
            .rev()
            .map(|i| {
                let mut img = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
                for y in height.saturating_sub(7)..height {
                    for x in width.saturating_sub(30)..width {
                        img.put_pixel(x, y, Rgb([10, 10, 10]));
                    }
                }
                SlideImage::new(i, img)
            })
            .collect())
    }
}

/// Writes "Notes for slide N"; fails every slide listed in `failing`.
struct FakeProvider {
    kind: ProviderKind,
    model: String,
    failing: Vec<usize>,
    /// Slower for earlier slides, so concurrent calls finish out of order.
    stagger: bool,
    seen_corner: Mutex<Vec<Rgb<u8>>>,
}

#[async_trait]
impl VisionProvider for FakeProvider {
    async fn analyze_slide(
        &self,
        image: &SlideImage,
        context: Option<&str>,
    ) -> Result<String, ProviderError> {
        self.seen_corner
            .lock()
            .unwrap()
            .push(*image.image.get_pixel(199, 99));
        if self.stagger {
            tokio::time::sleep(Duration::from_millis(40 - 10 * image.index.min(3) as u64)).await;
        }
        if self.failing.contains(&image.slide_num()) {
            return Err(ProviderError::Auth {
                status: 401,
                message: "key rejected".into(),
            });
        }
        Ok(match context {
            Some(ctx) => format!("Notes for slide {} ({ctx})", image.slide_num()),
            None => format!("Notes for slide {}", image.slide_num()),
        })
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Default)]
struct FakeProviders {
    failing: Vec<usize>,
    stagger: bool,
    created: Mutex<Vec<ProviderConfig>>,
    last: Mutex<Option<Arc<FakeProvider>>>,
}

impl FakeProviders {
    fn failing(slides: &[usize]) -> Arc<Self> {
        Arc::new(Self {
            failing: slides.to_vec(),
            ..Default::default()
        })
    }

    fn created(&self) -> Vec<ProviderConfig> {
        self.created.lock().unwrap().clone()
    }

    /// Number of `analyze_slide` calls made on the last created provider.
    fn analyzed(&self) -> usize {
        self.corners().len()
    }

    fn corners(&self) -> Vec<Rgb<u8>> {
        self.last
            .lock()
            .unwrap()
            .as_ref()
            .map(|p| p.seen_corner.lock().unwrap().clone())
            .unwrap_or_default()
    }
}

impl ProviderFactory for FakeProviders {
    fn create(
        &self,
        config: &ProviderConfig,
        _options: &ProviderOptions,
    ) -> Result<Arc<dyn VisionProvider>, NotePptError> {
        self.created.lock().unwrap().push(config.clone());
        let provider = Arc::new(FakeProvider {
            kind: config.kind,
            model: config.model.clone(),
            failing: self.failing.clone(),
            stagger: self.stagger,
            seen_corner: Mutex::new(Vec::new()),
        });
        *self.last.lock().unwrap() = Some(Arc::clone(&provider));
        Ok(provider)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn converter(rasterizer: &Arc<FakeRasterizer>, providers: &Arc<FakeProviders>) -> Converter {
    Converter::new()
        .with_rasterizer(Arc::clone(rasterizer) as Arc<dyn Rasterizer>)
        .with_provider_factory(Arc::clone(providers) as Arc<dyn ProviderFactory>)
}

fn no_env() -> DeploymentConfig {
    DeploymentConfig::from_lookup(|_| None)
}

fn credentials() -> CredentialResolver {
    CredentialResolver::from_deployment(no_env()).unwrap()
}

fn config_with_key(provider: &str) -> ConversionConfig {
    ConversionConfig::builder()
        .provider(provider)
        .api_key("sk-request")
        .build()
        .unwrap()
}

fn part_names(deck: &[u8]) -> Vec<String> {
    let archive = zip::ZipArchive::new(Cursor::new(deck)).unwrap();
    archive.file_names().map(str::to_string).collect()
}

fn read_part(deck: &[u8], name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(Cursor::new(deck)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).unwrap();
    buf
}

fn read_text(deck: &[u8], name: &str) -> String {
    String::from_utf8(read_part(deck, name)).unwrap()
}

const PDF: &[u8] = b"%PDF-1.4 fake";

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_slide_keeps_its_picture_and_loses_only_its_notes() {
    let rasterizer = FakeRasterizer::new(3);
    let providers = FakeProviders::failing(&[2]);

    let output = converter(&rasterizer, &providers)
        .convert(PDF, &config_with_key("openai"), &credentials())
        .await
        .unwrap();

    assert_eq!(output.slides.len(), 3);
    assert_eq!(output.slides[0].notes.as_deref(), Some("Notes for slide 1"));
    assert!(output.slides[1].notes.is_none());
    assert!(matches!(
        output.slides[1].error,
        Some(SlideError::NotesFailed { slide: 2, .. })
    ));
    assert_eq!(output.slides[2].notes.as_deref(), Some("Notes for slide 3"));

    assert_eq!(output.stats.total_slides, 3);
    assert_eq!(output.stats.slides_with_notes, 2);
    assert_eq!(output.stats.failed_slides, 1);
    assert_eq!(output.stats.provider.as_deref(), Some("openai"));
    assert_eq!(output.stats.model.as_deref(), Some("gpt-4o"));
    assert_eq!(output.stats.deck_bytes, output.deck.len());

    let parts = part_names(&output.deck);
    for n in 1..=3 {
        assert!(parts.contains(&format!("ppt/slides/slide{n}.xml")));
        assert!(parts.contains(&format!("ppt/media/image{n}.png")));
    }
    assert!(parts.contains(&"ppt/notesSlides/notesSlide1.xml".to_string()));
    assert!(!parts.contains(&"ppt/notesSlides/notesSlide2.xml".to_string()));
    assert!(parts.contains(&"ppt/notesSlides/notesSlide3.xml".to_string()));
    assert!(read_text(&output.deck, "ppt/notesSlides/notesSlide3.xml").contains("Notes for slide 3"));
}

#[tokio::test]
async fn notes_disabled_builds_picture_only_deck_without_credentials() {
    let rasterizer = FakeRasterizer::new(1);
    let providers = Arc::new(FakeProviders::default());
    let config = ConversionConfig::builder()
        .generate_notes(false)
        .build()
        .unwrap();

    let output = converter(&rasterizer, &providers)
        .convert(PDF, &config, &credentials())
        .await
        .unwrap();

    assert!(providers.created().is_empty());
    assert_eq!(output.slides.len(), 1);
    assert!(output.slides[0].notes.is_none());
    assert!(output.slides[0].error.is_none());
    assert!(output.stats.provider.is_none());

    let parts = part_names(&output.deck);
    assert!(!parts.iter().any(|p| p.starts_with("ppt/notesSlides/")));
    assert!(!parts.iter().any(|p| p.starts_with("ppt/notesMasters/")));
    let presentation = read_text(&output.deck, "ppt/presentation.xml");
    assert!(presentation.contains(r#"<p:sldSz cx="9144000" cy="5143500"/>"#));
}

#[tokio::test]
async fn empty_document_gives_valid_empty_deck() {
    let rasterizer = FakeRasterizer::new(0);
    let providers = Arc::new(FakeProviders::default());

    let output = converter(&rasterizer, &providers)
        .convert(PDF, &config_with_key("gemini"), &credentials())
        .await
        .unwrap();

    assert!(output.slides.is_empty());
    assert_eq!(output.stats.total_slides, 0);
    let parts = part_names(&output.deck);
    assert!(parts.contains(&"[Content_Types].xml".to_string()));
    assert!(parts.contains(&"ppt/presentation.xml".to_string()));
    assert!(!parts.iter().any(|p| p.starts_with("ppt/slides/")));
}

#[tokio::test]
async fn unknown_provider_fails_before_rendering() {
    let rasterizer = FakeRasterizer::new(2);
    let providers = Arc::new(FakeProviders::default());

    let err = converter(&rasterizer, &providers)
        .convert(PDF, &config_with_key("foo"), &credentials())
        .await
        .unwrap_err();

    assert!(matches!(err, NotePptError::UnsupportedProvider { ref provider } if provider == "foo"));
    assert!(err.is_user_error());
    assert_eq!(rasterizer.calls(), 0);
    assert!(providers.created().is_empty());
}

#[tokio::test]
async fn unreadable_document_aborts_without_provider_calls() {
    let rasterizer = FakeRasterizer::unreadable();
    let providers = Arc::new(FakeProviders::default());

    let err = converter(&rasterizer, &providers)
        .convert(PDF, &config_with_key("gemini"), &credentials())
        .await
        .unwrap_err();

    assert!(matches!(err, NotePptError::InvalidDocument { ref detail } if detail.contains("xref")));
    assert!(err.is_user_error());
    assert_eq!(rasterizer.calls(), 1);
    // Pre-flight builds the provider, but no slide is ever sent to it.
    assert_eq!(providers.created().len(), 1);
    assert_eq!(providers.analyzed(), 0);
}

#[tokio::test]
async fn unencodable_page_fails_assembly() {
    let rasterizer = FakeRasterizer::with_page_size(1, 0, 0);
    let providers = Arc::new(FakeProviders::default());
    let config = ConversionConfig::builder()
        .generate_notes(false)
        .build()
        .unwrap();

    let err = converter(&rasterizer, &providers)
        .convert(PDF, &config, &credentials())
        .await
        .unwrap_err();

    assert!(matches!(err, NotePptError::AssemblyFailed { ref detail } if detail.contains("slide 1")));
    assert!(!err.is_user_error());
    assert!(providers.created().is_empty());
}

#[tokio::test]
async fn missing_credential_fails_before_rendering() {
    let rasterizer = FakeRasterizer::new(2);
    let providers = Arc::new(FakeProviders::default());
    let config = ConversionConfig::builder().provider("grok").build().unwrap();

    let err = converter(&rasterizer, &providers)
        .convert(PDF, &config, &credentials())
        .await
        .unwrap_err();

    assert!(matches!(err, NotePptError::MissingCredential { ref provider } if provider == "grok"));
    assert_eq!(rasterizer.calls(), 0);
}

#[tokio::test]
async fn stored_key_and_default_model_are_used() {
    let master = noteppt::credentials::generate_master_key();
    let vault = KeyVault::new(&SecretString::from(master.clone())).unwrap();
    let store = Arc::new(InMemoryKeyStore::new());
    store.insert("alice", "anthropic", vault.encrypt("sk-ant-stored").unwrap());

    let deployment = no_env()
        .with_master_key(master)
        .with_fallback_key(ProviderKind::Anthropic, "sk-ant-fallback");
    let resolver = CredentialResolver::from_deployment(deployment)
        .unwrap()
        .with_store(store);

    let rasterizer = FakeRasterizer::new(1);
    let providers = Arc::new(FakeProviders::default());
    let config = ConversionConfig::builder()
        .provider("Claude")
        .user_id("alice")
        .build()
        .unwrap();

    converter(&rasterizer, &providers)
        .convert(PDF, &config, &resolver)
        .await
        .unwrap();

    let created = providers.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].kind, ProviderKind::Anthropic);
    assert_eq!(created[0].api_key.expose_secret(), "sk-ant-stored");
    assert_eq!(created[0].model, ProviderKind::Anthropic.default_model());
}

#[tokio::test]
async fn context_reaches_the_provider() {
    let rasterizer = FakeRasterizer::new(1);
    let providers = Arc::new(FakeProviders::default());
    let config = ConversionConfig::builder()
        .provider("openai")
        .api_key("sk-request")
        .context("quarterly review")
        .build()
        .unwrap();

    let output = converter(&rasterizer, &providers)
        .convert(PDF, &config, &credentials())
        .await
        .unwrap();

    assert_eq!(
        output.slides[0].notes.as_deref(),
        Some("Notes for slide 1 (quarterly review)")
    );
}

#[tokio::test]
async fn watermark_is_masked_unless_kept() {
    let rasterizer = FakeRasterizer::new(1);

    let providers = Arc::new(FakeProviders::default());
    let output = converter(&rasterizer, &providers)
        .convert(PDF, &config_with_key("openai"), &credentials())
        .await
        .unwrap();
    assert_eq!(providers.corners(), vec![Rgb([255, 255, 255])]);
    let png = image::load_from_memory(&read_part(&output.deck, "ppt/media/image1.png"))
        .unwrap()
        .to_rgb8();
    assert_eq!(*png.get_pixel(199, 99), Rgb([255, 255, 255]));

    let providers = Arc::new(FakeProviders::default());
    let config = ConversionConfig::builder()
        .provider("openai")
        .api_key("sk-request")
        .remove_watermark(false)
        .build()
        .unwrap();
    converter(&rasterizer, &providers)
        .convert(PDF, &config, &credentials())
        .await
        .unwrap();
    assert_eq!(providers.corners(), vec![Rgb([10, 10, 10])]);
}

#[tokio::test]
async fn concurrent_generation_preserves_slide_order() {
    let rasterizer = FakeRasterizer::new(4);
    let providers = Arc::new(FakeProviders {
        stagger: true,
        ..Default::default()
    });
    let config = ConversionConfig::builder()
        .provider("openai")
        .api_key("sk-request")
        .concurrency(4)
        .build()
        .unwrap();

    let output = converter(&rasterizer, &providers)
        .convert(PDF, &config, &credentials())
        .await
        .unwrap();

    let notes: Vec<_> = output
        .slides
        .iter()
        .map(|s| s.notes.clone().unwrap())
        .collect();
    assert_eq!(
        notes,
        (1..=4).map(|n| format!("Notes for slide {n}")).collect::<Vec<_>>()
    );
    for (i, s) in output.slides.iter().enumerate() {
        assert_eq!(s.index, i);
    }
}

/// Records callback events and cancels the job after `cancel_after` slides.
struct Recorder {
    events: Mutex<Vec<String>>,
    cancel: Option<(CancelFlag, usize)>,
}

impl ConversionProgressCallback for Recorder {
    fn on_conversion_start(&self, total_slides: usize) {
        self.events.lock().unwrap().push(format!("start {total_slides}"));
    }

    fn on_slide_start(&self, slide: usize, _total: usize) {
        self.events.lock().unwrap().push(format!("slide {slide}"));
    }

    fn on_slide_complete(&self, slide: usize, _total: usize, _notes_len: usize) {
        self.events.lock().unwrap().push(format!("ok {slide}"));
        if let Some((ref flag, after)) = self.cancel {
            if slide >= after {
                flag.cancel();
            }
        }
    }

    fn on_slide_error(&self, slide: usize, _total: usize, _error: String) {
        self.events.lock().unwrap().push(format!("err {slide}"));
    }

    fn on_conversion_complete(&self, total_slides: usize, with_notes: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {total_slides}/{with_notes}"));
    }
}

#[tokio::test]
async fn progress_events_follow_the_job() {
    let rasterizer = FakeRasterizer::new(3);
    let providers = FakeProviders::failing(&[2]);
    let recorder = Arc::new(Recorder {
        events: Mutex::new(Vec::new()),
        cancel: None,
    });
    let config = ConversionConfig::builder()
        .provider("gemini")
        .api_key("key")
        .progress_callback(Arc::clone(&recorder) as Arc<dyn ConversionProgressCallback>)
        .build()
        .unwrap();

    converter(&rasterizer, &providers)
        .convert(PDF, &config, &credentials())
        .await
        .unwrap();

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "start 3", "slide 1", "ok 1", "slide 2", "err 2", "slide 3", "ok 3", "done 3/2"
        ]
    );
}

#[tokio::test]
async fn cancellation_keeps_remaining_slides_without_notes() {
    let rasterizer = FakeRasterizer::new(3);
    let providers = Arc::new(FakeProviders::default());
    let flag = CancelFlag::new();
    let recorder = Arc::new(Recorder {
        events: Mutex::new(Vec::new()),
        cancel: Some((flag.clone(), 1)),
    });
    let config = ConversionConfig::builder()
        .provider("openai")
        .api_key("sk-request")
        .cancel_flag(flag)
        .progress_callback(Arc::clone(&recorder) as Arc<dyn ConversionProgressCallback>)
        .build()
        .unwrap();

    let output = converter(&rasterizer, &providers)
        .convert(PDF, &config, &credentials())
        .await
        .unwrap();

    assert_eq!(output.slides.len(), 3);
    assert!(output.slides[0].has_notes());
    assert!(matches!(
        output.slides[1].error,
        Some(SlideError::Cancelled { slide: 2 })
    ));
    assert!(matches!(
        output.slides[2].error,
        Some(SlideError::Cancelled { slide: 3 })
    ));
    assert_eq!(output.stats.cancelled_slides, 2);
    assert_eq!(output.stats.failed_slides, 0);
    assert_eq!(part_names(&output.deck).iter().filter(|p| p.starts_with("ppt/slides/slide")).count(), 3);
}

#[tokio::test]
async fn convert_to_file_writes_the_deck() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("deck.pptx");
    let rasterizer = FakeRasterizer::new(2);
    let providers = Arc::new(FakeProviders::default());

    let output = converter(&rasterizer, &providers)
        .convert(PDF, &config_with_key("openai"), &credentials())
        .await
        .unwrap();
    noteppt::convert::write_atomically(&path, &output.deck).unwrap();

    let written = std::fs::read(&path).unwrap();
    assert_eq!(written, output.deck);
    assert!(part_names(&written).contains(&"ppt/slides/slide2.xml".to_string()));
}

#[test]
fn converter_runs_on_blocking_runtime() {
    let rasterizer = FakeRasterizer::new(1);
    let providers = Arc::new(FakeProviders::default());
    let output = tokio_test::block_on(converter(&rasterizer, &providers).convert(
        PDF,
        &config_with_key("openai"),
        &credentials(),
    ))
    .unwrap();
    assert_eq!(output.slides.len(), 1);
}
