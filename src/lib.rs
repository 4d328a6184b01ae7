//! # noteppt
//!
//! Turn a PDF slide deck into a PowerPoint presentation with AI-written
//! speaker notes.
//!
//! ## Why this crate?
//!
//! Decks exported to PDF lose their speaker notes, and many decks never had
//! any. This crate rasterises each page into a full-bleed picture slide and
//! asks a vision model to write presenter notes for it: the key message, an
//! explanation, a transition to the next slide, likely audience questions and
//! delivery tips. The result opens in PowerPoint, Keynote or LibreOffice.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Pre-flight  provider name, API key (request › stored › fallback)
//!  ├─ 2. Render      rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Mask        paint over the bottom-right watermark (optional)
//!  ├─ 4. Notes       one vision call per slide; failures stay per-slide
//!  └─ 5. Assemble    .pptx package + per-slide results
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use noteppt::{convert, ConversionConfig, CredentialResolver, DeploymentConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Fallback keys come from GEMINI_API_KEY / OPENAI_API_KEY / ANTHROPIC_API_KEY / XAI_API_KEY
//!     let credentials = CredentialResolver::from_deployment(DeploymentConfig::from_env())?;
//!     let config = ConversionConfig::builder()
//!         .provider("gemini")
//!         .context("Internal all-hands, Q3 results")
//!         .build()?;
//!
//!     let pdf = std::fs::read("deck.pdf")?;
//!     let output = convert(&pdf, &config, &credentials).await?;
//!     std::fs::write("deck.pptx", &output.deck)?;
//!     eprintln!("{}/{} slides have notes",
//!         output.stats.slides_with_notes,
//!         output.stats.total_slides);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `noteppt` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! noteppt = { version = "0.3", default-features = false }
//! ```
//!
//! ## Providers
//!
//! | Provider | Aliases | Default model | Fallback key variable |
//! |----------|---------|---------------|-----------------------|
//! | `gemini` | | `gemini-2.5-flash` | `GEMINI_API_KEY`, `GOOGLE_API_KEY` |
//! | `openai` | | `gpt-4o` | `OPENAI_API_KEY` |
//! | `anthropic` | `claude` | `claude-3-5-sonnet-20241022` | `ANTHROPIC_API_KEY` |
//! | `grok` | `xai` | `grok-2-1212` | `XAI_API_KEY`, `GROK_API_KEY` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod credentials;
pub mod deck;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{CancelFlag, ConversionConfig, ConversionConfigBuilder, DeploymentConfig};
pub use convert::{convert, convert_sync, convert_to_file, Converter, JobState};
pub use credentials::{
    CredentialResolver, CredentialSource, InMemoryKeyStore, JsonFileKeyStore, KeyRecordStore,
    KeyVault,
};
pub use deck::{CanvasSize, DeckSlide};
pub use error::{NotePptError, ProviderError, SlideError};
pub use output::{ConversionOutput, ConversionReport, ConversionStats, SlideResult};
pub use pipeline::{PdfiumRasterizer, Rasterizer, SlideImage};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use provider::{ProviderConfig, ProviderFactory, ProviderKind, ProviderOptions, VisionProvider};
