//! Error types for the noteppt library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`NotePptError`]: **Fatal**: the job cannot run or cannot finish (bad
//!   PDF, unknown provider, no API key, deck could not be written). Returned as
//!   `Err(NotePptError)` from the top-level `convert*` functions.
//!
//! * [`SlideError`]: **Non-fatal**: note generation failed for one slide but
//!   every other slide is fine. Stored inside [`crate::output::SlideResult`];
//!   the slide still appears in the deck, just without speaker notes.
//!
//! Raw backend failures are modelled separately by [`ProviderError`]. They are
//! logged in full and summarised into a [`SlideError`] so callers never see a
//! vendor's raw response body.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the noteppt library.
///
/// Only [`NotePptError::AssemblyFailed`] can occur after a provider call has
/// been made; everything else is a pre-flight check.
#[derive(Debug, Error)]
pub enum NotePptError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input bytes are not a PDF, or pdfium could not parse them.
    #[error("Input is not a readable PDF: {detail}")]
    InvalidDocument { detail: String },

    // ── Provider / credential errors ──────────────────────────────────────
    /// The provider identifier is not one of the supported backends.
    #[error("Unsupported AI provider '{provider}'.\nSupported: gemini, openai, anthropic (claude), grok (xai).")]
    UnsupportedProvider { provider: String },

    /// No API key could be resolved for the requested provider.
    #[error(
        "No API key available for provider '{provider}'.\n\
Pass an API key with the request, store one for your account, or ask the operator to configure a fallback key."
    )]
    MissingCredential { provider: String },

    /// The provider's transport could not be constructed.
    #[error("AI provider '{provider}' is unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    // ── Rendering errors ──────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place libpdfium next to the binary,\n\
or install it in a system library path.\n"
    )]
    RendererUnavailable(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Building the presentation package failed.
    #[error("Failed to assemble presentation: {detail}")]
    AssemblyFailed { detail: String },

    /// Could not create or write the output presentation file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NotePptError {
    /// Whether the caller can fix this by changing the request.
    ///
    /// HTTP front-ends map these to 4xx responses; everything else is a
    /// server-side fault.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            NotePptError::InvalidDocument { .. }
                | NotePptError::UnsupportedProvider { .. }
                | NotePptError::MissingCredential { .. }
                | NotePptError::InvalidConfig(_)
        )
    }
}

/// A non-fatal error for a single slide.
///
/// Stored alongside [`crate::output::SlideResult`] when note generation fails.
/// The job continues and the slide is written without notes.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum SlideError {
    /// The provider call failed (after retries, if any were configured).
    #[error("Slide {slide}: notes generation failed after {retries} retries: {detail}")]
    NotesFailed {
        slide: usize,
        retries: u32,
        detail: String,
    },

    /// The provider call exceeded the per-call timeout.
    #[error("Slide {slide}: notes generation timed out after {secs}s")]
    Timeout { slide: usize, secs: u64 },

    /// The job was cancelled before this slide was processed.
    #[error("Slide {slide}: skipped, conversion was cancelled")]
    Cancelled { slide: usize },
}

/// Errors raised by a [`crate::provider::VisionProvider`] call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network or TLS failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request exceeded the transport timeout.
    #[error("request timed out")]
    Timeout,

    /// 401/403; retrying will not help.
    #[error("authentication rejected (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    /// 429; the caller should back off.
    #[error("rate limit exceeded: {message}")]
    RateLimited { message: String },

    /// Any other non-success status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The response parsed but did not contain usable text.
    #[error("response contained no text")]
    EmptyResponse,

    /// The response body was not the JSON shape we expect.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The slide image could not be encoded for upload.
    #[error("image encoding failed: {0}")]
    Encode(String),
}

impl ProviderError {
    /// Whether a retry has any chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Transport(_) | ProviderError::Timeout => true,
            ProviderError::RateLimited { .. } => true,
            ProviderError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_decode() {
            ProviderError::Malformed(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}
