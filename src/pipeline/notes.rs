//! Speaker-notes generation for a single slide.
//!
//! ## Retry Strategy
//!
//! Rate limits and 5xx responses are transient under load, so they are
//! retried with exponential backoff (`retry_backoff_ms * 2^(attempt-1)`).
//! Authentication failures and malformed responses are permanent and fail
//! the slide immediately. The default `max_retries = 0` makes exactly one
//! attempt.
//!
//! ## Return Value
//!
//! Always returns a [`SlideResult`]; errors never propagate upward so one bad
//! slide cannot abort the deck.

use crate::config::ConversionConfig;
use crate::error::{ProviderError, SlideError};
use crate::output::SlideResult;
use crate::pipeline::SlideImage;
use crate::provider::VisionProvider;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

enum Failure {
    TimedOut,
    Provider(ProviderError),
}

impl Failure {
    fn is_retryable(&self) -> bool {
        match self {
            Failure::TimedOut => true,
            Failure::Provider(e) => e.is_retryable(),
        }
    }
}

/// Ask `provider` for notes on `slide`, honouring timeout and retry settings.
pub async fn generate_slide_notes(
    provider: &dyn VisionProvider,
    slide: &SlideImage,
    config: &ConversionConfig,
) -> SlideResult {
    let start = Instant::now();
    let slide_num = slide.slide_num();
    let per_call = Duration::from_secs(config.api_timeout_secs);

    let mut attempt: u32 = 0;
    let failure = loop {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms.saturating_mul(1u64 << (attempt - 1).min(16));
            warn!(
                "Slide {}: retry {}/{} after {}ms",
                slide_num, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let outcome = match timeout(per_call, provider.analyze_slide(slide, config.context_text())).await {
            Err(_) => Err(Failure::TimedOut),
            Ok(Err(ProviderError::Timeout)) => Err(Failure::TimedOut),
            Ok(Err(e)) => Err(Failure::Provider(e)),
            Ok(Ok(raw)) => match clean_notes(&raw) {
                notes if notes.is_empty() => Err(Failure::Provider(ProviderError::EmptyResponse)),
                notes => Ok(notes),
            },
        };

        match outcome {
            Ok(notes) => {
                debug!(
                    "Slide {}: {} chars of notes in {:?}",
                    slide_num,
                    notes.len(),
                    start.elapsed()
                );
                return SlideResult {
                    index: slide.index,
                    notes: Some(notes),
                    error: None,
                    duration_ms: start.elapsed().as_millis() as u64,
                    retries: attempt,
                };
            }
            Err(f) => {
                match &f {
                    Failure::TimedOut => warn!(
                        "Slide {}: attempt {} timed out after {}s",
                        slide_num,
                        attempt + 1,
                        config.api_timeout_secs
                    ),
                    Failure::Provider(e) => {
                        warn!("Slide {}: attempt {} failed: {}", slide_num, attempt + 1, e)
                    }
                }
                if attempt >= config.max_retries || !f.is_retryable() {
                    break f;
                }
                attempt += 1;
            }
        }
    };

    let error = match failure {
        Failure::TimedOut => SlideError::Timeout {
            slide: slide_num,
            secs: config.api_timeout_secs,
        },
        Failure::Provider(e) => SlideError::NotesFailed {
            slide: slide_num,
            retries: attempt,
            detail: e.to_string(),
        },
    };

    SlideResult {
        index: slide.index,
        notes: None,
        error: Some(error),
        duration_ms: start.elapsed().as_millis() as u64,
        retries: attempt,
    }
}

// ── Notes cleanup ────────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md|text)?\n(.*)\n```$").expect("valid regex"));

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Normalise model output for the notes pane.
///
/// Strips an outer code fence, converts line endings to `\n`, trims trailing
/// whitespace per line and collapses runs of blank lines to one.
pub fn clean_notes(raw: &str) -> String {
    let unix = raw.replace("\r\n", "\n").replace('\r', "\n");
    let trimmed = unix.trim();
    let unfenced = RE_OUTER_FENCES
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str());

    let lines: Vec<&str> = unfenced.lines().map(str::trim_end).collect();
    RE_BLANK_LINES
        .replace_all(&lines.join("\n"), "\n\n")
        .trim()
        .to_string()
}
