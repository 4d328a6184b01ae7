//! Output types returned by a conversion.

use crate::error::SlideError;
use serde::{Deserialize, Serialize};

/// Outcome of note generation for one slide.
///
/// Every rendered page produces exactly one `SlideResult`, whether or not
/// notes were generated; the slide itself is always in the deck.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideResult {
    /// 0-based position in the deck (== PDF page index).
    pub index: usize,
    /// Generated speaker notes, if any.
    pub notes: Option<String>,
    /// Why notes are missing, when they were requested but not produced.
    pub error: Option<SlideError>,
    /// Wall-clock time spent on this slide's provider calls.
    pub duration_ms: u64,
    /// Retries performed (0 = first attempt succeeded or nothing retried).
    pub retries: u32,
}

impl SlideResult {
    /// A slide for which notes were not requested.
    pub fn without_notes(index: usize) -> Self {
        Self {
            index,
            notes: None,
            error: None,
            duration_ms: 0,
            retries: 0,
        }
    }

    /// A slide skipped because the job was cancelled.
    pub fn cancelled(index: usize) -> Self {
        Self {
            error: Some(SlideError::Cancelled { slide: index + 1 }),
            ..Self::without_notes(index)
        }
    }

    /// 1-based slide number.
    pub fn slide_num(&self) -> usize {
        self.index + 1
    }

    pub fn has_notes(&self) -> bool {
        self.notes.as_deref().is_some_and(|n| !n.is_empty())
    }
}

/// Aggregate statistics for a conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_slides: usize,
    pub slides_with_notes: usize,
    /// Slides whose note generation failed or timed out.
    pub failed_slides: usize,
    /// Slides skipped after cancellation.
    pub cancelled_slides: usize,
    /// Canonical provider name; `None` when notes were disabled.
    pub provider: Option<String>,
    pub model: Option<String>,
    pub render_duration_ms: u64,
    pub notes_duration_ms: u64,
    pub total_duration_ms: u64,
    /// Size of the assembled presentation in bytes.
    pub deck_bytes: usize,
}

impl ConversionStats {
    /// Fill the per-slide counters from `slides`.
    pub fn count_slides(&mut self, slides: &[SlideResult]) {
        self.total_slides = slides.len();
        self.slides_with_notes = slides.iter().filter(|s| s.has_notes()).count();
        self.cancelled_slides = slides
            .iter()
            .filter(|s| matches!(s.error, Some(SlideError::Cancelled { .. })))
            .count();
        self.failed_slides = slides
            .iter()
            .filter(|s| s.error.is_some())
            .count()
            - self.cancelled_slides;
    }
}

/// Complete result of a conversion.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// The finished `.pptx` package.
    pub deck: Vec<u8>,
    /// One entry per slide, in deck order.
    pub slides: Vec<SlideResult>,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// Serialisable summary without the deck bytes or full notes text.
    pub fn report(&self) -> ConversionReport {
        ConversionReport {
            stats: self.stats.clone(),
            slides: self
                .slides
                .iter()
                .map(|s| SlideReport {
                    slide: s.slide_num(),
                    has_notes: s.has_notes(),
                    notes_chars: s.notes.as_deref().map_or(0, |n| n.chars().count()),
                    error: s.error.as_ref().map(ToString::to_string),
                    duration_ms: s.duration_ms,
                    retries: s.retries,
                })
                .collect(),
        }
    }
}

/// JSON-friendly job summary (used by the CLI `--json` mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionReport {
    pub stats: ConversionStats,
    pub slides: Vec<SlideReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideReport {
    pub slide: usize,
    pub has_notes: bool,
    pub notes_chars: usize,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub retries: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_notes(index: usize, text: &str) -> SlideResult {
        SlideResult {
            notes: Some(text.into()),
            ..SlideResult::without_notes(index)
        }
    }

    #[test]
    fn stats_separate_failures_from_cancellations() {
        let slides = vec![
            with_notes(0, "intro"),
            SlideResult {
                error: Some(SlideError::Timeout { slide: 2, secs: 30 }),
                ..SlideResult::without_notes(1)
            },
            SlideResult::cancelled(2),
            SlideResult::without_notes(3),
        ];
        let mut stats = ConversionStats::default();
        stats.count_slides(&slides);
        assert_eq!(stats.total_slides, 4);
        assert_eq!(stats.slides_with_notes, 1);
        assert_eq!(stats.failed_slides, 1);
        assert_eq!(stats.cancelled_slides, 1);
    }

    #[test]
    fn report_is_one_based_and_omits_notes_text() {
        let output = ConversionOutput {
            deck: vec![1, 2, 3],
            slides: vec![with_notes(0, "안녕하세요"), SlideResult::cancelled(1)],
            stats: ConversionStats::default(),
        };
        let report = output.report();
        assert_eq!(report.slides[0].slide, 1);
        assert_eq!(report.slides[0].notes_chars, 5);
        assert!(report.slides[1].error.as_deref().unwrap().contains("cancelled"));

        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("안녕하세요"));
    }

    #[test]
    fn empty_notes_do_not_count() {
        assert!(!with_notes(0, "").has_notes());
        assert!(with_notes(0, "x").has_notes());
    }
}
