//! Prompt for speaker-notes generation.
//!
//! Every provider sends exactly the same instruction text so that notes from
//! different backends are comparable. The variable parts are the language line
//! and the optional context section appended when the caller supplied
//! background material.

/// Instruction sent with every slide image. `{language}` is replaced by the
/// language line.
pub const SPEAKER_NOTES_PROMPT: &str = r#"Analyze this slide image and write speaker notes for the presenter.

Include the following in the speaker notes:
1. **Key message**: the single most important point this slide must get across
2. **Explanation**: elaboration on what is shown on the slide
3. **Transition**: a natural line that leads into the next slide
4. **Anticipated questions**: questions the audience may ask, with guidance for answering them
5. **Delivery tips**: what to emphasise, pacing, and where to pause

Format:
- {language}
- Aim for a 2–3 minute spoken script
- Use bullet points so the notes are easy to scan while presenting"#;

const DEFAULT_LANGUAGE_LINE: &str = "Write in the language used on the slide";

/// Build the full prompt for one slide.
///
/// Blank context is treated as no context, and a blank language as none.
pub fn speaker_notes_prompt(context: Option<&str>, language: Option<&str>) -> String {
    let language_line = match language.map(str::trim).filter(|l| !l.is_empty()) {
        Some(lang) => format!("Write in {lang}"),
        None => DEFAULT_LANGUAGE_LINE.to_string(),
    };
    let template = SPEAKER_NOTES_PROMPT.replace("{language}", &language_line);
    match context.map(str::trim).filter(|c| !c.is_empty()) {
        Some(ctx) => format!("{template}{}", context_section(ctx)),
        None => template,
    }
}

fn context_section(context: &str) -> String {
    format!(
        "\n\n---\nReference material (context):\n{context}\n---\n\n\
Use the reference material above to make the notes for this slide richer and more specific."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_without_context_is_the_template() {
        let expected = SPEAKER_NOTES_PROMPT.replace("{language}", DEFAULT_LANGUAGE_LINE);
        assert_eq!(speaker_notes_prompt(None, None), expected);
        assert_eq!(speaker_notes_prompt(Some("  \n"), Some(" ")), expected);
        assert!(!expected.contains("{language}"));
    }

    #[test]
    fn language_line_follows_setting() {
        let p = speaker_notes_prompt(None, Some("Korean"));
        assert!(p.contains("- Write in Korean\n"));
        assert!(!p.contains(DEFAULT_LANGUAGE_LINE));
        assert!(p.contains("2–3 minute"));
    }

    #[test]
    fn prompt_covers_all_five_sections() {
        let p = speaker_notes_prompt(None, None);
        for needle in [
            "Key message",
            "Explanation",
            "Transition",
            "Anticipated questions",
            "Delivery tips",
        ] {
            assert!(p.contains(needle), "missing {needle}");
        }
    }

    #[test]
    fn context_is_appended_after_template() {
        let p = speaker_notes_prompt(Some("Revenue grew 12% in Q3."), None);
        assert!(p.starts_with(&speaker_notes_prompt(None, None)));
        assert!(p.contains("Revenue grew 12% in Q3."));
        assert!(p.contains("Reference material"));
    }
}
