//! Prompts for vision-model page extraction.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing extraction behaviour requires
//!    editing exactly one place.
//! 2. **Testability** — unit tests can inspect rendered prompts directly
//!    without a live model call.

use crate::model::{Detected, StructuredDescription};

/// Prompt for the structured analysis pass.
///
/// The response is additionally constrained server-side by a JSON response
/// schema; the prompt spells the shape out so weaker models comply too.
pub const ANALYSIS_PROMPT: &str = r#"Analyze the document page in the provided image and report what it contains.

Return a JSON object with exactly these fields:
- "text_detected": "Yes" if the page contains any readable text, else "No"
- "tables_detected": "Yes" if the page contains one or more tables, else "No"
- "images_detected": "Yes" if the page contains photographs, figures, charts, or other embedded images, else "No"
- "latex_detected": "Yes" if the page contains mathematical equations or formulas, else "No"
- "extracted_text": all text readable on the page, in natural reading order
- "confidence_score": your confidence in the extracted text, from 0.0 to 1.0

Output ONLY the JSON object."#;

/// Extracted text is trusted as a transcription reference only above this
/// analysis confidence.
const CONFIDENCE_FLOOR: f32 = 0.6;

/// Render the markdown-generation prompt from the analysis result.
///
/// The same template serves both modes: detailed mode passes the real
/// [`StructuredDescription`]; fallback/simple mode passes
/// [`StructuredDescription::fallback()`].
pub fn markdown_prompt(description: &StructuredDescription, custom_prompt: Option<&str>) -> String {
    let mut prompt = String::from(
        "Your task is to transcribe the document page in the provided image into clean, \
         well-structured Markdown.\n\n\
         - Preserve all text content completely and in natural reading order.\n\
         - Use Markdown headings, lists, bold and italic to match the visual structure.\n\
         - Do not add commentary, page numbers, or content that is not on the page.\n",
    );

    if description.tables_detected == Detected::Yes {
        prompt.push_str(
            "- Convert every table to GitHub-flavored Markdown pipe syntax, keeping all \
             rows and columns.\n",
        );
    }

    if description.latex_detected == Detected::Yes {
        prompt.push_str(
            "- Render mathematical expressions as LaTeX: $...$ for inline math and \
             $$...$$ for display math.\n",
        );
    }

    if description.confidence_score > CONFIDENCE_FLOOR && !description.extracted_text.is_empty() {
        prompt.push_str(
            "\nUse the following previously extracted text as a transcription reference, \
             correcting it against the image where they disagree:\n\n\"\"\"\n",
        );
        prompt.push_str(&description.extracted_text);
        prompt.push_str("\n\"\"\"\n");
    }

    prompt.push_str("\nOutput ONLY the Markdown content, without enclosing code fences.");

    if let Some(custom) = custom_prompt {
        if !custom.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(custom);
        }
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description(tables: Detected, latex: Detected, confidence: f32, text: &str) -> StructuredDescription {
        StructuredDescription {
            text_detected: Detected::Yes,
            tables_detected: tables,
            images_detected: Detected::No,
            latex_detected: latex,
            extracted_text: text.to_string(),
            confidence_score: confidence,
        }
    }

    #[test]
    fn high_confidence_text_is_included_as_reference() {
        let prompt = markdown_prompt(&description(Detected::No, Detected::No, 0.9, "Hello world"), None);
        assert!(prompt.contains("Hello world"));
        assert!(!prompt.contains("pipe syntax"));
    }

    #[test]
    fn low_confidence_text_is_omitted() {
        let prompt = markdown_prompt(&description(Detected::No, Detected::No, 0.3, "garbled"), None);
        assert!(!prompt.contains("garbled"));
    }

    #[test]
    fn fallback_prompt_asks_for_tables_but_not_latex() {
        let prompt = markdown_prompt(&StructuredDescription::fallback(), None);
        assert!(prompt.contains("pipe syntax"));
        assert!(!prompt.contains("LaTeX"));
    }

    #[test]
    fn custom_prompt_is_appended_last() {
        let prompt = markdown_prompt(
            &StructuredDescription::fallback(),
            Some("Translate all headings to French."),
        );
        assert!(prompt.trim_end().ends_with("Translate all headings to French."));
    }
}
