/*!
 * Built-in prompt templates.
 *
 * Templates use `{source_language}` and `{target_language}` placeholders which
 * are rendered with human readable language names.
 */

use crate::language_utils::display_language_name;

/// A system prompt with placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Default system prompt for text translation with chat models
    pub const TRANSLATOR: &'static str = r#"You are a professional translator. Translate the user's text from {source_language} to {target_language}.

- Output ONLY the translation, with no explanations, notes or quotation marks
- Preserve line breaks, numbers, URLs and code identifiers
- If the text is already in {target_language}, return it unchanged"#;

    /// Default system prompt for screen text extraction with vision models
    pub const VISION_OCR: &'static str = r#"You are an OCR engine. Extract every piece of visible text from the image.

Return ONLY a JSON object of this exact shape, with no markdown fencing and no commentary:
{"segments":[{"text":"...","boundingBox":{"x":0.0,"y":0.0,"width":0.0,"height":0.0},"confidence":0.0}]}

Rules:
- One segment per line or visually separate block of text, in reading order
- boundingBox coordinates are normalized to the image: 0.0 to 1.0, origin top-left
- confidence is between 0.0 and 1.0
- If there is no text, return {"segments":[]}"#;

    /// Follow-up instruction sent when a vision response was cut off
    pub const VISION_CONTINUE: &'static str = "Your previous response was cut off. Continue the JSON output exactly where it stopped. Do not repeat segments you already returned and do not restart the object.";

    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    pub fn translator() -> Self {
        Self::new(Self::TRANSLATOR)
    }

    pub fn vision() -> Self {
        Self::new(Self::VISION_OCR)
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Render the template with the given language codes.
    ///
    /// A missing or `auto` source renders as "the detected language".
    pub fn render(&self, source_language: Option<&str>, target_language: &str) -> String {
        let source = match source_language {
            Some(code) if !code.eq_ignore_ascii_case("auto") && !code.is_empty() => display_language_name(code),
            _ => "the detected language".to_string(),
        };
        self.template
            .replace("{source_language}", &source)
            .replace("{target_language}", &display_language_name(target_language))
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::translator()
    }
}
