//! Extraction instructions sent alongside the image.
//!
//! Keeping every prompt here means changing what the model is asked for
//! touches exactly one file, and tests can inspect the prompts without a
//! live model.
//!
//! Callers can override the built-in text via
//! [`crate::config::ExtractionConfig::prompt`].

use serde::{Deserialize, Serialize};

/// Exhaustive extraction: layout, emphasis and legibility notes.
///
/// Used by default.
pub const COMPREHENSIVE_PROMPT: &str = "Please perform a comprehensive text extraction from this image. \
I want you to:\n\
1. Extract ALL visible text, including headers, captions, labels\n\
2. Preserve the original formatting and layout as much as possible\n\
3. If text is in multiple columns or sections, clearly indicate this\n\
4. Note any special formatting like bold, italics, or different font sizes\n\
5. If some text is unclear, mention 'Partially legible' or 'Text partially obscured'";

/// Plain extraction with no formatting annotations.
pub const BASIC_PROMPT: &str = "Please extract all the text from this image. \
If there are multiple text regions, list them clearly.";

/// Which built-in instruction to send.
///
/// | Style | Use case |
/// |-------|----------|
/// | `Basic` | Feeding search indexes or embeddings, where annotations are noise |
/// | `Comprehensive` | Human-readable transcripts of documents and screenshots (default) |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PromptStyle {
    Basic,
    #[default]
    Comprehensive,
}

impl PromptStyle {
    pub fn text(self) -> &'static str {
        match self {
            PromptStyle::Basic => BASIC_PROMPT,
            PromptStyle::Comprehensive => COMPREHENSIVE_PROMPT,
        }
    }
}
