//! Result types returned by the extractor.

use serde::{Deserialize, Serialize};

/// Text extracted from one image, plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Path or URL exactly as the caller supplied it.
    pub source: String,
    /// The model's reply, unmodified.
    pub text: String,
    /// Model that produced the text.
    pub model: String,
    pub stats: ImageStats,
}

/// Preprocessing and request accounting for one image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageStats {
    /// MIME type declared for the attachment.
    pub media_type: String,
    /// Size of the original file on disk.
    pub original_bytes: u64,
    /// Size of the bytes sent (before base64).
    pub payload_bytes: u64,
    pub width: u32,
    pub height: u32,
    /// True when the image was downscaled and re-encoded as PNG.
    pub resized: bool,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub preprocess_ms: u64,
    pub llm_ms: u64,
}
