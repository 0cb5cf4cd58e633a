//! Error types for the edgequake-img2text library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`Img2TextError`] — **Fatal**: nothing can be extracted at all
//!   (missing API key, unknown provider, invalid configuration). Returned
//!   from [`crate::Extractor::new`] before any image is touched.
//!
//! * [`PreprocessError`] — **Per image**: the file could not be read,
//!   decoded or downscaled. No payload is produced.
//!
//! * [`ExtractionError`] — **Per image**: everything that can go wrong
//!   between "here is a path" and "here is the text", including the
//!   preprocessing failures above, the API call and the output write.
//!
//! Per-image errors never abort a batch: the caller reports them and moves
//! on to the next image.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors: the extractor cannot be constructed.
#[derive(Debug, Error)]
pub enum Img2TextError {
    /// The provider's API key environment variable is unset or empty.
    #[error("Missing credential for provider '{provider}'.\nSet the {var} environment variable.")]
    MissingCredential { provider: String, var: String },

    /// The provider factory rejected the provider/model pair.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// An image could not be turned into an encoded payload.
#[derive(Debug, Error)]
pub enum PreprocessError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Any other I/O failure while reading the file.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Image errors ──────────────────────────────────────────────────────
    /// Unknown format, truncated or corrupt data.
    #[error("Cannot decode image '{path}': {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Downscaling or PNG re-encoding failed.
    #[error("Cannot downscale image '{path}': {detail}")]
    ImageResize { path: PathBuf, detail: String },
}

/// A single image failed somewhere between input and output.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The extractor could not be built (one-off helpers only).
    #[error(transparent)]
    Setup(#[from] Img2TextError),

    /// Reading, decoding or resizing failed; no request was sent.
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    /// Transport or API-level failure. Not retried.
    #[error("LLM request failed: {message}")]
    Request { message: String },

    /// The model answered with no text at all.
    #[error("LLM returned an empty response for '{source_name}'")]
    EmptyResponse { source_name: String },

    /// Could not create or write the output text file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The blocking preprocessing task panicked or was cancelled.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExtractionError {
    /// True when the failure happened before any request was sent.
    pub fn is_preprocess(&self) -> bool {
        matches!(self, ExtractionError::Preprocess(_))
    }
}
