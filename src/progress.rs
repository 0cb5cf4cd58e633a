//! Progress-callback trait for per-image extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the extractor works through a batch of images.
//!
//! # Example
//!
//! ```rust
//! use edgequake_img2text::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_image_complete(&self, index: usize, total: usize, text_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Image {}/{} done ({} bytes)", index, total, text_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the extractor as it processes each image.
///
/// Images are processed one at a time, but the trait is `Send + Sync` so the
/// config holding it can move across tasks. All methods default to no-ops.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before the first image of a batch.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called before an image is preprocessed.
    ///
    /// # Arguments
    /// * `index`  — 1-indexed position in the batch
    /// * `total`  — batch size (1 for single extractions)
    /// * `source` — the path or URL as given by the caller
    fn on_image_start(&self, index: usize, total: usize, source: &str) {
        let _ = (index, total, source);
    }

    /// Called when the model returned text for an image.
    fn on_image_complete(&self, index: usize, total: usize, text_len: usize) {
        let _ = (index, total, text_len);
    }

    /// Called when an image failed at any stage.
    fn on_image_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every image of a batch has been attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
