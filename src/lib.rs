//! # edgequake-img2text
//!
//! Extract text from images using Vision Language Models (VLMs).
//!
//! The model does the reading. This crate does everything around it: it
//! validates the image, shrinks files that are too large to upload, declares
//! the correct media type, sends a single request and hands back the text.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image path / URL
//!  │
//!  ├─ 1. Input       resolve local file or download from URL
//!  ├─ 2. Preprocess  decode; > 5 MiB → fit within 2048 px, re-encode PNG
//!  ├─ 3. Encode      base64 + media type detected from the bytes
//!  ├─ 4. VLM         one request: image attachment + extraction prompt
//!  └─ 5. Output      text to stdout, a .txt file, or JSON
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_img2text::{ExtractionConfig, Extractor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads ANTHROPIC_API_KEY; fails here if it is missing.
//!     let extractor = Extractor::new(ExtractionConfig::default())?;
//!     let result = extractor.extract("receipt.jpg").await?;
//!     println!("{}", result.text);
//!     eprintln!("{} tokens in / {} out",
//!         result.stats.input_tokens,
//!         result.stats.output_tokens);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `img2text` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{ExtractionError, Img2TextError, PreprocessError};
pub use extract::{
    check_credential, credential_env_vars, extract, extract_sync, extract_to_file,
    output_path_for, Extractor,
};
pub use output::{ExtractionResult, ImageStats};
pub use pipeline::preprocess::{
    inspect_image, preprocess_image, EncodedPayload, ImageAsset, PreprocessOptions,
};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use prompts::PromptStyle;
