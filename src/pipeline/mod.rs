//! Pipeline stages for image text extraction.
//!
//! Each submodule implements exactly one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ preprocess ──▶ llm
//! (URL/path)  (validate,    (one VLM
//!              downscale,    request)
//!              base64)
//! ```
//!
//! 1. [`input`]      — canonicalise the user-supplied path or URL to a local file
//! 2. [`preprocess`] — decode, downscale oversized files to PNG, base64-encode;
//!    runs in `spawn_blocking` because decoding and resampling are CPU-bound
//! 3. [`llm`]        — send the image and instruction; the only stage that
//!    talks to the model

pub mod input;
pub mod llm;
pub mod preprocess;
