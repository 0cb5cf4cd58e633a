//! Configuration types for image text extraction.
//!
//! Every knob that the original scripts hard-coded (model, token bound,
//! size threshold, credential source) lives in [`ExtractionConfig`], built
//! via [`ExtractionConfigBuilder`]. Input and output paths are passed to the
//! [`crate::Extractor`] calls directly so one config can serve a whole batch.

use crate::error::Img2TextError;
use crate::progress::ProgressCallback;
use crate::prompts::PromptStyle;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Files larger than this are downscaled and re-encoded as PNG: 5 MiB.
pub const DEFAULT_SIZE_THRESHOLD_BYTES: u64 = 5 * 1024 * 1024;

/// Longest side, in pixels, of a downscaled image.
pub const DEFAULT_MAX_DIMENSION: u32 = 2048;

/// Provider used when none is named.
pub const DEFAULT_PROVIDER: &str = "anthropic";

/// Model used when none is named.
pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";

/// Configuration for extracting text from one or more images.
///
/// # Example
/// ```rust
/// use edgequake_img2text::{ExtractionConfig, PromptStyle};
///
/// let config = ExtractionConfig::builder()
///     .model("claude-sonnet-4-20250514")
///     .max_tokens(2048)
///     .prompt_style(PromptStyle::Basic)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_tokens, 2048);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// LLM provider name ("anthropic", "openai", "gemini", "mistral", "ollama", ...).
    /// Default: "anthropic". Also selects the credential environment variable.
    pub provider_name: String,

    /// LLM model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`
    /// and skips the credential check.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Maximum tokens the model may generate per image. Default: 4096.
    ///
    /// Dense scans (forms, tables, two-column articles) easily pass 1 000
    /// output tokens; too low a bound truncates the transcript mid-line.
    pub max_tokens: usize,

    /// Sampling temperature. Default: None (provider default).
    pub temperature: Option<f32>,

    /// Built-in instruction to send with the image. Default: Comprehensive.
    pub prompt_style: PromptStyle,

    /// Custom instruction. Overrides `prompt_style` when set.
    pub prompt: Option<String>,

    /// On-disk size above which the image is downscaled and re-encoded.
    /// Default: 5 MiB.
    pub size_threshold_bytes: u64,

    /// Longest side, in pixels, after downscaling. Default: 2048.
    pub max_dimension: u32,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional per-image progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            provider_name: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            provider: None,
            max_tokens: 4096,
            temperature: None,
            prompt_style: PromptStyle::default(),
            prompt: None,
            size_threshold_bytes: DEFAULT_SIZE_THRESHOLD_BYTES,
            max_dimension: DEFAULT_MAX_DIMENSION,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("prompt_style", &self.prompt_style)
            .field("prompt", &self.prompt.as_ref().map(|p| p.len()))
            .field("size_threshold_bytes", &self.size_threshold_bytes)
            .field("max_dimension", &self.max_dimension)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The instruction text actually sent with each image.
    pub fn prompt_text(&self) -> &str {
        self.prompt
            .as_deref()
            .unwrap_or_else(|| self.prompt_style.text())
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn prompt_style(mut self, style: PromptStyle) -> Self {
        self.config.prompt_style = style;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn size_threshold_bytes(mut self, bytes: u64) -> Self {
        self.config.size_threshold_bytes = bytes;
        self
    }

    pub fn max_dimension(mut self, px: u32) -> Self {
        self.config.max_dimension = px;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, Img2TextError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(Img2TextError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.max_dimension == 0 {
            return Err(Img2TextError::InvalidConfig(
                "max_dimension must be ≥ 1".into(),
            ));
        }
        if c.size_threshold_bytes == 0 {
            return Err(Img2TextError::InvalidConfig(
                "size_threshold_bytes must be ≥ 1".into(),
            ));
        }
        if c.provider.is_none() && c.provider_name.trim().is_empty() {
            return Err(Img2TextError::InvalidConfig(
                "provider_name must not be empty".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(Img2TextError::InvalidConfig("model must not be empty".into()));
        }
        if let Some(ref p) = c.prompt {
            if p.trim().is_empty() {
                return Err(Img2TextError::InvalidConfig("prompt must not be empty".into()));
            }
        }
        Ok(self.config)
    }
}
