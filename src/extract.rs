//! Extraction entry points.
//!
//! [`Extractor`] owns a resolved provider and a config, and turns one path
//! or URL at a time into an [`ExtractionResult`]. Building it is the only
//! step that can fail fatally: a missing API key is caught here, before any
//! image is read or any request is sent.
//!
//! The free functions [`extract`], [`extract_to_file`] and [`extract_sync`]
//! build a throwaway `Extractor` for one-off calls.

use crate::config::ExtractionConfig;
use crate::error::{ExtractionError, Img2TextError};
use crate::output::{ExtractionResult, ImageStats};
use crate::pipeline::preprocess::{preprocess_image_async, PreprocessOptions};
use crate::pipeline::{input, llm};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Environment variables the provider factory reads an API key from.
///
/// Any one of them being set is enough. Empty for local providers that need
/// no key, and for provider names we don't recognise (the provider factory
/// reports those).
pub fn credential_env_vars(provider_name: &str) -> &'static [&'static str] {
    match provider_name.to_ascii_lowercase().as_str() {
        "anthropic" | "claude" => &["ANTHROPIC_API_KEY"],
        "openai" => &["OPENAI_API_KEY"],
        "gemini" | "google" => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        "mistral" => &["MISTRAL_API_KEY"],
        "openrouter" => &["OPENROUTER_API_KEY"],
        "azure" => &["AZURE_OPENAI_API_KEY"],
        _ => &[],
    }
}

/// Fail with [`Img2TextError::MissingCredential`] unless one of the
/// provider's key variables is set.
///
/// `lookup` reads an environment variable; production code passes
/// `|k| std::env::var(k).ok()`.
pub fn check_credential(
    provider_name: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), Img2TextError> {
    let vars = credential_env_vars(provider_name);
    if vars.is_empty() {
        return Ok(());
    }
    let present = vars
        .iter()
        .any(|var| lookup(var).is_some_and(|v| !v.trim().is_empty()));
    if present {
        return Ok(());
    }
    Err(Img2TextError::MissingCredential {
        provider: provider_name.to_string(),
        var: vars.join(" or "),
    })
}

/// Resolve the LLM provider.
///
/// 1. **Pre-built provider** (`config.provider`) is used as-is.
/// 2. Otherwise the credential for `config.provider_name` is checked and
///    [`ProviderFactory::create_llm_provider`] builds the client, reading the
///    key from the same environment variable.
pub fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, Img2TextError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    check_credential(&config.provider_name, |k| std::env::var(k).ok())?;

    ProviderFactory::create_llm_provider(&config.provider_name, &config.model).map_err(|e| {
        Img2TextError::ProviderNotConfigured {
            provider: config.provider_name.clone(),
            hint: format!("{e}"),
        }
    })
}

/// Sends images to a vision model one at a time.
pub struct Extractor {
    provider: Arc<dyn LLMProvider>,
    config: ExtractionConfig,
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("provider", &"<dyn LLMProvider>")
            .field("config", &self.config)
            .finish()
    }
}

impl Extractor {
    /// Check credentials and build the provider.
    ///
    /// # Errors
    /// [`Img2TextError::MissingCredential`] when the provider's API key
    /// variable is unset or empty; [`Img2TextError::ProviderNotConfigured`]
    /// when the factory rejects the provider/model pair.
    pub fn new(config: ExtractionConfig) -> Result<Self, Img2TextError> {
        let provider = resolve_provider(&config)?;
        info!(
            "Using provider '{}' model '{}'",
            config.provider_name, config.model
        );
        Ok(Self { provider, config })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract text from one image path or URL.
    pub async fn extract(&self, input: &str) -> Result<ExtractionResult, ExtractionError> {
        self.extract_indexed(input, 1, 1).await
    }

    /// Extract text and write it to `output_path` (UTF-8, overwritten).
    ///
    /// The file is written to a sibling temp file and renamed into place so
    /// a failed write never leaves a truncated transcript behind.
    pub async fn extract_to_file(
        &self,
        input: &str,
        output_path: impl AsRef<Path>,
    ) -> Result<ExtractionResult, ExtractionError> {
        let result = self.extract(input).await?;
        write_text_file(output_path.as_ref(), &result.text).await?;
        info!("Text saved to {}", output_path.as_ref().display());
        Ok(result)
    }

    /// Extract every input in order, one request at a time.
    ///
    /// A failed image is reported through the progress callback and the
    /// returned vector; it never stops the rest of the batch.
    pub async fn extract_all<S: AsRef<str>>(
        &self,
        inputs: &[S],
    ) -> Vec<Result<ExtractionResult, ExtractionError>> {
        let total = inputs.len();
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_start(total);
        }

        let mut results = Vec::with_capacity(total);
        for (i, input) in inputs.iter().enumerate() {
            results.push(self.extract_indexed(input.as_ref(), i + 1, total).await);
        }

        let success = results.iter().filter(|r| r.is_ok()).count();
        info!("Batch complete: {}/{} images", success, total);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_complete(total, success);
        }
        results
    }

    /// Extract one image as item `index` of `total`, firing the per-image
    /// progress callbacks.
    ///
    /// Lets a caller drive its own batch loop and handle each result as it
    /// arrives; [`Extractor::extract_all`] is built on it.
    pub async fn extract_indexed(
        &self,
        input_str: &str,
        index: usize,
        total: usize,
    ) -> Result<ExtractionResult, ExtractionError> {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_image_start(index, total, input_str);
        }

        let result = self.run_pipeline(input_str).await;

        if let Some(ref cb) = self.config.progress_callback {
            match &result {
                Ok(r) => cb.on_image_complete(index, total, r.text.len()),
                Err(e) => cb.on_image_error(index, total, &e.to_string()),
            }
        }
        if let Err(ref e) = result {
            warn!("{}: {}", input_str, e);
        }
        result
    }

    async fn run_pipeline(&self, input_str: &str) -> Result<ExtractionResult, ExtractionError> {
        info!("Extracting text from: {}", input_str);

        // ── Step 1: Resolve input ────────────────────────────────────────
        let resolved = input::resolve_input(input_str, self.config.download_timeout_secs).await?;

        // ── Step 2: Validate, downscale, encode ──────────────────────────
        let pre_start = Instant::now();
        let options = PreprocessOptions {
            size_threshold_bytes: self.config.size_threshold_bytes,
            max_dimension: self.config.max_dimension,
        };
        let payload = preprocess_image_async(resolved.path(), options).await?;
        let preprocess_ms = pre_start.elapsed().as_millis() as u64;

        let mut stats = ImageStats {
            media_type: payload.media_type.clone(),
            original_bytes: payload.original_byte_len,
            payload_bytes: payload.byte_len as u64,
            width: payload.width,
            height: payload.height,
            resized: payload.resized,
            preprocess_ms,
            ..Default::default()
        };

        // ── Step 3: One request to the model ─────────────────────────────
        let reply = llm::request_extraction(
            &self.provider,
            input_str,
            payload.into_image_data(),
            &self.config,
        )
        .await?;

        stats.input_tokens = reply.input_tokens;
        stats.output_tokens = reply.output_tokens;
        stats.llm_ms = reply.duration_ms;

        Ok(ExtractionResult {
            source: input_str.to_string(),
            text: reply.text,
            model: self.config.model.clone(),
            stats,
        })
    }
}

/// Extract text from one image with a one-off [`Extractor`].
///
/// Setup failures (missing credential, unknown provider) come back as
/// [`ExtractionError::Setup`].
pub async fn extract(
    input: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, ExtractionError> {
    let extractor = Extractor::new(config.clone())?;
    extractor.extract(input.as_ref()).await
}

/// Extract text from one image and save it to `output_path`.
pub async fn extract_to_file(
    input: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, ExtractionError> {
    let extractor = Extractor::new(config.clone())?;
    extractor.extract_to_file(input.as_ref(), output_path).await
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, ExtractionError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractionError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input, config))
}

/// `<dir>/<stem>.txt` for an input path or URL.
pub fn output_path_for(input: &str, dir: &Path) -> PathBuf {
    let without_query = input.split(['?', '#']).next().unwrap_or(input);
    let stem = Path::new(without_query)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("image");
    dir.join(format!("{stem}.txt"))
}

/// Write `text` to `path`, creating parent directories, via temp file + rename.
pub async fn write_text_file(path: &Path, text: &str) -> Result<(), ExtractionError> {
    let write_err = |source| ExtractionError::OutputWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "output".into());
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, text).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    Ok(())
}
