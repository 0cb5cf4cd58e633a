//! VLM interaction: build the vision message and call the provider once.
//!
//! The request is a single user turn carrying the image attachment followed
//! by the extraction instruction. Prompt text lives in [`crate::prompts`];
//! this module only assembles and sends.
//!
//! One attempt per image, no retry. A failed call is reported to the caller,
//! which moves on to the next image.

use crate::config::ExtractionConfig;
use crate::error::ExtractionError;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Text and accounting returned by one successful call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
}

/// Ask the model to transcribe one image.
///
/// Returns [`ExtractionError::Request`] on any transport or API failure and
/// [`ExtractionError::EmptyResponse`] when the reply carries no text.
pub async fn request_extraction(
    provider: &Arc<dyn LLMProvider>,
    source_name: &str,
    image: ImageData,
    config: &ExtractionConfig,
) -> Result<ModelReply, ExtractionError> {
    let start = Instant::now();
    let messages = build_messages(image, config);
    let options = build_options(config);

    let response = provider
        .chat(&messages, Some(&options))
        .await
        .map_err(|e| {
            warn!("{}: LLM call failed — {}", source_name, e);
            ExtractionError::Request {
                message: e.to_string(),
            }
        })?;

    let duration = start.elapsed();
    debug!(
        "{}: {} input tokens, {} output tokens, {:?}",
        source_name, response.prompt_tokens, response.completion_tokens, duration
    );

    if response.content.trim().is_empty() {
        return Err(ExtractionError::EmptyResponse {
            source_name: source_name.to_string(),
        });
    }

    Ok(ModelReply {
        text: response.content,
        input_tokens: response.prompt_tokens as u64,
        output_tokens: response.completion_tokens as u64,
        duration_ms: duration.as_millis() as u64,
    })
}

/// One user message: image first, then the instruction.
fn build_messages(image: ImageData, config: &ExtractionConfig) -> Vec<ChatMessage> {
    vec![ChatMessage::user_with_images(
        config.prompt_text(),
        vec![image],
    )]
}

/// Build `CompletionOptions` from the extraction config.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: config.temperature,
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::PromptStyle;

    #[test]
    fn build_options_defaults() {
        let config = ExtractionConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, None);
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[test]
    fn build_options_forwards_overrides() {
        let config = ExtractionConfig::builder()
            .max_tokens(1000)
            .temperature(0.2)
            .build()
            .unwrap();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(1000));
    }

    #[test]
    fn single_user_message_with_image() {
        let config = ExtractionConfig::builder()
            .prompt_style(PromptStyle::Basic)
            .build()
            .unwrap();
        let image = ImageData::new("aGVsbG8=".to_string(), "image/jpeg");
        let messages = build_messages(image, &config);
        assert_eq!(messages.len(), 1);

        let msg = &messages[0];
        assert_eq!(msg.content, config.prompt_text());
        let images = msg.images.as_ref().expect("image attached");
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].mime_type, "image/jpeg");
        assert_eq!(images[0].data, "aGVsbG8=");
    }
}
