//! VLM interaction: send the image with the extraction prompt.
//!
//! The prompt lives in [`crate::prompts`] and reply clean-up in
//! [`crate::pipeline::postprocess`]; this module only owns the call, its
//! timeout and its retries.
//!
//! ## Retry Strategy
//!
//! Exponential backoff (`retry_backoff_ms * 2^(attempt-1)`): with 500 ms base
//! and 2 retries the wait sequence is 500 ms → 1 s. Every attempt is bounded
//! by `api_timeout_secs` so a hung connection counts as a failed attempt
//! instead of blocking the batch.

use crate::config::ExtractionConfig;
use crate::error::Img2TableError;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// The model's unprocessed reply and what it cost.
#[derive(Debug, Clone)]
pub struct ModelReply {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Retries spent before the successful attempt.
    pub retries: u32,
}

enum AttemptError {
    TimedOut,
    Failed(String),
}

/// Ask the model to transcribe the table in `image`.
///
/// ## Message Layout
///
/// A single user turn carrying the instruction text and the image
/// attachment. Gemini rejects image-only turns with an empty text part, so
/// the prompt rides in the user message rather than a system message.
pub async fn request_table(
    provider: &Arc<dyn LLMProvider>,
    source: &str,
    image: ImageData,
    config: &ExtractionConfig,
) -> Result<ModelReply, Img2TableError> {
    let messages = build_messages(config.effective_prompt(), image);
    let options = build_options(config);
    let call_timeout = Duration::from_secs(config.api_timeout_secs);

    let mut last_err: Option<AttemptError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, attempt);
            warn!(
                "{}: retry {}/{} after {}ms",
                source, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(call_timeout, provider.chat(&messages, Some(&options))).await {
            Ok(Ok(response)) => {
                debug!(
                    "{}: {} input tokens, {} output tokens",
                    source, response.prompt_tokens, response.completion_tokens
                );
                return Ok(ModelReply {
                    text: response.content,
                    input_tokens: response.prompt_tokens as u64,
                    output_tokens: response.completion_tokens as u64,
                    retries: attempt,
                });
            }
            Ok(Err(e)) => {
                let err_msg = format!("{}", e);
                warn!("{}: attempt {} failed — {}", source, attempt + 1, err_msg);
                last_err = Some(AttemptError::Failed(err_msg));
            }
            Err(_) => {
                warn!(
                    "{}: attempt {} timed out after {}s",
                    source,
                    attempt + 1,
                    config.api_timeout_secs
                );
                last_err = Some(AttemptError::TimedOut);
            }
        }
    }

    Err(match last_err {
        Some(AttemptError::TimedOut) => Img2TableError::ApiTimeout {
            source_name: source.to_string(),
            secs: config.api_timeout_secs,
        },
        Some(AttemptError::Failed(detail)) => Img2TableError::LlmFailed {
            source_name: source.to_string(),
            retries: config.max_retries,
            detail,
        },
        None => Img2TableError::LlmFailed {
            source_name: source.to_string(),
            retries: config.max_retries,
            detail: "Unknown error".to_string(),
        },
    })
}

/// Delay before retry number `attempt` (1-based), saturating instead of
/// overflowing for large attempt counts.
fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    base_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

/// One user message: instruction text plus the image.
fn build_messages(prompt: &str, image: ImageData) -> Vec<ChatMessage> {
    vec![ChatMessage::user_with_images(prompt, vec![image])]
}

/// Build `CompletionOptions` from the extraction config.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
