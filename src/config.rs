//! Configuration types for image-to-table extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across concurrent batch workers and to log the
//! settings of a run.

use crate::error::Img2TableError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Model used when the caller names no model. Gemini Flash is the backend the
/// extraction prompt was tuned against.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Provider used when `GEMINI_API_KEY` is the only hint available.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Upper bound for `max_retries`; past this the backoff wait is measured in days.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Configuration for an image-to-table extraction.
///
/// # Example
/// ```rust
/// use edgequake_img2table::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("gemini-2.5-flash")
///     .concurrency(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// LLM model identifier. If None, [`DEFAULT_MODEL`] (or the provider
    /// default under full auto-detection).
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0.
    ///
    /// Transcription wants the model to copy, not to invent.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per image. Default: 8192.
    ///
    /// A dense spreadsheet screenshot easily produces several thousand tokens
    /// of CSV; a low cap truncates the last rows silently.
    pub max_tokens: usize,

    /// Maximum retry attempts on a failed model call. Default: 2.
    ///
    /// The builder caps this at [`MAX_RETRIES_LIMIT`].
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom instruction prompt. If None, uses
    /// [`crate::prompts::DEFAULT_EXTRACTION_PROMPT`].
    pub prompt: Option<String>,

    /// Number of images processed at once by the batch APIs. Default: 4.
    pub concurrency: usize,

    /// Longest edge, in pixels, sent to the model. Default: 3072.
    ///
    /// Larger images are downscaled (aspect ratio kept) and re-encoded as PNG.
    pub max_image_dimension: u32,

    /// Largest accepted input, in bytes. Default: 20 MiB, the usual inline
    /// image limit of vision APIs.
    pub max_image_bytes: usize,

    /// Download timeout for URL inputs in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Per-call LLM timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Batch progress events. None means no events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 8192,
            max_retries: 2,
            retry_backoff_ms: 500,
            prompt: None,
            concurrency: 4,
            max_image_dimension: 3072,
            max_image_bytes: 20 * 1024 * 1024,
            download_timeout_secs: 60,
            api_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("prompt", &self.prompt.as_ref().map(|p| p.len()))
            .field("concurrency", &self.concurrency)
            .field("max_image_dimension", &self.max_image_dimension)
            .field("max_image_bytes", &self.max_image_bytes)
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

    /// The instruction prompt in effect.
    pub fn effective_prompt(&self) -> &str {
        self.prompt
            .as_deref()
            .unwrap_or(crate::prompts::DEFAULT_EXTRACTION_PROMPT)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(MAX_RETRIES_LIMIT);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_image_dimension(mut self, px: u32) -> Self {
        self.config.max_image_dimension = px.max(256);
        self
    }

    pub fn max_image_bytes(mut self, bytes: usize) -> Self {
        self.config.max_image_bytes = bytes;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, Img2TableError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(Img2TableError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.max_image_bytes == 0 {
            return Err(Img2TableError::InvalidConfig(
                "max_image_bytes must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(Img2TableError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if matches!(c.prompt.as_deref(), Some(p) if p.trim().is_empty()) {
            return Err(Img2TableError::InvalidConfig(
                "prompt must not be blank".into(),
            ));
        }
        Ok(self.config)
    }
}
