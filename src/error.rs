//! Error types for the edgequake-img2table library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Img2TableError`] — **Fatal**: the extraction cannot proceed at all
//!   (unreadable input, not an image, provider not configured, the model
//!   found no table). Returned as `Err(Img2TableError)` from the top-level
//!   `extract*` functions.
//!
//! * [`ImageFailure`] — **Non-fatal**: one image of a batch failed but the
//!   others are fine. Stored inside [`crate::output::ImageResult`] so callers
//!   can inspect partial success rather than losing the whole batch.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-img2table library.
#[derive(Debug, Error)]
pub enum Img2TableError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a usable path, URL, data URI or `-`.
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// Reading image bytes from stdin failed.
    #[error("Failed to read image from stdin: {source}")]
    StdinFailed {
        #[source]
        source: std::io::Error,
    },

    // ── Image errors ──────────────────────────────────────────────────────
    /// The bytes were read but are not a recognisable image.
    #[error("'{source_name}' is not an image (first bytes: {magic:?})")]
    NotAnImage { source_name: String, magic: Vec<u8> },

    /// The image format is recognised but vision models do not accept it.
    #[error("'{source_name}' is a {format} image; supported formats are PNG, JPEG and WebP")]
    UnsupportedImageFormat { source_name: String, format: String },

    /// The image exceeds the inline upload limit.
    #[error("'{source_name}' is {size} bytes, above the {limit}-byte limit")]
    ImageTooLarge {
        source_name: String,
        size: usize,
        limit: usize,
    },

    /// The image header was valid but decoding or re-encoding failed.
    #[error("Failed to decode image '{source_name}': {detail}")]
    ImageDecodeFailed { source_name: String, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model call failed after all retries.
    #[error("LLM call for '{source_name}' failed after {retries} retries: {detail}")]
    LlmFailed {
        source_name: String,
        retries: u32,
        detail: String,
    },

    /// A single model call exceeded the per-call timeout.
    #[error("LLM call for '{source_name}' timed out after {secs}s")]
    ApiTimeout { source_name: String, secs: u64 },

    /// The model replied, but reported that the image holds no table.
    #[error("No table found in '{source_name}'")]
    NoTableFound { source_name: String },

    /// Every image of a batch failed; output would be empty.
    #[error("All {total} images failed.\nFirst error: {first_error}")]
    AllImagesFailed { total: usize, first_error: String },

    /// Some images succeeded but at least one failed.
    ///
    /// Returned by [`crate::output::BatchOutput::into_result`] when the
    /// caller wants to treat any image failure as an error.
    #[error("{failed}/{total} images failed during extraction")]
    PartialFailure {
        succeeded: usize,
        failed: usize,
        total: usize,
    },

    // ── Session errors ────────────────────────────────────────────────────
    /// Copy was requested before any table was extracted.
    #[error("Nothing to copy: no table has been extracted yet")]
    NothingToCopy,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an export file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialisation of a view failed.
    #[error("Failed to serialise JSON view: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single image of a batch.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ImageFailure {
    /// The image could not be read, validated or encoded.
    #[error("Image {index} ({source_name}): {detail}")]
    InputFailed {
        index: usize,
        source_name: String,
        detail: String,
    },

    /// The model call failed or timed out after retries.
    #[error("Image {index} ({source_name}): LLM call failed: {detail}")]
    LlmFailed {
        index: usize,
        source_name: String,
        detail: String,
    },

    /// The model found no table in the image.
    #[error("Image {index} ({source_name}): no table found")]
    NoTable { index: usize, source_name: String },
}

impl ImageFailure {
    /// Classify a fatal single-image error as a batch item failure.
    pub fn from_error(index: usize, source_name: &str, err: &Img2TableError) -> Self {
        let source_name = source_name.to_string();
        match err {
            Img2TableError::NoTableFound { .. } => Self::NoTable { index, source_name },
            Img2TableError::LlmFailed { .. }
            | Img2TableError::ApiTimeout { .. }
            | Img2TableError::ProviderNotConfigured { .. } => Self::LlmFailed {
                index,
                source_name,
                detail: err.to_string(),
            },
            _ => Self::InputFailed {
                index,
                source_name,
                detail: err.to_string(),
            },
        }
    }

    /// Position of the failed image in the batch input list.
    pub fn index(&self) -> usize {
        match self {
            Self::InputFailed { index, .. }
            | Self::LlmFailed { index, .. }
            | Self::NoTable { index, .. } => *index,
        }
    }
}
