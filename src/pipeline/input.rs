//! Input resolution: turn a user-supplied image reference into bytes.
//!
//! Four kinds of input are accepted:
//!
//! | Input                        | Source                                  |
//! |------------------------------|-----------------------------------------|
//! | `-`                          | all of stdin (`… | img2table -`)         |
//! | `data:image/png;base64,…`    | a data URI, as a browser `FileReader` or |
//! |                              | clipboard tool produces                 |
//! | `http://…` / `https://…`     | downloaded with `reqwest`               |
//! | anything else                | a local file path                       |
//!
//! Whatever the source, the bytes are sniffed by magic number before they are
//! returned so callers get "not an image" rather than an opaque API error.

use crate::config::ExtractionConfig;
use crate::error::Img2TableError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

/// Source label used for stdin input.
pub const STDIN_SOURCE: &str = "stdin";
/// Source label used for data-URI input.
pub const DATA_URI_SOURCE: &str = "data-uri";
/// Source label used for images handed over as raw bytes.
pub const BYTES_SOURCE: &str = "bytes";

/// Image bytes plus what we know about them.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// Human-readable origin (path, URL, `stdin`, `data-uri`, …).
    pub source: String,
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl LoadedImage {
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}

/// What kind of input a string refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind<'a> {
    Stdin,
    DataUri(&'a str),
    Url(&'a str),
    Path(&'a str),
}

/// Classify an input string without touching the file system or network.
pub fn classify(input: &str) -> InputKind<'_> {
    let trimmed = input.trim();
    if trimmed == "-" {
        InputKind::Stdin
    } else if trimmed.starts_with("data:") {
        InputKind::DataUri(trimmed)
    } else if is_url(trimmed) {
        InputKind::Url(trimmed)
    } else {
        InputKind::Path(input)
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to validated image bytes.
pub async fn resolve_input(
    input: &str,
    config: &ExtractionConfig,
) -> Result<LoadedImage, Img2TableError> {
    let (source, bytes) = match classify(input) {
        InputKind::Stdin => (STDIN_SOURCE.to_string(), read_stdin().await?),
        InputKind::DataUri(uri) => (DATA_URI_SOURCE.to_string(), decode_data_uri(uri)?),
        InputKind::Url(url) => (
            url.to_string(),
            download_url(url, config.download_timeout_secs).await?,
        ),
        InputKind::Path(path) => (path.to_string(), read_local(Path::new(path)).await?),
    };
    load_bytes(source, bytes, config.max_image_bytes)
}

/// Validate in-memory bytes as a supported image.
pub fn load_bytes(
    source: impl Into<String>,
    bytes: Vec<u8>,
    max_bytes: usize,
) -> Result<LoadedImage, Img2TableError> {
    let source = source.into();

    if bytes.len() > max_bytes {
        return Err(Img2TableError::ImageTooLarge {
            source_name: source,
            size: bytes.len(),
            limit: max_bytes,
        });
    }

    let format = sniff_format(&source, &bytes)?;
    debug!("Loaded {} ({:?}, {} bytes)", source, format, bytes.len());
    Ok(LoadedImage {
        source,
        bytes,
        format,
    })
}

/// Identify the image format from magic bytes; only formats vision APIs
/// accept inline are let through.
fn sniff_format(source: &str, bytes: &[u8]) -> Result<ImageFormat, Img2TableError> {
    let format = image::guess_format(bytes).map_err(|_| Img2TableError::NotAnImage {
        source_name: source.to_string(),
        magic: bytes.iter().take(8).copied().collect(),
    })?;

    match format {
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP => Ok(format),
        other => Err(Img2TableError::UnsupportedImageFormat {
            source_name: source.to_string(),
            format: format!("{other:?}"),
        }),
    }
}

async fn read_stdin() -> Result<Vec<u8>, Img2TableError> {
    let mut buf = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut buf)
        .await
        .map_err(|source| Img2TableError::StdinFailed { source })?;
    if buf.is_empty() {
        return Err(Img2TableError::InvalidInput {
            input: "-".to_string(),
            reason: "stdin was empty".to_string(),
        });
    }
    Ok(buf)
}

/// Decode a `data:<mime>;base64,<payload>` URI.
///
/// The declared MIME type is not trusted; the payload is sniffed later like
/// any other input.
fn decode_data_uri(uri: &str) -> Result<Vec<u8>, Img2TableError> {
    let invalid = |reason: &str| Img2TableError::InvalidInput {
        input: truncate(uri, 48),
        reason: reason.to_string(),
    };

    let rest = uri.strip_prefix("data:").ok_or_else(|| invalid("not a data URI"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| invalid("data URI has no ',' separator"))?;
    if !meta.ends_with(";base64") {
        return Err(invalid("only base64 data URIs are supported"));
    }

    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| invalid(&format!("invalid base64 payload: {e}")))
}

/// Read a local file, mapping I/O errors to actionable variants.
async fn read_local(path: &Path) -> Result<Vec<u8>, Img2TableError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            debug!("Read local image: {}", path.display());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(Img2TableError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Img2TableError::FileNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(Img2TableError::InvalidInput {
            input: path.display().to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, Img2TableError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Img2TableError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Img2TableError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Img2TableError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Img2TableError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Img2TableError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

/// A file stem for exports derived from an input's source label.
///
/// Paths and URLs give their file stem; stdin, data URIs, raw bytes and
/// anything without a usable name fall back to `fallback`.
pub fn file_stem(source: &str, fallback: &str) -> String {
    let name = if is_url(source) {
        reqwest::Url::parse(source)
            .ok()
            .and_then(|u| {
                u.path_segments()
                    .and_then(|mut s| s.next_back().map(str::to_string))
            })
            .map(PathBuf::from)
    } else if [STDIN_SOURCE, DATA_URI_SOURCE, BYTES_SOURCE].contains(&source) {
        None
    } else {
        Some(PathBuf::from(source))
    };

    name.as_deref()
        .and_then(Path::file_stem)
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
