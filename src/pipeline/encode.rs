//! Image encoding: validated bytes → base64 `ImageData` for the VLM request.
//!
//! Images within `max_image_dimension` are forwarded byte-for-byte with their
//! own MIME type; re-encoding a JPEG photo as PNG would only inflate it.
//! Oversized images are downscaled and re-encoded as PNG, which is lossless
//! and keeps small print readable.
//!
//! `detail: "high"` asks OpenAI-style tiling to use the full tile budget;
//! without it dense tables are read from a single low-resolution overview.

use crate::error::Img2TableError;
use crate::pipeline::input::LoadedImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::{debug, info};

/// An image ready to attach to a model request.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub data: ImageData,
    /// Size of the bytes that were base64-encoded.
    pub byte_len: usize,
    pub downscaled: bool,
}

/// Decode, optionally downscale, and base64-encode an image.
///
/// Decoding runs on the blocking pool: a large JPEG takes long enough to
/// stall a Tokio worker.
pub async fn encode_image(
    image: LoadedImage,
    max_dimension: u32,
) -> Result<EncodedImage, Img2TableError> {
    tokio::task::spawn_blocking(move || encode_image_blocking(&image, max_dimension))
        .await
        .map_err(|e| Img2TableError::Internal(format!("Encode task panicked: {}", e)))?
}

fn encode_image_blocking(
    image: &LoadedImage,
    max_dimension: u32,
) -> Result<EncodedImage, Img2TableError> {
    let decoded = image::load_from_memory_with_format(&image.bytes, image.format).map_err(|e| {
        Img2TableError::ImageDecodeFailed {
            source_name: image.source.clone(),
            detail: e.to_string(),
        }
    })?;

    let (width, height) = (decoded.width(), decoded.height());
    if width.max(height) <= max_dimension {
        let b64 = STANDARD.encode(&image.bytes);
        debug!(
            "{}: {}x{} px forwarded as-is → {} bytes base64",
            image.source,
            width,
            height,
            b64.len()
        );
        return Ok(EncodedImage {
            data: ImageData::new(b64, image.mime_type()).with_detail("high"),
            byte_len: image.bytes.len(),
            downscaled: false,
        });
    }

    let resized = downscale(&decoded, max_dimension);
    info!(
        "{}: downscaled {}x{} → {}x{} px",
        image.source,
        width,
        height,
        resized.width(),
        resized.height()
    );

    let png = encode_png(&resized).map_err(|e| Img2TableError::ImageDecodeFailed {
        source_name: image.source.clone(),
        detail: format!("PNG re-encode failed: {e}"),
    })?;
    let byte_len = png.len();

    Ok(EncodedImage {
        data: ImageData::new(STANDARD.encode(&png), ImageFormat::Png.to_mime_type())
            .with_detail("high"),
        byte_len,
        downscaled: true,
    })
}

/// Shrink so the longest edge equals `max_dimension`, keeping aspect ratio.
fn downscale(img: &DynamicImage, max_dimension: u32) -> DynamicImage {
    img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}
