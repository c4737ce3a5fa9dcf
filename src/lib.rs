//! # edgequake-img2table
//!
//! Extract tables from images using Vision Language Models (VLMs).
//!
//! ## Why this crate?
//!
//! Screenshots, scans, and photos of tables carry no text layer, and OCR
//! engines lose the grid: merged cells, wrapped headers, and right-aligned
//! numbers come out as a stream of words. This crate hands the image to a VLM
//! with a prompt that asks for bare CSV, then parses the reply into a
//! [`Table`] that can be shown as HTML, JSON records, Markdown, or CSV.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image (path / URL / data URI / stdin)
//!  │
//!  ├─ 1. Input        read bytes, sniff PNG / JPEG / WebP
//!  ├─ 2. Encode       validate, downscale oversized images, base64
//!  ├─ 3. VLM          gemini / gpt / claude, with timeout + retry
//!  ├─ 4. Postprocess  strip fences, normalise line endings
//!  ├─ 5. Parse        CSV → Table
//!  └─ 6. Views        table (HTML) / CSV / JSON / Markdown + export files
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_img2table::{extract, ExtractionConfig, View};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / ANTHROPIC_API_KEY
//!     let config = ExtractionConfig::default();
//!     let extraction = extract("receipt.png", &config).await?;
//!     println!("{}", View::Markdown.render(&extraction)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `img2table` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-img2table = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod render;
pub mod session;
pub mod stream;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, DEFAULT_MODEL, DEFAULT_PROVIDER};
pub use error::{Img2TableError, ImageFailure};
pub use export::{Export, View};
pub use extract::{
    extract, extract_batch, extract_from_bytes, extract_sync, extract_to_file,
    write_batch_exports, write_export,
};
pub use output::{BatchOutput, BatchStats, Extraction, ExtractionStats, ImageResult};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::Session;
pub use stream::{extract_stream, ExtractionStream};
pub use table::Table;
