//! Pipeline stages for image-to-table extraction.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable on its own and the network-bound stage stays isolated.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ llm ──▶ postprocess ──▶ Table::parse
//! (path/URL/  (decode,   (VLM)   (fences,
//!  stdin/uri)  base64)            whitespace)
//! ```
//!
//! 1. [`input`]  — read the path / URL / data URI / stdin and sniff the format
//! 2. [`encode`] — validate by decoding, downscale oversized images, wrap as
//!    base64 `ImageData`; runs in `spawn_blocking`
//! 3. [`llm`]    — drive the VLM call with timeout and retry/backoff; the
//!    only stage that talks to the model
//! 4. [`postprocess`] — deterministic clean-up of the reply into raw CSV

pub mod encode;
pub mod input;
pub mod llm;
pub mod postprocess;
