//! Progress-callback trait for batch extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as [`crate::extract::extract_batch`] works through its images.
//!
//! # Example
//!
//! ```rust
//! use edgequake_img2table::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct RowCounter {
//!     rows: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for RowCounter {
//!     fn on_image_complete(&self, _index: usize, _total: usize, rows: usize) {
//!         self.rows.fetch_add(rows, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(RowCounter { rows: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch pipeline as it processes each image.
///
/// Images run concurrently, so `on_image_*` may be called from different
/// tasks at once; protect shared state with atomics or a `Mutex`. Indices are
/// 0-based positions in the input list.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before any image is processed.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before an image is loaded.
    fn on_image_start(&self, index: usize, total: usize, source: &str) {
        let _ = (index, total, source);
    }

    /// Called when an image produced a table.
    ///
    /// `rows` counts table rows, header included.
    fn on_image_complete(&self, index: usize, total: usize, rows: usize) {
        let _ = (index, total, rows);
    }

    /// Called when an image failed.
    fn on_image_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every image has been attempted.
    fn on_batch_complete(&self, total: usize, succeeded: usize) {
        let _ = (total, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
#[derive(Debug, Default)]
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
