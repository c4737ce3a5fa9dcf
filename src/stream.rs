//! Streaming batch API: emit extractions as they complete.
//!
//! Unlike [`crate::extract::extract_batch`], which returns only after every
//! image finishes, [`extract_stream`] yields each result as soon as its model
//! call returns. Results arrive in completion order; use
//! [`ImageFailure::index`] or the input list to restore order if needed.

use crate::config::ExtractionConfig;
use crate::error::{Img2TableError, ImageFailure};
use crate::extract::{extract_with_provider, resolve_provider, source_label};
use crate::output::Extraction;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-image results.
pub type ExtractionStream =
    Pin<Box<dyn Stream<Item = Result<Extraction, ImageFailure>> + Send>>;

/// Extract tables from many images, streaming results as they are ready.
///
/// # Returns
/// - `Ok(ExtractionStream)` — a stream of `Result<Extraction, ImageFailure>`
/// - `Err(Img2TableError)` — fatal error (no provider configured)
///
/// # Example
/// ```rust,no_run
/// use edgequake_img2table::{extract_stream, ExtractionConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let inputs = vec!["q1.png".to_string(), "q2.png".to_string()];
/// let mut results = extract_stream(inputs, &ExtractionConfig::default())?;
/// while let Some(item) = results.next().await {
///     match item {
///         Ok(e) => println!("{}: {} rows", e.source, e.table.row_count()),
///         Err(e) => eprintln!("{e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn extract_stream(
    inputs: Vec<String>,
    config: &ExtractionConfig,
) -> Result<ExtractionStream, Img2TableError> {
    let provider = resolve_provider(config)?;
    info!("Starting streaming extraction of {} images", inputs.len());

    let concurrency = config.concurrency.max(1);
    let config_clone = config.clone();

    let s = stream::iter(inputs.into_iter().enumerate().map(move |(index, input)| {
        let provider = Arc::clone(&provider);
        let cfg = config_clone.clone();
        async move {
            extract_with_provider(&provider, &input, &cfg)
                .await
                .map_err(|e| ImageFailure::from_error(index, &source_label(&input), &e))
        }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(s))
}
