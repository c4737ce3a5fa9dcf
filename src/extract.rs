//! Eager extraction entry points.
//!
//! [`extract`] handles one image and fails fatally; [`extract_batch`] runs
//! many images concurrently and records per-image failures instead. Use
//! [`crate::stream::extract_stream`] to receive batch results as they finish.

use crate::config::{ExtractionConfig, DEFAULT_MODEL, DEFAULT_PROVIDER};
use crate::error::{Img2TableError, ImageFailure};
use crate::export::View;
use crate::output::{BatchOutput, BatchStats, Extraction, ExtractionStats, ImageResult};
use crate::pipeline::input::{
    self, InputKind, LoadedImage, BYTES_SOURCE, DATA_URI_SOURCE, STDIN_SOURCE,
};
use crate::pipeline::{encode, llm, postprocess};
use crate::table::Table;
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract the table from one image.
///
/// # Arguments
/// * `input` — file path, HTTP/HTTPS URL, `data:` URI, or `-` for stdin
/// * `config` — extraction configuration
///
/// # Errors
/// Returns `Err(Img2TableError)` when the image cannot be read or is not a
/// supported image, no provider is configured, the model call fails after
/// retries, or the model reports that the image holds no table.
pub async fn extract(
    input: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<Extraction, Img2TableError> {
    let provider = resolve_provider(config)?;
    extract_with_provider(&provider, input.as_ref(), config).await
}

/// Extract the table from image bytes already in memory.
///
/// # Example
/// ```rust,no_run
/// use edgequake_img2table::{extract_from_bytes, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("invoice.png")?;
/// let extraction = extract_from_bytes(bytes, &ExtractionConfig::default()).await?;
/// println!("{}", extraction.raw_csv);
/// # Ok(())
/// # }
/// ```
pub async fn extract_from_bytes(
    bytes: impl Into<Vec<u8>>,
    config: &ExtractionConfig,
) -> Result<Extraction, Img2TableError> {
    let start = Instant::now();
    let provider = resolve_provider(config)?;
    let image = input::load_bytes(BYTES_SOURCE, bytes.into(), config.max_image_bytes)?;
    extract_loaded(&provider, image, config, start).await
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<Extraction, Img2TableError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Img2TableError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input, config))
}

/// Extract a table and write the export of `view` to `output_path`.
///
/// When `output_path` is a directory the file is named after the image
/// (`invoice.png` → `invoice.csv`), or `data.<ext>` for stdin and data URIs.
/// Returns the path actually written.
pub async fn extract_to_file(
    input: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    view: View,
    config: &ExtractionConfig,
) -> Result<PathBuf, Img2TableError> {
    let extraction = extract(input, config).await?;
    write_export(&extraction, output_path.as_ref(), view).await
}

/// Write the export of `view` for one extraction.
pub async fn write_export(
    extraction: &Extraction,
    output_path: &Path,
    view: View,
) -> Result<PathBuf, Img2TableError> {
    write_export_as(extraction, output_path, view, &extraction.file_stem()).await
}

/// Write one export per successful image of a batch into `dir`.
///
/// Images sharing a file stem (`a/x.png` and `b/x.png`, or several stdin
/// and data-URI inputs) get `-2`, `-3`, … suffixes in input order so no
/// export overwrites another. Returns `(source, path)` pairs.
pub async fn write_batch_exports(
    output: &BatchOutput,
    dir: &Path,
    view: View,
) -> Result<Vec<(String, PathBuf)>, Img2TableError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| Img2TableError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source,
        })?;

    let mut used = HashSet::new();
    let mut written = Vec::new();
    for extraction in output.extractions() {
        let stem = unique_stem(extraction.file_stem(), &mut used);
        let path = write_export_as(extraction, dir, view, &stem).await?;
        written.push((extraction.source.clone(), path));
    }
    Ok(written)
}

async fn write_export_as(
    extraction: &Extraction,
    output_path: &Path,
    view: View,
    stem: &str,
) -> Result<PathBuf, Img2TableError> {
    let export = view.export(extraction, stem)?;
    let path = output_path.to_path_buf();
    tokio::task::spawn_blocking(move || export.write_to(path))
        .await
        .map_err(|e| Img2TableError::Internal(format!("Write task panicked: {}", e)))?
}

/// First of `stem`, `stem-2`, `stem-3`, … not yet in `used`.
fn unique_stem(stem: String, used: &mut HashSet<String>) -> String {
    if used.insert(stem.clone()) {
        return stem;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{stem}-{n}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Extract tables from many images concurrently.
///
/// Up to `config.concurrency` images are in flight at once. A failing image
/// is recorded in its [`ImageResult`] and does not stop the batch; results
/// come back in input order.
///
/// # Errors
/// Fatal only when no provider can be resolved, `inputs` is empty, or every
/// image failed.
pub async fn extract_batch<S: AsRef<str>>(
    inputs: &[S],
    config: &ExtractionConfig,
) -> Result<BatchOutput, Img2TableError> {
    let total_start = Instant::now();
    let total = inputs.len();
    if total == 0 {
        return Err(Img2TableError::InvalidInput {
            input: String::new(),
            reason: "no images given".to_string(),
        });
    }

    let provider = resolve_provider(config)?;
    info!("Starting batch extraction of {} images", total);

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let mut results: Vec<ImageResult> = stream::iter(inputs.iter().enumerate().map(|(index, input)| {
        let provider = Arc::clone(&provider);
        let input = input.as_ref().to_string();
        let config_clone = config.clone();
        async move {
            let label = source_label(&input);
            if let Some(ref cb) = config_clone.progress_callback {
                cb.on_image_start(index, total, &label);
            }

            let outcome = extract_with_provider(&provider, &input, &config_clone).await;

            match outcome {
                Ok(extraction) => {
                    if let Some(ref cb) = config_clone.progress_callback {
                        cb.on_image_complete(index, total, extraction.table.row_count());
                    }
                    ImageResult {
                        index,
                        source: extraction.source.clone(),
                        extraction: Some(extraction),
                        error: None,
                    }
                }
                Err(e) => {
                    warn!("{}: {}", label, e);
                    let failure = ImageFailure::from_error(index, &label, &e);
                    if let Some(ref cb) = config_clone.progress_callback {
                        cb.on_image_error(index, total, &failure.to_string());
                    }
                    ImageResult {
                        index,
                        source: label,
                        extraction: None,
                        error: Some(failure),
                    }
                }
            }
        }
    }))
    .buffer_unordered(config.concurrency.max(1))
    .collect()
    .await;

    results.sort_by_key(|r| r.index);

    let succeeded = results.iter().filter(|r| r.extraction.is_some()).count();
    let failed = total - succeeded;

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, succeeded);
    }

    if succeeded == 0 {
        let first_error = results
            .iter()
            .find_map(|r| r.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(Img2TableError::AllImagesFailed { total, first_error });
    }

    let stats = BatchStats {
        total,
        succeeded,
        failed,
        total_input_tokens: results
            .iter()
            .filter_map(|r| r.extraction.as_ref())
            .map(|e| e.stats.input_tokens)
            .sum(),
        total_output_tokens: results
            .iter()
            .filter_map(|r| r.extraction.as_ref())
            .map(|e| e.stats.output_tokens)
            .sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Batch complete: {}/{} images, {}ms total",
        succeeded, total, stats.total_duration_ms
    );

    Ok(BatchOutput { results, stats })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Resolve, load, and extract one input with an already-resolved provider.
pub(crate) async fn extract_with_provider(
    provider: &Arc<dyn LLMProvider>,
    input: &str,
    config: &ExtractionConfig,
) -> Result<Extraction, Img2TableError> {
    let start = Instant::now();
    info!("Extracting table from {}", source_label(input));
    let image = input::resolve_input(input, config).await?;
    extract_loaded(provider, image, config, start).await
}

/// Encode → VLM → clean → parse for an image already in memory.
async fn extract_loaded(
    provider: &Arc<dyn LLMProvider>,
    image: LoadedImage,
    config: &ExtractionConfig,
    start: Instant,
) -> Result<Extraction, Img2TableError> {
    let source = image.source.clone();

    let encoded = encode::encode_image(image, config.max_image_dimension).await?;
    let reply = llm::request_table(provider, &source, encoded.data, config).await?;

    let raw_csv = postprocess::clean_reply(&reply.text);
    if postprocess::is_no_table(&raw_csv) {
        return Err(Img2TableError::NoTableFound {
            source_name: source,
        });
    }

    let table = Table::parse(&raw_csv);
    if table.is_ragged() {
        warn!(
            "{}: rows have differing cell counts (width {})",
            source,
            table.width()
        );
    }
    debug!(
        "{}: {} rows x {} columns",
        source,
        table.row_count(),
        table.width()
    );

    Ok(Extraction {
        source,
        raw_csv,
        table,
        stats: ExtractionStats {
            input_tokens: reply.input_tokens,
            output_tokens: reply.output_tokens,
            duration_ms: start.elapsed().as_millis() as u64,
            retries: reply.retries,
            image_bytes: encoded.byte_len,
            downscaled: encoded.downscaled,
        },
    })
}

/// A short, log-safe label for an input (data URIs can be megabytes long).
pub(crate) fn source_label(input: &str) -> String {
    match input::classify(input) {
        InputKind::Stdin => STDIN_SOURCE.to_string(),
        InputKind::DataUri(_) => DATA_URI_SOURCE.to_string(),
        InputKind::Url(u) => u.to_string(),
        InputKind::Path(p) => p.to_string(),
    }
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Img2TableError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Img2TableError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model` or
///    [`DEFAULT_MODEL`]; the provider reads its own API key variable.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **Gemini key** — `GEMINI_API_KEY` present selects Gemini, the backend
///    the extraction prompt was written for.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub(crate) fn resolve_provider(
    config: &ExtractionConfig,
) -> Result<Arc<dyn LLMProvider>, Img2TableError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if !key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider(DEFAULT_PROVIDER, model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Img2TableError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY (or OPENAI_API_KEY, ANTHROPIC_API_KEY), or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_llm::MockProvider;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::time::Duration;

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 8, Rgb([255, 255, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn png_file(dir: &Path, name: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, png_bytes()).unwrap();
        path.to_string_lossy().into_owned()
    }

    /// A config backed by a mock provider that answers `replies` in order.
    async fn mock_config(replies: &[&str]) -> ExtractionConfig {
        let mock = Arc::new(MockProvider::new());
        for reply in replies {
            mock.add_response(*reply).await;
        }
        let provider: Arc<dyn LLMProvider> = mock;
        ExtractionConfig::builder()
            .provider(provider)
            .max_retries(0)
            .build()
            .unwrap()
    }

    fn batch_of(sources: &[&str]) -> BatchOutput {
        let results = sources
            .iter()
            .enumerate()
            .map(|(index, source)| ImageResult {
                index,
                source: source.to_string(),
                extraction: Some(Extraction::from_csv(*source, format!("Image\n{index}"))),
                error: None,
            })
            .collect();
        BatchOutput {
            results,
            stats: BatchStats {
                total: sources.len(),
                succeeded: sources.len(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn extract_cleans_and_parses_reply() {
        let dir = tempfile::tempdir().unwrap();
        let path = png_file(dir.path(), "prices.png");
        let config = mock_config(&["```csv\nItem,Price\nTea,2.50\n```"]).await;

        let e = extract(&path, &config).await.unwrap();

        assert_eq!(e.source, path);
        assert_eq!(e.raw_csv, "Item,Price\nTea,2.50");
        assert_eq!(e.table.row_count(), 2);
        assert_eq!(e.stats.retries, 0);
        assert!(e.stats.image_bytes > 0);
        assert!(!e.stats.downscaled);
    }

    #[tokio::test]
    async fn error_reply_is_no_table() {
        let config = mock_config(&["ERROR"]).await;
        let err = extract_from_bytes(png_bytes(), &config).await.unwrap_err();
        assert!(matches!(
            err,
            Img2TableError::NoTableFound { ref source_name } if source_name == BYTES_SOURCE
        ));
    }

    #[tokio::test]
    async fn batch_where_every_image_fails() {
        let config = mock_config(&[]).await;
        let inputs = ["/nonexistent/a.png", "/nonexistent/b.png"];
        let err = extract_batch(inputs.as_slice(), &config).await.unwrap_err();
        assert!(matches!(err, Img2TableError::AllImagesFailed { total: 2, .. }));
    }

    #[tokio::test]
    async fn batch_keeps_input_order_and_records_failures() {
        let dir = tempfile::tempdir().unwrap();
        let first = png_file(dir.path(), "first.png");
        let third = png_file(dir.path(), "third.png");
        let config = mock_config(&["A,B\n1,2", "A,B\n1,2"]).await;
        let inputs = vec![first.clone(), "/nonexistent/second.png".to_string(), third.clone()];

        let output = extract_batch(inputs.as_slice(), &config).await.unwrap();

        let indices: Vec<usize> = output.results.iter().map(|r| r.index).collect();
        assert_eq!(indices, [0, 1, 2]);
        assert_eq!(output.results[0].source, first);
        assert_eq!(output.results[2].source, third);
        assert!(matches!(
            output.results[1].error,
            Some(ImageFailure::InputFailed { index: 1, .. })
        ));
        assert_eq!(output.stats.succeeded, 2);
        assert_eq!(output.stats.failed, 1);
    }

    #[tokio::test]
    async fn batch_with_zero_concurrency_completes() {
        let mock: Arc<dyn LLMProvider> = Arc::new(MockProvider::new());
        let config = ExtractionConfig {
            provider: Some(mock),
            concurrency: 0,
            ..Default::default()
        };
        let inputs = ["/nonexistent/a.png"];

        let outcome = tokio::time::timeout(Duration::from_secs(10), extract_batch(inputs.as_slice(), &config))
            .await
            .expect("batch must not stall");
        assert!(matches!(
            outcome,
            Err(Img2TableError::AllImagesFailed { total: 1, .. })
        ));
    }

    #[tokio::test]
    async fn batch_exports_never_share_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = batch_of(&["a/x.png", "b/x.png", "stdin", "data-uri", "c/x-2.png"]);

        let written = write_batch_exports(&output, dir.path(), View::Csv)
            .await
            .unwrap();

        let names: Vec<String> = written
            .iter()
            .map(|(_, p)| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["x.csv", "x-2.csv", "data.csv", "data-2.csv", "x-2-2.csv"]);
        assert_eq!(written[1].0, "b/x.png");

        let second = std::fs::read_to_string(dir.path().join("x-2.csv")).unwrap();
        assert!(second.ends_with("Image\n1"));
    }

    #[test]
    fn unique_stem_suffixes_repeats() {
        let mut used = HashSet::new();
        assert_eq!(unique_stem("x".into(), &mut used), "x");
        assert_eq!(unique_stem("x".into(), &mut used), "x-2");
        assert_eq!(unique_stem("x".into(), &mut used), "x-3");
        assert_eq!(unique_stem("y".into(), &mut used), "y");
    }

    #[test]
    fn source_labels_hide_data_uris() {
        assert_eq!(source_label("-"), "stdin");
        assert_eq!(source_label("data:image/png;base64,AAAA"), "data-uri");
        assert_eq!(source_label("a/b.png"), "a/b.png");
        assert_eq!(source_label("https://x.io/t.png"), "https://x.io/t.png");
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let inputs: Vec<String> = Vec::new();
        let err = extract_batch(inputs.as_slice(), &ExtractionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Img2TableError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn write_export_names_file_after_source() {
        let dir = tempfile::tempdir().unwrap();
        let extraction = Extraction::from_csv("scans/invoice.png", "A,B\n1,2");
        let written = write_export(&extraction, dir.path(), View::Json)
            .await
            .unwrap();
        assert_eq!(written, dir.path().join("invoice.json"));
        let text = std::fs::read_to_string(written).unwrap();
        assert!(text.contains("\"A\": \"1\""));
    }

    #[tokio::test]
    async fn write_export_stdin_uses_default_stem() {
        let dir = tempfile::tempdir().unwrap();
        let extraction = Extraction::from_csv(STDIN_SOURCE, "A\n1");
        let written = write_export(&extraction, dir.path(), View::Table)
            .await
            .unwrap();
        assert_eq!(written, dir.path().join("data.csv"));
    }
}
