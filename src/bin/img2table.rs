//! CLI binary for edgequake-img2table.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints the chosen view.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_img2table::{
    extract, extract_batch, write_batch_exports, BatchOutput, ExtractionConfig,
    ExtractionProgressCallback, ProgressCallback, Session, View,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback for batches: a live bar plus one log line per
/// image. Images complete out of order, so timings are keyed by index.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} images  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting tables from {total} images…"))
        ));
    }

    fn on_image_start(&self, index: usize, _total: usize, source: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(source.to_string());
    }

    fn on_image_complete(&self, index: usize, total: usize, rows: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            index + 1,
            total,
            dim(&format!("{rows:>4} rows")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, index: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, succeeded: usize) {
        let failed = total.saturating_sub(succeeded);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} tables extracted",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} tables extracted  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Print the table as Markdown
  img2table receipt.png

  # HTML table view
  img2table --view table screenshot.webp

  # Download as CSV (UTF-8 BOM, opens cleanly in spreadsheets)
  img2table --view csv scan.jpg -o scan.csv

  # Several images into a directory (one <stem>.json per image)
  img2table --view json q1.png q2.png q3.png -o tables/

  # From a URL or stdin
  img2table https://example.com/chart.png
  cat photo.jpg | img2table -

  # Structured output with token stats
  img2table --json receipt.png > receipt.json

VIEWS:
  table   HTML <table> (export: .csv)
  csv     raw CSV as returned by the model (export: .csv)
  json    array of records keyed by the header row (export: .json)
  md      GitHub-flavoured Markdown table (export: .md)

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID

SETUP:
  1. Set API key:     export GEMINI_API_KEY=...
  2. Extract:         img2table table.png
"#;

/// Extract tables from images using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "img2table",
    version,
    about = "Extract tables from images using Vision LLMs",
    long_about = "Extract tables from screenshots, scans, and photos (PNG, JPEG, WebP) into \
HTML, CSV, JSON, or Markdown using Vision Language Models. Defaults to Google Gemini; also \
supports OpenAI, Anthropic, and any provider edgequake-llm knows.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image file paths, HTTP/HTTPS URLs, data: URIs, or `-` for stdin.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Write the view's export here (a directory when several inputs are given).
    #[arg(short, long, env = "IMG2TABLE_OUTPUT")]
    output: Option<PathBuf>,

    /// Output view: table (HTML), csv, json, md.
    #[arg(long, env = "IMG2TABLE_VIEW", default_value = "md")]
    view: View,

    /// LLM model ID (e.g. gemini-2.5-flash, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set \
          (GEMINI_API_KEY is preferred)."
    )]
    provider: Option<String>,

    /// Path to a text file replacing the built-in extraction prompt.
    #[arg(long, env = "IMG2TABLE_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Max LLM output tokens per image.
    #[arg(long, env = "IMG2TABLE_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "IMG2TABLE_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Retries per image on LLM failure (0–10).
    #[arg(long, env = "IMG2TABLE_MAX_RETRIES", default_value_t = 2,
          value_parser = clap::value_parser!(u32).range(0..=10))]
    max_retries: u32,

    /// Number of concurrent VLM calls for batches.
    #[arg(short, long, env = "IMG2TABLE_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Downscale images whose longer side exceeds this many pixels.
    #[arg(long, env = "IMG2TABLE_MAX_DIMENSION", default_value_t = 3072)]
    max_dimension: u32,

    /// Per-image LLM call timeout in seconds.
    #[arg(long, env = "IMG2TABLE_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "IMG2TABLE_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Output structured JSON (Extraction / BatchOutput) instead of a view.
    #[arg(long, env = "IMG2TABLE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "IMG2TABLE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "IMG2TABLE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "IMG2TABLE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let batch = cli.inputs.len() > 1;

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar only exists for batches; it replaces INFO logs.
    let show_progress = batch && !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    if batch {
        run_batch(&cli, &config).await
    } else {
        run_single(&cli, &config).await
    }
}

/// One image: extract into a session, then print or export its view.
async fn run_single(cli: &Cli, config: &ExtractionConfig) -> Result<()> {
    let input = &cli.inputs[0];
    let extraction = extract(input, config)
        .await
        .with_context(|| format!("Extraction failed for {input}"))?;

    if cli.json {
        let json =
            serde_json::to_string_pretty(&extraction).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    let mut session = Session::new();
    session.load(extraction);
    session.switch_view(cli.view);

    if let Some(ref output_path) = cli.output {
        let stem = session
            .extraction()
            .map(|e| e.file_stem())
            .context("No extraction loaded")?;
        let export = session
            .download_as(&stem)
            .context("No extraction loaded")?
            .context("Failed to build export")?;
        let written = export
            .write_to(output_path)
            .context("Failed to write output")?;
        if !cli.quiet {
            print_summary(&session, &written);
        }
    } else {
        let text = session
            .rendered()
            .context("No extraction loaded")?
            .context("Failed to render view")?;
        write_stdout(&text)?;
        if !cli.quiet {
            if let Some(e) = session.extraction() {
                eprintln!(
                    "{}",
                    dim(&format!(
                        "{} rows  ·  {} tokens in / {} out  ·  {}ms",
                        e.table.row_count(),
                        e.stats.input_tokens,
                        e.stats.output_tokens,
                        e.stats.duration_ms
                    ))
                );
            }
        }
    }

    Ok(())
}

/// Many images: extract concurrently, then print or export each success.
async fn run_batch(cli: &Cli, config: &ExtractionConfig) -> Result<()> {
    let output = extract_batch(cli.inputs.as_slice(), config)
        .await
        .context("Batch extraction failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if let Some(ref dir) = cli.output {
        let written = write_batch_exports(&output, dir, cli.view)
            .await
            .with_context(|| format!("Failed to write exports to {}", dir.display()))?;
        if !cli.quiet {
            for (source, path) in &written {
                eprintln!("  {}  →  {}", source, bold(&path.display().to_string()));
            }
        }
    } else {
        for extraction in output.extractions() {
            let text = cli
                .view
                .render(extraction)
                .with_context(|| format!("Failed to render {}", extraction.source))?;
            write_stdout(&format!("==> {} <==\n", extraction.source))?;
            write_stdout(&text)?;
            write_stdout("\n")?;
        }
    }

    if !cli.quiet {
        print_batch_stats(&output);
    }
    Ok(())
}

fn print_summary(session: &Session, written: &Path) {
    if let Some(e) = session.extraction() {
        eprintln!(
            "{}  {} rows  {}ms  →  {}",
            green("✔"),
            e.table.row_count(),
            e.stats.duration_ms,
            bold(&written.display().to_string()),
        );
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&e.stats.input_tokens.to_string()),
            dim(&e.stats.output_tokens.to_string()),
        );
    }
}

fn print_batch_stats(output: &BatchOutput) {
    eprintln!(
        "   {} tokens in  /  {} tokens out  —  {}ms total",
        dim(&output.stats.total_input_tokens.to_string()),
        dim(&output.stats.total_output_tokens.to_string()),
        output.stats.total_duration_ms,
    );
    for failure in output.results.iter().filter_map(|r| r.error.as_ref()) {
        eprintln!("   {} {}", red("✗"), failure);
    }
}

/// Write to stdout, ensuring a trailing newline.
fn write_stdout(text: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .concurrency(cli.concurrency)
        .max_image_dimension(cli.max_dimension)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
