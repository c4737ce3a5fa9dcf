//! Result types returned by the extraction entry points.

use crate::error::{Img2TableError, ImageFailure};
use crate::export::DEFAULT_FILE_STEM;
use crate::pipeline::input;
use crate::table::Table;
use serde::{Deserialize, Serialize};

/// One extracted table: the cleaned model reply and its parsed form.
///
/// `raw_csv` is kept alongside `table` because the CSV view, copy and
/// download all hand out the reply text itself, not a re-serialisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    /// Where the image came from (path, URL, `stdin`, `data-uri`, `bytes`).
    pub source: String,
    /// Model reply after fence stripping and whitespace clean-up.
    pub raw_csv: String,
    /// Parsed rows; the first row is the header.
    pub table: Table,
    pub stats: ExtractionStats,
}

impl Extraction {
    /// Build an extraction from already-cleaned CSV text.
    pub fn from_csv(source: impl Into<String>, raw_csv: impl Into<String>) -> Self {
        let raw_csv = raw_csv.into();
        let table = Table::parse(&raw_csv);
        Self {
            source: source.into(),
            raw_csv,
            table,
            stats: ExtractionStats::default(),
        }
    }

    /// File stem for exports of this extraction: the image's own stem, or
    /// `data` for stdin, data URIs and raw bytes.
    pub fn file_stem(&self) -> String {
        input::file_stem(&self.source, DEFAULT_FILE_STEM)
    }
}

/// Cost and timing of a single extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Wall-clock time from loading the image to the parsed table.
    pub duration_ms: u64,
    /// Retries spent on the model call (0 when the first attempt succeeded).
    pub retries: u32,
    /// Bytes actually sent to the model after any downscaling.
    pub image_bytes: usize,
    /// Whether the image was downscaled before sending.
    pub downscaled: bool,
}

/// Outcome for one image of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResult {
    /// 0-based position in the input list.
    pub index: usize,
    pub source: String,
    pub extraction: Option<Extraction>,
    pub error: Option<ImageFailure>,
}

/// Aggregated output of [`crate::extract::extract_batch`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    /// Results in input order.
    pub results: Vec<ImageResult>,
    pub stats: BatchStats,
}

impl BatchOutput {
    /// Successful extractions in input order.
    pub fn extractions(&self) -> impl Iterator<Item = &Extraction> {
        self.results.iter().filter_map(|r| r.extraction.as_ref())
    }

    /// Treat any failed image as an error.
    pub fn into_result(self) -> Result<Self, Img2TableError> {
        if self.stats.failed > 0 {
            return Err(Img2TableError::PartialFailure {
                succeeded: self.stats.succeeded,
                failed: self.stats.failed,
                total: self.stats.total,
            });
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
}
