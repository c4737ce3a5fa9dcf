//! Views of an [`Extraction`] and their copy / download forms.
//!
//! A [`View`] is what the user is looking at. Rendering, copying and
//! downloading all dispatch on it:
//!
//! | View     | render        | copy     | download                      |
//! |----------|---------------|----------|-------------------------------|
//! | Table    | HTML `<table>`| raw CSV  | `data.csv` (UTF-8 BOM)        |
//! | Csv      | raw CSV       | raw CSV  | `data.csv` (UTF-8 BOM)        |
//! | Json     | JSON records  | JSON     | `data.json`                   |
//! | Markdown | GFM table     | Markdown | `data.md`                     |
//!
//! The BOM on CSV downloads makes spreadsheet tools read the file as UTF-8
//! instead of the system code page.

use crate::error::Img2TableError;
use crate::output::Extraction;
use crate::render;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// File stem used when the caller has no better name.
pub const DEFAULT_FILE_STEM: &str = "data";

/// UTF-8 byte-order mark prepended to CSV downloads.
pub const UTF8_BOM: &str = "\u{FEFF}";

/// The active presentation of an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    /// HTML table (default).
    #[default]
    Table,
    Csv,
    Json,
    Markdown,
}

impl View {
    /// Text shown for this view.
    pub fn render(self, extraction: &Extraction) -> Result<String, Img2TableError> {
        match self {
            View::Table => Ok(render::to_html(&extraction.table)),
            View::Csv => Ok(extraction.raw_csv.clone()),
            View::Json => render::to_json(&extraction.table),
            View::Markdown => Ok(render::to_markdown(&extraction.table)),
        }
    }

    /// Text placed on the clipboard for this view.
    ///
    /// The table view copies the CSV source, not its HTML.
    pub fn clipboard_text(self, extraction: &Extraction) -> Result<String, Img2TableError> {
        match self {
            View::Table | View::Csv => Ok(extraction.raw_csv.clone()),
            View::Json | View::Markdown => self.render(extraction),
        }
    }

    /// File extension of the downloaded file.
    pub fn extension(self) -> &'static str {
        match self {
            View::Table | View::Csv => "csv",
            View::Json => "json",
            View::Markdown => "md",
        }
    }

    /// MIME type of the downloaded file.
    pub fn mime_type(self) -> &'static str {
        match self {
            View::Table | View::Csv => "text/csv",
            View::Json => "application/json",
            View::Markdown => "text/markdown",
        }
    }

    /// Downloadable file for this view, named `<stem>.<ext>`.
    pub fn export(self, extraction: &Extraction, stem: &str) -> Result<Export, Img2TableError> {
        let body = match self {
            View::Table | View::Csv => format!("{UTF8_BOM}{}", extraction.raw_csv),
            View::Json | View::Markdown => self.render(extraction)?,
        };
        Ok(Export {
            file_name: format!("{stem}.{}", self.extension()),
            mime_type: self.mime_type(),
            contents: body.into_bytes(),
        })
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            View::Table => "table",
            View::Csv => "csv",
            View::Json => "json",
            View::Markdown => "md",
        };
        f.write_str(s)
    }
}

impl FromStr for View {
    type Err = Img2TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "table" | "html" => Ok(View::Table),
            "csv" => Ok(View::Csv),
            "json" => Ok(View::Json),
            "md" | "markdown" => Ok(View::Markdown),
            other => Err(Img2TableError::InvalidConfig(format!(
                "unknown view '{other}' (expected table, csv, json or md)"
            ))),
        }
    }
}

/// A file ready to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub file_name: String,
    pub mime_type: &'static str,
    pub contents: Vec<u8>,
}

impl Export {
    /// Write the contents to `path` atomically.
    ///
    /// If `path` is an existing directory the export's own file name is used
    /// inside it. The data goes to a temp file in the same directory first
    /// and is renamed into place, so readers never see a partial file.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<PathBuf, Img2TableError> {
        let path = path.as_ref();
        let target = if path.is_dir() {
            path.join(&self.file_name)
        } else {
            path.to_path_buf()
        };
        let write_err = |source| Img2TableError::OutputWriteFailed {
            path: target.clone(),
            source,
        };

        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(write_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
        tmp.write_all(&self.contents).map_err(write_err)?;
        tmp.persist(&target).map_err(|e| write_err(e.error))?;

        debug!("Wrote {} bytes to {}", self.contents.len(), target.display());
        Ok(target)
    }
}
