//! The last extraction and the view it is shown in.
//!
//! A [`Session`] is the whole of the application's mutable state: the most
//! recent model response and which [`View`] is active. Loading a new
//! extraction replaces the previous one; nothing is persisted.

use crate::error::Img2TableError;
use crate::export::{Export, View, DEFAULT_FILE_STEM};
use crate::output::Extraction;

#[derive(Debug, Default)]
pub struct Session {
    last: Option<Extraction>,
    view: View,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the last extraction. The active view is left unchanged.
    pub fn load(&mut self, extraction: Extraction) {
        self.last = Some(extraction);
    }

    pub fn switch_view(&mut self, view: View) {
        self.view = view;
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn extraction(&self) -> Option<&Extraction> {
        self.last.as_ref()
    }

    /// Rendered text of the active view, or `None` before the first load.
    pub fn rendered(&self) -> Option<Result<String, Img2TableError>> {
        self.last.as_ref().map(|e| self.view.render(e))
    }

    /// Text to copy for the active view.
    pub fn copy_text(&self) -> Result<String, Img2TableError> {
        let extraction = self.last.as_ref().ok_or(Img2TableError::NothingToCopy)?;
        self.view.clipboard_text(extraction)
    }

    /// Downloadable file for the active view, or `None` before the first load.
    pub fn download(&self) -> Option<Result<Export, Img2TableError>> {
        self.download_as(DEFAULT_FILE_STEM)
    }

    /// Like [`Session::download`] with a caller-chosen file stem.
    pub fn download_as(&self, stem: &str) -> Option<Result<Export, Img2TableError>> {
        self.last.as_ref().map(|e| self.view.export(e, stem))
    }
}
