//! OCR layout adapter.
//!
//! Maps a document-intelligence style layout result (pages of words with
//! polygons and character spans, plus document-level tables described by
//! cell spans) into a [`GeometricManifest`].
//!
//! Words are numbered in document order, so atom ordinals equal manifest
//! positions. Tables are expressed as character spans over the document's
//! content string; a table becomes the atom range of the words whose span
//! lies entirely inside the table's overall span.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::diagnostics::{DiagnosticEvent, IntegrityObserver, TracingObserver};
use crate::manifest::GeometricManifest;
use crate::types::{BoundingBox, GeometricAtom, StructuralRange, TABLE_STRUCTURE};

/// Error type for layout parsing.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    /// The layout JSON is malformed.
    #[error("Invalid layout JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Character range in the document content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpan {
    /// Offset of the first character.
    pub offset: usize,
    /// Number of characters.
    pub length: usize,
}

impl TextSpan {
    /// Exclusive end offset.
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// A recognised word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutWord {
    /// Word text.
    pub content: String,
    /// Flat polygon `[x0, y0, x1, y1, ...]`, clockwise from top-left.
    #[serde(default)]
    pub polygon: Vec<f64>,
    /// Position in the document content.
    pub span: TextSpan,
}

/// A page of recognised words.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutPage {
    /// 1-based page number.
    pub page_number: u32,
    /// Words in reading order.
    #[serde(default)]
    pub words: Vec<LayoutWord>,
}

/// One table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutCell {
    /// Content spans of the cell.
    #[serde(default)]
    pub spans: Vec<TextSpan>,
}

/// A recognised table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutTable {
    /// Table cells.
    #[serde(default)]
    pub cells: Vec<LayoutCell>,
}

/// A full layout result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutDocument {
    /// Pages in order.
    #[serde(default)]
    pub pages: Vec<LayoutPage>,
    /// Tables anywhere in the document.
    #[serde(default)]
    pub tables: Vec<LayoutTable>,
}

impl LayoutDocument {
    /// Parse a layout from JSON.
    pub fn from_json(json: &str) -> Result<Self, LayoutError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Converts layout results to manifests.
pub struct LayoutAdapter {
    observer: Arc<dyn IntegrityObserver>,
}

impl Default for LayoutAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutAdapter {
    /// Create an adapter reporting through `tracing`.
    pub fn new() -> Self {
        Self::with_observer(Arc::new(TracingObserver))
    }

    /// Create an adapter with an explicit observer.
    pub fn with_observer(observer: Arc<dyn IntegrityObserver>) -> Self {
        Self { observer }
    }

    /// Map words to atoms and tables to structural ranges.
    pub fn to_manifest(&self, document: &LayoutDocument) -> GeometricManifest {
        let mut atoms = Vec::new();
        let mut spans = Vec::new();

        for page in &document.pages {
            for word in &page.words {
                let index = atoms.len();
                atoms.push(GeometricAtom::new(
                    word.content.clone(),
                    BoundingBox::from_polygon(&word.polygon),
                    page.page_number,
                    index,
                ));
                spans.push(word.span);
            }
        }

        let structures: Vec<StructuralRange> = document
            .tables
            .iter()
            .filter_map(|table| table_range(table, &spans))
            .collect();

        self.observer.observe(DiagnosticEvent::MappingComplete {
            pages: document.pages.len(),
            atoms: atoms.len(),
            structures: structures.len(),
        });

        GeometricManifest::new(atoms, structures)
    }
}

/// Atom range of the words fully inside the table's overall span.
fn table_range(table: &LayoutTable, word_spans: &[TextSpan]) -> Option<StructuralRange> {
    let cell_spans = table.cells.iter().flat_map(|c| &c.spans);
    let min = cell_spans.clone().map(|s| s.offset).min()?;
    let max = cell_spans.map(TextSpan::end).max()?;

    let mut enclosed = word_spans
        .iter()
        .enumerate()
        .filter(|(_, span)| span.offset >= min && span.end() <= max)
        .map(|(i, _)| i);

    let start = enclosed.next()?;
    let end = enclosed.last().unwrap_or(start);
    Some(StructuralRange::new(start, end, TABLE_STRUCTURE))
}
