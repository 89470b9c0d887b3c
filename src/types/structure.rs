//! Structural no-cut zones.

use serde::{Deserialize, Serialize};

/// Label used for grid-detected and OCR-reported tables.
pub const TABLE_STRUCTURE: &str = "Table";

/// An inclusive atom range that should not be split across chunks.
///
/// Ranges come from the grid detector or from an external producer (for
/// example an OCR service's table spans). Both are treated identically.
///
/// Deserialization goes through [`StructuralRange::new`], so reversed bounds
/// from JSON are swapped. Helpers also tolerate reversed bounds built as
/// struct literals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawStructuralRange")]
pub struct StructuralRange {
    /// First covered atom (inclusive).
    pub start: usize,
    /// Last covered atom (inclusive).
    pub end: usize,
    /// Structure label, e.g. `"Table"`.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Wire form of [`StructuralRange`] before bound normalization.
#[derive(Deserialize)]
struct RawStructuralRange {
    start: usize,
    end: usize,
    #[serde(rename = "type")]
    kind: String,
}

impl From<RawStructuralRange> for StructuralRange {
    fn from(raw: RawStructuralRange) -> Self {
        Self::new(raw.start, raw.end, raw.kind)
    }
}

impl StructuralRange {
    /// Create a new range. Reversed bounds are swapped so `start <= end` holds.
    pub fn new(start: usize, end: usize, kind: impl Into<String>) -> Self {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        Self {
            start,
            end,
            kind: kind.into(),
        }
    }

    /// Shorthand for a `"Table"` range.
    pub fn table(start: usize, end: usize) -> Self {
        Self::new(start, end, TABLE_STRUCTURE)
    }

    /// Ordered `(low, high)` bounds.
    pub fn bounds(&self) -> (usize, usize) {
        (self.start.min(self.end), self.start.max(self.end))
    }

    /// Ordered bounds clamped to `[0, atom_count - 1]`, or `None` when there
    /// are no atoms.
    pub fn clamped(&self, atom_count: usize) -> Option<(usize, usize)> {
        let last = atom_count.checked_sub(1)?;
        let (low, high) = self.bounds();
        Some((low.min(last), high.min(last)))
    }

    /// Zero-based width (`end - start`), not the inclusive atom count.
    pub fn span(&self) -> usize {
        self.start.abs_diff(self.end)
    }

    /// Whether `position` lies within `[start, end]`.
    pub fn contains(&self, position: usize) -> bool {
        let (low, high) = self.bounds();
        low <= position && position <= high
    }

    /// Shift the range down by `offset`, saturating at zero.
    ///
    /// Used to move a range expressed in document ordinals into the position
    /// space of a manifest whose first atom has ordinal `offset`.
    pub fn rebased(&self, offset: usize) -> Self {
        Self {
            start: self.start.saturating_sub(offset),
            end: self.end.saturating_sub(offset),
            kind: self.kind.clone(),
        }
    }
}
