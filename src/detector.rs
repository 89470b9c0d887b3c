//! Grid Law table detection.
//!
//! Finds tabular regions from token coordinates alone. No OCR semantics are
//! consulted, so detection works the same on any atom source.
//!
//! ## Algorithm
//!
//! 1. Group atoms into rows by Y rounded to one decimal (exact key match,
//!    not a tolerance band), ordered top to bottom (descending Y)
//! 2. Adjacent rows are aligned when both have the same column count, at
//!    least two distinct X positions, and every corresponding rounded X
//!    differs by no more than the alignment tolerance
//! 3. A maximal run of pairwise-aligned rows forms one block
//! 4. Each block becomes a range from the smallest to the largest atom
//!    ordinal among its atoms
//!
//! Ordinary paragraph text fails step 2 because word widths vary, so the X
//! starts of consecutive lines drift apart.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::diagnostics::{DiagnosticEvent, IntegrityObserver, TracingObserver};
use crate::types::{GeometricAtom, StructuralRange, TABLE_STRUCTURE};

/// Default column alignment tolerance in page units.
pub const DEFAULT_ALIGNMENT_TOLERANCE: f64 = 5.0;

/// Reading direction of the page.
///
/// Accepted for callers that know it; alignment is currently compared in
/// extraction order regardless of direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadingDirection {
    /// Left to right.
    #[default]
    Ltr,
    /// Right to left.
    Rtl,
}

/// Tunables for [`GridLawDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Maximum X drift between corresponding columns of adjacent rows.
    pub alignment_tolerance: f64,
    /// Minimum atoms per row for the row to count as a grid row.
    pub min_columns: usize,
    /// Reading direction hint.
    pub direction: ReadingDirection,
    /// Label attached to detected ranges.
    pub structure_type: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            alignment_tolerance: DEFAULT_ALIGNMENT_TOLERANCE,
            min_columns: 2,
            direction: ReadingDirection::Ltr,
            structure_type: TABLE_STRUCTURE.to_string(),
        }
    }
}

/// Geometry-only table detector.
#[derive(Clone)]
pub struct GridLawDetector {
    config: DetectorConfig,
    observer: Arc<dyn IntegrityObserver>,
}

impl std::fmt::Debug for GridLawDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridLawDetector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for GridLawDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl GridLawDetector {
    /// Create a detector reporting through `tracing`.
    pub fn new(config: DetectorConfig) -> Self {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    /// Create a detector with an explicit observer.
    pub fn with_observer(config: DetectorConfig, observer: Arc<dyn IntegrityObserver>) -> Self {
        Self { config, observer }
    }

    /// Get the configuration.
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect structural zones in one page's atoms.
    ///
    /// Returned ranges are expressed in atom ordinals (`GeometricAtom::index`).
    pub fn detect(&self, atoms: &[GeometricAtom]) -> Vec<StructuralRange> {
        let Some(first) = atoms.first() else {
            return Vec::new();
        };

        self.observer.observe(DiagnosticEvent::DiscoveryStarted {
            page: first.page,
            atom_count: atoms.len(),
            direction: self.config.direction,
        });

        let rows = group_rows(atoms);
        let mut zones = Vec::new();
        let mut block_start: Option<usize> = None;

        for i in 1..rows.len() {
            if self.rows_aligned(&rows[i - 1], &rows[i]) {
                block_start.get_or_insert(i - 1);
            } else if let Some(start) = block_start.take() {
                zones.extend(self.close_block(&rows[start..i]));
            }
        }

        // Trailing block at the bottom of the page
        if let Some(start) = block_start {
            zones.extend(self.close_block(&rows[start..]));
        }

        zones
    }

    /// Detect each contiguous same-page run independently.
    ///
    /// Structures never span pages; a table continuing onto the next page is
    /// reported as two ranges.
    pub fn detect_pages(&self, atoms: &[GeometricAtom]) -> Vec<StructuralRange> {
        atoms
            .chunk_by(|a, b| a.page == b.page)
            .flat_map(|page| self.detect(page))
            .collect()
    }

    fn rows_aligned(&self, upper: &[&GeometricAtom], lower: &[&GeometricAtom]) -> bool {
        let xs_upper = column_positions(upper);
        let xs_lower = column_positions(lower);

        if !self.is_grid_row(&xs_upper) || !self.is_grid_row(&xs_lower) {
            return false;
        }
        if xs_upper.len() != xs_lower.len() {
            return false;
        }

        xs_upper
            .iter()
            .zip(&xs_lower)
            .all(|(a, b)| (a - b).abs() <= self.config.alignment_tolerance)
    }

    fn is_grid_row(&self, xs: &[f64]) -> bool {
        xs.len() >= self.config.min_columns.max(2) && xs.iter().any(|x| *x != xs[0])
    }

    fn close_block(&self, rows: &[Vec<&GeometricAtom>]) -> Option<StructuralRange> {
        let indices = rows.iter().flatten().map(|a| a.index);
        let start = indices.clone().min()?;
        let end = indices.max()?;

        self.observer.observe(DiagnosticEvent::StructureDetected {
            kind: self.config.structure_type.clone(),
            start,
            end,
        });
        Some(StructuralRange::new(start, end, self.config.structure_type.clone()))
    }
}

/// Row key: Y rounded to one decimal, as an exact integer key.
fn row_key(y: f64) -> i64 {
    (y * 10.0).round_ties_even() as i64
}

/// Group atoms by row key, topmost (largest Y) first. Atoms keep their
/// input order within a row.
fn group_rows(atoms: &[GeometricAtom]) -> Vec<Vec<&GeometricAtom>> {
    let mut rows: BTreeMap<i64, Vec<&GeometricAtom>> = BTreeMap::new();
    for atom in atoms {
        rows.entry(row_key(atom.bounds.y)).or_default().push(atom);
    }
    rows.into_values().rev().collect()
}

fn column_positions(row: &[&GeometricAtom]) -> Vec<f64> {
    row.iter().map(|a| a.bounds.x.round_ties_even()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{NoOpObserver, RecordingObserver};
    use crate::types::BoundingBox;

    fn detector() -> GridLawDetector {
        GridLawDetector::with_observer(DetectorConfig::default(), Arc::new(NoOpObserver))
    }

    fn atom(index: usize, x: f64, y: f64) -> GeometricAtom {
        GeometricAtom::new("Data", BoundingBox::new(x, y, 20.0, 10.0), 1, index)
    }

    fn grid(rows: usize, columns: usize, start_x: f64) -> Vec<GeometricAtom> {
        let mut atoms = Vec::new();
        for r in 0..rows {
            for c in 0..columns {
                let index = atoms.len();
                atoms.push(atom(index, start_x + (c as f64) * 100.0, 500.0 - (r as f64) * 20.0));
            }
        }
        atoms
    }

    #[test]
    fn test_aligned_grid_is_one_table() {
        let zones = detector().detect(&grid(5, 2, 50.0));
        assert_eq!(zones, vec![StructuralRange::table(0, 9)]);
    }

    #[test]
    fn test_paragraph_is_not_a_table() {
        let atoms = vec![
            atom(0, 50.0, 100.0),
            atom(1, 65.0, 100.0),
            atom(2, 58.0, 90.0),
            atom(3, 80.0, 90.0),
        ];
        assert!(detector().detect(&atoms).is_empty());
    }

    #[test]
    fn test_jitter_within_tolerance() {
        let atoms = vec![
            atom(0, 50.0, 100.0),
            atom(1, 150.0, 100.0),
            atom(2, 52.0, 80.0),
            atom(3, 148.0, 80.0),
        ];
        assert_eq!(detector().detect(&atoms), vec![StructuralRange::table(0, 3)]);
    }

    #[test]
    fn test_single_column_is_never_a_table() {
        assert!(detector().detect(&grid(10, 1, 50.0)).is_empty());
    }

    #[test]
    fn test_single_row_yields_nothing() {
        assert!(detector().detect(&grid(1, 4, 50.0)).is_empty());
        assert!(detector().detect(&[]).is_empty());
    }

    #[test]
    fn test_column_count_mismatch() {
        let mut atoms = grid(1, 2, 50.0);
        atoms.extend([atom(2, 50.0, 480.0), atom(3, 150.0, 480.0), atom(4, 250.0, 480.0)]);
        assert!(detector().detect(&atoms).is_empty());
    }

    #[test]
    fn test_stacked_atoms_are_not_columns() {
        // Two atoms per row but both at the same X
        let atoms = vec![
            atom(0, 50.0, 100.0),
            atom(1, 50.0, 100.0),
            atom(2, 50.0, 80.0),
            atom(3, 50.0, 80.0),
        ];
        assert!(detector().detect(&atoms).is_empty());
    }

    #[test]
    fn test_rows_grouped_by_exact_rounded_y() {
        // 100.04 and 99.96 round to 100.0; 99.94 rounds to 99.9
        let atoms = vec![
            atom(0, 50.0, 100.04),
            atom(1, 150.0, 99.96),
            atom(2, 50.0, 99.94),
            atom(3, 150.0, 99.94),
        ];
        assert_eq!(detector().detect(&atoms), vec![StructuralRange::table(0, 3)]);
    }

    #[test]
    fn test_block_closed_by_misaligned_row() {
        let mut atoms = grid(3, 2, 50.0);
        // Paragraph line beneath the table, then another table
        atoms.push(atom(6, 10.0, 430.0));
        atoms.push(atom(7, 40.0, 430.0));
        atoms.push(atom(8, 77.0, 430.0));
        for (i, y) in [(9, 400.0), (11, 380.0)] {
            atoms.push(atom(i, 300.0, y));
            atoms.push(atom(i + 1, 400.0, y));
        }

        let zones = detector().detect(&atoms);
        assert_eq!(zones, vec![StructuralRange::table(0, 5), StructuralRange::table(9, 12)]);
    }

    #[test]
    fn test_range_uses_atom_ordinals() {
        let atoms: Vec<_> = grid(3, 2, 50.0)
            .into_iter()
            .map(|mut a| {
                a.index += 100;
                a
            })
            .collect();
        assert_eq!(detector().detect(&atoms), vec![StructuralRange::table(100, 105)]);
    }

    #[test]
    fn test_rows_ordered_top_to_bottom() {
        // Rows supplied bottom-up still form one block
        let mut atoms = grid(4, 2, 50.0);
        atoms.reverse();
        assert_eq!(detector().detect(&atoms), vec![StructuralRange::table(0, 7)]);
    }

    #[test]
    fn test_rtl_does_not_change_alignment() {
        let config = DetectorConfig {
            direction: ReadingDirection::Rtl,
            ..DetectorConfig::default()
        };
        let rtl = GridLawDetector::with_observer(config, Arc::new(NoOpObserver));
        assert_eq!(rtl.detect(&grid(5, 2, 50.0)), detector().detect(&grid(5, 2, 50.0)));
    }

    #[test]
    fn test_custom_tolerance() {
        let atoms = vec![
            atom(0, 50.0, 100.0),
            atom(1, 150.0, 100.0),
            atom(2, 54.0, 80.0),
            atom(3, 154.0, 80.0),
        ];
        let strict = GridLawDetector::with_observer(
            DetectorConfig {
                alignment_tolerance: 2.0,
                ..DetectorConfig::default()
            },
            Arc::new(NoOpObserver),
        );
        assert!(strict.detect(&atoms).is_empty());
        assert_eq!(detector().detect(&atoms).len(), 1);
    }

    #[test]
    fn test_detect_pages_isolates_pages() {
        let mut atoms = grid(2, 2, 50.0);
        for (offset, mut atom) in grid(2, 2, 50.0).into_iter().enumerate() {
            atom.page = 2;
            atom.index = 4 + offset;
            atoms.push(atom);
        }

        let zones = detector().detect_pages(&atoms);
        assert_eq!(zones, vec![StructuralRange::table(0, 3), StructuralRange::table(4, 7)]);
    }

    #[test]
    fn test_emits_diagnostics() {
        let observer = Arc::new(RecordingObserver::new());
        let detector = GridLawDetector::with_observer(DetectorConfig::default(), observer.clone());
        detector.detect(&grid(3, 2, 50.0));

        assert_eq!(observer.count(1), 1);
        assert_eq!(observer.count(2), 1);
    }
}
