//! Golden tests for the integrity pipe and grid detector.
//!
//! These tests pin exact chunk boundaries for small hand-built documents.

use std::sync::Arc;
use aegis_integrity::{
    BoundaryReason, BoundingBox, ChunkingPolicy, GeometricAtom, GeometricChunk,
    GeometricManifest, GridLawDetector, IntegrityPipe, NoOpObserver, StructuralRange,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// One-token atom at an arbitrary position.
fn word(index: usize) -> GeometricAtom {
    GeometricAtom::new("word", BoundingBox::default(), 1, index)
}

fn placed(text: &str, x: f64, y: f64, index: usize) -> GeometricAtom {
    GeometricAtom::new(text, BoundingBox::new(x, y, 20.0, 10.0), 1, index)
}

fn run(atoms: Vec<GeometricAtom>, structures: Vec<StructuralRange>, policy: ChunkingPolicy) -> Vec<GeometricChunk> {
    let pipe = IntegrityPipe::with_observer(GeometricManifest::new(atoms, structures), Arc::new(NoOpObserver));
    pipe.generate(&policy).unwrap().collect()
}

fn bounds(chunks: &[GeometricChunk]) -> Vec<(usize, usize)> {
    chunks.iter().map(|c| (c.start_index, c.end_index)).collect()
}

/// Two preamble atoms followed by an eight-atom table at positions 2-9.
fn preamble_and_table(first_ordinal: usize) -> (Vec<GeometricAtom>, Vec<StructuralRange>) {
    let atoms = (0..10).map(|i| word(first_ordinal + i)).collect();
    (atoms, vec![StructuralRange::table(2, 9)])
}

// ─────────────────────────────────────────────────────────────────────────────
// Detector
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_five_by_two_grid_is_one_table() {
    let atoms: Vec<_> = (0..10)
        .map(|i| placed("cell", 50.0 + (i % 2) as f64 * 150.0, 600.0 - (i / 2) as f64 * 20.0, i))
        .collect();

    let zones = GridLawDetector::default().detect(&atoms);
    assert_eq!(zones, vec![StructuralRange::table(0, 9)]);
}

#[test]
fn test_drifting_paragraph_has_no_table() {
    let atoms: Vec<_> = (0..4)
        .map(|i| placed("prose", 50.0 + i as f64 * 12.0, 600.0 - i as f64 * 14.0, i))
        .collect();

    assert!(GridLawDetector::default().detect(&atoms).is_empty());
}

#[test]
fn test_jitter_within_tolerance_still_merges() {
    let atoms = vec![
        placed("a", 50.0, 400.0, 0),
        placed("b", 202.0, 400.0, 1),
        placed("c", 52.0, 380.0, 2),
        placed("d", 198.0, 380.0, 3),
    ];

    assert_eq!(GridLawDetector::default().detect(&atoms), vec![StructuralRange::table(0, 3)]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Boundary negotiation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_recede_keeps_preamble_and_table_apart() {
    let (atoms, structures) = preamble_and_table(0);
    let chunks = run(atoms, structures, ChunkingPolicy::new(4).with_hard_max(16));

    assert_eq!(bounds(&chunks), vec![(0, 1), (2, 9)]);
    assert_eq!(chunks[0].discriminator, BoundaryReason::BackpressureRecede);
    assert_eq!(chunks[1].discriminator, BoundaryReason::Preserved { structure: "Table".into() });
    assert_eq!(chunks[1].token_count, 8);
    assert!(chunks[1].content.starts_with("[Page 1] [Table] "));
}

#[test]
fn test_recede_reports_document_ordinals_for_sub_slices() {
    let (atoms, structures) = preamble_and_table(120);
    let chunks = run(atoms, structures, ChunkingPolicy::new(4).with_hard_max(16));

    assert_eq!(bounds(&chunks), vec![(120, 121), (122, 129)]);
}

#[test]
fn test_advance_consumes_whole_table() {
    let atoms = (0..10).map(word).collect();
    let chunks = run(atoms, vec![StructuralRange::table(0, 9)], ChunkingPolicy::new(5).with_hard_max(16));

    assert_eq!(chunks.len(), 1);
    assert_eq!(bounds(&chunks), vec![(0, 9)]);
    assert_eq!(chunks[0].token_count, 10);
}

#[test]
fn test_default_cap_soft_breaks_wide_tables() {
    // Default cap is round(4 * 1.2) = 5, below the 7-atom span
    let (atoms, structures) = preamble_and_table(0);
    let chunks = run(atoms, structures, ChunkingPolicy::new(4));
    let soft = BoundaryReason::SoftBreak { structure: "Table".into() };

    assert_eq!(bounds(&chunks), vec![(0, 3), (4, 7), (8, 9)]);
    assert_eq!(chunks[0].discriminator, soft);
    assert_eq!(chunks[1].discriminator, soft);
    assert_eq!(chunks[2].discriminator, BoundaryReason::TargetReached);

    let atoms = (0..10).map(word).collect();
    let chunks = run(atoms, vec![StructuralRange::table(0, 9)], ChunkingPolicy::new(5));
    assert_eq!(bounds(&chunks), vec![(0, 4), (5, 9)]);
    assert!(chunks[0].discriminator.splits_structure());
}

// ─────────────────────────────────────────────────────────────────────────────
// Sizing
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_overlap_repeats_ten_tokens() {
    let atoms = (0..100).map(word).collect();
    let chunks = run(atoms, vec![], ChunkingPolicy::new(50).with_overlap(10));

    assert_eq!(chunks[0].end_index, 49);
    assert_eq!(chunks[1].start_index, 40);
    assert_eq!(chunks.last().unwrap().end_index, 99);
}

#[test]
fn test_trailing_fragment_merges() {
    let atoms = (0..105).map(word).collect();
    let chunks = run(atoms, vec![], ChunkingPolicy::new(100));

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].token_count, 105);
    assert_eq!(bounds(&chunks), vec![(0, 104)]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Determinism
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_repeated_runs_are_identical() {
    let (atoms, structures) = preamble_and_table(0);
    let manifest = GeometricManifest::new(atoms, structures);
    let pipe = IntegrityPipe::with_observer(manifest, Arc::new(NoOpObserver));
    let policy = ChunkingPolicy::new(3).with_overlap(1);

    let first: Vec<_> = pipe.generate(&policy).unwrap().collect();
    let second: Vec<_> = pipe.generate(&policy).unwrap().collect();
    assert_eq!(first, second);
}

#[test]
fn test_fingerprint_tracks_structures() {
    let (atoms, structures) = preamble_and_table(0);
    let a = GeometricManifest::new(atoms.clone(), structures.clone());
    let b = GeometricManifest::new(atoms.clone(), structures);
    let c = GeometricManifest::from_atoms(atoms);

    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_ne!(a.fingerprint(), c.fingerprint());
}
