//! # aegis-integrity
//!
//! Geometry-aware elastic chunking for retrieval pipelines.
//!
//! The crate answers one question:
//!
//! > Where can a stream of positioned words be cut into token-bounded chunks
//! > **without splitting a table**?
//!
//! ## Core Contract
//!
//! 1. Discover structural zones (tables, grids) from word coordinates alone
//! 2. Propose size-based chunk boundaries over the word stream
//! 3. Negotiate every boundary that lands inside a zone: advance past it,
//!    recede before it, or split it only when the hard cap or forward
//!    progress demands it, and report which
//!
//! ## Architecture
//!
//! ```text
//! Words → GridLawDetector → GeometricManifest → IntegrityPipe → GeometricChunk*
//!              ↑                    ↑
//!        AegisEngine (per page)   LayoutAdapter (OCR tables)
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same manifest + same policy → identical chunk sequence
//! - Every chunk carries a [`BoundaryReason`] explaining its end
//! - A manifest of `n` atoms produces at most `n` chunks

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod fingerprint;
pub mod manifest;
pub mod detector;
pub mod policy;
pub mod pipe;
pub mod diagnostics;
pub mod engine;
pub mod layout;

// Re-exports
pub use types::{
    BoundingBox, GeometricAtom, StructuralRange, GeometricChunk, BoundaryReason,
    UnknownReason, estimate_tokens, TABLE_STRUCTURE,
};
pub use manifest::GeometricManifest;
pub use detector::{GridLawDetector, DetectorConfig, ReadingDirection, DEFAULT_ALIGNMENT_TOLERANCE};
pub use policy::{ChunkingPolicy, PolicyError};
pub use pipe::{IntegrityPipe, Chunks, ChunkCursor};
pub use diagnostics::{
    DiagnosticEvent, IntegrityObserver, TracingObserver, NoOpObserver, RecordingObserver,
};
pub use engine::{
    AegisEngine, ChunkStream, PageSource, InMemoryPageSource, PageWords, Word,
    CancellationFlag, EngineError,
};
pub use layout::{
    LayoutAdapter, LayoutDocument, LayoutPage, LayoutWord, LayoutTable, LayoutCell,
    TextSpan, LayoutError,
};
pub use fingerprint::Fingerprint;

/// Schema version of the manifest and chunk wire types.
/// Increment on breaking changes to any serialized type.
pub const MANIFEST_SCHEMA_VERSION: &str = "1.0.0";
