//! Core data model for geometric chunking.

pub mod geometry;
pub mod structure;
pub mod chunk;

pub use geometry::{BoundingBox, GeometricAtom, estimate_tokens};
pub use structure::{StructuralRange, TABLE_STRUCTURE};
pub use chunk::{GeometricChunk, BoundaryReason, UnknownReason};
