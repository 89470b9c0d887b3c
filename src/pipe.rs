//! Elastic chunking over a geometric manifest.
//!
//! The pipe walks the manifest once, proposes size-based cut points and
//! negotiates each one against the structural zones it lands in.
//!
//! ## Algorithm
//!
//! For each chunk, starting at the cursor:
//!
//! 1. Propose the first position whose inclusive token prefix sum exceeds
//!    the target (at least one atom is always consumed)
//! 2. If no structure covers that position, cut there (`TargetReached`)
//! 3. Otherwise, with `proximity = (boundary - S.start) / (S.end - S.start)`:
//!    - structure wider than the hard cap: cut inside it (`SoftBreak`)
//!    - proximity above the pivot: advance past `S.end` (`Preserved`)
//!    - else recede to `S.start` (`BackpressureRecede`), unless that would
//!      not move past the cursor, in which case cut at the proposal
//!      (`ForcedSplit`)
//! 4. Merge a trailing remainder shorter than the density threshold
//! 5. Emit atoms `[cursor, boundary)`
//! 6. Move the cursor to the boundary, or back by the overlap budget while
//!    still advancing at least one atom
//!
//! ## Termination
//!
//! The cursor strictly increases on every emitted chunk, so a manifest of
//! `n` atoms yields at most `n` chunks.

use std::iter::FusedIterator;
use std::sync::Arc;

use crate::diagnostics::{DiagnosticEvent, IntegrityObserver, TracingObserver};
use crate::manifest::GeometricManifest;
use crate::policy::{ChunkingPolicy, PolicyError};
use crate::types::{BoundaryReason, GeometricAtom, GeometricChunk};

/// Produces integrity-preserving chunks from one manifest.
pub struct IntegrityPipe {
    manifest: GeometricManifest,
    observer: Arc<dyn IntegrityObserver>,
}

impl IntegrityPipe {
    /// Create a pipe reporting through `tracing`.
    ///
    /// The structural index is built here so generation never pays for it
    /// mid-stream.
    pub fn new(manifest: GeometricManifest) -> Self {
        Self::with_observer(manifest, Arc::new(TracingObserver))
    }

    /// Create a pipe with an explicit observer.
    pub fn with_observer(manifest: GeometricManifest, observer: Arc<dyn IntegrityObserver>) -> Self {
        manifest.finalize();
        Self { manifest, observer }
    }

    /// Get the manifest.
    pub fn manifest(&self) -> &GeometricManifest {
        &self.manifest
    }

    /// Start a lazy chunk sequence.
    ///
    /// Each call starts from the beginning of the manifest.
    pub fn generate(&self, policy: &ChunkingPolicy) -> Result<Chunks<'_>, PolicyError> {
        Ok(Chunks {
            pipe: self,
            cursor: ChunkCursor::new(policy)?,
        })
    }

    /// Consume the pipe and return the manifest.
    pub fn into_manifest(self) -> GeometricManifest {
        self.manifest
    }

    pub(crate) fn next_chunk(&self, cursor: &mut ChunkCursor) -> Option<GeometricChunk> {
        cursor.next_chunk(&self.manifest, self.observer.as_ref())
    }
}

/// Lazy iterator over a pipe's chunks.
pub struct Chunks<'a> {
    pipe: &'a IntegrityPipe,
    cursor: ChunkCursor,
}

impl Chunks<'_> {
    /// Manifest position of the next unconsumed atom.
    pub fn position(&self) -> usize {
        self.cursor.position()
    }
}

impl Iterator for Chunks<'_> {
    type Item = GeometricChunk;

    fn next(&mut self) -> Option<Self::Item> {
        self.pipe.next_chunk(&mut self.cursor)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.pipe.manifest.len().saturating_sub(self.cursor.position());
        (usize::from(remaining > 0), Some(remaining))
    }
}

impl FusedIterator for Chunks<'_> {}

/// Pull-based chunking state machine.
///
/// Holds only the resolved policy and the cursor, so the manifest can be
/// owned elsewhere (a [`Chunks`] iterator, or the engine's per-page state).
#[derive(Debug, Clone)]
pub struct ChunkCursor {
    target_tokens: usize,
    hard_max_tokens: usize,
    overlap_tokens: usize,
    soft_break_threshold: f64,
    density_threshold: usize,
    cursor: usize,
    chunk_index: usize,
}

impl ChunkCursor {
    /// Validate the policy and start at position 0.
    pub fn new(policy: &ChunkingPolicy) -> Result<Self, PolicyError> {
        policy.validate()?;
        Ok(Self {
            target_tokens: policy.target_tokens,
            hard_max_tokens: policy.effective_hard_max(),
            overlap_tokens: policy.overlap_tokens,
            soft_break_threshold: policy.soft_break_threshold,
            density_threshold: policy.density_threshold(),
            cursor: 0,
            chunk_index: 0,
        })
    }

    /// Manifest position of the next unconsumed atom.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Number of chunks emitted so far.
    pub fn chunks_emitted(&self) -> usize {
        self.chunk_index
    }

    /// Produce the next chunk from `manifest`, or `None` when exhausted.
    pub fn next_chunk(
        &mut self,
        manifest: &GeometricManifest,
        observer: &dyn IntegrityObserver,
    ) -> Option<GeometricChunk> {
        let atoms = manifest.atoms();
        let total = atoms.len();
        let start = self.cursor;
        if start >= total {
            return None;
        }

        let proposed = find_token_boundary(atoms, start, self.target_tokens);
        let (resolved, reason) = self.resolve(manifest, observer, proposed);
        // Advancing past a structure that runs off the manifest stops at the end
        let mut end = resolved.min(total);

        let remaining = total - end;
        if remaining > 0 && remaining < self.density_threshold {
            end = total;
        }

        if end <= start {
            self.cursor = total;
            return None;
        }

        let chunk = build_chunk(manifest, start, end, reason);
        observer.observe(DiagnosticEvent::ChunkGenerated {
            chunk_index: self.chunk_index,
            token_count: chunk.token_count,
            reason: chunk.discriminator.to_string(),
        });
        self.chunk_index += 1;

        self.cursor = if end >= total {
            total
        } else if self.overlap_tokens > 0 {
            find_overlap_start(atoms, start, end, self.overlap_tokens).max(start + 1)
        } else {
            end
        };

        Some(chunk)
    }

    /// Negotiate a proposed boundary against the structure covering it.
    fn resolve(
        &self,
        manifest: &GeometricManifest,
        observer: &dyn IntegrityObserver,
        proposed: usize,
    ) -> (usize, BoundaryReason) {
        let Some(structure) = manifest.first_structure_at(proposed) else {
            return (proposed, BoundaryReason::TargetReached);
        };
        // Covering structures always clamp to a non-empty range
        let Some((recede_to, _)) = structure.clamped(manifest.len()) else {
            return (proposed, BoundaryReason::TargetReached);
        };

        // Span and proximity use the declared bounds, which may run past the
        // end of a sub-slice manifest
        let (s_start, s_end) = structure.bounds();
        let kind = structure.kind.clone();
        let span = s_end - s_start;
        let proximity = proposed.saturating_sub(s_start) as f64 / span.max(1) as f64;

        let (end, reason) = if span > self.hard_max_tokens {
            (proposed, BoundaryReason::SoftBreak { structure: kind })
        } else if proximity > self.soft_break_threshold {
            (s_end.saturating_add(1), BoundaryReason::Preserved { structure: kind })
        } else if recede_to > self.cursor {
            (recede_to, BoundaryReason::BackpressureRecede)
        } else {
            (proposed, BoundaryReason::ForcedSplit { structure: kind })
        };

        observer.observe(DiagnosticEvent::BackpressureApplied {
            position: proposed,
            structure: structure.kind.clone(),
            action: reason.action().to_string(),
        });

        (end, reason)
    }
}

/// First position whose inclusive prefix sum from `start` exceeds `limit`,
/// or the sequence end. Always at least `start + 1`.
fn find_token_boundary(atoms: &[GeometricAtom], start: usize, limit: usize) -> usize {
    let mut tokens = 0;
    let mut i = start;
    while i < atoms.len() {
        tokens += atoms[i].token_count;
        if tokens > limit {
            break;
        }
        i += 1;
    }

    if i == start {
        start + 1
    } else {
        i
    }
}

/// Start of the overlap window that ends at `end`: the position right after
/// the first one (scanning backward) at which more than `overlap` tokens
/// have accumulated.
fn find_overlap_start(atoms: &[GeometricAtom], start: usize, end: usize, overlap: usize) -> usize {
    let mut tokens = 0;
    for i in (start..end).rev() {
        tokens += atoms[i].token_count;
        if tokens > overlap {
            return i + 1;
        }
    }
    start
}

fn build_chunk(
    manifest: &GeometricManifest,
    start: usize,
    end: usize,
    discriminator: BoundaryReason,
) -> GeometricChunk {
    let atoms = &manifest.atoms()[start..end];
    let first = &atoms[0];
    let last = &atoms[atoms.len() - 1];

    // Only the boundary atoms are sampled; interior structures are not marked
    let mut kinds: Vec<&str> = Vec::new();
    for position in [start, end - 1] {
        for structure in manifest.structures_at(position) {
            if !kinds.contains(&structure.kind.as_str()) {
                kinds.push(&structure.kind);
            }
        }
    }

    let mut content = format!("[Page {}]", first.page);
    for kind in kinds {
        content.push_str(&format!(" [{}]", kind));
    }
    for atom in atoms {
        content.push(' ');
        content.push_str(&atom.text);
    }

    GeometricChunk {
        content,
        start_index: first.index,
        end_index: last.index,
        page: first.page,
        token_count: atoms.iter().map(|a| a.token_count).sum(),
        discriminator,
    }
}
