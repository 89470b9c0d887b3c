//! Diagnostic events for structure discovery and chunking.
//!
//! ## Purpose
//!
//! The detector, pipe, engine and layout adapter report what they decide
//! through an injected [`IntegrityObserver`] instead of logging directly.
//! Production code uses [`TracingObserver`]; tests use [`NoOpObserver`] or
//! [`RecordingObserver`] to assert on decisions without a subscriber.
//!
//! ## Events
//!
//! | Id | Event | Level |
//! |----|-------|-------|
//! | 1 | DiscoveryStarted | INFO |
//! | 2 | StructureDetected | DEBUG |
//! | 3 | ChunkGenerated | DEBUG |
//! | 4 | BackpressureApplied | WARN |
//! | 5 | MappingComplete | INFO |
//!
//! Events are observability only. Nothing in the chunking contract depends
//! on them being delivered.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::detector::ReadingDirection;

/// A decision point worth reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    /// Grid detection began for a page.
    DiscoveryStarted {
        /// Page of the first atom.
        page: u32,
        /// Number of atoms examined.
        atom_count: usize,
        /// Requested reading direction.
        direction: ReadingDirection,
    },
    /// A structural zone was emitted.
    StructureDetected {
        /// Structure label.
        kind: String,
        /// First atom ordinal.
        start: usize,
        /// Last atom ordinal.
        end: usize,
    },
    /// A chunk was emitted.
    ChunkGenerated {
        /// Monotonic chunk counter within one generation.
        chunk_index: usize,
        /// Tokens in the chunk.
        token_count: usize,
        /// Flat discriminator string.
        reason: String,
    },
    /// A proposed boundary collided with a structure.
    BackpressureApplied {
        /// Manifest position of the proposed boundary.
        position: usize,
        /// Label of the colliding structure.
        structure: String,
        /// Resolution taken: Advance, Recede, SoftBreak or ForcedSplit.
        action: String,
    },
    /// An external layout was mapped into a manifest.
    MappingComplete {
        /// Pages in the layout.
        pages: usize,
        /// Atoms produced.
        atoms: usize,
        /// Structures produced.
        structures: usize,
    },
}

impl DiagnosticEvent {
    /// Stable numeric id of the event kind.
    pub fn event_id(&self) -> u32 {
        match self {
            Self::DiscoveryStarted { .. } => 1,
            Self::StructureDetected { .. } => 2,
            Self::ChunkGenerated { .. } => 3,
            Self::BackpressureApplied { .. } => 4,
            Self::MappingComplete { .. } => 5,
        }
    }
}

/// Sink for diagnostic events.
pub trait IntegrityObserver: Send + Sync {
    /// Receive one event.
    fn observe(&self, event: DiagnosticEvent);
}

/// Emits events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl IntegrityObserver for TracingObserver {
    fn observe(&self, event: DiagnosticEvent) {
        let event_id = event.event_id();
        match event {
            DiagnosticEvent::DiscoveryStarted { page, atom_count, direction } => {
                tracing::info!(event_id, page, atom_count, ?direction, "discovery started");
            }
            DiagnosticEvent::StructureDetected { kind, start, end } => {
                tracing::debug!(event_id, kind = %kind, start, end, "structure detected");
            }
            DiagnosticEvent::ChunkGenerated { chunk_index, token_count, reason } => {
                tracing::debug!(event_id, chunk_index, token_count, reason = %reason, "chunk generated");
            }
            DiagnosticEvent::BackpressureApplied { position, structure, action } => {
                tracing::warn!(
                    event_id,
                    position,
                    structure = %structure,
                    action = %action,
                    "backpressure applied"
                );
            }
            DiagnosticEvent::MappingComplete { pages, atoms, structures } => {
                tracing::info!(event_id, pages, atoms, structures, "layout mapping complete");
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpObserver;

impl IntegrityObserver for NoOpObserver {
    fn observe(&self, _event: DiagnosticEvent) {}
}

/// Keeps every event in memory, for tests.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingObserver {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().clone()
    }

    /// Number of recorded events with the given id.
    pub fn count(&self, event_id: u32) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_id() == event_id)
            .count()
    }

    /// Recorded backpressure actions, in order.
    pub fn backpressure_actions(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                DiagnosticEvent::BackpressureApplied { action, .. } => Some(action.clone()),
                _ => None,
            })
            .collect()
    }

    /// Drop all recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl IntegrityObserver for RecordingObserver {
    fn observe(&self, event: DiagnosticEvent) {
        self.events.lock().push(event);
    }
}
