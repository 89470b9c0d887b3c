//! Page-at-a-time orchestration.
//!
//! The engine pulls one page of words at a time from a [`PageSource`], runs
//! grid detection on it, builds a page manifest and drains an integrity
//! pipe over it before asking for the next page. Callers pull chunks one at
//! a time, so chunk emission (for example network I/O) can interleave with
//! generation without buffering the document.
//!
//! ```text
//! PageSource → words → atoms → GridLawDetector → GeometricManifest → IntegrityPipe → chunks
//! ```
//!
//! ## Limitations
//!
//! - Each page is chunked independently; structures never span pages
//! - Cancellation is observed only between pages

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::detector::GridLawDetector;
use crate::diagnostics::{IntegrityObserver, TracingObserver};
use crate::manifest::GeometricManifest;
use crate::pipe::{ChunkCursor, IntegrityPipe};
use crate::policy::{ChunkingPolicy, PolicyError};
use crate::types::{BoundingBox, GeometricAtom, GeometricChunk};

/// Error type for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The chunking policy is invalid.
    #[error("Invalid policy: {0}")]
    Policy(#[from] PolicyError),
    /// The page source failed.
    #[error("Page source error: {0}")]
    Source(String),
}

impl EngineError {
    /// Create a source error from any error type.
    pub fn from_source<E: std::error::Error>(e: E) -> Self {
        Self::Source(e.to_string())
    }
}

/// A word as extracted from a page, before it becomes an atom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    /// Word text.
    pub text: String,
    /// Word bounding box.
    pub bounds: BoundingBox,
}

impl Word {
    /// Create a new word.
    pub fn new(text: impl Into<String>, bounds: BoundingBox) -> Self {
        Self {
            text: text.into(),
            bounds,
        }
    }
}

/// One page of extracted words in reading order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageWords {
    /// Page number.
    pub number: u32,
    /// Words in extraction order.
    pub words: Vec<Word>,
}

impl PageWords {
    /// Create a page.
    pub fn new(number: u32, words: Vec<Word>) -> Self {
        Self { number, words }
    }
}

/// Producer of pages, e.g. a PDF word extractor.
///
/// Implementations return pages in document order and `Ok(None)` once the
/// document is exhausted.
#[async_trait]
pub trait PageSource: Send {
    /// Error type for source operations.
    type Error: std::error::Error + Send + Sync;

    /// Fetch the next page.
    async fn next_page(&mut self) -> Result<Option<PageWords>, Self::Error>;
}

/// Page source backed by a queue, for tests and in-process producers.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPageSource {
    pages: VecDeque<PageWords>,
}

impl InMemoryPageSource {
    /// Create a source from pages.
    pub fn new(pages: impl IntoIterator<Item = PageWords>) -> Self {
        Self {
            pages: pages.into_iter().collect(),
        }
    }

    /// Queue another page.
    pub fn push(&mut self, page: PageWords) {
        self.pages.push_back(page);
    }

    /// Pages not yet fetched.
    pub fn remaining(&self) -> usize {
        self.pages.len()
    }
}

#[async_trait]
impl PageSource for InMemoryPageSource {
    type Error = Infallible;

    async fn next_page(&mut self) -> Result<Option<PageWords>, Self::Error> {
        Ok(self.pages.pop_front())
    }
}

/// Cooperative cancellation signal, checked between pages.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Create an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Streaming chunker over a page source.
pub struct AegisEngine {
    policy: ChunkingPolicy,
    detector: GridLawDetector,
    observer: Arc<dyn IntegrityObserver>,
}

impl AegisEngine {
    /// Create an engine. The policy is validated here, before any page is read.
    pub fn new(policy: ChunkingPolicy) -> Result<Self, EngineError> {
        policy.validate()?;
        let observer: Arc<dyn IntegrityObserver> = Arc::new(TracingObserver);
        Ok(Self {
            policy,
            detector: GridLawDetector::default(),
            observer,
        })
    }

    /// Replace the detector.
    pub fn with_detector(mut self, detector: GridLawDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Replace the observer used by the pipes.
    pub fn with_observer(mut self, observer: Arc<dyn IntegrityObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Get the policy.
    pub fn policy(&self) -> &ChunkingPolicy {
        &self.policy
    }

    /// Start streaming chunks from `source`.
    pub fn stream<S: PageSource>(&self, source: S, cancel: CancellationFlag) -> ChunkStream<'_, S> {
        ChunkStream {
            engine: self,
            source,
            cancel,
            current: None,
            next_ordinal: 0,
            pages_read: 0,
            finished: false,
        }
    }

    /// Turn one page into a pipe and a fresh cursor.
    ///
    /// Atoms get document-wide ordinals starting at `first_ordinal`; detected
    /// ranges are shifted into page-local positions for the manifest.
    fn prepare_page(
        &self,
        page: PageWords,
        first_ordinal: usize,
    ) -> Result<(IntegrityPipe, ChunkCursor), EngineError> {
        let atoms: Vec<GeometricAtom> = page
            .words
            .into_iter()
            .enumerate()
            .map(|(i, word)| GeometricAtom::new(word.text, word.bounds, page.number, first_ordinal + i))
            .collect();

        let structures = self
            .detector
            .detect(&atoms)
            .into_iter()
            .map(|s| s.rebased(first_ordinal))
            .collect();

        let manifest = GeometricManifest::new(atoms, structures);
        let pipe = IntegrityPipe::with_observer(manifest, Arc::clone(&self.observer));
        let cursor = ChunkCursor::new(&self.policy)?;
        Ok((pipe, cursor))
    }
}

/// Pull-based chunk stream produced by [`AegisEngine::stream`].
pub struct ChunkStream<'e, S: PageSource> {
    engine: &'e AegisEngine,
    source: S,
    cancel: CancellationFlag,
    current: Option<(IntegrityPipe, ChunkCursor)>,
    next_ordinal: usize,
    pages_read: usize,
    finished: bool,
}

impl<S: PageSource> ChunkStream<'_, S> {
    /// Pull the next chunk, fetching pages as needed.
    ///
    /// Returns `Ok(None)` once the source is exhausted or cancellation was
    /// requested at a page boundary.
    pub async fn next_chunk(&mut self) -> Result<Option<GeometricChunk>, EngineError> {
        loop {
            if let Some((pipe, cursor)) = self.current.as_mut() {
                if let Some(chunk) = pipe.next_chunk(cursor) {
                    return Ok(Some(chunk));
                }
                self.current = None;
            }

            if self.finished {
                return Ok(None);
            }
            if self.cancel.is_cancelled() {
                tracing::info!(pages_read = self.pages_read, "chunk stream cancelled");
                self.finished = true;
                return Ok(None);
            }

            let page = match self.source.next_page().await {
                Ok(Some(page)) => page,
                Ok(None) => {
                    self.finished = true;
                    return Ok(None);
                }
                Err(e) => {
                    self.finished = true;
                    return Err(EngineError::from_source(e));
                }
            };

            let word_count = page.words.len();
            let prepared = self.engine.prepare_page(page, self.next_ordinal)?;
            self.next_ordinal += word_count;
            self.pages_read += 1;
            self.current = Some(prepared);
        }
    }

    /// Drain the remaining chunks into a vector.
    pub async fn collect_all(mut self) -> Result<Vec<GeometricChunk>, EngineError> {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            chunks.push(chunk);
        }
        Ok(chunks)
    }

    /// Pages fetched so far.
    pub fn pages_read(&self) -> usize {
        self.pages_read
    }
}
