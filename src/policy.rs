//! Chunking policy: token budgets and boundary-negotiation tunables.
//!
//! ## Float Normalization for Deterministic Hashing
//!
//! Ratios are quantized to integers before hashing (multiply by 1e6 and
//! round) so `params_hash` does not depend on float formatting.

use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;

/// Quantization factor for float normalization.
const FLOAT_QUANTIZATION_FACTOR: f64 = 1_000_000.0;

/// Default hard cap as a multiple of the target.
pub const DEFAULT_HARD_MAX_RATIO: f64 = 1.2;

/// Invalid chunking configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// `target_tokens` was zero.
    #[error("target_tokens must be positive")]
    NonPositiveTarget,
    /// `hard_max_tokens` was explicitly zero.
    #[error("hard_max_tokens must be positive when set")]
    NonPositiveHardMax,
}

/// Parameters for one chunk generation run.
///
/// ## Parameters
///
/// - `target_tokens`: size at which a boundary is proposed
/// - `hard_max_tokens`: structures wider than this are bisected instead of
///   preserved (defaults to `round(target * 1.2)`)
/// - `overlap_tokens`: tokens repeated at the start of the next chunk
/// - `soft_break_threshold`: proximity above which a colliding structure is
///   absorbed rather than receded from
/// - `density_ratio` / `min_density_atoms`: a trailing remainder shorter than
///   `max(min_density_atoms, floor(target * density_ratio))` atoms is merged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingPolicy {
    /// Target tokens per chunk.
    pub target_tokens: usize,
    /// Explicit hard cap on structure width.
    #[serde(default)]
    pub hard_max_tokens: Option<usize>,
    /// Overlap between consecutive chunks.
    #[serde(default)]
    pub overlap_tokens: usize,
    /// Advance/recede pivot (0.0-1.0).
    pub soft_break_threshold: f64,
    /// Fraction of the target used for the trailing-merge threshold.
    pub density_ratio: f64,
    /// Floor of the trailing-merge threshold.
    pub min_density_atoms: usize,
}

impl ChunkingPolicy {
    /// Create a policy with default tunables.
    pub fn new(target_tokens: usize) -> Self {
        Self {
            target_tokens,
            hard_max_tokens: None,
            overlap_tokens: 0,
            soft_break_threshold: 0.5,
            density_ratio: 0.2,
            min_density_atoms: 2,
        }
    }

    /// Set an explicit hard cap.
    pub fn with_hard_max(mut self, hard_max_tokens: usize) -> Self {
        self.hard_max_tokens = Some(hard_max_tokens);
        self
    }

    /// Set the overlap.
    pub fn with_overlap(mut self, overlap_tokens: usize) -> Self {
        self.overlap_tokens = overlap_tokens;
        self
    }

    /// Set the advance/recede pivot, clamped to 0.0-1.0.
    pub fn with_soft_break_threshold(mut self, threshold: f64) -> Self {
        self.soft_break_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Check preconditions before any work starts.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.target_tokens == 0 {
            return Err(PolicyError::NonPositiveTarget);
        }
        if self.hard_max_tokens == Some(0) {
            return Err(PolicyError::NonPositiveHardMax);
        }
        Ok(())
    }

    /// The hard cap in effect.
    pub fn effective_hard_max(&self) -> usize {
        self.hard_max_tokens
            .unwrap_or_else(|| (self.target_tokens as f64 * DEFAULT_HARD_MAX_RATIO).round() as usize)
    }

    /// Trailing remainders strictly shorter than this many atoms are merged.
    pub fn density_threshold(&self) -> usize {
        let scaled = (self.target_tokens as f64 * self.density_ratio).floor() as usize;
        scaled.max(self.min_density_atoms)
    }

    /// Hash of the effective parameters.
    ///
    /// Policies that behave identically hash identically: an unset hard cap
    /// hashes the same as its explicit default.
    pub fn params_hash(&self) -> String {
        QuantizedPolicyParams {
            target_tokens: self.target_tokens,
            hard_max_tokens: self.effective_hard_max(),
            overlap_tokens: self.overlap_tokens,
            soft_break_threshold: quantize_float(self.soft_break_threshold),
            density_ratio: quantize_float(self.density_ratio),
            min_density_atoms: self.min_density_atoms,
        }
        .digest_hex()
    }
}

impl Default for ChunkingPolicy {
    fn default() -> Self {
        Self::new(512)
    }
}

/// Quantize a float to an i64 for deterministic hashing.
fn quantize_float(value: f64) -> i64 {
    (value * FLOAT_QUANTIZATION_FACTOR).round() as i64
}

#[derive(Serialize)]
struct QuantizedPolicyParams {
    target_tokens: usize,
    hard_max_tokens: usize,
    overlap_tokens: usize,
    soft_break_threshold: i64,
    density_ratio: i64,
    min_density_atoms: usize,
}
