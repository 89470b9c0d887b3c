//! Positioned text atoms.
//!
//! An atom is the smallest unit the chunker reasons about: usually one word,
//! with its bounding box, page and document-wide ordinal.

use serde::{Deserialize, Serialize};

/// Characters per estimated token.
const CHARS_PER_TOKEN: usize = 4;

/// Cheap length-based token estimate: `ceil(chars / 4)`, never below 1.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN).max(1)
}

/// An axis-aligned box in page space.
///
/// The origin convention (bottom-left or top-left) is whatever the producer
/// used; nothing downstream reinterprets it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x: f64,
    /// Vertical anchor.
    pub y: f64,
    /// Width of the box.
    pub width: f64,
    /// Height of the box.
    pub height: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Build a box from a flat polygon `[x0, y0, x1, y1, ...]`.
    ///
    /// Quadrilaterals are read as `[top-left, top-right, bottom-right, bottom-left]`,
    /// so the box spans point 0 to point 2. Degenerate polygons fall back to the
    /// extent of whatever points are present.
    pub fn from_polygon(points: &[f64]) -> Self {
        let pairs: Vec<(f64, f64)> = points
            .chunks_exact(2)
            .map(|p| (p[0], p[1]))
            .collect();

        match pairs.as_slice() {
            [] => Self::default(),
            [(x0, y0), _, (x2, y2), ..] => Self::new(*x0, *y0, x2 - x0, y2 - y0),
            _ => {
                let min_x = pairs.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
                let min_y = pairs.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
                let max_x = pairs.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
                let max_y = pairs.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
                Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
            }
        }
    }
}

/// A positioned unit of text.
///
/// `index` is the atom's position in the full document ordering. It is
/// carried explicitly because a manifest may hold a sub-slice of a larger
/// document, in which case the atom's position in the manifest and its
/// document ordinal differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometricAtom {
    /// Text content.
    pub text: String,
    /// Bounding box on the page.
    pub bounds: BoundingBox,
    /// Page number the atom was extracted from.
    pub page: u32,
    /// Estimated token count (at least 1).
    pub token_count: usize,
    /// Document-wide ordinal.
    pub index: usize,
}

impl GeometricAtom {
    /// Create an atom with an estimated token count.
    pub fn new(text: impl Into<String>, bounds: BoundingBox, page: u32, index: usize) -> Self {
        let text = text.into();
        let token_count = estimate_tokens(&text);
        Self {
            text,
            bounds,
            page,
            token_count,
            index,
        }
    }

    /// Override the token count (floored to 1).
    pub fn with_token_count(mut self, token_count: usize) -> Self {
        self.token_count = token_count.max(1);
        self
    }
}
