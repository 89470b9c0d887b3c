//! Emitted chunks and the reason each boundary was placed where it was.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Why a chunk ended where it did.
///
/// Structure-related variants carry the label of the structure that caused
/// the decision so consumers can match on it instead of parsing strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BoundaryReason {
    /// The size-based cut landed outside every structure.
    TargetReached,
    /// The cut was advanced past the end of a structure to keep it whole.
    Preserved {
        /// Label of the preserved structure.
        structure: String,
    },
    /// The cut was pulled back to the start of a structure.
    BackpressureRecede,
    /// The structure is larger than the hard cap and was bisected.
    SoftBreak {
        /// Label of the bisected structure.
        structure: String,
    },
    /// Receding would have stalled the cursor, so the structure was split.
    ForcedSplit {
        /// Label of the split structure.
        structure: String,
    },
}

impl BoundaryReason {
    /// Label of the structure involved, if any.
    pub fn structure(&self) -> Option<&str> {
        match self {
            Self::Preserved { structure }
            | Self::SoftBreak { structure }
            | Self::ForcedSplit { structure } => Some(structure),
            Self::TargetReached | Self::BackpressureRecede => None,
        }
    }

    /// Whether the boundary falls inside a structure.
    pub fn splits_structure(&self) -> bool {
        matches!(self, Self::SoftBreak { .. } | Self::ForcedSplit { .. })
    }

    /// Short action name used in diagnostics.
    pub fn action(&self) -> &'static str {
        match self {
            Self::TargetReached => "None",
            Self::Preserved { .. } => "Advance",
            Self::BackpressureRecede => "Recede",
            Self::SoftBreak { .. } => "SoftBreak",
            Self::ForcedSplit { .. } => "ForcedSplit",
        }
    }
}

impl fmt::Display for BoundaryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetReached => write!(f, "TargetReached"),
            Self::Preserved { structure } => write!(f, "Preserved-{}", structure),
            Self::BackpressureRecede => write!(f, "Backpressure-Recede"),
            Self::SoftBreak { structure } => write!(f, "SoftBreak-{}", structure),
            Self::ForcedSplit { structure } => write!(f, "ForcedSplit-{}", structure),
        }
    }
}

/// Error returned when a discriminator string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown boundary reason: {0}")]
pub struct UnknownReason(pub String);

impl FromStr for BoundaryReason {
    type Err = UnknownReason;

    /// Parse the flat discriminator form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TargetReached" => return Ok(Self::TargetReached),
            "Backpressure-Recede" => return Ok(Self::BackpressureRecede),
            _ => {}
        }

        let (prefix, structure) = s
            .split_once('-')
            .filter(|(_, rest)| !rest.is_empty())
            .ok_or_else(|| UnknownReason(s.to_string()))?;
        let structure = structure.to_string();

        match prefix {
            "Preserved" => Ok(Self::Preserved { structure }),
            "SoftBreak" => Ok(Self::SoftBreak { structure }),
            "ForcedSplit" => Ok(Self::ForcedSplit { structure }),
            _ => Err(UnknownReason(s.to_string())),
        }
    }
}

/// A finished chunk of text with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometricChunk {
    /// Marker prefix followed by the space-joined atom texts.
    pub content: String,
    /// Document ordinal of the first atom.
    pub start_index: usize,
    /// Document ordinal of the last atom.
    pub end_index: usize,
    /// Page of the first atom.
    pub page: u32,
    /// Sum of the atoms' token estimates.
    pub token_count: usize,
    /// Why the chunk ended here.
    pub discriminator: BoundaryReason,
}

impl GeometricChunk {
    /// Number of atoms by ordinal span.
    pub fn atom_span(&self) -> usize {
        self.end_index - self.start_index + 1
    }

    /// Whether the chunk's ordinal range fully contains `[start, end]`.
    pub fn covers(&self, start: usize, end: usize) -> bool {
        self.start_index <= start && end <= self.end_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_flat_discriminators() {
        assert_eq!(BoundaryReason::TargetReached.to_string(), "TargetReached");
        assert_eq!(BoundaryReason::BackpressureRecede.to_string(), "Backpressure-Recede");
        assert_eq!(
            BoundaryReason::Preserved { structure: "Table".into() }.to_string(),
            "Preserved-Table"
        );
        assert_eq!(
            BoundaryReason::SoftBreak { structure: "Table".into() }.to_string(),
            "SoftBreak-Table"
        );
        assert_eq!(
            BoundaryReason::ForcedSplit { structure: "List".into() }.to_string(),
            "ForcedSplit-List"
        );
    }

    #[test]
    fn test_parse_inverts_display() {
        let reasons = [
            BoundaryReason::TargetReached,
            BoundaryReason::BackpressureRecede,
            BoundaryReason::Preserved { structure: "Table".into() },
            BoundaryReason::SoftBreak { structure: "Table".into() },
            BoundaryReason::ForcedSplit { structure: "Table".into() },
        ];
        for reason in reasons {
            assert_eq!(reason.to_string().parse::<BoundaryReason>().unwrap(), reason);
        }
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("TokenLimit".parse::<BoundaryReason>().is_err());
        assert!("Preserved-".parse::<BoundaryReason>().is_err());
        assert!("Oversize-Table".parse::<BoundaryReason>().is_err());
    }

    #[test]
    fn test_serde_tagging() {
        let json = serde_json::to_value(BoundaryReason::SoftBreak { structure: "Table".into() }).unwrap();
        assert_eq!(json["reason"], "soft_break");
        assert_eq!(json["structure"], "Table");
    }

    #[test]
    fn test_structure_accessor() {
        assert_eq!(BoundaryReason::TargetReached.structure(), None);
        let reason = BoundaryReason::ForcedSplit { structure: "Table".into() };
        assert_eq!(reason.structure(), Some("Table"));
        assert!(reason.splits_structure());
    }
}
