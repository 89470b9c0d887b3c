//! Geometric manifest: atoms, structural zones and a positional index.
//!
//! The manifest is the contract between whatever produced the atoms (PDF
//! extraction, an OCR adapter) and the chunking pipe. Structures are looked
//! up by atom position once per boundary candidate, so the manifest keeps a
//! precomputed map from each position to the structures covering it.
//!
//! ## Index Invariants
//!
//! - Built in O(atoms + total structure coverage), queried in O(1)
//! - Structures are clamped to `[0, atoms - 1]` before indexing
//! - Any mutation drops the index; the next lookup rebuilds it

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::fingerprint::Fingerprint;
use crate::types::{GeometricAtom, StructuralRange};

/// Atoms plus the structures that must not be split.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeometricManifest {
    atoms: Vec<GeometricAtom>,
    #[serde(default)]
    structures: Vec<StructuralRange>,
    /// Position -> indices into `structures`.
    #[serde(skip)]
    index: OnceLock<Vec<Vec<usize>>>,
}

impl GeometricManifest {
    /// Create a manifest from finalized atoms and structures.
    pub fn new(atoms: Vec<GeometricAtom>, structures: Vec<StructuralRange>) -> Self {
        Self {
            atoms,
            structures,
            index: OnceLock::new(),
        }
    }

    /// Create a manifest with no structures.
    pub fn from_atoms(atoms: Vec<GeometricAtom>) -> Self {
        Self::new(atoms, Vec::new())
    }

    /// All atoms in manifest order.
    pub fn atoms(&self) -> &[GeometricAtom] {
        &self.atoms
    }

    /// All structures, in insertion order.
    pub fn structures(&self) -> &[StructuralRange] {
        &self.structures
    }

    /// Atom at a manifest position.
    pub fn atom(&self, position: usize) -> Option<&GeometricAtom> {
        self.atoms.get(position)
    }

    /// Number of atoms.
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Whether the manifest holds no atoms.
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Sum of all atom token estimates.
    pub fn total_tokens(&self) -> usize {
        self.atoms.iter().map(|a| a.token_count).sum()
    }

    /// Append an atom. Invalidates the index.
    pub fn push_atom(&mut self, atom: GeometricAtom) {
        self.atoms.push(atom);
        self.index = OnceLock::new();
    }

    /// Add a structure. Invalidates the index.
    pub fn add_structure(&mut self, structure: StructuralRange) {
        self.structures.push(structure);
        self.index = OnceLock::new();
    }

    /// Union additional structures into the manifest. Invalidates the index.
    ///
    /// Origin is not tracked: grid-detected and externally reported ranges
    /// are treated the same by the pipe.
    pub fn extend_structures(&mut self, structures: impl IntoIterator<Item = StructuralRange>) {
        self.structures.extend(structures);
        self.index = OnceLock::new();
    }

    /// Build the position index if it has not been built yet.
    pub fn finalize(&self) {
        self.index();
    }

    /// Whether the index is currently built.
    pub fn is_finalized(&self) -> bool {
        self.index.get().is_some()
    }

    /// Structures covering `position`, in insertion order.
    ///
    /// Positions outside the manifest have no structures.
    pub fn structures_at(&self, position: usize) -> impl Iterator<Item = &StructuralRange> + '_ {
        self.index()
            .get(position)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(move |&i| &self.structures[i])
    }

    /// First structure covering `position`, if any.
    pub fn first_structure_at(&self, position: usize) -> Option<&StructuralRange> {
        self.structures_at(position).next()
    }

    /// Deterministic fingerprint of atoms and structures.
    pub fn fingerprint(&self) -> String {
        (&self.atoms, &self.structures).digest_hex()
    }

    /// Consume the manifest.
    pub fn into_parts(self) -> (Vec<GeometricAtom>, Vec<StructuralRange>) {
        (self.atoms, self.structures)
    }

    fn index(&self) -> &[Vec<usize>] {
        self.index.get_or_init(|| {
            let mut map = vec![Vec::new(); self.atoms.len()];
            for (i, structure) in self.structures.iter().enumerate() {
                if let Some((start, end)) = structure.clamped(self.atoms.len()) {
                    for slot in &mut map[start..=end] {
                        slot.push(i);
                    }
                }
            }
            map
        })
    }
}
