use nalgebra::Point3;

/// Classification of the residue an atom belongs to.
///
/// The class is derived once while post-processing the topology and decides
/// which donor/acceptor definitions may apply to the atom and whether it takes
/// part in the scan as a biopolymer or a solvent atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ResidueClass {
    /// Amino acid residue carrying the full C, CA, N, O backbone.
    Protein,
    /// Nucleotide carrying the full O5', C5', C4', O3', C3' backbone.
    Nucleic,
    /// Residue mapped to the configured solvent name.
    Solvent,
    /// Anything else (ligands, ions, incomplete residues).
    #[default]
    Other,
}

impl ResidueClass {
    /// Returns `true` for protein and nucleic acid residues.
    pub fn is_biopolymer(self) -> bool {
        matches!(self, ResidueClass::Protein | ResidueClass::Nucleic)
    }
}

/// Terminal position of an amino acid residue within its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Terminus {
    N,
    C,
}

/// Contiguous range of atoms forming one residue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResidueSpan {
    /// Index of the first atom of the residue.
    pub first: u32,
    /// Number of atoms in the residue.
    pub len: u32,
}

impl ResidueSpan {
    pub fn new(first: u32, len: u32) -> Self {
        Self { first, len }
    }

    /// Iterates over the atom indices covered by the span.
    pub fn indices(&self) -> std::ops::Range<usize> {
        self.first as usize..(self.first + self.len) as usize
    }
}

/// An atom of the source topology.
///
/// Identity fields come straight from the structure file; the classification
/// fields (`class`, `terminus`, `span`, `residue_index`) are filled in by
/// [`Topology::from_atoms`](super::topology::Topology::from_atoms), and the
/// physical parameters by
/// [`Topology::assign_parameters`](super::topology::Topology::assign_parameters).
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Serial number as read from the input file.
    pub serial: u32,
    /// Trimmed, upper-case atom name (e.g. `"OD1"`).
    pub name: String,
    /// Trimmed residue name. Solvent residues are renamed to the solvent name.
    pub residue_name: String,
    /// Residue sequence number as read from the input file.
    pub residue_number: i32,
    /// Chain identifier. Solvent atoms are moved to chain `'W'`.
    pub chain_id: char,
    /// Sequential chain counter, bumped on chain id changes and `TER` records.
    pub chain_index: u32,
    /// Sequential residue counter, unique within the topology.
    pub residue_index: u32,
    /// Atom range of the residue this atom belongs to.
    pub span: ResidueSpan,
    pub class: ResidueClass,
    pub terminus: Option<Terminus>,
    pub is_hydrogen: bool,
    /// Excluded from the written structure.
    pub skip: bool,
    /// Van der Waals radius in Angstroms, already scaled by the overlap tolerance.
    pub radius: f64,
    /// Partial charge in AMBER internal units.
    pub charge: f64,
}

impl Atom {
    pub fn new(
        serial: u32,
        name: &str,
        residue_name: &str,
        residue_number: i32,
        chain_id: char,
    ) -> Self {
        Self {
            serial,
            name: name.trim().to_ascii_uppercase(),
            residue_name: residue_name.trim().to_string(),
            residue_number,
            chain_id,
            chain_index: 0,
            residue_index: 0,
            span: ResidueSpan::default(),
            class: ResidueClass::Other,
            terminus: None,
            is_hydrogen: false,
            skip: false,
            radius: 0.0,
            charge: 0.0,
        }
    }

    /// Residue name used for parameter lookups.
    ///
    /// Terminal amino acids get their fourth character replaced by `N` or `C`,
    /// so `ALA` becomes `ALAN` at the N-terminus.
    pub fn topology_residue_name(&self) -> String {
        match self.terminus {
            Some(terminus) => {
                let base: String = self.residue_name.chars().take(3).collect();
                let mark = match terminus {
                    Terminus::N => 'N',
                    Terminus::C => 'C',
                };
                format!("{base}{mark}")
            }
            None => self.residue_name.clone(),
        }
    }

    /// Short human readable residue label, e.g. `ASP-42`.
    pub fn residue_label(&self) -> String {
        format!("{}-{}", self.residue_name, self.residue_number)
    }
}

/// Position and van der Waals radius of one solvent atom in a placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtomSphere {
    pub position: Point3<f64>,
    pub radius: f64,
}

impl AtomSphere {
    pub fn new(position: Point3<f64>, radius: f64) -> Self {
        Self { position, radius }
    }

    /// Two spheres overlap when the squared center distance is below the
    /// squared sum of the radii.
    #[inline]
    pub fn overlaps(&self, other: &AtomSphere) -> bool {
        let reach = self.radius + other.radius;
        (self.position - other.position).norm_squared() < reach * reach
    }
}

impl Default for AtomSphere {
    fn default() -> Self {
        Self {
            position: Point3::origin(),
            radius: 0.0,
        }
    }
}
