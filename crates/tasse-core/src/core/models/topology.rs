use super::atom::{Atom, ResidueClass, ResidueSpan, Terminus};
use crate::core::forcefield::params::AtomTables;
use nalgebra::Point3;
use phf::{Map, phf_map};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

static BACKBONE_BITS: Map<&'static str, u16> = phf_map! {
    // --- Protein backbone ---
    "C" => 1 << 0, "CA" => 1 << 1, "N" => 1 << 2, "O" => 1 << 3,
    // --- Nucleic acid backbone ---
    "O5'" => 1 << 4, "C5'" => 1 << 5, "C4'" => 1 << 6, "O3'" => 1 << 7, "C3'" => 1 << 8,
};

const PROTEIN_MASK: u16 = 0b0_0000_1111;
const NUCLEIC_MASK: u16 = 0b1_1111_0000;
const NTERM_HYDROGEN_MASK: u8 = 0b1111;
const CTERM_MARK: &str = "OXT";
const SOLVENT_CHAIN_ID: char = 'W';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Topology contains no atoms")]
    Empty,
    #[error("Coordinate count {coords} does not match atom count {atoms}")]
    CoordinateMismatch { atoms: usize, coords: usize },
    #[error(
        "Invalid atom count in solvent residue {residue_number} ({found} should be {expected})"
    )]
    InconsistentSolvent {
        residue_number: i32,
        found: usize,
        expected: usize,
    },
    #[error("Source structure contains no solvent residues named '{0}'")]
    NoSolvent(String),
}

/// Maps residue names found in input files onto the single solvent name.
#[derive(Debug, Clone, PartialEq)]
pub struct SolventNaming {
    pub name: String,
    pub aliases: BTreeMap<String, String>,
}

impl SolventNaming {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            aliases: BTreeMap::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: &BTreeMap<String, String>) -> Self {
        self.aliases
            .extend(aliases.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn is_solvent(&self, residue_name: &str) -> bool {
        if residue_name == self.name {
            return true;
        }
        self.aliases
            .get(residue_name)
            .is_some_and(|mapped| *mapped == self.name)
    }
}

/// Number of atoms whose radius or charge could not be assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParameterSummary {
    pub missing_radii: usize,
    pub missing_charges: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    atoms: Vec<Atom>,
    coords: Vec<Point3<f64>>,
    solvent_size: usize,
    solvent_name: String,
    remarks: Vec<String>,
}

struct ResidueScan {
    start: usize,
    end: usize,
    backbone: u16,
    nterm_hydrogens: u8,
    has_cterm_mark: bool,
    chain_index: u32,
}

impl Topology {
    /// Classifies residues and validates the solvent layout.
    ///
    /// Residues are delimited by changes of chain or residue number. A protein
    /// residue is C-terminal when it carries `OXT` or ends its chain, and
    /// N-terminal when it carries `H1`/`H2`/`H3` or starts its chain. Every
    /// solvent residue must have the same number of atoms.
    pub fn from_atoms(
        mut atoms: Vec<Atom>,
        coords: Vec<Point3<f64>>,
        solvent: &SolventNaming,
    ) -> Result<Self, TopologyError> {
        if atoms.is_empty() {
            return Err(TopologyError::Empty);
        }
        if atoms.len() != coords.len() {
            return Err(TopologyError::CoordinateMismatch {
                atoms: atoms.len(),
                coords: coords.len(),
            });
        }

        debug!(atoms = atoms.len(), "Post-processing topology.");

        let residues = Self::scan_residues(&atoms);
        let mut solvent_size = 0usize;

        for (residue_index, residue) in residues.iter().enumerate() {
            let len = residue.end - residue.start;
            let span = ResidueSpan::new(residue.start as u32, len as u32);
            let residue_name = atoms[residue.start].residue_name.clone();

            let class = if solvent.is_solvent(&residue_name) {
                ResidueClass::Solvent
            } else if residue.backbone == PROTEIN_MASK {
                ResidueClass::Protein
            } else if residue.backbone == NUCLEIC_MASK {
                ResidueClass::Nucleic
            } else {
                ResidueClass::Other
            };

            let terminus = if class == ResidueClass::Protein {
                let first_in_chain = residue_index == 0
                    || residues[residue_index - 1].chain_index != residue.chain_index;
                let last_in_chain = residue_index + 1 == residues.len()
                    || residues[residue_index + 1].chain_index != residue.chain_index;
                if residue.has_cterm_mark || last_in_chain {
                    Some(Terminus::C)
                } else if residue.nterm_hydrogens == NTERM_HYDROGEN_MASK || first_in_chain {
                    Some(Terminus::N)
                } else {
                    None
                }
            } else {
                None
            };

            if class == ResidueClass::Solvent {
                if solvent_size == 0 {
                    solvent_size = len;
                } else if solvent_size != len {
                    return Err(TopologyError::InconsistentSolvent {
                        residue_number: atoms[residue.start].residue_number,
                        found: len,
                        expected: solvent_size,
                    });
                }
            }

            for atom in &mut atoms[residue.start..residue.end] {
                atom.residue_index = residue_index as u32;
                atom.span = span;
                atom.class = class;
                atom.terminus = terminus;
                atom.is_hydrogen = atom.name.starts_with('H');
                if class == ResidueClass::Solvent {
                    atom.residue_name = solvent.name.clone();
                    atom.chain_id = SOLVENT_CHAIN_ID;
                }
            }
        }

        if solvent_size == 0 {
            return Err(TopologyError::NoSolvent(solvent.name.clone()));
        }

        let topology = Self {
            atoms,
            coords,
            solvent_size,
            solvent_name: solvent.name.clone(),
            remarks: Vec::new(),
        };
        info!(
            atoms = topology.atoms.len(),
            residues = residues.len(),
            solvent_residues = topology.solvent_residue_count(),
            solvent_size,
            "Topology classified."
        );
        Ok(topology)
    }

    fn scan_residues(atoms: &[Atom]) -> Vec<ResidueScan> {
        let mut residues: Vec<ResidueScan> = Vec::new();
        for (i, atom) in atoms.iter().enumerate() {
            let starts_new = match residues.last() {
                None => true,
                Some(current) => {
                    let head = &atoms[current.start];
                    head.chain_index != atom.chain_index
                        || head.residue_number != atom.residue_number
                }
            };
            if starts_new {
                residues.push(ResidueScan {
                    start: i,
                    end: i,
                    backbone: 0,
                    nterm_hydrogens: 0,
                    has_cterm_mark: false,
                    chain_index: atom.chain_index,
                });
            }
            let Some(current) = residues.last_mut() else {
                continue;
            };
            current.end = i + 1;
            let name = atom.name.as_str();
            if name == CTERM_MARK {
                current.has_cterm_mark = true;
            } else if let Some(bit) = BACKBONE_BITS.get(name) {
                current.backbone |= bit;
                if name == "N" {
                    current.nterm_hydrogens |= 1;
                }
            } else {
                match name {
                    "H1" => current.nterm_hydrogens |= 1 << 1,
                    "H2" => current.nterm_hydrogens |= 1 << 2,
                    "H3" => current.nterm_hydrogens |= 1 << 3,
                    _ => {}
                }
            }
        }
        residues
    }

    /// Assigns van der Waals radii to solvent atoms and, when requested,
    /// partial charges to every atom.
    ///
    /// Radii are shrunk by `1 - vdw_tolerance` so that the overlap test of the
    /// final selection tolerates the configured amount of contact. Missing
    /// entries are reported as warnings and leave the value at zero.
    pub fn assign_parameters(
        &mut self,
        tables: &AtomTables,
        vdw_tolerance: f64,
        assign_charges: bool,
    ) -> ParameterSummary {
        let scale = 1.0 - vdw_tolerance;
        let mut summary = ParameterSummary::default();

        for atom in self.atoms.iter_mut() {
            if atom.class != ResidueClass::Solvent {
                continue;
            }
            match tables.radius(&atom.topology_residue_name(), &atom.residue_name, &atom.name) {
                Some(radius) => atom.radius = radius * scale,
                None => {
                    warn!(
                        residue = %atom.topology_residue_name(),
                        atom = %atom.name,
                        "Can't assign VdW radius."
                    );
                    summary.missing_radii += 1;
                }
            }
        }

        if assign_charges {
            for atom in self.atoms.iter_mut() {
                match tables.charge(&atom.topology_residue_name(), &atom.residue_name, &atom.name)
                {
                    Some(charge) => atom.charge = charge,
                    None => {
                        warn!(
                            residue = %atom.topology_residue_name(),
                            atom = %atom.name,
                            "Can't assign partial charge."
                        );
                        summary.missing_charges += 1;
                    }
                }
            }
        }

        summary
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atoms_mut(&mut self) -> &mut [Atom] {
        &mut self.atoms
    }

    pub fn coords(&self) -> &[Point3<f64>] {
        &self.coords
    }

    pub fn coords_mut(&mut self) -> &mut [Point3<f64>] {
        &mut self.coords
    }

    /// Mutable access to atoms and coordinates at the same time.
    pub fn split_mut(&mut self) -> (&mut [Atom], &mut [Point3<f64>]) {
        (&mut self.atoms, &mut self.coords)
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Number of atoms in one solvent molecule.
    pub fn solvent_size(&self) -> usize {
        self.solvent_size
    }

    pub fn solvent_name(&self) -> &str {
        &self.solvent_name
    }

    pub fn solvent_residue_count(&self) -> usize {
        self.atoms
            .iter()
            .filter(|a| a.class == ResidueClass::Solvent)
            .count()
            / self.solvent_size.max(1)
    }

    pub fn remarks(&self) -> &[String] {
        &self.remarks
    }

    pub fn set_remarks(&mut self, remarks: Vec<String>) {
        self.remarks = remarks;
    }
}
