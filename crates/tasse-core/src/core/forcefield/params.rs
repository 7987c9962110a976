use super::potentials::HBondPotential;
use crate::core::models::atom::{Atom, ResidueClass, Terminus};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Multiplier converting partial charges in electron units into AMBER
/// internal units.
pub const AMBER_CHARGE_SCALE: f64 = 18.2223;

/// Residue name matching every residue in a donor/acceptor definition.
pub const ANY_RESIDUE: &str = "ANY";

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct HBondParam {
    pub h_code: String,
    pub y_code: String,
    pub r_min: f64,
    pub well_depth: f64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DonorEntry {
    pub residue: String,
    pub atom: String,
    pub hydrogen: String,
    pub code: String,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub group: u32,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AcceptorEntry {
    pub residue: String,
    pub atom: String,
    pub code: String,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub group: u32,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
struct HBondFile {
    #[serde(default)]
    hbond: Vec<HBondParam>,
    #[serde(default)]
    donor: Vec<DonorEntry>,
    #[serde(default)]
    acceptor: Vec<AcceptorEntry>,
    #[serde(default)]
    solvent: BTreeMap<String, String>,
}

/// Residue kinds a donor/acceptor definition applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DefinitionFlags(u8);

impl DefinitionFlags {
    pub const PROTEIN: Self = Self(1 << 0);
    pub const NUCLEIC: Self = Self(1 << 1);
    pub const N_TERMINUS: Self = Self(1 << 2);
    pub const C_TERMINUS: Self = Self(1 << 3);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "aa" => Some(Self::PROTEIN),
            "na" => Some(Self::NUCLEIC),
            "nt" => Some(Self::N_TERMINUS),
            "ct" => Some(Self::C_TERMINUS),
            _ => None,
        }
    }

    /// Flags carried by an atom after topology classification.
    pub fn of_atom(atom: &Atom) -> Self {
        let mut flags = Self::empty();
        match atom.class {
            ResidueClass::Protein => flags = flags.union(Self::PROTEIN),
            ResidueClass::Nucleic => flags = flags.union(Self::NUCLEIC),
            _ => {}
        }
        match atom.terminus {
            Some(Terminus::N) => flags = flags.union(Self::N_TERMINUS),
            Some(Terminus::C) => flags = flags.union(Self::C_TERMINUS),
            None => {}
        }
        flags
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns `true` when every flag of `other` is also set in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Dense `(hydrogen code, acceptor code)` parameter matrix.
///
/// Codes are numbered in order of first appearance in the `[[hbond]]` list.
/// Code pairs without an entry carry zero parameters and contribute no
/// directional energy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HBondTable {
    h_codes: Vec<String>,
    y_codes: Vec<String>,
    params: Vec<HBondPotential>,
}

impl HBondTable {
    pub fn from_params(entries: &[HBondParam]) -> Self {
        let mut table = Self::default();
        if entries.is_empty() {
            warn!("No hydrogen bond parameters defined, using zero-valued dummy codes.");
            table.h_codes.push("H".to_string());
            table.y_codes.push("O".to_string());
            table.params.push(HBondPotential::default());
            return table;
        }

        for entry in entries {
            intern(&mut table.h_codes, &entry.h_code);
            intern(&mut table.y_codes, &entry.y_code);
        }
        table.params = vec![HBondPotential::default(); table.h_codes.len() * table.y_codes.len()];
        for entry in entries {
            if let (Some(h), Some(y)) = (table.h_code(&entry.h_code), table.y_code(&entry.y_code)) {
                let slot = table.slot(h, y);
                table.params[slot] = HBondPotential::new(entry.r_min, entry.well_depth);
            }
        }
        table
    }

    fn slot(&self, h: u16, y: u16) -> usize {
        h as usize * self.y_codes.len() + y as usize
    }

    pub fn h_code(&self, name: &str) -> Option<u16> {
        self.h_codes
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name.trim()))
            .map(|i| i as u16)
    }

    pub fn y_code(&self, name: &str) -> Option<u16> {
        self.y_codes
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name.trim()))
            .map(|i| i as u16)
    }

    #[inline]
    pub fn get(&self, h: u16, y: u16) -> &HBondPotential {
        &self.params[self.slot(h, y)]
    }

    pub fn h_code_count(&self) -> usize {
        self.h_codes.len()
    }

    pub fn y_code_count(&self) -> usize {
        self.y_codes.len()
    }
}

fn intern(codes: &mut Vec<String>, name: &str) {
    let name = name.trim();
    if !codes.iter().any(|c| c.eq_ignore_ascii_case(name)) {
        codes.push(name.to_ascii_uppercase());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DonorDefinition {
    pub residue: String,
    pub atom: String,
    pub hydrogen: String,
    pub h_code: u16,
    pub flags: DefinitionFlags,
    pub group: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AcceptorDefinition {
    pub residue: String,
    pub atom: String,
    pub y_code: u16,
    pub flags: DefinitionFlags,
    pub group: u32,
}

/// Returns `true` when a definition for `definition` applies to residue `name`.
pub fn residue_matches(definition: &str, name: &str) -> bool {
    definition == ANY_RESIDUE || definition == name
}

fn residues_compatible(a: &str, b: &str) -> bool {
    a == ANY_RESIDUE || b == ANY_RESIDUE || a == b
}

fn parse_flags(flags: &[String], residue: &str, atom: &str) -> DefinitionFlags {
    flags
        .iter()
        .fold(DefinitionFlags::empty(), |acc, name| match DefinitionFlags::from_name(name) {
            Some(flag) => acc.union(flag),
            None => {
                warn!(flag = %name, residue, atom, "Unknown definition flag.");
                acc
            }
        })
}

/// Hydrogen bond parameters, donor/acceptor definitions and solvent aliases.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HBondForcefield {
    pub table: HBondTable,
    pub donors: Vec<DonorDefinition>,
    pub acceptors: Vec<AcceptorDefinition>,
    pub solvent_aliases: BTreeMap<String, String>,
}

impl HBondForcefield {
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&content).map_err(|e| ParamLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    /// Parses the TOML document and resolves every definition against the
    /// parameter table.
    ///
    /// Definitions naming an unknown code and duplicates of earlier
    /// definitions are skipped with a warning.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let file: HBondFile = toml::from_str(content)?;
        let table = HBondTable::from_params(&file.hbond);

        let mut donors: Vec<DonorDefinition> = Vec::with_capacity(file.donor.len());
        for entry in &file.donor {
            let residue = entry.residue.trim().to_ascii_uppercase();
            let atom = entry.atom.trim().to_ascii_uppercase();
            let hydrogen = entry.hydrogen.trim().to_ascii_uppercase();
            let Some(h_code) = table.h_code(&entry.code) else {
                warn!(code = %entry.code, %residue, %atom, "Unknown donor hydrogen code, definition skipped.");
                continue;
            };
            let flags = parse_flags(&entry.flags, &residue, &atom);
            let duplicate = donors.iter().any(|d| {
                d.flags == flags
                    && residues_compatible(&d.residue, &residue)
                    && d.atom == atom
                    && d.hydrogen == hydrogen
            });
            if duplicate {
                warn!(%residue, %atom, %hydrogen, "Duplicate donor definition skipped.");
                continue;
            }
            donors.push(DonorDefinition {
                residue,
                atom,
                hydrogen,
                h_code,
                flags,
                group: entry.group,
            });
        }

        let mut acceptors: Vec<AcceptorDefinition> = Vec::with_capacity(file.acceptor.len());
        for entry in &file.acceptor {
            let residue = entry.residue.trim().to_ascii_uppercase();
            let atom = entry.atom.trim().to_ascii_uppercase();
            let Some(y_code) = table.y_code(&entry.code) else {
                warn!(code = %entry.code, %residue, %atom, "Unknown acceptor code, definition skipped.");
                continue;
            };
            let flags = parse_flags(&entry.flags, &residue, &atom);
            let duplicate = acceptors.iter().any(|a| {
                a.flags == flags && residues_compatible(&a.residue, &residue) && a.atom == atom
            });
            if duplicate {
                warn!(%residue, %atom, "Duplicate acceptor definition skipped.");
                continue;
            }
            acceptors.push(AcceptorDefinition {
                residue,
                atom,
                y_code,
                flags,
                group: entry.group,
            });
        }

        let solvent_aliases = file
            .solvent
            .into_iter()
            .map(|(alias, name)| (alias.trim().to_string(), name.trim().to_string()))
            .collect();

        debug!(
            h_codes = table.h_code_count(),
            y_codes = table.y_code_count(),
            donors = donors.len(),
            acceptors = acceptors.len(),
            "Hydrogen bond force field loaded."
        );

        Ok(Self {
            table,
            donors,
            acceptors,
            solvent_aliases,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChargeRecord {
    residue: String,
    atom: String,
    charge: f64,
}

#[derive(Debug, Deserialize)]
struct RadiusRecord {
    residue: String,
    atom: String,
    radius: f64,
}

/// Per `(residue, atom)` partial charges and van der Waals radii.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AtomTables {
    charges: HashMap<(String, String), f64>,
    radii: HashMap<(String, String), f64>,
}

impl AtomTables {
    pub fn load(charges_path: Option<&Path>, radii_path: Option<&Path>) -> Result<Self, ParamLoadError> {
        let mut tables = Self::default();
        if let Some(path) = charges_path {
            tables.charges = Self::load_charges_csv(path)?;
        }
        if let Some(path) = radii_path {
            tables.radii = Self::load_radii_csv(path)?;
        }
        debug!(
            charges = tables.charges.len(),
            radii = tables.radii.len(),
            "Atom tables loaded."
        );
        Ok(tables)
    }

    fn load_charges_csv(path: &Path) -> Result<HashMap<(String, String), f64>, ParamLoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| ParamLoadError::Csv {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;

        let mut charges = HashMap::new();
        for result in reader.deserialize::<ChargeRecord>() {
            let record = result.map_err(|e| ParamLoadError::Csv {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;
            charges.insert(
                key(&record.residue, &record.atom),
                record.charge * AMBER_CHARGE_SCALE,
            );
        }
        Ok(charges)
    }

    fn load_radii_csv(path: &Path) -> Result<HashMap<(String, String), f64>, ParamLoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| ParamLoadError::Csv {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;

        let mut radii = HashMap::new();
        for result in reader.deserialize::<RadiusRecord>() {
            let record = result.map_err(|e| ParamLoadError::Csv {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;
            radii.insert(key(&record.residue, &record.atom), record.radius);
        }
        Ok(radii)
    }

    /// Inserts a charge given in electron units.
    pub fn insert_charge(&mut self, residue: &str, atom: &str, charge: f64) {
        self.charges
            .insert(key(residue, atom), charge * AMBER_CHARGE_SCALE);
    }

    pub fn insert_radius(&mut self, residue: &str, atom: &str, radius: f64) {
        self.radii.insert(key(residue, atom), radius);
    }

    /// Looks up the charge under the terminal variant first, then the plain
    /// residue name.
    pub fn charge(&self, topology_name: &str, residue_name: &str, atom: &str) -> Option<f64> {
        lookup(&self.charges, topology_name, residue_name, atom)
    }

    pub fn radius(&self, topology_name: &str, residue_name: &str, atom: &str) -> Option<f64> {
        lookup(&self.radii, topology_name, residue_name, atom)
    }
}

fn key(residue: &str, atom: &str) -> (String, String) {
    (
        residue.trim().to_ascii_uppercase(),
        atom.trim().to_ascii_uppercase(),
    )
}

fn lookup(
    map: &HashMap<(String, String), f64>,
    topology_name: &str,
    residue_name: &str,
    atom: &str,
) -> Option<f64> {
    map.get(&key(topology_name, atom))
        .or_else(|| map.get(&key(residue_name, atom)))
        .copied()
}
