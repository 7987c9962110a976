use crate::core::forcefield::params::{DefinitionFlags, HBondForcefield, residue_matches};
use crate::core::models::atom::{Atom, ResidueClass, ResidueSpan};
use crate::core::models::topology::Topology;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// Maximum number of hydrogens attached to one donor.
pub const MAX_HYDROGENS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DonorHydrogen {
    pub index: u32,
    pub code: u16,
}

/// A heavy atom able to donate and/or accept hydrogen bonds.
#[derive(Debug, Clone, PartialEq)]
pub struct HBondAtom {
    /// Index into the topology's atom array.
    pub index: u32,
    /// Logical atom the bonds are scored against; the first atom of its group.
    pub remap: u32,
    pub residue: u32,
    /// Group id, `0` when ungrouped.
    pub group: u32,
    pub hydrogens: Vec<DonorHydrogen>,
    pub acceptor_code: Option<u16>,
}

impl HBondAtom {
    fn new(atom_index: usize, atom: &Atom) -> Self {
        Self {
            index: atom_index as u32,
            remap: atom_index as u32,
            residue: atom.residue_index,
            group: 0,
            hydrogens: Vec::with_capacity(MAX_HYDROGENS),
            acceptor_code: None,
        }
    }

    #[inline]
    pub fn is_donor(&self) -> bool {
        !self.hydrogens.is_empty()
    }

    #[inline]
    pub fn is_acceptor(&self) -> bool {
        self.acceptor_code.is_some()
    }
}

struct GroupInfo {
    group: u32,
    remap: u32,
    title: String,
}

/// Assigns group ids and accumulates group titles for one definition pass.
struct GroupRegistry<'a> {
    groups: HashMap<(u32, u32), GroupInfo>,
    next_group: &'a mut u32,
}

impl<'a> GroupRegistry<'a> {
    fn new(next_group: &'a mut u32) -> Self {
        Self {
            groups: HashMap::new(),
            next_group,
        }
    }

    fn join(&mut self, record: &mut HBondAtom, definition_group: u32, atom: &Atom) {
        let key = (definition_group, record.residue);
        match self.groups.get_mut(&key) {
            Some(info) => {
                info.title.push('/');
                info.title.push_str(&atom.name);
                record.group = info.group;
                record.remap = info.remap;
            }
            None => {
                *self.next_group += 1;
                record.group = *self.next_group;
                self.groups.insert(
                    key,
                    GroupInfo {
                        group: record.group,
                        remap: record.remap,
                        title: atom.name.clone(),
                    },
                );
            }
        }
    }

    fn register_titles(self, titles: &mut BTreeMap<u32, String>) {
        for info in self.groups.into_values() {
            titles.entry(info.remap).or_insert(info.title);
        }
    }
}

fn matching_atoms<'a>(
    atoms: &'a [Atom],
    atom_flags: &'a [DefinitionFlags],
    flags: DefinitionFlags,
    residue: &'a str,
    name: &'a str,
) -> impl Iterator<Item = (usize, &'a Atom)> + 'a {
    atoms.iter().enumerate().filter(move |(i, atom)| {
        !atom.is_hydrogen
            && atom_flags[*i].contains(flags)
            && residue_matches(residue, &atom.residue_name)
            && atom.name == name
    })
}

/// Donor and acceptor atoms of one topology, split into biopolymer and solvent
/// lists, together with the per-atom data the bridge scan reads.
///
/// Built once before trajectory processing and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct AtomCatalog {
    biopolymer: Vec<HBondAtom>,
    solvent: Vec<HBondAtom>,
    group_titles: BTreeMap<u32, String>,
    charges: Vec<f64>,
    radii: Vec<f64>,
    spans: Vec<ResidueSpan>,
    solvent_size: usize,
}

impl AtomCatalog {
    /// Matches every donor and acceptor definition against the topology.
    ///
    /// A donor additionally requires its named hydrogen within the same
    /// residue. Atoms matched by several donor definitions collect up to
    /// [`MAX_HYDROGENS`] hydrogens. With `group_bonds`, atoms of one residue
    /// sharing a definition group collapse onto the first atom of the group.
    pub fn build(topology: &Topology, forcefield: &HBondForcefield, group_bonds: bool) -> Self {
        let atoms = topology.atoms();
        let mut biopolymer: Vec<HBondAtom> = Vec::new();
        let mut solvent: Vec<HBondAtom> = Vec::new();
        let mut offsets: Vec<Option<usize>> = vec![None; atoms.len()];
        let mut group_titles = BTreeMap::new();
        let mut next_group = 0u32;

        let atom_flags: Vec<DefinitionFlags> =
            atoms.iter().map(DefinitionFlags::of_atom).collect();

        let mut registry = GroupRegistry::new(&mut next_group);
        for definition in &forcefield.donors {
            for (i, atom) in matching_atoms(
                atoms,
                &atom_flags,
                definition.flags,
                &definition.residue,
                &definition.atom,
            ) {
                let Some(hydrogen) = atom
                    .span
                    .indices()
                    .find(|&j| atoms[j].name == definition.hydrogen)
                else {
                    continue;
                };
                let list = if atom.class == ResidueClass::Solvent {
                    &mut solvent
                } else {
                    &mut biopolymer
                };
                let entry = DonorHydrogen {
                    index: hydrogen as u32,
                    code: definition.h_code,
                };

                if let Some(offset) = offsets[i] {
                    let existing = &mut list[offset];
                    if existing.hydrogens.iter().any(|h| h.index == entry.index) {
                        warn!(
                            residue = %atom.residue_label(),
                            donor = %atom.name,
                            hydrogen = %definition.hydrogen,
                            "Hydrogen already registered at donor, definition skipped."
                        );
                    } else if existing.hydrogens.len() == MAX_HYDROGENS {
                        warn!(
                            residue = %atom.residue_label(),
                            donor = %atom.name,
                            "Too many hydrogens at donor."
                        );
                    } else {
                        existing.hydrogens.push(entry);
                    }
                    continue;
                }

                let mut record = HBondAtom::new(i, atom);
                record.hydrogens.push(entry);
                if group_bonds && definition.group != 0 {
                    registry.join(&mut record, definition.group, atom);
                }
                offsets[i] = Some(list.len());
                list.push(record);
            }
        }
        registry.register_titles(&mut group_titles);

        let mut registry = GroupRegistry::new(&mut next_group);
        for definition in &forcefield.acceptors {
            for (i, atom) in matching_atoms(
                atoms,
                &atom_flags,
                definition.flags,
                &definition.residue,
                &definition.atom,
            ) {
                let list = if atom.class == ResidueClass::Solvent {
                    &mut solvent
                } else {
                    &mut biopolymer
                };
                let grouped = group_bonds && definition.group != 0;

                if let Some(offset) = offsets[i] {
                    let existing = &mut list[offset];
                    existing.acceptor_code = Some(definition.y_code);
                    if grouped && existing.group == 0 {
                        registry.join(existing, definition.group, atom);
                    }
                    continue;
                }

                let mut record = HBondAtom::new(i, atom);
                record.acceptor_code = Some(definition.y_code);
                if grouped {
                    registry.join(&mut record, definition.group, atom);
                }
                offsets[i] = Some(list.len());
                list.push(record);
            }
        }
        registry.register_titles(&mut group_titles);

        for list in [&mut biopolymer, &mut solvent] {
            list.sort_by_key(|a| (a.residue, a.group, a.index));
            for record in list.iter_mut() {
                record.hydrogens.sort_by_key(|h| h.index);
            }
        }

        let catalog = Self {
            charges: atoms.iter().map(|a| a.charge).collect(),
            radii: atoms.iter().map(|a| a.radius).collect(),
            spans: atoms.iter().map(|a| a.span).collect(),
            solvent_size: topology.solvent_size(),
            biopolymer,
            solvent,
            group_titles,
        };

        for (name, list) in [("biopolymer", &catalog.biopolymer), ("solvent", &catalog.solvent)] {
            let donors = list.iter().filter(|a| a.is_donor()).count();
            let acceptors = list.iter().filter(|a| a.is_acceptor()).count();
            info!(list = name, donors, acceptors, "Hydrogen bond atoms registered.");
        }
        debug!(groups = catalog.group_titles.len(), "Atom groups registered.");
        catalog
    }

    pub fn biopolymer(&self) -> &[HBondAtom] {
        &self.biopolymer
    }

    pub fn solvent(&self) -> &[HBondAtom] {
        &self.solvent
    }

    /// Slash-joined atom names of the group whose logical atom is `remap`.
    pub fn group_title(&self, remap: u32) -> Option<&str> {
        self.group_titles.get(&remap).map(String::as_str)
    }

    #[inline]
    pub fn charge(&self, atom: u32) -> f64 {
        self.charges[atom as usize]
    }

    #[inline]
    pub fn radius(&self, atom: u32) -> f64 {
        self.radii[atom as usize]
    }

    #[inline]
    pub fn span(&self, atom: u32) -> ResidueSpan {
        self.spans[atom as usize]
    }

    pub fn atom_count(&self) -> usize {
        self.spans.len()
    }

    pub fn solvent_size(&self) -> usize {
        self.solvent_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::topology::SolventNaming;
    use crate::core::models::topology::tests::residue;

    const FORCEFIELD: &str = r#"
        [[hbond]]
        h-code = "H_"
        y-code = "O_2"
        r-min = 2.0
        well-depth = 5.0

        [[hbond]]
        h-code = "H_W"
        y-code = "O_W"
        r-min = 1.9
        well-depth = 4.0

        [[donor]]
        residue = "ANY"
        atom = "N"
        hydrogen = "H"
        code = "H_"
        flags = ["aa"]

        [[donor]]
        residue = "SER"
        atom = "OG"
        hydrogen = "HG"
        code = "H_"
        flags = ["aa"]

        [[donor]]
        residue = "HOH"
        atom = "O"
        hydrogen = "H2"
        code = "H_W"

        [[donor]]
        residue = "HOH"
        atom = "O"
        hydrogen = "H1"
        code = "H_W"

        [[acceptor]]
        residue = "ANY"
        atom = "O"
        code = "O_2"
        flags = ["aa"]

        [[acceptor]]
        residue = "ASP"
        atom = "OD1"
        code = "O_2"
        flags = ["aa"]
        group = 1

        [[acceptor]]
        residue = "ASP"
        atom = "OD2"
        code = "O_2"
        flags = ["aa"]
        group = 1

        [[acceptor]]
        residue = "SER"
        atom = "OG"
        code = "O_2"
        flags = ["aa"]

        [[acceptor]]
        residue = "HOH"
        atom = "O"
        code = "O_W"
    "#;

    fn topology() -> Topology {
        let mut atoms = Vec::new();
        let mut coords = Vec::new();
        residue(
            &mut atoms,
            &mut coords,
            "SER",
            1,
            0,
            &[
                ("N", [0.0; 3]),
                ("H", [0.0; 3]),
                ("CA", [0.0; 3]),
                ("OG", [0.0; 3]),
                ("HG", [0.0; 3]),
                ("C", [0.0; 3]),
                ("O", [0.0; 3]),
            ],
        );
        residue(
            &mut atoms,
            &mut coords,
            "ASP",
            2,
            0,
            &[
                ("N", [0.0; 3]),
                ("H", [0.0; 3]),
                ("CA", [0.0; 3]),
                ("OD1", [0.0; 3]),
                ("OD2", [0.0; 3]),
                ("C", [0.0; 3]),
                ("O", [0.0; 3]),
            ],
        );
        residue(
            &mut atoms,
            &mut coords,
            "HOH",
            3,
            1,
            &[("O", [0.0; 3]), ("H1", [0.0; 3]), ("H2", [0.0; 3])],
        );
        Topology::from_atoms(atoms, coords, &SolventNaming::new("HOH")).unwrap()
    }

    fn catalog(group_bonds: bool) -> AtomCatalog {
        let forcefield = HBondForcefield::from_toml_str(FORCEFIELD).unwrap();
        AtomCatalog::build(&topology(), &forcefield, group_bonds)
    }

    #[test]
    fn build_splits_biopolymer_and_solvent_atoms() {
        let catalog = catalog(true);
        let indices: Vec<u32> = catalog.biopolymer().iter().map(|a| a.index).collect();
        // SER N, OG, O; ASP N, O, OD1, OD2 (grouped atoms sort after ungrouped)
        assert_eq!(indices, vec![0, 3, 6, 7, 13, 10, 11]);
        assert_eq!(catalog.solvent().len(), 1);
        assert_eq!(catalog.solvent_size(), 3);
        assert_eq!(catalog.atom_count(), 17);
    }

    #[test]
    fn donors_and_acceptors_merge_on_the_same_atom() {
        let catalog = catalog(true);
        let serine_og = catalog.biopolymer().iter().find(|a| a.index == 3).unwrap();
        assert!(serine_og.is_donor());
        assert!(serine_og.is_acceptor());
        assert_eq!(serine_og.hydrogens, vec![DonorHydrogen { index: 4, code: 0 }]);

        let backbone_o = catalog.biopolymer().iter().find(|a| a.index == 6).unwrap();
        assert!(!backbone_o.is_donor());
        assert_eq!(backbone_o.acceptor_code, Some(0));
    }

    #[test]
    fn solvent_hydrogens_are_sorted_with_their_codes() {
        let catalog = catalog(true);
        let water = &catalog.solvent()[0];
        assert_eq!(water.index, 14);
        assert_eq!(
            water.hydrogens,
            vec![
                DonorHydrogen { index: 15, code: 1 },
                DonorHydrogen { index: 16, code: 1 }
            ]
        );
        assert_eq!(water.acceptor_code, Some(1));
    }

    #[test]
    fn grouped_atoms_share_a_remap_and_title() {
        let catalog = catalog(true);
        let od1 = catalog.biopolymer().iter().find(|a| a.index == 10).unwrap();
        let od2 = catalog.biopolymer().iter().find(|a| a.index == 11).unwrap();
        assert_eq!(od1.group, od2.group);
        assert_ne!(od1.group, 0);
        assert_eq!(od1.remap, 10);
        assert_eq!(od2.remap, 10);
        assert_eq!(catalog.group_title(10), Some("OD1/OD2"));
    }

    #[test]
    fn grouping_disabled_keeps_atoms_separate() {
        let catalog = catalog(false);
        let od2 = catalog.biopolymer().iter().find(|a| a.index == 11).unwrap();
        assert_eq!(od2.group, 0);
        assert_eq!(od2.remap, 11);
        assert_eq!(catalog.group_title(10), None);
    }

    #[test]
    fn missing_hydrogen_prevents_donor_registration() {
        let forcefield = HBondForcefield::from_toml_str(
            r#"
            [[donor]]
            residue = "SER"
            atom = "OG"
            hydrogen = "HG1"
            code = "H"
            "#,
        )
        .unwrap();
        let catalog = AtomCatalog::build(&topology(), &forcefield, true);
        assert!(catalog.biopolymer().is_empty());
    }
}
