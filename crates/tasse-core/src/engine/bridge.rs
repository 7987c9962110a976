use super::catalog::{AtomCatalog, HBondAtom};
use super::config::EngineConfig;
use super::workers::CancelToken;
use crate::core::forcefield::params::HBondTable;
use crate::core::forcefield::potentials::{
    ELECTROSTATIC_SCREENING, HBondPotential, ReactionField, angular_factor, hbond_12_6,
};
use nalgebra::Point3;
use std::cmp::Ordering;

/// One solvent atom hydrogen-bonded to one biopolymer atom in a snapshot.
///
/// Both indices are logical (group-remapped) atom indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bridge {
    pub solvent: u32,
    pub biopolymer: u32,
    pub energy: f64,
}

impl Bridge {
    /// Orders by solvent, then biopolymer index. Energy breaks remaining ties
    /// so that any permutation of the same bridges sorts identically.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        (self.solvent, self.biopolymer)
            .cmp(&(other.solvent, other.biopolymer))
            .then_with(|| self.energy.total_cmp(&other.energy))
    }
}

pub fn sort_bridges(bridges: &mut [Bridge]) {
    bridges.sort_by(Bridge::total_cmp);
}

/// Donor-acceptor interaction energy.
#[derive(Debug, Clone)]
pub struct EnergyModel {
    field: ReactionField,
    table: HBondTable,
    electrostatic_coeff: f64,
    hbond_126_coeff: f64,
}

impl EnergyModel {
    pub fn new(config: &EngineConfig, table: HBondTable) -> Self {
        Self {
            field: ReactionField::new(
                config.dielectric,
                config.electrostatic_radius,
                config.hbond_max_length,
            ),
            table,
            electrostatic_coeff: config.electrostatic_coeff,
            hbond_126_coeff: config.hbond_126_coeff,
        }
    }

    pub fn reaction_field(&self) -> &ReactionField {
        &self.field
    }

    /// Energy of donor `x` bonding acceptor `y`.
    ///
    /// Zero beyond the distance cutoff. Otherwise the sum of the weighted
    /// reaction-field electrostatics between X-Y and every H-Y pair and the
    /// weighted, angle-modulated 12-6 term of every donor hydrogen.
    pub fn energy(
        &self,
        catalog: &AtomCatalog,
        x: &HBondAtom,
        y: &HBondAtom,
        coords: &[Point3<f64>],
    ) -> f64 {
        let Some(code_y) = y.acceptor_code else {
            return 0.0;
        };
        let crd_x = &coords[x.index as usize];
        let crd_y = &coords[y.index as usize];

        let rxy_sq = (crd_y - crd_x).norm_squared();
        if rxy_sq > self.field.cutoff_sq {
            return 0.0;
        }

        let q_y = catalog.charge(y.index);
        let mut total_e = self
            .field
            .pair_energy(catalog.charge(x.index), q_y, rxy_sq.sqrt());
        let mut total_h = 0.0;

        for hydrogen in &x.hydrogens {
            let crd_h = &coords[hydrogen.index as usize];
            let dxh = crd_x - crd_h;
            let dyh = crd_y - crd_h;
            let rxh = dxh.norm();
            let ryh = dyh.norm();

            total_e += self
                .field
                .pair_energy(catalog.charge(hydrogen.index), q_y, ryh);

            let cos_theta = dyh.dot(&dxh) / (ryh * rxh);
            let params: &HBondPotential = self.table.get(hydrogen.code, code_y);
            total_h += angular_factor(cos_theta) * hbond_12_6(ryh, params);
        }

        total_e * ELECTROSTATIC_SCREENING * self.electrostatic_coeff
            + total_h * self.hbond_126_coeff
    }
}

/// Bond counts of one scan, split by which side donated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanCounts {
    pub biopolymer_donors: usize,
    pub solvent_donors: usize,
}

/// Finds every biopolymer-solvent hydrogen bond of one snapshot.
#[derive(Debug, Clone)]
pub struct BridgeDetector {
    model: EnergyModel,
    cutoff: f64,
}

impl BridgeDetector {
    pub fn new(config: &EngineConfig, table: HBondTable) -> Self {
        Self {
            model: EnergyModel::new(config, table),
            cutoff: -config.hbond_cutoff_energy,
        }
    }

    pub fn model(&self) -> &EnergyModel {
        &self.model
    }

    /// Appends the bridges of one snapshot to `bridges` (cleared first).
    ///
    /// The biopolymer-donor orientation is tried first; the solvent-donor
    /// orientation only when the first does not pass the cutoff. The scan
    /// stops early once `cancel` is set.
    pub fn scan(
        &self,
        catalog: &AtomCatalog,
        coords: &[Point3<f64>],
        cancel: &CancelToken,
        bridges: &mut Vec<Bridge>,
    ) -> ScanCounts {
        bridges.clear();
        let mut counts = ScanCounts::default();

        for b in catalog.biopolymer() {
            if cancel.is_cancelled() {
                break;
            }
            for s in catalog.solvent() {
                if cancel.is_cancelled() {
                    break;
                }

                let mut bond = None;
                if b.is_donor() && s.is_acceptor() {
                    let energy = self.model.energy(catalog, b, s, coords);
                    if energy < self.cutoff {
                        counts.biopolymer_donors += 1;
                        bond = Some(energy);
                    }
                }
                if bond.is_none() && s.is_donor() && b.is_acceptor() {
                    let energy = self.model.energy(catalog, s, b, coords);
                    if energy < self.cutoff {
                        counts.solvent_donors += 1;
                        bond = Some(energy);
                    }
                }

                if let Some(energy) = bond {
                    bridges.push(Bridge {
                        solvent: s.remap,
                        biopolymer: b.remap,
                        energy,
                    });
                }
            }
        }
        counts
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::forcefield::params::{HBondForcefield, HBondParam};
    use crate::core::models::topology::tests::residue;
    use crate::core::models::topology::{SolventNaming, Topology};

    const TOLERANCE: f64 = 1e-9;

    pub(crate) const FORCEFIELD: &str = r#"
        [[hbond]]
        h-code = "H_"
        y-code = "O_"
        r-min = 2.0
        well-depth = 5.0

        [[donor]]
        residue = "ANY"
        atom = "N"
        hydrogen = "H"
        code = "H_"
        flags = ["aa"]

        [[donor]]
        residue = "HOH"
        atom = "O"
        hydrogen = "H1"
        code = "H_"

        [[acceptor]]
        residue = "ANY"
        atom = "O"
        code = "O_"
        flags = ["aa"]

        [[acceptor]]
        residue = "HOH"
        atom = "O"
        code = "O_"
    "#;

    fn no_electrostatics() -> EngineConfig {
        EngineConfig::builder()
            .electrostatic_coeff(0.0)
            .build()
            .unwrap()
    }

    /// One protein residue whose N-H points at a water oxygen 3 A away.
    fn linear_topology(water_x: f64) -> Topology {
        let mut atoms = Vec::new();
        let mut coords = Vec::new();
        residue(
            &mut atoms,
            &mut coords,
            "ALA",
            1,
            0,
            &[
                ("N", [0.0, 0.0, 0.0]),
                ("H", [1.0, 0.0, 0.0]),
                ("CA", [-1.0, 1.0, 0.0]),
                ("C", [-2.0, 1.0, 0.0]),
                ("O", [-3.0, 1.0, 0.0]),
            ],
        );
        residue(
            &mut atoms,
            &mut coords,
            "HOH",
            2,
            1,
            &[
                ("O", [water_x, 0.0, 0.0]),
                ("H1", [water_x + 1.0, 0.0, 0.0]),
                ("H2", [water_x, 1.0, 0.0]),
            ],
        );
        Topology::from_atoms(atoms, coords, &SolventNaming::new("HOH")).unwrap()
    }

    fn detector(config: &EngineConfig) -> (BridgeDetector, HBondForcefield) {
        let forcefield = HBondForcefield::from_toml_str(FORCEFIELD).unwrap();
        (BridgeDetector::new(config, forcefield.table.clone()), forcefield)
    }

    #[test]
    fn energy_of_linear_bond_at_minimum_is_weighted_well_depth() {
        let config = no_electrostatics();
        let (detector, forcefield) = detector(&config);
        let topology = linear_topology(3.0);
        let catalog = AtomCatalog::build(&topology, &forcefield, true);

        let donor = catalog.biopolymer().iter().find(|a| a.index == 0).unwrap();
        let water = &catalog.solvent()[0];
        let energy = detector
            .model()
            .energy(&catalog, donor, water, topology.coords());
        assert!((energy - -3.75).abs() < TOLERANCE);
    }

    #[test]
    fn energy_is_zero_beyond_distance_cutoff() {
        let config = no_electrostatics();
        let (detector, forcefield) = detector(&config);
        let topology = linear_topology(5.0);
        let catalog = AtomCatalog::build(&topology, &forcefield, true);

        let donor = catalog.biopolymer().iter().find(|a| a.index == 0).unwrap();
        let water = &catalog.solvent()[0];
        let energy = detector
            .model()
            .energy(&catalog, donor, water, topology.coords());
        assert_eq!(energy, 0.0);
    }

    #[test]
    fn electrostatics_follow_reaction_field() {
        let config = EngineConfig::builder()
            .hbond_126_coeff(0.0)
            .electrostatic_coeff(1.0)
            .build()
            .unwrap();
        let table = HBondTable::from_params(&[HBondParam {
            h_code: "H_".into(),
            y_code: "O_".into(),
            r_min: 2.0,
            well_depth: 5.0,
        }]);
        let forcefield = HBondForcefield::from_toml_str(FORCEFIELD).unwrap();
        let mut topology = linear_topology(3.0);
        topology.atoms_mut()[0].charge = -1.0;
        topology.atoms_mut()[1].charge = 0.5;
        topology.atoms_mut()[5].charge = -2.0;
        let catalog = AtomCatalog::build(&topology, &forcefield, true);
        let model = EnergyModel::new(&config, table);

        let donor = catalog.biopolymer().iter().find(|a| a.index == 0).unwrap();
        let water = &catalog.solvent()[0];
        let energy = model.energy(&catalog, donor, water, topology.coords());

        let rf = model.reaction_field();
        let expected = (rf.pair_energy(-1.0, -2.0, 3.0) + rf.pair_energy(0.5, -2.0, 2.0))
            * ELECTROSTATIC_SCREENING;
        assert!((energy - expected).abs() < TOLERANCE);
    }

    #[test]
    fn scan_records_one_bridge_per_bonded_pair() {
        let config = no_electrostatics();
        let (detector, forcefield) = detector(&config);
        let topology = linear_topology(3.0);
        let catalog = AtomCatalog::build(&topology, &forcefield, true);

        let mut bridges = Vec::new();
        let counts = detector.scan(&catalog, topology.coords(), &CancelToken::new(), &mut bridges);

        assert_eq!(bridges.len(), 1);
        assert_eq!(bridges[0].solvent, 5);
        assert_eq!(bridges[0].biopolymer, 0);
        assert_eq!(counts.biopolymer_donors, 1);
        assert_eq!(counts.solvent_donors, 0);
    }

    #[test]
    fn scan_stops_when_cancelled() {
        let config = no_electrostatics();
        let (detector, forcefield) = detector(&config);
        let topology = linear_topology(3.0);
        let catalog = AtomCatalog::build(&topology, &forcefield, true);
        let cancel = CancelToken::new();
        cancel.cancel();

        let mut bridges = vec![Bridge {
            solvent: 1,
            biopolymer: 1,
            energy: -1.0,
        }];
        detector.scan(&catalog, topology.coords(), &cancel, &mut bridges);
        assert!(bridges.is_empty());
    }

    #[test]
    fn sorting_is_independent_of_input_order() {
        let mut bridges = vec![
            Bridge { solvent: 9, biopolymer: 1, energy: -2.0 },
            Bridge { solvent: 3, biopolymer: 7, energy: -1.5 },
            Bridge { solvent: 3, biopolymer: 2, energy: -3.0 },
            Bridge { solvent: 3, biopolymer: 2, energy: -4.0 },
        ];
        let mut reversed: Vec<Bridge> = bridges.iter().rev().copied().collect();
        sort_bridges(&mut bridges);
        sort_bridges(&mut reversed);

        assert_eq!(bridges, reversed);
        let keys: Vec<(u32, u32)> = bridges.iter().map(|b| (b.solvent, b.biopolymer)).collect();
        assert_eq!(keys, vec![(3, 2), (3, 2), (3, 7), (9, 1)]);
        assert_eq!(bridges[0].energy, -4.0);
    }
}
