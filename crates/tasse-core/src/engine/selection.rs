use super::error::EngineError;
use super::scores::{GlobalScore, ScoreBoard};
use crate::core::models::atom::{AtomSphere, ResidueClass};
use crate::core::models::topology::Topology;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Minimum number of snapshots a tuple must be seen in to qualify.
pub fn snapshot_cutoff(total_snapshots: u32, occurrence_cutoff: f64) -> u32 {
    (total_snapshots as f64 * occurrence_cutoff).ceil() as u32
}

/// The representative placement of one solvent residue.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalSolvent {
    pub residue: u32,
    /// Index of the bridging solvent atom.
    pub solvent: u32,
    /// Snapshots behind the chosen placement, `0` once culled.
    pub snaps: u32,
    /// Placement energy weighted by `snaps`.
    pub energy: f64,
    pub spheres: Vec<AtomSphere>,
}

impl FinalSolvent {
    pub fn is_culled(&self) -> bool {
        self.snaps == 0
    }

    pub fn mean_energy(&self) -> f64 {
        self.energy / self.snaps as f64
    }

    pub fn overlaps(&self, other: &FinalSolvent) -> bool {
        self.spheres
            .iter()
            .any(|a| other.spheres.iter().any(|b| a.overlaps(b)))
    }
}

/// Outcome of the final solvent selection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FinalSelection {
    /// One entry per solvent residue, ordered by residue index.
    pub solvents: Vec<FinalSolvent>,
    pub snapshot_cutoff: u32,
    pub culled: usize,
}

impl FinalSelection {
    pub fn retained(&self) -> impl Iterator<Item = &FinalSolvent> {
        self.solvents.iter().filter(|s| !s.is_culled())
    }

    pub fn retained_count(&self) -> usize {
        self.solvents.len() - self.culled
    }
}

fn register_best(
    finals: &mut BTreeMap<u32, FinalSolvent>,
    score: &GlobalScore,
    topology: &Topology,
) -> Result<(), EngineError> {
    let Some(best) = score.best_placement() else {
        return Err(EngineError::Internal(
            "scored tuple without solvent placement".into(),
        ));
    };
    let energy = best.weighted_energy();
    let residue = topology.atoms()[best.solvent as usize].residue_index;

    finals
        .entry(residue)
        .and_modify(|existing| {
            if energy < existing.energy {
                existing.solvent = best.solvent;
                existing.snaps = best.snaps;
                existing.energy = energy;
                existing.spheres.clone_from(&best.spheres);
            }
        })
        .or_insert_with(|| FinalSolvent {
            residue,
            solvent: best.solvent,
            snaps: best.snaps,
            energy,
            spheres: best.spheres.clone(),
        });
    Ok(())
}

/// Best placement per solvent residue over every qualifying pair, then
/// every qualifying triplet.
pub fn collect_final_solvent(
    board: &ScoreBoard,
    cutoff: u32,
    topology: &Topology,
) -> Result<Vec<FinalSolvent>, EngineError> {
    let mut finals = BTreeMap::new();
    for score in board.pairs().values().filter(|s| s.snapshots_seen >= cutoff) {
        register_best(&mut finals, score, topology)?;
    }
    for score in board
        .triplets()
        .values()
        .filter(|s| s.snapshots_seen >= cutoff)
    {
        register_best(&mut finals, score, topology)?;
    }
    Ok(finals.into_values().collect())
}

/// Culls the worse of every overlapping pair of placements.
///
/// Placements are visited in order. A placement strictly better than an
/// overlapping one culls it; otherwise it is culled itself, so on equal
/// energies the placement visited first loses.
pub fn cull_overlaps(solvents: &mut [FinalSolvent]) -> usize {
    let mut culled = 0;
    for i in 0..solvents.len() {
        if solvents[i].is_culled() {
            continue;
        }
        for j in 0..solvents.len() {
            if i == j || solvents[j].is_culled() || !solvents[i].overlaps(&solvents[j]) {
                continue;
            }
            culled += 1;
            if solvents[i].energy < solvents[j].energy {
                solvents[j].snaps = 0;
            } else {
                solvents[i].snaps = 0;
                break;
            }
        }
    }
    culled
}

/// Hides every solvent atom, then restores the residues of the retained
/// placements at their selected coordinates.
pub fn apply_to_topology(solvents: &[FinalSolvent], topology: &mut Topology) {
    let (atoms, coords) = topology.split_mut();
    for atom in atoms.iter_mut().filter(|a| a.class == ResidueClass::Solvent) {
        atom.skip = true;
    }
    for solvent in solvents.iter().filter(|s| !s.is_culled()) {
        let span = atoms[solvent.solvent as usize].span;
        for (index, sphere) in span.indices().zip(&solvent.spheres) {
            atoms[index].skip = false;
            coords[index] = sphere.position;
        }
    }
}

/// Selects the final solvent set and writes it into `topology`.
pub fn select_final_solvent(
    board: &ScoreBoard,
    total_snapshots: u32,
    occurrence_cutoff: f64,
    cull: bool,
    topology: &mut Topology,
) -> Result<FinalSelection, EngineError> {
    let cutoff = snapshot_cutoff(total_snapshots, occurrence_cutoff);
    let mut solvents = collect_final_solvent(board, cutoff, topology)?;
    debug!(cutoff, candidates = solvents.len(), "Final solvent candidates collected.");

    let culled = if cull { cull_overlaps(&mut solvents) } else { 0 };
    apply_to_topology(&solvents, topology);

    let selection = FinalSelection {
        solvents,
        snapshot_cutoff: cutoff,
        culled,
    };
    for (n, solvent) in selection.retained().enumerate() {
        let atom = &topology.atoms()[solvent.solvent as usize];
        debug!(
            n = n + 1,
            residue = %atom.residue_label(),
            snaps = solvent.snaps,
            energy = solvent.mean_energy(),
            "Final solvent residue."
        );
    }
    info!(
        retained = selection.retained_count(),
        culled = selection.culled,
        "Final solvent selected."
    );
    Ok(selection)
}
