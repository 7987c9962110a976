use super::microset::{LocalScore, LocalScores, PairKey, TripletKey};
use super::solvent_pool::SolventBlockPool;
use crate::core::models::atom::AtomSphere;
use std::collections::BTreeMap;

/// Best observed geometry of one solvent residue bridging one pair or triplet.
#[derive(Debug, Clone, PartialEq)]
pub struct SolventPlacement {
    /// Logical index of the bridging solvent atom.
    pub solvent: u32,
    /// Lowest harmonic-mean bridge energy seen.
    pub energy: f64,
    /// Snapshots in which this solvent atom formed the bridge.
    pub snaps: u32,
    pub spheres: Vec<AtomSphere>,
}

impl SolventPlacement {
    /// Energy weighted by how often the placement was observed.
    pub fn weighted_energy(&self) -> f64 {
        self.energy * self.snaps as f64
    }
}

/// Trajectory-wide score of one pair or triplet.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalScore {
    /// Bridging events over all snapshots.
    pub score: u32,
    pub snapshots_seen: u32,
    pub energy_sum: f64,
    /// At most one placement per solvent atom.
    pub placements: Vec<SolventPlacement>,
}

impl GlobalScore {
    pub fn mean_energy(&self) -> f64 {
        self.energy_sum / self.score as f64
    }

    /// Placement with the lowest weighted energy; the first one wins ties.
    pub fn best_placement(&self) -> Option<&SolventPlacement> {
        self.placements.iter().fold(None, |best, p| match best {
            Some(b) if b.weighted_energy() <= p.weighted_energy() => Some(b),
            _ => Some(p),
        })
    }
}

/// Placement updates of one merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeCounts {
    pub new_tuples: usize,
    pub new_placements: usize,
    pub improved_placements: usize,
}

/// Pair and triplet scores accumulated over the whole trajectory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreBoard {
    pairs: BTreeMap<PairKey, GlobalScore>,
    triplets: BTreeMap<TripletKey, GlobalScore>,
}

impl ScoreBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pairs(&self) -> &BTreeMap<PairKey, GlobalScore> {
        &self.pairs
    }

    pub fn triplets(&self) -> &BTreeMap<TripletKey, GlobalScore> {
        &self.triplets
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty() && self.triplets.is_empty()
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
        self.triplets.clear();
    }

    #[cfg(test)]
    pub(crate) fn pairs_mut(&mut self) -> &mut BTreeMap<PairKey, GlobalScore> {
        &mut self.pairs
    }

    #[cfg(test)]
    pub(crate) fn triplets_mut(&mut self) -> &mut BTreeMap<TripletKey, GlobalScore> {
        &mut self.triplets
    }

    /// Folds the local scores of one snapshot into the board.
    ///
    /// Every pooled block of the local chains is turned into, or compared
    /// against, the owned placement of its solvent atom and then returned to
    /// `pool`. The local scores are left empty.
    pub fn merge(&mut self, local: &mut LocalScores, pool: &mut SolventBlockPool) -> MergeCounts {
        let mut counts = MergeCounts::default();
        merge_map(&mut self.pairs, &mut local.pairs, pool, &mut counts);
        merge_map(&mut self.triplets, &mut local.triplets, pool, &mut counts);
        local.clear();
        counts
    }
}

fn merge_map<K: Ord>(
    global: &mut BTreeMap<K, GlobalScore>,
    local: &mut BTreeMap<K, LocalScore>,
    pool: &mut SolventBlockPool,
    counts: &mut MergeCounts,
) {
    for (key, local_score) in std::mem::take(local) {
        let score = global.entry(key).or_insert_with(|| {
            counts.new_tuples += 1;
            GlobalScore {
                score: 0,
                snapshots_seen: 0,
                energy_sum: 0.0,
                placements: Vec::new(),
            }
        });
        score.score += local_score.score;
        score.energy_sum += local_score.energy_sum;
        score.snapshots_seen += 1;

        let mut next = local_score.chain;
        while let Some(handle) = next {
            let block = pool.block(handle);
            next = block.chain;

            match score
                .placements
                .iter_mut()
                .find(|p| p.solvent == block.solvent)
            {
                Some(placement) => {
                    placement.snaps += 1;
                    if block.energy < placement.energy {
                        placement.energy = block.energy;
                        placement.spheres.copy_from_slice(pool.spheres(handle));
                        counts.improved_placements += 1;
                    }
                }
                None => {
                    score.placements.push(SolventPlacement {
                        solvent: block.solvent,
                        energy: block.energy,
                        snaps: block.snaps,
                        spheres: pool.spheres(handle).to_vec(),
                    });
                    counts.new_placements += 1;
                }
            }
            pool.release(handle);
        }
    }
}
