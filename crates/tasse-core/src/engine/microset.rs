use super::bridge::Bridge;
use super::catalog::AtomCatalog;
use super::error::EngineError;
use super::solvent_pool::{BlockHandle, SolventBlockPool};
use crate::core::models::atom::AtomSphere;
use itertools::Itertools;
use nalgebra::Point3;
use std::collections::BTreeMap;

/// Two biopolymer atoms bridged by one solvent atom, in microset order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey(pub u32, pub u32);

/// Three biopolymer atoms bridged by one solvent atom, in microset order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TripletKey(pub u32, pub u32, pub u32);

/// `n / Σ(1/eᵢ)`. Every energy must be non-zero and share one sign.
pub fn harmonic_mean(energies: &[f64]) -> f64 {
    let inverse_sum: f64 = energies.iter().map(|e| 1.0 / e).sum();
    energies.len() as f64 / inverse_sum
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tuple {
    Pair(PairKey, f64),
    Triplet(TripletKey, f64),
}

/// Splits sorted bridges into runs sharing one solvent atom.
pub fn microsets(bridges: &[Bridge]) -> impl Iterator<Item = &[Bridge]> {
    bridges.chunk_by(|a, b| a.solvent == b.solvent)
}

/// Expands one microset into its pairs and triplets.
///
/// Two bridges give one pair, three give one triplet and larger microsets
/// give every 3-combination as a triplet. Smaller ones give nothing.
pub fn decompose(microset: &[Bridge], out: &mut Vec<Tuple>) {
    match microset {
        [] | [_] => {}
        [a, b] => out.push(Tuple::Pair(
            PairKey(a.biopolymer, b.biopolymer),
            harmonic_mean(&[a.energy, b.energy]),
        )),
        _ => out.extend(microset.iter().tuple_combinations().map(
            |(a, b, c): (&Bridge, &Bridge, &Bridge)| {
                Tuple::Triplet(
                    TripletKey(a.biopolymer, b.biopolymer, c.biopolymer),
                    harmonic_mean(&[a.energy, b.energy, c.energy]),
                )
            },
        )),
    }
}

/// Per-snapshot accumulation for one pair or triplet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalScore {
    pub score: u32,
    pub energy_sum: f64,
    /// Head of the chain of pooled placements recorded for this tuple.
    pub chain: Option<BlockHandle>,
}

impl LocalScore {
    fn empty() -> Self {
        Self {
            score: 0,
            energy_sum: 0.0,
            chain: None,
        }
    }

    fn record(&mut self, energy: f64, block: BlockHandle, pool: &mut SolventBlockPool) {
        self.score += 1;
        self.energy_sum += energy;
        pool.block_mut(block).chain = self.chain;
        self.chain = Some(block);
    }
}

/// Counts of one microset pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MicrosetCounts {
    pub microsets: usize,
    pub pairs: usize,
    pub triplets: usize,
}

/// Thread-local pair and triplet scores of the snapshot being processed.
#[derive(Debug, Clone, Default)]
pub struct LocalScores {
    pub(crate) pairs: BTreeMap<PairKey, LocalScore>,
    pub(crate) triplets: BTreeMap<TripletKey, LocalScore>,
    tuples: Vec<Tuple>,
}

impl LocalScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pairs(&self) -> &BTreeMap<PairKey, LocalScore> {
        &self.pairs
    }

    pub fn triplets(&self) -> &BTreeMap<TripletKey, LocalScore> {
        &self.triplets
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty() && self.triplets.is_empty()
    }

    /// Forgets every score without touching the pool. Only valid once the
    /// chains were handed back to the pool.
    pub fn clear(&mut self) {
        self.pairs.clear();
        self.triplets.clear();
        self.tuples.clear();
    }

    /// Decomposes the sorted bridges of one snapshot into pairs and triplets
    /// and records a pooled placement of the bridging solvent residue for
    /// every tuple.
    pub fn collect(
        &mut self,
        bridges: &[Bridge],
        catalog: &AtomCatalog,
        coords: &[Point3<f64>],
        pool: &mut SolventBlockPool,
    ) -> Result<MicrosetCounts, EngineError> {
        let mut counts = MicrosetCounts::default();

        for microset in microsets(bridges) {
            if microset.len() < 2 {
                continue;
            }
            counts.microsets += 1;
            let solvent = microset[0].solvent;

            self.tuples.clear();
            decompose(microset, &mut self.tuples);

            for tuple in &self.tuples {
                let (score, energy) = match *tuple {
                    Tuple::Pair(key, energy) => {
                        counts.pairs += 1;
                        (self.pairs.entry(key).or_insert_with(LocalScore::empty), energy)
                    }
                    Tuple::Triplet(key, energy) => {
                        counts.triplets += 1;
                        (
                            self.triplets.entry(key).or_insert_with(LocalScore::empty),
                            energy,
                        )
                    }
                };
                let block = pool.grab(solvent, energy)?;
                fill_spheres(pool.spheres_mut(block), solvent, catalog, coords)?;
                score.record(energy, block, pool);
            }
        }
        Ok(counts)
    }
}

/// Copies the positions and radii of the residue owning `solvent`.
fn fill_spheres(
    spheres: &mut [AtomSphere],
    solvent: u32,
    catalog: &AtomCatalog,
    coords: &[Point3<f64>],
) -> Result<(), EngineError> {
    let span = catalog.span(solvent);
    if span.len as usize != spheres.len() {
        return Err(EngineError::SolventSize {
            expected: spheres.len(),
            found: span.len as usize,
        });
    }
    for (slot, atom) in spheres.iter_mut().zip(span.indices()) {
        *slot = AtomSphere::new(coords[atom], catalog.radius(atom as u32));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn bridge(solvent: u32, biopolymer: u32, energy: f64) -> Bridge {
        Bridge {
            solvent,
            biopolymer,
            energy,
        }
    }

    fn microset(n: u32) -> Vec<Bridge> {
        (0..n).map(|i| bridge(100, i, -1.0 - i as f64)).collect()
    }

    fn binomial(n: usize, k: usize) -> usize {
        (0..k).fold(1, |acc, i| acc * (n - i) / (i + 1))
    }

    #[test]
    fn harmonic_mean_of_two_bridges() {
        let mean = harmonic_mean(&[-2.0, -4.0]);
        assert!((mean - -8.0 / 3.0).abs() < TOLERANCE);
    }

    #[test]
    fn small_microsets_emit_nothing() {
        let mut out = Vec::new();
        decompose(&microset(0), &mut out);
        decompose(&microset(1), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn two_bridges_emit_one_pair() {
        let mut out = Vec::new();
        decompose(&[bridge(5, 1, -2.0), bridge(5, 3, -4.0)], &mut out);
        assert_eq!(out.len(), 1);
        let Tuple::Pair(key, energy) = out[0] else {
            panic!("expected a pair, got {:?}", out[0]);
        };
        assert_eq!(key, PairKey(1, 3));
        assert!((energy - -2.666_666_666_666_666_5).abs() < TOLERANCE);
    }

    #[test]
    fn three_bridges_emit_one_triplet() {
        let mut out = Vec::new();
        decompose(&microset(3), &mut out);
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Tuple::Triplet(TripletKey(0, 1, 2), _)));
    }

    #[test]
    fn larger_microsets_emit_every_three_combination() {
        for n in 4..=7 {
            let mut out = Vec::new();
            decompose(&microset(n), &mut out);
            assert_eq!(out.len(), binomial(n as usize, 3), "microset of {n}");
            assert!(out.iter().all(|t| matches!(t, Tuple::Triplet(..))));
        }

        let mut out = Vec::new();
        decompose(&microset(4), &mut out);
        let keys: Vec<TripletKey> = out
            .iter()
            .map(|t| match t {
                Tuple::Triplet(key, _) => *key,
                Tuple::Pair(..) => unreachable!(),
            })
            .collect();
        assert_eq!(
            keys,
            vec![
                TripletKey(0, 1, 2),
                TripletKey(0, 1, 3),
                TripletKey(0, 2, 3),
                TripletKey(1, 2, 3)
            ]
        );
    }

    #[test]
    fn microsets_split_on_solvent_index() {
        let bridges = vec![
            bridge(0, 1, -1.0),
            bridge(0, 2, -1.0),
            bridge(4, 1, -1.0),
            bridge(9, 2, -1.0),
            bridge(9, 3, -1.0),
            bridge(9, 5, -1.0),
        ];
        let sizes: Vec<usize> = microsets(&bridges).map(<[Bridge]>::len).collect();
        assert_eq!(sizes, vec![2, 1, 3]);
    }

    #[test]
    fn pair_and_triplet_keys_order_lexicographically() {
        assert!(PairKey(1, 9) < PairKey(2, 0));
        assert!(PairKey(1, 2) < PairKey(1, 3));
        assert!(TripletKey(1, 2, 9) < TripletKey(1, 3, 0));
        assert!(TripletKey(0, 5, 5) < TripletKey(1, 0, 0));
    }
}
