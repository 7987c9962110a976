use super::bridge::{Bridge, BridgeDetector, sort_bridges};
use super::catalog::AtomCatalog;
use super::config::{ConfigError, EngineConfig};
use super::error::EngineError;
use super::microset::LocalScores;
use super::perf::{PerformanceCounters, PerformanceReport};
use super::report::TupleReport;
use super::scores::ScoreBoard;
use super::selection::{FinalSelection, select_final_solvent};
use super::solvent_pool::{POOL_PREALLOCATION, SolventBlockPool};
use super::workers::{CancelToken, MAX_THREADS};
use crate::core::forcefield::params::HBondForcefield;
use crate::core::models::topology::Topology;
use nalgebra::Point3;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info, instrument, trace, warn};

const BRIDGE_CAPACITY: usize = 1024;

/// Scratch state owned by one worker thread.
#[derive(Debug, Default)]
struct ThreadLocal {
    bridges: Vec<Bridge>,
    pool: SolventBlockPool,
    scores: LocalScores,
}

impl ThreadLocal {
    fn new(stride: usize) -> Result<Self, EngineError> {
        Ok(Self {
            bridges: Vec::with_capacity(BRIDGE_CAPACITY),
            pool: SolventBlockPool::with_capacity(stride, POOL_PREALLOCATION)?,
            scores: LocalScores::new(),
        })
    }

    /// Returns every pooled block and forgets the local scores.
    fn reset(&mut self) {
        self.bridges.clear();
        self.scores.clear();
        self.pool.reset();
    }
}

/// State shared by all workers, only touched inside the merge section.
#[derive(Debug, Default)]
struct SharedState {
    board: ScoreBoard,
    perf: PerformanceCounters,
    merged: u32,
}

/// Counts produced by one [`HBondEngine::calc_microsets`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotStats {
    pub bridges: usize,
    pub microsets: usize,
    pub pairs: usize,
    pub triplets: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The hydrogen-bond microset engine.
///
/// Lifecycle: [`initialize`](Self::initialize), [`setup`](Self::setup) and
/// [`build_atom_lists`](Self::build_atom_lists) in either order, then any
/// number of concurrent [`calc_microsets`](Self::calc_microsets) calls, one
/// per snapshot, followed by the final selection and reports.
pub struct HBondEngine {
    config: EngineConfig,
    forcefield: HBondForcefield,
    detector: BridgeDetector,
    catalog: Option<AtomCatalog>,
    locals: Vec<Mutex<ThreadLocal>>,
    shared: Mutex<SharedState>,
    cancel: CancelToken,
}

impl HBondEngine {
    pub fn initialize(config: EngineConfig, forcefield: HBondForcefield) -> Self {
        let detector = BridgeDetector::new(&config, forcefield.table.clone());
        let field = detector.model().reaction_field();
        info!(
            donors = forcefield.donors.len(),
            acceptors = forcefield.acceptors.len(),
            h_codes = forcefield.table.h_code_count(),
            y_codes = forcefield.table.y_code_count(),
            "Hydrogen bond parameters loaded."
        );
        debug!(
            crf_a = field.crf_a,
            crf_b = field.crf_b,
            cutoff = field.cutoff_sq.sqrt(),
            "Reaction field constants."
        );
        Self {
            config,
            forcefield,
            detector,
            catalog: None,
            locals: Vec::new(),
            shared: Mutex::new(SharedState::default()),
            cancel: CancelToken::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> Option<&AtomCatalog> {
        self.catalog.as_ref()
    }

    pub fn threads(&self) -> usize {
        self.locals.len()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Shares `token` with the engine so a caller holding a clone can stop a
    /// run in progress. Later [`setup`](Self::setup) and [`clear`](Self::clear)
    /// calls reset it.
    pub fn adopt_cancel_token(&mut self, token: CancelToken) {
        self.cancel = token;
    }

    fn stride(&self) -> usize {
        self.catalog.as_ref().map_or(0, AtomCatalog::solvent_size)
    }

    /// Allocates the per-thread state and clears every accumulated score.
    #[instrument(skip_all, name = "hbond_setup", fields(threads = threads))]
    pub fn setup(&mut self, threads: usize) -> Result<(), EngineError> {
        if threads == 0 || threads > MAX_THREADS {
            return Err(ConfigError::OutOfRange {
                name: "threads",
                value: threads as f64,
                expected: "1..=32",
            }
            .into());
        }
        let stride = self.stride();
        self.locals.truncate(threads);
        for local in &mut self.locals {
            let local = local.get_mut().unwrap_or_else(PoisonError::into_inner);
            if local.pool.stride() == stride {
                local.reset();
            } else {
                *local = ThreadLocal::new(stride)?;
            }
        }
        while self.locals.len() < threads {
            self.locals.push(Mutex::new(ThreadLocal::new(stride)?));
        }

        *self.shared.get_mut().unwrap_or_else(PoisonError::into_inner) = SharedState::default();
        self.cancel.reset();
        debug!(threads, stride, "Hydrogen bond engine set up.");
        Ok(())
    }

    /// Classifies the donors and acceptors of `topology`.
    ///
    /// Thread pools set up earlier are rebuilt when the solvent size changes,
    /// and accumulated scores are dropped since their placements no longer
    /// fit the new solvent.
    #[instrument(skip_all, name = "build_atom_lists")]
    pub fn build_atom_lists(&mut self, topology: &Topology) -> Result<(), EngineError> {
        let previous = self.stride();
        let catalog = AtomCatalog::build(topology, &self.forcefield, self.config.group_bonds);
        if catalog.solvent().is_empty() {
            warn!("No solvent donors or acceptors matched, no bridges can form.");
        }
        if catalog.biopolymer().is_empty() {
            warn!("No biopolymer donors or acceptors matched, no bridges can form.");
        }
        let stride = catalog.solvent_size();
        self.catalog = Some(catalog);

        if previous != stride {
            let shared = self.shared.get_mut().unwrap_or_else(PoisonError::into_inner);
            if !shared.board.is_empty() {
                warn!(previous, stride, "Solvent size changed, discarding accumulated scores.");
            }
            *shared = SharedState::default();
        }

        for local in &mut self.locals {
            let local = local.get_mut().unwrap_or_else(PoisonError::into_inner);
            if local.pool.stride() != stride {
                *local = ThreadLocal::new(stride)?;
            }
        }
        Ok(())
    }

    /// Releases all pooled storage and accumulated scores. Thread slots are
    /// kept and their pools regrow on demand.
    pub fn clear(&mut self) {
        let stride = self.stride();
        for local in &mut self.locals {
            let local = local.get_mut().unwrap_or_else(PoisonError::into_inner);
            local.bridges.clear();
            local.scores.clear();
            local.pool.clear(stride);
        }
        *self.shared.get_mut().unwrap_or_else(PoisonError::into_inner) = SharedState::default();
        self.cancel.reset();
    }

    /// Detects the bridges of one snapshot, decomposes them into pairs and
    /// triplets and merges those into the trajectory-wide scores.
    ///
    /// Safe to call concurrently as long as every caller uses its own
    /// `thread_id`; only the final merge is serialized.
    pub fn calc_microsets(
        &self,
        thread_id: usize,
        snapshot: usize,
        coords: &[Point3<f64>],
    ) -> Result<SnapshotStats, EngineError> {
        let catalog = self.catalog.as_ref().ok_or(EngineError::NotReady {
            operation: "calc_microsets",
            requirement: "build_atom_lists",
        })?;
        if coords.len() != catalog.atom_count() {
            return Err(EngineError::Snapshot {
                index: snapshot,
                message: format!(
                    "expected {} coordinates, found {}",
                    catalog.atom_count(),
                    coords.len()
                ),
            });
        }
        let slot = self.locals.get(thread_id).ok_or(EngineError::InvalidThread {
            thread_id,
            threads: self.locals.len(),
        })?;
        let mut guard = lock(slot);
        let local = &mut *guard;

        let start = Instant::now();
        let counts = self
            .detector
            .scan(catalog, coords, &self.cancel, &mut local.bridges);
        sort_bridges(&mut local.bridges);
        let scanned = Instant::now();

        let tuples = local
            .scores
            .collect(&local.bridges, catalog, coords, &mut local.pool)?;

        let merge_counts = {
            let mut shared = lock(&self.shared);
            let merge_counts = shared.board.merge(&mut local.scores, &mut local.pool);
            let finished = Instant::now();
            if tuples.pairs > 0 || tuples.triplets > 0 {
                shared.perf.update(
                    scanned - start,
                    finished - scanned,
                    finished - start,
                );
            }
            shared.merged += 1;
            merge_counts
        };

        trace!(
            snapshot,
            thread_id,
            bridges = local.bridges.len(),
            biopolymer_donors = counts.biopolymer_donors,
            solvent_donors = counts.solvent_donors,
            pairs = tuples.pairs,
            triplets = tuples.triplets,
            new_tuples = merge_counts.new_tuples,
            "Snapshot merged."
        );
        Ok(SnapshotStats {
            bridges: local.bridges.len(),
            microsets: tuples.microsets,
            pairs: tuples.pairs,
            triplets: tuples.triplets,
        })
    }

    /// Number of snapshots merged since the last setup or clear.
    pub fn merged_snapshots(&self) -> u32 {
        lock(&self.shared).merged
    }

    /// Copy of the current trajectory-wide scores.
    pub fn score_board(&self) -> ScoreBoard {
        lock(&self.shared).board.clone()
    }

    /// Selects the final solvent placements and writes them into `topology`.
    #[instrument(skip_all, name = "build_final_solvent", fields(total_snapshots = total_snapshots))]
    pub fn build_final_solvent(
        &self,
        total_snapshots: u32,
        topology: &mut Topology,
    ) -> Result<FinalSelection, EngineError> {
        let shared = lock(&self.shared);
        select_final_solvent(
            &shared.board,
            total_snapshots,
            self.config.occurrence_cutoff,
            self.config.culls_overlaps(),
            topology,
        )
    }

    /// Writes the occurrence histogram and the ranked pair and triplet tables.
    #[instrument(skip_all, name = "print_final_tuples")]
    pub fn print_final_tuples(
        &self,
        total_snapshots: u32,
        path: &Path,
        topology: &Topology,
    ) -> Result<TupleReport, EngineError> {
        let catalog = self.catalog.as_ref().ok_or(EngineError::NotReady {
            operation: "print_final_tuples",
            requirement: "build_atom_lists",
        })?;
        let report = {
            let shared = lock(&self.shared);
            TupleReport::build(&shared.board, total_snapshots, self.config.occurrence_cutoff)
        };

        info!(path = %path.display(), "Writing tuple report.");
        let output_error = |source| EngineError::Output {
            path: path.display().to_string(),
            source,
        };
        let mut writer = BufWriter::new(File::create(path).map_err(output_error)?);
        report
            .write(&mut writer, &self.config, topology, catalog)
            .map_err(output_error)?;
        writer.flush().map_err(output_error)?;
        Ok(report)
    }

    pub fn print_performance_counters(&self) -> PerformanceReport {
        let report = lock(&self.shared).perf.report();
        report.log();
        report
    }
}
