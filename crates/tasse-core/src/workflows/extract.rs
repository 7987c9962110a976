use crate::core::forcefield::params::{AtomTables, HBondForcefield};
use crate::core::io::pdb::{PdbError, PdbFile};
use crate::core::io::traits::StructureFile;
use crate::core::io::trajectory::{PdbListTrajectory, SnapshotSource};
use crate::core::models::topology::{SolventNaming, Topology};
use crate::engine::config::ExtractConfig;
use crate::engine::error::EngineError;
use crate::engine::hbonds::HBondEngine;
use crate::engine::perf::PerformanceReport;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::report::TupleReport;
use crate::engine::selection::FinalSelection;
use crate::engine::workers::{CancelToken, WorkerPool, resolve_thread_count};
use nalgebra::Point3;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Outcome of one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractSummary {
    /// Snapshots listed in the trajectory after skipping.
    pub snapshots: usize,
    /// Snapshots merged into the scores.
    pub processed: usize,
    pub cancelled: bool,
    /// `None` when no snapshot was processed.
    pub selection: Option<FinalSelection>,
    pub report: Option<TupleReport>,
    pub performance: PerformanceReport,
    pub elapsed: Duration,
}

/// Runs a complete extraction.
///
/// Cancelling `cancel` from another thread stops the snapshot phase; the
/// summary then reports zero processed snapshots and nothing is written.
#[instrument(skip_all, name = "extract_workflow")]
pub fn run(
    config: &ExtractConfig,
    reporter: &ProgressReporter,
    cancel: &CancelToken,
) -> Result<ExtractSummary, EngineError> {
    let start = Instant::now();

    // === Phase 0: Load topology and parameters ===
    reporter.report(Progress::PhaseStart { name: "Preparation" });
    info!(
        topology = %config.topology_path.display(),
        params = %config.hbond_params_path.display(),
        "Loading topology and parameters."
    );

    let forcefield = HBondForcefield::load(&config.hbond_params_path)?;
    let naming = SolventNaming::new(&config.solvent_name).with_aliases(&forcefield.solvent_aliases);
    let mut topology = load_topology(config, &naming)?;

    let tables = AtomTables::load(config.charges_path.as_deref(), config.radii_path.as_deref())?;
    let missing = topology.assign_parameters(
        &tables,
        config.engine.vdw_tolerance,
        config.engine.assigns_charges(),
    );
    if missing.missing_radii > 0 || missing.missing_charges > 0 {
        warn!(
            missing_radii = missing.missing_radii,
            missing_charges = missing.missing_charges,
            "Some atom parameters could not be assigned."
        );
    }

    let threads = resolve_thread_count(config.threads);
    let pool = WorkerPool::new(threads);
    let mut engine = HBondEngine::initialize(config.engine.clone(), forcefield);
    engine.setup(pool.threads())?;
    engine.build_atom_lists(&topology)?;
    engine.adopt_cancel_token(cancel.clone());

    let trajectory =
        PdbListTrajectory::open(&config.trajectory_path, config.first_snapshot, topology.len())?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Scan every snapshot ===
    reporter.report(Progress::PhaseStart { name: "Snapshots" });
    let processed = process_trajectory(&engine, &trajectory, &pool, reporter)?;
    let cancelled = engine.cancel_token().is_cancelled();
    reporter.report(Progress::PhaseFinish);

    if processed == 0 {
        warn!(
            snapshots = trajectory.len(),
            cancelled, "No snapshots processed, nothing to write."
        );
        return Ok(ExtractSummary {
            snapshots: trajectory.len(),
            processed,
            cancelled,
            selection: None,
            report: None,
            performance: engine.print_performance_counters(),
            elapsed: start.elapsed(),
        });
    }

    // === Phase 2: Final solvent selection and outputs ===
    reporter.report(Progress::PhaseStart { name: "Final selection" });
    let total = processed as u32;
    let selection = engine.build_final_solvent(total, &mut topology)?;

    info!(path = %config.output_path.display(), "Writing post-processed structure.");
    PdbFile::write_to_path(&topology, &config.output_path).map_err(|e| EngineError::Output {
        path: config.output_path.display().to_string(),
        source: match e {
            PdbError::Io(source) => source,
            other => std::io::Error::other(other),
        },
    })?;

    let report = config
        .report_path
        .as_deref()
        .map(|path| engine.print_final_tuples(total, path, &topology))
        .transpose()?;
    let performance = engine.print_performance_counters();
    reporter.report(Progress::PhaseFinish);

    info!(
        processed,
        retained = selection.retained_count(),
        culled = selection.culled,
        elapsed_s = start.elapsed().as_secs_f64(),
        "Extraction finished."
    );
    Ok(ExtractSummary {
        snapshots: trajectory.len(),
        processed,
        cancelled,
        selection: Some(selection),
        report,
        performance,
        elapsed: start.elapsed(),
    })
}

fn load_topology(config: &ExtractConfig, naming: &SolventNaming) -> Result<Topology, EngineError> {
    let raw = PdbFile::read_from_path(&config.topology_path)?;
    let mut topology = Topology::from_atoms(raw.atoms, raw.coords, naming)?;
    topology.set_remarks(raw.remarks);
    info!(
        atoms = topology.len(),
        solvent_residues = topology.solvent_residue_count(),
        solvent_size = topology.solvent_size(),
        "Topology loaded."
    );
    Ok(topology)
}

/// Runs every snapshot of `source` through the engine on `pool`.
///
/// Each worker loads snapshots into its own coordinate buffer. Returns the
/// number of merged snapshots, or zero when the run was cancelled.
pub fn process_trajectory(
    engine: &HBondEngine,
    source: &dyn SnapshotSource,
    pool: &WorkerPool,
    reporter: &ProgressReporter,
) -> Result<usize, EngineError> {
    if engine.threads() < pool.threads() {
        return Err(EngineError::Internal(format!(
            "worker pool has {} threads but the engine was set up for {}",
            pool.threads(),
            engine.threads()
        )));
    }
    let buffers: Vec<Mutex<Vec<Point3<f64>>>> =
        (0..pool.threads()).map(|_| Mutex::new(Vec::new())).collect();
    let cancel = engine.cancel_token();

    let summary = pool.run(source.len(), &cancel, reporter, |thread_id, index| {
        let mut coords = buffers[thread_id]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        source
            .load(index, &mut coords)
            .map_err(|e| EngineError::Snapshot {
                index,
                message: e.to_string(),
            })?;
        engine.calc_microsets(thread_id, index, &coords)?;
        Ok::<(), EngineError>(())
    })?;

    info!(
        completed = summary.completed,
        elapsed_s = summary.elapsed.as_secs_f64(),
        "Trajectory processed."
    );
    if summary.cancelled {
        warn!(completed = summary.completed, "Trajectory processing cancelled.");
        return Ok(0);
    }
    Ok(summary.completed)
}
