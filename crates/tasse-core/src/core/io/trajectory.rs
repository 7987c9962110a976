use super::pdb::{PdbError, PdbFile};
use super::traits::StructureFile;
use nalgebra::Point3;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TrajectoryError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to read snapshot '{path}': {source}")]
    Pdb { path: String, source: PdbError },
    #[error("Snapshot {index} is out of range (trajectory has {len} snapshots)")]
    OutOfRange { index: usize, len: usize },
    #[error("Snapshot {index} has {found} atoms, expected {expected}")]
    AtomCount {
        index: usize,
        expected: usize,
        found: usize,
    },
}

/// Random-access source of coordinate snapshots aligned with one topology.
///
/// Snapshots are loaded concurrently from worker threads, each into its own
/// reusable buffer.
pub trait SnapshotSource: Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loads snapshot `index` into `out`, replacing its contents.
    fn load(&self, index: usize, out: &mut Vec<Point3<f64>>) -> Result<(), TrajectoryError>;
}

/// Trajectory described by a text file listing one PDB snapshot per line.
///
/// Paths are resolved relative to the list file's directory. Blank lines are
/// ignored and the first `first_snapshot` entries are skipped.
#[derive(Debug, Clone)]
pub struct PdbListTrajectory {
    entries: Vec<PathBuf>,
    atom_count: usize,
}

impl PdbListTrajectory {
    pub fn open(list_path: &Path, first_snapshot: usize, atom_count: usize) -> Result<Self, TrajectoryError> {
        let content = std::fs::read_to_string(list_path).map_err(|e| TrajectoryError::Io {
            path: list_path.to_string_lossy().to_string(),
            source: e,
        })?;
        let base = list_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let entries: Vec<PathBuf> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .skip(first_snapshot)
            .map(|line| base.join(line))
            .collect();

        debug!(
            list = %list_path.display(),
            snapshots = entries.len(),
            skipped = first_snapshot,
            "Trajectory list parsed."
        );
        Ok(Self {
            entries,
            atom_count,
        })
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }
}

impl SnapshotSource for PdbListTrajectory {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn load(&self, index: usize, out: &mut Vec<Point3<f64>>) -> Result<(), TrajectoryError> {
        let path = self.entries.get(index).ok_or(TrajectoryError::OutOfRange {
            index,
            len: self.entries.len(),
        })?;
        PdbFile::read_coordinates_from_path(path, self.atom_count, out).map_err(|e| {
            TrajectoryError::Pdb {
                path: path.to_string_lossy().to_string(),
                source: e,
            }
        })
    }
}

/// Snapshots held in memory, mostly useful for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTrajectory {
    frames: Vec<Vec<Point3<f64>>>,
    atom_count: usize,
}

impl InMemoryTrajectory {
    pub fn new(atom_count: usize) -> Self {
        Self {
            frames: Vec::new(),
            atom_count,
        }
    }

    pub fn push(&mut self, frame: Vec<Point3<f64>>) {
        self.frames.push(frame);
    }
}

impl SnapshotSource for InMemoryTrajectory {
    fn len(&self) -> usize {
        self.frames.len()
    }

    fn load(&self, index: usize, out: &mut Vec<Point3<f64>>) -> Result<(), TrajectoryError> {
        let frame = self.frames.get(index).ok_or(TrajectoryError::OutOfRange {
            index,
            len: self.frames.len(),
        })?;
        if frame.len() != self.atom_count {
            return Err(TrajectoryError::AtomCount {
                index,
                expected: self.atom_count,
                found: frame.len(),
            });
        }
        out.clear();
        out.extend_from_slice(frame);
        Ok(())
    }
}
