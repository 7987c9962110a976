//! Provides input/output functionality for structures and trajectories.
//!
//! Topologies and snapshot coordinates are read from fixed-column PDB files
//! through the [`traits::StructureFile`] interface. Trajectories are exposed to
//! the engine as random-access [`trajectory::SnapshotSource`]s so that worker
//! threads can load snapshots independently.

pub mod pdb;
pub mod traits;
pub mod trajectory;
