use thiserror::Error;

use super::config::ConfigError;
use crate::core::forcefield::params::ParamLoadError;
use crate::core::io::pdb::PdbError;
use crate::core::io::trajectory::TrajectoryError;
use crate::core::models::topology::TopologyError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Failed to load parameters: {source}")]
    Params {
        #[from]
        source: ParamLoadError,
    },

    #[error("Invalid topology: {source}")]
    Topology {
        #[from]
        source: TopologyError,
    },

    #[error("Failed to read structure: {source}")]
    Pdb {
        #[from]
        source: PdbError,
    },

    #[error("Failed to open trajectory: {source}")]
    Trajectory {
        #[from]
        source: TrajectoryError,
    },

    #[error("Failed to allocate {requested} solvent blocks")]
    PoolExhausted { requested: usize },

    #[error("Solvent residue has {found} atoms, placement pool expects {expected}")]
    SolventSize { expected: usize, found: usize },

    #[error("Thread {thread_id} is not set up (engine has {threads} threads)")]
    InvalidThread { thread_id: usize, threads: usize },

    #[error("Snapshot {index} failed: {message}")]
    Snapshot { index: usize, message: String },

    #[error("Operation '{operation}' requires {requirement}")]
    NotReady {
        operation: &'static str,
        requirement: &'static str,
    },

    #[error("Failed to write '{path}': {source}")]
    Output {
        path: String,
        source: std::io::Error,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
