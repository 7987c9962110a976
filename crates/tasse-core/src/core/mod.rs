//! Stateless building blocks shared by the engine and the workflows.
//!
//! - [`models`]: atoms, residue classification and the post-processed topology.
//! - [`forcefield`]: hydrogen-bond parameter tables, donor/acceptor definitions,
//!   per-atom charge and radius tables, and the pure energy functions.
//! - [`io`]: PDB structure reading and writing and trajectory snapshot sources.

pub mod forcefield;
pub mod io;
pub mod models;
