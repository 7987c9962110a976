//! # Workflows Module
//!
//! High-level entry points that run a complete solvent extraction.
//!
//! ## Overview
//!
//! A workflow owns the whole pipeline: it loads the topology, the atom tables and
//! the hydrogen bond parameters, prepares the [`HBondEngine`](crate::engine::hbonds::HBondEngine),
//! drives every trajectory snapshot through it on a worker pool and finally
//! writes the post-processed structure and the tuple report.
//!
//! ## Architecture
//!
//! - **Extraction Workflow** ([`extract`]) - Load, scan the trajectory in
//!   parallel, select the final solvent placements and write the outputs.

pub mod extract;
