//! # TASSE Core Library
//!
//! Extraction of tightly associated solvent molecules and hydrogen-bond networks
//! from molecular dynamics trajectories.
//!
//! Given a biopolymer topology and a sequence of coordinate snapshots, the library
//! finds the solvent molecules that repeatedly bridge specific donor/acceptor atom
//! pairs or triplets, scores those bridges by occurrence and bonding energy across
//! the whole trajectory, and selects a final, non-overlapping set of representative
//! solvent placements.
//!
//! ## Architectural Philosophy
//!
//! The library keeps the same three-layer split used across the project:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Atom`, `Topology`),
//!   the hydrogen-bond force-field math (`potentials`, parameter tables) and the
//!   PDB and trajectory readers.
//!
//! - **[`engine`]: The Logic Core.** The stateful, concurrent processing engine.
//!   It owns the pull-based `WorkerPool`, the per-thread bridge detection and
//!   microset decomposition, the pooled solvent placement storage and the
//!   trajectory-wide score maps merged under a single critical section.
//!
//! - **[`workflows`]: The Public API.** Ties `core` and `engine` together into the
//!   complete extraction procedure: load, scan every snapshot, select the final
//!   solvent set and write the reports.

pub mod core;
pub mod engine;
pub mod workflows;
