//! # Force Field Module
//!
//! Hydrogen bond energy terms and the parameter tables they consume.
//!
//! ## Key Components
//!
//! - [`params`] - `(Rmin, Em)` tables keyed by hydrogen/acceptor codes, donor and
//!   acceptor definitions, solvent aliases, and per-atom charge and radius tables
//! - [`potentials`] - Reaction-field electrostatics, the flat-bottomed 12-6
//!   hydrogen bond term and its angular modulation

pub mod params;
pub mod potentials;
