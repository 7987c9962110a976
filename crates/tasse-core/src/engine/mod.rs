//! # Engine Module
//!
//! The stateful, concurrent hydrogen-bond microset engine.
//!
//! ## Overview
//!
//! For every trajectory snapshot a worker scans all biopolymer/solvent
//! donor-acceptor combinations for hydrogen bonds ("bridges"), groups the bridges
//! of each solvent atom into a microset, expands microsets into pairs and
//! triplets of biopolymer atoms, and merges those into trajectory-wide scores.
//! Only the merge runs under a lock; the scan runs fully in parallel. After the
//! last snapshot the scores yield the final, non-overlapping solvent placements.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Numeric tunables and workflow inputs
//! - **Work Distribution** ([`workers`]) - Pull-based worker pool and cancellation
//! - **Atom Catalog** ([`catalog`]) - Donor/acceptor classification of a topology
//! - **Bridge Detection** ([`bridge`]) - Energy model and per-snapshot scan
//! - **Microsets** ([`microset`]) - Pair/triplet decomposition and local scores
//! - **Placement Pool** ([`solvent_pool`]) - Per-thread block allocator for placements
//! - **Aggregation** ([`scores`]) - Trajectory-wide scores and the merge protocol
//! - **Final Selection** ([`selection`]) - Occurrence filter and overlap culling
//! - **Reports** ([`report`], [`perf`]) - Tuple tables and timing counters
//! - **Engine** ([`hbonds`]) - The [`hbonds::HBondEngine`] tying the above together
//! - **Progress Monitoring** ([`progress`]) and **Error Handling** ([`error`])

pub mod bridge;
pub mod catalog;
pub mod config;
pub mod error;
pub mod hbonds;
pub mod microset;
pub mod perf;
pub mod progress;
pub mod report;
pub mod scores;
pub mod selection;
pub mod solvent_pool;
pub mod workers;
