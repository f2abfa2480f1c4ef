//! A finite-domain constraint propagation engine.
//!
//! The crate is organized around a [`Solver`](solver::Solver) that owns all
//! variables and constraints:
//!
//! - [`backtrack`] provides the trail on which every reversible change is
//!   recorded, and the [`Backtrack`](backtrack::Backtrack) trait used to
//!   save and restore complete search states.
//! - [`core`] defines the numeric domain ([`IntCst`](core::IntCst),
//!   saturating arithmetic) and the propagation state: integer variables
//!   with bound events, reversible primitives (cells, switches, bit-sets),
//!   demons and the two-level propagation queue.
//! - [`sched`] defines interval variables (fixed or variable duration,
//!   optional or performed, plus storage-free views) and sequence
//!   variables.
//! - [`constraints`] is the propagator library: tree-structured sums,
//!   min/max, boolean aggregates, boolean scalar products, cumulative and
//!   non-overlapping rectangles.
//! - [`assignment`] snapshots variable domains and (de)serializes them.

pub mod assignment;
pub mod backtrack;
pub mod collections;
pub mod constraints;
pub mod core;
pub mod model_cache;
pub mod params;
pub mod sched;
pub mod solver;

pub use crate::core::{Failure, IntCst, SolverResult, INT_CST_MAX, INT_CST_MIN};
pub use solver::Solver;
