//! Facade crate for the Fleetway routing solver.
//!
//! This crate re-exports the core domain types and the orchestration layer,
//! and exposes the exact reference backend behind a feature flag.

#![forbid(unsafe_code)]

pub use fleetway_core::{
    Instance, InstanceError, Interval, NodeIndex, RoutingSolution, SolveError, SquareMatrix,
    SquareMatrixError, TimeWindow, engine,
};
pub use fleetway_solver::{Orchestrator, SolutionHandle, SolverPool};

#[cfg(feature = "engine-exact")]
pub use fleetway_engine_exact::ExactEngine;
