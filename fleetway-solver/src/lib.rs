//! Orchestration layer for VRPTW-PD solves.
//!
//! [`Orchestrator`] drives a routing-engine backend through the fixed
//! pipeline: validate the instance, build and close the constraint model,
//! apply route locks, run a single search, and extract the structured
//! solution. [`SolverPool`] runs that pipeline on background workers and
//! hands each result to the caller through a one-way [`SolutionHandle`].

#![forbid(unsafe_code)]

mod dispatch;
mod solver;

pub use dispatch::{SolutionHandle, SolverPool};
pub use solver::Orchestrator;
