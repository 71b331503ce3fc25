//! Core domain types for the fleetway routing stack.
//!
//! This crate defines the routing instance (matrices, time windows, demands,
//! capacities, route locks, pickup-delivery pairs), the structured solution
//! returned to callers, the error taxonomy, and the capability contract a
//! routing-solver backend must satisfy. Instance constructors and
//! [`Instance::validate`] surface malformed input early so downstream
//! components never see an inconsistent problem.

#![forbid(unsafe_code)]

pub mod engine;
mod error;
mod instance;
mod matrix;
mod solution;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::SolveError;
pub use instance::{Instance, InstanceError, NodeIndex, TimeWindow};
pub use matrix::{SquareMatrix, SquareMatrixError};
pub use solution::{Interval, RoutingSolution};
