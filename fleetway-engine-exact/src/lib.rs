//! Exhaustive-search routing backend for small instances.
//!
//! [`ExactEngine`] implements the `fleetway-core` engine capability contract
//! with a depth-first branch-and-bound over per-vehicle route extensions.
//! Every node is mandatory; dimensions propagate generically through the
//! cumul/transit/slack recurrence; route locks become forced prefixes; the
//! search keeps the cheapest feasible assignment.
//!
//! The backend enumerates route permutations, so it is intended for
//! instances of roughly a dozen nodes: integration suites, reference runs,
//! and debugging of the orchestration layer. Transit and cost evaluators
//! must be non-negative; branch-and-bound pruning relies on costs never
//! decreasing along a partial assignment.

#![forbid(unsafe_code)]

mod model;
mod search;

pub use model::{ExactEngine, ExactModel};
pub use search::ExactAssignment;
