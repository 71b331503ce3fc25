//! The structured result of a successful solve.

use crate::NodeIndex;

/// Solved arrival-time range at one stop.
///
/// The search may pin the arrival to a single instant (`min == max`) or
/// leave a feasible range; both are represented identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Interval {
    /// Earliest solved arrival.
    pub min: i64,
    /// Latest solved arrival.
    pub max: i64,
}

/// Per-vehicle routes, arrival intervals and arc-cost breakdown.
///
/// `routes[v]` and `times[v]` are parallel: entry `k` of each describes the
/// `k`-th customer visited by vehicle `v`, with the depot start and end
/// excluded. `cost_details[v]` is edge-indexed instead: it records every arc
/// the vehicle traverses, including the final return to the depot, so a
/// vehicle visiting `k` customers has `k` route entries and `k + 1` arc
/// costs, and an unused vehicle has an empty route and the single
/// depot-to-depot arc cost.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoutingSolution {
    /// Objective value reported by the engine.
    pub cost: i64,
    /// Visited customers per vehicle, in travel order.
    pub routes: Vec<Vec<NodeIndex>>,
    /// Solved arrival interval per visited customer, parallel to
    /// [`Self::routes`].
    pub times: Vec<Vec<Interval>>,
    /// Cost of each traversed arc per vehicle, in travel order.
    pub cost_details: Vec<Vec<i64>>,
}
