//! Test-only instance fixtures used by unit and behaviour tests.

use std::sync::Arc;

use crate::{Instance, NodeIndex, SquareMatrix, TimeWindow};

/// A permissive instance: unit costs and durations, wide time windows, zero
/// demands, generous capacities, depot 0, no locks, no pickup-delivery
/// pairs. Tests tighten individual fields from here.
#[must_use]
pub fn small_instance(num_nodes: usize, num_vehicles: usize) -> Instance {
    Instance {
        costs: Arc::new(SquareMatrix::uniform(num_nodes, 1)),
        durations: Arc::new(SquareMatrix::uniform(num_nodes, 1)),
        time_windows: Arc::new(vec![
            TimeWindow {
                start: 0,
                stop: 1_000
            };
            num_nodes
        ]),
        demands: Arc::new(vec![0; num_nodes]),
        num_nodes,
        num_vehicles,
        depot: NodeIndex::new(0),
        time_horizon: 1_000,
        vehicle_capacities: vec![100; num_vehicles],
        route_locks: vec![Vec::new(); num_vehicles],
        pickups: Vec::new(),
        deliveries: Vec::new(),
    }
}

/// An instance with explicit cost rows; durations mirror the costs so time
/// propagation follows the same matrix the objective charges.
///
/// # Panics
///
/// Panics when `rows` is not square; fixture misuse is a test bug.
#[must_use]
pub fn instance_from_costs(rows: Vec<Vec<i64>>, num_vehicles: usize) -> Instance {
    let num_nodes = rows.len();
    let costs = SquareMatrix::from_rows(rows).unwrap_or_else(|err| {
        // Fixture misuse is a test bug, not a runtime condition.
        panic!("instance_from_costs requires square rows: {err}")
    });
    let mut instance = small_instance(num_nodes, num_vehicles);
    instance.durations = Arc::new(costs.clone());
    instance.costs = Arc::new(costs);
    instance
}
