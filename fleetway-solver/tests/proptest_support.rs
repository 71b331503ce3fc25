//! Proptest strategies for the solve-pipeline property-based tests.
//!
//! The strategies generate valid instances only: square matrices with a
//! zero diagonal, wide windows under a common horizon, and demands that a
//! single vehicle could carry. Infeasibility is exercised by the behaviour
//! tests; the properties here quantify over solvable inputs.

use std::sync::Arc;

use fleetway_core::{Instance, NodeIndex, SquareMatrix, TimeWindow};
use proptest::prelude::*;

const HORIZON: i64 = 10_000;

/// Strategy for a complete instance: 2 to 5 nodes, 1 or 2 vehicles,
/// arc costs in `[1, 9]` mirrored into the durations.
pub fn instance_strategy() -> impl Strategy<Value = Instance> {
    (2_usize..=5, 1_usize..=2).prop_flat_map(|(num_nodes, num_vehicles)| {
        matrix_strategy(num_nodes).prop_map(move |matrix| Instance {
            costs: Arc::new(matrix.clone()),
            durations: Arc::new(matrix),
            time_windows: Arc::new(vec![
                TimeWindow {
                    start: 0,
                    stop: HORIZON
                };
                num_nodes
            ]),
            demands: Arc::new(vec![0; num_nodes]),
            num_nodes,
            num_vehicles,
            depot: NodeIndex::new(0),
            time_horizon: HORIZON,
            vehicle_capacities: vec![100; num_vehicles],
            route_locks: vec![Vec::new(); num_vehicles],
            pickups: Vec::new(),
            deliveries: Vec::new(),
        })
    })
}

/// Strategy for a square matrix with a zero diagonal and positive
/// off-diagonal entries.
fn matrix_strategy(dim: usize) -> impl Strategy<Value = SquareMatrix> {
    proptest::collection::vec(1_i64..=9, dim.checked_mul(dim).unwrap_or(0)).prop_map(
        move |mut values| {
            for value in values.iter_mut().step_by(dim.saturating_add(1)) {
                *value = 0;
            }
            SquareMatrix::from_values(dim, values).unwrap_or_else(|err| {
                // Strategy misuse is a test bug, not a runtime condition.
                panic!("matrix strategy produced invalid values: {err}")
            })
        },
    )
}
