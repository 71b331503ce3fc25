//! Model construction, lock application and solver invocation.
//!
//! The pipeline order is fixed: dimensions and constraints may only be
//! declared while the model is open, locks need the decision variables that
//! exist once it is closed, and extraction needs a solved assignment. No
//! step re-enters an earlier one.

use std::sync::Arc;

use fleetway_core::engine::{
    ArcEvaluator, DimensionCapacity, DimensionId, DimensionSpec, EngineError, EngineModel,
    ModelParameters, RoutingEngine, SearchParameters,
};
use fleetway_core::{Instance, NodeIndex, RoutingSolution, SolveError, SquareMatrix};

mod extract;

const TIME_DIMENSION: &str = "time";
const CAPACITY_DIMENSION: &str = "capacity";

/// Drives a routing-engine backend from instance to structured solution.
///
/// The orchestrator owns no per-solve state; one instance may serve any
/// number of concurrent solves, each building its own model.
pub struct Orchestrator<E: RoutingEngine> {
    engine: E,
}

impl<E: RoutingEngine> Orchestrator<E> {
    /// Wrap an engine backend.
    #[must_use]
    pub const fn new(engine: E) -> Self {
        Self { engine }
    }

    /// Run the full pipeline for one instance.
    ///
    /// Tuning parameters pass through to the engine unmodified; exactly one
    /// search is attempted, and every failure is terminal for the request.
    pub fn solve(
        &self,
        instance: &Instance,
        model_parameters: &ModelParameters,
        search_parameters: &SearchParameters,
    ) -> Result<RoutingSolution, SolveError> {
        instance.validate()?;

        let mut model = self.engine.build_model(instance.topology(), model_parameters)?;
        let time_dimension = build_model(&mut model, instance)?;
        model.close()?;
        log::debug!(
            "model closed: {} nodes, {} vehicles, {} pickup-delivery pairs",
            instance.num_nodes,
            instance.num_vehicles,
            instance.pickups.len()
        );

        // Locks need the decision variables allocated at close time.
        if !model.apply_locks(&instance.route_locks)? {
            log::warn!("route locks rejected by the engine");
            return Err(SolveError::InvalidLocks);
        }

        let assignment = model
            .solve(search_parameters)?
            .ok_or(SolveError::NoSolution)?;

        let solution = extract::solution(&model, &assignment, time_dimension, instance.num_vehicles)?;
        log::debug!("solve finished with objective {}", solution.cost);
        Ok(solution)
    }
}

/// Attach the cost evaluator, both dimensions and the pickup-delivery
/// constraints to an open model, returning the time dimension's handle for
/// extraction.
fn build_model<M: EngineModel>(model: &mut M, instance: &Instance) -> Result<DimensionId, EngineError> {
    model.set_arc_cost_evaluator(matrix_evaluator(&instance.costs))?;

    let time_dimension = model.add_dimension(DimensionSpec {
        name: TIME_DIMENSION,
        evaluator: matrix_evaluator(&instance.durations),
        slack_max: instance.time_horizon,
        capacity: DimensionCapacity::Uniform(instance.time_horizon),
        fix_start_cumul_to_zero: true,
    })?;

    // Single-interval windows only. Disjoint windows would need support for
    // removing intervals from a cumul domain.
    for (node, window) in instance.time_windows.iter().enumerate() {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "validated instances keep node ids within u32"
        )]
        let node = NodeIndex::new(node as u32);
        model.set_cumul_range(time_dimension, node, window.start, window.stop)?;
    }

    model.add_dimension(DimensionSpec {
        name: CAPACITY_DIMENSION,
        evaluator: demand_evaluator(&instance.demands),
        slack_max: 0,
        capacity: DimensionCapacity::PerVehicle(instance.vehicle_capacities.clone()),
        fix_start_cumul_to_zero: true,
    })?;

    for (&pickup, &delivery) in instance.pickups.iter().zip(&instance.deliveries) {
        let pickup_index = model.node_to_index(pickup)?;
        let delivery_index = model.node_to_index(delivery)?;
        // The explicit constraints bind the pair; the native registration
        // additionally lets the engine's search heuristics see it.
        model.add_same_vehicle(pickup_index, delivery_index)?;
        model.add_cumul_precedence(time_dimension, pickup_index, delivery_index)?;
        model.add_pickup_delivery_pair(pickup, delivery)?;
    }

    Ok(time_dimension)
}

fn matrix_evaluator(matrix: &Arc<SquareMatrix>) -> ArcEvaluator {
    let matrix = Arc::clone(matrix);
    Arc::new(move |from: NodeIndex, to: NodeIndex| matrix.at(from.index(), to.index()))
}

/// Demand transit of an arc is the origin node's demand; the destination is
/// deliberately ignored even though the evaluator shares the binary shape
/// of the cost and duration callbacks.
fn demand_evaluator(demands: &Arc<Vec<i64>>) -> ArcEvaluator {
    let demands = Arc::clone(demands);
    Arc::new(move |from: NodeIndex, _to: NodeIndex| {
        demands.get(from.index()).copied().unwrap_or(0)
    })
}
