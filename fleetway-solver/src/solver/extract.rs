//! The two extraction passes over a solved assignment.
//!
//! Routes and times come from the engine's native route reconstruction and
//! are node-indexed; cost details come from an independent walk of the
//! successor-variable chain and are edge-indexed. The passes stay separate
//! because their index conventions differ: merging them invites the
//! off-by-one between `k` visited nodes and `k + 1` traversed arcs.

use fleetway_core::engine::{DimensionId, EngineAssignment, EngineError, EngineModel};
use fleetway_core::{Interval, NodeIndex, RoutingSolution};

/// Assemble the full solution from a solved assignment.
pub(crate) fn solution<M: EngineModel>(
    model: &M,
    assignment: &M::Assignment,
    time_dimension: DimensionId,
    num_vehicles: usize,
) -> Result<RoutingSolution, EngineError> {
    let (routes, times) = routes_and_times(model, assignment, time_dimension)?;
    let cost_details = cost_details(model, assignment, num_vehicles)?;
    Ok(RoutingSolution {
        cost: assignment.objective_value(),
        routes,
        times,
        cost_details,
    })
}

/// Node-indexed pass: reconstruct each vehicle's visited-node sequence and
/// read the solved time window of every stop's cumul variable.
fn routes_and_times<M: EngineModel>(
    model: &M,
    assignment: &M::Assignment,
    time_dimension: DimensionId,
) -> Result<(Vec<Vec<NodeIndex>>, Vec<Vec<Interval>>), EngineError> {
    let routes = assignment.routes();
    let mut times = Vec::with_capacity(routes.len());
    for route in &routes {
        let mut stops = Vec::with_capacity(route.len());
        for &node in route {
            let index = model.node_to_index(node)?;
            let (min, max) = assignment.cumul_bounds(time_dimension, index)?;
            stops.push(Interval { min, max });
        }
        times.push(stops);
    }
    Ok((routes, times))
}

/// Edge-indexed pass: walk each vehicle's successor chain from its start
/// variable to its end variable, recording the vehicle-specific cost of
/// every traversed arc, the final return to the depot included.
fn cost_details<M: EngineModel>(
    model: &M,
    assignment: &M::Assignment,
    num_vehicles: usize,
) -> Result<Vec<Vec<i64>>, EngineError> {
    let mut details = Vec::with_capacity(num_vehicles);
    for vehicle in 0..num_vehicles {
        let mut arc_costs = Vec::new();
        let mut index = model.vehicle_start(vehicle)?;
        while !model.is_end(index) {
            let previous = index;
            index = assignment.next_var(previous)?;
            arc_costs.push(model.arc_cost_for_vehicle(previous, index, vehicle)?);
        }
        details.push(arc_costs);
    }
    Ok(details)
}
