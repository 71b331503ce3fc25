//! Depth-first branch-and-bound over per-vehicle route extensions.
//!
//! Vehicles are routed one after another: the search extends the current
//! vehicle's route with one unserved node at a time, or closes it and moves
//! to the next vehicle. Dimension propagation prunes infeasible extensions,
//! the incumbent's cost prunes expensive ones, and registered
//! pickup-delivery pairs gate deliveries until their pickup is on the
//! current route. A complete assignment is recorded only when every node is
//! served and every posted precedence admits a consistent cumul choice.

use std::time::Instant;

use fleetway_core::NodeIndex;
use fleetway_core::engine::{
    DimensionId, EngineAssignment, EngineError, FirstSolutionStrategy, SearchParameters, VarIndex,
};

use crate::model::ExactModel;

/// Solved variable binding produced by the exact backend.
pub struct ExactAssignment {
    objective: i64,
    routes: Vec<Vec<NodeIndex>>,
    /// Successor variable per variable; end variables loop to themselves.
    next: Vec<usize>,
    /// Solved cumul bounds per dimension, indexed by variable.
    cumuls: Vec<Vec<(i64, i64)>>,
}

impl EngineAssignment for ExactAssignment {
    fn objective_value(&self) -> i64 {
        self.objective
    }

    fn routes(&self) -> Vec<Vec<NodeIndex>> {
        self.routes.clone()
    }

    fn next_var(&self, index: VarIndex) -> Result<VarIndex, EngineError> {
        self.next
            .get(index.0)
            .map(|&successor| VarIndex(successor))
            .ok_or(EngineError::UnknownVariable(index.0))
    }

    fn cumul_bounds(
        &self,
        dimension: DimensionId,
        index: VarIndex,
    ) -> Result<(i64, i64), EngineError> {
        self.cumuls
            .get(dimension.0)
            .ok_or(EngineError::UnknownDimension(dimension.0))?
            .get(index.0)
            .copied()
            .ok_or(EngineError::UnknownVariable(index.0))
    }
}

struct Incumbent {
    cost: i64,
    routes: Vec<Vec<NodeIndex>>,
}

struct Search<'m> {
    model: &'m ExactModel,
    deadline: Option<Instant>,
    solution_limit: u64,
    solutions: u64,
    strategy: FirstSolutionStrategy,
    /// Nodes committed to some vehicle's lock prefix; never free candidates.
    locked: Vec<bool>,
    best: Option<Incumbent>,
    stopped: bool,
}

/// Run the search to completion, returning the cheapest feasible
/// assignment found within the configured limits.
pub(crate) fn run(model: &ExactModel, parameters: &SearchParameters) -> Option<ExactAssignment> {
    let mut locked = vec![false; model.num_nodes()];
    for prefix in &model.locks {
        for node in prefix {
            if let Some(flag) = locked.get_mut(node.index()) {
                *flag = true;
            }
        }
    }

    let mut search = Search {
        model,
        deadline: parameters.time_limit.map(|limit| Instant::now() + limit),
        solution_limit: parameters.solution_limit.unwrap_or(u64::MAX),
        solutions: 0,
        strategy: parameters.first_solution,
        locked,
        best: None,
        stopped: false,
    };

    let mut used = vec![false; model.num_nodes()];
    if let Some(flag) = used.get_mut(model.topology.depot.index()) {
        *flag = true;
    }
    let mut routes = Vec::with_capacity(model.num_vehicles());
    search.enter_vehicle(0, &mut used, &mut routes, 0);

    let incumbent = search.best?;
    log::debug!(
        "exact search finished: objective {} after {} improving solutions",
        incumbent.cost,
        search.solutions
    );
    Some(build_assignment(model, &incumbent))
}

impl Search<'_> {
    fn should_stop(&mut self) -> bool {
        if self.stopped {
            return true;
        }
        if self.solutions >= self.solution_limit {
            self.stopped = true;
            return true;
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                log::debug!("exact search hit its time limit");
                self.stopped = true;
                return true;
            }
        }
        false
    }

    fn bounded(&self, cost: i64) -> bool {
        self.best
            .as_ref()
            .is_some_and(|incumbent| cost >= incumbent.cost)
    }

    /// Begin routing `vehicle`, seeding its lock prefix; past the last
    /// vehicle, record the assignment if it is complete and consistent.
    fn enter_vehicle(
        &mut self,
        vehicle: usize,
        used: &mut [bool],
        routes: &mut Vec<Vec<NodeIndex>>,
        cost: i64,
    ) {
        if self.should_stop() || self.bounded(cost) {
            return;
        }
        if vehicle == self.model.num_vehicles() {
            if used.iter().all(|&served| served) && self.precedences_hold(routes) {
                log::debug!("improving solution found with objective {cost}");
                self.best = Some(Incumbent {
                    cost,
                    routes: routes.clone(),
                });
                self.solutions += 1;
            }
            return;
        }

        let prefix = self
            .model
            .locks
            .get(vehicle)
            .cloned()
            .unwrap_or_default();

        let mut cumuls = self.model.start_cumuls(vehicle);
        let mut last = self.model.topology.depot;
        let mut seeded_cost = cost;
        let mut seeded = Vec::with_capacity(prefix.len());
        let mut feasible = true;
        for &node in &prefix {
            if !self.advance_all(vehicle, &mut cumuls, last, VarIndex(node.index())) {
                feasible = false;
                break;
            }
            seeded_cost = seeded_cost.saturating_add(self.model.arc_cost_value(last, node));
            if let Some(flag) = used.get_mut(node.index()) {
                *flag = true;
            }
            seeded.push(node);
            last = node;
        }

        if feasible {
            routes.push(prefix);
            self.extend(vehicle, used, routes, &cumuls, last, seeded_cost);
            routes.pop();
        }
        for node in seeded {
            if let Some(flag) = used.get_mut(node.index()) {
                *flag = false;
            }
        }
    }

    /// Either close the current vehicle's route or extend it by one node.
    fn extend(
        &mut self,
        vehicle: usize,
        used: &mut [bool],
        routes: &mut Vec<Vec<NodeIndex>>,
        cumuls: &[i64],
        last: NodeIndex,
        cost: i64,
    ) {
        if self.should_stop() || self.bounded(cost) {
            return;
        }

        self.try_close(vehicle, used, routes, cumuls, last, cost);

        let mut candidates: Vec<NodeIndex> = (0..self.model.num_nodes())
            .filter(|&node| {
                !used.get(node).copied().unwrap_or(true)
                    && !self.locked.get(node).copied().unwrap_or(false)
            })
            .map(|node| {
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "node ids originate from u32 values"
                )]
                let id = node as u32;
                NodeIndex::new(id)
            })
            .collect();
        if !matches!(self.strategy, FirstSolutionStrategy::InputOrder) {
            candidates.sort_by_key(|&node| self.model.arc_cost_value(last, node));
        }

        for node in candidates {
            if !self.delivery_admissible(node, routes) {
                continue;
            }
            let mut next_cumuls = cumuls.to_vec();
            if !self.advance_all(vehicle, &mut next_cumuls, last, VarIndex(node.index())) {
                continue;
            }
            let step_cost = cost.saturating_add(self.model.arc_cost_value(last, node));
            if let Some(flag) = used.get_mut(node.index()) {
                *flag = true;
            }
            if let Some(route) = routes.last_mut() {
                route.push(node);
            }
            self.extend(vehicle, used, routes, &next_cumuls, node, step_cost);
            if let Some(route) = routes.last_mut() {
                route.pop();
            }
            if let Some(flag) = used.get_mut(node.index()) {
                *flag = false;
            }
        }
    }

    /// Close the current route through the vehicle's end variable and
    /// continue with the next vehicle.
    fn try_close(
        &mut self,
        vehicle: usize,
        used: &mut [bool],
        routes: &mut Vec<Vec<NodeIndex>>,
        cumuls: &[i64],
        last: NodeIndex,
        cost: i64,
    ) {
        if !self.same_vehicle_closable(routes) {
            return;
        }
        let mut closing_cumuls = cumuls.to_vec();
        if !self.advance_all(vehicle, &mut closing_cumuls, last, self.model.end_var(vehicle)) {
            return;
        }
        let closed_cost = cost.saturating_add(
            self.model
                .arc_cost_value(last, self.model.topology.depot),
        );
        self.enter_vehicle(vehicle + 1, used, routes, closed_cost);
    }

    /// Propagate every dimension across one arc; false when any dimension
    /// rejects the step.
    fn advance_all(
        &self,
        vehicle: usize,
        cumuls: &mut [i64],
        from: NodeIndex,
        to: VarIndex,
    ) -> bool {
        for (cumul, dimension) in cumuls.iter_mut().zip(&self.model.dimensions) {
            match self.model.advance_cumul(dimension, vehicle, *cumul, from, to) {
                Some(reached) => *cumul = reached,
                None => return false,
            }
        }
        true
    }

    /// Native pickup-delivery gating: a delivery may only extend a route
    /// already carrying its pickup.
    fn delivery_admissible(&self, node: NodeIndex, routes: &[Vec<NodeIndex>]) -> bool {
        let current = routes.last().map(Vec::as_slice).unwrap_or(&[]);
        self.model
            .pairs
            .iter()
            .filter(|&&(_, delivery)| delivery == node)
            .all(|&(pickup, _)| current.contains(&pickup))
    }

    /// A route may only close if it does not split a same-vehicle pair: a
    /// node stranded off the route would have to be served elsewhere.
    fn same_vehicle_closable(&self, routes: &[Vec<NodeIndex>]) -> bool {
        let Some(current) = routes.last() else {
            return true;
        };
        let split = |a: NodeIndex, b: NodeIndex| {
            current.contains(&a) != current.contains(&b)
        };
        if self
            .model
            .same_vehicle
            .iter()
            .any(|&(first, second)| split(self.model.var_node(first), self.model.var_node(second)))
        {
            return false;
        }
        !self
            .model
            .pairs
            .iter()
            .any(|&(pickup, delivery)| split(pickup, delivery))
    }

    /// Posted cumul precedences hold for the completed routes.
    ///
    /// Two variables on the same route are not independently choosable:
    /// their cumuls are chained by non-negative transits and slack, so the
    /// later stop never carries the smaller cumul. `before` must therefore
    /// precede `after` in route order. Variables on different routes (or
    /// depot start/end variables) keep the interval test, comparing
    /// `before`'s earliest value against `after`'s latest.
    fn precedences_hold(&self, routes: &[Vec<NodeIndex>]) -> bool {
        if self.model.precedences.is_empty() {
            return true;
        }
        let mut positions: Vec<Option<(usize, usize)>> = vec![None; self.model.num_vars()];
        for (route_index, route) in routes.iter().enumerate() {
            for (position, node) in route.iter().enumerate() {
                if let Some(slot) = positions.get_mut(node.index()) {
                    *slot = Some((route_index, position));
                }
            }
        }
        let Some(bounds) = compute_bounds(self.model, routes) else {
            debug_assert!(false, "complete assignment failed bound propagation");
            return false;
        };
        self.model
            .precedences
            .iter()
            .all(|&(dimension, before, after)| {
                if let (Some(&Some((before_route, before_at))), Some(&Some((after_route, after_at)))) =
                    (positions.get(before.0), positions.get(after.0))
                {
                    if before_route == after_route {
                        return before_at <= after_at;
                    }
                }
                let earliest = bounds
                    .get(dimension.0)
                    .and_then(|vars| vars.get(before.0))
                    .map_or(i64::MAX, |&(min, _)| min);
                let latest = bounds
                    .get(dimension.0)
                    .and_then(|vars| vars.get(after.0))
                    .map_or(i64::MIN, |&(_, max)| max);
                earliest <= latest
            })
    }
}

/// Solved `[min, max]` cumul bounds per dimension and variable for a
/// complete set of routes: a forward earliest pass, then, for dimensions
/// with slack, a backward latest pass.
fn compute_bounds(model: &ExactModel, routes: &[Vec<NodeIndex>]) -> Option<Vec<Vec<(i64, i64)>>> {
    let mut bounds = vec![vec![(0, 0); model.num_vars()]; model.dimensions.len()];

    for (vehicle, route) in routes.iter().enumerate() {
        let mut chain = Vec::with_capacity(route.len() + 2);
        chain.push(model.start_var(vehicle));
        chain.extend(route.iter().map(|node| VarIndex(node.index())));
        chain.push(model.end_var(vehicle));

        for (dimension_index, dimension) in model.dimensions.iter().enumerate() {
            let mut earliest = Vec::with_capacity(chain.len());
            earliest.push(model.effective_range(dimension, vehicle, *chain.first()?).0);
            for window in chain.windows(2) {
                let (&from, &to) = match window {
                    [from, to] => (from, to),
                    _ => return None,
                };
                let previous = *earliest.last()?;
                let reached =
                    model.advance_cumul(dimension, vehicle, previous, model.var_node(from), to)?;
                earliest.push(reached);
            }

            let mut latest = earliest.clone();
            if dimension.spec.slack_max > 0 {
                let mut limit = model
                    .effective_range(dimension, vehicle, *chain.last()?)
                    .1;
                for (position, &var) in chain.iter().enumerate().rev() {
                    let (_, var_max) = model.effective_range(dimension, vehicle, var);
                    limit = limit.min(var_max);
                    if let Some(slot) = latest.get_mut(position) {
                        *slot = limit.max(*slot);
                    }
                    if position > 0 {
                        let from_node =
                            model.var_node(*chain.get(position - 1)?);
                        let transit = (dimension.spec.evaluator)(from_node, model.var_node(var));
                        limit = limit.saturating_sub(transit);
                    }
                }
            }

            for (position, &var) in chain.iter().enumerate() {
                let min = *earliest.get(position)?;
                let max = *latest.get(position)?;
                debug_assert!(min <= max, "cumul bounds inverted at var {}", var.0);
                if let Some(slot) = bounds
                    .get_mut(dimension_index)
                    .and_then(|vars| vars.get_mut(var.0))
                {
                    *slot = (min, max.max(min));
                }
            }
        }
    }

    Some(bounds)
}

fn build_assignment(model: &ExactModel, incumbent: &Incumbent) -> ExactAssignment {
    let mut next: Vec<usize> = (0..model.num_vars()).collect();
    for (vehicle, route) in incumbent.routes.iter().enumerate() {
        let mut previous = model.start_var(vehicle).0;
        for node in route {
            if let Some(slot) = next.get_mut(previous) {
                *slot = node.index();
            }
            previous = node.index();
        }
        if let Some(slot) = next.get_mut(previous) {
            *slot = model.end_var(vehicle).0;
        }
    }

    let cumuls = compute_bounds(model, &incumbent.routes).unwrap_or_else(|| {
        debug_assert!(false, "incumbent failed bound propagation");
        vec![vec![(0, 0); model.num_vars()]; model.dimensions.len()]
    });

    ExactAssignment {
        objective: incumbent.cost,
        routes: incumbent.routes.clone(),
        next,
        cumuls,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rstest::rstest;

    use fleetway_core::engine::{
        DimensionCapacity, DimensionSpec, EngineModel, ModelParameters, ModelTopology,
        RoutingEngine,
    };

    use crate::ExactEngine;

    fn matrix_evaluator(rows: Vec<Vec<i64>>) -> fleetway_core::engine::ArcEvaluator {
        Arc::new(move |from: NodeIndex, to: NodeIndex| {
            rows[from.index()][to.index()]
        })
    }

    fn build(num_nodes: usize, num_vehicles: usize) -> crate::ExactModel {
        ExactEngine::new()
            .build_model(
                ModelTopology {
                    num_nodes,
                    num_vehicles,
                    depot: NodeIndex::new(0),
                },
                &ModelParameters::default(),
            )
            .expect("valid topology")
    }

    fn time_dimension(
        evaluator: fleetway_core::engine::ArcEvaluator,
        horizon: i64,
    ) -> DimensionSpec {
        DimensionSpec {
            name: "time",
            evaluator,
            slack_max: horizon,
            capacity: DimensionCapacity::Uniform(horizon),
            fix_start_cumul_to_zero: true,
        }
    }

    #[rstest]
    fn finds_the_cheaper_of_two_orders() {
        // Asymmetric costs make 0 -> 2 -> 1 -> 0 cheaper than 0 -> 1 -> 2 -> 0.
        let rows = vec![vec![0, 9, 1], vec![1, 0, 9], vec![9, 1, 0]];
        let mut model = build(3, 1);
        model
            .set_arc_cost_evaluator(matrix_evaluator(rows.clone()))
            .expect("open model");
        model
            .add_dimension(time_dimension(matrix_evaluator(rows), 100))
            .expect("open model");
        model.close().expect("close");
        let assignment = model
            .solve(&SearchParameters::default())
            .expect("solve runs")
            .expect("feasible");
        assert_eq!(
            assignment.routes(),
            vec![vec![NodeIndex::new(2), NodeIndex::new(1)]]
        );
        assert_eq!(assignment.objective_value(), 3);
    }

    #[rstest]
    fn successor_chain_matches_the_route() {
        let rows = vec![vec![0, 1, 2], vec![1, 0, 1], vec![2, 1, 0]];
        let mut model = build(3, 1);
        model
            .set_arc_cost_evaluator(matrix_evaluator(rows.clone()))
            .expect("open model");
        model
            .add_dimension(time_dimension(matrix_evaluator(rows), 100))
            .expect("open model");
        model.close().expect("close");
        let assignment = model
            .solve(&SearchParameters::default())
            .expect("solve runs")
            .expect("feasible");

        let mut index = model.vehicle_start(0).expect("closed model");
        let mut visited = Vec::new();
        while !model.is_end(index) {
            index = assignment.next_var(index).expect("chained var");
            if !model.is_end(index) {
                visited.push(index);
            }
        }
        let expected: Vec<VarIndex> = assignment
            .routes()
            .remove(0)
            .into_iter()
            .map(|node| VarIndex(node.index()))
            .collect();
        assert_eq!(visited, expected);
    }

    #[rstest]
    fn unreachable_window_yields_no_solution() {
        let rows = vec![vec![0, 5], vec![5, 0]];
        let mut model = build(2, 1);
        model
            .set_arc_cost_evaluator(matrix_evaluator(rows.clone()))
            .expect("open model");
        let dim = model
            .add_dimension(time_dimension(matrix_evaluator(rows), 100))
            .expect("open model");
        // Node 1 is 5 away but must be reached by time 2.
        model
            .set_cumul_range(dim, NodeIndex::new(1), 0, 2)
            .expect("open model");
        model.close().expect("close");
        assert!(
            model
                .solve(&SearchParameters::default())
                .expect("solve runs")
                .is_none()
        );
    }

    #[rstest]
    fn zero_slack_capacity_splits_the_fleet() {
        // Two customers each demanding 5 against per-vehicle capacity 5:
        // no single vehicle can serve both.
        let rows = vec![vec![0, 1, 1], vec![1, 0, 1], vec![1, 1, 0]];
        let demands = vec![0_i64, 5, 5];
        let mut model = build(3, 2);
        model
            .set_arc_cost_evaluator(matrix_evaluator(rows.clone()))
            .expect("open model");
        model
            .add_dimension(time_dimension(matrix_evaluator(rows), 100))
            .expect("open model");
        model
            .add_dimension(DimensionSpec {
                name: "capacity",
                evaluator: Arc::new(move |from: NodeIndex, _| demands[from.index()]),
                slack_max: 0,
                capacity: DimensionCapacity::PerVehicle(vec![5, 5]),
                fix_start_cumul_to_zero: true,
            })
            .expect("open model");
        model.close().expect("close");
        let assignment = model
            .solve(&SearchParameters::default())
            .expect("solve runs")
            .expect("feasible");
        let routes = assignment.routes();
        assert_eq!(routes.len(), 2);
        assert!(routes.iter().all(|route| route.len() == 1));
    }

    #[rstest]
    fn time_bounds_cover_waiting_room() {
        // One customer one unit away with a window [3, 8] under horizon 10:
        // earliest arrival waits until 3, latest departs as late as 8.
        let rows = vec![vec![0, 1], vec![1, 0]];
        let mut model = build(2, 1);
        model
            .set_arc_cost_evaluator(matrix_evaluator(rows.clone()))
            .expect("open model");
        let dim = model
            .add_dimension(time_dimension(matrix_evaluator(rows), 10))
            .expect("open model");
        model
            .set_cumul_range(dim, NodeIndex::new(1), 3, 8)
            .expect("open model");
        model.close().expect("close");
        let assignment = model
            .solve(&SearchParameters::default())
            .expect("solve runs")
            .expect("feasible");
        let index = model.node_to_index(NodeIndex::new(1)).expect("node var");
        let (min, max) = assignment.cumul_bounds(dim, index).expect("bounds");
        assert_eq!(min, 3);
        assert_eq!(max, 8);
    }

    #[rstest]
    fn lock_reversing_a_pair_finds_no_schedule() {
        let rows = vec![vec![0, 1, 1], vec![1, 0, 1], vec![1, 1, 0]];
        let mut model = build(3, 1);
        model
            .set_arc_cost_evaluator(matrix_evaluator(rows.clone()))
            .expect("open model");
        let dim = model
            .add_dimension(time_dimension(matrix_evaluator(rows), 100))
            .expect("open model");
        model
            .add_same_vehicle(VarIndex(1), VarIndex(2))
            .expect("open model");
        model
            .add_cumul_precedence(dim, VarIndex(1), VarIndex(2))
            .expect("open model");
        model
            .add_pickup_delivery_pair(NodeIndex::new(1), NodeIndex::new(2))
            .expect("open model");
        model.close().expect("close");
        // The prefix forces node 2 ahead of node 1 on the only vehicle, but
        // the precedence requires node 1's cumul to come first; no single
        // schedule can satisfy both.
        let valid = model
            .apply_locks(&[vec![NodeIndex::new(2), NodeIndex::new(1)]])
            .expect("lock application runs");
        assert!(valid);
        assert!(
            model
                .solve(&SearchParameters::default())
                .expect("solve runs")
                .is_none()
        );
    }

    #[rstest]
    fn lock_starting_with_the_pickup_still_solves() {
        let rows = vec![vec![0, 1, 1], vec![1, 0, 1], vec![1, 1, 0]];
        let mut model = build(3, 1);
        model
            .set_arc_cost_evaluator(matrix_evaluator(rows.clone()))
            .expect("open model");
        let dim = model
            .add_dimension(time_dimension(matrix_evaluator(rows), 100))
            .expect("open model");
        model
            .add_same_vehicle(VarIndex(1), VarIndex(2))
            .expect("open model");
        model
            .add_cumul_precedence(dim, VarIndex(1), VarIndex(2))
            .expect("open model");
        model
            .add_pickup_delivery_pair(NodeIndex::new(1), NodeIndex::new(2))
            .expect("open model");
        model.close().expect("close");
        let valid = model
            .apply_locks(&[vec![NodeIndex::new(1)]])
            .expect("lock application runs");
        assert!(valid);
        let assignment = model
            .solve(&SearchParameters::default())
            .expect("solve runs")
            .expect("feasible");
        assert_eq!(
            assignment.routes(),
            vec![vec![NodeIndex::new(1), NodeIndex::new(2)]]
        );
    }

    #[rstest]
    fn lock_prefix_is_honoured() {
        let rows = vec![
            vec![0, 1, 1, 1],
            vec![1, 0, 1, 1],
            vec![1, 1, 0, 1],
            vec![1, 1, 1, 0],
        ];
        let mut model = build(4, 2);
        model
            .set_arc_cost_evaluator(matrix_evaluator(rows.clone()))
            .expect("open model");
        model
            .add_dimension(time_dimension(matrix_evaluator(rows), 100))
            .expect("open model");
        model.close().expect("close");
        let valid = model
            .apply_locks(&[vec![NodeIndex::new(3)], Vec::new()])
            .expect("lock application runs");
        assert!(valid);
        let assignment = model
            .solve(&SearchParameters::default())
            .expect("solve runs")
            .expect("feasible");
        let routes = assignment.routes();
        assert_eq!(routes[0].first(), Some(&NodeIndex::new(3)));
    }
}
