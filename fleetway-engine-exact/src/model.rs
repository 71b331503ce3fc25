//! Model state and the open → closed lifecycle.
//!
//! Variable layout: indices `[0, num_nodes)` are the node variables; each
//! vehicle `v` then owns a start variable `num_nodes + 2v` and an end
//! variable `num_nodes + 2v + 1`. Start and end variables stand for depot
//! visits in evaluator terms.

use fleetway_core::NodeIndex;
use fleetway_core::engine::{
    ArcEvaluator, DimensionCapacity, DimensionId, DimensionSpec, EngineError, EngineModel,
    ModelParameters, ModelTopology, RoutingEngine, SearchParameters, VarIndex,
};

use crate::search::{self, ExactAssignment};

/// Engine entry point; stateless, models carry all per-solve state.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactEngine;

impl ExactEngine {
    /// Construct the engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl RoutingEngine for ExactEngine {
    type Model = ExactModel;

    fn build_model(
        &self,
        topology: ModelTopology,
        parameters: &ModelParameters,
    ) -> Result<ExactModel, EngineError> {
        if topology.num_nodes == 0 {
            return Err(EngineError::InvalidTopology {
                reason: "at least one node is required".into(),
            });
        }
        if topology.num_vehicles == 0 {
            return Err(EngineError::InvalidTopology {
                reason: "at least one vehicle is required".into(),
            });
        }
        if topology.depot.index() >= topology.num_nodes {
            return Err(EngineError::InvalidTopology {
                reason: format!(
                    "depot {} lies outside [0, {})",
                    topology.depot, topology.num_nodes
                ),
            });
        }
        if let Some(capacity) = parameters.evaluator_cache_capacity {
            // Evaluators are invoked directly; no cache to size.
            log::debug!("evaluator_cache_capacity {capacity} ignored by the exact backend");
        }
        Ok(ExactModel {
            topology,
            closed: false,
            arc_cost: None,
            dimensions: Vec::new(),
            same_vehicle: Vec::new(),
            precedences: Vec::new(),
            pairs: Vec::new(),
            locks: Vec::new(),
        })
    }
}

pub(crate) struct Dimension {
    pub(crate) spec: DimensionSpec,
    /// Requested cumul range per node variable; intersected with the
    /// dimension's capacity bounds when read.
    pub(crate) node_ranges: Vec<(i64, i64)>,
}

/// A constraint model built by [`ExactEngine`].
pub struct ExactModel {
    pub(crate) topology: ModelTopology,
    closed: bool,
    pub(crate) arc_cost: Option<ArcEvaluator>,
    pub(crate) dimensions: Vec<Dimension>,
    pub(crate) same_vehicle: Vec<(VarIndex, VarIndex)>,
    pub(crate) precedences: Vec<(DimensionId, VarIndex, VarIndex)>,
    pub(crate) pairs: Vec<(NodeIndex, NodeIndex)>,
    pub(crate) locks: Vec<Vec<NodeIndex>>,
}

impl ExactModel {
    fn require_open(&self, operation: &'static str) -> Result<(), EngineError> {
        if self.closed {
            Err(EngineError::ModelClosed { operation })
        } else {
            Ok(())
        }
    }

    fn require_closed(&self, operation: &'static str) -> Result<(), EngineError> {
        if self.closed {
            Ok(())
        } else {
            Err(EngineError::ModelOpen { operation })
        }
    }

    pub(crate) const fn num_nodes(&self) -> usize {
        self.topology.num_nodes
    }

    pub(crate) const fn num_vehicles(&self) -> usize {
        self.topology.num_vehicles
    }

    pub(crate) const fn num_vars(&self) -> usize {
        self.topology.num_nodes + 2 * self.topology.num_vehicles
    }

    pub(crate) const fn start_var(&self, vehicle: usize) -> VarIndex {
        VarIndex(self.topology.num_nodes + 2 * vehicle)
    }

    pub(crate) const fn end_var(&self, vehicle: usize) -> VarIndex {
        VarIndex(self.topology.num_nodes + 2 * vehicle + 1)
    }

    const fn is_start_var(&self, index: VarIndex) -> bool {
        index.0 >= self.topology.num_nodes && (index.0 - self.topology.num_nodes) & 1 == 0
    }

    /// Node an index stands for in evaluator terms: node variables map to
    /// their node, start and end variables to the depot.
    pub(crate) const fn var_node(&self, index: VarIndex) -> NodeIndex {
        if index.0 < self.topology.num_nodes {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "node variables are created from u32 node ids"
            )]
            let node = index.0 as u32;
            NodeIndex::new(node)
        } else {
            self.topology.depot
        }
    }

    fn dimension(&self, id: DimensionId) -> Result<&Dimension, EngineError> {
        self.dimensions
            .get(id.0)
            .ok_or(EngineError::UnknownDimension(id.0))
    }

    pub(crate) fn capacity_for(dimension: &Dimension, vehicle: usize) -> i64 {
        match &dimension.spec.capacity {
            DimensionCapacity::Uniform(capacity) => *capacity,
            DimensionCapacity::PerVehicle(capacities) => {
                capacities.get(vehicle).copied().unwrap_or_else(|| {
                    debug_assert!(false, "vehicle {vehicle} missing a capacity");
                    0
                })
            }
        }
    }

    /// Feasible range of a cumulative variable for one vehicle: the node's
    /// requested range intersected with `[0, capacity]`; start variables
    /// collapse to zero when the dimension fixes starts.
    pub(crate) fn effective_range(
        &self,
        dimension: &Dimension,
        vehicle: usize,
        index: VarIndex,
    ) -> (i64, i64) {
        let capacity = Self::capacity_for(dimension, vehicle);
        if index.0 < self.topology.num_nodes {
            let (min, max) = dimension
                .node_ranges
                .get(index.0)
                .copied()
                .unwrap_or((0, i64::MAX));
            (min.max(0), max.min(capacity))
        } else if self.is_start_var(index) && dimension.spec.fix_start_cumul_to_zero {
            (0, 0)
        } else {
            (0, capacity)
        }
    }

    /// Propagate one dimension across the arc `from → to`: the new cumul is
    /// the old one plus the transit, plus just enough slack to reach the
    /// destination range. `None` when no slack amount makes the step
    /// feasible.
    pub(crate) fn advance_cumul(
        &self,
        dimension: &Dimension,
        vehicle: usize,
        cumul: i64,
        from: NodeIndex,
        to: VarIndex,
    ) -> Option<i64> {
        let transit = (dimension.spec.evaluator)(from, self.var_node(to));
        let candidate = cumul.checked_add(transit)?;
        let (min, max) = self.effective_range(dimension, vehicle, to);
        let reached = candidate.max(min);
        if reached > max {
            return None;
        }
        if reached - candidate > dimension.spec.slack_max {
            return None;
        }
        Some(reached)
    }

    /// Cumulative start values for one vehicle, one entry per dimension.
    pub(crate) fn start_cumuls(&self, vehicle: usize) -> Vec<i64> {
        self.dimensions
            .iter()
            .map(|dimension| {
                self.effective_range(dimension, vehicle, self.start_var(vehicle))
                    .0
            })
            .collect()
    }

    pub(crate) fn arc_cost_value(&self, from: NodeIndex, to: NodeIndex) -> i64 {
        self.arc_cost
            .as_ref()
            .map_or(0, |evaluator| evaluator(from, to))
    }

    /// Whether a vehicle can serve `prefix` straight out of the depot
    /// without violating any dimension. A conservative check: a prefix that
    /// passes here may still admit no completed route.
    fn prefix_feasible(&self, vehicle: usize, prefix: &[NodeIndex]) -> bool {
        let mut cumuls = self.start_cumuls(vehicle);
        let mut last = self.topology.depot;
        for &node in prefix {
            let to = VarIndex(node.index());
            for (cumul, dimension) in cumuls.iter_mut().zip(&self.dimensions) {
                match self.advance_cumul(dimension, vehicle, *cumul, last, to) {
                    Some(next) => *cumul = next,
                    None => return false,
                }
            }
            last = node;
        }
        true
    }

    fn locks_consistent(&self, locks: &[Vec<NodeIndex>]) -> bool {
        let mut seen = vec![false; self.num_nodes()];
        for (vehicle, prefix) in locks.iter().enumerate() {
            for &node in prefix {
                if node.index() >= self.num_nodes() || node == self.topology.depot {
                    log::debug!("lock rejected: node {node} invalid for vehicle {vehicle}");
                    return false;
                }
                if let Some(flag) = seen.get_mut(node.index()) {
                    if *flag {
                        log::debug!("lock rejected: node {node} locked twice");
                        return false;
                    }
                    *flag = true;
                }
            }
            if !self.prefix_feasible(vehicle, prefix) {
                log::debug!("lock rejected: prefix infeasible for vehicle {vehicle}");
                return false;
            }
        }
        true
    }
}

impl EngineModel for ExactModel {
    type Assignment = ExactAssignment;

    fn set_arc_cost_evaluator(&mut self, evaluator: ArcEvaluator) -> Result<(), EngineError> {
        self.require_open("set_arc_cost_evaluator")?;
        self.arc_cost = Some(evaluator);
        Ok(())
    }

    fn add_dimension(&mut self, spec: DimensionSpec) -> Result<DimensionId, EngineError> {
        self.require_open("add_dimension")?;
        if spec.slack_max < 0 {
            return Err(EngineError::Backend(format!(
                "dimension `{}` has negative slack",
                spec.name
            )));
        }
        if let DimensionCapacity::PerVehicle(capacities) = &spec.capacity {
            if capacities.len() != self.num_vehicles() {
                return Err(EngineError::Backend(format!(
                    "dimension `{}` has {} capacities for {} vehicles",
                    spec.name,
                    capacities.len(),
                    self.num_vehicles()
                )));
            }
        }
        let id = DimensionId(self.dimensions.len());
        self.dimensions.push(Dimension {
            node_ranges: vec![(0, i64::MAX); self.num_nodes()],
            spec,
        });
        Ok(id)
    }

    fn set_cumul_range(
        &mut self,
        dimension: DimensionId,
        node: NodeIndex,
        min: i64,
        max: i64,
    ) -> Result<(), EngineError> {
        self.require_open("set_cumul_range")?;
        if node.index() >= self.topology.num_nodes {
            return Err(EngineError::UnknownVariable(node.index()));
        }
        let slot = self
            .dimensions
            .get_mut(dimension.0)
            .ok_or(EngineError::UnknownDimension(dimension.0))?
            .node_ranges
            .get_mut(node.index());
        match slot {
            Some(range) => {
                *range = (min, max);
                Ok(())
            }
            None => Err(EngineError::UnknownVariable(node.index())),
        }
    }

    fn add_same_vehicle(&mut self, first: VarIndex, second: VarIndex) -> Result<(), EngineError> {
        self.require_open("add_same_vehicle")?;
        self.same_vehicle.push((first, second));
        Ok(())
    }

    fn add_cumul_precedence(
        &mut self,
        dimension: DimensionId,
        before: VarIndex,
        after: VarIndex,
    ) -> Result<(), EngineError> {
        self.require_open("add_cumul_precedence")?;
        self.dimension(dimension)?;
        self.precedences.push((dimension, before, after));
        Ok(())
    }

    fn add_pickup_delivery_pair(
        &mut self,
        pickup: NodeIndex,
        delivery: NodeIndex,
    ) -> Result<(), EngineError> {
        self.require_open("add_pickup_delivery_pair")?;
        self.pairs.push((pickup, delivery));
        Ok(())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        self.require_open("close")?;
        self.closed = true;
        Ok(())
    }

    fn node_to_index(&self, node: NodeIndex) -> Result<VarIndex, EngineError> {
        if node.index() < self.topology.num_nodes {
            Ok(VarIndex(node.index()))
        } else {
            Err(EngineError::UnknownVariable(node.index()))
        }
    }

    fn apply_locks(&mut self, locks: &[Vec<NodeIndex>]) -> Result<bool, EngineError> {
        self.require_closed("apply_locks")?;
        if locks.len() != self.num_vehicles() {
            return Err(EngineError::Backend(format!(
                "{} lock sequences supplied for {} vehicles",
                locks.len(),
                self.num_vehicles()
            )));
        }
        if !self.locks_consistent(locks) {
            return Ok(false);
        }
        self.locks = locks.to_vec();
        Ok(true)
    }

    fn solve(
        &self,
        parameters: &SearchParameters,
    ) -> Result<Option<ExactAssignment>, EngineError> {
        self.require_closed("solve")?;
        Ok(search::run(self, parameters))
    }

    fn vehicle_start(&self, vehicle: usize) -> Result<VarIndex, EngineError> {
        self.require_closed("vehicle_start")?;
        if vehicle >= self.num_vehicles() {
            return Err(EngineError::UnknownVehicle(vehicle));
        }
        Ok(self.start_var(vehicle))
    }

    fn is_end(&self, index: VarIndex) -> bool {
        index.0 >= self.topology.num_nodes
            && index.0 < self.num_vars()
            && (index.0 - self.topology.num_nodes) & 1 == 1
    }

    fn arc_cost_for_vehicle(
        &self,
        from: VarIndex,
        to: VarIndex,
        vehicle: usize,
    ) -> Result<i64, EngineError> {
        self.require_closed("arc_cost_for_vehicle")?;
        if vehicle >= self.num_vehicles() {
            return Err(EngineError::UnknownVehicle(vehicle));
        }
        if from.0 >= self.num_vars() {
            return Err(EngineError::UnknownVariable(from.0));
        }
        if to.0 >= self.num_vars() {
            return Err(EngineError::UnknownVariable(to.0));
        }
        // One shared evaluator serves every vehicle; the vehicle id is
        // validated so per-vehicle evaluators could slot in later.
        Ok(self.arc_cost_value(self.var_node(from), self.var_node(to)))
    }
}
