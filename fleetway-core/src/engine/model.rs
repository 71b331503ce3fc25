//! Engine model, assignment and tuning-parameter types.

use std::sync::Arc;
use std::time::Duration;

use crate::NodeIndex;

use super::error::EngineError;

/// Binary evaluator over an arc's endpoints, shared with the engine.
///
/// Evaluators are registered once and then invoked from inside the engine's
/// search, possibly from a worker thread, so they must be `Send + Sync` and
/// cheap to call.
pub type ArcEvaluator = Arc<dyn Fn(NodeIndex, NodeIndex) -> i64 + Send + Sync>;

/// Index of a decision variable inside a built model.
///
/// Distinct from [`NodeIndex`]: besides one variable per node, the engine
/// allocates separate start and end variables per vehicle, all addressed
/// through this index space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarIndex(pub usize);

/// Handle to a registered cumulative dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DimensionId(pub usize);

/// Shape of the model to build: node count, fleet size and the shared depot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelTopology {
    /// Number of nodes, including the depot.
    pub num_nodes: usize,
    /// Number of vehicles.
    pub num_vehicles: usize,
    /// Depot node shared by every vehicle.
    pub depot: NodeIndex,
}

/// Total capacity of a dimension, uniform or per vehicle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimensionCapacity {
    /// One capacity shared by every vehicle.
    Uniform(i64),
    /// One capacity per vehicle, indexed by vehicle id.
    PerVehicle(Vec<i64>),
}

/// Declaration of a cumulative dimension.
///
/// A dimension tracks a resource accumulating along each route: the value at
/// the next stop is the value at the current stop plus the evaluator's
/// transit for the traversed arc, plus up to `slack_max` of slack (waiting).
/// Every cumulative variable is bounded by the dimension's capacity.
#[derive(Clone)]
pub struct DimensionSpec {
    /// Dimension name, e.g. `"time"` or `"capacity"`.
    pub name: &'static str,
    /// Transit evaluator over arc endpoints.
    pub evaluator: ArcEvaluator,
    /// Maximum slack insertable at each stop; zero forbids waiting.
    pub slack_max: i64,
    /// Upper bound on the cumulative value.
    pub capacity: DimensionCapacity,
    /// Fix each vehicle's cumulative value to zero at its start variable.
    pub fix_start_cumul_to_zero: bool,
}

/// Tuning options recognised by the engine when building a model.
///
/// The orchestration layer passes these through unmodified and never
/// interprets their contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelParameters {
    /// Upper bound on cached evaluator entries kept by the backend, if it
    /// caches at all.
    pub evaluator_cache_capacity: Option<usize>,
}

/// Strategy for the engine's first solution or expansion ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FirstSolutionStrategy {
    /// Let the engine pick.
    #[default]
    Automatic,
    /// Prefer the cheapest outgoing arc when extending a route.
    CheapestArc,
    /// Extend routes in node-id order.
    InputOrder,
}

/// Tuning options recognised by the engine's search.
///
/// Passed through the orchestration layer unmodified; the only time bound on
/// a solve is whatever limit is configured here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchParameters {
    /// Wall-clock budget for the search.
    pub time_limit: Option<Duration>,
    /// Stop after this many improving solutions.
    pub solution_limit: Option<u64>,
    /// First-solution / expansion-ordering strategy.
    pub first_solution: FirstSolutionStrategy,
}

/// A routing-solver backend able to build constraint models.
pub trait RoutingEngine {
    /// Model type produced by this engine.
    type Model: EngineModel;

    /// Construct an open model for the given topology.
    fn build_model(
        &self,
        topology: ModelTopology,
        parameters: &ModelParameters,
    ) -> Result<Self::Model, EngineError>;
}

/// A constraint model moving through the open → closed lifecycle.
///
/// Declarations ([`set_arc_cost_evaluator`], [`add_dimension`],
/// [`set_cumul_range`], constraint posting) are valid only while the model
/// is open; locks, search and post-solve introspection only once it is
/// closed. Wrong-state calls return [`EngineError::ModelClosed`] or
/// [`EngineError::ModelOpen`].
///
/// [`set_arc_cost_evaluator`]: Self::set_arc_cost_evaluator
/// [`add_dimension`]: Self::add_dimension
/// [`set_cumul_range`]: Self::set_cumul_range
pub trait EngineModel {
    /// Solved assignment type produced by [`solve`](Self::solve).
    type Assignment: EngineAssignment;

    /// Register the arc-cost evaluator shared by all vehicles.
    fn set_arc_cost_evaluator(&mut self, evaluator: ArcEvaluator) -> Result<(), EngineError>;

    /// Register a cumulative dimension and return its handle.
    fn add_dimension(&mut self, spec: DimensionSpec) -> Result<DimensionId, EngineError>;

    /// Restrict a node's cumulative variable for `dimension` to
    /// `[min, max]`, intersected with the dimension's capacity bounds. An
    /// empty intersection makes the model infeasible; the engine reports
    /// that at solve time rather than here.
    fn set_cumul_range(
        &mut self,
        dimension: DimensionId,
        node: NodeIndex,
        min: i64,
        max: i64,
    ) -> Result<(), EngineError>;

    /// Constrain two variables to be served by the same vehicle.
    fn add_same_vehicle(&mut self, first: VarIndex, second: VarIndex) -> Result<(), EngineError>;

    /// Constrain `before`'s cumulative value for `dimension` to be less
    /// than or equal to `after`'s.
    fn add_cumul_precedence(
        &mut self,
        dimension: DimensionId,
        before: VarIndex,
        after: VarIndex,
    ) -> Result<(), EngineError>;

    /// Register a pickup-delivery pair with the engine's native
    /// bookkeeping.
    ///
    /// This is required in addition to the explicit constraints posted via
    /// [`add_same_vehicle`](Self::add_same_vehicle) and
    /// [`add_cumul_precedence`](Self::add_cumul_precedence): the explicit
    /// constraints alone give the engine's search heuristics no visibility
    /// into the pairing.
    fn add_pickup_delivery_pair(
        &mut self,
        pickup: NodeIndex,
        delivery: NodeIndex,
    ) -> Result<(), EngineError>;

    /// Finalize the model, allocating its decision variables. One-way; all
    /// further declarations are rejected.
    fn close(&mut self) -> Result<(), EngineError>;

    /// Translate a node into its decision-variable index.
    fn node_to_index(&self, node: NodeIndex) -> Result<VarIndex, EngineError>;

    /// Force each vehicle onto its mandatory route prefix, without forcing
    /// routes to terminate after the prefix. Closed-model only. Returns
    /// `Ok(false)` when any prefix is inconsistent with the model; the
    /// application is atomic, so `false` means nothing was locked.
    fn apply_locks(&mut self, locks: &[Vec<NodeIndex>]) -> Result<bool, EngineError>;

    /// Run the search to completion under `parameters`. Returns `Ok(None)`
    /// when the search finishes without a success-status assignment.
    fn solve(&self, parameters: &SearchParameters)
    -> Result<Option<Self::Assignment>, EngineError>;

    /// Start variable of a vehicle's route chain.
    fn vehicle_start(&self, vehicle: usize) -> Result<VarIndex, EngineError>;

    /// Whether a variable is some vehicle's end variable.
    fn is_end(&self, index: VarIndex) -> bool;

    /// Cost of traversing the arc `from → to` with `vehicle`, as evaluated
    /// by the registered cost evaluator for that vehicle.
    fn arc_cost_for_vehicle(
        &self,
        from: VarIndex,
        to: VarIndex,
        vehicle: usize,
    ) -> Result<i64, EngineError>;
}

/// A solved binding of all decision variables.
pub trait EngineAssignment {
    /// Objective value of the assignment.
    fn objective_value(&self) -> i64;

    /// Reconstruct the per-vehicle visited-node sequences, depot start and
    /// end excluded.
    fn routes(&self) -> Vec<Vec<NodeIndex>>;

    /// Successor of a variable in the solved route chain.
    fn next_var(&self, index: VarIndex) -> Result<VarIndex, EngineError>;

    /// Solved `[min, max]` bounds of a cumulative variable. A value pinned
    /// by the search yields `min == max`; a remaining feasible range keeps
    /// `min < max`.
    fn cumul_bounds(&self, dimension: DimensionId, index: VarIndex)
    -> Result<(i64, i64), EngineError>;
}
