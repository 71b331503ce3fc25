//! Capability contract for routing-solver backends.
//!
//! The orchestration layer never implements search itself. It drives an
//! opaque engine through a narrow capability surface: build a model, attach
//! an arc-cost evaluator and cumulative dimensions, post pairing
//! constraints, close the model, apply route locks, solve, and introspect
//! the resulting assignment. Any constraint-based routing backend that can
//! satisfy [`RoutingEngine`], [`EngineModel`] and [`EngineAssignment`] can
//! sit behind the orchestrator.
//!
//! Models move through an explicit two-state lifecycle, open then closed,
//! with a single one-way transition at [`EngineModel::close`]. Operations
//! invoked in the wrong state must fail loudly with
//! [`EngineError::ModelClosed`] or [`EngineError::ModelOpen`] rather than
//! silently doing nothing.

mod error;
mod model;

pub use error::EngineError;
pub use model::{
    ArcEvaluator, DimensionCapacity, DimensionId, DimensionSpec, EngineAssignment, EngineModel,
    FirstSolutionStrategy, ModelParameters, ModelTopology, RoutingEngine, SearchParameters,
    VarIndex,
};
