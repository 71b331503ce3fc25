use thiserror::Error;

use crate::InstanceError;
use crate::engine::EngineError;

/// Errors terminating a solve request.
///
/// All variants are terminal: there is no retry and no partial result.
/// Validation failures surface synchronously at submission; the remaining
/// variants travel the same result channel as a success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolveError {
    /// The instance failed validation before any model work began.
    #[error("invalid instance: {0}")]
    InvalidInstance(#[from] InstanceError),
    /// A route-lock prefix was inconsistent with the closed model. Reported
    /// before the search is invoked; distinct from [`Self::NoSolution`].
    #[error("invalid locks")]
    InvalidLocks,
    /// The engine completed its search without a success-status assignment.
    /// Expected traffic for infeasible instances, not a bug.
    #[error("unable to find a solution")]
    NoSolution,
    /// The engine rejected an operation or failed internally.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// The background task terminated without publishing a result.
    #[error("solve task terminated without publishing a result")]
    Lost,
}
