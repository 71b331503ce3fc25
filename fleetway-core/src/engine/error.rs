use thiserror::Error;

/// Errors from [`crate::engine::RoutingEngine`] and
/// [`crate::engine::EngineModel`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// An open-model operation was invoked after [`close`] ran.
    ///
    /// Dimension and constraint declarations allocate decision variables at
    /// close time; a closed model rejects further declarations instead of
    /// ignoring them.
    ///
    /// [`close`]: crate::engine::EngineModel::close
    #[error("model is closed; `{operation}` requires an open model")]
    ModelClosed {
        /// Name of the rejected operation.
        operation: &'static str,
    },
    /// A closed-model operation was invoked before [`close`] ran.
    ///
    /// Locks, search and assignment introspection need the decision
    /// variables that only exist once the model is closed.
    ///
    /// [`close`]: crate::engine::EngineModel::close
    #[error("model is still open; `{operation}` requires a closed model")]
    ModelOpen {
        /// Name of the rejected operation.
        operation: &'static str,
    },
    /// A dimension id did not name a registered dimension.
    #[error("unknown dimension id {0}")]
    UnknownDimension(usize),
    /// A variable index was outside the model's variable range.
    #[error("variable index {0} is out of range")]
    UnknownVariable(usize),
    /// A vehicle id was outside `[0, num_vehicles)`.
    #[error("vehicle {0} is out of range")]
    UnknownVehicle(usize),
    /// The requested model topology cannot be built.
    #[error("invalid model topology: {reason}")]
    InvalidTopology {
        /// Backend-reported reason.
        reason: String,
    },
    /// Any other backend-specific failure.
    #[error("engine failure: {0}")]
    Backend(String),
}
