//! Routing instances and their validation.
//!
//! An [`Instance`] bundles everything a solve needs: the cost and duration
//! matrices, per-node time windows and demands, the fleet description, route
//! locks, and pickup-delivery pairs. The heavyweight inputs are held behind
//! [`Arc`] so concurrent solves share them read-only without copying.
//! [`Instance::validate`] is the input validator: it checks the cross-field
//! invariants synchronously, before any background work is scheduled.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::SquareMatrix;
use crate::engine::ModelTopology;

/// Identifier of a location in the routing instance.
///
/// Valid values lie in `[0, num_nodes)`; one distinguished node is the depot
/// shared by every vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct NodeIndex(u32);

impl NodeIndex {
    /// Wrap a raw node id.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Raw node id.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Node id as a `usize` for matrix and slice addressing.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "node counts fit in usize on supported targets"
    )]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for NodeIndex {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The single service window of a node: arrival must fall in
/// `[start, stop]`.
///
/// A window with `start > stop` is not rejected here; it makes the model
/// infeasible and the engine reports that as "no solution".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeWindow {
    /// Earliest admissible arrival.
    pub start: i64,
    /// Latest admissible arrival.
    pub stop: i64,
}

/// A fully specified VRPTW-PD instance.
///
/// All fields are immutable for the duration of a solve; the `Arc`-held
/// inputs may be shared across concurrent solves.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use fleetway_core::{Instance, NodeIndex, SquareMatrix, TimeWindow};
///
/// let instance = Instance {
///     costs: Arc::new(SquareMatrix::uniform(2, 1)),
///     durations: Arc::new(SquareMatrix::uniform(2, 1)),
///     time_windows: Arc::new(vec![TimeWindow { start: 0, stop: 100 }; 2]),
///     demands: Arc::new(vec![0; 2]),
///     num_nodes: 2,
///     num_vehicles: 1,
///     depot: NodeIndex::new(0),
///     time_horizon: 100,
///     vehicle_capacities: vec![10],
///     route_locks: vec![Vec::new()],
///     pickups: Vec::new(),
///     deliveries: Vec::new(),
/// };
/// assert!(instance.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct Instance {
    /// Arc travel costs; `dim()` must equal [`Self::num_nodes`].
    pub costs: Arc<SquareMatrix>,
    /// Arc travel durations; `dim()` must equal [`Self::num_nodes`].
    pub durations: Arc<SquareMatrix>,
    /// One service window per node.
    pub time_windows: Arc<Vec<TimeWindow>>,
    /// Capacity consumed by visiting a node, indexed by node. The demand
    /// evaluator reads the origin node of an arc; the destination is
    /// ignored.
    pub demands: Arc<Vec<i64>>,
    /// Number of nodes, including the depot.
    pub num_nodes: usize,
    /// Number of vehicles in the fleet.
    pub num_vehicles: usize,
    /// The depot every vehicle starts from and returns to.
    pub depot: NodeIndex,
    /// Upper bound on any vehicle's cumulative time, and on waiting slack.
    pub time_horizon: i64,
    /// One capacity per vehicle; heterogeneous fleets are supported.
    pub vehicle_capacities: Vec<i64>,
    /// One mandatory route prefix per vehicle; depot excluded.
    pub route_locks: Vec<Vec<NodeIndex>>,
    /// Pickup nodes, parallel to [`Self::deliveries`].
    pub pickups: Vec<NodeIndex>,
    /// Delivery nodes, parallel to [`Self::pickups`].
    pub deliveries: Vec<NodeIndex>,
}

/// Reasons an instance fails validation.
///
/// Each variant corresponds to one of the cross-field invariants checked by
/// [`Instance::validate`]; validation short-circuits on the first violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstanceError {
    /// Matrix dimensions or per-node sequence lengths disagree with the
    /// node count.
    #[error("expected costs, durations, time window and demand sizes to match the node count")]
    DimensionMismatch,
    /// The number of lock sequences disagrees with the vehicle count.
    #[error("expected route locks size to match the vehicle count")]
    LockCountMismatch,
    /// A locked node lies outside `[0, num_nodes)`.
    #[error("expected nodes in route locks to be in [0, {num_nodes}), found {node}")]
    LockNodeOutOfRange {
        /// The offending node.
        node: NodeIndex,
        /// The instance's node count.
        num_nodes: usize,
    },
    /// The depot appeared inside a lock sequence.
    #[error("expected the depot not to be in route locks")]
    DepotInLock {
        /// Vehicle whose lock sequence names the depot.
        vehicle: usize,
    },
    /// Pickups and deliveries are not parallel arrays.
    #[error("expected pickups and deliveries parallel array sizes to match")]
    PickupDeliveryMismatch {
        /// Number of pickups supplied.
        pickups: usize,
        /// Number of deliveries supplied.
        deliveries: usize,
    },
}

impl Instance {
    /// Check the cross-field invariants, short-circuiting on the first
    /// violation. Performs no mutation and no allocation.
    pub fn validate(&self) -> Result<(), InstanceError> {
        let dims_ok = self.costs.dim() == self.num_nodes
            && self.durations.dim() == self.num_nodes
            && self.time_windows.len() == self.num_nodes
            && self.demands.len() == self.num_nodes;
        if !dims_ok {
            return Err(InstanceError::DimensionMismatch);
        }

        if self.route_locks.len() != self.num_vehicles {
            return Err(InstanceError::LockCountMismatch);
        }

        for (vehicle, locks) in self.route_locks.iter().enumerate() {
            for &node in locks {
                if node.index() >= self.num_nodes {
                    return Err(InstanceError::LockNodeOutOfRange {
                        node,
                        num_nodes: self.num_nodes,
                    });
                }
                if node == self.depot {
                    return Err(InstanceError::DepotInLock { vehicle });
                }
            }
        }

        if self.pickups.len() != self.deliveries.len() {
            return Err(InstanceError::PickupDeliveryMismatch {
                pickups: self.pickups.len(),
                deliveries: self.deliveries.len(),
            });
        }

        Ok(())
    }

    /// The model topology handed to the engine when a solve begins.
    #[must_use]
    pub const fn topology(&self) -> ModelTopology {
        ModelTopology {
            num_nodes: self.num_nodes,
            num_vehicles: self.num_vehicles,
            depot: self.depot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::small_instance;
    use rstest::{fixture, rstest};

    #[fixture]
    fn instance() -> Instance {
        small_instance(4, 2)
    }

    #[rstest]
    fn valid_instance_passes(instance: Instance) {
        assert_eq!(instance.validate(), Ok(()));
    }

    #[rstest]
    fn mismatched_costs_dimension_is_rejected(mut instance: Instance) {
        instance.costs = Arc::new(SquareMatrix::uniform(3, 1));
        assert_eq!(instance.validate(), Err(InstanceError::DimensionMismatch));
    }

    #[rstest]
    fn mismatched_time_windows_are_rejected(mut instance: Instance) {
        instance.time_windows = Arc::new(vec![TimeWindow { start: 0, stop: 10 }; 3]);
        assert_eq!(instance.validate(), Err(InstanceError::DimensionMismatch));
    }

    #[rstest]
    fn lock_count_must_match_vehicles(mut instance: Instance) {
        instance.route_locks.push(Vec::new());
        assert_eq!(instance.validate(), Err(InstanceError::LockCountMismatch));
    }

    #[rstest]
    fn locked_node_must_be_in_range(mut instance: Instance) {
        instance.route_locks[0].push(NodeIndex::new(9));
        assert_eq!(
            instance.validate(),
            Err(InstanceError::LockNodeOutOfRange {
                node: NodeIndex::new(9),
                num_nodes: 4
            })
        );
    }

    #[rstest]
    fn depot_may_not_be_locked(mut instance: Instance) {
        instance.route_locks[1].push(instance.depot);
        assert_eq!(
            instance.validate(),
            Err(InstanceError::DepotInLock { vehicle: 1 })
        );
    }

    #[rstest]
    fn pickups_and_deliveries_must_be_parallel(mut instance: Instance) {
        instance.pickups.push(NodeIndex::new(1));
        assert_eq!(
            instance.validate(),
            Err(InstanceError::PickupDeliveryMismatch {
                pickups: 1,
                deliveries: 0
            })
        );
    }

    #[rstest]
    fn dimension_check_runs_before_lock_checks(mut instance: Instance) {
        instance.demands = Arc::new(vec![0; 2]);
        instance.route_locks.push(Vec::new());
        assert_eq!(instance.validate(), Err(InstanceError::DimensionMismatch));
    }
}
