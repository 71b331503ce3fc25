//! Background execution and the one-way result handoff.
//!
//! Each submitted request becomes one unit of work on a worker thread;
//! validation runs synchronously in [`SolverPool::submit`] so malformed
//! requests are rejected before they consume a worker slot. The fully
//! computed result crosses back to the caller through a bounded
//! single-producer channel: nothing partially computed ever crosses the
//! boundary, and completions across requests arrive in no particular
//! order.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, sync_channel};

use fleetway_core::engine::{ModelParameters, RoutingEngine, SearchParameters};
use fleetway_core::{Instance, InstanceError, RoutingSolution, SolveError};

use crate::Orchestrator;

/// Pool of background workers running solve pipelines.
pub struct SolverPool<E: RoutingEngine> {
    orchestrator: Arc<Orchestrator<E>>,
    pool: rayon::ThreadPool,
}

/// Receiving end of one request's result handoff.
///
/// Dropping the handle abandons the result; the background solve still runs
/// to completion.
#[must_use]
pub struct SolutionHandle {
    receiver: Receiver<Result<RoutingSolution, SolveError>>,
}

impl SolutionHandle {
    /// Block until the request's result is published.
    ///
    /// [`SolveError::Lost`] is returned if the background task terminated
    /// without publishing, e.g. after a panic in an engine callback.
    pub fn wait(self) -> Result<RoutingSolution, SolveError> {
        self.receiver.recv().unwrap_or(Err(SolveError::Lost))
    }
}

impl<E> SolverPool<E>
where
    E: RoutingEngine + Send + Sync + 'static,
{
    /// Build a pool with rayon's default thread count.
    ///
    /// # Errors
    ///
    /// Propagates [`rayon::ThreadPoolBuildError`] when worker threads
    /// cannot be spawned.
    pub fn new(engine: E) -> Result<Self, rayon::ThreadPoolBuildError> {
        Self::with_threads(engine, 0)
    }

    /// Build a pool with an explicit thread count; zero means rayon's
    /// default.
    ///
    /// # Errors
    ///
    /// Propagates [`rayon::ThreadPoolBuildError`] when worker threads
    /// cannot be spawned.
    pub fn with_threads(engine: E, threads: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        // Without a handler a panicking job aborts the process; with one
        // the worker survives, the job's sender is dropped during
        // unwinding, and the caller's `wait` observes `SolveError::Lost`.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("fleetway-solve-{index}"))
            .panic_handler(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                    .unwrap_or("opaque panic payload");
                log::error!("background solve panicked: {message}");
            })
            .build()?;
        Ok(Self {
            orchestrator: Arc::new(Orchestrator::new(engine)),
            pool,
        })
    }

    /// Validate a request and schedule its solve on a worker.
    ///
    /// Validation failures surface synchronously and schedule nothing; all
    /// later failures travel through the returned handle, in the same slot
    /// a success would use.
    pub fn submit(
        &self,
        instance: Instance,
        model_parameters: ModelParameters,
        search_parameters: SearchParameters,
    ) -> Result<SolutionHandle, InstanceError> {
        instance.validate()?;
        let (sender, receiver) = sync_channel(1);
        let orchestrator = Arc::clone(&self.orchestrator);
        self.pool.spawn(move || {
            let result = orchestrator.solve(&instance, &model_parameters, &search_parameters);
            if let Err(error) = &result {
                log::warn!("background solve failed: {error}");
            }
            if sender.send(result).is_err() {
                log::debug!("solve result dropped: caller abandoned the handle");
            }
        });
        Ok(SolutionHandle { receiver })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use fleetway_core::engine::{EngineError, ModelTopology};
    use fleetway_core::test_support::small_instance;
    use fleetway_engine_exact::{ExactEngine, ExactModel};
    use rstest::rstest;

    fn pool() -> SolverPool<ExactEngine> {
        SolverPool::with_threads(ExactEngine::new(), 2).expect("pool builds")
    }

    struct PanickingEngine;

    impl RoutingEngine for PanickingEngine {
        type Model = ExactModel;

        #[expect(
            clippy::panic_in_result_fn,
            reason = "the panic is the behaviour under test"
        )]
        fn build_model(
            &self,
            _topology: ModelTopology,
            _parameters: &ModelParameters,
        ) -> Result<ExactModel, EngineError> {
            panic!("engine backend gave up")
        }
    }

    #[rstest]
    fn malformed_requests_fail_before_scheduling() {
        let pool = pool();
        let mut instance = small_instance(3, 1);
        instance.route_locks.clear();
        let result = pool.submit(
            instance,
            ModelParameters::default(),
            SearchParameters::default(),
        );
        assert_eq!(result.err(), Some(InstanceError::LockCountMismatch));
    }

    #[rstest]
    fn results_arrive_per_request() {
        let pool = pool();
        let handles: Vec<SolutionHandle> = (2..5)
            .map(|nodes| {
                pool.submit(
                    small_instance(nodes, 1),
                    ModelParameters::default(),
                    SearchParameters::default(),
                )
                .expect("valid instance")
            })
            .collect();
        for (nodes, handle) in (2..5).zip(handles) {
            let solution = handle.wait().expect("feasible instance");
            let visited: usize = solution.routes.iter().map(Vec::len).sum();
            assert_eq!(visited, nodes - 1);
        }
    }

    #[rstest]
    fn a_panicked_worker_reports_its_result_as_lost() {
        let pool = SolverPool::with_threads(PanickingEngine, 1).expect("pool builds");
        let handle = pool
            .submit(
                small_instance(3, 1),
                ModelParameters::default(),
                SearchParameters::default(),
            )
            .expect("valid instance");
        assert_eq!(handle.wait(), Err(SolveError::Lost));
    }

    #[rstest]
    fn shared_inputs_serve_concurrent_solves() {
        let pool = pool();
        let template = small_instance(4, 2);
        let handles: Vec<SolutionHandle> = (0..4)
            .map(|_| {
                // Cloning shares the Arc-held matrices across all submissions.
                pool.submit(
                    template.clone(),
                    ModelParameters::default(),
                    SearchParameters::default(),
                )
                .expect("valid instance")
            })
            .collect();
        let costs: Vec<i64> = handles
            .into_iter()
            .map(|handle| handle.wait().expect("feasible instance").cost)
            .collect();
        assert!(costs.windows(2).all(|pair| pair.first() == pair.last()));
    }
}
