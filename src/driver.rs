//! Test driver
//!
//! Sequence of one run:
//!
//! 1. Hold the suspend barrier, arm the readiness latch, start the worker.
//! 2. Wait (bounded) for the worker to signal that it is parked.
//! 3. With the barrier still held, issue the three invalid pop-frame calls:
//!    null thread, invalid thread, live-but-unsuspended worker.
//! 4. Release the barrier and hand back the outcome without joining.
//!
//! A failing check does not stop the sequence; a readiness failure does.

use std::sync::Arc;
use std::time::{Duration, Instant};

use popframe_protocol::{CheckCategory, Encoding, PopCase, Verdict, FAILED, PASSED};
use serde::{Deserialize, Serialize};

use crate::agent::PopFrameBoundary;
use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::runtime::ThreadRuntime;
use crate::state::RunState;
use crate::sync::{Latch, SuspendBarrier};
use crate::worker::{self, WorkerContext, WorkerThread};

/// Per-check classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckResult {
    Passed,
    Failed,
}

/// Outcome of one boundary check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub number: u8,
    pub category: CheckCategory,
    pub case: PopCase,
    /// Raw status from the boundary
    pub status: i32,
    pub result: CheckResult,
    /// The boundary answered exactly `PASSED`, i.e. it saw the expected
    /// rejection. Diagnostic only.
    pub observed_rejection: bool,
}

impl CheckOutcome {
    fn classify(category: CheckCategory, case: PopCase, status: i32) -> Self {
        Self {
            number: category.check_number(),
            category,
            case,
            status,
            result: if status == FAILED {
                CheckResult::Failed
            } else {
                CheckResult::Passed
            },
            observed_rejection: status == PASSED,
        }
    }

    fn passed_message(&self) -> String {
        format!(
            "Check #{} PASSED:\n\tPopFrame(), being invoked with {},\n\treturned the appropriate error {}",
            self.number,
            self.category.describe(),
            self.category.expected_rejection()
        )
    }
}

/// Everything a run leaves behind
#[derive(Debug)]
pub struct RunOutcome {
    /// Aggregate verdict at the moment the barrier was released
    pub verdict: Verdict,
    pub encoding: Encoding,
    pub checks: Vec<CheckOutcome>,
    /// Infrastructure failure that ended the run early
    pub abort: Option<HarnessError>,
    pub worker: Option<WorkerThread>,
    pub state: Arc<RunState>,
    pub duration: Duration,
}

impl RunOutcome {
    /// Wait up to `timeout` for the worker's post-hoc checks, then return the
    /// aggregate verdict including anything the worker observed.
    pub fn settle(&self, timeout: Duration) -> Verdict {
        if let Some(worker) = &self.worker {
            if !timeout.is_zero() {
                worker.wait_finished(timeout);
            }
        }
        self.state.verdict()
    }

    /// The worker completed strictly after the barrier was released, or has
    /// not completed yet. The release is stamped while the barrier is still
    /// held, so a tie means the worker got through early.
    pub fn ordering_holds(&self) -> bool {
        let completed = self.worker.as_ref().and_then(|w| w.completed_at());
        match (completed, self.state.barrier_released_at()) {
            (None, _) => true,
            (Some(done), Some(released)) => done > released,
            (Some(_), None) => false,
        }
    }
}

/// Runs the check sequence against a boundary
pub struct Driver {
    config: HarnessConfig,
    runtime: Arc<dyn ThreadRuntime>,
    boundary: Arc<dyn PopFrameBoundary>,
}

impl Driver {
    pub fn new(
        config: HarnessConfig,
        runtime: Arc<dyn ThreadRuntime>,
        boundary: Arc<dyn PopFrameBoundary>,
    ) -> Self {
        Self {
            config,
            runtime,
            boundary,
        }
    }

    /// Run once with the given shared state
    pub fn run(&self, state: Arc<RunState>) -> RunOutcome {
        let start = Instant::now();
        let encoding = self.config.encoding();
        let barrier = Arc::new(SuspendBarrier::new());
        let ready = Arc::new(Latch::new());

        let hold = barrier.hold();

        let (worker, abort) = self.start_worker(&state, &barrier, &ready);

        let mut checks = Vec::with_capacity(CheckCategory::ALL.len());
        if let Some(worker) = worker.as_ref().filter(|_| abort.is_none()) {
            for category in CheckCategory::ALL {
                checks.push(self.check(&state, category, encoding, worker));
            }
        }

        let verdict = state.verdict();
        state.mark_barrier_released();
        drop(hold);

        RunOutcome {
            verdict,
            encoding,
            checks,
            abort,
            worker,
            state,
            duration: start.elapsed(),
        }
    }

    /// Start the worker and wait for it to park. An error here is fatal
    /// for the run; the worker handle is still returned when one exists so
    /// the caller can observe it after the barrier is released.
    fn start_worker(
        &self,
        state: &Arc<RunState>,
        barrier: &Arc<SuspendBarrier>,
        ready: &Arc<Latch>,
    ) -> (Option<WorkerThread>, Option<HarnessError>) {
        let name = &self.config.worker_name;

        let armed = match ready.arm() {
            Ok(armed) => armed,
            Err(e) => return (None, Some(fatal(state, name, HarnessError::from_readiness(e)))),
        };

        let ctx = WorkerContext {
            state: Arc::clone(state),
            ready: Arc::clone(ready),
            barrier: Arc::clone(barrier),
            runtime: Arc::clone(&self.runtime),
        };
        let worker = match worker::spawn(name, ctx) {
            Ok(worker) => worker,
            Err(e) => return (None, Some(fatal(state, name, e))),
        };

        match armed.wait(self.config.timeouts.ready_timeout()) {
            Ok(()) => (Some(worker), None),
            Err(e) => {
                let err = fatal(state, &worker.to_string(), HarnessError::from_readiness(e));
                (Some(worker), Some(err))
            }
        }
    }

    fn check(
        &self,
        state: &RunState,
        category: CheckCategory,
        encoding: Encoding,
        worker: &WorkerThread,
    ) -> CheckOutcome {
        let case = PopCase::new(category, encoding);
        let status = self.boundary.do_pop_frame(case, worker);
        let outcome = CheckOutcome::classify(category, case, status);

        match category {
            // First check seeds the aggregate.
            CheckCategory::NullThread => state.record_status(status),
            _ if status == FAILED => {
                state.mark_pop_done();
                state.record_failure();
            }
            _ => {}
        }

        if outcome.observed_rejection {
            state.console().info(outcome.passed_message());
        }
        outcome
    }
}

/// Report an infrastructure failure and fail the run
fn fatal(state: &RunState, target: &str, err: HarnessError) -> HarnessError {
    state
        .console()
        .fail(format!("TEST FAILURE: waiting for {}: {}", target, err));
    state.record_failure();
    err
}
