//! Pop-frame conformance harness
//!
//! Checks that a runtime's pop-frame facility rejects three invalid calls
//! (null thread, invalid thread, thread not suspended) and that none of the
//! rejected calls has a side effect on the targeted thread.
//!
//! The driver parks a worker thread on a barrier, waits for it to say it is
//! parked, runs the three checks through a [`PopFrameBoundary`], and then
//! lets the worker go. The worker's own completion check catches any frame
//! that was popped when it should not have been.

pub mod agent;
pub mod config;
pub mod driver;
pub mod error;
pub mod report;
pub mod runtime;
pub mod state;
pub mod sync;
pub mod timeout;
pub mod worker;

use std::sync::Arc;

pub use agent::{AgentBoundary, BoundaryCall, PopFrameBoundary};
pub use config::{EffectiveConfig, EncodingMode, HarnessConfig};
pub use driver::{CheckOutcome, CheckResult, Driver, RunOutcome};
pub use error::{HarnessError, HarnessResult};
pub use popframe_protocol::{CheckCategory, PopCase, RuntimeError, Verdict};
pub use report::RunReport;
pub use runtime::{SimulatedRuntime, ThreadArg, ThreadId, ThreadRuntime};
pub use state::{Console, RunState};

/// A finished, settled run
#[derive(Debug)]
pub struct HarnessRun {
    pub outcome: RunOutcome,
    /// Verdict after the worker's post-hoc checks (or the settle timeout)
    pub verdict: Verdict,
    pub report: RunReport,
}

/// Run once against a fresh [`SimulatedRuntime`] with the configured
/// injections installed.
pub fn run_simulated(config: &HarnessConfig, console: Arc<Console>) -> HarnessResult<HarnessRun> {
    let runtime = Arc::new(SimulatedRuntime::with_injections(config.injections()?));
    Ok(run_with_runtime(config, console, runtime))
}

/// Run once against `runtime` through an [`AgentBoundary`], settle, and
/// build the report.
pub fn run_with_runtime<R>(config: &HarnessConfig, console: Arc<Console>, runtime: Arc<R>) -> HarnessRun
where
    R: ThreadRuntime + 'static,
{
    let boundary = Arc::new(AgentBoundary::new(runtime.clone(), Arc::clone(&console)));
    let driver = Driver::new(config.clone(), runtime.clone(), boundary.clone());

    let outcome = driver.run(Arc::new(RunState::new(console)));
    let verdict = outcome.settle(config.timeouts.settle_timeout());

    let frames_popped = outcome
        .worker
        .as_ref()
        .map_or(0, |w| runtime.pop_count(w.id()));
    let report = RunReport::from_outcome(&outcome, verdict, boundary.calls(), frames_popped);

    HarnessRun {
        outcome,
        verdict,
        report,
    }
}
