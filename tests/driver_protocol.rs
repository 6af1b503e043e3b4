//! Driver/worker protocol tests
//!
//! Exercises complete runs against the simulated runtime:
//! - every rejection path classified correctly on a conforming runtime
//! - a misbehaving runtime turns the verdict FAILED and the worker's late
//!   completion is flagged
//! - readiness never arriving ends the run without issuing any check
//! - the worker never gets past the barrier while checks are in flight

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use popframe_harness::agent::AgentBoundary;
use popframe_harness::runtime::FailureConfig;
use popframe_harness::state::Level;
use popframe_harness::timeout::WaitConfig;
use popframe_harness::worker::WorkerThread;
use popframe_harness::{
    run_simulated, run_with_runtime, CheckCategory, CheckResult, Console, Driver, EncodingMode,
    HarnessConfig, HarnessError, PopCase, PopFrameBoundary, RunState, RuntimeError,
    SimulatedRuntime, ThreadRuntime, Verdict,
};
use popframe_protocol::{Encoding, FAILED, PASSED};

const SETTLE: Duration = Duration::from_secs(5);

fn config() -> HarnessConfig {
    HarnessConfig {
        timeouts: WaitConfig {
            ready_ms: 5_000,
            settle_ms: 5_000,
        },
        ..HarnessConfig::default()
    }
}

fn quiet() -> Arc<Console> {
    Arc::new(Console::silent(false))
}

/// Boundary that returns scripted statuses and records whether the worker
/// was still parked at each call
struct ScriptedBoundary {
    statuses: Mutex<VecDeque<i32>>,
    parked_at_call: Mutex<Vec<bool>>,
    cases: Mutex<Vec<PopCase>>,
}

impl ScriptedBoundary {
    fn new(statuses: &[i32]) -> Self {
        Self {
            statuses: Mutex::new(statuses.iter().copied().collect()),
            parked_at_call: Mutex::new(Vec::new()),
            cases: Mutex::new(Vec::new()),
        }
    }
}

impl PopFrameBoundary for ScriptedBoundary {
    fn do_pop_frame(&self, case: PopCase, worker: &WorkerThread) -> i32 {
        // Give a wrongly released worker time to run through.
        std::thread::sleep(Duration::from_millis(10));
        self.parked_at_call
            .lock()
            .unwrap()
            .push(worker.is_started() && worker.completed_at().is_none() && !worker.is_finished());
        self.cases.lock().unwrap().push(case);
        self.statuses.lock().unwrap().pop_front().unwrap_or(PASSED)
    }
}

fn scripted_driver(statuses: &[i32], config: HarnessConfig) -> (Driver, Arc<ScriptedBoundary>) {
    let runtime = Arc::new(SimulatedRuntime::new());
    let boundary = Arc::new(ScriptedBoundary::new(statuses));
    (Driver::new(config, runtime, boundary.clone()), boundary)
}

// =============================================================================
// Conforming runtime
// =============================================================================

#[test]
fn test_all_checks_pass_and_exit_code_is_base() {
    let run = run_simulated(&config(), quiet()).unwrap();

    assert_eq!(run.verdict, Verdict::Passed);
    assert_eq!(run.outcome.verdict, Verdict::Passed);
    assert_eq!(run.report.exit_code, 95);
    assert_eq!(run.outcome.checks.len(), 3);
    assert!(run
        .outcome
        .checks
        .iter()
        .all(|c| c.result == CheckResult::Passed && c.observed_rejection));

    let worker = run.outcome.worker.as_ref().unwrap();
    assert!(worker.is_finished());
    assert!(worker.completed_normally());
    assert!(run.report.failures.is_empty());
}

#[test]
fn test_checks_issued_in_order_with_expected_rejections() {
    let run = run_simulated(&config(), quiet()).unwrap();

    let numbers: Vec<u8> = run.outcome.checks.iter().map(|c| c.number).collect();
    assert_eq!(numbers, vec![1, 3, 5]);

    let observed: Vec<Option<RuntimeError>> = run.report.calls.iter().map(|c| c.observed).collect();
    assert_eq!(
        observed,
        vec![
            Some(RuntimeError::NullPointer),
            Some(RuntimeError::InvalidThread),
            Some(RuntimeError::ThreadNotSuspended),
        ]
    );
}

#[test]
fn test_no_frame_popped_from_worker() {
    let runtime = Arc::new(SimulatedRuntime::new());
    let run = run_with_runtime(&config(), quiet(), Arc::clone(&runtime));

    let worker = run.outcome.worker.as_ref().unwrap();
    assert_eq!(runtime.pop_count(worker.id()), 0);
    assert_eq!(runtime.frame_depth(worker.id()), Some(2));
    assert_eq!(run.report.worker.as_ref().unwrap().frames_popped, 0);
}

#[test]
fn test_null_check_alone_keeps_verdict_passed() {
    let (driver, boundary) = scripted_driver(&[PASSED, PASSED, PASSED], config());
    let outcome = driver.run(Arc::new(RunState::new(quiet())));

    assert_eq!(outcome.checks[0].category, CheckCategory::NullThread);
    assert_eq!(outcome.checks[0].result, CheckResult::Passed);
    assert_eq!(outcome.verdict, Verdict::Passed);
    assert_eq!(boundary.cases.lock().unwrap()[0], PopCase::NullPrimary);
}

#[test]
fn test_not_suspended_check_targets_lock_blocked_worker() {
    let runtime = Arc::new(SimulatedRuntime::new());
    let run = run_with_runtime(&config(), quiet(), Arc::clone(&runtime));

    let call = &run.report.calls[2];
    assert_eq!(call.case, PopCase::NotSuspendedPrimary);
    assert_eq!(call.expected, RuntimeError::ThreadNotSuspended);
    assert_eq!(call.observed, Some(RuntimeError::ThreadNotSuspended));
    // The worker was detached once it finished
    let worker = run.outcome.worker.as_ref().unwrap();
    assert!(!runtime.is_alive(worker.id()));
}

// =============================================================================
// Misbehaving runtime
// =============================================================================

#[test]
fn test_accepted_invalid_thread_fails_and_flags_worker_completion() {
    let runtime = Arc::new(SimulatedRuntime::new());
    runtime.inject(RuntimeError::InvalidThread, FailureConfig::accept());

    let run = run_with_runtime(&config(), quiet(), runtime);

    assert_eq!(run.outcome.verdict, Verdict::Failed);
    assert_eq!(run.verdict, Verdict::Failed);
    assert_eq!(run.report.exit_code, 97);
    assert!(run.outcome.state.pop_done());

    let results: Vec<CheckResult> = run.outcome.checks.iter().map(|c| c.result).collect();
    assert_eq!(
        results,
        vec![CheckResult::Passed, CheckResult::Failed, CheckResult::Passed]
    );

    assert!(run
        .report
        .failures
        .iter()
        .any(|l| l.contains("completed after a frame was popped")));
}

#[test]
fn test_accepted_not_suspended_pop_is_a_visible_side_effect() {
    let runtime = Arc::new(SimulatedRuntime::new());
    runtime.inject(RuntimeError::ThreadNotSuspended, FailureConfig::accept());

    let run = run_with_runtime(&config(), quiet(), Arc::clone(&runtime));

    assert_eq!(run.verdict, Verdict::Failed);
    assert_eq!(run.report.worker.as_ref().unwrap().frames_popped, 1);
    assert_eq!(run.report.checks_failed, 1);
}

#[test]
fn test_event_posted_by_rejected_call_fails_run() {
    let runtime = Arc::new(SimulatedRuntime::new());
    runtime.inject(RuntimeError::InvalidThread, FailureConfig::notify());

    let run = run_with_runtime(&config(), quiet(), Arc::clone(&runtime));

    // The rejection code itself was right
    assert_eq!(run.report.calls[1].observed, Some(RuntimeError::InvalidThread));
    assert!(!run.report.calls[1].events.is_empty());
    assert_eq!(run.outcome.checks[1].result, CheckResult::Failed);
    assert_eq!(run.verdict, Verdict::Failed);
    assert!(run.outcome.state.pop_done());
    assert_eq!(run.report.events_posted, 2);
    assert_eq!(run.report.worker.as_ref().unwrap().frames_popped, 0);
}

#[test]
fn test_conforming_run_posts_no_events() {
    let runtime = Arc::new(SimulatedRuntime::new());
    let run = run_with_runtime(&config(), quiet(), Arc::clone(&runtime));
    assert_eq!(runtime.event_count(), 0);
    assert_eq!(run.report.events_posted, 0);
}

#[test]
fn test_wrong_null_code_fails_without_marking_pop() {
    let runtime = Arc::new(SimulatedRuntime::new());
    runtime.inject(
        RuntimeError::NullPointer,
        FailureConfig::wrong_code(RuntimeError::InvalidThread),
    );

    let run = run_with_runtime(&config(), quiet(), runtime);

    assert_eq!(run.verdict, Verdict::Failed);
    assert!(!run.outcome.state.pop_done());
    assert!(run.report.failures[0].contains("NULL pointer to the thread"));
    // Later checks still ran
    assert_eq!(run.outcome.checks.len(), 3);
}

#[test]
fn test_failed_later_check_sets_pop_done_but_first_does_not() {
    let (driver, _) = scripted_driver(&[FAILED, PASSED, PASSED], config());
    let outcome = driver.run(Arc::new(RunState::new(quiet())));
    assert_eq!(outcome.verdict, Verdict::Failed);
    assert!(!outcome.state.pop_done());

    let (driver, _) = scripted_driver(&[PASSED, PASSED, FAILED], config());
    let outcome = driver.run(Arc::new(RunState::new(quiet())));
    assert_eq!(outcome.verdict, Verdict::Failed);
    assert!(outcome.state.pop_done());
}

#[test]
fn test_informational_status_counts_as_pass() {
    let (driver, _) = scripted_driver(&[7, 1, -3], config());
    let outcome = driver.run(Arc::new(RunState::new(quiet())));

    assert_eq!(outcome.verdict, Verdict::Passed);
    assert!(outcome.checks.iter().all(|c| c.result == CheckResult::Passed));
    assert!(outcome.checks.iter().all(|c| !c.observed_rejection));
    assert_eq!(outcome.settle(SETTLE), Verdict::Passed);
}

#[test]
fn test_failure_after_informational_status_is_kept() {
    let (driver, _) = scripted_driver(&[7, FAILED, PASSED], config());
    let outcome = driver.run(Arc::new(RunState::new(quiet())));

    let results: Vec<CheckResult> = outcome.checks.iter().map(|c| c.result).collect();
    assert_eq!(
        results,
        vec![CheckResult::Passed, CheckResult::Failed, CheckResult::Passed]
    );
    assert!(outcome.state.pop_done());
    assert_eq!(outcome.state.aggregate_status(), FAILED);
    assert_eq!(outcome.verdict, Verdict::Failed);
    assert_eq!(outcome.settle(SETTLE), Verdict::Failed);
}

// =============================================================================
// Readiness failure
// =============================================================================

#[test]
fn test_readiness_timeout_fails_without_checks() {
    let config = HarnessConfig {
        timeouts: WaitConfig {
            ready_ms: 100,
            settle_ms: 5_000,
        },
        ..HarnessConfig::default()
    };
    let (driver, boundary) = scripted_driver(&[], config);

    // A pop reported before the run means the worker refuses to signal.
    let state = Arc::new(RunState::new(quiet()));
    state.mark_pop_done();
    let outcome = driver.run(state);

    assert!(outcome.checks.is_empty());
    assert!(boundary.cases.lock().unwrap().is_empty());
    assert_eq!(outcome.verdict, Verdict::Failed);
    assert!(matches!(
        outcome.abort,
        Some(HarnessError::ReadinessTimeout { .. })
    ));

    let failures = outcome.state.console().failures();
    assert!(failures.iter().any(|l| l.starts_with("TEST FAILURE: waiting for")));

    assert_eq!(outcome.settle(SETTLE), Verdict::Failed);
    assert!(outcome.worker.as_ref().unwrap().is_finished());
}

// =============================================================================
// Ordering and repeatability
// =============================================================================

#[test]
fn test_worker_parked_during_every_check() {
    let (driver, boundary) = scripted_driver(&[PASSED, PASSED, PASSED], config());
    let outcome = driver.run(Arc::new(RunState::new(quiet())));

    assert_eq!(*boundary.parked_at_call.lock().unwrap(), vec![true, true, true]);

    outcome.settle(SETTLE);
    assert!(outcome.ordering_holds());
    let done = outcome.worker.as_ref().unwrap().completed_at().unwrap();
    assert!(done > outcome.state.barrier_released_at().unwrap());
}

#[test]
fn test_ordering_holds_even_when_checks_fail() {
    let runtime = Arc::new(SimulatedRuntime::new());
    runtime.inject(RuntimeError::ThreadNotSuspended, FailureConfig::accept());
    runtime.inject(RuntimeError::InvalidThread, FailureConfig::accept());

    let run = run_with_runtime(&config(), quiet(), runtime);
    assert!(run.outcome.ordering_holds());
    assert!(run.report.ordering_holds);
}

#[test]
fn test_two_runs_classify_identically() {
    let first = run_simulated(&config(), quiet()).unwrap();
    let second = run_simulated(&config(), quiet()).unwrap();

    let classify = |run: &popframe_harness::HarnessRun| -> Vec<(u8, i32, CheckResult)> {
        run.outcome
            .checks
            .iter()
            .map(|c| (c.number, c.status, c.result))
            .collect()
    };
    assert_eq!(classify(&first), classify(&second));
    assert_eq!(first.verdict, second.verdict);
}

// =============================================================================
// Encodings and output
// =============================================================================

#[test]
fn test_alternate_encoding_passes() {
    let config = HarnessConfig {
        mode: EncodingMode::Alternate,
        ..config()
    };
    let run = run_simulated(&config, quiet()).unwrap();

    assert_eq!(run.verdict, Verdict::Passed);
    assert_eq!(run.outcome.encoding, Encoding::Alternate);
    let cases: Vec<PopCase> = run.outcome.checks.iter().map(|c| c.case).collect();
    assert_eq!(
        cases,
        vec![
            PopCase::NullAlternate,
            PopCase::InvalidAlternate,
            PopCase::NotSuspendedAlternate
        ]
    );
}

#[test]
fn test_verbose_output_lists_passed_checks() {
    let config = HarnessConfig {
        verbose: true,
        ..config()
    };
    let console = Arc::new(Console::silent(true));
    let run = run_simulated(&config, Arc::clone(&console)).unwrap();
    assert_eq!(run.verdict, Verdict::Passed);

    let info: Vec<String> = console
        .transcript()
        .into_iter()
        .filter(|l| l.level == Level::Info)
        .map(|l| l.text)
        .collect();
    for n in [1, 3, 5] {
        assert!(
            info.iter().any(|l| l.starts_with(&format!("Check #{} PASSED", n))),
            "missing line for check #{}",
            n
        );
    }
    assert!(info.iter().any(|l| l.contains("inside guarded region")));
    // Verbose auto mode picks the alternate encodings
    assert!(info.iter().any(|l| l.starts_with("Invoke PopFrame()")));
}

#[test]
fn test_quiet_output_is_empty_on_pass() {
    let console = quiet();
    run_simulated(&config(), Arc::clone(&console)).unwrap();
    assert!(console.transcript().is_empty());
}

#[test]
fn test_failures_printed_in_quiet_mode() {
    let console = quiet();
    let runtime = Arc::new(SimulatedRuntime::new());
    runtime.inject(
        RuntimeError::InvalidThread,
        FailureConfig::wrong_code(RuntimeError::ThreadNotAlive),
    );
    let run = run_with_runtime(&config(), Arc::clone(&console), runtime);

    assert_eq!(run.verdict, Verdict::Failed);
    let failures = console.failures();
    assert!(failures[0].starts_with("TEST FAILED: PopFrame()"));
    assert!(failures[0].contains("THREAD_NOT_ALIVE"));
}

#[test]
fn test_agent_boundary_reports_each_call() {
    let runtime = Arc::new(SimulatedRuntime::new());
    let console = quiet();
    let boundary = Arc::new(AgentBoundary::new(runtime.clone(), Arc::clone(&console)));
    let driver = Driver::new(config(), runtime, boundary.clone());

    let outcome = driver.run(Arc::new(RunState::new(console)));
    outcome.settle(SETTLE);

    assert_eq!(boundary.call_count(), 3);
    assert!(boundary.calls().iter().all(|c| c.status == PASSED));
}
