//! Run report (run_report.json)
//!
//! Machine-readable record of one harness run: per-check classifications,
//! what the boundary saw, what the worker observed afterwards, and the
//! final verdict with its exit code.

use chrono::{DateTime, Utc};
use popframe_protocol::{Encoding, Verdict};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use crate::agent::BoundaryCall;
use crate::config::EffectiveConfig;
use crate::driver::{CheckOutcome, CheckResult, RunOutcome};
use crate::runtime::ThreadId;
use crate::timeout::millis;

/// Schema version for run_report.json
pub const RUN_REPORT_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for run_report.json
pub const RUN_REPORT_SCHEMA_ID: &str = "popframe-harness/run_report@1";

/// What the worker left behind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub name: String,
    pub thread_id: ThreadId,
    pub started: bool,
    /// Post-hoc checks ran before the report was taken
    pub finished: bool,
    pub completed_normally: bool,
    /// Frames the runtime popped from the worker; anything but zero is a
    /// side effect of a call that should have been rejected
    pub frames_popped: usize,
}

/// Run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub schema_version: u32,
    pub schema_id: String,
    pub run_id: String,
    pub created_at: DateTime<Utc>,

    /// Final verdict (after settling)
    pub verdict: Verdict,

    /// Verdict at barrier release, before the worker's post-hoc checks
    pub verdict_at_release: Verdict,

    /// Process exit code
    pub exit_code: i32,

    pub encoding: Encoding,
    pub check_count: usize,
    pub checks_passed: usize,
    pub checks_failed: usize,
    pub checks: Vec<CheckOutcome>,

    /// Boundary calls, when the boundary records them
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub calls: Vec<BoundaryCall>,

    /// Frame events the runtime posted across all boundary calls
    #[serde(default)]
    pub events_posted: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<WorkerRecord>,

    /// Infrastructure failure that ended the run early
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,

    /// Worker completion came after barrier release
    pub ordering_holds: bool,

    /// Failure lines written during the run
    pub failures: Vec<String>,

    pub duration_ms: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_config: Option<EffectiveConfig>,

    pub human_summary: String,
}

impl RunReport {
    /// Build a report from a settled run
    pub fn from_outcome(
        outcome: &RunOutcome,
        verdict: Verdict,
        calls: Vec<BoundaryCall>,
        frames_popped: usize,
    ) -> Self {
        let checks_passed = outcome
            .checks
            .iter()
            .filter(|c| c.result == CheckResult::Passed)
            .count();
        let checks_failed = outcome.checks.len() - checks_passed;

        let worker = outcome.worker.as_ref().map(|w| WorkerRecord {
            name: w.name().to_string(),
            thread_id: w.id(),
            started: w.is_started(),
            finished: w.is_finished(),
            completed_normally: w.completed_normally(),
            frames_popped,
        });

        let events_posted = calls.iter().map(|c| c.events.len()).sum();
        let aborted = outcome.abort.as_ref().map(|e| e.to_string());
        let human_summary = Self::summarize(verdict, &outcome.checks, aborted.as_deref());

        Self {
            schema_version: RUN_REPORT_SCHEMA_VERSION,
            schema_id: RUN_REPORT_SCHEMA_ID.to_string(),
            run_id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            verdict,
            verdict_at_release: outcome.verdict,
            exit_code: verdict.exit_code(),
            encoding: outcome.encoding,
            check_count: outcome.checks.len(),
            checks_passed,
            checks_failed,
            checks: outcome.checks.clone(),
            calls,
            events_posted,
            worker,
            aborted,
            ordering_holds: outcome.ordering_holds(),
            failures: outcome.state.console().failures(),
            duration_ms: millis(outcome.duration),
            effective_config: None,
            human_summary,
        }
    }

    /// Attach the configuration that produced this run
    pub fn with_effective_config(mut self, config: EffectiveConfig) -> Self {
        self.effective_config = Some(config);
        self
    }

    fn summarize(verdict: Verdict, checks: &[CheckOutcome], aborted: Option<&str>) -> String {
        if let Some(reason) = aborted {
            return format!("{}: run aborted before any check ({})", verdict, reason);
        }

        let failed: Vec<String> = checks
            .iter()
            .filter(|c| c.result == CheckResult::Failed)
            .map(|c| format!("#{}", c.number))
            .collect();

        if failed.is_empty() {
            format!("{}: {} of {} checks passed", verdict, checks.len(), checks.len())
        } else {
            format!(
                "{}: check(s) {} failed ({} of {} passed)",
                verdict,
                failed.join(", "),
                checks.len() - failed.len(),
                checks.len()
            )
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("JSON serialization failed: {}", e),
            )
        })?;
        fs::write(path, json)
    }

    pub fn load_from_file(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
