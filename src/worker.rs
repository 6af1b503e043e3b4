//! Worker coordinator
//!
//! Owns the single worker thread the checks target. The worker announces
//! readiness once, then parks on the suspend barrier until the driver lets
//! go. A drop guard around the parked region records how the region ended
//! and flags any completion that happens after a pop was reported.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::HarnessResult;
use crate::runtime::{ThreadId, ThreadRuntime};
use crate::state::RunState;
use crate::sync::{Latch, SuspendBarrier};

/// Everything the worker body needs from the driver
#[derive(Clone)]
pub struct WorkerContext {
    pub state: Arc<RunState>,
    pub ready: Arc<Latch>,
    pub barrier: Arc<SuspendBarrier>,
    pub runtime: Arc<dyn ThreadRuntime>,
}

/// Observations published by the worker
#[derive(Debug, Default)]
pub struct WorkerStatus {
    started: AtomicBool,
    completed_normally: AtomicBool,
    completed_at: Mutex<Option<Instant>>,
    finished: Latch,
}

impl WorkerStatus {
    fn mark_completed(&self, normally: bool) {
        self.completed_normally.store(normally, Ordering::SeqCst);
        *self
            .completed_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }
}

/// Handle to the running worker
pub struct WorkerThread {
    id: ThreadId,
    name: String,
    status: Arc<WorkerStatus>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerThread {
    /// Runtime identity of the worker
    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_started(&self) -> bool {
        self.status.started.load(Ordering::SeqCst)
    }

    /// Whether the guarded region ran to its end without faulting
    pub fn completed_normally(&self) -> bool {
        self.status.completed_normally.load(Ordering::SeqCst)
    }

    /// When the worker got through the barrier, if it has
    pub fn completed_at(&self) -> Option<Instant> {
        *self
            .status
            .completed_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the worker's post-hoc checks have run
    pub fn is_finished(&self) -> bool {
        self.status.finished.is_fired()
    }

    /// Wait up to `timeout` for the worker to finish. Returns whether it did.
    pub fn wait_finished(&self, timeout: Duration) -> bool {
        self.status.finished.wait_timeout(timeout).is_ok()
    }

    /// Join the OS thread. Blocks until the worker body returns.
    pub fn join(mut self) -> thread::Result<()> {
        match self.handle.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }
}

impl fmt::Display for WorkerThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

impl fmt::Debug for WorkerThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerThread")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status)
            .finish()
    }
}

/// Register a worker with the runtime and start it.
pub fn spawn(name: &str, ctx: WorkerContext) -> HarnessResult<WorkerThread> {
    let runtime = Arc::clone(&ctx.runtime);
    let id = runtime.attach(name);
    let status = Arc::new(WorkerStatus::default());

    let region = GuardedRegion {
        id,
        name: name.to_string(),
        ctx,
        status: Arc::clone(&status),
    };

    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || region.run())
        .map_err(|e| {
            runtime.detach(id);
            e
        })?;

    Ok(WorkerThread {
        id,
        name: name.to_string(),
        status,
        handle: Some(handle),
    })
}

struct GuardedRegion {
    id: ThreadId,
    name: String,
    ctx: WorkerContext,
    status: Arc<WorkerStatus>,
}

impl GuardedRegion {
    fn run(self) {
        self.status.started.store(true, Ordering::SeqCst);
        let state = &self.ctx.state;

        if state.pop_done() {
            // Nothing should have been popped before we even got here.
            state
                .console()
                .fail("TEST FAILED: frame with the guarded region was popped");
            state.record_failure();
        } else {
            self.ctx.ready.fire();
        }

        state
            .console()
            .info(format!("worker ({}): inside guarded region", self.label()));

        let mut guard = CompletionGuard {
            region: &self,
            reached_end: false,
        };
        self.ctx.barrier.pass_through();
        guard.reached_end = true;
    }

    fn label(&self) -> String {
        format!("{} ({})", self.name, self.id)
    }
}

/// Runs the completion checks however the guarded region exits
struct CompletionGuard<'a> {
    region: &'a GuardedRegion,
    reached_end: bool,
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        let region = self.region;
        let state = &region.ctx.state;
        let faulted = thread::panicking();

        region.status.mark_completed(self.reached_end && !faulted);

        if faulted || !self.reached_end {
            state.console().fail(format!(
                "FAILURE: worker ({}): guarded region faulted",
                region.label()
            ));
            state.record_failure();
        }

        if state.pop_done() {
            state
                .console()
                .fail("TEST FAILED: guarded region completed after a frame was popped");
            state.record_failure();
        }

        region.ctx.runtime.detach(region.id);
        region.status.finished.fire();
    }
}
