//! Pop-frame boundary
//!
//! [`PopFrameBoundary`] is the one call the driver makes per check: a case
//! number and the worker go in, a harness status comes out. `FAILED` means
//! the runtime did not reject the call the way it should have; anything else
//! is a pass.
//!
//! [`AgentBoundary`] is the agent side of that call. It turns the case into
//! a concrete thread argument, asks the runtime to pop, and compares the
//! answer with the rejection the case expects. A rejected call must not post
//! any frame event either.

use std::sync::{Arc, Mutex, PoisonError};

use popframe_protocol::{CheckCategory, Encoding, PopCase, RuntimeError, FAILED, PASSED};
use serde::{Deserialize, Serialize};

use crate::runtime::{ObjectRef, RuntimeEvent, ThreadArg, ThreadRuntime, DANGLING_HANDLE};
use crate::state::Console;
use crate::worker::WorkerThread;

/// The external pop-frame boundary
pub trait PopFrameBoundary: Send + Sync {
    /// Run one case against `worker` and return a harness status
    fn do_pop_frame(&self, case: PopCase, worker: &WorkerThread) -> i32;
}

/// Record of one boundary call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryCall {
    pub case: PopCase,
    pub argument: ThreadArg,
    pub expected: RuntimeError,
    /// `None` when the runtime accepted the pop
    pub observed: Option<RuntimeError>,
    /// Events the runtime posted during the call
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub events: Vec<RuntimeEvent>,
    pub status: i32,
}

/// Agent-side implementation backed by a [`ThreadRuntime`]
pub struct AgentBoundary {
    runtime: Arc<dyn ThreadRuntime>,
    console: Arc<Console>,
    /// Non-thread object used for the primary invalid-thread encoding
    decoy: ObjectRef,
    calls: Mutex<Vec<BoundaryCall>>,
}

impl AgentBoundary {
    pub fn new(runtime: Arc<dyn ThreadRuntime>, console: Arc<Console>) -> Self {
        let decoy = runtime.new_object();
        Self {
            runtime,
            console,
            decoy,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Concrete argument for a case
    pub fn argument_for(&self, case: PopCase, worker: &WorkerThread) -> ThreadArg {
        match (case.category(), case.encoding()) {
            (CheckCategory::NullThread, Encoding::Primary) => ThreadArg::Null,
            (CheckCategory::NullThread, Encoding::Alternate) => ThreadArg::Raw(0),
            (CheckCategory::InvalidThread, Encoding::Primary) => ThreadArg::Object(self.decoy),
            (CheckCategory::InvalidThread, Encoding::Alternate) => ThreadArg::Raw(DANGLING_HANDLE),
            (CheckCategory::NotSuspended, Encoding::Primary) => ThreadArg::Thread(worker.id()),
            (CheckCategory::NotSuspended, Encoding::Alternate) => ThreadArg::Raw(worker.id().0),
        }
    }

    /// Calls made so far, in order
    pub fn calls(&self) -> Vec<BoundaryCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl PopFrameBoundary for AgentBoundary {
    fn do_pop_frame(&self, case: PopCase, worker: &WorkerThread) -> i32 {
        let argument = self.argument_for(case, worker);
        let expected = case.expected_rejection();

        if case.encoding() == Encoding::Alternate {
            self.console.info(format!(
                "Invoke PopFrame() with {} ({})...",
                case.category().describe(),
                argument
            ));
        }

        let mark = self.runtime.event_count();
        let observed = self.runtime.pop_frame(argument).err();
        let events = self.runtime.events_since(mark);

        let status = match observed {
            Some(code) if code == expected && events.is_empty() => PASSED,
            Some(code) if code == expected => {
                let posted: Vec<String> = events.iter().map(|e| e.to_string()).collect();
                self.console.fail(format!(
                    "TEST FAILED: PopFrame(), being invoked with {},\n\treturned {} but posted event(s): {}",
                    case.category().describe(),
                    code,
                    posted.join(", ")
                ));
                FAILED
            }
            Some(code) => {
                self.console.fail(format!(
                    "TEST FAILED: PopFrame(), being invoked with {},\n\treturned {} ({}), expected {} ({})",
                    case.category().describe(),
                    code,
                    code.code(),
                    expected,
                    expected.code()
                ));
                FAILED
            }
            None => {
                self.console.fail(format!(
                    "TEST FAILED: PopFrame(), being invoked with {},\n\tpopped a frame instead of returning {}",
                    case.category().describe(),
                    expected
                ));
                FAILED
            }
        };

        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(BoundaryCall {
                case,
                argument,
                expected,
                observed,
                events,
                status,
            });

        status
    }
}
