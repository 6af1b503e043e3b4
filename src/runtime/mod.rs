//! Runtime boundary
//!
//! [`ThreadRuntime`] is the host runtime whose pop-frame facility is under
//! test. The harness only needs a handful of operations from it: register
//! the worker, attempt a pop, and read back the frame events the runtime
//! posted.
//!
//! [`SimulatedRuntime`] is an in-process implementation with failure
//! injection, used by the CLI and the test suite.

mod failure;
mod simulated;

pub use failure::{FailureConfig, FailureInjector, InjectionParseError, InjectionSpec, Misbehavior};
pub use simulated::SimulatedRuntime;

use popframe_protocol::RuntimeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw handle that no runtime ever hands out
pub const DANGLING_HANDLE: u64 = u64::MAX;

/// Runtime-assigned thread identity. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadId(pub u64);

/// Runtime-assigned handle to a non-thread object. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef(pub u64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread#{}", self.0)
    }
}

/// Thread argument as handed to the pop-frame facility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ThreadArg {
    /// Null reference
    Null,
    /// Untyped raw handle; zero is null
    Raw(u64),
    /// Handle to an object that is not a thread
    Object(ObjectRef),
    /// Typed thread handle
    Thread(ThreadId),
}

impl fmt::Display for ThreadArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadArg::Null => write!(f, "null"),
            ThreadArg::Raw(raw) => write!(f, "raw({:#x})", raw),
            ThreadArg::Object(obj) => write!(f, "object#{}", obj.0),
            ThreadArg::Thread(id) => write!(f, "{}", id),
        }
    }
}

/// Kind of frame event a runtime posts to its agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    FramePop,
    MethodExit,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::FramePop => write!(f, "FRAME_POP"),
            EventKind::MethodExit => write!(f, "METHOD_EXIT"),
        }
    }
}

/// A posted event. `thread` is None when the runtime could not resolve a
/// target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeEvent {
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<ThreadId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_name: Option<String>,
}

impl fmt::Display for RuntimeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.thread_name, self.thread) {
            (Some(name), Some(id)) => write!(f, "{} on {} ({})", self.kind, name, id),
            (None, Some(id)) => write!(f, "{} on {}", self.kind, id),
            _ => write!(f, "{}", self.kind),
        }
    }
}

/// Host runtime facilities the harness relies on
pub trait ThreadRuntime: Send + Sync {
    /// Register a new live thread with the given name
    fn attach(&self, name: &str) -> ThreadId;

    /// Mark a thread as terminated
    fn detach(&self, id: ThreadId);

    /// Debugger-style suspension
    fn suspend(&self, id: ThreadId) -> Result<(), RuntimeError>;

    fn resume(&self, id: ThreadId) -> Result<(), RuntimeError>;

    /// Allocate an object that is not a thread
    fn new_object(&self) -> ObjectRef;

    /// Attempt to pop the top frame of `thread`
    fn pop_frame(&self, thread: ThreadArg) -> Result<(), RuntimeError>;

    /// Number of frames popped from `id` so far
    fn pop_count(&self, id: ThreadId) -> usize;

    /// Events posted so far; usable as a mark for [`ThreadRuntime::events_since`]
    fn event_count(&self) -> usize;

    /// Events posted after `mark`, oldest first
    fn events_since(&self, mark: usize) -> Vec<RuntimeEvent>;
}
