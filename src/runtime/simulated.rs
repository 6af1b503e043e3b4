//! In-process simulated runtime
//!
//! Tracks live threads, debugger-style suspension and a frame depth per
//! thread. The pop-frame rules mirror a conforming runtime:
//!
//! - null (or raw zero) handle: `NULL_POINTER`
//! - non-thread object or unknown handle: `INVALID_THREAD`
//! - terminated thread: `THREAD_NOT_ALIVE`
//! - live thread that is not suspended: `THREAD_NOT_SUSPENDED`
//! - suspended thread with fewer than two frames: `NO_MORE_FRAMES`
//!
//! Anything else pops a frame and posts `FRAME_POP` and `METHOD_EXIT` for
//! the target. A rejected call posts nothing. A [`FailureInjector`] can
//! override any rejection path.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

use popframe_protocol::RuntimeError;

use super::failure::{FailureConfig, FailureInjector, InjectionSpec, Misbehavior};
use super::{EventKind, ObjectRef, RuntimeEvent, ThreadArg, ThreadId, ThreadRuntime};

/// Frames on a freshly attached thread: the entry frame and its body
const INITIAL_DEPTH: usize = 2;

#[derive(Debug)]
struct SimThread {
    name: String,
    alive: bool,
    suspended: bool,
    depth: usize,
    pops: usize,
}

#[derive(Debug)]
struct RuntimeTable {
    next_handle: u64,
    threads: HashMap<ThreadId, SimThread>,
    objects: HashSet<u64>,
    events: Vec<RuntimeEvent>,
}

impl RuntimeTable {
    fn allocate(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn resolve(&self, arg: ThreadArg) -> Result<ThreadId, RuntimeError> {
        let id = match arg {
            ThreadArg::Null | ThreadArg::Raw(0) => return Err(RuntimeError::NullPointer),
            ThreadArg::Object(_) => return Err(RuntimeError::InvalidThread),
            ThreadArg::Raw(raw) => ThreadId(raw),
            ThreadArg::Thread(id) => id,
        };
        if self.threads.contains_key(&id) {
            Ok(id)
        } else {
            Err(RuntimeError::InvalidThread)
        }
    }

    fn live_thread_mut(&mut self, id: ThreadId) -> Result<&mut SimThread, RuntimeError> {
        let thread = self
            .threads
            .get_mut(&id)
            .ok_or(RuntimeError::InvalidThread)?;
        if !thread.alive {
            return Err(RuntimeError::ThreadNotAlive);
        }
        Ok(thread)
    }

    /// Evaluate a pop request. Returns the resolved target (if any) along
    /// with the natural outcome; a successful outcome has already popped.
    fn pop(&mut self, arg: ThreadArg) -> (Option<ThreadId>, Result<(), RuntimeError>) {
        let id = match self.resolve(arg) {
            Ok(id) => id,
            Err(e) => return (None, Err(e)),
        };
        let outcome = self.live_thread_mut(id).and_then(|thread| {
            if !thread.suspended {
                Err(RuntimeError::ThreadNotSuspended)
            } else if thread.depth < INITIAL_DEPTH {
                Err(RuntimeError::NoMoreFrames)
            } else {
                thread.depth -= 1;
                thread.pops += 1;
                Ok(())
            }
        });
        if outcome.is_ok() {
            self.post_frame_events(Some(id));
        }
        (Some(id), outcome)
    }

    /// Pop regardless of suspension, as a misbehaving runtime would
    fn force_pop(&mut self, id: ThreadId) {
        if let Some(thread) = self.threads.get_mut(&id) {
            thread.depth = thread.depth.saturating_sub(1);
            thread.pops += 1;
            self.post_frame_events(Some(id));
        }
    }

    fn post_frame_events(&mut self, target: Option<ThreadId>) {
        let thread_name = target
            .and_then(|id| self.threads.get(&id))
            .map(|t| t.name.clone());
        for kind in [EventKind::FramePop, EventKind::MethodExit] {
            self.events.push(RuntimeEvent {
                kind,
                thread: target,
                thread_name: thread_name.clone(),
            });
        }
    }
}

/// Simulated host runtime
#[derive(Debug)]
pub struct SimulatedRuntime {
    table: Mutex<RuntimeTable>,
    injector: Mutex<FailureInjector>,
}

impl Default for SimulatedRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRuntime {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(RuntimeTable {
                next_handle: 1,
                threads: HashMap::new(),
                objects: HashSet::new(),
                events: Vec::new(),
            }),
            injector: Mutex::new(FailureInjector::new()),
        }
    }

    /// Runtime with the given injections installed
    pub fn with_injections(specs: impl IntoIterator<Item = InjectionSpec>) -> Self {
        let runtime = Self::new();
        for spec in specs {
            runtime.inject(spec.rejection, spec.config);
        }
        runtime
    }

    /// Override the path that would reject with `rejection`
    pub fn inject(&self, rejection: RuntimeError, config: FailureConfig) {
        self.injector().inject(rejection, config);
    }

    /// Current frame depth of a thread
    pub fn frame_depth(&self, id: ThreadId) -> Option<usize> {
        self.table().threads.get(&id).map(|t| t.depth)
    }

    pub fn is_alive(&self, id: ThreadId) -> bool {
        self.table().threads.get(&id).is_some_and(|t| t.alive)
    }

    // Neither table is left half-updated by a panic, so poison is ignored.
    fn table(&self) -> MutexGuard<'_, RuntimeTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn injector(&self) -> MutexGuard<'_, FailureInjector> {
        self.injector.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ThreadRuntime for SimulatedRuntime {
    fn attach(&self, name: &str) -> ThreadId {
        let mut table = self.table();
        let id = ThreadId(table.allocate());
        table.threads.insert(
            id,
            SimThread {
                name: name.to_string(),
                alive: true,
                suspended: false,
                depth: INITIAL_DEPTH,
                pops: 0,
            },
        );
        id
    }

    fn detach(&self, id: ThreadId) {
        if let Some(thread) = self.table().threads.get_mut(&id) {
            thread.alive = false;
            thread.suspended = false;
        }
    }

    fn suspend(&self, id: ThreadId) -> Result<(), RuntimeError> {
        let mut table = self.table();
        let thread = table.live_thread_mut(id)?;
        if thread.suspended {
            return Err(RuntimeError::ThreadSuspended);
        }
        thread.suspended = true;
        Ok(())
    }

    fn resume(&self, id: ThreadId) -> Result<(), RuntimeError> {
        let mut table = self.table();
        let thread = table.live_thread_mut(id)?;
        if !thread.suspended {
            return Err(RuntimeError::ThreadNotSuspended);
        }
        thread.suspended = false;
        Ok(())
    }

    fn new_object(&self) -> ObjectRef {
        let mut table = self.table();
        let handle = table.allocate();
        table.objects.insert(handle);
        ObjectRef(handle)
    }

    fn pop_frame(&self, thread: ThreadArg) -> Result<(), RuntimeError> {
        let (target, outcome) = self.table().pop(thread);

        let rejection = match outcome {
            Ok(()) => return Ok(()),
            Err(rejection) => rejection,
        };

        let injected = self.injector().check(&rejection).cloned();
        let Some(config) = injected else {
            return Err(rejection);
        };

        if let Some(delay) = config.delay {
            thread::sleep(delay);
        }

        match config.misbehavior {
            None => Err(rejection),
            Some(Misbehavior::Return(code)) => Err(code),
            Some(Misbehavior::Accept) => {
                if let Some(id) = target {
                    self.table().force_pop(id);
                }
                Ok(())
            }
            Some(Misbehavior::Notify) => {
                self.table().post_frame_events(target);
                Err(rejection)
            }
        }
    }

    fn pop_count(&self, id: ThreadId) -> usize {
        self.table().threads.get(&id).map_or(0, |t| t.pops)
    }

    fn event_count(&self) -> usize {
        self.table().events.len()
    }

    fn events_since(&self, mark: usize) -> Vec<RuntimeEvent> {
        self.table().events.get(mark..).map_or_else(Vec::new, <[_]>::to_vec)
    }
}
