//! Shared run state
//!
//! Everything the driver and the worker both observe lives here and is
//! shared through an `Arc`. Flags are atomics; timestamps and the console
//! transcript sit behind mutexes.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use popframe_protocol::{Verdict, FAILED, PASSED};
use serde::{Deserialize, Serialize};

/// Severity of a console line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Diagnostic, shown only in verbose mode
    Info,
    /// Failure, always shown
    Failure,
}

/// A line emitted to the console
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleLine {
    pub level: Level,
    pub text: String,
}

/// Output sink shared by the driver, the worker and the boundary.
///
/// Verbose-only lines are dropped entirely when not verbose; failure lines
/// are always written. Every written line is kept in a transcript.
pub struct Console {
    verbose: bool,
    sink: Mutex<Box<dyn Write + Send>>,
    transcript: Mutex<Vec<ConsoleLine>>,
}

impl Console {
    /// Console writing to stdout
    pub fn stdout(verbose: bool) -> Self {
        Self::with_sink(verbose, Box::new(io::stdout()))
    }

    /// Console that only keeps the transcript
    pub fn silent(verbose: bool) -> Self {
        Self::with_sink(verbose, Box::new(io::sink()))
    }

    pub fn with_sink(verbose: bool, sink: Box<dyn Write + Send>) -> Self {
        Self {
            verbose,
            sink: Mutex::new(sink),
            transcript: Mutex::new(Vec::new()),
        }
    }

    /// Verbose-mode diagnostic
    pub fn info(&self, text: impl Into<String>) {
        if self.verbose {
            self.emit(Level::Info, text.into());
        }
    }

    /// Failure line, emitted regardless of mode
    pub fn fail(&self, text: impl Into<String>) {
        self.emit(Level::Failure, text.into());
    }

    fn emit(&self, level: Level, text: String) {
        {
            let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
            // A broken stdout must not take the run down with it.
            let _ = writeln!(sink, "{}", text);
            let _ = sink.flush();
        }
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ConsoleLine { level, text });
    }

    /// Snapshot of everything written so far
    pub fn transcript(&self) -> Vec<ConsoleLine> {
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Failure lines written so far
    pub fn failures(&self) -> Vec<String> {
        self.transcript()
            .into_iter()
            .filter(|l| l.level == Level::Failure)
            .map(|l| l.text)
            .collect()
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

/// State shared by the driver and the worker for one run
#[derive(Debug)]
pub struct RunState {
    /// Set when the boundary reported that a pop went through
    pop_done: AtomicBool,
    /// Last status folded in by the driver
    aggregate: AtomicI32,
    /// Sticky; once set no later status clears it
    failed: AtomicBool,
    /// When the driver let go of the suspend barrier
    barrier_released_at: Mutex<Option<Instant>>,
    console: Arc<Console>,
}

impl RunState {
    pub fn new(console: Arc<Console>) -> Self {
        Self {
            pop_done: AtomicBool::new(false),
            aggregate: AtomicI32::new(PASSED),
            failed: AtomicBool::new(false),
            barrier_released_at: Mutex::new(None),
            console,
        }
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn pop_done(&self) -> bool {
        self.pop_done.load(Ordering::SeqCst)
    }

    pub fn mark_pop_done(&self) {
        self.pop_done.store(true, Ordering::SeqCst);
    }

    /// Fold a boundary status into the aggregate. Any non-FAILED status
    /// replaces the previous one but never clears a recorded failure.
    pub fn record_status(&self, status: i32) {
        if status == FAILED {
            self.failed.store(true, Ordering::SeqCst);
        }
        self.aggregate.store(status, Ordering::SeqCst);
    }

    pub fn record_failure(&self) {
        self.record_status(FAILED);
    }

    /// Aggregate status; FAILED once anything failed
    pub fn aggregate_status(&self) -> i32 {
        if self.failed.load(Ordering::SeqCst) {
            FAILED
        } else {
            self.aggregate.load(Ordering::SeqCst)
        }
    }

    pub fn verdict(&self) -> Verdict {
        Verdict::from_status(self.aggregate_status())
    }

    pub fn mark_barrier_released(&self) {
        *self
            .barrier_released_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    pub fn barrier_released_at(&self) -> Option<Instant> {
        *self
            .barrier_released_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
