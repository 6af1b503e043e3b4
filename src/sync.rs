//! Synchronization primitives for the driver/worker hand-off
//!
//! - [`Latch`]: one-shot signal guarded by a boolean predicate. A fire that
//!   happens before the waiter parks is never lost.
//! - [`SuspendBarrier`]: a mutex used purely as a scheduling gate. While the
//!   driver holds it, a worker passing through is parked on the lock.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::timeout::millis;

/// Errors from waiting on a [`Latch`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("not signaled within {waited_ms} ms")]
    TimedOut { waited_ms: u64 },

    #[error("latch lock poisoned")]
    Poisoned,
}

/// One-shot signal with a predicate
#[derive(Debug, Default)]
pub struct Latch {
    fired: Mutex<bool>,
    cond: Condvar,
}

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the latch and wake every waiter.
    ///
    /// Returns `true` for the first fire, `false` if already fired.
    pub fn fire(&self) -> bool {
        let mut fired = self.fired.lock().unwrap_or_else(PoisonError::into_inner);
        let first = !*fired;
        *fired = true;
        self.cond.notify_all();
        first
    }

    pub fn is_fired(&self) -> bool {
        *self.fired.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the latch lock ahead of time.
    ///
    /// A firing thread blocks on the lock until the returned guard starts
    /// waiting, which reproduces the lock-then-start-then-wait hand-off.
    pub fn arm(&self) -> Result<ArmedLatch<'_>, WaitError> {
        let fired = self.fired.lock().map_err(|_| WaitError::Poisoned)?;
        Ok(ArmedLatch { latch: self, fired })
    }

    /// Wait up to `timeout` for the latch to fire.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<(), WaitError> {
        self.arm()?.wait(timeout)
    }
}

/// Latch lock held by a waiter that has not parked yet
pub struct ArmedLatch<'a> {
    latch: &'a Latch,
    fired: MutexGuard<'a, bool>,
}

impl ArmedLatch<'_> {
    /// Park until fired or until `timeout` elapses. Releases the latch lock
    /// while parked and reacquires it on wake-up.
    pub fn wait(self, timeout: Duration) -> Result<(), WaitError> {
        let start = Instant::now();
        let (fired, _) = self
            .latch
            .cond
            .wait_timeout_while(self.fired, timeout, |fired| !*fired)
            .map_err(|_| WaitError::Poisoned)?;

        if *fired {
            Ok(())
        } else {
            Err(WaitError::TimedOut {
                waited_ms: millis(start.elapsed()),
            })
        }
    }
}

/// Scheduling gate that keeps a worker from advancing
#[derive(Debug, Default)]
pub struct SuspendBarrier {
    gate: Mutex<()>,
}

/// Proof that the barrier is held; released on drop
pub struct BarrierHold<'a> {
    _gate: MutexGuard<'a, ()>,
}

impl SuspendBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the gate until the returned hold is dropped.
    pub fn hold(&self) -> BarrierHold<'_> {
        // The gate protects no data, so a poisoned lock is still a valid gate.
        let gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        BarrierHold { _gate: gate }
    }

    /// Enter and immediately leave the gated region. Blocks while held.
    pub fn pass_through(&self) {
        drop(self.gate.lock().unwrap_or_else(PoisonError::into_inner));
    }

    /// Whether someone currently holds the gate
    pub fn is_held(&self) -> bool {
        self.gate.try_lock().is_err()
    }
}
