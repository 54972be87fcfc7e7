//! Cooperative stop signal with interruptible waits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// A stop signal that supports interruptible waits.
///
/// Poller threads park on `wait()` between samples and during fault
/// backoff; raising the signal wakes them immediately instead of letting
/// a `thread::sleep` run out.
pub struct StopSignal {
    raised: AtomicBool,
    condvar: Condvar,
    mutex: Mutex<()>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
            condvar: Condvar::new(),
            mutex: Mutex::new(()),
        }
    }

    /// Raise the signal, waking all waiting threads.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
        // Taking the mutex orders the store against a waiter that has
        // checked the flag but not yet parked.
        let _guard = self.mutex.lock();
        self.condvar.notify_all();
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Wait for the given duration or until the signal is raised.
    ///
    /// Returns `true` if the signal was raised, `false` if the wait ran
    /// to completion.
    pub fn wait(&self, duration: Duration) -> bool {
        if self.is_raised() {
            return true;
        }

        let guard = match self.mutex.lock() {
            Ok(guard) => guard,
            // Poisoned mutex means a waiter panicked; treat as raised.
            Err(_) => return true,
        };
        match self
            .condvar
            .wait_timeout_while(guard, duration, |_| !self.is_raised())
        {
            Ok((_, timeout)) => !timeout.timed_out(),
            Err(_) => true,
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}
