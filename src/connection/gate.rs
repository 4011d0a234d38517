use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Binary semaphore guarding exclusive use of one pool slot.
#[derive(Debug)]
pub(crate) struct Gate {
    open: Mutex<bool>,
    signal: Condvar,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self {
            open: Mutex::new(true),
            signal: Condvar::new(),
        }
    }

    // The flag is a plain bool, so a poisoned lock still holds a valid value.
    fn state(&self) -> MutexGuard<'_, bool> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the gate if it is open, without waiting.
    pub(crate) fn try_enter(&self) -> bool {
        let mut open = self.state();
        if *open {
            *open = false;
            true
        } else {
            false
        }
    }

    /// Block until the gate opens, then take it.
    pub(crate) fn enter(&self) {
        let open = self.state();
        let mut open = self
            .signal
            .wait_while(open, |open| !*open)
            .unwrap_or_else(PoisonError::into_inner);
        *open = false;
    }

    /// Like [`enter`](Self::enter) but gives up after `timeout`.
    pub(crate) fn enter_timeout(&self, timeout: Duration) -> bool {
        let open = self.state();
        let (mut open, _) = self
            .signal
            .wait_timeout_while(open, timeout, |open| !*open)
            .unwrap_or_else(PoisonError::into_inner);
        if *open {
            *open = false;
            true
        } else {
            false
        }
    }

    pub(crate) fn leave(&self) {
        *self.state() = true;
        self.signal.notify_one();
    }

    pub(crate) fn is_taken(&self) -> bool {
        !*self.state()
    }
}
