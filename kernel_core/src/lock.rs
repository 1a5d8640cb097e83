//! Serialized kernel entry
//!
//! The kernel state is single-threaded by construction: every entry from a
//! trap, interrupt, or invocation path runs under one global lock, so
//! operations observe and leave consistent state. There is no finer
//! locking anywhere below this point.

use std::sync::Mutex;

use crate::Kernel;

/// A kernel behind its global entry lock
#[derive(Debug)]
pub struct LockedKernel {
    inner: Mutex<Kernel>,
}

impl LockedKernel {
    pub fn new(kernel: Kernel) -> Self {
        Self {
            inner: Mutex::new(kernel),
        }
    }

    /// Runs one kernel entry under the lock
    ///
    /// A poisoned lock is not propagated; kernel state is only mutated
    /// through this entry point, so the state a panicking entry leaves
    /// behind is still the last consistent prefix of its work.
    pub fn enter<R>(&self, f: impl FnOnce(&mut Kernel) -> R) -> R {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn into_inner(self) -> Kernel {
        match self.inner.into_inner() {
            Ok(kernel) => kernel,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for LockedKernel {
    fn default() -> Self {
        Self::new(Kernel::new())
    }
}
