//! Simulated allocation failures.
//!
//! Some backends allocate while doing I/O. To test how an engine copes when
//! that allocation fails, the facades ask an [`AllocProbe`] before the
//! operations that could allocate. When the probe refuses, the operation fails
//! with [`VfsError::IoNoMem`](crate::VfsError::IoNoMem) and the backend is never
//! called.
//!
//! Production code installs no probe at all.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Size of the trial allocation the facades request before an operation.
pub const PROBE_SIZE: usize = 10;

/// An "allocate or fail" oracle.
pub trait AllocProbe: Send + Sync {
    /// Returns `false` if an allocation of `size` bytes should be treated as
    /// failed.
    fn try_alloc(&self, size: usize) -> bool;
}

/// A probe that fails every allocation after a countdown.
///
/// The first `countdown` allocations succeed. The next one fails; if
/// `persistent` is set, so does every allocation after it.
///
/// # Example
///
/// ```rust
/// use anyvfs::{AllocProbe, FailAfter};
///
/// let probe = FailAfter::new(1, false);
/// assert!(probe.try_alloc(10));
/// assert!(!probe.try_alloc(10));
/// assert!(probe.try_alloc(10));
/// assert_eq!(probe.failures(), 1);
/// ```
#[derive(Debug)]
pub struct FailAfter {
    remaining: AtomicUsize,
    persistent: bool,
    failures: AtomicUsize,
}

impl FailAfter {
    /// Fail after `countdown` successful allocations.
    pub fn new(countdown: usize, persistent: bool) -> Self {
        Self {
            remaining: AtomicUsize::new(countdown),
            persistent,
            failures: AtomicUsize::new(0),
        }
    }

    /// Number of allocations refused so far.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

impl AllocProbe for FailAfter {
    fn try_alloc(&self, _size: usize) -> bool {
        let fire = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err();
        if !fire {
            return true;
        }
        let refused = if self.persistent {
            self.failures.fetch_add(1, Ordering::SeqCst);
            true
        } else {
            self.failures
                .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        };
        if refused {
            tracing::trace!(failures = self.failures(), "simulated allocation failure");
        }
        !refused
    }
}
