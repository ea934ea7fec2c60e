//! Cooperative Cancellation
//!
//! A [`CancellationToken`] is the only way an actor is ever stopped. Nothing
//! unwinds an actor from the outside: the token is raised (by the monitor's
//! enforcement path or by the orchestrator) and the actor observes it at its
//! next checkpoint, inside a blocking lock wait, or inside a simulated delay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Errors raised by blocking synchronization calls
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    /// The caller's cancellation token fired while it was blocked or sleeping
    #[error("cancelled")]
    Cancelled,

    /// The caller tried to release a lock it does not hold
    #[error("{holder} does not hold {lock}")]
    NotHeld {
        /// Lock that was released
        lock: String,
        /// Claimant that attempted the release
        holder: String,
    },
}

#[derive(Debug, Default)]
struct TokenInner {
    cancelled: AtomicBool,
    gate: Mutex<()>,
    wakeup: Condvar,
}

/// Shared cancellation flag with an interruptible sleep
///
/// Cloning is cheap; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    /// Create a fresh, un-cancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag and wake every sleeper
    ///
    /// Idempotent. Returns `true` only for the call that actually flipped the
    /// flag, which lets enforcement record a kill exactly once.
    pub fn cancel(&self) -> bool {
        let first = !self.inner.cancelled.swap(true, Ordering::SeqCst);
        // Taking the gate orders the flag store before any sleeper re-check.
        let _gate = self.inner.gate.lock();
        self.inner.wakeup.notify_all();
        first
    }

    /// Whether the flag has been raised
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Checkpoint
    ///
    /// # Errors
    ///
    /// `Cancelled` once the flag is up.
    #[inline]
    pub fn checkpoint(&self) -> Result<(), LockError> {
        if self.is_cancelled() {
            Err(LockError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`
    ///
    /// # Errors
    ///
    /// `Cancelled`, returned early, if the token fires in the meantime.
    pub fn sleep(&self, duration: Duration) -> Result<(), LockError> {
        let deadline = Instant::now() + duration;
        let mut gate = self.inner.gate.lock();
        loop {
            if self.is_cancelled() {
                return Err(LockError::Cancelled);
            }
            if Instant::now() >= deadline {
                return Ok(());
            }
            self.inner.wakeup.wait_until(&mut gate, deadline);
        }
    }

    /// Whether two handles share the same flag
    pub fn same_as(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
