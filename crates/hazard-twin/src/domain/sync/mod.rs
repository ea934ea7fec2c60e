//! # Synchronization Primitives
//!
//! The lock layer every scenario is built on.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ LockPrimitive (trait)                                    │
//! │  ├─ Semaphore        counting, Fair (FIFO) | Unfair      │
//! │  └─ TicketLock       draw / await_turn / advance         │
//! │                                                          │
//! │ IntrinsicLock         scoped monitor (enter + closure)   │
//! │ OrderedAcquisition    ascending acquire, descending drop │
//! │ CancellationToken     cooperative stop signal            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Every blocking call takes the caller's [`CancellationToken`] and returns
//! [`LockError::Cancelled`] if the token fires while the caller is blocked.
//! Holders are tracked by name, so a lock always knows who owns it and who is
//! queued behind it.

pub mod cancel;
pub mod intrinsic;
pub mod ordered;
pub mod semaphore;
pub mod ticket;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use cancel::{CancellationToken, LockError};
pub use intrinsic::IntrinsicLock;
pub use ordered::OrderedAcquisition;
pub use semaphore::{Fairness, Semaphore};
pub use ticket::{Ticket, TicketLock};

/// Upper bound on how long a blocked waiter goes without re-checking its
/// cancellation token
pub const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(5);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Claimants
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Scheduling priority hint
///
/// Only unfair semaphores look at it: a waiter cannot take a free permit while
/// a waiter of strictly higher priority is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Background work, loses every contested race under bias
    Low,
    /// Default priority
    #[default]
    Normal,
    /// Preferred by unfair locks
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Identity presented to a lock when acquiring it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Claimant {
    name: String,
    priority: Priority,
}

impl Claimant {
    /// Create a claimant
    pub fn new(name: impl Into<String>, priority: Priority) -> Self {
        Self {
            name: name.into(),
            priority,
        }
    }

    /// Claimant name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Claimant priority hint
    #[inline]
    pub fn priority(&self) -> Priority {
        self.priority
    }
}

impl fmt::Display for Claimant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.priority)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LockPrimitive
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Common interface of the blocking locks
///
/// `acquire` blocks until the claimant holds the lock or its token fires.
/// `release` gives the lock back and wakes waiters; releasing a lock the
/// claimant does not hold is an error, never a silent no-op.
pub trait LockPrimitive: Send + Sync {
    /// Lock name, used as the canonical ordering key
    fn name(&self) -> &str;

    /// Block until the lock is held by `claimant`
    ///
    /// # Errors
    ///
    /// `Cancelled` if `token` fires while waiting. The claimant holds nothing
    /// in that case.
    fn acquire(&self, claimant: &Claimant, token: &CancellationToken) -> Result<(), LockError>;

    /// Release the lock held by `claimant`
    ///
    /// # Errors
    ///
    /// `NotHeld` if `claimant` is not a current holder.
    fn release(&self, claimant: &Claimant) -> Result<(), LockError>;

    /// Names of the current holders
    fn holders(&self) -> Vec<String>;

    /// Names of the claimants blocked in `acquire`
    fn waiters(&self) -> Vec<String>;

    /// Acquire and wrap the hold in a guard that releases on drop
    ///
    /// # Errors
    ///
    /// See [`acquire`](Self::acquire).
    fn lock<'a>(
        &'a self,
        claimant: &'a Claimant,
        token: &CancellationToken,
    ) -> Result<LockGuard<'a>, LockError>
    where
        Self: Sized,
    {
        LockGuard::acquire(self, claimant, token)
    }
}

/// RAII hold on a [`LockPrimitive`]
///
/// Dropping the guard releases the lock, on every exit path.
pub struct LockGuard<'a> {
    lock: &'a dyn LockPrimitive,
    claimant: &'a Claimant,
}

impl<'a> LockGuard<'a> {
    /// Block on `lock` and return the hold
    ///
    /// # Errors
    ///
    /// `Cancelled` if `token` fires while waiting.
    pub fn acquire(
        lock: &'a dyn LockPrimitive,
        claimant: &'a Claimant,
        token: &CancellationToken,
    ) -> Result<Self, LockError> {
        lock.acquire(claimant, token)?;
        Ok(Self { lock, claimant })
    }

    /// Name of the held lock
    pub fn lock_name(&self) -> &'a str {
        self.lock.name()
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.lock.release(self.claimant) {
            tracing::error!(lock = self.lock.name(), %err, "guard release failed");
        }
    }
}

impl fmt::Debug for LockGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("lock", &self.lock.name())
            .field("claimant", &self.claimant.name())
            .finish()
    }
}
