//! Service Desk
//!
//! The starvation resource: a single service counter whose lock decides who
//! gets served next.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::error::HazardResult;
use crate::domain::sync::{Fairness, LockPrimitive, Semaphore, TicketLock};

/// Lock in front of the desk
#[derive(Debug)]
pub enum DeskLock {
    /// Semaphore, fair or unfair
    Semaphore(Semaphore),
    /// Ticket dispenser
    Ticket(TicketLock),
}

impl DeskLock {
    /// The lock as a [`LockPrimitive`]
    pub fn as_primitive(&self) -> &dyn LockPrimitive {
        match self {
            Self::Semaphore(sem) => sem,
            Self::Ticket(ticket) => ticket,
        }
    }
}

impl fmt::Display for DeskLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Semaphore(sem) if sem.fairness() == Fairness::Fair => write!(f, "fair semaphore"),
            Self::Semaphore(_) => write!(f, "unfair semaphore"),
            Self::Ticket(_) => write!(f, "ticket lock"),
        }
    }
}

/// One counter, one customer at a time
#[derive(Debug)]
pub struct ServiceDesk {
    lock: DeskLock,
    served: AtomicU64,
}

impl ServiceDesk {
    /// Desk behind an unfair, priority-biased semaphore
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `name` is empty.
    pub fn unfair(name: impl Into<String>) -> HazardResult<Self> {
        Ok(Self::with_lock(DeskLock::Semaphore(Semaphore::binary(name, Fairness::Unfair)?)))
    }

    /// Desk behind a FIFO semaphore
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `name` is empty.
    pub fn fair(name: impl Into<String>) -> HazardResult<Self> {
        Ok(Self::with_lock(DeskLock::Semaphore(Semaphore::binary(name, Fairness::Fair)?)))
    }

    /// Desk behind a ticket lock
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `name` is empty.
    pub fn ticketed(name: impl Into<String>) -> HazardResult<Self> {
        Ok(Self::with_lock(DeskLock::Ticket(TicketLock::new(name)?)))
    }

    fn with_lock(lock: DeskLock) -> Self {
        Self {
            lock,
            served: AtomicU64::new(0),
        }
    }

    /// Desk name
    pub fn name(&self) -> &str {
        self.lock.as_primitive().name()
    }

    /// The lock in front of the desk
    pub fn lock(&self) -> &dyn LockPrimitive {
        self.lock.as_primitive()
    }

    /// Lock flavour
    pub fn lock_kind(&self) -> &DeskLock {
        &self.lock
    }

    /// Record one completed service
    pub fn serve(&self) -> u64 {
        self.served.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Services completed so far
    pub fn served(&self) -> u64 {
        self.served.load(Ordering::SeqCst)
    }
}
