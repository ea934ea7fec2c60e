//! Counting Semaphore
//!
//! A permit counter with a named wait queue. The [`Fairness`] flag decides who
//! gets a freed permit:
//!
//! - **Fair**: strict arrival order. A newcomer only takes a permit when nobody
//!   is queued; a queued waiter only when it is at the head.
//! - **Unfair**: anyone may take a free permit (barging), except that a caller
//!   never wins over a queued waiter of strictly higher [`Priority`].

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use super::{CancellationToken, Claimant, LockError, LockPrimitive, Priority, CANCEL_POLL_INTERVAL};
use crate::domain::error::{HazardError, HazardResult};

/// Permit hand-off policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fairness {
    /// FIFO: acquisition order equals arrival order
    Fair,
    /// Barging with priority bias
    Unfair,
}

#[derive(Debug)]
struct Waiter {
    arrival: u64,
    priority: Priority,
    name: String,
}

#[derive(Debug)]
struct SemaphoreState {
    permits: usize,
    waiters: VecDeque<Waiter>,
    holders: Vec<String>,
    next_arrival: u64,
}

impl SemaphoreState {
    fn outranked(&self, priority: Priority, skip: Option<u64>) -> bool {
        self.waiters
            .iter()
            .any(|w| Some(w.arrival) != skip && w.priority > priority)
    }

    fn grant(&mut self, name: &str) {
        self.permits -= 1;
        self.holders.push(name.to_owned());
    }

    fn dequeue(&mut self, arrival: u64) {
        if let Some(pos) = self.waiters.iter().position(|w| w.arrival == arrival) {
            self.waiters.remove(pos);
        }
    }
}

/// Semaphore with holder tracking and cancellable waits
#[derive(Debug)]
pub struct Semaphore {
    name: String,
    fairness: Fairness,
    capacity: usize,
    state: Mutex<SemaphoreState>,
    available: Condvar,
}

impl Semaphore {
    /// Create a counting semaphore
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `permits` is zero or `name` is empty.
    pub fn new(name: impl Into<String>, permits: usize, fairness: Fairness) -> HazardResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(HazardError::invalid("semaphore name must not be empty"));
        }
        if permits == 0 {
            return Err(HazardError::invalid(format!(
                "semaphore {name} needs at least one permit"
            )));
        }
        Ok(Self {
            name,
            fairness,
            capacity: permits,
            state: Mutex::new(SemaphoreState {
                permits,
                waiters: VecDeque::new(),
                holders: Vec::new(),
                next_arrival: 0,
            }),
            available: Condvar::new(),
        })
    }

    /// Binary semaphore (one permit)
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `name` is empty.
    pub fn binary(name: impl Into<String>, fairness: Fairness) -> HazardResult<Self> {
        Self::new(name, 1, fairness)
    }

    /// Hand-off policy
    #[inline]
    pub fn fairness(&self) -> Fairness {
        self.fairness
    }

    /// Total permits
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free
    pub fn available_permits(&self) -> usize {
        self.state.lock().permits
    }

    /// Number of blocked claimants
    pub fn queue_len(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Take a permit if one can be granted right now, never blocking
    ///
    /// Follows the same admission rule as a fresh `acquire`.
    pub fn try_acquire(&self, claimant: &Claimant) -> bool {
        let mut state = self.state.lock();
        if self.admits_newcomer(&state, claimant.priority()) {
            state.grant(claimant.name());
            true
        } else {
            false
        }
    }

    fn admits_newcomer(&self, state: &SemaphoreState, priority: Priority) -> bool {
        if state.permits == 0 {
            return false;
        }
        match self.fairness {
            Fairness::Fair => state.waiters.is_empty(),
            Fairness::Unfair => !state.outranked(priority, None),
        }
    }

    fn admits_waiter(&self, state: &SemaphoreState, arrival: u64, priority: Priority) -> bool {
        if state.permits == 0 {
            return false;
        }
        match self.fairness {
            Fairness::Fair => state.waiters.front().map(|w| w.arrival) == Some(arrival),
            Fairness::Unfair => !state.outranked(priority, Some(arrival)),
        }
    }
}

impl LockPrimitive for Semaphore {
    fn name(&self) -> &str {
        &self.name
    }

    fn acquire(&self, claimant: &Claimant, token: &CancellationToken) -> Result<(), LockError> {
        token.checkpoint()?;

        let mut state = self.state.lock();
        if self.admits_newcomer(&state, claimant.priority()) {
            state.grant(claimant.name());
            return Ok(());
        }

        let arrival = state.next_arrival;
        state.next_arrival += 1;
        state.waiters.push_back(Waiter {
            arrival,
            priority: claimant.priority(),
            name: claimant.name().to_owned(),
        });

        loop {
            if self.admits_waiter(&state, arrival, claimant.priority()) {
                state.dequeue(arrival);
                state.grant(claimant.name());
                if state.permits > 0 {
                    self.available.notify_all();
                }
                return Ok(());
            }
            if token.is_cancelled() {
                state.dequeue(arrival);
                // The head may have changed.
                self.available.notify_all();
                tracing::debug!(lock = %self.name, claimant = %claimant, "wait cancelled");
                return Err(LockError::Cancelled);
            }
            self.available.wait_for(&mut state, CANCEL_POLL_INTERVAL);
        }
    }

    fn release(&self, claimant: &Claimant) -> Result<(), LockError> {
        let mut state = self.state.lock();
        let Some(pos) = state.holders.iter().position(|h| h == claimant.name()) else {
            return Err(LockError::NotHeld {
                lock: self.name.clone(),
                holder: claimant.name().to_owned(),
            });
        };
        state.holders.swap_remove(pos);
        state.permits += 1;
        self.available.notify_all();
        Ok(())
    }

    fn holders(&self) -> Vec<String> {
        self.state.lock().holders.clone()
    }

    fn waiters(&self) -> Vec<String> {
        self.state.lock().waiters.iter().map(|w| w.name.clone()).collect()
    }
}
