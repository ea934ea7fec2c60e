//! Joint Account
//!
//! The race-condition resource. The balance is a word-sized cell that is only
//! ever touched with a plain load and a plain store, never a fetch-add, so an
//! unguarded read-sleep-write really does lose updates.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::domain::error::{HazardError, HazardResult};
use crate::domain::sync::{Fairness, IntrinsicLock, Semaphore};

/// Balance plus the two locks that can guard it
#[derive(Debug)]
pub struct Account {
    name: String,
    balance: AtomicI64,
    semaphore: Semaphore,
    monitor: IntrinsicLock,
}

impl Account {
    /// Open an account with an initial balance
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `name` is empty.
    pub fn new(name: impl Into<String>, initial: i64) -> HazardResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(HazardError::invalid("account name must not be empty"));
        }
        Ok(Self {
            semaphore: Semaphore::binary(format!("{name}/semaphore"), Fairness::Fair)?,
            monitor: IntrinsicLock::new(format!("{name}/monitor")),
            balance: AtomicI64::new(initial),
            name,
        })
    }

    /// Account name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the balance (one load)
    #[inline]
    pub fn read_balance(&self) -> i64 {
        self.balance.load(Ordering::SeqCst)
    }

    /// Overwrite the balance (one store)
    #[inline]
    pub fn write_balance(&self, value: i64) {
        self.balance.store(value, Ordering::SeqCst);
    }

    /// Fair binary semaphore guarding the balance
    #[inline]
    pub fn semaphore(&self) -> &Semaphore {
        &self.semaphore
    }

    /// Intrinsic monitor guarding the balance
    #[inline]
    pub fn monitor(&self) -> &IntrinsicLock {
        &self.monitor
    }
}
