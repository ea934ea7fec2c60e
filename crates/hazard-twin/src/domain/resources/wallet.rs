//! Wallet
//!
//! Identity-only resource for the deadlock scenario. It owns a binary
//! semaphore and an intrinsic monitor; which one a transfer uses depends on
//! the policy.

use crate::domain::error::{HazardError, HazardResult};
use crate::domain::sync::{Fairness, IntrinsicLock, Semaphore};

/// A lockable client wallet
#[derive(Debug)]
pub struct Wallet {
    semaphore: Semaphore,
    monitor: IntrinsicLock,
}

impl Wallet {
    /// Create a wallet; its locks share its name, which is also its rank
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `name` is empty.
    pub fn new(name: impl Into<String>) -> HazardResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(HazardError::invalid("wallet name must not be empty"));
        }
        Ok(Self {
            monitor: IntrinsicLock::new(name.clone()),
            semaphore: Semaphore::binary(name, Fairness::Fair)?,
        })
    }

    /// Wallet name
    #[inline]
    pub fn name(&self) -> &str {
        self.monitor.name()
    }

    /// Binary semaphore
    #[inline]
    pub fn semaphore(&self) -> &Semaphore {
        &self.semaphore
    }

    /// Intrinsic monitor
    #[inline]
    pub fn monitor(&self) -> &IntrinsicLock {
        &self.monitor
    }
}
