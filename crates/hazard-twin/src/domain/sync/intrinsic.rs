//! Intrinsic Monitor
//!
//! A scoped exclusive region: the lock is held for exactly the duration of the
//! closure passed to [`IntrinsicLock::enter`] and released when the scope
//! exits, whether the body returns `Ok`, `Err` or unwinds.

use parking_lot::Mutex;

use super::{CancellationToken, Claimant, LockError, CANCEL_POLL_INTERVAL};

/// Named monitor lock with cancellable entry
#[derive(Debug)]
pub struct IntrinsicLock {
    name: String,
    monitor: Mutex<()>,
    owner: Mutex<Option<String>>,
}

impl IntrinsicLock {
    /// Create an unlocked monitor
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            monitor: Mutex::new(()),
            owner: Mutex::new(None),
        }
    }

    /// Monitor name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current owner, if any
    pub fn owner(&self) -> Option<String> {
        self.owner.lock().clone()
    }

    /// Run `body` while holding the monitor
    ///
    /// # Errors
    ///
    /// `Cancelled` (converted into `E`) if `token` fires before the monitor
    /// is obtained; otherwise whatever `body` returns.
    pub fn enter<R, E, F>(&self, claimant: &Claimant, token: &CancellationToken, body: F) -> Result<R, E>
    where
        E: From<LockError>,
        F: FnOnce() -> Result<R, E>,
    {
        let _held = loop {
            token.checkpoint()?;
            if let Some(guard) = self.monitor.try_lock_for(CANCEL_POLL_INTERVAL) {
                break guard;
            }
        };

        let _owner = OwnerMark::set(&self.owner, claimant.name());
        body()
    }
}

/// Clears the owner slot on every exit path
struct OwnerMark<'a> {
    slot: &'a Mutex<Option<String>>,
}

impl<'a> OwnerMark<'a> {
    fn set(slot: &'a Mutex<Option<String>>, name: &str) -> Self {
        *slot.lock() = Some(name.to_owned());
        Self { slot }
    }
}

impl Drop for OwnerMark<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}
