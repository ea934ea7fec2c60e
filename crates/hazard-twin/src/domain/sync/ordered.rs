//! Ordered Acquisition
//!
//! Multi-lock acquisition in one global order. Locks are ranked by name and
//! taken ascending; whatever is held when the helper drops is released
//! descending. Two actors asking for the same pair in opposite order therefore
//! contend on the same first lock and can never form a circular wait.

use super::{CancellationToken, Claimant, LockError, LockPrimitive};

/// Acquisition plan over a set of locks
pub struct OrderedAcquisition<'a> {
    claimant: &'a Claimant,
    plan: Vec<&'a dyn LockPrimitive>,
    held: usize,
}

impl<'a> OrderedAcquisition<'a> {
    /// Rank `locks` by name; duplicates (same name) are kept once
    pub fn new(claimant: &'a Claimant, locks: &[&'a dyn LockPrimitive]) -> Self {
        let mut plan = locks.to_vec();
        plan.sort_by(|a, b| a.name().cmp(b.name()));
        plan.dedup_by(|a, b| a.name() == b.name());
        Self {
            claimant,
            plan,
            held: 0,
        }
    }

    /// Name of the next lock to acquire, if any remain
    pub fn next_pending(&self) -> Option<&'a str> {
        self.plan.get(self.held).copied().map(|lock| lock.name())
    }

    /// Lock names in acquisition order
    pub fn order(&self) -> Vec<&'a str> {
        self.plan.iter().copied().map(|lock| lock.name()).collect()
    }

    /// Acquire the next lock in rank order
    ///
    /// Returns the acquired lock's name, or `None` once every lock is held.
    ///
    /// # Errors
    ///
    /// `Cancelled` if the token fires while blocked. Locks already held stay
    /// held until the helper drops.
    pub fn acquire_next(&mut self, token: &CancellationToken) -> Result<Option<&'a str>, LockError> {
        let Some(lock) = self.plan.get(self.held).copied() else {
            return Ok(None);
        };
        lock.acquire(self.claimant, token)?;
        self.held += 1;
        Ok(Some(lock.name()))
    }

    /// Acquire every remaining lock
    ///
    /// # Errors
    ///
    /// See [`acquire_next`](Self::acquire_next).
    pub fn acquire_all(&mut self, token: &CancellationToken) -> Result<(), LockError> {
        while self.acquire_next(token)?.is_some() {}
        Ok(())
    }

    /// Number of locks currently held
    #[inline]
    pub fn held(&self) -> usize {
        self.held
    }
}

impl Drop for OrderedAcquisition<'_> {
    fn drop(&mut self) {
        for lock in self.plan[..self.held].iter().rev() {
            if let Err(err) = lock.release(self.claimant) {
                tracing::error!(lock = lock.name(), %err, "ordered release failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sync::{Fairness, Priority, Semaphore};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_order_is_by_name() {
        let a = Semaphore::binary("client-a", Fairness::Fair).unwrap();
        let b = Semaphore::binary("client-b", Fairness::Fair).unwrap();
        let me = Claimant::new("agent", Priority::Normal);

        let locks: [&dyn LockPrimitive; 2] = [&b, &a];
        let plan = OrderedAcquisition::new(&me, &locks);
        assert_eq!(plan.order(), vec!["client-a", "client-b"]);
        assert_eq!(plan.next_pending(), Some("client-a"));
    }

    #[test]
    fn test_drop_releases_everything_held() {
        let a = Semaphore::binary("a", Fairness::Fair).unwrap();
        let b = Semaphore::binary("b", Fairness::Fair).unwrap();
        let me = Claimant::new("agent", Priority::Normal);
        let token = CancellationToken::new();
        {
            let locks: [&dyn LockPrimitive; 2] = [&b, &a];
            let mut plan = OrderedAcquisition::new(&me, &locks);
            assert_eq!(plan.acquire_next(&token).unwrap(), Some("a"));
            assert_eq!(a.available_permits(), 0);
            assert_eq!(b.available_permits(), 1);
            plan.acquire_all(&token).unwrap();
            assert_eq!(plan.held(), 2);
        }
        assert_eq!(a.available_permits(), 1);
        assert_eq!(b.available_permits(), 1);
    }

    #[test]
    fn test_opposite_requests_do_not_deadlock() {
        let a = Arc::new(Semaphore::binary("a", Fairness::Fair).unwrap());
        let b = Arc::new(Semaphore::binary("b", Fairness::Fair).unwrap());

        let handles: Vec<_> = (0..2)
            .map(|i| {
                let (a, b) = (Arc::clone(&a), Arc::clone(&b));
                thread::spawn(move || {
                    let me = Claimant::new(format!("agent-{i}"), Priority::Normal);
                    let token = CancellationToken::new();
                    for _ in 0..200 {
                        let locks: [&dyn LockPrimitive; 2] =
                            if i == 0 { [&*a, &*b] } else { [&*b, &*a] };
                        let mut plan = OrderedAcquisition::new(&me, &locks);
                        plan.acquire_all(&token).unwrap();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(a.available_permits(), 1);
        assert_eq!(b.available_permits(), 1);
    }
}
