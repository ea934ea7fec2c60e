//! Ticket Lock
//!
//! FIFO mutual exclusion from a pair of counters:
//!
//! ```text
//!   draw()        next_ticket ──► t            (unique, strictly increasing)
//!   await_turn(t) wait until serving == t      (predicate loop on a condvar)
//!   advance()     serving += 1, wake everyone
//! ```
//!
//! Invariant: `serving <= next_ticket`, and at most one ticket is being served.
//! A waiter that is cancelled abandons its ticket; `advance` skips abandoned
//! tickets so the line never stalls on a departed customer.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use parking_lot::{Condvar, Mutex};

use super::{CancellationToken, Claimant, LockError, LockPrimitive, CANCEL_POLL_INTERVAL};
use crate::domain::error::{HazardError, HazardResult};

/// A place in the line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    /// Ticket number
    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
struct TicketState {
    next_ticket: u64,
    serving: u64,
    abandoned: BTreeSet<u64>,
    waiting: BTreeMap<u64, String>,
    holder: Option<(u64, String)>,
}

/// Ticket dispenser plus "now serving" board
#[derive(Debug)]
pub struct TicketLock {
    name: String,
    state: Mutex<TicketState>,
    turn: Condvar,
}

impl TicketLock {
    /// Create a ticket lock with both counters at zero
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `name` is empty.
    pub fn new(name: impl Into<String>) -> HazardResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(HazardError::invalid("ticket lock name must not be empty"));
        }
        Ok(Self {
            name,
            state: Mutex::new(TicketState::default()),
            turn: Condvar::new(),
        })
    }

    /// Take the next ticket on behalf of `claimant`
    pub fn draw(&self, claimant: &Claimant) -> Ticket {
        let mut state = self.state.lock();
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.waiting.insert(ticket, claimant.name().to_owned());
        Ticket(ticket)
    }

    /// Block until `ticket` is being served
    ///
    /// # Errors
    ///
    /// `Cancelled` if `token` fires first. The ticket is abandoned and will be
    /// skipped when its turn comes.
    pub fn await_turn(&self, ticket: Ticket, token: &CancellationToken) -> Result<(), LockError> {
        let mut state = self.state.lock();
        loop {
            if state.serving == ticket.0 {
                let name = state.waiting.remove(&ticket.0).unwrap_or_default();
                state.holder = Some((ticket.0, name));
                return Ok(());
            }
            if token.is_cancelled() {
                state.waiting.remove(&ticket.0);
                state.abandoned.insert(ticket.0);
                self.turn.notify_all();
                tracing::debug!(lock = %self.name, %ticket, "ticket abandoned");
                return Err(LockError::Cancelled);
            }
            self.turn.wait_for(&mut state, CANCEL_POLL_INTERVAL);
        }
    }

    /// Finish serving `ticket` and call the next live one
    ///
    /// # Errors
    ///
    /// `NotHeld` if `ticket` is not the one being served.
    pub fn advance(&self, ticket: Ticket) -> Result<(), LockError> {
        let mut state = self.state.lock();
        match &state.holder {
            Some((served, _)) if *served == ticket.0 => {}
            _ => {
                return Err(LockError::NotHeld {
                    lock: self.name.clone(),
                    holder: ticket.to_string(),
                })
            }
        }
        Self::advance_locked(&mut state);
        self.turn.notify_all();
        Ok(())
    }

    fn advance_locked(state: &mut TicketState) {
        state.holder = None;
        state.serving += 1;
        while state.abandoned.remove(&state.serving) {
            state.serving += 1;
        }
    }

    /// Ticket currently being served
    pub fn serving(&self) -> u64 {
        self.state.lock().serving
    }

    /// Next ticket the dispenser will hand out
    pub fn next_ticket(&self) -> u64 {
        self.state.lock().next_ticket
    }
}

impl LockPrimitive for TicketLock {
    fn name(&self) -> &str {
        &self.name
    }

    fn acquire(&self, claimant: &Claimant, token: &CancellationToken) -> Result<(), LockError> {
        token.checkpoint()?;
        let ticket = self.draw(claimant);
        self.await_turn(ticket, token)
    }

    fn release(&self, claimant: &Claimant) -> Result<(), LockError> {
        let mut state = self.state.lock();
        match &state.holder {
            Some((_, holder)) if holder == claimant.name() => {}
            _ => {
                return Err(LockError::NotHeld {
                    lock: self.name.clone(),
                    holder: claimant.name().to_owned(),
                })
            }
        }
        Self::advance_locked(&mut state);
        self.turn.notify_all();
        Ok(())
    }

    fn holders(&self) -> Vec<String> {
        self.state
            .lock()
            .holder
            .iter()
            .map(|(_, name)| name.clone())
            .collect()
    }

    fn waiters(&self) -> Vec<String> {
        self.state.lock().waiting.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sync::Priority;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_tickets_strictly_increase() {
        let lock = TicketLock::new("line").unwrap();
        let c = Claimant::new("c", Priority::Normal);
        let drawn: Vec<u64> = (0..5).map(|_| lock.draw(&c).value()).collect();
        assert_eq!(drawn, vec![0, 1, 2, 3, 4]);
        assert_eq!(lock.next_ticket(), 5);
        assert_eq!(lock.serving(), 0);
    }

    #[test]
    fn test_advance_requires_current_ticket() {
        let lock = TicketLock::new("line").unwrap();
        let c = Claimant::new("c", Priority::Normal);
        let first = lock.draw(&c);
        let second = lock.draw(&c);
        let token = CancellationToken::new();

        lock.await_turn(first, &token).unwrap();
        assert!(lock.advance(second).is_err());
        lock.advance(first).unwrap();
        assert_eq!(lock.serving(), 1);
    }

    #[test]
    fn test_abandoned_ticket_is_skipped() {
        let lock = Arc::new(TicketLock::new("line").unwrap());
        let front = Claimant::new("front", Priority::Normal);
        let token = CancellationToken::new();
        lock.acquire(&front, &token).unwrap();

        let quitter_token = CancellationToken::new();
        let quitter = {
            let lock = Arc::clone(&lock);
            let token = quitter_token.clone();
            thread::spawn(move || lock.acquire(&Claimant::new("quitter", Priority::Normal), &token))
        };
        while lock.next_ticket() < 2 {
            thread::sleep(Duration::from_millis(1));
        }
        let patient = Claimant::new("patient", Priority::Normal);
        let patient_ticket = lock.draw(&patient);

        quitter_token.cancel();
        assert_eq!(quitter.join().unwrap(), Err(LockError::Cancelled));

        lock.release(&front).unwrap();
        assert_eq!(lock.serving(), patient_ticket.value());
        lock.await_turn(patient_ticket, &token).unwrap();
        assert_eq!(lock.holders(), vec!["patient".to_string()]);
    }
}
