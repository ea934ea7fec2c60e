//! Monitor Bookkeeping
//!
//! Per-actor access counters and wait timers. Owned by the monitor and only
//! touched inside its critical section.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use super::event::EventKind;
use super::report::MonitorReport;

/// Counters and timers accumulated over a run
#[derive(Debug, Default)]
pub struct MonitorState {
    access_counts: HashMap<String, u64>,
    wait_started: HashMap<String, Instant>,
    longest_wait: HashMap<String, Duration>,
}

impl MonitorState {
    /// Fold one event into the state
    ///
    /// Returns the length of the wait this event closed, if any.
    pub fn observe(&mut self, actor: &str, kind: EventKind, now: Instant) -> Option<Duration> {
        if kind.is_critical() {
            return None;
        }
        if kind.is_successful_work() {
            *self.access_counts.entry(actor.to_owned()).or_insert(0) += 1;
        }
        if kind.starts_wait() {
            self.wait_started.insert(actor.to_owned(), now);
            return None;
        }
        if !kind.is_acquisition() {
            return None;
        }

        let started = self.wait_started.remove(actor)?;
        let waited = now.saturating_duration_since(started);
        let longest = self.longest_wait.entry(actor.to_owned()).or_default();
        if waited > *longest {
            *longest = waited;
        }
        Some(waited)
    }

    /// Access count for one actor
    pub fn access_count(&self, actor: &str) -> u64 {
        self.access_counts.get(actor).copied().unwrap_or(0)
    }

    /// Longest closed wait for one actor
    pub fn longest_wait(&self, actor: &str) -> Option<Duration> {
        self.longest_wait.get(actor).copied()
    }

    /// Actors with an open wait timer
    pub fn pending_waits(&self) -> usize {
        self.wait_started.len()
    }

    /// Produce the report and reset everything
    pub fn drain(&mut self) -> MonitorReport {
        let access_counts: BTreeMap<String, u64> = self.access_counts.drain().collect();
        let longest_wait_ms = self
            .longest_wait
            .drain()
            .map(|(actor, wait)| (actor, u64::try_from(wait.as_millis()).unwrap_or(u64::MAX)))
            .collect();
        self.wait_started.clear();
        MonitorReport {
            access_counts,
            longest_wait_ms,
        }
    }
}
