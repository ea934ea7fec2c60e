//! # Hazard Scenarios
//!
//! Each scenario is a workload an actor thread runs, parameterised by a
//! policy that is either unsafe (exhibits the hazard) or safe (a mitigation).
//!
//! | Scenario | Unsafe | Safe |
//! |----------|--------|------|
//! | race condition | unguarded read-sleep-write | fair semaphore, intrinsic monitor |
//! | deadlock | opposite-order acquisition | ordered semaphores, ordered nested monitors |
//! | starvation | unfair lock with priority bias | fair semaphore, ticket lock |
//!
//! Workloads only talk to the outside world through [`ActorContext`]: events
//! go to the monitor, delays and lock waits observe the cancellation token.

pub mod deadlock;
pub mod race;
pub mod starvation;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

pub use deadlock::{DeadlockPolicy, Transfer, TransferTiming};
pub use race::{LatencyWindow, RaceDeposit, RacePolicy};
pub use starvation::{open_desk, CreditRequest};

use crate::domain::error::HazardResult;
use crate::domain::monitor::{EventKind, EventMonitor};
use crate::domain::sync::{CancellationToken, Claimant, LockError, LockGuard, LockPrimitive};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Selection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which hazard to reproduce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Lost update on a shared balance
    RaceCondition,
    /// Circular wait between two transfers
    Deadlock,
    /// Low-priority actor locked out by high-priority traffic
    Starvation,
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RaceCondition => f.write_str("race-condition"),
            Self::Deadlock => f.write_str("deadlock"),
            Self::Starvation => f.write_str("starvation"),
        }
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "race" | "race-condition" => Ok(Self::RaceCondition),
            "deadlock" => Ok(Self::Deadlock),
            "starvation" => Ok(Self::Starvation),
            other => Err(format!("unknown scenario: {other}")),
        }
    }
}

/// Mitigation family for secure runs
///
/// Each scenario maps the family onto its own concrete policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Technique {
    /// Semaphore-based: fair binary semaphore, ordered semaphores
    #[default]
    FairSemaphore,
    /// Monitor-based: intrinsic monitor, nested monitors, ticket lock
    TicketOrIntrinsicMonitor,
}

impl Technique {
    /// Technique in effect for a run: `None` when not secure, the default
    /// when secure and unspecified
    pub fn resolve(secure: bool, requested: Option<Self>) -> Option<Self> {
        secure.then(|| requested.unwrap_or_default())
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FairSemaphore => f.write_str("fair-semaphore"),
            Self::TicketOrIntrinsicMonitor => f.write_str("ticket-or-intrinsic-monitor"),
        }
    }
}

impl FromStr for Technique {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "semaphore" | "fair-semaphore" => Ok(Self::FairSemaphore),
            "monitor" | "ticket" | "ticket-or-intrinsic-monitor" => {
                Ok(Self::TicketOrIntrinsicMonitor)
            }
            other => Err(format!("unknown technique: {other}")),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Actors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Part an actor plays in its scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActorRole {
    /// Race-condition depositor
    Depositor,
    /// Deadlock transfer agent
    Agent,
    /// Starvation: preferred client
    HighPriority,
    /// Starvation: background client
    LowPriority,
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Depositor => f.write_str("depositor"),
            Self::Agent => f.write_str("agent"),
            Self::HighPriority => f.write_str("high-priority"),
            Self::LowPriority => f.write_str("low-priority"),
        }
    }
}

/// Everything a workload may touch besides its resources
#[derive(Debug, Clone)]
pub struct ActorContext {
    claimant: Claimant,
    token: CancellationToken,
    monitor: Arc<EventMonitor>,
}

impl ActorContext {
    /// Bundle an identity, its token and the shared monitor
    pub fn new(claimant: Claimant, token: CancellationToken, monitor: Arc<EventMonitor>) -> Self {
        Self {
            claimant,
            token,
            monitor,
        }
    }

    /// Actor name
    #[inline]
    pub fn name(&self) -> &str {
        self.claimant.name()
    }

    /// Lock identity
    #[inline]
    pub fn claimant(&self) -> &Claimant {
        &self.claimant
    }

    /// Cancellation token
    #[inline]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Shared monitor
    #[inline]
    pub fn monitor(&self) -> &Arc<EventMonitor> {
        &self.monitor
    }

    /// Report an event as this actor
    pub fn log(&self, kind: EventKind, message: impl Into<String>) {
        self.monitor.log(self.claimant.name(), kind, message);
    }

    /// Cancellation checkpoint
    ///
    /// # Errors
    ///
    /// `Cancelled` once the actor has been cancelled.
    #[inline]
    pub fn checkpoint(&self) -> Result<(), LockError> {
        self.token.checkpoint()
    }

    /// Cancellable simulated delay
    ///
    /// # Errors
    ///
    /// `Cancelled` if the actor is cancelled before `duration` elapses.
    pub fn pause(&self, duration: Duration) -> Result<(), LockError> {
        self.token.sleep(duration)
    }

    /// `WAIT`, block on `lock`, `LOCK_ACQUIRED`; the wait is recorded in `stats`
    ///
    /// # Errors
    ///
    /// `Cancelled` if the actor is cancelled while waiting.
    pub fn acquire<'a>(
        &'a self,
        lock: &'a dyn LockPrimitive,
        stats: &mut WorkStats,
    ) -> Result<LockGuard<'a>, LockError> {
        self.log(EventKind::Wait, format!("waiting for {}", lock.name()));
        let started = Instant::now();
        let guard = LockGuard::acquire(lock, &self.claimant, &self.token)?;
        stats.record_wait(started.elapsed());
        self.log(EventKind::LockAcquired, format!("holding {}", lock.name()));
        Ok(guard)
    }

    /// Drop `guard` and report `LOCK_RELEASE`
    pub fn release(&self, guard: LockGuard<'_>) {
        let name = guard.lock_name().to_owned();
        drop(guard);
        self.log(EventKind::LockRelease, format!("released {name}"));
    }
}

/// Per-actor counters kept by the actor itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkStats {
    /// Completed units of work
    pub operations: u64,
    /// Longest single lock wait
    #[serde(serialize_with = "serialize_ms")]
    pub longest_wait: Duration,
}

impl WorkStats {
    /// Fold in one lock wait
    pub fn record_wait(&mut self, waited: Duration) {
        self.longest_wait = self.longest_wait.max(waited);
    }

    /// Count one completed unit of work
    pub fn record_operation(&mut self) {
        self.operations += 1;
    }
}

fn serialize_ms<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u128(duration.as_millis())
}

/// A unit of work an actor thread runs to completion or cancellation
pub trait ActorWorkload: Send + Sync + 'static {
    /// Role in the scenario
    fn role(&self) -> ActorRole;

    /// Run the workload
    ///
    /// Every lock taken must be released before returning, on every path.
    ///
    /// # Errors
    ///
    /// `Lock(Cancelled)` when the actor's token fires; the runner logs the
    /// interruption. Any other error marks the actor as failed.
    fn perform(&self, ctx: &ActorContext, stats: &mut WorkStats) -> HazardResult<()>;
}
