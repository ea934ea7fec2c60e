//! Actor Runtime
//!
//! One OS thread per actor. The runtime registers the actor with the monitor
//! before the thread starts, runs the workload, turns its exit into an
//! [`ActorSummary`] and publishes that through a completion latch the
//! orchestrator can wait on with a deadline.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use crate::domain::error::{HazardError, HazardResult};
use crate::domain::monitor::{EventKind, EventMonitor, WatchPolicy};
use crate::domain::scenario::{ActorContext, ActorRole, ActorWorkload, WorkStats};
use crate::domain::sync::{CancellationToken, Claimant, LockError};

/// How an actor ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActorExit {
    /// Workload ran to the end
    Completed,
    /// Stopped by its cancellation token
    Cancelled,
    /// Workload returned a non-cancellation error
    Failed,
    /// Workload panicked
    Panicked,
    /// Still running when the orchestrator gave up on it
    Unresponsive,
}

impl fmt::Display for ActorExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Panicked => "panicked",
            Self::Unresponsive => "unresponsive",
        };
        f.write_str(text)
    }
}

/// Final state of one actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActorSummary {
    /// Actor name
    pub name: String,
    /// Scenario role
    pub role: ActorRole,
    /// Exit state
    pub exit: ActorExit,
    /// Work counters
    pub stats: WorkStats,
    /// Wall time from spawn to exit
    pub elapsed_ms: u64,
}

#[derive(Debug, Default)]
struct Completion {
    summary: Mutex<Option<ActorSummary>>,
    done: Condvar,
}

impl Completion {
    fn finish(&self, summary: ActorSummary) {
        *self.summary.lock() = Some(summary);
        self.done.notify_all();
    }

    fn wait_until(&self, deadline: Instant) -> bool {
        let mut summary = self.summary.lock();
        while summary.is_none() {
            if self.done.wait_until(&mut summary, deadline).timed_out() {
                return summary.is_some();
            }
        }
        true
    }
}

/// Owner's side of a running actor
#[derive(Debug)]
pub struct ActorHandle {
    name: String,
    role: ActorRole,
    token: CancellationToken,
    spawned_at: Instant,
    completion: Arc<Completion>,
    thread: Option<JoinHandle<()>>,
}

impl ActorHandle {
    /// Actor name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Actor's cancellation token
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Request cancellation; `true` if this call raised the flag
    pub fn cancel(&self) -> bool {
        self.token.cancel()
    }

    /// Whether the actor has published its summary
    pub fn is_finished(&self) -> bool {
        self.completion.summary.lock().is_some()
    }

    /// Wait for the actor to finish, at most until `deadline`
    pub fn join_until(&self, deadline: Instant) -> bool {
        self.completion.wait_until(deadline)
    }

    /// Wait for the actor to finish, at most `timeout`
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        self.join_until(Instant::now() + timeout)
    }

    /// Summary if finished
    pub fn summary(&self) -> Option<ActorSummary> {
        self.completion.summary.lock().clone()
    }

    /// Consume the handle
    ///
    /// A finished actor's thread is joined. An unfinished one is detached and
    /// reported as [`ActorExit::Unresponsive`].
    pub fn into_summary(mut self) -> ActorSummary {
        if let Some(summary) = self.summary() {
            if let Some(thread) = self.thread.take() {
                if thread.join().is_err() {
                    tracing::warn!(actor = %self.name, "actor thread ended abnormally");
                }
            }
            return summary;
        }
        tracing::warn!(actor = %self.name, "detaching unresponsive actor");
        ActorSummary {
            name: self.name.clone(),
            role: self.role,
            exit: ActorExit::Unresponsive,
            stats: WorkStats::default(),
            elapsed_ms: millis(self.spawned_at.elapsed()),
        }
    }
}

/// Register `claimant` with the monitor and start its thread
///
/// # Errors
///
/// `Spawn` if the OS refuses the thread; the registration is rolled back.
pub fn spawn_actor(
    monitor: &Arc<EventMonitor>,
    claimant: Claimant,
    policy: WatchPolicy,
    workload: Arc<dyn ActorWorkload>,
) -> HazardResult<ActorHandle> {
    let name = claimant.name().to_owned();
    let role = workload.role();
    let token = CancellationToken::new();
    let completion = Arc::new(Completion::default());
    let spawned_at = Instant::now();

    monitor.register(&name, token.clone(), policy);

    let ctx = ActorContext::new(claimant, token.clone(), Arc::clone(monitor));
    let latch = Arc::clone(&completion);
    let spawned = thread::Builder::new()
        .name(name.clone())
        .spawn(move || run_actor(&ctx, workload.as_ref(), spawned_at, &latch));

    match spawned {
        Ok(thread) => Ok(ActorHandle {
            name,
            role,
            token,
            spawned_at,
            completion,
            thread: Some(thread),
        }),
        Err(source) => {
            monitor.deregister(&name);
            Err(HazardError::Spawn { actor: name, source })
        }
    }
}

/// Spawn every actor or none: on failure the ones already started are
/// cancelled
///
/// # Errors
///
/// The first spawn failure.
pub fn spawn_all(
    monitor: &Arc<EventMonitor>,
    actors: Vec<(Claimant, WatchPolicy, Arc<dyn ActorWorkload>)>,
) -> HazardResult<Vec<ActorHandle>> {
    let mut handles = Vec::with_capacity(actors.len());
    for (claimant, policy, workload) in actors {
        match spawn_actor(monitor, claimant, policy, workload) {
            Ok(handle) => handles.push(handle),
            Err(err) => {
                for handle in &handles {
                    handle.cancel();
                }
                return Err(err);
            }
        }
    }
    Ok(handles)
}

fn run_actor(ctx: &ActorContext, workload: &dyn ActorWorkload, spawned_at: Instant, latch: &Completion) {
    let mut stats = WorkStats::default();
    let result = panic::catch_unwind(AssertUnwindSafe(|| workload.perform(ctx, &mut stats)));

    let exit = match result {
        Ok(Ok(())) => ActorExit::Completed,
        Ok(Err(HazardError::Lock(LockError::Cancelled))) => {
            ctx.log(EventKind::Interrupt, "cancelled, all locks released");
            ActorExit::Cancelled
        }
        Ok(Err(err)) => {
            ctx.log(EventKind::Error, err.to_string());
            ActorExit::Failed
        }
        Err(_) => {
            ctx.log(EventKind::Error, "workload panicked");
            ActorExit::Panicked
        }
    };
    ctx.monitor().deregister(ctx.name());

    latch.finish(ActorSummary {
        name: ctx.name().to_owned(),
        role: workload.role(),
        exit,
        stats,
        elapsed_ms: millis(spawned_at.elapsed()),
    });
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
