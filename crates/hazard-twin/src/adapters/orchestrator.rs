//! Scenario Orchestrator
//!
//! Builds the resources for a scenario, spawns its actors, bounds every wait
//! on them, and turns what happened into an outcome.
//!
//! ```text
//! run(scenario, secure, technique)
//!   SYSTEM_START
//!   ├─ race        N depositors ─► join ─► expected vs actual balance
//!   ├─ deadlock    2 agents ─► join(timeout) ─► DEADLOCK_DETECTED, cancel, grace
//!   └─ starvation  VIPs, then low-priority ─► join(SLA) ─► ALERT_STARVATION, cancel, grace
//!   RESULT
//! ```

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::actor::{millis, spawn_all, ActorExit, ActorHandle, ActorSummary};
use crate::domain::config::{HarnessConfig, RaceConfig};
use crate::domain::error::HazardResult;
use crate::domain::monitor::{EventKind, EventMonitor, WatchPolicy};
use crate::domain::resources::{Account, WaitEdge, WaitForGraph, Wallet};
use crate::domain::scenario::{
    open_desk, ActorRole, ActorWorkload, CreditRequest, DeadlockPolicy, LatencyWindow,
    RaceDeposit, RacePolicy, Scenario, Technique, Transfer, TransferTiming,
};
use crate::domain::sync::{Claimant, LockPrimitive, Priority};

/// Identity the orchestrator logs under
pub const ORCHESTRATOR: &str = "orchestrator";
/// Shared account of the deposit runs
pub const JOINT_ACCOUNT: &str = "joint-account";
/// First wallet of the deadlock run
pub const WALLET_A: &str = "client-a";
/// Second wallet of the deadlock run
pub const WALLET_B: &str = "client-b";
/// Desk of the starvation run
pub const CREDIT_DESK: &str = "credit-desk";
/// Low-priority actor of the starvation run
pub const LOW_PRIORITY_CLIENT: &str = "client-normal";

/// Extra wait granted to deposit-run stragglers after cancellation
const DEPOSIT_GRACE: Duration = Duration::from_millis(500);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outcomes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Result of a race-condition run
#[derive(Debug, Clone, Serialize)]
pub struct RaceOutcome {
    /// Mitigation, `None` for the unsafe run
    pub technique: Option<Technique>,
    /// Balance a correct run ends with
    pub expected: i64,
    /// Balance the run ended with
    pub actual: i64,
    /// Wall time
    pub elapsed_ms: u64,
    /// Per-actor results
    pub actors: Vec<ActorSummary>,
}

impl RaceOutcome {
    /// Amount lost to overwritten updates
    pub fn lost(&self) -> i64 {
        self.expected - self.actual
    }

    /// Whether no update was lost and every depositor completed
    pub fn is_consistent(&self) -> bool {
        self.actual == self.expected
            && self.actors.iter().all(|a| a.exit == ActorExit::Completed)
    }
}

/// Result of a deadlock run
#[derive(Debug, Clone, Serialize)]
pub struct DeadlockOutcome {
    /// Mitigation, `None` for the unsafe run
    pub technique: Option<Technique>,
    /// Both transfers finished inside the timeout
    pub completed: bool,
    /// The orchestrator declared a deadlock
    pub deadlock_detected: bool,
    /// Wait-for cycle observed at the timeout, empty if none
    pub cycle: Vec<WaitEdge>,
    /// Wall time
    pub elapsed_ms: u64,
    /// Per-actor results
    pub actors: Vec<ActorSummary>,
}

/// Result of a starvation run
#[derive(Debug, Clone, Serialize)]
pub struct StarvationOutcome {
    /// Mitigation, `None` for the unsafe run
    pub technique: Option<Technique>,
    /// Low-priority actor completed its visits inside the SLA
    pub sla_met: bool,
    /// How the low-priority actor ended
    pub low_priority_exit: ActorExit,
    /// Its longest single wait
    pub low_priority_longest_wait_ms: u64,
    /// Visits served in total
    pub served: u64,
    /// Wall time
    pub elapsed_ms: u64,
    /// Per-actor results
    pub actors: Vec<ActorSummary>,
}

/// Result of any scenario run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "scenario", rename_all = "kebab-case")]
pub enum ScenarioOutcome {
    /// Race-condition run
    RaceCondition(RaceOutcome),
    /// Deadlock run
    Deadlock(DeadlockOutcome),
    /// Starvation run
    Starvation(StarvationOutcome),
}

/// Result of a stress run
#[derive(Debug, Clone, Serialize)]
pub struct StressOutcome {
    /// Mitigation, `None` for the unsafe run
    pub technique: Option<Technique>,
    /// Depositors
    pub actors: usize,
    /// Balance a correct run ends with
    pub expected: i64,
    /// Balance the run ended with
    pub actual: i64,
    /// `expected - actual`
    pub lost: i64,
    /// Wall time
    pub elapsed_ms: u64,
    /// Completed deposits per second
    pub throughput_per_sec: f64,
}

fn mode(technique: Option<Technique>) -> String {
    technique.map_or_else(|| "unsafe".to_owned(), |t| format!("secure, {t}"))
}

impl fmt::Display for ScenarioOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RaceCondition(o) => write!(
                f,
                "race-condition ({}): expected {}, actual {}, lost {} in {} ms",
                mode(o.technique),
                o.expected,
                o.actual,
                o.lost(),
                o.elapsed_ms
            ),
            Self::Deadlock(o) => {
                write!(
                    f,
                    "deadlock ({}): completed={} detected={} in {} ms",
                    mode(o.technique),
                    o.completed,
                    o.deadlock_detected,
                    o.elapsed_ms
                )?;
                for edge in &o.cycle {
                    write!(f, "\n  {edge}")?;
                }
                Ok(())
            }
            Self::Starvation(o) => write!(
                f,
                "starvation ({}): sla_met={} low-priority {} after waiting up to {} ms, {} visits served in {} ms",
                mode(o.technique),
                o.sla_met,
                o.low_priority_exit,
                o.low_priority_longest_wait_ms,
                o.served,
                o.elapsed_ms
            ),
        }
    }
}

impl fmt::Display for StressOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stress ({}): {} actors, expected {}, actual {}, lost {}, {} ms, {:.1} ops/s",
            mode(self.technique),
            self.actors,
            self.expected,
            self.actual,
            self.lost,
            self.elapsed_ms,
            self.throughput_per_sec
        )
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

type ActorSpec = (Claimant, WatchPolicy, Arc<dyn ActorWorkload>);

/// Runs scenarios against a shared monitor
#[derive(Debug, Clone)]
pub struct Orchestrator {
    monitor: Arc<EventMonitor>,
    config: HarnessConfig,
}

impl Orchestrator {
    /// Create an orchestrator
    pub fn new(monitor: Arc<EventMonitor>, config: HarnessConfig) -> Self {
        Self { monitor, config }
    }

    /// The shared monitor
    pub fn monitor(&self) -> &Arc<EventMonitor> {
        &self.monitor
    }

    /// Current configuration
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run one scenario
    ///
    /// `technique` is ignored when `secure` is false and defaults to
    /// [`Technique::FairSemaphore`] when `secure` is true.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a bad scenario configuration, `Spawn` if an actor
    /// thread cannot be started.
    pub fn run(
        &self,
        scenario: Scenario,
        secure: bool,
        technique: Option<Technique>,
    ) -> HazardResult<ScenarioOutcome> {
        let technique = Technique::resolve(secure, technique);
        self.monitor.log(
            ORCHESTRATOR,
            EventKind::SystemStart,
            format!("{scenario} ({})", mode(technique)),
        );

        let outcome = match scenario {
            Scenario::RaceCondition => ScenarioOutcome::RaceCondition(self.run_race(technique)?),
            Scenario::Deadlock => ScenarioOutcome::Deadlock(self.run_deadlock(technique)?),
            Scenario::Starvation => ScenarioOutcome::Starvation(self.run_starvation(technique)?),
        };

        self.monitor
            .log(ORCHESTRATOR, EventKind::Result, outcome.to_string());
        Ok(outcome)
    }

    /// Deposit workload with many actors and a muted console
    ///
    /// `actors` overrides the configured actor count.
    ///
    /// # Errors
    ///
    /// As for [`run`](Self::run).
    pub fn run_stress(
        &self,
        actors: Option<usize>,
        secure: bool,
        technique: Option<Technique>,
    ) -> HazardResult<StressOutcome> {
        let mut config = self.config.stress.clone();
        if let Some(actors) = actors {
            config.actors = actors;
        }
        config.validate()?;
        let technique = Technique::resolve(secure, technique);

        self.monitor.log(
            ORCHESTRATOR,
            EventKind::SystemStart,
            format!("stress, {} actors ({})", config.actors, mode(technique)),
        );
        let was_silent = self.monitor.is_silent();
        self.monitor.set_silent(true);
        let run = self.deposit_run(&config.as_race(), technique);
        self.monitor.set_silent(was_silent);
        let run = run?;

        let completed = run
            .actors
            .iter()
            .filter(|a| a.exit == ActorExit::Completed)
            .count();
        let seconds = (run.elapsed_ms.max(1) as f64) / 1000.0;
        let outcome = StressOutcome {
            technique,
            actors: config.actors,
            expected: run.expected,
            actual: run.actual,
            lost: run.lost(),
            elapsed_ms: run.elapsed_ms,
            throughput_per_sec: completed as f64 / seconds,
        };
        self.monitor
            .log(ORCHESTRATOR, EventKind::Result, outcome.to_string());
        Ok(outcome)
    }

    fn run_race(&self, technique: Option<Technique>) -> HazardResult<RaceOutcome> {
        self.deposit_run(&self.config.race, technique)
    }

    fn deposit_run(&self, config: &RaceConfig, technique: Option<Technique>) -> HazardResult<RaceOutcome> {
        config.validate()?;
        let account = Arc::new(Account::new(JOINT_ACCOUNT, 0)?);
        let window = LatencyWindow::new(
            Duration::from_millis(config.min_latency_ms),
            Duration::from_millis(config.max_latency_ms),
        )?;
        let policy = RacePolicy::for_run(technique);

        let specs: Vec<ActorSpec> = (1..=config.actors)
            .map(|i| {
                let deposit = RaceDeposit::new(Arc::clone(&account), config.amount, window, policy);
                (
                    Claimant::new(format!("depositor-{i}"), Priority::Normal),
                    WatchPolicy::AuditOnly,
                    Arc::new(deposit) as Arc<dyn ActorWorkload>,
                )
            })
            .collect();

        let started = Instant::now();
        let handles = spawn_all(&self.monitor, specs)?;
        let deadline = started + Duration::from_millis(config.join_timeout_ms);
        let actors = settle(handles, deadline, DEPOSIT_GRACE);

        Ok(RaceOutcome {
            technique,
            expected: config.expected_balance(),
            actual: account.read_balance(),
            elapsed_ms: millis(started.elapsed()),
            actors,
        })
    }

    fn run_deadlock(&self, technique: Option<Technique>) -> HazardResult<DeadlockOutcome> {
        let config = &self.config.deadlock;
        config.validate()?;

        let a = Arc::new(Wallet::new(WALLET_A)?);
        let b = Arc::new(Wallet::new(WALLET_B)?);
        let policy = DeadlockPolicy::for_run(technique);
        let timing = TransferTiming {
            overlap: Duration::from_millis(config.overlap_ms),
            gap: Duration::from_millis(config.gap_ms),
            work: Duration::from_millis(config.work_ms),
        };
        let forward = Transfer::new(Arc::clone(&a), Arc::clone(&b), policy, timing)?;
        let backward = Transfer::new(Arc::clone(&b), Arc::clone(&a), policy, timing)?;

        let specs: Vec<ActorSpec> = vec![
            (
                Claimant::new("agent-1", Priority::Normal),
                WatchPolicy::AuditOnly,
                Arc::new(forward) as Arc<dyn ActorWorkload>,
            ),
            (
                Claimant::new("agent-2", Priority::Normal),
                WatchPolicy::AuditOnly,
                Arc::new(backward) as Arc<dyn ActorWorkload>,
            ),
        ];

        let started = Instant::now();
        let handles = spawn_all(&self.monitor, specs)?;
        let deadline = started + Duration::from_millis(config.join_timeout_ms);
        let completed = join_all(&handles, deadline);

        let mut cycle = Vec::new();
        if !completed {
            let locks: [&dyn LockPrimitive; 2] = [a.semaphore(), b.semaphore()];
            cycle = WaitForGraph::from_locks(&locks)
                .find_cycle()
                .unwrap_or_default();
            let detail = if cycle.is_empty() {
                "actors unresponsive".to_owned()
            } else {
                cycle
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            self.monitor.log(
                ORCHESTRATOR,
                EventKind::DeadlockDetected,
                format!(
                    "deadlock confirmed after {} ms: {detail}",
                    config.join_timeout_ms
                ),
            );
            cancel_and_wait(&handles, Duration::from_millis(config.grace_ms));
        }

        Ok(DeadlockOutcome {
            technique,
            completed,
            deadlock_detected: !completed,
            cycle,
            elapsed_ms: millis(started.elapsed()),
            actors: handles.into_iter().map(ActorHandle::into_summary).collect(),
        })
    }

    fn run_starvation(&self, technique: Option<Technique>) -> HazardResult<StarvationOutcome> {
        let config = &self.config.starvation;
        config.validate()?;

        let desk = Arc::new(open_desk(CREDIT_DESK, technique)?);
        let service = Duration::from_millis(config.service_ms);

        let vip_specs: Vec<ActorSpec> = (1..=config.high_priority_actors)
            .map(|i| {
                let request = CreditRequest::new(
                    Arc::clone(&desk),
                    ActorRole::HighPriority,
                    config.high_priority_visits,
                    service,
                );
                (
                    Claimant::new(format!("client-vip-{i}"), Priority::High),
                    WatchPolicy::Enforce,
                    Arc::new(request) as Arc<dyn ActorWorkload>,
                )
            })
            .collect();
        let low_spec: ActorSpec = (
            Claimant::new(LOW_PRIORITY_CLIENT, Priority::Low),
            WatchPolicy::Enforce,
            Arc::new(CreditRequest::new(
                Arc::clone(&desk),
                ActorRole::LowPriority,
                config.low_priority_visits,
                service,
            )) as Arc<dyn ActorWorkload>,
        );

        let started = Instant::now();
        let mut handles = spawn_all(&self.monitor, vip_specs)?;
        if !handles.is_empty() {
            await_contention(desk.lock(), service);
        }
        let mut low = spawn_all(&self.monitor, vec![low_spec])?;
        let low_index = handles.len();
        handles.append(&mut low);

        let sla = Duration::from_millis(config.sla_ms);
        let sla_deadline = started + sla;
        let low_in_time = handles[low_index].join_until(sla_deadline);
        if !low_in_time {
            self.monitor.log(
                LOW_PRIORITY_CLIENT,
                EventKind::AlertStarvation,
                format!("not served within the {} ms SLA", config.sla_ms),
            );
        }
        let others_done = join_all(&handles, sla_deadline);
        if !low_in_time || !others_done {
            cancel_and_wait(&handles, Duration::from_millis(config.grace_ms));
        }

        let actors: Vec<ActorSummary> = handles.into_iter().map(ActorHandle::into_summary).collect();
        let low = &actors[low_index];
        Ok(StarvationOutcome {
            technique,
            sla_met: low_in_time && low.exit == ActorExit::Completed,
            low_priority_exit: low.exit,
            low_priority_longest_wait_ms: millis(low.stats.longest_wait),
            served: desk.served(),
            elapsed_ms: millis(started.elapsed()),
            actors,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Bounded waits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn join_all(handles: &[ActorHandle], deadline: Instant) -> bool {
    handles
        .iter()
        .fold(true, |all, handle| handle.join_until(deadline) && all)
}

fn cancel_and_wait(handles: &[ActorHandle], grace: Duration) {
    for handle in handles {
        handle.cancel();
    }
    let deadline = Instant::now() + grace;
    if !join_all(handles, deadline) {
        tracing::warn!(grace_ms = millis(grace), "actors still running after grace period");
    }
}

fn settle(handles: Vec<ActorHandle>, deadline: Instant, grace: Duration) -> Vec<ActorSummary> {
    if !join_all(&handles, deadline) {
        cancel_and_wait(&handles, grace);
    }
    handles.into_iter().map(ActorHandle::into_summary).collect()
}

/// Give the first arrivals a head start: wait until someone holds `lock`,
/// at most `limit`
fn await_contention(lock: &dyn LockPrimitive, limit: Duration) {
    let deadline = Instant::now() + limit;
    while lock.holders().is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
}
