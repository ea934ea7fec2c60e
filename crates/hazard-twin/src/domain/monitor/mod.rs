//! # Event Monitor
//!
//! Central instrumentation point. Every actor and the orchestrator report
//! through [`EventMonitor::log`]; each call runs as one critical section:
//!
//! ```text
//! log(actor, kind, msg)
//!   ├─ classify            kind -> (severity, action)
//!   ├─ emit                seq + timestamp, history, journal, alert file, console
//!   ├─ action == BLOCK  →  enforce(actor)                      (no bookkeeping)
//!   └─ otherwise        →  bookkeeping
//!                            ├─ access count on WORK / LOCK_ACQUIRED / SUCCESS
//!                            ├─ WAIT opens a timer, LOCK_ACQUIRED closes it
//!                            └─ closed wait > threshold → ALERT_STARVATION → enforce
//! ```
//!
//! Enforcement cancels the actor's [`CancellationToken`] and records an
//! `IPS_BLOCK`. Only actors registered with the monitor can be cancelled; a
//! BLOCK against any other identity is recorded and goes no further.

pub mod event;
pub mod report;
pub mod state;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

pub use event::{Action, EventKind, EventRecord, Severity};
pub use report::MonitorReport;
pub use state::MonitorState;

use crate::domain::config::MonitorConfig;
use crate::domain::error::{HazardResult, SinkError};
use crate::domain::sync::CancellationToken;
use crate::infrastructure::sink::{AlertFiles, JsonLinesSink};

/// Wall-clock format of [`EventRecord::timestamp`]
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sink Port
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Destination for event records
///
/// Implemented in `infrastructure::sink`. A sink that fails once is dropped by
/// the monitor; it is never retried.
pub trait EventSink: Send {
    /// Append one record
    ///
    /// # Errors
    ///
    /// Any I/O or encoding failure.
    fn append(&mut self, record: &EventRecord) -> Result<(), SinkError>;

    /// Flush buffered output
    ///
    /// # Errors
    ///
    /// Any I/O failure.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Short description for diagnostics
    fn describe(&self) -> String;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How the monitor treats an actor's wait latency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WatchPolicy {
    /// Long waits raise `ALERT_STARVATION` and get the actor cancelled
    #[default]
    Enforce,
    /// Long waits are measured and reported, never alerted on
    AuditOnly,
}

#[derive(Debug)]
struct Registration {
    token: CancellationToken,
    policy: WatchPolicy,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EventMonitor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct MonitorInner {
    next_seq: u64,
    state: MonitorState,
    history: VecDeque<EventRecord>,
    journal: Option<Box<dyn EventSink>>,
    alerts: Option<Box<dyn EventSink>>,
}

/// Event sink, anomaly detector and enforcer
///
/// Shared as `Arc<EventMonitor>` between the orchestrator and every actor.
pub struct EventMonitor {
    config: MonitorConfig,
    inner: Mutex<MonitorInner>,
    registry: DashMap<String, Registration>,
    silent: AtomicBool,
}

impl EventMonitor {
    /// Create a monitor and open the file sinks named in `config`
    ///
    /// A sink that cannot be opened is skipped with a warning.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `config` fails validation.
    pub fn new(config: MonitorConfig) -> HazardResult<Self> {
        let journal = config.journal_path.as_ref().and_then(|path| {
            JsonLinesSink::open(path)
                .map(|sink| Box::new(sink) as Box<dyn EventSink>)
                .map_err(|err| tracing::warn!(%err, "journal unavailable, console only"))
                .ok()
        });
        let alerts = config.alert_dir.as_ref().and_then(|dir| {
            AlertFiles::open(dir)
                .map(|sink| Box::new(sink) as Box<dyn EventSink>)
                .map_err(|err| tracing::warn!(%err, "alert files unavailable"))
                .ok()
        });
        Self::with_sinks(config, journal, alerts)
    }

    /// Create a monitor over caller-supplied sinks
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `config` fails validation.
    pub fn with_sinks(
        config: MonitorConfig,
        journal: Option<Box<dyn EventSink>>,
        alerts: Option<Box<dyn EventSink>>,
    ) -> HazardResult<Self> {
        config.validate()?;
        let silent = AtomicBool::new(!config.console_echo);
        Ok(Self {
            inner: Mutex::new(MonitorInner {
                next_seq: 0,
                state: MonitorState::default(),
                history: VecDeque::new(),
                journal,
                alerts,
            }),
            registry: DashMap::new(),
            silent,
            config,
        })
    }

    /// Monitor settings
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Anomaly threshold
    pub fn threshold(&self) -> Duration {
        self.config.anomaly_threshold()
    }

    /// Mute or unmute the console echo; file sinks are unaffected
    pub fn set_silent(&self, silent: bool) {
        self.silent.store(silent, Ordering::Relaxed);
    }

    /// Whether the console echo is muted
    pub fn is_silent(&self) -> bool {
        self.silent.load(Ordering::Relaxed)
    }

    /// Make `actor` cancellable by enforcement
    pub fn register(&self, actor: &str, token: CancellationToken, policy: WatchPolicy) {
        self.registry
            .insert(actor.to_owned(), Registration { token, policy });
    }

    /// Forget `actor`; later BLOCKs against it cancel nothing
    pub fn deregister(&self, actor: &str) {
        self.registry.remove(actor);
    }

    /// Whether `actor` is currently registered
    pub fn is_registered(&self, actor: &str) -> bool {
        self.registry.contains_key(actor)
    }

    /// Record an event and apply the anomaly and enforcement rules
    pub fn log(&self, actor: &str, kind: EventKind, message: impl Into<String>) {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        if self.emit(&mut inner, actor, kind, message.into()) == Action::Block {
            self.enforce(&mut inner, actor, kind);
            return;
        }

        let Some(waited) = inner.state.observe(actor, kind, now) else {
            return;
        };
        if waited <= self.threshold() || self.policy_of(actor) == WatchPolicy::AuditOnly {
            return;
        }

        let message = format!(
            "waited {} ms for a lock (threshold {} ms)",
            waited.as_millis(),
            self.config.anomaly_threshold_ms
        );
        self.emit(&mut inner, actor, EventKind::AlertStarvation, message);
        self.enforce(&mut inner, actor, EventKind::AlertStarvation);
    }

    /// Drain per-actor totals and reset bookkeeping
    pub fn report(&self) -> MonitorReport {
        self.inner.lock().state.drain()
    }

    /// Longest wait closed so far for `actor` (since the last report)
    pub fn longest_wait(&self, actor: &str) -> Option<Duration> {
        self.inner.lock().state.longest_wait(actor)
    }

    /// Snapshot of the in-memory history, oldest first
    pub fn events(&self) -> Vec<EventRecord> {
        self.inner.lock().history.iter().cloned().collect()
    }

    /// Number of history records of `kind`
    pub fn count(&self, kind: EventKind) -> usize {
        self.inner
            .lock()
            .history
            .iter()
            .filter(|record| record.event == kind)
            .count()
    }

    /// Flush every sink
    pub fn shutdown(&self) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        for slot in [&mut inner.journal, &mut inner.alerts] {
            if let Some(sink) = slot.as_mut() {
                if let Err(err) = sink.flush() {
                    tracing::warn!(sink = %sink.describe(), %err, "flush failed on shutdown");
                }
            }
        }
        tracing::debug!(records = inner.next_seq, "monitor shut down");
    }

    fn policy_of(&self, actor: &str) -> WatchPolicy {
        self.registry
            .get(actor)
            .map(|registration| registration.policy)
            .unwrap_or_default()
    }

    fn enforce(&self, inner: &mut MonitorInner, actor: &str, cause: EventKind) {
        if cause == EventKind::IpsBlock {
            return;
        }
        let token = self
            .registry
            .get(actor)
            .map(|registration| registration.token.clone());
        let Some(token) = token else {
            tracing::debug!(actor, %cause, "block on unregistered identity");
            return;
        };
        if token.cancel() {
            self.emit(inner, actor, EventKind::IpsBlock, format!("actor cancelled after {cause}"));
        }
    }

    fn emit(&self, inner: &mut MonitorInner, actor: &str, kind: EventKind, message: String) -> Action {
        let (severity, action) = kind.classify();
        inner.next_seq += 1;
        let record = EventRecord {
            seq: inner.next_seq,
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            severity,
            event: kind,
            actor: actor.to_owned(),
            message,
            action,
        };

        if self.config.console_echo && !self.is_silent() {
            echo(&record);
        }
        append_or_drop(&mut inner.journal, &record);
        if record.is_alert() {
            append_or_drop(&mut inner.alerts, &record);
        }

        if inner.history.len() >= self.config.history_capacity {
            inner.history.pop_front();
        }
        inner.history.push_back(record);
        action
    }
}

impl std::fmt::Debug for EventMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventMonitor")
            .field("config", &self.config)
            .field("registered", &self.registry.len())
            .field("silent", &self.is_silent())
            .finish_non_exhaustive()
    }
}

fn append_or_drop(slot: &mut Option<Box<dyn EventSink>>, record: &EventRecord) {
    let Some(sink) = slot.as_mut() else {
        return;
    };
    if let Err(err) = sink.append(record) {
        tracing::warn!(sink = %sink.describe(), %err, "sink failed, continuing without it");
        *slot = None;
    }
}

fn echo(record: &EventRecord) {
    match record.severity {
        Severity::Info => tracing::info!(
            target: "hazard::monitor",
            seq = record.seq,
            event = %record.event,
            actor = %record.actor,
            "{}",
            record.message
        ),
        Severity::High => tracing::warn!(
            target: "hazard::monitor",
            seq = record.seq,
            event = %record.event,
            actor = %record.actor,
            "{}",
            record.message
        ),
        Severity::Critical => tracing::error!(
            target: "hazard::monitor",
            seq = record.seq,
            event = %record.event,
            actor = %record.actor,
            action = %record.action,
            "{}",
            record.message
        ),
    }
}
