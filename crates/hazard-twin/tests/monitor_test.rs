//! Integration tests for the event monitor
//!
//! Classification, derived starvation alerts, IPS cancellation, reports and
//! the JSON-lines sinks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use hazard_twin::infrastructure::MemorySink;
use hazard_twin::{
    Action, CancellationToken, Claimant, EventKind, EventMonitor, EventRecord, EventSink,
    Fairness, LockError, LockPrimitive, MonitorConfig, Priority, Semaphore, Severity, SinkError,
    WatchPolicy,
};

fn quiet() -> MonitorConfig {
    MonitorConfig::default().echo(false)
}

#[test]
fn test_every_record_is_classified() {
    let monitor = EventMonitor::new(quiet()).unwrap();
    for kind in EventKind::ALL {
        monitor.log("observer", kind, kind.as_str());
    }

    let events = monitor.events();
    assert_eq!(events.len(), EventKind::ALL.len());
    for record in &events {
        let (severity, action) = record.event.classify();
        assert_eq!(record.severity, severity);
        assert_eq!(record.action, action);
    }
    let blocks = events.iter().filter(|r| r.action == Action::Block).count();
    assert_eq!(blocks, 3);
    let seqs: Vec<u64> = events.iter().map(|r| r.seq).collect();
    assert!(seqs.windows(2).all(|w| w[0] < w[1]));
}

/// # Scenario
/// An enforced actor waits longer than the anomaly threshold.
///
/// # Expected
/// The acquisition is followed by ALERT_STARVATION and IPS_BLOCK, and the
/// actor's token is cancelled.
#[test]
fn test_long_wait_raises_alert_and_cancels() {
    let monitor = EventMonitor::new(quiet().threshold(Duration::from_millis(50))).unwrap();
    let token = CancellationToken::new();
    monitor.register("slow", token.clone(), WatchPolicy::Enforce);

    monitor.log("slow", EventKind::Wait, "waiting for desk");
    thread::sleep(Duration::from_millis(80));
    monitor.log("slow", EventKind::LockAcquired, "holding desk");

    let kinds: Vec<EventKind> = monitor.events().into_iter().map(|r| r.event).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Wait,
            EventKind::LockAcquired,
            EventKind::AlertStarvation,
            EventKind::IpsBlock,
        ]
    );
    assert!(token.is_cancelled());
    assert!(monitor.longest_wait("slow").unwrap() >= Duration::from_millis(80));
    println!("✓ long wait flagged and actor cancelled");
}

#[test]
fn test_audit_only_actor_is_measured_not_alerted() {
    let monitor = EventMonitor::new(quiet().threshold(Duration::from_millis(20))).unwrap();
    let token = CancellationToken::new();
    monitor.register("depositor", token.clone(), WatchPolicy::AuditOnly);

    monitor.log("depositor", EventKind::Wait, "waiting");
    thread::sleep(Duration::from_millis(40));
    monitor.log("depositor", EventKind::LockAcquired, "holding");

    assert_eq!(monitor.count(EventKind::AlertStarvation), 0);
    assert!(!token.is_cancelled());
    assert!(monitor.longest_wait("depositor").unwrap() >= Duration::from_millis(40));
}

#[test]
fn test_short_wait_is_not_an_anomaly() {
    let monitor = EventMonitor::new(quiet()).unwrap();
    let token = CancellationToken::new();
    monitor.register("quick", token.clone(), WatchPolicy::Enforce);

    monitor.log("quick", EventKind::Wait, "waiting");
    monitor.log("quick", EventKind::LockAcquired, "holding");

    assert_eq!(monitor.count(EventKind::AlertStarvation), 0);
    assert!(!token.is_cancelled());
}

/// # Scenario
/// An actor is blocked on a semaphore someone else holds; an alert is
/// logged against it.
///
/// # Expected
/// IPS_BLOCK is emitted once and the blocked acquire returns `Cancelled`.
#[test]
fn test_alert_cancels_blocked_actor() {
    let monitor = Arc::new(EventMonitor::new(quiet()).unwrap());
    let desk = Arc::new(Semaphore::binary("desk", Fairness::Fair).unwrap());
    let holder = Claimant::new("holder", Priority::Normal);
    assert!(desk.try_acquire(&holder));

    let token = CancellationToken::new();
    monitor.register("blocked", token.clone(), WatchPolicy::Enforce);

    let waiter = {
        let desk = Arc::clone(&desk);
        thread::spawn(move || {
            let me = Claimant::new("blocked", Priority::Low);
            desk.acquire(&me, &token)
        })
    };
    while desk.queue_len() == 0 {
        thread::sleep(Duration::from_millis(1));
    }

    monitor.log("blocked", EventKind::AlertStarvation, "starved");
    monitor.log("blocked", EventKind::AlertStarvation, "still starved");

    assert!(matches!(waiter.join().unwrap(), Err(LockError::Cancelled)));
    assert_eq!(monitor.count(EventKind::IpsBlock), 1);
    assert_eq!(desk.queue_len(), 0);
    desk.release(&holder).unwrap();
    assert_eq!(desk.available_permits(), 1);
}

#[test]
fn test_block_on_unregistered_actor_cancels_nothing() {
    let monitor = EventMonitor::new(quiet()).unwrap();
    monitor.log("orchestrator", EventKind::DeadlockDetected, "cycle");
    assert_eq!(monitor.count(EventKind::IpsBlock), 0);

    let token = CancellationToken::new();
    monitor.register("gone", token.clone(), WatchPolicy::Enforce);
    monitor.deregister("gone");
    monitor.log("gone", EventKind::AlertStarvation, "late alert");
    assert!(!token.is_cancelled());
}

#[test]
fn test_report_drains_counts() {
    let monitor = EventMonitor::new(quiet()).unwrap();
    monitor.log("a", EventKind::Wait, "w");
    monitor.log("a", EventKind::LockAcquired, "l");
    monitor.log("a", EventKind::Work, "w");
    monitor.log("a", EventKind::Success, "s");
    monitor.log("a", EventKind::Result, "r");
    monitor.log("b", EventKind::Work, "w");
    monitor.log("b", EventKind::DeadlockDetected, "critical kinds are not counted");

    let report = monitor.report();
    assert_eq!(report.access_counts.get("a"), Some(&3));
    assert_eq!(report.access_counts.get("b"), Some(&1));
    assert_eq!(report.total_accesses(), 4);
    assert!(report.longest_wait_ms.contains_key("a"));
    assert!(report.to_string().contains('a'));

    assert!(monitor.report().is_empty());
    // History survives a report.
    assert_eq!(monitor.events().len(), 7);
}

#[test]
fn test_history_is_bounded() {
    let mut config = quiet();
    config.history_capacity = 4;
    let monitor = EventMonitor::new(config).unwrap();
    for i in 0..10 {
        monitor.log("a", EventKind::Work, format!("step {i}"));
    }
    let events = monitor.events();
    assert_eq!(events.len(), 4);
    assert_eq!(events[0].message, "step 6");
    assert_eq!(events[3].seq, 10);
}

#[test]
fn test_silent_mode_still_records() {
    let monitor = EventMonitor::new(MonitorConfig::default()).unwrap();
    monitor.set_silent(true);
    assert!(monitor.is_silent());
    monitor.log("a", EventKind::Work, "quiet");
    assert_eq!(monitor.count(EventKind::Work), 1);
    monitor.set_silent(false);
    assert!(!monitor.is_silent());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sinks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct FailingSink {
    attempts: Arc<AtomicUsize>,
}

impl EventSink for FailingSink {
    fn append(&mut self, _record: &EventRecord) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Io {
            path: "broken".to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        })
    }

    fn describe(&self) -> String {
        "broken".to_owned()
    }
}

#[test]
fn test_failing_sink_is_dropped_and_monitor_continues() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let journal = FailingSink {
        attempts: Arc::clone(&attempts),
    };
    let alerts = MemorySink::new();
    let monitor =
        EventMonitor::with_sinks(quiet(), Some(Box::new(journal)), Some(Box::new(alerts.clone())))
            .unwrap();

    monitor.log("a", EventKind::Work, "one");
    monitor.log("a", EventKind::Work, "two");
    monitor.log("a", EventKind::AlertStarvation, "alert");
    monitor.shutdown();

    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(monitor.events().len(), 3);
    let alerts = alerts.records();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::Critical);
}

#[test]
fn test_journal_and_alert_files() {
    let dir = tempfile::tempdir().unwrap();
    let journal = dir.path().join("logs").join("events.jsonl");
    let alert_dir = dir.path().join("alerts");
    let monitor = EventMonitor::new(quiet().journal(&journal).alerts(&alert_dir)).unwrap();

    monitor.log("client vip/1", EventKind::Wait, "waiting");
    monitor.log("client vip/1", EventKind::AlertStarvation, "starved");
    monitor.log("agent-2", EventKind::Work, "working");
    monitor.shutdown();

    let text = std::fs::read_to_string(&journal).unwrap();
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["event"], "WAIT");
    assert_eq!(lines[0]["severity"], "INFO");
    assert_eq!(lines[0]["action"], "ALLOW");
    assert_eq!(lines[1]["event"], "ALERT_STARVATION");
    assert_eq!(lines[1]["action"], "BLOCK");
    assert_eq!(lines[2]["actor"], "agent-2");

    let alert_file = alert_dir.join("client_vip_1.jsonl");
    let alert_text = std::fs::read_to_string(alert_file).unwrap();
    assert_eq!(alert_text.lines().count(), 1);
    assert!(!alert_dir.join("agent_2.jsonl").exists());
    println!("✓ journal and alert files written");
}

#[test]
fn test_unopenable_journal_degrades_to_console() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file").unwrap();

    let monitor = EventMonitor::new(quiet().journal(blocker.join("events.jsonl"))).unwrap();
    monitor.log("a", EventKind::Work, "still recorded");
    assert_eq!(monitor.count(EventKind::Work), 1);
}
