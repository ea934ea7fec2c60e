//! Integration tests for the race-condition scenario
//!
//! Safe techniques must never lose a deposit; the unguarded run must lose
//! at least one across a handful of trials.

use std::sync::Arc;
use std::time::Duration;

use hazard_twin::{
    EventKind, EventMonitor, HarnessConfig, HazardError, MonitorConfig, Orchestrator, RaceConfig,
    ScenarioOutcome, Scenario, Technique,
};

fn orchestrator(race: RaceConfig) -> Orchestrator {
    let monitor = Arc::new(EventMonitor::new(MonitorConfig::default().echo(false)).unwrap());
    let config = HarnessConfig {
        race,
        ..HarnessConfig::default()
    };
    Orchestrator::new(monitor, config)
}

fn race_outcome(outcome: ScenarioOutcome) -> hazard_twin::RaceOutcome {
    match outcome {
        ScenarioOutcome::RaceCondition(race) => race,
        other => panic!("unexpected outcome: {other}"),
    }
}

#[test]
fn test_safe_race_five_actors_both_techniques() {
    for technique in [Technique::FairSemaphore, Technique::TicketOrIntrinsicMonitor] {
        let orch = orchestrator(
            RaceConfig::default().latency(Duration::from_millis(1), Duration::from_millis(5)),
        );
        let outcome = race_outcome(
            orch.run(Scenario::RaceCondition, true, Some(technique))
                .unwrap(),
        );

        assert_eq!(outcome.expected, 50);
        assert_eq!(outcome.actual, 50, "{technique} lost an update");
        assert!(outcome.is_consistent());
        println!("✓ {technique}: balance {}", outcome.actual);
    }
}

#[test]
fn test_safe_race_many_actors_both_techniques() {
    for technique in [Technique::FairSemaphore, Technique::TicketOrIntrinsicMonitor] {
        let orch = orchestrator(
            RaceConfig::default()
                .actors(120)
                .amount(1)
                .latency(Duration::ZERO, Duration::from_millis(1)),
        );
        let outcome = race_outcome(
            orch.run(Scenario::RaceCondition, true, Some(technique))
                .unwrap(),
        );
        assert_eq!(outcome.actual, 120, "{technique} lost an update");
        assert_eq!(outcome.actors.len(), 120);
    }
}

#[test]
fn test_secure_without_technique_uses_fair_semaphore() {
    let orch = orchestrator(
        RaceConfig::default().latency(Duration::from_millis(1), Duration::from_millis(2)),
    );
    let outcome = race_outcome(orch.run(Scenario::RaceCondition, true, None).unwrap());
    assert_eq!(outcome.technique, Some(Technique::FairSemaphore));
    assert!(outcome.is_consistent());
}

#[test]
fn test_unsafe_race_loses_updates() {
    let mut lost_once = false;
    for trial in 1..=5 {
        let orch = orchestrator(RaceConfig::default());
        let outcome = race_outcome(orch.run(Scenario::RaceCondition, false, None).unwrap());
        assert!(outcome.actual <= outcome.expected);
        if outcome.actual < 50 {
            println!("✓ trial {trial}: lost {} (balance {})", outcome.lost(), outcome.actual);
            lost_once = true;
            break;
        }
    }
    assert!(lost_once, "unguarded deposits never lost an update");
}

#[test]
fn test_unsafe_ignores_technique_and_takes_no_locks() {
    let orch = orchestrator(
        RaceConfig::default().latency(Duration::from_millis(1), Duration::from_millis(2)),
    );
    let outcome = race_outcome(
        orch.run(Scenario::RaceCondition, false, Some(Technique::FairSemaphore))
            .unwrap(),
    );
    assert_eq!(outcome.technique, None);

    let monitor = orch.monitor();
    assert_eq!(monitor.count(EventKind::Wait), 0);
    assert_eq!(monitor.count(EventKind::LockAcquired), 0);
    assert_eq!(monitor.count(EventKind::Init), 5);
    assert_eq!(monitor.count(EventKind::Work), 5);
}

#[test]
fn test_safe_event_stream_per_actor() {
    let orch = orchestrator(
        RaceConfig::default().latency(Duration::from_millis(1), Duration::from_millis(2)),
    );
    orch.run(Scenario::RaceCondition, true, Some(Technique::FairSemaphore))
        .unwrap();

    let kinds: Vec<EventKind> = orch
        .monitor()
        .events()
        .into_iter()
        .filter(|record| record.actor == "depositor-1")
        .map(|record| record.event)
        .collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Init,
            EventKind::Wait,
            EventKind::LockAcquired,
            EventKind::Work,
            EventKind::Result,
            EventKind::LockRelease,
        ]
    );

    let report = orch.monitor().report();
    // LOCK_ACQUIRED + WORK
    assert_eq!(report.access_counts.get("depositor-1"), Some(&2));
    assert!(orch.monitor().report().is_empty());
}

#[test]
fn test_stress_run_is_consistent_when_secure() {
    let monitor = Arc::new(EventMonitor::new(MonitorConfig::default().echo(false)).unwrap());
    let mut config = HarnessConfig::default();
    config.stress = config
        .stress
        .latency(Duration::ZERO, Duration::from_millis(1));
    let orch = Orchestrator::new(Arc::clone(&monitor), config);

    let outcome = orch.run_stress(Some(150), true, None).unwrap();
    assert_eq!(outcome.actors, 150);
    assert_eq!(outcome.expected, 150);
    assert_eq!(outcome.actual, 150);
    assert_eq!(outcome.lost, 0);
    assert!(outcome.throughput_per_sec > 0.0);
    assert!(!monitor.is_silent(), "silent mode must be restored");
}

/// # Scenario
/// Two depositors of `i64::MAX` each, whose total cannot be represented.
///
/// # Expected
/// The run is refused up front with `InvalidConfig`; no actor starts.
#[test]
fn test_overflowing_deposit_total_is_refused() {
    let orch = orchestrator(RaceConfig::default().actors(2).amount(i64::MAX));
    for secure in [false, true] {
        let err = orch.run(Scenario::RaceCondition, secure, None).unwrap_err();
        assert!(matches!(err, HazardError::InvalidConfig(_)), "got {err}");
    }
    assert_eq!(orch.monitor().count(EventKind::Init), 0);
    println!("✓ overflowing total refused before any deposit");
}
