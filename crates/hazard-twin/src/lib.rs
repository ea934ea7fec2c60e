//! Concurrency Hazard Twin
//!
//! # Overview
//!
//! `hazard-twin` reproduces three classical concurrency hazards, each under an
//! unsafe policy and one or more safe mitigations, while a central
//! [`EventMonitor`] records every synchronization event, flags waits that
//! run too long and cancels the actor responsible.
//!
//! | Hazard | Unsafe | Safe |
//! |--------|--------|------|
//! | Race condition | unguarded read-sleep-write | fair semaphore, intrinsic monitor |
//! | Deadlock | opposite-order acquisition | ranked semaphores, ranked nested monitors |
//! | Starvation | unfair lock + priority bias | fair semaphore, ticket lock |
//!
//! # Trinity Architecture
//!
//! - **Domain**: locks, resources, workloads, monitor, config, errors
//! - **Infrastructure**: JSON-lines event sinks
//! - **Adapters**: actor threads and the [`Orchestrator`]
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hazard_twin::{EventMonitor, HarnessConfig, Orchestrator, Scenario, Technique};
//!
//! let config = HarnessConfig::default();
//! let monitor = Arc::new(EventMonitor::new(config.monitor.clone())?);
//! let orchestrator = Orchestrator::new(Arc::clone(&monitor), config);
//!
//! let outcome = orchestrator.run(Scenario::RaceCondition, true, Some(Technique::FairSemaphore))?;
//! println!("{outcome}");
//! println!("{}", monitor.report());
//! monitor.shutdown();
//! # Ok::<(), hazard_twin::HazardError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

// Trinity Architecture Layers
pub mod domain;
pub mod infrastructure;
pub mod adapters;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Re-export Primary Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

// Synchronization
pub use domain::{
    CancellationToken, Claimant, Fairness, IntrinsicLock, LockError, LockGuard, LockPrimitive,
    OrderedAcquisition, Priority, Semaphore, Ticket, TicketLock,
};

// Resources
pub use domain::{Account, DeskLock, ServiceDesk, WaitEdge, WaitForGraph, Wallet};

// Monitor
pub use domain::{
    Action, EventKind, EventMonitor, EventRecord, EventSink, MonitorReport, Severity, WatchPolicy,
};

// Scenarios, configuration, errors
pub use domain::{
    ActorRole, DeadlockConfig, HarnessConfig, HazardError, HazardResult, MonitorConfig,
    RaceConfig, Scenario, SinkError, StarvationConfig, StressConfig, Technique,
};

// Runtime
pub use adapters::{
    ActorExit, ActorSummary, DeadlockOutcome, Orchestrator, RaceOutcome, ScenarioOutcome,
    StarvationOutcome, StressOutcome,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_defined() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_primary_types_exported() {
        let _priority = Priority::High;
        let _scenario = Scenario::Starvation;
        let _technique = Technique::default();
        let _config = HarnessConfig::default();
    }
}
