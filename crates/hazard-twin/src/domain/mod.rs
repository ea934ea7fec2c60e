//! Domain Layer
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Domain Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  Sync Module                   Resources Module             │
//! │  ├─ Semaphore (Fair|Unfair)    ├─ Account                   │
//! │  ├─ TicketLock                 ├─ Wallet                    │
//! │  ├─ IntrinsicLock              ├─ ServiceDesk               │
//! │  ├─ OrderedAcquisition         └─ WaitForGraph              │
//! │  └─ CancellationToken                                       │
//! │                                                             │
//! │  Scenario Module               Monitor Module               │
//! │  ├─ RaceDeposit                ├─ EventMonitor              │
//! │  ├─ Transfer                   ├─ EventRecord / EventKind   │
//! │  └─ CreditRequest              └─ MonitorState / Report     │
//! │                                                             │
//! │  Config, Error                                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is plain synchronous Rust over `parking_lot`; threads are
//! only started by the adapters layer.

pub mod config;
pub mod error;
pub mod monitor;
pub mod resources;
pub mod scenario;
pub mod sync;

pub use config::{
    DeadlockConfig, HarnessConfig, MonitorConfig, RaceConfig, StarvationConfig, StressConfig,
};
pub use error::{HazardError, HazardResult, SinkError};
pub use monitor::{
    Action, EventKind, EventMonitor, EventRecord, EventSink, MonitorReport, Severity, WatchPolicy,
};
pub use resources::{Account, DeskLock, ServiceDesk, WaitEdge, WaitForGraph, Wallet};
pub use scenario::{
    ActorContext, ActorRole, ActorWorkload, CreditRequest, DeadlockPolicy, LatencyWindow,
    RaceDeposit, RacePolicy, Scenario, Technique, Transfer, TransferTiming, WorkStats,
};
pub use sync::{
    CancellationToken, Claimant, Fairness, IntrinsicLock, LockError, LockGuard, LockPrimitive,
    OrderedAcquisition, Priority, Semaphore, Ticket, TicketLock,
};
