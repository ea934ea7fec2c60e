//! Adapters Layer - Ports & Adapters Pattern
//!
//! Connects the domain to the operating system.
//!
//! # Hexagonal Architecture
//! - Inbound: [`Orchestrator`] (driver → scenarios)
//! - Outbound: [`actor`] (workloads → OS threads)

pub mod actor;
pub mod orchestrator;

pub use actor::{spawn_actor, spawn_all, ActorExit, ActorHandle, ActorSummary};
pub use orchestrator::{
    DeadlockOutcome, Orchestrator, RaceOutcome, ScenarioOutcome, StarvationOutcome,
    StressOutcome, CREDIT_DESK, JOINT_ACCOUNT, LOW_PRIORITY_CLIENT, ORCHESTRATOR, WALLET_A,
    WALLET_B,
};
