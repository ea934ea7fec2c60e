//! Infrastructure Layer - External Technology Stack
//!
//! Concrete implementations of the ports the domain declares.
//!
//! # Responsibilities
//! - JSON-lines event journal (serde_json over buffered files)
//! - Per-actor alert files

pub mod sink;

pub use sink::{sanitize_actor, AlertFiles, JsonLinesSink, MemorySink};
