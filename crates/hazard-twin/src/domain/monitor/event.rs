//! Event Definitions
//!
//! Event kinds, their fixed classification, and the immutable record the
//! monitor appends for every logged event.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// A run started
    SystemStart,
    /// An actor started
    Init,
    /// An actor began waiting for a lock
    Wait,
    /// An actor obtained a lock
    LockAcquired,
    /// An actor released a lock
    LockRelease,
    /// An actor did a unit of work
    Work,
    /// An actor finished its workload
    Success,
    /// A result was produced
    Result,
    /// An actor stopped on cancellation
    Interrupt,
    /// Something failed
    Error,
    /// A wait exceeded its bound
    AlertStarvation,
    /// A circular wait was confirmed
    DeadlockDetected,
    /// The monitor cancelled an actor
    IpsBlock,
}

impl EventKind {
    /// Every kind, in declaration order
    pub const ALL: [Self; 13] = [
        Self::SystemStart,
        Self::Init,
        Self::Wait,
        Self::LockAcquired,
        Self::LockRelease,
        Self::Work,
        Self::Success,
        Self::Result,
        Self::Interrupt,
        Self::Error,
        Self::AlertStarvation,
        Self::DeadlockDetected,
        Self::IpsBlock,
    ];

    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SystemStart => "SYSTEM_START",
            Self::Init => "INIT",
            Self::Wait => "WAIT",
            Self::LockAcquired => "LOCK_ACQUIRED",
            Self::LockRelease => "LOCK_RELEASE",
            Self::Work => "WORK",
            Self::Success => "SUCCESS",
            Self::Result => "RESULT",
            Self::Interrupt => "INTERRUPT",
            Self::Error => "ERROR",
            Self::AlertStarvation => "ALERT_STARVATION",
            Self::DeadlockDetected => "DEADLOCK_DETECTED",
            Self::IpsBlock => "IPS_BLOCK",
        }
    }

    /// Fixed severity and action
    pub fn classify(self) -> (Severity, Action) {
        match self {
            Self::DeadlockDetected | Self::AlertStarvation | Self::IpsBlock => {
                (Severity::Critical, Action::Block)
            }
            Self::Error | Self::Interrupt => (Severity::High, Action::Allow),
            _ => (Severity::Info, Action::Allow),
        }
    }

    /// Counts towards the actor's access total
    #[inline]
    pub fn is_successful_work(self) -> bool {
        matches!(self, Self::Work | Self::LockAcquired | Self::Success)
    }

    /// Opens a wait timer
    #[inline]
    pub fn starts_wait(self) -> bool {
        matches!(self, Self::Wait)
    }

    /// Closes a pending wait timer
    #[inline]
    pub fn is_acquisition(self) -> bool {
        matches!(self, Self::LockAcquired)
    }

    /// Excluded from bookkeeping
    #[inline]
    pub fn is_critical(self) -> bool {
        self.classify().0 == Severity::Critical
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Routine
    Info,
    /// Worth an alert file entry
    High,
    /// Triggers enforcement
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => f.write_str("INFO"),
            Self::High => f.write_str("HIGH"),
            Self::Critical => f.write_str("CRITICAL"),
        }
    }
}

/// Enforcement decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    /// Let the actor continue
    Allow,
    /// Cancel the actor
    Block,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("ALLOW"),
            Self::Block => f.write_str("BLOCK"),
        }
    }
}

/// One line of the event log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Monotonic per monitor, starting at 1
    pub seq: u64,
    /// Local wall-clock time, `YYYY-MM-DD HH:MM:SS.mmm`
    pub timestamp: String,
    /// Severity
    pub severity: Severity,
    /// Kind
    pub event: EventKind,
    /// Originating actor
    pub actor: String,
    /// Free text
    pub message: String,
    /// Enforcement decision
    pub action: Action,
}

impl EventRecord {
    /// Whether the record also goes to the actor's alert file
    #[inline]
    pub fn is_alert(&self) -> bool {
        self.severity >= Severity::High
    }
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:<8} {:<17} {:<14} {} ({})",
            self.timestamp, self.severity, self.event, self.actor, self.message, self.action
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_table() {
        for kind in EventKind::ALL {
            let (severity, action) = kind.classify();
            let expected = match kind.as_str() {
                "DEADLOCK_DETECTED" | "ALERT_STARVATION" | "IPS_BLOCK" => {
                    (Severity::Critical, Action::Block)
                }
                "ERROR" | "INTERRUPT" => (Severity::High, Action::Allow),
                _ => (Severity::Info, Action::Allow),
            };
            assert_eq!((severity, action), expected, "{kind}");
        }
    }

    #[test]
    fn test_wire_names_match_serde() {
        for kind in EventKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"CRITICAL\"");
        assert_eq!(serde_json::to_string(&Action::Block).unwrap(), "\"BLOCK\"");
    }

    #[test]
    fn test_bookkeeping_sets() {
        assert!(EventKind::Work.is_successful_work());
        assert!(EventKind::LockAcquired.is_successful_work());
        assert!(EventKind::Success.is_successful_work());
        assert!(!EventKind::Result.is_successful_work());
        assert!(EventKind::Wait.starts_wait());
        assert!(EventKind::LockAcquired.is_acquisition());
        assert!(EventKind::IpsBlock.is_critical());
        assert!(!EventKind::Interrupt.is_critical());
    }
}
