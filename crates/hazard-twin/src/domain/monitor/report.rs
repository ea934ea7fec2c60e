//! Aggregate Report

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Per-actor totals drained from the monitor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonitorReport {
    /// Successful-work events per actor
    pub access_counts: BTreeMap<String, u64>,
    /// Longest closed wait per actor, in milliseconds
    pub longest_wait_ms: BTreeMap<String, u64>,
}

impl MonitorReport {
    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.access_counts.is_empty() && self.longest_wait_ms.is_empty()
    }

    /// Sum of all access counts
    pub fn total_accesses(&self) -> u64 {
        self.access_counts.values().sum()
    }
}

impl fmt::Display for MonitorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<20} {:>8} {:>14}", "ACTOR", "ACCESSES", "MAX WAIT (ms)")?;
        let mut actors: Vec<&String> = self
            .access_counts
            .keys()
            .chain(self.longest_wait_ms.keys())
            .collect();
        actors.sort();
        actors.dedup();
        for actor in actors {
            let accesses = self.access_counts.get(actor).copied().unwrap_or(0);
            match self.longest_wait_ms.get(actor) {
                Some(wait) => writeln!(f, "{actor:<20} {accesses:>8} {wait:>14}")?,
                None => writeln!(f, "{actor:<20} {accesses:>8} {:>14}", "-")?,
            }
        }
        Ok(())
    }
}
