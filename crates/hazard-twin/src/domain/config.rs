//! Harness Configuration
//!
//! One plain struct per concern, each with a `Default` matching the stock
//! demonstration, builder-style setters, and `validate()`. Durations are
//! stored as milliseconds so the structs round-trip through JSON unchanged.
//! [`HarnessConfig`] aggregates them and is what the driver loads from disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{HazardError, HazardResult};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Monitor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Event monitor settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// General JSON-lines journal; `None` keeps records in memory only
    pub journal_path: Option<PathBuf>,
    /// Directory for per-actor alert files; `None` disables them
    pub alert_dir: Option<PathBuf>,
    /// Wait latency above which a starvation alert is derived
    pub anomaly_threshold_ms: u64,
    /// Echo every record through `tracing`
    pub console_echo: bool,
    /// In-memory history bound
    pub history_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            journal_path: None,
            alert_dir: None,
            anomaly_threshold_ms: 200,
            console_echo: true,
            history_capacity: 100_000,
        }
    }
}

impl MonitorConfig {
    /// Write the journal to `path`
    pub fn journal(mut self, path: impl AsRef<Path>) -> Self {
        self.journal_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Write alert files under `dir`
    pub fn alerts(mut self, dir: impl AsRef<Path>) -> Self {
        self.alert_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set the anomaly threshold
    pub fn threshold(mut self, threshold: Duration) -> Self {
        self.anomaly_threshold_ms = duration_ms(threshold);
        self
    }

    /// Mute or unmute the console echo
    pub fn echo(mut self, enabled: bool) -> Self {
        self.console_echo = enabled;
        self
    }

    /// Anomaly threshold as a `Duration`
    pub fn anomaly_threshold(&self) -> Duration {
        Duration::from_millis(self.anomaly_threshold_ms)
    }

    /// # Errors
    ///
    /// `InvalidConfig` on a zero threshold or zero history capacity.
    pub fn validate(&self) -> HazardResult<()> {
        require(self.anomaly_threshold_ms > 0, "anomaly threshold must be > 0")?;
        require(self.history_capacity > 0, "history capacity must be > 0")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenarios
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Race-condition deposit run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    /// Concurrent depositors
    pub actors: usize,
    /// Amount each depositor adds
    pub amount: i64,
    /// Shortest processing window between read and write
    pub min_latency_ms: u64,
    /// Longest processing window between read and write
    pub max_latency_ms: u64,
    /// Upper bound on the whole run before stragglers are cancelled
    pub join_timeout_ms: u64,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            actors: 5,
            amount: 10,
            min_latency_ms: 10,
            max_latency_ms: 100,
            join_timeout_ms: 30_000,
        }
    }
}

impl RaceConfig {
    /// Set the number of depositors
    pub fn actors(mut self, actors: usize) -> Self {
        self.actors = actors;
        self
    }

    /// Set the per-deposit amount
    pub fn amount(mut self, amount: i64) -> Self {
        self.amount = amount;
        self
    }

    /// Set the processing window range
    pub fn latency(mut self, min: Duration, max: Duration) -> Self {
        self.min_latency_ms = duration_ms(min);
        self.max_latency_ms = duration_ms(max);
        self
    }

    /// Amount the account must hold after a correct run
    pub fn expected_balance(&self) -> i64 {
        i64::try_from(self.actors).unwrap_or(i64::MAX).saturating_mul(self.amount)
    }

    /// # Errors
    ///
    /// `InvalidConfig` on zero actors, a non-positive amount, a total
    /// (`actors × amount`) that does not fit in `i64` or an inverted latency
    /// range.
    pub fn validate(&self) -> HazardResult<()> {
        require(self.actors > 0, "race needs at least one actor")?;
        require(self.amount > 0, "deposit amount must be > 0")?;
        require(
            i64::try_from(self.actors)
                .ok()
                .and_then(|actors| actors.checked_mul(self.amount))
                .is_some(),
            "actors x amount overflows the balance",
        )?;
        require(
            self.min_latency_ms <= self.max_latency_ms,
            "min latency must not exceed max latency",
        )?;
        require(self.join_timeout_ms > 0, "join timeout must be > 0")
    }
}

/// Two-agent transfer run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadlockConfig {
    /// Pause between the first and second acquisition on the unsafe path
    pub overlap_ms: u64,
    /// Pause between the two acquisitions on the safe paths
    pub gap_ms: u64,
    /// Time spent holding both wallets
    pub work_ms: u64,
    /// Bounded join before a deadlock is declared
    pub join_timeout_ms: u64,
    /// Wait after forced cancellation
    pub grace_ms: u64,
}

impl Default for DeadlockConfig {
    fn default() -> Self {
        Self {
            overlap_ms: 500,
            gap_ms: 50,
            work_ms: 100,
            join_timeout_ms: 3_000,
            grace_ms: 500,
        }
    }
}

impl DeadlockConfig {
    /// Set the join timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set the grace period
    pub fn grace(mut self, grace: Duration) -> Self {
        self.grace_ms = duration_ms(grace);
        self
    }

    /// Set the hold time
    pub fn work(mut self, work: Duration) -> Self {
        self.work_ms = duration_ms(work);
        self
    }

    /// # Errors
    ///
    /// `InvalidConfig` on a zero timeout, or an overlap window that does not
    /// fit inside the timeout.
    pub fn validate(&self) -> HazardResult<()> {
        require(self.join_timeout_ms > 0, "deadlock timeout must be > 0")?;
        require(
            self.overlap_ms < self.join_timeout_ms,
            "overlap window must be shorter than the timeout",
        )
    }
}

/// Priority-contention run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarvationConfig {
    /// High-priority actors
    pub high_priority_actors: usize,
    /// Visits per high-priority actor
    pub high_priority_visits: usize,
    /// Visits of the single low-priority actor
    pub low_priority_visits: usize,
    /// Time spent at the desk per visit
    pub service_ms: u64,
    /// Deadline for the low-priority actor
    pub sla_ms: u64,
    /// Wait after forced cancellation
    pub grace_ms: u64,
}

impl Default for StarvationConfig {
    fn default() -> Self {
        Self {
            high_priority_actors: 3,
            high_priority_visits: 10,
            low_priority_visits: 1,
            service_ms: 40,
            sla_ms: 5_000,
            grace_ms: 1_000,
        }
    }
}

impl StarvationConfig {
    /// Set the service time
    pub fn service(mut self, service: Duration) -> Self {
        self.service_ms = duration_ms(service);
        self
    }

    /// Set the SLA window
    pub fn sla(mut self, sla: Duration) -> Self {
        self.sla_ms = duration_ms(sla);
        self
    }

    /// Set the high-priority load
    pub fn high_priority(mut self, actors: usize, visits: usize) -> Self {
        self.high_priority_actors = actors;
        self.high_priority_visits = visits;
        self
    }

    /// # Errors
    ///
    /// `InvalidConfig` if the low-priority actor has nothing to do or the SLA
    /// is zero.
    pub fn validate(&self) -> HazardResult<()> {
        require(self.low_priority_visits > 0, "low-priority actor needs a visit")?;
        require(self.sla_ms > 0, "SLA must be > 0")
    }
}

/// Many-actor deposit run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    /// Concurrent depositors
    pub actors: usize,
    /// Amount each depositor adds
    pub amount: i64,
    /// Shortest processing window
    pub min_latency_ms: u64,
    /// Longest processing window
    pub max_latency_ms: u64,
    /// Upper bound on the whole run
    pub join_timeout_ms: u64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            actors: 100,
            amount: 1,
            min_latency_ms: 1,
            max_latency_ms: 10,
            join_timeout_ms: 120_000,
        }
    }
}

impl StressConfig {
    /// Set the number of depositors
    pub fn actors(mut self, actors: usize) -> Self {
        self.actors = actors;
        self
    }

    /// Set the processing window range
    pub fn latency(mut self, min: Duration, max: Duration) -> Self {
        self.min_latency_ms = duration_ms(min);
        self.max_latency_ms = duration_ms(max);
        self
    }

    /// Same workload expressed as a race run
    pub fn as_race(&self) -> RaceConfig {
        RaceConfig {
            actors: self.actors,
            amount: self.amount,
            min_latency_ms: self.min_latency_ms,
            max_latency_ms: self.max_latency_ms,
            join_timeout_ms: self.join_timeout_ms,
        }
    }

    /// # Errors
    ///
    /// Same rules as [`RaceConfig::validate`].
    pub fn validate(&self) -> HazardResult<()> {
        self.as_race().validate()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Aggregate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything the orchestrator and monitor need
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Monitor settings
    pub monitor: MonitorConfig,
    /// Race-condition settings
    pub race: RaceConfig,
    /// Deadlock settings
    pub deadlock: DeadlockConfig,
    /// Starvation settings
    pub starvation: StarvationConfig,
    /// Stress settings
    pub stress: StressConfig,
}

impl HarnessConfig {
    /// Parse a JSON document; missing sections fall back to defaults
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the document does not parse or fails validation.
    pub fn from_json(text: &str) -> HazardResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|err| HazardError::invalid(format!("config parse error: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    ///
    /// # Errors
    ///
    /// The first section error found.
    pub fn validate(&self) -> HazardResult<()> {
        self.monitor.validate()?;
        self.race.validate()?;
        self.deadlock.validate()?;
        self.starvation.validate()?;
        self.stress.validate()
    }
}

fn require(condition: bool, reason: &str) -> HazardResult<()> {
    if condition {
        Ok(())
    } else {
        Err(HazardError::invalid(reason))
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = HarnessConfig::default();
        config.validate().unwrap();
        assert_eq!(config.monitor.anomaly_threshold(), Duration::from_millis(200));
        assert_eq!(config.race.expected_balance(), 50);
        assert_eq!(config.deadlock.join_timeout_ms, 3_000);
        assert_eq!(config.starvation.high_priority_actors, 3);
        assert_eq!(config.stress.actors, 100);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = HarnessConfig::from_json(r#"{"race": {"actors": 7}}"#).unwrap();
        assert_eq!(config.race.actors, 7);
        assert_eq!(config.race.amount, 10);
        assert_eq!(config.monitor, MonitorConfig::default());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(RaceConfig::default().actors(0).validate().is_err());
        assert!(RaceConfig::default()
            .latency(Duration::from_millis(50), Duration::from_millis(10))
            .validate()
            .is_err());
        assert!(HarnessConfig::from_json(r#"{"monitor": {"anomaly_threshold_ms": 0}}"#).is_err());
        assert!(HarnessConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_rejects_overflowing_total() {
        assert!(RaceConfig::default().actors(1).amount(i64::MAX).validate().is_ok());
        assert!(RaceConfig::default().actors(2).amount(i64::MAX).validate().is_err());
        assert!(RaceConfig::default().actors(3).amount(i64::MAX / 2).validate().is_err());

        let stress = StressConfig {
            amount: i64::MAX,
            ..StressConfig::default()
        };
        assert!(stress.validate().is_err());

        let err = HarnessConfig::from_json(r#"{"race": {"actors": 2, "amount": 9223372036854775807}}"#)
            .unwrap_err();
        assert!(matches!(err, HazardError::InvalidConfig(_)));
        println!("✓ actors x amount overflow rejected");
    }
}
