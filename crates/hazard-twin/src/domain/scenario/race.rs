//! Race Condition: concurrent deposits into one account
//!
//! Every depositor reads the balance, spends a random processing window,
//! then writes `read + amount`. Unguarded, two depositors that read the same
//! value overwrite each other and one deposit is lost. Guarded, the whole
//! read-sleep-write runs under the account's lock.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;

use super::{ActorContext, ActorRole, ActorWorkload, Technique, WorkStats};
use crate::domain::error::{HazardError, HazardResult};
use crate::domain::monitor::EventKind;
use crate::domain::resources::Account;

/// How the read-sleep-write is protected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RacePolicy {
    /// No lock at all
    Unguarded,
    /// Account's fair binary semaphore
    Semaphore,
    /// Account's intrinsic monitor
    Monitor,
}

impl RacePolicy {
    /// Policy for a run
    pub fn for_run(technique: Option<Technique>) -> Self {
        match technique {
            None => Self::Unguarded,
            Some(Technique::FairSemaphore) => Self::Semaphore,
            Some(Technique::TicketOrIntrinsicMonitor) => Self::Monitor,
        }
    }
}

/// Uniformly random processing window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyWindow {
    min: Duration,
    max: Duration,
}

impl LatencyWindow {
    /// Window in `[min, max]`
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `min > max`.
    pub fn new(min: Duration, max: Duration) -> HazardResult<Self> {
        if min > max {
            return Err(HazardError::invalid("latency window min exceeds max"));
        }
        Ok(Self { min, max })
    }

    /// Draw one delay
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

/// One deposit into a shared account
#[derive(Debug, Clone)]
pub struct RaceDeposit {
    account: Arc<Account>,
    amount: i64,
    window: LatencyWindow,
    policy: RacePolicy,
}

impl RaceDeposit {
    /// Deposit `amount` into `account` under `policy`
    pub fn new(account: Arc<Account>, amount: i64, window: LatencyWindow, policy: RacePolicy) -> Self {
        Self {
            account,
            amount,
            window,
            policy,
        }
    }

    fn read_modify_write(&self, ctx: &ActorContext) -> HazardResult<()> {
        let read = self.account.read_balance();
        ctx.log(EventKind::Work, format!("read balance {read}"));
        ctx.pause(self.window.sample())?;
        let written = read
            .checked_add(self.amount)
            .ok_or_else(|| HazardError::Resource {
                resource: self.account.name().to_owned(),
                reason: format!("depositing {} into {read} overflows", self.amount),
            })?;
        self.account.write_balance(written);
        ctx.log(EventKind::Result, format!("wrote balance {written}"));
        Ok(())
    }
}

impl ActorWorkload for RaceDeposit {
    fn role(&self) -> ActorRole {
        ActorRole::Depositor
    }

    fn perform(&self, ctx: &ActorContext, stats: &mut WorkStats) -> HazardResult<()> {
        ctx.log(
            EventKind::Init,
            format!("depositing {} into {}", self.amount, self.account.name()),
        );
        ctx.checkpoint()?;

        match self.policy {
            RacePolicy::Unguarded => self.read_modify_write(ctx)?,
            RacePolicy::Semaphore => {
                let guard = ctx.acquire(self.account.semaphore(), stats)?;
                self.read_modify_write(ctx)?;
                ctx.release(guard);
            }
            RacePolicy::Monitor => {
                let monitor = self.account.monitor();
                ctx.log(EventKind::Wait, format!("waiting for {}", monitor.name()));
                let started = Instant::now();
                monitor.enter(ctx.claimant(), ctx.token(), || -> HazardResult<()> {
                    stats.record_wait(started.elapsed());
                    ctx.log(EventKind::LockAcquired, format!("holding {}", monitor.name()));
                    self.read_modify_write(ctx)
                })?;
                ctx.log(EventKind::LockRelease, format!("released {}", monitor.name()));
            }
        }

        stats.record_operation();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::MonitorConfig;
    use crate::domain::monitor::EventMonitor;
    use crate::domain::sync::{CancellationToken, Claimant, LockPrimitive, Priority};

    #[test]
    fn test_policy_mapping() {
        assert_eq!(RacePolicy::for_run(None), RacePolicy::Unguarded);
        assert_eq!(RacePolicy::for_run(Some(Technique::FairSemaphore)), RacePolicy::Semaphore);
        assert_eq!(
            RacePolicy::for_run(Some(Technique::TicketOrIntrinsicMonitor)),
            RacePolicy::Monitor
        );
    }

    #[test]
    fn test_latency_window_bounds() {
        let window = LatencyWindow::new(Duration::from_millis(10), Duration::from_millis(20)).unwrap();
        for _ in 0..100 {
            let d = window.sample();
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        }
        assert!(LatencyWindow::new(Duration::from_millis(2), Duration::from_millis(1)).is_err());
    }

    #[test]
    fn test_overflowing_deposit_is_rejected_not_panicking() {
        let monitor = Arc::new(EventMonitor::new(MonitorConfig::default().echo(false)).unwrap());
        let window = LatencyWindow::new(Duration::ZERO, Duration::ZERO).unwrap();

        for policy in [RacePolicy::Unguarded, RacePolicy::Semaphore, RacePolicy::Monitor] {
            let account = Arc::new(Account::new("joint", i64::MAX - 5).unwrap());
            let deposit = RaceDeposit::new(Arc::clone(&account), 10, window, policy);
            let ctx = ActorContext::new(
                Claimant::new("depositor-1", Priority::Normal),
                CancellationToken::new(),
                Arc::clone(&monitor),
            );
            let mut stats = WorkStats::default();

            let err = deposit.perform(&ctx, &mut stats).unwrap_err();
            assert!(matches!(err, HazardError::Resource { ref resource, .. } if resource == "joint"));
            assert_eq!(account.read_balance(), i64::MAX - 5);
            assert_eq!(stats.operations, 0);
            assert!(account.semaphore().holders().is_empty());
            assert_eq!(account.monitor().owner(), None);
            println!("✓ {policy:?}: overflow rejected, balance untouched");
        }
    }
}
