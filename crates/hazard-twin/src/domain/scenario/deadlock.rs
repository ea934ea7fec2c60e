//! Deadlock: two transfers over the same pair of wallets
//!
//! Agent 1 moves funds A → B, agent 2 moves B → A. Each needs both wallets.
//! Taken in argument order with an overlap window between the two
//! acquisitions, each agent ends up holding one wallet and waiting for the
//! other. The safe policies rank the wallets by name and always lock the
//! lower one first.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{ActorContext, ActorRole, ActorWorkload, Technique, WorkStats};
use crate::domain::error::{HazardError, HazardResult};
use crate::domain::monitor::EventKind;
use crate::domain::resources::Wallet;
use crate::domain::sync::{LockPrimitive, OrderedAcquisition};

/// How the two wallets are acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeadlockPolicy {
    /// Argument order, pause in between
    Unordered,
    /// Ranked semaphores via [`OrderedAcquisition`]
    OrderedSemaphore,
    /// Ranked nested intrinsic monitors
    NestedMonitor,
}

impl DeadlockPolicy {
    /// Policy for a run
    pub fn for_run(technique: Option<Technique>) -> Self {
        match technique {
            None => Self::Unordered,
            Some(Technique::FairSemaphore) => Self::OrderedSemaphore,
            Some(Technique::TicketOrIntrinsicMonitor) => Self::NestedMonitor,
        }
    }
}

/// Delays of one transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferTiming {
    /// Pause after the first wallet on the unsafe path
    pub overlap: Duration,
    /// Pause after the first wallet on the safe paths
    pub gap: Duration,
    /// Time spent holding both wallets
    pub work: Duration,
}

/// Move funds between two distinct wallets
#[derive(Debug, Clone)]
pub struct Transfer {
    from: Arc<Wallet>,
    to: Arc<Wallet>,
    policy: DeadlockPolicy,
    timing: TransferTiming,
}

impl Transfer {
    /// Build a transfer
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if both sides are the same wallet.
    pub fn new(
        from: Arc<Wallet>,
        to: Arc<Wallet>,
        policy: DeadlockPolicy,
        timing: TransferTiming,
    ) -> HazardResult<Self> {
        if Arc::ptr_eq(&from, &to) || from.name() == to.name() {
            return Err(HazardError::invalid(format!(
                "transfer needs two distinct wallets, got {} twice",
                from.name()
            )));
        }
        Ok(Self {
            from,
            to,
            policy,
            timing,
        })
    }

    fn ranked(&self) -> (&Wallet, &Wallet) {
        if self.from.name() <= self.to.name() {
            (&self.from, &self.to)
        } else {
            (&self.to, &self.from)
        }
    }

    fn work(&self, ctx: &ActorContext, stats: &mut WorkStats) -> HazardResult<()> {
        ctx.log(
            EventKind::Work,
            format!("moving funds {} -> {}", self.from.name(), self.to.name()),
        );
        ctx.pause(self.timing.work)?;
        stats.record_operation();
        ctx.log(EventKind::Success, "transfer complete");
        Ok(())
    }

    fn unordered(&self, ctx: &ActorContext, stats: &mut WorkStats) -> HazardResult<()> {
        let first = ctx.acquire(self.from.semaphore(), stats)?;
        ctx.pause(self.timing.overlap)?;
        let second = ctx.acquire(self.to.semaphore(), stats)?;
        self.work(ctx, stats)?;
        ctx.release(second);
        ctx.release(first);
        Ok(())
    }

    fn ordered_semaphores(&self, ctx: &ActorContext, stats: &mut WorkStats) -> HazardResult<()> {
        let locks: [&dyn LockPrimitive; 2] = [self.from.semaphore(), self.to.semaphore()];
        let mut plan = OrderedAcquisition::new(ctx.claimant(), &locks);

        while let Some(next) = plan.next_pending() {
            ctx.log(EventKind::Wait, format!("waiting for {next}"));
            let started = Instant::now();
            plan.acquire_next(ctx.token())?;
            stats.record_wait(started.elapsed());
            ctx.log(EventKind::LockAcquired, format!("holding {next}"));
            if plan.next_pending().is_some() {
                ctx.pause(self.timing.gap)?;
            }
        }

        self.work(ctx, stats)?;
        let order = plan.order().join(", ");
        drop(plan);
        ctx.log(EventKind::LockRelease, format!("released {order}"));
        Ok(())
    }

    fn nested_monitors(&self, ctx: &ActorContext, stats: &mut WorkStats) -> HazardResult<()> {
        let (low, high) = self.ranked();
        let (outer, inner) = (low.monitor(), high.monitor());

        ctx.log(EventKind::Wait, format!("waiting for {}", outer.name()));
        let started = Instant::now();
        outer.enter(ctx.claimant(), ctx.token(), || -> HazardResult<()> {
            stats.record_wait(started.elapsed());
            ctx.log(EventKind::LockAcquired, format!("holding {}", outer.name()));
            ctx.pause(self.timing.gap)?;

            ctx.log(EventKind::Wait, format!("waiting for {}", inner.name()));
            let started = Instant::now();
            inner.enter(ctx.claimant(), ctx.token(), || -> HazardResult<()> {
                stats.record_wait(started.elapsed());
                ctx.log(EventKind::LockAcquired, format!("holding {}", inner.name()));
                self.work(ctx, stats)
            })?;
            ctx.log(EventKind::LockRelease, format!("released {}", inner.name()));
            Ok(())
        })?;
        ctx.log(EventKind::LockRelease, format!("released {}", outer.name()));
        Ok(())
    }
}

impl ActorWorkload for Transfer {
    fn role(&self) -> ActorRole {
        ActorRole::Agent
    }

    fn perform(&self, ctx: &ActorContext, stats: &mut WorkStats) -> HazardResult<()> {
        ctx.log(
            EventKind::Init,
            format!("transfer {} -> {}", self.from.name(), self.to.name()),
        );
        ctx.checkpoint()?;
        match self.policy {
            DeadlockPolicy::Unordered => self.unordered(ctx, stats),
            DeadlockPolicy::OrderedSemaphore => self.ordered_semaphores(ctx, stats),
            DeadlockPolicy::NestedMonitor => self.nested_monitors(ctx, stats),
        }
    }
}
