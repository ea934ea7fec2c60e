//! Starvation: one service desk, many clients, uneven priorities
//!
//! High-priority clients visit the desk repeatedly; one low-priority client
//! needs a single visit. Behind an unfair, priority-biased lock the
//! low-priority client keeps losing the hand-off. Behind a fair semaphore or
//! a ticket lock it is served in arrival order.

use std::sync::Arc;
use std::time::Duration;

use super::{ActorContext, ActorRole, ActorWorkload, Technique, WorkStats};
use crate::domain::error::HazardResult;
use crate::domain::monitor::EventKind;
use crate::domain::resources::ServiceDesk;

/// Open the desk matching a run's technique
///
/// # Errors
///
/// `InvalidConfig` if `name` is empty.
pub fn open_desk(name: &str, technique: Option<Technique>) -> HazardResult<ServiceDesk> {
    match technique {
        None => ServiceDesk::unfair(name),
        Some(Technique::FairSemaphore) => ServiceDesk::fair(name),
        Some(Technique::TicketOrIntrinsicMonitor) => ServiceDesk::ticketed(name),
    }
}

/// Repeated visits to a service desk
#[derive(Debug, Clone)]
pub struct CreditRequest {
    desk: Arc<ServiceDesk>,
    role: ActorRole,
    visits: usize,
    service: Duration,
}

impl CreditRequest {
    /// `visits` visits of `service` each
    pub fn new(desk: Arc<ServiceDesk>, role: ActorRole, visits: usize, service: Duration) -> Self {
        Self {
            desk,
            role,
            visits,
            service,
        }
    }
}

impl ActorWorkload for CreditRequest {
    fn role(&self) -> ActorRole {
        self.role
    }

    fn perform(&self, ctx: &ActorContext, stats: &mut WorkStats) -> HazardResult<()> {
        ctx.log(
            EventKind::Init,
            format!(
                "{} client, {} visit(s) at {} ({})",
                self.role,
                self.visits,
                self.desk.name(),
                self.desk.lock_kind()
            ),
        );

        for visit in 1..=self.visits {
            ctx.checkpoint()?;
            let guard = ctx.acquire(self.desk.lock(), stats)?;
            // Enforcement may have fired on LOCK_ACQUIRED itself.
            ctx.checkpoint()?;
            ctx.log(
                EventKind::Work,
                format!("being served, visit {visit}/{}", self.visits),
            );
            ctx.pause(self.service)?;
            self.desk.serve();
            stats.record_operation();
            ctx.release(guard);
        }

        ctx.log(EventKind::Success, format!("served {} time(s)", self.visits));
        Ok(())
    }
}
