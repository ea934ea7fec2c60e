//! # Shared Resources
//!
//! The units of mutable state the scenarios fight over. Each resource owns
//! the lock(s) that may guard it; nothing else in the crate creates locks for
//! them.
//!
//! | Resource | Scenario | Locks |
//! |----------|----------|-------|
//! | [`Account`] | race condition | fair binary semaphore, intrinsic monitor |
//! | [`Wallet`] | deadlock | binary semaphore, intrinsic monitor |
//! | [`ServiceDesk`] | starvation | unfair / fair semaphore or ticket lock |

pub mod account;
pub mod desk;
pub mod wallet;
pub mod wait_for;

pub use account::Account;
pub use desk::{DeskLock, ServiceDesk};
pub use wait_for::{WaitEdge, WaitForGraph};
pub use wallet::Wallet;
