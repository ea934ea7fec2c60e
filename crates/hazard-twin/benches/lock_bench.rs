//! Lock Primitive Benchmark Suite
//!
//! Uncontended acquire/release round trips for the three desk locks:
//!
//! - **Unfair semaphore**: admission only checks for a higher-priority waiter
//! - **Fair semaphore**: admission checks the FIFO queue head
//! - **Ticket lock**: draw a ticket, wait for its turn, advance
//!
//! A second group measures two-lock ordered acquisition against plain nested
//! acquisition, the overhead of ranking locks by name.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hazard_twin::{
    CancellationToken, Claimant, Fairness, LockPrimitive, OrderedAcquisition, Priority, Semaphore,
    TicketLock,
};

// ============================================================================
// Single lock
// ============================================================================

fn bench_round_trip(c: &mut Criterion) {
    let claimant = Claimant::new("bench", Priority::Normal);
    let token = CancellationToken::new();

    let unfair = Semaphore::binary("unfair", Fairness::Unfair).unwrap();
    let fair = Semaphore::binary("fair", Fairness::Fair).unwrap();
    let ticket = TicketLock::new("ticket").unwrap();
    let locks: [(&str, &dyn LockPrimitive); 3] = [
        ("unfair_semaphore", &unfair),
        ("fair_semaphore", &fair),
        ("ticket_lock", &ticket),
    ];

    let mut group = c.benchmark_group("uncontended_round_trip");
    for (label, lock) in locks {
        group.bench_with_input(BenchmarkId::from_parameter(label), &lock, |b, lock| {
            b.iter(|| {
                lock.acquire(black_box(&claimant), &token).unwrap();
                lock.release(black_box(&claimant)).unwrap();
            });
        });
    }
    group.finish();
}

// ============================================================================
// Two locks
// ============================================================================

fn bench_two_locks(c: &mut Criterion) {
    let claimant = Claimant::new("bench", Priority::Normal);
    let token = CancellationToken::new();
    let a = Semaphore::binary("client-a", Fairness::Fair).unwrap();
    let b = Semaphore::binary("client-b", Fairness::Fair).unwrap();

    let mut group = c.benchmark_group("two_locks");
    group.bench_function("nested", |bench| {
        bench.iter(|| {
            b.acquire(&claimant, &token).unwrap();
            a.acquire(&claimant, &token).unwrap();
            a.release(&claimant).unwrap();
            b.release(&claimant).unwrap();
        });
    });
    group.bench_function("ordered", |bench| {
        let locks: [&dyn LockPrimitive; 2] = [&b, &a];
        bench.iter(|| {
            let mut plan = OrderedAcquisition::new(&claimant, black_box(&locks));
            plan.acquire_all(&token).unwrap();
        });
    });
    group.finish();
}

criterion_group!(benches, bench_round_trip, bench_two_locks);
criterion_main!(benches);
