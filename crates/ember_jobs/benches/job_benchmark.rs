//! # Job System Benchmarks
//!
//! Dispatch overhead and deque throughput.
//!
//! Run with: `cargo bench --package ember_jobs`

#![allow(missing_docs)]

use std::sync::atomic::{AtomicU32, Ordering};

use criterion::{criterion_group, criterion_main, Criterion};
use ember_jobs::{ChaseLevDeque, Job, JobHandle, JobSystem, JobSystemConfig};

fn counter_payload(counter: &AtomicU32) -> [u8; 8] {
    (counter as *const AtomicU32 as usize).to_le_bytes()
}

fn increment(_: &JobSystem, job: &Job) {
    let bits = usize::from_le_bytes(job.payload()[..8].try_into().unwrap());
    let counter = unsafe { &*(bits as *const AtomicU32) };
    counter.fetch_add(1, Ordering::Relaxed);
}

fn spawn_fanout(system: &JobSystem, job: &Job) {
    let me = job.handle();
    for _ in 0..64 {
        let child = system.create_job(increment, me, job.payload()).unwrap();
        system.run(child);
    }
}

fn bench_fanout_dispatch(c: &mut Criterion) {
    let system = JobSystem::new(JobSystemConfig::default());

    c.bench_function("fanout_64_children", |b| {
        b.iter(|| {
            let counter = AtomicU32::new(0);
            let root = system
                .create_job(spawn_fanout, JobHandle::INVALID, &counter_payload(&counter))
                .unwrap();
            system.run(root);
            system.wait(root);
            counter.load(Ordering::Relaxed)
        });
    });

    system.shutdown();
}

fn bench_deque_owner_throughput(c: &mut Criterion) {
    c.bench_function("deque_push_pop_1k", |b| {
        let deque = ChaseLevDeque::new(1024);
        b.iter(|| {
            for n in 0..1000 {
                deque.push_bottom(JobHandle::new(n, 1));
            }
            let mut drained = 0;
            while deque.pop_bottom().is_some() {
                drained += 1;
            }
            drained
        });
    });
}

criterion_group!(benches, bench_fanout_dispatch, bench_deque_owner_throughput);
criterion_main!(benches);
