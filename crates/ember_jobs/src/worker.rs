//! # Worker Threads
//!
//! Each worker owns two work-stealing deques (high and normal priority),
//! a ready-fiber queue and a scheduler fiber. The scheduler loop:
//!
//! 1. resume a ready fiber, if any;
//! 2. pop local work, high before normal;
//! 3. take driver-injected work;
//! 4. try up to eight random-victim steals, high before normal;
//! 5. otherwise park on the wake semaphore.
//!
//! Every job runs on a fresh fiber with a 32 KiB stack, destroyed when the
//! job's fiber makes its final switch back. A fiber that suspends in
//! `wait` parks its `(handle, fiber)` pair in the worker's deferred-wait
//! slot; the scheduler registers the waiter *after* the switch back, so a
//! fiber can never be resumed before its context is fully saved.

#![allow(unsafe_code)]

use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use libc::c_void;

use crate::deque::ChaseLevDeque;
use crate::fiber::{self, Fiber, JOB_FIBER_STACK_BYTES};
use crate::job::JobHandle;
use crate::system::JobSystem;

/// Steal attempts per scheduler iteration before parking.
pub(crate) const STEAL_ATTEMPTS: usize = 8;

/// Upper bound on one idle park. Bounded so a wake ticket consumed by
/// another worker cannot strand fibers parked on this worker's ready
/// queue.
pub(crate) const IDLE_PARK: Duration = Duration::from_millis(1);

/// A fiber pointer travelling through a ready queue.
pub(crate) struct ReadyFiber(pub(crate) *mut Fiber);

// Fibers are resumed by exactly one thread at a time; the ready queue is
// the handoff point.
unsafe impl Send for ReadyFiber {}

/// Per-worker state shared with thieves and the driver.
pub(crate) struct WorkerShared {
    pub(crate) high: ChaseLevDeque,
    pub(crate) normal: ChaseLevDeque,
    pub(crate) ready_tx: Sender<ReadyFiber>,
    pub(crate) ready_rx: Receiver<ReadyFiber>,
}

impl WorkerShared {
    pub(crate) fn new(deque_capacity: usize) -> Self {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(deque_capacity);
        Self {
            high: ChaseLevDeque::new(deque_capacity),
            normal: ChaseLevDeque::new(deque_capacity),
            ready_tx,
            ready_rx,
        }
    }
}

#[derive(Clone, Copy)]
pub(crate) struct PendingWait {
    pub(crate) handle: JobHandle,
    pub(crate) fiber: *mut Fiber,
}

thread_local! {
    /// 0 for non-worker threads, worker index + 1 on workers.
    static WORKER_SLOT: Cell<usize> = const { Cell::new(0) };
    static SCHEDULER_FIBER: Cell<*mut Fiber> = const { Cell::new(std::ptr::null_mut()) };
    static CURRENT_FIBER: Cell<*mut Fiber> = const { Cell::new(std::ptr::null_mut()) };
    static PENDING_WAIT: Cell<Option<PendingWait>> = const { Cell::new(None) };
}

/// Worker slot of the calling thread; 0 means "not a worker".
pub(crate) fn current_worker_slot() -> usize {
    WORKER_SLOT.get()
}

/// The fiber currently executing on this thread.
pub(crate) fn current_fiber() -> *mut Fiber {
    CURRENT_FIBER.get()
}

/// This worker's scheduler fiber.
pub(crate) fn scheduler_fiber() -> *mut Fiber {
    SCHEDULER_FIBER.get()
}

/// Parks a wait registration for the scheduler to publish after the
/// suspending fiber's context is saved.
pub(crate) fn set_pending_wait(handle: JobHandle, fiber: *mut Fiber) {
    debug_assert!(PENDING_WAIT.get().is_none());
    PENDING_WAIT.set(Some(PendingWait { handle, fiber }));
}

/// Small xorshift generator for victim selection.
struct VictimRng(u64);

impl VictimRng {
    fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(0x9e37_79b9_7f4a_7c15) | 1)
    }

    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

/// Entry of a worker OS thread.
pub(crate) fn worker_main(system: Arc<JobSystem>, index: usize) {
    WORKER_SLOT.set(index + 1);

    let mut scheduler = Box::new(Fiber::convert_thread());
    let scheduler_ptr: *mut Fiber = &mut *scheduler;
    SCHEDULER_FIBER.set(scheduler_ptr);
    CURRENT_FIBER.set(scheduler_ptr);

    tracing::debug!(worker = index, "worker started");

    let mut rng = VictimRng::new(index as u64 + 1);

    while !system.should_terminate() {
        let shared = system.worker_shared(index);

        // Suspended work resumes before anything new starts.
        if let Ok(ready) = shared.ready_rx.try_recv() {
            pump_fiber(&system, ready.0);
            continue;
        }

        if let Some(handle) = shared.high.pop_bottom().or_else(|| shared.normal.pop_bottom()) {
            run_job_on_fiber(&system, handle);
            continue;
        }

        if let Some(handle) = system.take_injected() {
            run_job_on_fiber(&system, handle);
            continue;
        }

        if let Some(handle) = steal_round(&system, index, &mut rng) {
            run_job_on_fiber(&system, handle);
            continue;
        }

        system.park_idle(IDLE_PARK);
    }

    tracing::debug!(worker = index, "worker stopping");
}

/// One round of random-victim steal attempts, high deque before normal.
fn steal_round(system: &JobSystem, index: usize, rng: &mut VictimRng) -> Option<JobHandle> {
    let workers = system.worker_count();
    if workers < 2 {
        return None;
    }

    for _ in 0..STEAL_ATTEMPTS {
        let victim = (rng.next() % workers as u64) as usize;
        if victim == index {
            continue;
        }
        let shared = system.worker_shared(victim);
        if let Some(handle) = shared.high.steal().or_else(|| shared.normal.steal()) {
            return Some(handle);
        }
    }
    None
}

struct FiberStart {
    system: *const JobSystem,
    handle: JobHandle,
}

/// Runs one job on a fresh fiber and reaps it when it makes its final
/// switch back.
fn run_job_on_fiber(system: &Arc<JobSystem>, handle: JobHandle) {
    let start = Box::into_raw(Box::new(FiberStart {
        system: Arc::as_ptr(system),
        handle,
    }));
    let fiber = Box::into_raw(Box::new(Fiber::new(
        job_fiber_entry,
        start.cast::<c_void>(),
        JOB_FIBER_STACK_BYTES,
    )));
    pump_fiber(system, fiber);
}

fn job_fiber_entry(arg: *mut c_void) {
    let start = unsafe { Box::from_raw(arg.cast::<FiberStart>()) };
    let system = unsafe { &*start.system };
    system.execute_job(start.handle);
    drop(start);

    // Final switch: the scheduler sees no pending wait and frees this
    // fiber. Read the TLS of whichever worker resumed us last.
    let current = current_fiber();
    let scheduler = scheduler_fiber();
    unsafe { fiber::switch(current, scheduler) };
    unreachable!("finished job fiber resumed");
}

/// Switches from the scheduler fiber into `fiber` and handles whatever
/// state it left behind: a finished fiber is destroyed, a suspended one
/// has its waiter registration published.
pub(crate) fn pump_fiber(system: &JobSystem, fiber: *mut Fiber) {
    let scheduler = CURRENT_FIBER.get();
    CURRENT_FIBER.set(fiber);
    unsafe { fiber::switch(scheduler, fiber) };
    CURRENT_FIBER.set(scheduler);

    match PENDING_WAIT.take() {
        None => {
            // The job's final switch; its stack is dead.
            drop(unsafe { Box::from_raw(fiber) });
        }
        Some(pending) => {
            // Context is saved; safe to let a finisher resume it now.
            if !system.register_waiter(pending.handle, pending.fiber) {
                system.make_ready(pending.fiber);
            }
        }
    }
}
