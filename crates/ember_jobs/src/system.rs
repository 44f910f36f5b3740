//! # Job System
//!
//! Fixed pool of 4096 job records, a lock-free free list, one
//! work-stealing worker per hardware thread (minus the driver), and
//! wait-with-suspension for callers running inside jobs.
//!
//! Dispatch rules: a job spawned from a worker goes onto that worker's own
//! deque (LIFO, stolen FIFO by the others); a job spawned from any other
//! thread goes through a shared injector queue that workers poll between
//! their local deques and stealing. Either way one semaphore ticket is
//! posted per dispatched job.
//!
//! Wait rules: a non-worker caller spin-yields until the job completes; a
//! worker caller suspends its job fiber onto the scheduler and is resumed
//! by whichever worker completes the awaited job.

#![allow(unsafe_code)]

use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{JobError, JobResult};
use crate::fiber::Fiber;
use crate::job::{Job, JobFn, JobHandle, WaiterNode, JOB_PAYLOAD_BYTES};
use crate::semaphore::Semaphore;
use crate::worker::{self, ReadyFiber, WorkerShared};

/// Size of the job pool. Also bounds every per-worker queue.
pub const MAX_JOBS: usize = 4096;

/// Sentinel for the end of the free list.
const FREE_LIST_END: u32 = u32::MAX;

/// Configuration for the job system.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct JobSystemConfig {
    /// Worker thread count. Zero means `cpu_count - 1`, floored at one.
    pub workers: usize,
}

impl JobSystemConfig {
    fn resolved_workers(self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1))
            .unwrap_or(1)
            .max(1)
    }
}

/// The job scheduler. Internally thread-safe; shared as an [`Arc`].
pub struct JobSystem {
    jobs: Box<[Job]>,
    free_head: AtomicU32,
    free_next: Box<[AtomicU32]>,
    workers: Box<[WorkerShared]>,
    injector_tx: Sender<JobHandle>,
    injector_rx: Receiver<JobHandle>,
    semaphore: Semaphore,
    terminate: AtomicBool,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl JobSystem {
    /// Creates the pool and starts the worker threads.
    #[must_use]
    pub fn new(config: JobSystemConfig) -> Arc<Self> {
        let worker_count = config.resolved_workers();

        let jobs: Box<[Job]> = (0..MAX_JOBS).map(|_| Job::empty()).collect();
        let free_next: Box<[AtomicU32]> = (0..MAX_JOBS as u32)
            .map(|i| {
                AtomicU32::new(if i as usize == MAX_JOBS - 1 {
                    FREE_LIST_END
                } else {
                    i + 1
                })
            })
            .collect();

        let workers: Box<[WorkerShared]> = (0..worker_count)
            .map(|_| WorkerShared::new(MAX_JOBS))
            .collect();

        let (injector_tx, injector_rx) = crossbeam_channel::bounded(MAX_JOBS);

        let system = Arc::new(Self {
            jobs,
            free_head: AtomicU32::new(0),
            free_next,
            workers,
            injector_tx,
            injector_rx,
            semaphore: Semaphore::new(),
            terminate: AtomicBool::new(false),
            threads: Mutex::new(Vec::with_capacity(worker_count)),
        });

        let mut threads = system.threads.lock();
        for index in 0..worker_count {
            let system = Arc::clone(&system);
            let thread = std::thread::Builder::new()
                .name(format!("ember-worker-{index}"))
                .spawn(move || worker::worker_main(system, index))
                .expect("failed to spawn worker thread");
            threads.push(thread);
        }
        drop(threads);

        tracing::info!(workers = worker_count, "job system started");
        system
    }

    /// Number of worker threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    // =========================================================================
    // Job lifecycle
    // =========================================================================

    /// Allocates a job.
    ///
    /// `parent` links the new job into a completion tree: the parent's
    /// counter is incremented and decremented again when this job
    /// finishes, so waiting on the parent waits on the whole tree. Pass
    /// [`JobHandle::INVALID`] for a root job. The parent must still be
    /// live (typically it is the currently executing job).
    ///
    /// The payload is copied into the job record's 64-byte inline buffer.
    ///
    /// # Errors
    ///
    /// [`JobError::PoolExhausted`] or [`JobError::PayloadTooLarge`].
    pub fn create_job(
        &self,
        task: JobFn,
        parent: JobHandle,
        payload: &[u8],
    ) -> JobResult<JobHandle> {
        if payload.len() > JOB_PAYLOAD_BYTES {
            return Err(JobError::PayloadTooLarge {
                len: payload.len(),
                max: JOB_PAYLOAD_BYTES,
            });
        }

        let index = self.alloc_slot()?;
        let job = &self.jobs[index as usize];

        let generation = job.generation.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        job.unfinished.store(1, Ordering::Relaxed);
        job.waiters.store(ptr::null_mut(), Ordering::Relaxed);

        let parent = if !parent.is_invalid() && !self.is_complete(parent) {
            self.jobs[parent.index as usize]
                .unfinished
                .fetch_add(1, Ordering::AcqRel);
            parent
        } else {
            JobHandle::INVALID
        };

        // Exclusive: the slot came off the free list and the handle has
        // not been published yet.
        unsafe {
            let record = &mut *job.record.get();
            record.task = Some(task);
            record.parent = parent;
            record.index = index;
            record.payload_len = payload.len() as u8;
            record.payload[..payload.len()].copy_from_slice(payload);
        }

        Ok(JobHandle::new(index, generation))
    }

    /// Queues a job at normal priority.
    ///
    /// From a worker the job goes onto the worker's own deque; from any
    /// other thread it goes through the shared injector.
    pub fn run(&self, handle: JobHandle) {
        self.dispatch(handle, false);
    }

    /// Queues a job at high priority. High deques are drained before
    /// normal ones in both local pop and steal paths.
    pub fn run_high(&self, handle: JobHandle) {
        self.dispatch(handle, true);
    }

    fn dispatch(&self, handle: JobHandle, high: bool) {
        let slot = worker::current_worker_slot();
        if slot == 0 {
            // Bounded by the pool: at most MAX_JOBS handles are in flight.
            self.injector_tx
                .try_send(handle)
                .expect("injector sized to the job pool");
        } else {
            let shared = &self.workers[slot - 1];
            if high {
                shared.high.push_bottom(handle);
            } else {
                shared.normal.push_bottom(handle);
            }
        }
        self.semaphore.post();
    }

    /// Returns whether a handle's job has completed (or the handle is
    /// stale, which means the job completed and its slot moved on).
    #[must_use]
    pub fn is_complete(&self, handle: JobHandle) -> bool {
        if handle.is_invalid() {
            return true;
        }
        let job = &self.jobs[handle.index as usize];
        job.generation.load(Ordering::Acquire) != handle.generation
            || job.unfinished.load(Ordering::Acquire) == 0
    }

    /// Blocks until the job completes.
    ///
    /// On a non-worker thread this spin-yields. Inside a job on a worker,
    /// the current fiber suspends onto the scheduler and is resumed by the
    /// completion; the worker keeps executing other jobs meanwhile.
    pub fn wait(&self, handle: JobHandle) {
        if self.is_complete(handle) {
            return;
        }

        let slot = worker::current_worker_slot();
        let current = worker::current_fiber();
        let scheduler = worker::scheduler_fiber();

        if slot == 0 || current == scheduler {
            // Driver thread, or the scheduler fiber itself.
            while !self.is_complete(handle) {
                std::thread::yield_now();
            }
            return;
        }

        worker::set_pending_wait(handle, current);
        unsafe { crate::fiber::switch(current, scheduler) };
        debug_assert!(self.is_complete(handle));
    }

    /// Runs the job's task on the calling thread, then finishes it.
    ///
    /// A stale handle (the slot's generation moved on) is a silent no-op.
    pub fn execute_job(&self, handle: JobHandle) {
        let job = &self.jobs[handle.index as usize];
        // Stale either way: the slot moved on to a new generation, or it
        // already completed and sits on the free list.
        if job.generation.load(Ordering::Acquire) != handle.generation
            || job.unfinished.load(Ordering::Acquire) == 0
        {
            return;
        }

        // The record is stable: the job cannot complete or be recycled
        // before its own finish below.
        let task = unsafe { (*job.record.get()).task };
        if let Some(task) = task {
            task(self, job);
        }
        self.finish_job(handle);
    }

    /// Decrements a job's unfinished counter; at zero, wakes waiters,
    /// propagates to the parent and recycles the slot.
    pub(crate) fn finish_job(&self, handle: JobHandle) {
        let job = &self.jobs[handle.index as usize];
        let previous = job.unfinished.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "unfinished underflow");
        if previous != 1 {
            return;
        }

        let mut cursor = job.waiters.swap(ptr::null_mut(), Ordering::AcqRel);
        while !cursor.is_null() {
            let node = unsafe { Box::from_raw(cursor) };
            cursor = node.next;
            self.make_ready(node.fiber);
        }

        let parent = unsafe { (*job.record.get()).parent };
        if !parent.is_invalid() {
            self.finish_job(parent);
        }

        self.free_slot(handle.index);
    }

    // =========================================================================
    // Waiter plumbing (called from the worker scheduler)
    // =========================================================================

    /// Registers `fiber` to be resumed when `handle` completes.
    ///
    /// Returns `false` if the job was already complete and no registration
    /// happened — the caller still owns the fiber's resume. Returns `true`
    /// once the resume is owned by the completion path (including the race
    /// where completion lands mid-registration; the list is drained here
    /// in that case).
    pub(crate) fn register_waiter(&self, handle: JobHandle, fiber: *mut Fiber) -> bool {
        let job = &self.jobs[handle.index as usize];
        let node = Box::into_raw(Box::new(WaiterNode {
            fiber,
            next: ptr::null_mut(),
        }));

        loop {
            if self.is_complete(handle) {
                drop(unsafe { Box::from_raw(node) });
                return false;
            }
            let head = job.waiters.load(Ordering::Acquire);
            unsafe { (*node).next = head };
            if job
                .waiters
                .compare_exchange(head, node, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break;
            }
        }

        // The push may have raced the finisher's drain; if the job is
        // complete now, drain whatever list remains ourselves. Whichever
        // side's swap wins resumes the fibers; the other sees null.
        if self.is_complete(handle) {
            let mut cursor = job.waiters.swap(ptr::null_mut(), Ordering::AcqRel);
            while !cursor.is_null() {
                let drained = unsafe { Box::from_raw(cursor) };
                cursor = drained.next;
                self.make_ready(drained.fiber);
            }
        }
        true
    }

    /// Queues a fiber for resumption on the current worker, or on worker 0
    /// (with a wake) when called from a non-worker thread.
    pub(crate) fn make_ready(&self, fiber: *mut Fiber) {
        let slot = worker::current_worker_slot();
        let target = if slot == 0 { 0 } else { slot - 1 };
        self.workers[target]
            .ready_tx
            .send(ReadyFiber(fiber))
            .expect("ready queue sized to the job pool");
        if slot == 0 {
            self.semaphore.post();
        }
    }

    // =========================================================================
    // Worker support
    // =========================================================================

    pub(crate) fn worker_shared(&self, index: usize) -> &WorkerShared {
        &self.workers[index]
    }

    pub(crate) fn take_injected(&self) -> Option<JobHandle> {
        self.injector_rx.try_recv().ok()
    }

    pub(crate) fn park_idle(&self, timeout: Duration) {
        self.semaphore.wait_timeout(timeout);
    }

    pub(crate) fn should_terminate(&self) -> bool {
        self.terminate.load(Ordering::Acquire)
    }

    // =========================================================================
    // Free list
    // =========================================================================

    fn alloc_slot(&self) -> JobResult<u32> {
        let mut head = self.free_head.load(Ordering::Acquire);
        loop {
            if head == FREE_LIST_END {
                return Err(JobError::PoolExhausted { capacity: MAX_JOBS });
            }
            let next = self.free_next[head as usize].load(Ordering::Relaxed);
            match self.free_head.compare_exchange_weak(
                head,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(head),
                Err(current) => head = current,
            }
        }
    }

    fn free_slot(&self, index: u32) {
        let mut head = self.free_head.load(Ordering::Relaxed);
        loop {
            self.free_next[index as usize].store(head, Ordering::Relaxed);
            match self.free_head.compare_exchange_weak(
                head,
                index,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(current) => head = current,
            }
        }
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Stops the workers and joins their threads. Idempotent.
    ///
    /// Outstanding queued jobs are abandoned; callers should wait on
    /// everything they care about first.
    pub fn shutdown(&self) {
        if self.terminate.swap(true, Ordering::AcqRel) {
            return;
        }

        let threads: Vec<JoinHandle<()>> = self.threads.lock().drain(..).collect();
        for _ in 0..threads.len() {
            self.semaphore.post();
        }
        for thread in threads {
            let _ = thread.join();
        }
        tracing::info!("job system stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn noop(_: &JobSystem, _: &Job) {}

    #[test]
    fn test_create_run_wait_roundtrip() {
        let system = JobSystem::new(JobSystemConfig { workers: 2 });

        let job = system.create_job(noop, JobHandle::INVALID, &[]).unwrap();
        assert!(!system.is_complete(job));

        system.run(job);
        system.wait(job);
        assert!(system.is_complete(job));

        system.shutdown();
    }

    #[test]
    fn test_payload_limit() {
        let system = JobSystem::new(JobSystemConfig { workers: 1 });
        let oversized = [0u8; JOB_PAYLOAD_BYTES + 1];
        assert_eq!(
            system.create_job(noop, JobHandle::INVALID, &oversized),
            Err(JobError::PayloadTooLarge {
                len: JOB_PAYLOAD_BYTES + 1,
                max: JOB_PAYLOAD_BYTES,
            })
        );
        system.shutdown();
    }

    #[test]
    fn test_stale_handle_execution_is_noop() {
        static RUNS: AtomicUsize = AtomicUsize::new(0);
        fn counted(_: &JobSystem, _: &Job) {
            RUNS.fetch_add(1, Ordering::SeqCst);
        }

        let system = JobSystem::new(JobSystemConfig { workers: 1 });

        let job = system.create_job(counted, JobHandle::INVALID, &[]).unwrap();
        system.run(job);
        system.wait(job);
        assert_eq!(RUNS.load(Ordering::SeqCst), 1);

        // The job completed; replaying its handle must not run anything,
        // whether or not the slot has been reallocated yet.
        system.execute_job(job);
        assert_eq!(RUNS.load(Ordering::SeqCst), 1);

        system.shutdown();
    }

    #[test]
    fn test_pool_exhaustion_and_refill() {
        let system = JobSystem::new(JobSystemConfig { workers: 1 });
        let mut handles = Vec::with_capacity(MAX_JOBS);
        for _ in 0..MAX_JOBS {
            handles.push(system.create_job(noop, JobHandle::INVALID, &[]).unwrap());
        }
        assert_eq!(
            system.create_job(noop, JobHandle::INVALID, &[]),
            Err(JobError::PoolExhausted { capacity: MAX_JOBS })
        );

        for &handle in &handles {
            system.run(handle);
        }
        for &handle in &handles {
            system.wait(handle);
        }

        let refilled = system.create_job(noop, JobHandle::INVALID, &[]).unwrap();
        system.run(refilled);
        system.wait(refilled);
        system.shutdown();
    }
}
