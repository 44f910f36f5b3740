//! # Job Records
//!
//! A job is a fixed 128-byte record in a pre-allocated pool: the task
//! function, a parent handle for the completion tree, an atomic
//! `unfinished` counter, a generation tag and a 64-byte inline payload.
//!
//! `unfinished` starts at 1 for the job's own execution; each child
//! increments it and each completion decrements it, so a parent reaches
//! zero only after every descendant has finished. The generation advances
//! every time the slot is reallocated, which turns operations on stale
//! handles into silent no-ops.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicPtr, AtomicU32};

use crate::fiber::Fiber;
use crate::system::JobSystem;

/// Inline payload capacity of a job record, in bytes.
pub const JOB_PAYLOAD_BYTES: usize = 64;

/// Task function executed by a job. Receives the owning system (for
/// spawning children and waiting) and the job record (for its payload).
pub type JobFn = fn(&JobSystem, &Job);

/// Generation-tagged job handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JobHandle {
    /// Slot index in the job pool.
    pub index: u32,
    /// Generation tag the slot carried when the job was created.
    pub generation: u32,
}

impl JobHandle {
    /// Handle that refers to no job. Used for parentless (root) jobs.
    pub const INVALID: Self = Self {
        index: u32::MAX,
        generation: u32::MAX,
    };

    /// Builds a handle.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns `true` for the invalid sentinel.
    #[inline]
    #[must_use]
    pub const fn is_invalid(self) -> bool {
        self.index == u32::MAX
    }

    /// The packed integer form handed across the script boundary:
    /// `(generation << 32) | index`.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    /// Rebuilds a handle from its packed form.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

/// Node in a job's lock-free waiter list. Holds the fiber to resume when
/// the job completes.
pub(crate) struct WaiterNode {
    pub(crate) fiber: *mut Fiber,
    pub(crate) next: *mut WaiterNode,
}

/// The cold, exclusively-written part of a job record.
///
/// Written once between the free-list pop and the handle being published,
/// read by the single executor and the single finisher. Never touched
/// concurrently, which is what makes the `UnsafeCell` below sound.
pub(crate) struct JobRecord {
    pub(crate) task: Option<JobFn>,
    pub(crate) parent: JobHandle,
    pub(crate) index: u32,
    pub(crate) payload_len: u8,
    pub(crate) payload: [u8; JOB_PAYLOAD_BYTES],
}

/// A pooled job record. Exactly 128 bytes.
#[repr(C, align(128))]
pub struct Job {
    /// Remaining work: 1 for the job itself plus 1 per live child.
    pub(crate) unfinished: AtomicU32,
    /// Slot generation; bumped on every allocation.
    pub(crate) generation: AtomicU32,
    /// Head of the lock-free waiter list.
    pub(crate) waiters: AtomicPtr<WaiterNode>,
    pub(crate) record: UnsafeCell<JobRecord>,
}

// The atomics synchronise themselves; `record` is exclusive per the
// lifecycle invariant documented on `JobRecord`.
#[allow(unsafe_code)]
unsafe impl Sync for Job {}
#[allow(unsafe_code)]
unsafe impl Send for Job {}

impl Job {
    pub(crate) fn empty() -> Self {
        Self {
            unfinished: AtomicU32::new(0),
            generation: AtomicU32::new(0),
            waiters: AtomicPtr::new(std::ptr::null_mut()),
            record: UnsafeCell::new(JobRecord {
                task: None,
                parent: JobHandle::INVALID,
                index: 0,
                payload_len: 0,
                payload: [0; JOB_PAYLOAD_BYTES],
            }),
        }
    }

    /// The job's inline payload, as passed to `create_job`.
    ///
    /// Only meaningful while the task is executing; the slot is recycled
    /// after completion.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        // Exclusive access per the record lifecycle: the single executor
        // reads, and nothing writes after publication.
        #[allow(unsafe_code)]
        let record = unsafe { &*self.record.get() };
        &record.payload[..record.payload_len as usize]
    }

    /// The job's slot index.
    #[must_use]
    pub fn index(&self) -> u32 {
        #[allow(unsafe_code)]
        let record = unsafe { &*self.record.get() };
        record.index
    }

    /// This job's own handle, for parenting children spawned from inside
    /// the task.
    #[must_use]
    pub fn handle(&self) -> JobHandle {
        use std::sync::atomic::Ordering;
        JobHandle::new(self.index(), self.generation.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_record_is_exactly_128_bytes() {
        assert_eq!(core::mem::size_of::<Job>(), 128);
        assert_eq!(core::mem::align_of::<Job>(), 128);
    }

    #[test]
    fn test_handle_packing() {
        let handle = JobHandle::new(1234, 77);
        assert_eq!(JobHandle::from_bits(handle.to_bits()), handle);
        assert_eq!(handle.to_bits(), (77u64 << 32) | 1234);
        assert!(JobHandle::INVALID.is_invalid());
        assert!(!handle.is_invalid());
    }
}
