//! # Ember Job System
//!
//! A fixed-pool, work-stealing, fiber-suspending task scheduler:
//!
//! - 4096 pooled 128-byte [`Job`] records with generation-tagged handles
//! - One [Chase–Lev deque](deque::ChaseLevDeque) pair (high + normal
//!   priority) per worker thread
//! - Stackful [fibers](fiber) so a job that waits on another suspends and
//!   its worker keeps executing; the fiber resumes — possibly on a
//!   different worker — when the awaited completion tree drains
//! - Parent/child completion counters, so waiting on a root job waits on
//!   every transitively spawned child
//!
//! ```rust,ignore
//! let jobs = JobSystem::new(JobSystemConfig::default());
//!
//! let root = jobs.create_job(scatter_work, JobHandle::INVALID, &[])?;
//! jobs.run(root);
//! jobs.wait(root); // returns once every child has finished
//! jobs.shutdown();
//! ```
//!
//! POSIX only: the fiber layer is built on `ucontext`.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod deque;
pub mod error;
pub mod fiber;
pub mod job;
pub mod semaphore;
pub mod system;

mod worker;

pub use deque::ChaseLevDeque;
pub use error::{JobError, JobResult};
pub use fiber::{Fiber, JOB_FIBER_STACK_BYTES};
pub use job::{Job, JobFn, JobHandle, JOB_PAYLOAD_BYTES};
pub use semaphore::Semaphore;
pub use system::{JobSystem, JobSystemConfig, MAX_JOBS};
