//! # Job System Error Types

use thiserror::Error;

/// Errors returned by job creation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobError {
    /// Every job record is in flight.
    #[error("job pool exhausted: capacity {capacity}")]
    PoolExhausted {
        /// Pool capacity.
        capacity: usize,
    },

    /// The inline payload does not fit a job record.
    #[error("job payload of {len} bytes exceeds the {max} byte inline buffer")]
    PayloadTooLarge {
        /// Offending payload length.
        len: usize,
        /// Inline capacity.
        max: usize,
    },
}

/// Result type for job operations.
pub type JobResult<T> = Result<T, JobError>;
