//! # Worker Wake Semaphore
//!
//! Counting semaphore used to park idle workers. Posts and waits pair
//! 1:1 with units of ready work; a timed wait bounds how long a worker
//! sleeps so a wake ticket consumed by the "wrong" worker cannot strand
//! work parked on another worker's ready queue.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Counting semaphore over a mutex and condvar.
pub struct Semaphore {
    count: Mutex<usize>,
    available: Condvar,
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new()
    }
}

impl Semaphore {
    /// Creates a semaphore with zero tickets.
    #[must_use]
    pub fn new() -> Self {
        Self {
            count: Mutex::new(0),
            available: Condvar::new(),
        }
    }

    /// Adds one ticket and wakes one waiter.
    pub fn post(&self) {
        let mut count = self.count.lock();
        *count += 1;
        drop(count);
        self.available.notify_one();
    }

    /// Takes a ticket, blocking until one is available.
    pub fn wait(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.available.wait(&mut count);
        }
        *count -= 1;
    }

    /// Takes a ticket if one becomes available within `timeout`.
    ///
    /// Returns whether a ticket was taken.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut count = self.count.lock();
        if *count == 0 {
            self.available.wait_for(&mut count, timeout);
        }
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_post_then_wait_does_not_block() {
        let sem = Semaphore::new();
        sem.post();
        sem.wait();
    }

    #[test]
    fn test_wait_timeout_expires() {
        let sem = Semaphore::new();
        let started = Instant::now();
        assert!(!sem.wait_timeout(Duration::from_millis(10)));
        assert!(started.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_cross_thread_wake() {
        let sem = Arc::new(Semaphore::new());
        let waker = Arc::clone(&sem);

        let handle = std::thread::spawn(move || {
            waker.post();
        });

        assert!(sem.wait_timeout(Duration::from_secs(5)));
        handle.join().unwrap();
    }
}
