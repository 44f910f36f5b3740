//! # Chase–Lev Work-Stealing Deque
//!
//! Per-worker deque of packed job handles. The owning worker pushes and
//! pops at the bottom (LIFO, cache-friendly for nested spawn/await);
//! thieves take from the top (FIFO, spreading the oldest work).
//!
//! The ring stores handles packed to `u64`, so every cell is a plain
//! atomic and the structure needs no interior-mutability tricks. Cells are
//! only read when the top/bottom indices say they are populated.
//!
//! Orderings: `push_bottom` publishes with a release store of `bottom`;
//! `pop_bottom` reserves the slot with a plain store followed by a seq-cst
//! fence before reading `top`; the last-element race and every steal are
//! decided by a seq-cst CAS on `top`. With a single owner and any number
//! of thieves, each pushed handle is returned by exactly one successful
//! `pop_bottom` or `steal`.

use std::sync::atomic::{fence, AtomicI64, AtomicU64, Ordering};

use crate::job::JobHandle;

/// Fixed-capacity work-stealing deque.
pub struct ChaseLevDeque {
    ring: Box<[AtomicU64]>,
    mask: i64,
    /// Thief end. Monotone; never decremented.
    top: AtomicI64,
    /// Owner end. Only the owner stores here.
    bottom: AtomicI64,
}

impl ChaseLevDeque {
    /// Creates a deque with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or not a power of two.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two() && capacity > 0,
            "deque capacity must be a non-zero power of two"
        );

        Self {
            ring: (0..capacity).map(|_| AtomicU64::new(0)).collect(),
            mask: capacity as i64 - 1,
            top: AtomicI64::new(0),
            bottom: AtomicI64::new(0),
        }
    }

    /// Ring capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.len()
    }

    /// Approximate number of queued handles. Exact only for the owner.
    #[must_use]
    pub fn len(&self) -> usize {
        let bottom = self.bottom.load(Ordering::Relaxed);
        let top = self.top.load(Ordering::Relaxed);
        usize::try_from(bottom - top).unwrap_or(0)
    }

    /// Returns `true` when the deque looks empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pushes a handle at the owner end. Owner thread only.
    ///
    /// # Panics
    ///
    /// Panics on overflow; the pool bounds in-flight jobs, so a correctly
    /// sized deque cannot overflow.
    pub fn push_bottom(&self, handle: JobHandle) {
        let bottom = self.bottom.load(Ordering::Relaxed);
        let top = self.top.load(Ordering::Acquire);
        assert!(
            bottom - top < self.ring.len() as i64,
            "work-stealing deque overflow"
        );

        self.ring[(bottom & self.mask) as usize].store(handle.to_bits(), Ordering::Relaxed);
        self.bottom.store(bottom + 1, Ordering::Release);
    }

    /// Pops a handle at the owner end. Owner thread only.
    pub fn pop_bottom(&self) -> Option<JobHandle> {
        let bottom = self.bottom.load(Ordering::Relaxed) - 1;
        self.bottom.store(bottom, Ordering::Relaxed);
        fence(Ordering::SeqCst);
        let top = self.top.load(Ordering::Acquire);

        if top > bottom {
            // Already empty; restore.
            self.bottom.store(bottom + 1, Ordering::Relaxed);
            return None;
        }

        let bits = self.ring[(bottom & self.mask) as usize].load(Ordering::Relaxed);
        if top == bottom {
            // Last element: race the thieves for it.
            let won = self
                .top
                .compare_exchange(top, top + 1, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok();
            self.bottom.store(bottom + 1, Ordering::Relaxed);
            return won.then(|| JobHandle::from_bits(bits));
        }

        Some(JobHandle::from_bits(bits))
    }

    /// Steals a handle from the thief end. Any thread.
    ///
    /// Returns `None` when the deque is empty or the steal lost a race.
    pub fn steal(&self) -> Option<JobHandle> {
        let top = self.top.load(Ordering::Acquire);
        fence(Ordering::SeqCst);
        let bottom = self.bottom.load(Ordering::Acquire);

        if top >= bottom {
            return None;
        }

        let bits = self.ring[(top & self.mask) as usize].load(Ordering::Relaxed);
        self.top
            .compare_exchange(top, top + 1, Ordering::SeqCst, Ordering::Relaxed)
            .ok()
            .map(|_| JobHandle::from_bits(bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn handle(n: u32) -> JobHandle {
        JobHandle::new(n, 1)
    }

    #[test]
    fn test_lifo_for_owner() {
        let deque = ChaseLevDeque::new(64);
        for n in 0..4 {
            deque.push_bottom(handle(n));
        }

        for n in (0..4).rev() {
            assert_eq!(deque.pop_bottom(), Some(handle(n)));
        }
        assert_eq!(deque.pop_bottom(), None);
    }

    #[test]
    fn test_fifo_for_thieves() {
        let deque = ChaseLevDeque::new(64);
        for n in 0..4 {
            deque.push_bottom(handle(n));
        }

        for n in 0..4 {
            assert_eq!(deque.steal(), Some(handle(n)));
        }
        assert_eq!(deque.steal(), None);
    }

    #[test]
    fn test_owner_and_thief_split_the_last_element() {
        let deque = ChaseLevDeque::new(8);
        deque.push_bottom(handle(9));

        assert_eq!(deque.steal(), Some(handle(9)));
        assert_eq!(deque.pop_bottom(), None);
        assert!(deque.is_empty());
    }

    #[test]
    fn test_concurrent_drain_yields_pushed_multiset() {
        // Linearisability check: owner pushes 1000 handles while two
        // thieves and the owner drain concurrently; the union of returns
        // equals the pushed set, with no duplicates.
        const TOTAL: u32 = 1000;

        let deque = Arc::new(ChaseLevDeque::new(1024));
        let mut thieves = Vec::new();

        for _ in 0..2 {
            let deque = Arc::clone(&deque);
            thieves.push(std::thread::spawn(move || {
                let mut got = Vec::new();
                let mut misses = 0u32;
                while misses < 10_000 {
                    match deque.steal() {
                        Some(h) => {
                            got.push(h.index);
                            misses = 0;
                        }
                        None => misses += 1,
                    }
                }
                got
            }));
        }

        let mut owner_got = Vec::new();
        for n in 0..TOTAL {
            deque.push_bottom(handle(n));
            if n % 3 == 0 {
                if let Some(h) = deque.pop_bottom() {
                    owner_got.push(h.index);
                }
            }
        }
        while let Some(h) = deque.pop_bottom() {
            owner_got.push(h.index);
        }

        let mut seen: Vec<u32> = owner_got;
        for thief in thieves {
            seen.extend(thief.join().unwrap());
        }

        let unique: HashSet<u32> = seen.iter().copied().collect();
        assert_eq!(seen.len(), unique.len(), "duplicate handle returned");
        assert_eq!(unique.len(), TOTAL as usize);
        assert!(unique.iter().all(|&n| n < TOTAL));
    }
}
