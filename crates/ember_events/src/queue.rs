//! # Event Ring Queue
//!
//! A fixed-capacity sliding-window recorder for [`Event`] records.
//!
//! The queue is a power-of-two ring with monotonically increasing head and
//! tail cursors. When full, a push overwrites the oldest event instead of
//! blocking: consumers that fall behind see the most recent window rather
//! than stalling the producer. Overwrites are counted so pressure is
//! observable.
//!
//! Single producer, single consumer. All engine producers (platform input,
//! world lifecycle notifications) run on the driver thread; cross-thread
//! writers must serialise externally.

use crate::event::Event;

/// Default queue capacity used by the engine shell.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Bounded ring of events with overwrite-oldest semantics.
pub struct EventQueue {
    ring: Box<[Event]>,
    mask: u64,
    /// Index of the oldest undrained event. Monotone; wraps via `mask`.
    head: u64,
    /// Index one past the newest event. Monotone; wraps via `mask`.
    tail: u64,
    /// Events lost to overwrite since the last `clear`.
    overwritten: u64,
}

impl EventQueue {
    /// Creates a queue with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or not a power of two.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two() && capacity > 0,
            "event queue capacity must be a non-zero power of two"
        );

        Self {
            ring: vec![Event::default(); capacity].into_boxed_slice(),
            mask: capacity as u64 - 1,
            head: 0,
            tail: 0,
            overwritten: 0,
        }
    }

    /// Returns the ring capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.len()
    }

    /// Returns the number of undrained events.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        (self.tail - self.head) as usize
    }

    /// Returns `true` if no events are pending.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Returns how many events have been overwritten since the last
    /// [`clear`](Self::clear).
    #[inline]
    #[must_use]
    pub const fn overwritten(&self) -> u64 {
        self.overwritten
    }

    /// Appends an event.
    ///
    /// When the ring is full the oldest event is dropped by advancing the
    /// head one slot, so the queue always holds the most recent
    /// `capacity()` events in push order.
    pub fn push(&mut self, event: Event) {
        if self.len() == self.ring.len() {
            self.head += 1;
            self.overwritten += 1;
            if self.overwritten.is_power_of_two() {
                tracing::trace!(
                    overwritten = self.overwritten,
                    capacity = self.ring.len(),
                    "event queue overwriting oldest events"
                );
            }
        }

        self.ring[(self.tail & self.mask) as usize] = event;
        self.tail += 1;
    }

    /// Copies up to `dst.len()` pending events into `dst` and empties the
    /// queue.
    ///
    /// Returns the number of events written, oldest first. A drain always
    /// advances the head all the way to the tail: events beyond `dst.len()`
    /// are dropped, consistent with the sliding-window contract.
    pub fn drain_to(&mut self, dst: &mut [Event]) -> usize {
        let count = self.copy_to(dst);
        let dropped = self.len() - count;
        if dropped > 0 {
            tracing::trace!(dropped, "drain destination smaller than queue");
        }
        self.head = self.tail;
        count
    }

    /// Copies up to `dst.len()` pending events into `dst` without
    /// consuming them.
    ///
    /// Returns the number of events written, oldest first.
    pub fn copy_to(&self, dst: &mut [Event]) -> usize {
        let count = self.len().min(dst.len());
        for (i, slot) in dst.iter_mut().enumerate().take(count) {
            *slot = self.ring[((self.head + i as u64) & self.mask) as usize];
        }
        count
    }

    /// Discards all pending events and resets the overwrite counter.
    pub fn clear(&mut self) {
        self.head = self.tail;
        self.overwritten = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, IntsPayload};

    fn numbered(n: u32) -> Event {
        Event::new(EventKind::User, IntsPayload::new(n, 0, 0, 0))
    }

    fn number_of(e: &Event) -> u32 {
        e.decode::<IntsPayload>().unwrap().values[0]
    }

    #[test]
    fn test_push_drain_in_order() {
        let mut queue = EventQueue::new(8);
        for n in 0..5 {
            queue.push(numbered(n));
        }
        assert_eq!(queue.len(), 5);

        let mut out = [Event::default(); 8];
        let count = queue.drain_to(&mut out);
        assert_eq!(count, 5);
        assert!(queue.is_empty());
        for (i, event) in out.iter().take(count).enumerate() {
            assert_eq!(number_of(event), i as u32);
        }
    }

    #[test]
    fn test_overwrite_oldest() {
        // Push capacity + 4 events; the drain must yield the last
        // `capacity` in push order.
        let mut queue = EventQueue::new(8);
        for n in 0..12 {
            queue.push(numbered(n));
        }
        assert_eq!(queue.len(), 8);
        assert_eq!(queue.overwritten(), 4);

        let mut out = [Event::default(); 8];
        let count = queue.drain_to(&mut out);
        assert_eq!(count, 8);
        for (i, event) in out.iter().enumerate() {
            assert_eq!(number_of(event), 4 + i as u32);
        }
    }

    #[test]
    fn test_copy_is_a_peek() {
        let mut queue = EventQueue::new(4);
        queue.push(numbered(7));

        let mut out = [Event::default(); 4];
        assert_eq!(queue.copy_to(&mut out), 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain_to(&mut out), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_empties_even_with_small_destination() {
        let mut queue = EventQueue::new(8);
        for n in 0..6 {
            queue.push(numbered(n));
        }

        let mut out = [Event::default(); 4];
        assert_eq!(queue.drain_to(&mut out), 4);
        assert_eq!(number_of(&out[0]), 0);
        assert_eq!(number_of(&out[3]), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_clear_resets_pressure_counter() {
        let mut queue = EventQueue::new(2);
        for n in 0..5 {
            queue.push(numbered(n));
        }
        assert_eq!(queue.overwritten(), 3);

        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.overwritten(), 0);
    }
}
