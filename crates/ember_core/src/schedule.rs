//! # System Scheduler
//!
//! Ordered list of per-frame system callbacks. Systems register with a
//! priority byte; lower orders run first, ties run in registration order.
//! There is no parallelism at this layer — systems run back to back on the
//! driver thread.

use crate::error::{CoreError, CoreResult};
use crate::world::World;

/// Maximum number of registered systems per world.
pub const MAX_SYSTEMS: usize = 64;

/// A per-frame system callback. Receives the world and the frame delta in
/// seconds.
pub type SystemFn = fn(&mut World, f32);

#[derive(Clone, Copy)]
struct SystemSlot {
    order: u8,
    run: SystemFn,
}

/// Insertion-sorted system list.
pub struct SystemScheduler {
    slots: Vec<SystemSlot>,
}

impl Default for SystemScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemScheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::with_capacity(MAX_SYSTEMS),
        }
    }

    /// Number of registered systems.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` when nothing is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Registers a system at the given order.
    ///
    /// # Errors
    ///
    /// [`CoreError::OutOfSpace`] when the scheduler is full.
    pub fn register(&mut self, run: SystemFn, order: u8) -> CoreResult<()> {
        if self.slots.len() == MAX_SYSTEMS {
            return Err(CoreError::OutOfSpace {
                what: "system scheduler",
                capacity: MAX_SYSTEMS,
            });
        }

        // Stable insertion: after every system of equal or lower order.
        let position = self
            .slots
            .iter()
            .position(|slot| slot.order > order)
            .unwrap_or(self.slots.len());
        self.slots.insert(position, SystemSlot { order, run });
        Ok(())
    }

    /// Copies the callbacks into `out` in execution order. Returns how many
    /// there are.
    ///
    /// The world invokes the snapshot itself so systems can take `&mut
    /// World`.
    pub fn snapshot(&self, out: &mut [Option<SystemFn>; MAX_SYSTEMS]) -> usize {
        for (slot, dst) in self.slots.iter().zip(out.iter_mut()) {
            *dst = Some(slot.run);
        }
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(_: &mut World, _: f32) {}
    fn b(_: &mut World, _: f32) {}
    fn c(_: &mut World, _: f32) {}

    #[test]
    fn test_orders_ascending() {
        let mut scheduler = SystemScheduler::new();
        scheduler.register(b, 2).unwrap();
        scheduler.register(a, 1).unwrap();
        scheduler.register(c, 3).unwrap();

        let mut out = [None; MAX_SYSTEMS];
        let count = scheduler.snapshot(&mut out);
        assert_eq!(count, 3);
        assert_eq!(out[0], Some(a as SystemFn));
        assert_eq!(out[1], Some(b as SystemFn));
        assert_eq!(out[2], Some(c as SystemFn));
    }

    #[test]
    fn test_equal_orders_keep_registration_order() {
        let mut scheduler = SystemScheduler::new();
        scheduler.register(a, 5).unwrap();
        scheduler.register(b, 5).unwrap();
        scheduler.register(c, 5).unwrap();

        let mut out = [None; MAX_SYSTEMS];
        scheduler.snapshot(&mut out);
        assert_eq!(out[0], Some(a as SystemFn));
        assert_eq!(out[1], Some(b as SystemFn));
        assert_eq!(out[2], Some(c as SystemFn));
    }

    #[test]
    fn test_capacity_limit() {
        let mut scheduler = SystemScheduler::new();
        for _ in 0..MAX_SYSTEMS {
            scheduler.register(a, 0).unwrap();
        }
        assert!(matches!(
            scheduler.register(a, 0),
            Err(CoreError::OutOfSpace { what: "system scheduler", .. })
        ));
    }
}
