//! # Event Listener Registry
//!
//! A fixed-capacity slot table mapping event kinds to callbacks. Script
//! bindings and engine subsystems register here; the driver drains the
//! event queue into the registry once per frame.

use crate::event::Event;
use crate::queue::EventQueue;

/// Callback invoked for each matching event.
pub type ListenerFn = Box<dyn FnMut(&Event)>;

/// Identifies a registered listener so it can be removed later.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListenerId(u32);

struct ListenerSlot {
    /// Raw event id this listener matches.
    id: u16,
    callback: ListenerFn,
    active: bool,
}

/// Fixed-capacity listener table with linear dispatch.
///
/// Dispatch walks every slot and invokes the active ones whose id matches,
/// in registration order. The table is small by design; linear scan beats a
/// map for the handful of listeners an engine frame carries.
pub struct EventListeners {
    slots: Vec<ListenerSlot>,
    capacity: usize,
}

impl EventListeners {
    /// Creates a registry holding at most `capacity` listeners.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Number of registered (live or unregistered) slots.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.active).count()
    }

    /// Returns `true` when no listener is active.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers a callback for a raw event id.
    ///
    /// Returns `None` when the table is full. Freed slots are reused.
    pub fn register(&mut self, id: u16, callback: ListenerFn) -> Option<ListenerId> {
        if let Some(index) = self.slots.iter().position(|s| !s.active) {
            self.slots[index] = ListenerSlot {
                id,
                callback,
                active: true,
            };
            return Some(ListenerId(index as u32));
        }

        if self.slots.len() == self.capacity {
            tracing::warn!(capacity = self.capacity, "listener table full");
            return None;
        }

        self.slots.push(ListenerSlot {
            id,
            callback,
            active: true,
        });
        Some(ListenerId(self.slots.len() as u32 - 1))
    }

    /// Deactivates a listener. Unknown ids are ignored.
    pub fn unregister(&mut self, listener: ListenerId) {
        if let Some(slot) = self.slots.get_mut(listener.0 as usize) {
            slot.active = false;
        }
    }

    /// Invokes every active listener matching the event's id, in
    /// registration order.
    pub fn dispatch(&mut self, event: &Event) {
        for slot in &mut self.slots {
            if slot.active && slot.id == event.id {
                (slot.callback)(event);
            }
        }
    }

    /// Drains `queue` and dispatches every event. Called once per frame by
    /// the driver.
    ///
    /// Returns the number of events dispatched.
    pub fn drain_and_dispatch(&mut self, queue: &mut EventQueue) -> usize {
        let mut batch = vec![Event::default(); queue.len()];
        let count = queue.drain_to(&mut batch);
        for event in &batch[..count] {
            self.dispatch(event);
        }
        count
    }
}
