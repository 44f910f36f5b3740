//! # Component Observers
//!
//! Fixed-capacity registry of callbacks fired synchronously when a
//! component of a given type is added, overwritten or removed.
//!
//! Observers are plain function pointers: they never own state, and
//! everything they need is reachable through the world they receive.
//! Dispatch snapshots the matching callbacks before invoking them so a
//! callback may freely mutate the world (including registering further
//! observers, which take effect from the next notification).

use crate::error::{CoreError, CoreResult};
use crate::handle::EntityHandle;
use crate::world::World;

/// Maximum number of registered observers per world.
pub const MAX_OBSERVERS: usize = 128;

/// Which component lifecycle transition an observer fires on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObserverKind {
    /// Component attached.
    Add,
    /// Component value overwritten.
    Set,
    /// Component detached.
    Remove,
}

/// Observer callback. Runs on the thread performing the mutation.
pub type ObserverFn = fn(&mut World, EntityHandle);

#[derive(Clone, Copy)]
struct ObserverSlot {
    type_id: u64,
    kind: ObserverKind,
    callback: ObserverFn,
}

/// Registry of component observers.
pub struct ObserverList {
    slots: Vec<ObserverSlot>,
}

impl Default for ObserverList {
    fn default() -> Self {
        Self::new()
    }
}

impl ObserverList {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::with_capacity(MAX_OBSERVERS),
        }
    }

    /// Number of registered observers.
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

    /// Appends an observer for `(type_id, kind)`.
    ///
    /// # Errors
    ///
    /// [`CoreError::OutOfSpace`] when the registry is full.
    pub fn register(
        &mut self,
        type_id: u64,
        kind: ObserverKind,
        callback: ObserverFn,
    ) -> CoreResult<()> {
        if self.slots.len() == MAX_OBSERVERS {
            return Err(CoreError::OutOfSpace {
                what: "observer list",
                capacity: MAX_OBSERVERS,
            });
        }
        self.slots.push(ObserverSlot {
            type_id,
            kind,
            callback,
        });
        Ok(())
    }

    /// Copies the callbacks matching `(type_id, kind)` into `out`, in
    /// registration order. Returns how many matched.
    ///
    /// The caller invokes the snapshot itself; see
    /// [`World`](crate::world::World) mutation paths.
    pub fn matching(
        &self,
        type_id: u64,
        kind: ObserverKind,
        out: &mut [Option<ObserverFn>; MAX_OBSERVERS],
    ) -> usize {
        let mut count = 0;
        for slot in &self.slots {
            if slot.type_id == type_id && slot.kind == kind {
                out[count] = Some(slot.callback);
                count += 1;
            }
        }
        count
    }
}
