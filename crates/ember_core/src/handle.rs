//! # Entity Handles
//!
//! Entities are identified by a 32-bit packed handle:
//!
//! - Lower 24 bits: slot index into the world's arrays
//! - Upper 8 bits: generation counter for detecting stale references
//!
//! The pool recycles slot indices through a LIFO free stack and bumps the
//! slot generation on destroy, so a handle held across a destroy fails
//! validation instead of aliasing the slot's next occupant.

use crate::error::{CoreError, CoreResult};

/// Maximum addressable entity index (24-bit index space).
pub const MAX_ENTITY_INDEX: u32 = (1 << 24) - 1;

/// Generation-tagged entity handle.
///
/// Handles are opaque to callers; the packed integer form is the
/// script-facing representation (`(gen << 24) | idx`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct EntityHandle(u32);

impl EntityHandle {
    /// Builds a handle from an index and a generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u8) -> Self {
        Self(((generation as u32) << 24) | (index & MAX_ENTITY_INDEX))
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 & MAX_ENTITY_INDEX
    }

    /// Returns the generation tag.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// The packed integer form handed across the script boundary.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u32 {
        self.0
    }

    /// Rebuilds a handle from its packed form.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }
}

/// Generation-tagged slot allocator.
///
/// All storage is pre-allocated: a `gens` byte per slot, an `alive` flag
/// per slot and a free stack primed with every index. Create and destroy
/// are O(1).
pub struct HandlePool {
    gens: Box<[u8]>,
    alive: Box<[bool]>,
    free: Vec<u32>,
    alive_count: usize,
}

impl HandlePool {
    /// Creates a pool with `capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or exceeds the 24-bit index space.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than zero");
        assert!(
            capacity <= MAX_ENTITY_INDEX as usize + 1,
            "capacity cannot exceed the 24-bit index space"
        );

        Self {
            gens: vec![0u8; capacity].into_boxed_slice(),
            alive: vec![false; capacity].into_boxed_slice(),
            // Stack, so low indices are handed out first.
            free: (0..capacity as u32).rev().collect(),
            alive_count: 0,
        }
    }

    /// Returns the pool capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.gens.len()
    }

    /// Returns the number of live slots.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Allocates a slot.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OutOfSpace`] when every slot is live.
    pub fn create(&mut self) -> CoreResult<EntityHandle> {
        let index = self.free.pop().ok_or(CoreError::OutOfSpace {
            what: "entity pool",
            capacity: self.gens.len(),
        })?;

        self.alive[index as usize] = true;
        self.alive_count += 1;
        Ok(EntityHandle::new(index, self.gens[index as usize]))
    }

    /// Releases a slot and invalidates every outstanding handle to it.
    ///
    /// The generation wraps at 256; callers must not hold a handle across
    /// 256 destroys of the same slot.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidHandle`] if the handle is stale or dead.
    pub fn destroy(&mut self, handle: EntityHandle) -> CoreResult<()> {
        if !self.is_valid(handle) {
            return Err(CoreError::InvalidHandle);
        }

        let idx = handle.index() as usize;
        self.gens[idx] = self.gens[idx].wrapping_add(1);
        self.alive[idx] = false;
        self.alive_count -= 1;
        self.free.push(handle.index());
        Ok(())
    }

    /// A handle is valid iff its slot is alive and the stored generation
    /// matches the handle generation.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, handle: EntityHandle) -> bool {
        let idx = handle.index() as usize;
        idx < self.gens.len() && self.alive[idx] && self.gens[idx] == handle.generation()
    }

    /// Builds a handle for a slot index at its current generation.
    ///
    /// Used by iteration paths that walk raw indices (hierarchy children,
    /// sparse-set dense arrays). The result is only valid if the slot is
    /// alive.
    #[inline]
    #[must_use]
    pub fn handle_from_index(&self, index: u32) -> EntityHandle {
        EntityHandle::new(index, self.gens[index as usize])
    }
}
