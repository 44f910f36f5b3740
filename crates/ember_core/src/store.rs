//! # Type-Erased Component Registry
//!
//! Maps 64-bit component type ids to their sparse-set storages through a
//! fixed-size open-addressed table. Each occupied slot carries the storage
//! behind the [`ComponentColumn`] vtable, so the deferred command flush can
//! apply add/set/remove operations from raw staged bytes without knowing
//! the concrete type.
//!
//! Probing is linear from `id & (table_len - 1)`. Type ids are FNV-1a
//! hashes of the component name; a collision between two distinct names is
//! a precondition failure and is detected by comparing the stored name on
//! probe rather than silently aliasing the storages.

use std::any::Any;

use crate::component::Component;
use crate::error::{CoreError, CoreResult};
use crate::sparse::SparseSet;

/// Maximum number of distinct component types per world. Power of two.
pub const MAX_COMPONENT_TYPES: usize = 256;

/// Bytewise interface over one component type's storage.
///
/// The typed entry points live on [`SparseSet`]; this trait is what the
/// command flush path sees.
pub trait ComponentColumn: Any {
    /// Whether entity index `idx` carries the component.
    fn has(&self, idx: u32) -> bool;

    /// Attaches the component from its byte representation.
    ///
    /// # Errors
    ///
    /// [`CoreError::ComponentExists`] if already present.
    fn add_bytes(&mut self, idx: u32, bytes: &[u8]) -> CoreResult<()>;

    /// Overwrites the component from its byte representation.
    ///
    /// # Errors
    ///
    /// [`CoreError::ComponentMissing`] if not present.
    fn set_bytes(&mut self, idx: u32, bytes: &[u8]) -> CoreResult<()>;

    /// Detaches the component. Missing is a silent no-op; returns whether
    /// anything was removed.
    fn remove(&mut self, idx: u32) -> bool;

    /// Upcast for typed downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for typed downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ComponentColumn for SparseSet<T> {
    fn has(&self, idx: u32) -> bool {
        SparseSet::has(self, idx)
    }

    fn add_bytes(&mut self, idx: u32, bytes: &[u8]) -> CoreResult<()> {
        self.add(idx, bytemuck::pod_read_unaligned(bytes))
    }

    fn set_bytes(&mut self, idx: u32, bytes: &[u8]) -> CoreResult<()> {
        self.set(idx, bytemuck::pod_read_unaligned(bytes))
    }

    fn remove(&mut self, idx: u32) -> bool {
        SparseSet::remove(self, idx)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct MapSlot {
    type_id: u64,
    name: &'static str,
    column: Box<dyn ComponentColumn>,
}

/// Open-addressed registry of component storages.
pub struct ComponentStore {
    slots: Box<[Option<MapSlot>]>,
    len: usize,
    /// Entity capacity handed to each new storage.
    entity_capacity: usize,
}

impl ComponentStore {
    /// Creates an empty registry whose storages will hold
    /// `entity_capacity` slots each.
    #[must_use]
    pub fn new(entity_capacity: usize) -> Self {
        let slots: Vec<Option<MapSlot>> = (0..MAX_COMPONENT_TYPES).map(|_| None).collect();
        Self {
            slots: slots.into_boxed_slice(),
            len: 0,
            entity_capacity,
        }
    }

    /// Number of registered component types.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when no type is registered.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Probe position of `type_id`, if registered.
    fn probe(&self, type_id: u64) -> Option<usize> {
        let mask = MAX_COMPONENT_TYPES - 1;
        let mut pos = type_id as usize & mask;
        for _ in 0..MAX_COMPONENT_TYPES {
            match &self.slots[pos] {
                Some(slot) if slot.type_id == type_id => return Some(pos),
                Some(_) => pos = (pos + 1) & mask,
                None => return None,
            }
        }
        None
    }

    /// Probe position of `T`'s id, installing its storage on first use.
    ///
    /// # Errors
    ///
    /// [`CoreError::OutOfSpace`] when the table is full, or
    /// [`CoreError::TypeIdCollision`] when a different name already owns
    /// `T`'s id.
    fn ensure_position<T: Component>(&mut self) -> CoreResult<usize> {
        let type_id = T::type_id();
        let mask = MAX_COMPONENT_TYPES - 1;
        let mut pos = type_id as usize & mask;

        for _ in 0..MAX_COMPONENT_TYPES {
            match &self.slots[pos] {
                Some(slot) if slot.type_id == type_id => {
                    if slot.name != T::NAME {
                        return Err(CoreError::TypeIdCollision {
                            name: T::NAME,
                            existing: slot.name,
                        });
                    }
                    return Ok(pos);
                }
                Some(_) => pos = (pos + 1) & mask,
                None => {
                    self.slots[pos] = Some(MapSlot {
                        type_id,
                        name: T::NAME,
                        column: Box::new(SparseSet::<T>::new(self.entity_capacity)),
                    });
                    self.len += 1;
                    return Ok(pos);
                }
            }
        }

        Err(CoreError::OutOfSpace {
            what: "component store",
            capacity: MAX_COMPONENT_TYPES,
        })
    }

    /// Ensures storage for `T` exists, installing it on first use.
    ///
    /// # Errors
    ///
    /// See [`storage_or_install`](Self::storage_or_install).
    pub fn ensure_storage<T: Component>(&mut self) -> CoreResult<()> {
        self.ensure_position::<T>().map(|_| ())
    }

    /// Typed storage for `T`, installing it on first use.
    ///
    /// # Errors
    ///
    /// [`CoreError::OutOfSpace`] when the table is full, or
    /// [`CoreError::TypeIdCollision`] when a different name already owns
    /// `T`'s id.
    pub fn storage_or_install<T: Component>(&mut self) -> CoreResult<&mut SparseSet<T>> {
        let pos = self.ensure_position::<T>()?;
        self.slots[pos]
            .as_mut()
            .and_then(|slot| slot.column.as_any_mut().downcast_mut())
            .ok_or(CoreError::ComponentMissing { name: T::NAME })
    }

    /// Typed storage for `T`, if registered.
    #[must_use]
    pub fn storage<T: Component>(&self) -> Option<&SparseSet<T>> {
        let pos = self.probe(T::type_id())?;
        self.slots[pos]
            .as_ref()
            .and_then(|slot| slot.column.as_any().downcast_ref())
    }

    /// Mutable typed storage for `T`, if registered.
    #[must_use]
    pub fn storage_mut<T: Component>(&mut self) -> Option<&mut SparseSet<T>> {
        let pos = self.probe(T::type_id())?;
        self.slots[pos]
            .as_mut()
            .and_then(|slot| slot.column.as_any_mut().downcast_mut())
    }

    /// Bytewise storage for a raw type id, if registered. This is the
    /// command-flush entry point.
    #[must_use]
    pub fn column_mut(&mut self, type_id: u64) -> Option<&mut dyn ComponentColumn> {
        let pos = self.probe(type_id)?;
        self.slots[pos]
            .as_mut()
            .map(|slot| slot.column.as_mut() as &mut dyn ComponentColumn)
    }

    /// Bytewise storage for a raw type id, if registered.
    #[must_use]
    pub fn column(&self, type_id: u64) -> Option<&dyn ComponentColumn> {
        let pos = self.probe(type_id)?;
        self.slots[pos]
            .as_ref()
            .map(|slot| slot.column.as_ref() as &dyn ComponentColumn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Position {
        x: f32,
        y: f32,
    }

    impl Component for Position {
        const NAME: &'static str = "Position";
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Velocity {
        x: f32,
        y: f32,
    }

    impl Component for Velocity {
        const NAME: &'static str = "Velocity";
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let mut store = ComponentStore::new(64);
        store.ensure_storage::<Position>().unwrap();
        store.ensure_storage::<Position>().unwrap();
        assert_eq!(store.len(), 1);

        store.ensure_storage::<Velocity>().unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_typed_access_roundtrip() {
        let mut store = ComponentStore::new(64);
        store.ensure_storage::<Position>().unwrap();

        store
            .storage_mut::<Position>()
            .unwrap()
            .add(7, Position { x: 1.0, y: 2.0 })
            .unwrap();

        let set = store.storage::<Position>().unwrap();
        assert_eq!(*set.get(7).unwrap(), Position { x: 1.0, y: 2.0 });
        assert!(store.storage::<Velocity>().is_none());
    }

    #[test]
    fn test_bytewise_path_matches_typed_path() {
        let mut store = ComponentStore::new(64);
        store.ensure_storage::<Position>().unwrap();

        let value = Position { x: 3.0, y: 4.0 };
        let column = store.column_mut(<Position as crate::component::Component>::type_id()).unwrap();
        column.add_bytes(2, bytemuck::bytes_of(&value)).unwrap();
        assert!(column.has(2));
        assert_eq!(
            column.add_bytes(2, bytemuck::bytes_of(&value)),
            Err(CoreError::ComponentExists { name: "Position" })
        );

        let newer = Position { x: 5.0, y: 6.0 };
        let column = store.column_mut(<Position as crate::component::Component>::type_id()).unwrap();
        column.set_bytes(2, bytemuck::bytes_of(&newer)).unwrap();

        assert_eq!(
            *store.storage::<Position>().unwrap().get(2).unwrap(),
            newer
        );

        let column = store.column_mut(<Position as crate::component::Component>::type_id()).unwrap();
        assert!(column.remove(2));
        assert!(!column.remove(2));
    }

    #[test]
    fn test_unknown_type_id() {
        let store = ComponentStore::new(16);
        assert!(store.column(0xDEAD_BEEF).is_none());
    }
}
