//! # ECS World
//!
//! The façade over the entity pool, component registry, hierarchy,
//! observers, command buffer and system scheduler. One `World` is one
//! simulation; everything it owns is pre-allocated at creation.
//!
//! The world is single-threaded: all mutation happens on the driver thread
//! or inside a system it invoked. Jobs that need to mutate the world do so
//! through the deferred command buffer, which the frame flushes after the
//! last system has run.
//!
//! Every direct mutation notifies matching observers synchronously and
//! pushes a lifecycle event onto the owned [`EventQueue`]; script-facing
//! listeners drain that queue once per frame.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use ember_events::{Event, EventKind, EventQueue, IntsPayload};

use crate::command::{CommandBuffer, CommandKind};
use crate::component::Component;
use crate::error::{CoreError, CoreResult};
use crate::handle::{EntityHandle, HandlePool};
use crate::hierarchy::{Hierarchy, INVALID_INDEX};
use crate::observer::{ObserverFn, ObserverKind, ObserverList, MAX_OBSERVERS};
use crate::schedule::{SystemFn, SystemScheduler, MAX_SYSTEMS};
use crate::stats::{FrameStats, FrameStatsAccumulator};
use crate::store::ComponentStore;

/// Capacities for a world's pre-allocated structures.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Maximum live entities.
    pub entity_capacity: usize,
    /// Maximum deferred commands per frame.
    pub command_capacity: usize,
    /// Staging arena for deferred component payloads, in bytes.
    pub command_stage_bytes: usize,
    /// Event ring capacity; must be a power of two.
    pub event_queue_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            entity_capacity: 8192,
            command_capacity: 1024,
            command_stage_bytes: 64 * 1024,
            event_queue_capacity: 256,
        }
    }
}

/// The simulation world.
pub struct World {
    entities: HandlePool,
    hierarchy: Hierarchy,
    components: ComponentStore,
    observers: ObserverList,
    commands: CommandBuffer,
    systems: SystemScheduler,
    events: EventQueue,
    frame_count: u64,
    events_pushed_this_frame: u32,
    stats: FrameStatsAccumulator,
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl World {
    /// Creates a world with the given capacities.
    ///
    /// # Panics
    ///
    /// Panics if any capacity is zero or the event queue capacity is not a
    /// power of two.
    #[must_use]
    pub fn new(config: WorldConfig) -> Self {
        Self {
            entities: HandlePool::new(config.entity_capacity),
            hierarchy: Hierarchy::new(config.entity_capacity),
            components: ComponentStore::new(config.entity_capacity),
            observers: ObserverList::new(),
            commands: CommandBuffer::new(config.command_capacity, config.command_stage_bytes),
            systems: SystemScheduler::new(),
            events: EventQueue::new(config.event_queue_capacity),
            frame_count: 0,
            events_pushed_this_frame: 0,
            stats: FrameStatsAccumulator::new(),
        }
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates an entity.
    ///
    /// # Errors
    ///
    /// [`CoreError::OutOfSpace`] when the pool is exhausted.
    pub fn create(&mut self) -> CoreResult<EntityHandle> {
        self.entities.create()
    }

    /// Destroys an entity, invalidating its handle.
    ///
    /// The entity is detached from its parent first. Components are *not*
    /// removed: component membership and the entity pool are orthogonal,
    /// and the documented protocol is to issue explicit removes (directly
    /// or as deferred commands) before the destroy. Stale component rows
    /// are unreachable through the public API because every access
    /// revalidates the handle.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidHandle`] if the handle is stale or dead.
    pub fn destroy(&mut self, entity: EntityHandle) -> CoreResult<()> {
        if !self.entities.is_valid(entity) {
            return Err(CoreError::InvalidHandle);
        }
        self.hierarchy.set_root(entity.index());
        self.entities.destroy(entity)?;
        self.push_entity_event(EventKind::EntityModified, entity);
        Ok(())
    }

    /// Returns whether a handle refers to a live entity.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, entity: EntityHandle) -> bool {
        self.entities.is_valid(entity)
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.entities.alive_count()
    }

    // =========================================================================
    // Hierarchy
    // =========================================================================

    /// Reparents `child` under `parent`, or detaches it to the root set
    /// when `parent` is `None`.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidHandle`] if either handle is stale or dead.
    pub fn set_parent(
        &mut self,
        child: EntityHandle,
        parent: Option<EntityHandle>,
    ) -> CoreResult<()> {
        if !self.entities.is_valid(child) {
            return Err(CoreError::InvalidHandle);
        }

        match parent {
            Some(parent) => {
                if !self.entities.is_valid(parent) {
                    return Err(CoreError::InvalidHandle);
                }
                self.hierarchy.attach(child.index(), parent.index());
            }
            None => self.hierarchy.set_root(child.index()),
        }

        self.push_entity_event(EventKind::EntityModified, child);
        Ok(())
    }

    /// Returns the parent of `child`, if it has one.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidHandle`] if the handle is stale or dead.
    pub fn parent(&self, child: EntityHandle) -> CoreResult<Option<EntityHandle>> {
        if !self.entities.is_valid(child) {
            return Err(CoreError::InvalidHandle);
        }
        let parent = self.hierarchy.parent(child.index());
        Ok((parent != INVALID_INDEX).then(|| self.entities.handle_from_index(parent)))
    }

    /// Iterates the children of `parent`, most recently attached first.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidHandle`] if the handle is stale or dead.
    pub fn children(
        &self,
        parent: EntityHandle,
    ) -> CoreResult<impl Iterator<Item = EntityHandle> + '_> {
        if !self.entities.is_valid(parent) {
            return Err(CoreError::InvalidHandle);
        }
        Ok(self
            .hierarchy
            .children(parent.index())
            .map(|idx| self.entities.handle_from_index(idx)))
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Attaches a component to an entity.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidHandle`], [`CoreError::ComponentExists`], or a
    /// registry installation failure.
    pub fn add<T: Component>(&mut self, entity: EntityHandle, value: T) -> CoreResult<()> {
        if !self.entities.is_valid(entity) {
            return Err(CoreError::InvalidHandle);
        }
        self.components
            .storage_or_install::<T>()?
            .add(entity.index(), value)?;
        self.notify(T::type_id(), ObserverKind::Add, entity);
        self.push_component_event(EventKind::ComponentAdd, entity, T::type_id());
        Ok(())
    }

    /// Overwrites a component value in place.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidHandle`] or [`CoreError::ComponentMissing`].
    pub fn set<T: Component>(&mut self, entity: EntityHandle, value: T) -> CoreResult<()> {
        if !self.entities.is_valid(entity) {
            return Err(CoreError::InvalidHandle);
        }
        self.components
            .storage_mut::<T>()
            .ok_or(CoreError::ComponentMissing { name: T::NAME })?
            .set(entity.index(), value)?;
        self.notify(T::type_id(), ObserverKind::Set, entity);
        self.push_component_event(EventKind::ComponentSet, entity, T::type_id());
        Ok(())
    }

    /// Reads a component value.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidHandle`] or [`CoreError::ComponentMissing`].
    pub fn get<T: Component>(&self, entity: EntityHandle) -> CoreResult<&T> {
        if !self.entities.is_valid(entity) {
            return Err(CoreError::InvalidHandle);
        }
        self.components
            .storage::<T>()
            .ok_or(CoreError::ComponentMissing { name: T::NAME })?
            .get(entity.index())
    }

    /// Returns whether the entity carries `T`. Stale handles yield `false`.
    #[must_use]
    pub fn has<T: Component>(&self, entity: EntityHandle) -> bool {
        self.entities.is_valid(entity)
            && self
                .components
                .storage::<T>()
                .is_some_and(|set| set.has(entity.index()))
    }

    /// Iterates `(entity, &value)` over every entity carrying `T`.
    ///
    /// Yields nothing when `T` was never registered.
    pub fn iter<T: Component>(&self) -> impl Iterator<Item = (EntityHandle, &T)> + '_ {
        self.components
            .storage::<T>()
            .into_iter()
            .flat_map(|set| set.iter())
            .map(|(idx, value)| (self.entities.handle_from_index(idx), value))
    }

    /// Detaches a component from an entity. Removing a component the
    /// entity does not carry is a silent no-op.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidHandle`] if the handle is stale or dead.
    pub fn remove<T: Component>(&mut self, entity: EntityHandle) -> CoreResult<()> {
        if !self.entities.is_valid(entity) {
            return Err(CoreError::InvalidHandle);
        }
        let removed = self
            .components
            .storage_mut::<T>()
            .is_some_and(|set| set.remove(entity.index()));
        if removed {
            self.notify(T::type_id(), ObserverKind::Remove, entity);
            self.push_component_event(EventKind::ComponentRemove, entity, T::type_id());
        }
        Ok(())
    }

    // =========================================================================
    // Deferred commands
    // =========================================================================

    /// Defers a component add to the end of the frame.
    ///
    /// The storage for `T` is installed now (while the concrete type is
    /// known); the value is staged as raw bytes and applied through the
    /// bytewise column interface at flush time.
    ///
    /// # Errors
    ///
    /// [`CoreError::OutOfSpace`] when the command buffer or staging arena
    /// is full, or a registry installation failure.
    pub fn defer_add<T: Component>(&mut self, entity: EntityHandle, value: T) -> CoreResult<()> {
        self.components.ensure_storage::<T>()?;
        self.commands.push(
            CommandKind::Add,
            T::type_id(),
            entity,
            bytemuck::bytes_of(&value),
        )
    }

    /// Defers a component overwrite to the end of the frame.
    ///
    /// # Errors
    ///
    /// See [`defer_add`](Self::defer_add).
    pub fn defer_set<T: Component>(&mut self, entity: EntityHandle, value: T) -> CoreResult<()> {
        self.components.ensure_storage::<T>()?;
        self.commands.push(
            CommandKind::Set,
            T::type_id(),
            entity,
            bytemuck::bytes_of(&value),
        )
    }

    /// Defers a component removal to the end of the frame.
    ///
    /// # Errors
    ///
    /// [`CoreError::OutOfSpace`] when the command buffer is full.
    pub fn defer_remove<T: Component>(&mut self, entity: EntityHandle) -> CoreResult<()> {
        self.commands
            .push(CommandKind::Remove, T::type_id(), entity, &[])
    }

    /// Defers an entity destroy to the end of the frame.
    ///
    /// # Errors
    ///
    /// [`CoreError::OutOfSpace`] when the command buffer is full.
    pub fn defer_destroy(&mut self, entity: EntityHandle) -> CoreResult<()> {
        self.commands.push(CommandKind::Destroy, 0, entity, &[])
    }

    /// Number of commands waiting for the next flush.
    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    // =========================================================================
    // Observers and systems
    // =========================================================================

    /// Registers an observer for `T`'s lifecycle transitions.
    ///
    /// # Errors
    ///
    /// [`CoreError::OutOfSpace`] when the observer list is full.
    pub fn register_observer<T: Component>(
        &mut self,
        kind: ObserverKind,
        callback: ObserverFn,
    ) -> CoreResult<()> {
        self.observers.register(T::type_id(), kind, callback)
    }

    /// Registers a per-frame system. Lower orders run first.
    ///
    /// # Errors
    ///
    /// [`CoreError::OutOfSpace`] when the scheduler is full.
    pub fn register_system(&mut self, system: SystemFn, order: u8) -> CoreResult<()> {
        self.systems.register(system, order)
    }

    // =========================================================================
    // Frame
    // =========================================================================

    /// Runs one frame: every registered system in order, then the deferred
    /// command flush.
    pub fn run_frame(&mut self, dt: f32) -> FrameStats {
        let started = Instant::now();
        self.events_pushed_this_frame = 0;

        let mut systems = [None; MAX_SYSTEMS];
        let count = self.systems.snapshot(&mut systems);
        for system in systems.iter().take(count).filter_map(|s| *s) {
            system(self, dt);
        }

        let (applied, skipped) = self.flush_commands();

        let stats = FrameStats {
            frame: self.frame_count,
            systems_run: count as u32,
            commands_applied: applied,
            commands_skipped: skipped,
            events_pushed: self.events_pushed_this_frame,
            duration_us: started.elapsed().as_micros() as u64,
        };
        self.frame_count += 1;
        self.stats.record(stats);
        stats
    }

    /// Applies every pending command in push order, then clears the
    /// buffer. Returns `(applied, skipped)`.
    ///
    /// A command whose entity handle is stale at flush time is skipped:
    /// it was authored against a world snapshot that no longer holds.
    /// Add-on-existing and set-on-missing are skipped the same way.
    pub fn flush_commands(&mut self) -> (u32, u32) {
        let mut applied = 0u32;
        let mut skipped = 0u32;

        for i in 0..self.commands.len() {
            // Observers run mid-flush and hold `&mut World`; tolerate one
            // clearing the buffer under us.
            let Some(&command) = self.commands.commands().get(i) else {
                break;
            };

            if !self.entities.is_valid(command.entity) {
                skipped += 1;
                continue;
            }

            let idx = command.entity.index();
            let ok = match command.kind {
                CommandKind::Add => {
                    let payload_range = (command.stage_offset, command.stage_len);
                    self.apply_bytes(command.type_id, idx, payload_range, false)
                }
                CommandKind::Set => {
                    let payload_range = (command.stage_offset, command.stage_len);
                    self.apply_bytes(command.type_id, idx, payload_range, true)
                }
                CommandKind::Remove => self
                    .components
                    .column_mut(command.type_id)
                    .is_some_and(|column| column.remove(idx)),
                CommandKind::Destroy => {
                    self.hierarchy.set_root(idx);
                    self.entities.destroy(command.entity).is_ok()
                }
            };

            if !ok {
                skipped += 1;
                continue;
            }
            applied += 1;

            match command.kind {
                CommandKind::Add => {
                    self.notify(command.type_id, ObserverKind::Add, command.entity);
                    self.push_component_event(
                        EventKind::ComponentAdd,
                        command.entity,
                        command.type_id,
                    );
                }
                CommandKind::Set => {
                    self.notify(command.type_id, ObserverKind::Set, command.entity);
                    self.push_component_event(
                        EventKind::ComponentSet,
                        command.entity,
                        command.type_id,
                    );
                }
                CommandKind::Remove => {
                    self.notify(command.type_id, ObserverKind::Remove, command.entity);
                    self.push_component_event(
                        EventKind::ComponentRemove,
                        command.entity,
                        command.type_id,
                    );
                }
                CommandKind::Destroy => {
                    self.push_entity_event(EventKind::EntityModified, command.entity);
                }
            }
        }

        if skipped > 0 {
            tracing::trace!(skipped, "stale deferred commands dropped at flush");
        }
        self.commands.clear();
        (applied, skipped)
    }

    fn apply_bytes(
        &mut self,
        type_id: u64,
        idx: u32,
        (offset, len): (u32, u32),
        overwrite: bool,
    ) -> bool {
        let payload = self.commands.staged(offset, len);
        match self.components.column_mut(type_id) {
            Some(column) if overwrite => column.set_bytes(idx, payload).is_ok(),
            Some(column) => column.add_bytes(idx, payload).is_ok(),
            None => false,
        }
    }

    /// Total frames run so far.
    #[inline]
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Aggregate frame statistics.
    #[must_use]
    pub const fn stats(&self) -> &FrameStatsAccumulator {
        &self.stats
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// The world's event queue. The input layer pushes platform events
    /// here; listeners drain it once per frame.
    #[must_use]
    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    /// Mutable access to the event queue.
    pub fn events_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }

    fn notify(&mut self, type_id: u64, kind: ObserverKind, entity: EntityHandle) {
        let mut snapshot = [None; MAX_OBSERVERS];
        let count = self.observers.matching(type_id, kind, &mut snapshot);
        for callback in snapshot.iter().take(count).filter_map(|c| *c) {
            callback(self, entity);
        }
    }

    /// Pushes a component lifecycle event carrying
    /// `(idx, gen, lo32(type_id), hi32(type_id))`.
    fn push_component_event(&mut self, kind: EventKind, entity: EntityHandle, type_id: u64) {
        self.events.push(Event::new(
            kind,
            IntsPayload::new(
                entity.index(),
                u32::from(entity.generation()),
                type_id as u32,
                (type_id >> 32) as u32,
            ),
        ));
        self.events_pushed_this_frame += 1;
    }

    fn push_entity_event(&mut self, kind: EventKind, entity: EntityHandle) {
        self.events.push(Event::new(
            kind,
            IntsPayload::new(entity.index(), u32::from(entity.generation()), 0, 0),
        ));
        self.events_pushed_this_frame += 1;
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
    struct Tag {
        value: u32,
    }

    impl Component for Tag {
        const NAME: &'static str = "Tag";
    }

    fn small_world() -> World {
        World::new(WorldConfig {
            entity_capacity: 64,
            command_capacity: 32,
            command_stage_bytes: 512,
            event_queue_capacity: 64,
        })
    }

    #[test]
    fn test_component_lifecycle() {
        let mut world = small_world();
        let e = world.create().unwrap();

        world.add(e, Position { x: 1.0, y: 2.0 }).unwrap();
        assert_eq!(*world.get::<Position>(e).unwrap(), Position { x: 1.0, y: 2.0 });

        world.set(e, Position { x: 3.0, y: 4.0 }).unwrap();
        assert_eq!(*world.get::<Position>(e).unwrap(), Position { x: 3.0, y: 4.0 });

        world.remove::<Position>(e).unwrap();
        assert!(!world.has::<Position>(e));
        assert_eq!(
            world.get::<Position>(e),
            Err(CoreError::ComponentMissing { name: "Position" })
        );
    }

    #[test]
    fn test_stale_handle_is_rejected() {
        let mut world = small_world();
        let e = world.create().unwrap();
        world.destroy(e).unwrap();

        assert_eq!(
            world.add(e, Position::default()),
            Err(CoreError::InvalidHandle)
        );
        assert_eq!(world.get::<Position>(e), Err(CoreError::InvalidHandle));
        assert!(!world.has::<Position>(e));
    }

    #[test]
    fn test_double_add_fails() {
        let mut world = small_world();
        let e = world.create().unwrap();
        world.add(e, Tag { value: 1 }).unwrap();
        assert_eq!(
            world.add(e, Tag { value: 2 }),
            Err(CoreError::ComponentExists { name: "Tag" })
        );
    }

    #[test]
    fn test_hierarchy_through_world() {
        let mut world = small_world();
        let p = world.create().unwrap();
        let c1 = world.create().unwrap();
        let c2 = world.create().unwrap();
        let c3 = world.create().unwrap();

        for c in [c1, c2, c3] {
            world.set_parent(c, Some(p)).unwrap();
        }
        let children: Vec<_> = world.children(p).unwrap().collect();
        assert_eq!(children, vec![c3, c2, c1]);

        let p2 = world.create().unwrap();
        world.set_parent(c2, Some(p2)).unwrap();
        let children: Vec<_> = world.children(p).unwrap().collect();
        assert_eq!(children, vec![c3, c1]);
        let children: Vec<_> = world.children(p2).unwrap().collect();
        assert_eq!(children, vec![c2]);
        assert_eq!(world.parent(c2).unwrap(), Some(p2));
    }

    #[test]
    fn test_deferred_commands_apply_in_push_order() {
        let mut world = small_world();
        let e = world.create().unwrap();

        world.defer_add(e, Tag { value: 1 }).unwrap();
        world.defer_set(e, Tag { value: 2 }).unwrap();
        let (applied, skipped) = world.flush_commands();

        assert_eq!((applied, skipped), (2, 0));
        assert_eq!(world.get::<Tag>(e).unwrap().value, 2);
    }

    #[test]
    fn test_stale_commands_are_skipped() {
        let mut world = small_world();
        let e = world.create().unwrap();
        world.defer_add(e, Tag { value: 1 }).unwrap();
        world.destroy(e).unwrap();

        let (applied, skipped) = world.flush_commands();
        assert_eq!((applied, skipped), (0, 1));
    }

    #[test]
    fn test_deferred_destroy() {
        let mut world = small_world();
        let e = world.create().unwrap();
        world.defer_destroy(e).unwrap();
        assert!(world.is_valid(e));

        world.flush_commands();
        assert!(!world.is_valid(e));
    }

    #[test]
    fn test_mutations_emit_events() {
        let mut world = small_world();
        world.events_mut().clear();

        let e = world.create().unwrap();
        world.add(e, Tag { value: 7 }).unwrap();

        let mut out = [Event::default(); 8];
        let count = world.events_mut().drain_to(&mut out);
        assert_eq!(count, 1);
        assert_eq!(out[0].kind(), Some(EventKind::ComponentAdd));

        let payload: IntsPayload = out[0].decode().unwrap();
        assert_eq!(payload.values[0], e.index());
        assert_eq!(payload.values[1], u32::from(e.generation()));
        assert_eq!(payload.values[2], Tag::type_id() as u32);
        assert_eq!(payload.values[3], (Tag::type_id() >> 32) as u32);
    }
}
