//! # Ember ECS Core
//!
//! The entity/component world at the heart of the ember runtime:
//!
//! - Generation-tagged entity handles from a fixed [`HandlePool`]
//! - Per-type [`SparseSet`] storage behind a type-erased registry
//! - Parent/child [`Hierarchy`] links
//! - Synchronous component [`ObserverList`] notifications
//! - A deferred [`CommandBuffer`] with byte-staged payloads
//! - An ordered [`SystemScheduler`] driven by [`World::run_frame`]
//!
//! All memory is pre-allocated at world creation; steady-state frames
//! allocate nothing. The world is single-threaded by design — concurrent
//! work goes through the job system and feeds mutations back through the
//! command buffer.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod command;
pub mod component;
pub mod error;
pub mod handle;
pub mod hierarchy;
pub mod observer;
pub mod schedule;
pub mod sparse;
pub mod stats;
pub mod store;
pub mod world;

pub use command::{Command, CommandBuffer, CommandKind};
pub use component::{fnv1a_32, fnv1a_64, Component};
pub use error::{CoreError, CoreResult};
pub use handle::{EntityHandle, HandlePool, MAX_ENTITY_INDEX};
pub use hierarchy::{Hierarchy, INVALID_INDEX};
pub use observer::{ObserverFn, ObserverKind, ObserverList, MAX_OBSERVERS};
pub use schedule::{SystemFn, SystemScheduler, MAX_SYSTEMS};
pub use sparse::SparseSet;
pub use stats::{FrameStats, FrameStatsAccumulator};
pub use store::{ComponentColumn, ComponentStore, MAX_COMPONENT_TYPES};
pub use world::{World, WorldConfig};
