//! # Core Error Types
//!
//! All errors surfaced by the world and its storages.

use thiserror::Error;

/// Errors returned by world and storage operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A fixed-capacity structure is saturated.
    #[error("{what} full: capacity {capacity}")]
    OutOfSpace {
        /// Which structure saturated.
        what: &'static str,
        /// Its configured capacity.
        capacity: usize,
    },

    /// An entity handle does not match the current generation of its slot.
    #[error("stale or dead entity handle")]
    InvalidHandle,

    /// `add` was called for a component the entity already has.
    #[error("entity already has component {name}")]
    ComponentExists {
        /// Component type name.
        name: &'static str,
    },

    /// `set`/`get` was called for a component the entity does not have.
    #[error("entity has no component {name}")]
    ComponentMissing {
        /// Component type name.
        name: &'static str,
    },

    /// Two distinct component types hashed to the same type id.
    #[error("component type id collision: {name} vs {existing}")]
    TypeIdCollision {
        /// The type being registered.
        name: &'static str,
        /// The type already occupying the id.
        existing: &'static str,
    },
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
