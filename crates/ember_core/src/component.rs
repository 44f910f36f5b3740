//! # Component System
//!
//! Components are pure data containers with no behavior. They must be
//! plain-data and defaultable so storage can be pre-allocated and the
//! deferred command path can marshal them as raw bytes.

use bytemuck::{Pod, Zeroable};

/// Marker trait for ECS components.
///
/// Components must be:
/// - `Pod` + `Zeroable`: bitwise copyable, safe to stage as raw bytes
/// - `Default`: storage slots are pre-filled with the default value
/// - `Send + Sync + 'static`: storable in the type-erased registry
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
/// #[repr(C)]
/// struct Position {
///     x: f32,
///     y: f32,
/// }
///
/// impl Component for Position {
///     const NAME: &'static str = "Position";
/// }
/// ```
pub trait Component: Copy + Pod + Zeroable + Default + Send + Sync + 'static {
    /// Canonical name of the component type.
    ///
    /// The 64-bit type id is the FNV-1a hash of this name; scripts refer to
    /// components by the same string. Names must be unique per world.
    const NAME: &'static str;

    /// The component's 64-bit type id.
    #[must_use]
    fn type_id() -> u64 {
        fnv1a_64(Self::NAME.as_bytes())
    }
}

/// FNV-1a 64-bit hash, the canonical component type id function.
#[must_use]
pub const fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        i += 1;
    }
    hash
}

/// FNV-1a 32-bit hash, used by script bindings to intern component name
/// strings into numeric ids.
#[must_use]
pub const fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut hash = 0x811c_9dc5u32;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u32;
        hash = hash.wrapping_mul(0x0100_0193);
        i += 1;
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Position {
        x: f32,
        y: f32,
    }

    impl Component for Position {
        const NAME: &'static str = "Position";
    }

    #[test]
    fn test_fnv1a_64_vectors() {
        // Reference values for the canonical offset basis and prime.
        assert_eq!(fnv1a_64(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a_64(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn test_fnv1a_32_vectors() {
        assert_eq!(fnv1a_32(b""), 0x811c_9dc5);
        assert_eq!(fnv1a_32(b"a"), 0xe40c_292c);
    }

    #[test]
    fn test_type_id_is_name_hash() {
        assert_eq!(Position::type_id(), fnv1a_64(b"Position"));
        assert_ne!(Position::type_id(), fnv1a_64(b"Velocity"));
    }
}
