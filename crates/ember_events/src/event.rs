//! # Event Records
//!
//! Fixed-size event records shared between the platform input layer, the
//! ECS lifecycle notifier and the script layer.
//!
//! An event on the wire is a 2-byte kind id, a 1-byte payload size and a
//! 24-byte inline payload (27 bytes, padded to 28). Payloads are plain-data
//! records bit-copied into the inline buffer, so pushing an event never
//! allocates.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Inline payload capacity of an [`Event`], in bytes.
pub const EVENT_PAYLOAD_BYTES: usize = 24;

/// Well-known event kinds.
///
/// Kinds below [`EventKind::User`] are produced by the engine itself;
/// everything at or above `User` belongs to the embedding application.
#[repr(u16)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A key transitioned to pressed.
    KeyDown = 0,
    /// A key transitioned to released.
    KeyUp = 1,
    /// A mouse button transitioned to pressed.
    ButtonDown = 2,
    /// A mouse button transitioned to released.
    ButtonUp = 3,
    /// The mouse moved.
    MouseMove = 4,
    /// A component was added to an entity.
    ComponentAdd = 5,
    /// A component value was overwritten.
    ComponentSet = 6,
    /// A component was removed from an entity.
    ComponentRemove = 7,
    /// An entity changed in a way not covered by the component kinds
    /// (reparented, destroyed).
    EntityModified = 8,
    /// The platform requested shutdown.
    Quit = 9,
    /// First application-defined kind.
    User = 0x100,
}

impl EventKind {
    /// Maps a raw wire id back to a known kind.
    ///
    /// Ids in the application range (`>= User`) all map to `User`; the raw
    /// id stays available on the event record itself.
    #[must_use]
    pub const fn from_raw(id: u16) -> Option<Self> {
        match id {
            0 => Some(Self::KeyDown),
            1 => Some(Self::KeyUp),
            2 => Some(Self::ButtonDown),
            3 => Some(Self::ButtonUp),
            4 => Some(Self::MouseMove),
            5 => Some(Self::ComponentAdd),
            6 => Some(Self::ComponentSet),
            7 => Some(Self::ComponentRemove),
            8 => Some(Self::EntityModified),
            9 => Some(Self::Quit),
            id if id >= 0x100 => Some(Self::User),
            _ => None,
        }
    }
}

/// Modifier bitflags carried by key and button payloads.
pub mod mods {
    /// Shift held.
    pub const SHIFT: u8 = 1;
    /// Control held.
    pub const CTRL: u8 = 2;
    /// Alt held.
    pub const ALT: u8 = 4;
    /// Super / logo held.
    pub const SUPER: u8 = 8;
}

/// Key state values carried by key and button payloads.
pub mod state {
    /// Key or button released.
    pub const UP: u8 = 0;
    /// Key or button pressed.
    pub const DOWN: u8 = 1;
}

/// Payload of [`EventKind::KeyDown`] / [`EventKind::KeyUp`].
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct KeyPayload {
    /// Canonical key code (`Key as u16`).
    pub key: u16,
    /// Modifier bitflags (see [`mods`]).
    pub mods: u8,
    /// 0 = up, 1 = down (see [`state`]).
    pub state: u8,
}

/// Payload of [`EventKind::ButtonDown`] / [`EventKind::ButtonUp`].
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ButtonPayload {
    /// Canonical button code (`Button as u8`).
    pub button: u8,
    /// Modifier bitflags (see [`mods`]).
    pub mods: u8,
    /// 0 = up, 1 = down (see [`state`]).
    pub state: u8,
    /// Keeps the record free of implicit padding.
    pub _pad: u8,
    /// Pointer x position at the time of the click.
    pub x: i16,
    /// Pointer y position at the time of the click.
    pub y: i16,
}

/// Payload of [`EventKind::MouseMove`].
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct MovePayload {
    /// Pointer x position.
    pub x: i16,
    /// Pointer y position.
    pub y: i16,
}

/// 16-byte integer payload used by the cross-layer kinds
/// (`ComponentAdd`/`Set`/`Remove`, `EntityModified`, `User`).
///
/// Values are little-endian on the wire, which is a no-op on every platform
/// the engine targets.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct IntsPayload {
    /// Four packed 32-bit values; meaning is defined by the kind.
    pub values: [u32; 4],
}

impl IntsPayload {
    /// Packs four values.
    #[inline]
    #[must_use]
    pub const fn new(p0: u32, p1: u32, p2: u32, p3: u32) -> Self {
        Self {
            values: [p0, p1, p2, p3],
        }
    }
}

/// A single event record.
///
/// The payload is an opaque bit-copy of one of the typed payload structs;
/// `size` records how many of the 24 inline bytes are meaningful.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct Event {
    /// Raw kind id (`EventKind as u16`, or an application id `>= 0x100`).
    pub id: u16,
    /// Number of meaningful payload bytes.
    pub size: u8,
    /// Inline payload storage.
    pub payload: [u8; EVENT_PAYLOAD_BYTES],
    /// Keeps the record free of implicit padding.
    pub _pad: u8,
}

impl Default for Event {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Event {
    /// Builds an event from a kind and a typed payload.
    ///
    /// # Panics
    ///
    /// Panics if `P` does not fit the 24-byte inline buffer. All engine
    /// payload types fit by construction.
    #[must_use]
    pub fn new<P: Pod>(kind: EventKind, payload: P) -> Self {
        Self::with_raw_id(kind as u16, payload)
    }

    /// Builds an event with an application-defined raw id.
    ///
    /// # Panics
    ///
    /// Panics if `P` does not fit the 24-byte inline buffer.
    #[must_use]
    pub fn with_raw_id<P: Pod>(id: u16, payload: P) -> Self {
        let bytes = bytemuck::bytes_of(&payload);
        assert!(
            bytes.len() <= EVENT_PAYLOAD_BYTES,
            "event payload of {} bytes exceeds the {} byte inline buffer",
            bytes.len(),
            EVENT_PAYLOAD_BYTES
        );

        let mut inline = [0u8; EVENT_PAYLOAD_BYTES];
        inline[..bytes.len()].copy_from_slice(bytes);

        Self {
            id,
            size: bytes.len() as u8,
            payload: inline,
            _pad: 0,
        }
    }

    /// Returns the known kind of this event, if any.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> Option<EventKind> {
        EventKind::from_raw(self.id)
    }

    /// Decodes the payload as `P`.
    ///
    /// Returns `None` when the recorded payload size does not match `P`.
    /// The read is unaligned, so any `Pod` type up to 24 bytes works.
    #[must_use]
    pub fn decode<P: Pod>(&self) -> Option<P> {
        let len = core::mem::size_of::<P>();
        if usize::from(self.size) != len {
            return None;
        }
        Some(bytemuck::pod_read_unaligned(&self.payload[..len]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_payload_roundtrip() {
        let event = Event::new(
            EventKind::KeyDown,
            KeyPayload {
                key: 17,
                mods: mods::SHIFT | mods::CTRL,
                state: state::DOWN,
            },
        );

        assert_eq!(event.kind(), Some(EventKind::KeyDown));
        assert_eq!(event.size as usize, core::mem::size_of::<KeyPayload>());

        let decoded: KeyPayload = event.decode().unwrap();
        assert_eq!(decoded.key, 17);
        assert_eq!(decoded.mods, mods::SHIFT | mods::CTRL);
        assert_eq!(decoded.state, state::DOWN);
    }

    #[test]
    fn test_decode_size_mismatch() {
        let event = Event::new(EventKind::MouseMove, MovePayload { x: 3, y: -4 });
        assert!(event.decode::<IntsPayload>().is_none());
        assert_eq!(event.decode::<MovePayload>(), Some(MovePayload { x: 3, y: -4 }));
    }

    #[test]
    fn test_payload_layouts() {
        // Wire contract: fixed sizes, no implicit padding.
        assert_eq!(core::mem::size_of::<KeyPayload>(), 4);
        assert_eq!(core::mem::size_of::<ButtonPayload>(), 8);
        assert_eq!(core::mem::size_of::<MovePayload>(), 4);
        assert_eq!(core::mem::size_of::<IntsPayload>(), 16);
        assert_eq!(core::mem::size_of::<Event>(), 28);
    }

    #[test]
    fn test_user_range() {
        let event = Event::with_raw_id(0x0142, IntsPayload::new(1, 2, 3, 4));
        assert_eq!(event.kind(), Some(EventKind::User));
        assert_eq!(event.id, 0x0142);
    }

    #[test]
    fn test_unknown_id() {
        let event = Event::with_raw_id(0x00ff, IntsPayload::default());
        assert_eq!(event.kind(), None);
    }
}
