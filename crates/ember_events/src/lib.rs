//! # Ember Event Pipeline
//!
//! The bounded event pipeline coupling the platform input layer to the
//! script layer:
//!
//! - Fixed-size [`Event`] records with inline plain-data payloads
//! - [`EventQueue`], a power-of-two ring with overwrite-oldest semantics
//! - [`EventListeners`], a slot table of per-kind callbacks
//! - Input translation from platform key/button codes to the canonical
//!   [`Key`]/[`Button`] enumerations
//!
//! The queue is a sliding-window recorder, not a blocking channel: a
//! producer never waits and a slow consumer sees the most recent window.
//! All producers run on the driver thread.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod event;
pub mod input;
pub mod listener;
pub mod queue;

pub use event::{
    mods, state, ButtonPayload, Event, EventKind, IntsPayload, KeyPayload, MovePayload,
    EVENT_PAYLOAD_BYTES,
};
pub use input::{
    button_code_to_button, evdev_to_key, keysym_to_key, mods_from_mask, vk_to_key, Button,
    InputState, Key, PlatformInput,
};
pub use listener::{EventListeners, ListenerFn, ListenerId};
pub use queue::{EventQueue, DEFAULT_QUEUE_CAPACITY};
