//! # Input Translation
//!
//! Pure translation tables from platform key/button codes (Win32 virtual
//! keys, X11 keysyms, Linux evdev codes) to the engine's canonical
//! enumerations, plus the input state tracker that turns platform records
//! into canonical events on the queue.
//!
//! Window backends are external: they hand records to
//! [`InputState::handle`] and never touch the queue themselves.

use serde::{Deserialize, Serialize};

use crate::event::{mods, state, ButtonPayload, Event, EventKind, IntsPayload, KeyPayload, MovePayload};
use crate::queue::EventQueue;

/// Canonical key codes.
///
/// The numeric values are part of the script-facing contract; new keys are
/// appended, never inserted.
#[repr(u16)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Key {
    Space = 0,
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,
    Num0, Num1, Num2, Num3, Num4, Num5, Num6, Num7, Num8, Num9,
    Escape,
    Enter,
    Tab,
    Backspace,
    Left,
    Right,
    Up,
    Down,
    LShift,
    RShift,
    LCtrl,
    RCtrl,
    LAlt,
    RAlt,
    LSuper,
    RSuper,
    Unknown,
}

impl Key {
    /// Number of canonical keys, `Unknown` included.
    pub const COUNT: usize = Key::Unknown as usize + 1;

    /// Every key in discriminant order.
    pub const ALL: [Key; Key::COUNT] = [
        Key::Space,
        Key::A, Key::B, Key::C, Key::D, Key::E, Key::F, Key::G, Key::H, Key::I,
        Key::J, Key::K, Key::L, Key::M, Key::N, Key::O, Key::P, Key::Q, Key::R,
        Key::S, Key::T, Key::U, Key::V, Key::W, Key::X, Key::Y, Key::Z,
        Key::Num0, Key::Num1, Key::Num2, Key::Num3, Key::Num4,
        Key::Num5, Key::Num6, Key::Num7, Key::Num8, Key::Num9,
        Key::Escape, Key::Enter, Key::Tab, Key::Backspace,
        Key::Left, Key::Right, Key::Up, Key::Down,
        Key::LShift, Key::RShift, Key::LCtrl, Key::RCtrl,
        Key::LAlt, Key::RAlt, Key::LSuper, Key::RSuper,
        Key::Unknown,
    ];

    /// Maps a raw `u16` back to a key; out-of-range values yield `Unknown`.
    #[must_use]
    pub fn from_raw(raw: u16) -> Self {
        Self::ALL
            .get(raw as usize)
            .copied()
            .unwrap_or(Key::Unknown)
    }
}

/// Canonical mouse buttons. Values match the script-facing contract.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    /// Primary button.
    Left = 1,
    /// Secondary button.
    Right = 2,
    /// Middle / wheel button.
    Middle = 3,
}

impl Button {
    /// Number of canonical buttons.
    pub const COUNT: usize = 3;
}

/// Translates a Win32 virtual-key code.
#[must_use]
pub fn vk_to_key(vk: u32) -> Key {
    match vk {
        0x41..=0x5A => Key::from_raw(Key::A as u16 + (vk - 0x41) as u16),
        0x30..=0x39 => Key::from_raw(Key::Num0 as u16 + (vk - 0x30) as u16),
        0x20 => Key::Space,
        0x1B => Key::Escape,
        0x0D => Key::Enter,
        0x09 => Key::Tab,
        0x08 => Key::Backspace,
        0x25 => Key::Left,
        0x26 => Key::Up,
        0x27 => Key::Right,
        0x28 => Key::Down,
        0xA0 => Key::LShift,
        0xA1 => Key::RShift,
        0xA2 => Key::LCtrl,
        0xA3 => Key::RCtrl,
        0xA4 => Key::LAlt,
        0xA5 => Key::RAlt,
        0x5B => Key::LSuper,
        0x5C => Key::RSuper,
        _ => Key::Unknown,
    }
}

/// Translates an X11 keysym.
#[must_use]
pub fn keysym_to_key(sym: u32) -> Key {
    match sym {
        0x61..=0x7A => Key::from_raw(Key::A as u16 + (sym - 0x61) as u16),
        0x41..=0x5A => Key::from_raw(Key::A as u16 + (sym - 0x41) as u16),
        0x30..=0x39 => Key::from_raw(Key::Num0 as u16 + (sym - 0x30) as u16),
        0x20 => Key::Space,
        0xFF1B => Key::Escape,
        0xFF0D => Key::Enter,
        0xFF09 => Key::Tab,
        0xFF08 => Key::Backspace,
        0xFF51 => Key::Left,
        0xFF52 => Key::Up,
        0xFF53 => Key::Right,
        0xFF54 => Key::Down,
        0xFFE1 => Key::LShift,
        0xFFE2 => Key::RShift,
        0xFFE3 => Key::LCtrl,
        0xFFE4 => Key::RCtrl,
        0xFFE9 => Key::LAlt,
        0xFFEA => Key::RAlt,
        0xFFEB => Key::LSuper,
        0xFFEC => Key::RSuper,
        _ => Key::Unknown,
    }
}

/// Translates a Linux evdev scancode.
#[must_use]
pub fn evdev_to_key(code: u16) -> Key {
    match code {
        // Top alphanumeric row: KEY_1..KEY_0.
        2..=10 => Key::from_raw(Key::Num1 as u16 + code - 2),
        11 => Key::Num0,
        16 => Key::Q,
        17 => Key::W,
        18 => Key::E,
        19 => Key::R,
        20 => Key::T,
        21 => Key::Y,
        22 => Key::U,
        23 => Key::I,
        24 => Key::O,
        25 => Key::P,
        30 => Key::A,
        31 => Key::S,
        32 => Key::D,
        33 => Key::F,
        34 => Key::G,
        35 => Key::H,
        36 => Key::J,
        37 => Key::K,
        38 => Key::L,
        44 => Key::Z,
        45 => Key::X,
        46 => Key::C,
        47 => Key::V,
        48 => Key::B,
        49 => Key::N,
        50 => Key::M,
        57 => Key::Space,
        1 => Key::Escape,
        28 => Key::Enter,
        15 => Key::Tab,
        14 => Key::Backspace,
        105 => Key::Left,
        106 => Key::Right,
        103 => Key::Up,
        108 => Key::Down,
        42 => Key::LShift,
        54 => Key::RShift,
        29 => Key::LCtrl,
        97 => Key::RCtrl,
        56 => Key::LAlt,
        100 => Key::RAlt,
        125 => Key::LSuper,
        126 => Key::RSuper,
        _ => Key::Unknown,
    }
}

/// Extracts modifier flags from an X11 state mask.
///
/// Bit 0 is shift, bit 2 control, bit 3 mod1 (alt), bit 6 mod4 (super).
#[must_use]
pub const fn mods_from_mask(mask: u32) -> u8 {
    let mut out = 0;
    if mask & (1 << 0) != 0 {
        out |= mods::SHIFT;
    }
    if mask & (1 << 2) != 0 {
        out |= mods::CTRL;
    }
    if mask & (1 << 3) != 0 {
        out |= mods::ALT;
    }
    if mask & (1 << 6) != 0 {
        out |= mods::SUPER;
    }
    out
}

/// Translates an X11 button code. Code 1 is left, 3 is right; everything
/// else collapses to middle.
#[must_use]
pub const fn button_code_to_button(code: u8) -> Button {
    match code {
        1 => Button::Left,
        3 => Button::Right,
        _ => Button::Middle,
    }
}

/// A platform input record, as produced by a window backend.
#[derive(Clone, Copy, Debug)]
pub enum PlatformInput {
    /// X11 key press/release with keysym and modifier mask.
    X11Key {
        /// Resolved keysym for the pressed position.
        sym: u32,
        /// Modifier state mask at event time.
        mask: u32,
        /// `true` for KeyPress.
        pressed: bool,
    },
    /// X11 button press/release.
    X11Button {
        /// Raw button code.
        code: u8,
        /// Modifier state mask at event time.
        mask: u32,
        /// `true` for ButtonPress.
        pressed: bool,
        /// Pointer x at event time.
        x: i16,
        /// Pointer y at event time.
        y: i16,
    },
    /// Pointer motion.
    Motion {
        /// Pointer x.
        x: i16,
        /// Pointer y.
        y: i16,
    },
    /// Win32 key up/down with virtual-key code.
    Win32Key {
        /// Virtual-key code.
        vk: u32,
        /// `true` for WM_KEYDOWN.
        pressed: bool,
    },
    /// Linux evdev key with scancode and value (0 release, 1 press).
    EvdevKey {
        /// Kernel scancode.
        code: u16,
        /// `true` for press.
        pressed: bool,
    },
    /// The platform asked the engine to shut down.
    Quit,
}

/// Tracks key/button/pointer state and translates platform records into
/// canonical events.
pub struct InputState {
    keys: [bool; Key::COUNT],
    buttons: [bool; Button::COUNT],
    mouse_x: i16,
    mouse_y: i16,
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

impl InputState {
    /// Creates a state tracker with everything released.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            keys: [false; Key::COUNT],
            buttons: [false; Button::COUNT],
            mouse_x: 0,
            mouse_y: 0,
        }
    }

    /// Returns whether a key is currently held.
    #[inline]
    #[must_use]
    pub const fn is_key_down(&self, key: Key) -> bool {
        self.keys[key as usize]
    }

    /// Returns whether a button is currently held.
    #[inline]
    #[must_use]
    pub const fn is_button_down(&self, button: Button) -> bool {
        self.buttons[button as usize - 1]
    }

    /// Last observed pointer position.
    #[inline]
    #[must_use]
    pub const fn mouse(&self) -> (i16, i16) {
        (self.mouse_x, self.mouse_y)
    }

    /// Modifier flags derived from the tracked key state, for backends that
    /// do not report a modifier mask of their own.
    #[must_use]
    pub const fn tracked_mods(&self) -> u8 {
        let mut out = 0;
        if self.keys[Key::LShift as usize] || self.keys[Key::RShift as usize] {
            out |= mods::SHIFT;
        }
        if self.keys[Key::LCtrl as usize] || self.keys[Key::RCtrl as usize] {
            out |= mods::CTRL;
        }
        if self.keys[Key::LAlt as usize] || self.keys[Key::RAlt as usize] {
            out |= mods::ALT;
        }
        if self.keys[Key::LSuper as usize] || self.keys[Key::RSuper as usize] {
            out |= mods::SUPER;
        }
        out
    }

    /// Updates tracked state from a platform record and pushes the
    /// canonical event onto `queue`.
    pub fn handle(&mut self, input: PlatformInput, queue: &mut EventQueue) {
        match input {
            PlatformInput::X11Key { sym, mask, pressed } => {
                let key = keysym_to_key(sym);
                self.keys[key as usize] = pressed;
                push_key_event(key, mods_from_mask(mask), pressed, queue);
            }
            PlatformInput::Win32Key { vk, pressed } => {
                let key = vk_to_key(vk);
                self.keys[key as usize] = pressed;
                push_key_event(key, self.tracked_mods(), pressed, queue);
            }
            PlatformInput::EvdevKey { code, pressed } => {
                let key = evdev_to_key(code);
                self.keys[key as usize] = pressed;
                push_key_event(key, self.tracked_mods(), pressed, queue);
            }
            PlatformInput::X11Button {
                code,
                mask,
                pressed,
                x,
                y,
            } => {
                let button = button_code_to_button(code);
                self.buttons[button as usize - 1] = pressed;
                self.mouse_x = x;
                self.mouse_y = y;
                let kind = if pressed {
                    EventKind::ButtonDown
                } else {
                    EventKind::ButtonUp
                };
                queue.push(Event::new(
                    kind,
                    ButtonPayload {
                        button: button as u8,
                        mods: mods_from_mask(mask),
                        state: if pressed { state::DOWN } else { state::UP },
                        _pad: 0,
                        x,
                        y,
                    },
                ));
            }
            PlatformInput::Motion { x, y } => {
                self.mouse_x = x;
                self.mouse_y = y;
                queue.push(Event::new(EventKind::MouseMove, MovePayload { x, y }));
            }
            PlatformInput::Quit => {
                queue.push(Event::new(EventKind::Quit, IntsPayload::default()));
            }
        }
    }

}

fn push_key_event(key: Key, mods: u8, pressed: bool, queue: &mut EventQueue) {
    let kind = if pressed {
        EventKind::KeyDown
    } else {
        EventKind::KeyUp
    };
    queue.push(Event::new(
        kind,
        KeyPayload {
            key: key as u16,
            mods,
            state: if pressed { state::DOWN } else { state::UP },
        },
    ));
}
