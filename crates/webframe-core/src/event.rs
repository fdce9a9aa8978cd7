#![forbid(unsafe_code)]

//! Platform input events.
//!
//! These are the raw events a host window delivers to the engine, before
//! any hit-testing or DOM dispatch. Positions are in window coordinates of
//! the main frame's view; each frame converts them to its own contents
//! coordinates.
//!
//! # Design Notes
//!
//! - `click_count` is supplied by the platform (see
//!   [`ClickCounter`](crate::gesture::ClickCounter) for a reference
//!   implementation of the counting rules).
//! - Timestamps are durations on the owning [`EventLoop`](crate::event_loop::EventLoop)
//!   clock, not wall-clock instants.
//! - `Modifiers` use bitflags for easy combination.

use std::cell::Cell;
use std::time::Duration;

use bitflags::bitflags;

use crate::geometry::IntPoint;

bitflags! {
    /// Modifier keys held during an input event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        /// No modifiers.
        const NONE  = 0b0000;
        /// Shift key.
        const SHIFT = 0b0001;
        /// Alt/Option key.
        const ALT   = 0b0010;
        /// Control key.
        const CTRL  = 0b0100;
        /// Meta/Command key.
        const META  = 0b1000;
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::NONE
    }
}

// ---------------------------------------------------------------------------
// Mouse
// ---------------------------------------------------------------------------

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MouseButton {
    /// No button (plain moves).
    #[default]
    None,
    Left,
    Middle,
    /// The context-menu button.
    Right,
}

/// What the mouse did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseEventKind {
    Pressed,
    Released,
    Moved,
}

/// A raw mouse event from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformMouseEvent {
    pub kind: MouseEventKind,
    pub button: MouseButton,
    /// Position in main-frame window coordinates.
    pub position: IntPoint,
    /// Position in screen coordinates.
    pub global_position: IntPoint,
    /// Consecutive press count as determined by the platform.
    pub click_count: u32,
    pub modifiers: Modifiers,
    pub timestamp: Duration,
}

impl PlatformMouseEvent {
    /// Create an event at `position` with no modifiers and a click count of
    /// one for presses, zero otherwise.
    #[must_use]
    pub fn new(kind: MouseEventKind, button: MouseButton, position: IntPoint) -> Self {
        Self {
            kind,
            button,
            position,
            global_position: position,
            click_count: u32::from(kind == MouseEventKind::Pressed),
            modifiers: Modifiers::NONE,
            timestamp: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn pressed(button: MouseButton, position: IntPoint) -> Self {
        Self::new(MouseEventKind::Pressed, button, position)
    }

    #[must_use]
    pub fn released(button: MouseButton, position: IntPoint) -> Self {
        Self::new(MouseEventKind::Released, button, position)
    }

    #[must_use]
    pub fn moved(button: MouseButton, position: IntPoint) -> Self {
        Self::new(MouseEventKind::Moved, button, position)
    }

    #[must_use]
    pub const fn with_click_count(mut self, count: u32) -> Self {
        self.click_count = count;
        self
    }

    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: Duration) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub const fn with_global_position(mut self, global: IntPoint) -> Self {
        self.global_position = global;
        self
    }

    /// Copy of this event relocated to another window position. Used when a
    /// parent forwards an event into a child frame.
    #[must_use]
    pub fn relocated(&self, position: IntPoint) -> Self {
        Self {
            position,
            ..self.clone()
        }
    }

    #[inline]
    #[must_use]
    pub const fn shift(&self) -> bool {
        self.modifiers.contains(Modifiers::SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn alt(&self) -> bool {
        self.modifiers.contains(Modifiers::ALT)
    }

    #[inline]
    #[must_use]
    pub const fn ctrl(&self) -> bool {
        self.modifiers.contains(Modifiers::CTRL)
    }

    #[inline]
    #[must_use]
    pub const fn meta(&self) -> bool {
        self.modifiers.contains(Modifiers::META)
    }
}

// ---------------------------------------------------------------------------
// Keyboard
// ---------------------------------------------------------------------------

/// Platform keyboard event types.
///
/// Hosts that deliver a single combined event send `KeyDown`; the engine
/// splits it into `RawKeyDown` (for the DOM `keydown`) and `Char` (for the
/// DOM `keypress`). Hosts that already split send the halves directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEventKind {
    KeyDown,
    RawKeyDown,
    Char,
    KeyUp,
}

/// A raw keyboard event from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformKeyboardEvent {
    pub kind: KeyEventKind,
    /// Text produced by the key with modifiers applied.
    pub text: String,
    /// Text produced by the key ignoring modifiers other than shift.
    pub unmodified_text: String,
    /// DOM key identifier, e.g. `"U+0041"`, `"Enter"`, `"Left"`.
    pub key_identifier: String,
    pub windows_virtual_key_code: i32,
    pub modifiers: Modifiers,
    pub auto_repeat: bool,
    pub is_keypad: bool,
}

impl PlatformKeyboardEvent {
    /// A combined key-down producing `text`.
    #[must_use]
    pub fn key_down(text: impl Into<String>, key_identifier: impl Into<String>, code: i32) -> Self {
        let text = text.into();
        Self {
            kind: KeyEventKind::KeyDown,
            unmodified_text: text.clone(),
            text,
            key_identifier: key_identifier.into(),
            windows_virtual_key_code: code,
            modifiers: Modifiers::NONE,
            auto_repeat: false,
            is_keypad: false,
        }
    }

    /// A key-up for the same key.
    #[must_use]
    pub fn key_up(key_identifier: impl Into<String>, code: i32) -> Self {
        Self {
            kind: KeyEventKind::KeyUp,
            text: String::new(),
            unmodified_text: String::new(),
            key_identifier: key_identifier.into(),
            windows_virtual_key_code: code,
            modifiers: Modifiers::NONE,
            auto_repeat: false,
            is_keypad: false,
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: KeyEventKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    #[must_use]
    pub fn with_unmodified_text(mut self, text: impl Into<String>) -> Self {
        self.unmodified_text = text.into();
        self
    }

    /// Turn a combined `KeyDown` into one of its halves.
    ///
    /// `RawKeyDown` drops the produced text; `Char` drops the key identity.
    /// In backward-compatibility mode the `Char` half keeps its key
    /// identity since legacy content reads `keyCode` from `keypress`.
    pub fn disambiguate_key_down(&mut self, kind: KeyEventKind, backward_compat: bool) {
        debug_assert_eq!(self.kind, KeyEventKind::KeyDown);
        self.kind = kind;
        match kind {
            KeyEventKind::RawKeyDown => {
                self.text.clear();
                self.unmodified_text.clear();
            }
            KeyEventKind::Char if !backward_compat => {
                self.key_identifier.clear();
                self.windows_virtual_key_code = 0;
            }
            _ => {}
        }
    }

    #[inline]
    #[must_use]
    pub const fn shift(&self) -> bool {
        self.modifiers.contains(Modifiers::SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn alt(&self) -> bool {
        self.modifiers.contains(Modifiers::ALT)
    }

    #[inline]
    #[must_use]
    pub const fn ctrl(&self) -> bool {
        self.modifiers.contains(Modifiers::CTRL)
    }

    #[inline]
    #[must_use]
    pub const fn meta(&self) -> bool {
        self.modifiers.contains(Modifiers::META)
    }
}

// ---------------------------------------------------------------------------
// Wheel
// ---------------------------------------------------------------------------

/// Units of a wheel delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WheelGranularity {
    Pixel,
    #[default]
    Line,
    Page,
}

/// A raw wheel event. `accepted` is set by whoever consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformWheelEvent {
    pub position: IntPoint,
    pub global_position: IntPoint,
    /// Positive values scroll left.
    pub delta_x: f32,
    /// Positive values scroll up.
    pub delta_y: f32,
    pub granularity: WheelGranularity,
    pub modifiers: Modifiers,
    accepted: Cell<bool>,
}

impl PlatformWheelEvent {
    #[must_use]
    pub fn new(position: IntPoint, delta_x: f32, delta_y: f32) -> Self {
        Self {
            position,
            global_position: position,
            delta_x,
            delta_y,
            granularity: WheelGranularity::Line,
            modifiers: Modifiers::NONE,
            accepted: Cell::new(false),
        }
    }

    #[must_use]
    pub fn with_granularity(mut self, granularity: WheelGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    #[must_use]
    pub fn relocated(&self, position: IntPoint) -> Self {
        Self {
            position,
            accepted: Cell::new(self.accepted.get()),
            ..self.clone()
        }
    }

    #[inline]
    pub fn accept(&self) {
        self.accepted.set(true);
    }

    #[inline]
    pub fn ignore(&self) {
        self.accepted.set(false);
    }

    #[inline]
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.accepted.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_defaults_to_single_click() {
        let ev = PlatformMouseEvent::pressed(MouseButton::Left, IntPoint::new(1, 2));
        assert_eq!(ev.click_count, 1);
        let mv = PlatformMouseEvent::moved(MouseButton::None, IntPoint::new(1, 2));
        assert_eq!(mv.click_count, 0);
    }

    #[test]
    fn relocated_keeps_everything_else() {
        let ev = PlatformMouseEvent::pressed(MouseButton::Middle, IntPoint::new(5, 5))
            .with_click_count(2)
            .with_modifiers(Modifiers::SHIFT);
        let moved = ev.relocated(IntPoint::new(1, 1));
        assert_eq!(moved.position, IntPoint::new(1, 1));
        assert_eq!(moved.click_count, 2);
        assert!(moved.shift());
        assert_eq!(moved.button, MouseButton::Middle);
    }

    #[test]
    fn raw_key_down_drops_text() {
        let mut ev = PlatformKeyboardEvent::key_down("a", "U+0041", 65);
        ev.disambiguate_key_down(KeyEventKind::RawKeyDown, false);
        assert_eq!(ev.kind, KeyEventKind::RawKeyDown);
        assert!(ev.text.is_empty());
        assert_eq!(ev.windows_virtual_key_code, 65);
    }

    #[test]
    fn char_drops_key_identity_unless_compat() {
        let mut ev = PlatformKeyboardEvent::key_down("a", "U+0041", 65);
        ev.disambiguate_key_down(KeyEventKind::Char, false);
        assert_eq!(ev.text, "a");
        assert_eq!(ev.windows_virtual_key_code, 0);

        let mut compat = PlatformKeyboardEvent::key_down("a", "U+0041", 65);
        compat.disambiguate_key_down(KeyEventKind::Char, true);
        assert_eq!(compat.windows_virtual_key_code, 65);
    }

    #[test]
    fn wheel_accept_flag() {
        let ev = PlatformWheelEvent::new(IntPoint::zero(), 0.0, -3.0);
        assert!(!ev.is_accepted());
        ev.accept();
        assert!(ev.is_accepted());
        ev.ignore();
        assert!(!ev.is_accepted());
    }

    #[test]
    fn modifiers_default() {
        assert_eq!(Modifiers::default(), Modifiers::NONE);
    }
}
