#![forbid(unsafe_code)]

//! Scripted platform input for a frame.
//!
//! [`InputDriver`] plays the part of the platform layer: it builds
//! platform events, stamps them with the event loop's clock and a click
//! count from its own [`ClickCounter`], and feeds them to the frame's
//! [`EventHandler`](webframe_page::EventHandler).

use std::rc::Rc;
use std::time::Duration;

use webframe_core::event::{Modifiers, MouseButton, PlatformKeyboardEvent, PlatformMouseEvent, PlatformWheelEvent};
use webframe_core::event_loop::EventLoop;
use webframe_core::geometry::IntPoint;
use webframe_core::gesture::ClickCounter;
use webframe_page::frame::Frame;

/// Platform input source bound to one frame.
#[derive(Debug)]
pub struct InputDriver {
    frame: Rc<Frame>,
    event_loop: Rc<EventLoop>,
    clicks: ClickCounter,
    modifiers: Modifiers,
    position: IntPoint,
    held: MouseButton,
}

/// Key identifier for a character, as platforms report it.
#[must_use]
pub fn key_identifier_for(ch: char) -> String {
    format!("U+{:04X}", u32::from(ch.to_ascii_uppercase()))
}

impl InputDriver {
    #[must_use]
    pub fn new(frame: &Rc<Frame>) -> Self {
        Self {
            frame: Rc::clone(frame),
            event_loop: Rc::clone(frame.event_loop()),
            clicks: ClickCounter::new(frame.config().click.clone()),
            modifiers: Modifiers::NONE,
            position: IntPoint::zero(),
            held: MouseButton::None,
        }
    }

    /// Hold `modifiers` for every following event.
    pub fn set_modifiers(&mut self, modifiers: Modifiers) {
        self.modifiers = modifiers;
    }

    #[must_use]
    pub fn position(&self) -> IntPoint {
        self.position
    }

    #[must_use]
    pub fn now(&self) -> Duration {
        self.event_loop.now()
    }

    /// Advance the event loop clock, firing due timers.
    pub fn advance(&self, delta: Duration) -> usize {
        self.event_loop.advance_by(delta)
    }

    fn stamp(&self, event: PlatformMouseEvent) -> PlatformMouseEvent {
        event
            .with_modifiers(self.modifiers)
            .with_timestamp(self.event_loop.now())
    }

    // -----------------------------------------------------------------------
    // Mouse
    // -----------------------------------------------------------------------

    pub fn press(&mut self, button: MouseButton, at: IntPoint) -> bool {
        let count = self.clicks.register_press(button, at, self.event_loop.now());
        let event = self.stamp(PlatformMouseEvent::pressed(button, at)).with_click_count(count);
        self.position = at;
        self.held = button;
        self.frame.event_handler().handle_mouse_press_event(&event)
    }

    pub fn release(&mut self, button: MouseButton, at: IntPoint) -> bool {
        let event = self.stamp(PlatformMouseEvent::released(button, at));
        self.position = at;
        self.held = MouseButton::None;
        self.frame.event_handler().handle_mouse_release_event(&event)
    }

    /// Move the pointer, dragging with whatever button is held.
    pub fn move_to(&mut self, at: IntPoint) -> bool {
        let event = self.stamp(PlatformMouseEvent::moved(self.held, at));
        self.position = at;
        self.frame.event_handler().mouse_moved(&event)
    }

    /// Left press and release at `at`. Returns whether either was swallowed.
    pub fn click(&mut self, at: IntPoint) -> bool {
        let pressed = self.press(MouseButton::Left, at);
        let released = self.release(MouseButton::Left, at);
        pressed || released
    }

    pub fn double_click(&mut self, at: IntPoint) -> bool {
        let first = self.click(at);
        let second = self.click(at);
        first || second
    }

    /// Press at `from`, move to `to` in `steps` equal moves, release there.
    pub fn drag(&mut self, from: IntPoint, to: IntPoint, steps: u32) -> bool {
        let mut swallowed = self.press(MouseButton::Left, from);
        let steps = steps.max(1);
        for step in 1..=steps {
            let step = i32::try_from(step).unwrap_or(i32::MAX);
            let total = i32::try_from(steps).unwrap_or(i32::MAX);
            let at = IntPoint::new(
                from.x + (to.x - from.x) * step / total,
                from.y + (to.y - from.y) * step / total,
            );
            swallowed |= self.move_to(at);
        }
        swallowed |= self.release(MouseButton::Left, to);
        swallowed
    }

    /// Right press, `contextmenu`, release. Returns whether the context
    /// menu event was swallowed.
    pub fn context_menu(&mut self, at: IntPoint) -> bool {
        let count = self.clicks.register_press(MouseButton::Right, at, self.event_loop.now());
        let event = self
            .stamp(PlatformMouseEvent::pressed(MouseButton::Right, at))
            .with_click_count(count);
        self.position = at;
        let handler = self.frame.event_handler();
        handler.handle_mouse_press_event(&event);
        let swallowed = handler.send_context_menu_event(&event);
        self.release(MouseButton::Right, at);
        swallowed
    }

    // -----------------------------------------------------------------------
    // Keyboard
    // -----------------------------------------------------------------------

    /// Send a key event as is, adding the held modifiers.
    pub fn key(&self, event: PlatformKeyboardEvent) -> bool {
        let modifiers = event.modifiers | self.modifiers;
        self.frame.event_handler().key_event(&event.with_modifiers(modifiers))
    }

    /// Key down and up for one key with the given text.
    pub fn press_key(&self, key_identifier: &str, text: &str, code: i32) -> bool {
        let down = self.key(PlatformKeyboardEvent::key_down(text, key_identifier, code));
        let up = self.key(PlatformKeyboardEvent::key_up(key_identifier, code));
        down || up
    }

    /// Type `text` one character at a time. Returns how many key downs
    /// were swallowed.
    pub fn type_text(&self, text: &str) -> usize {
        text.chars()
            .filter(|ch| {
                let code = i32::try_from(u32::from(ch.to_ascii_uppercase())).unwrap_or(0);
                self.press_key(&key_identifier_for(*ch), &ch.to_string(), code)
            })
            .count()
    }

    /// Tab, or Shift-Tab when `backward`.
    pub fn tab(&self, backward: bool) -> bool {
        let mut event = PlatformKeyboardEvent::key_down("\t", "U+0009", 9);
        if backward {
            event = event.with_modifiers(Modifiers::SHIFT);
        }
        self.key(event)
    }

    // -----------------------------------------------------------------------
    // Wheel
    // -----------------------------------------------------------------------

    /// Line-granularity wheel event. Returns whether it was accepted.
    pub fn wheel(&self, at: IntPoint, delta_x: f32, delta_y: f32) -> bool {
        let mut event = PlatformWheelEvent::new(at, delta_x, delta_y);
        event.modifiers = self.modifiers;
        self.frame.event_handler().handle_wheel_event(&event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_identifiers_are_uppercase_hex() {
        assert_eq!(key_identifier_for('a'), "U+0041");
        assert_eq!(key_identifier_for(' '), "U+0020");
        assert_eq!(key_identifier_for('\t'), "U+0009");
    }
}
