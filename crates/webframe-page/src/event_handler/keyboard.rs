#![forbid(unsafe_code)]

//! Keyboard dispatch: access keys, the keydown / keypress split, text
//! input, and the default key bindings (Tab, space, scrolling keys).
//!
//! A combined platform `KeyDown` becomes a DOM `keydown` followed, when
//! that was not swallowed and the key produces text, by a `keypress`. In
//! compatibility mode `keypress` is sent even after a swallowed `keydown`,
//! pre-prevented so its default handling does not run.

use tracing::{debug_span, trace};
use webframe_core::event::{KeyEventKind, Modifiers, PlatformKeyboardEvent};

use super::{is_main_frame_pan_scrolling, EventHandler};
use crate::dom::{Document, DomEvent, EventDetail, EventType, NodeId, TextEventDetail};
use crate::focus::FocusDirection;
use crate::frame::Frame;
use crate::render::{ScrollDirection, ScrollGranularity};

/// Node keyboard events go to: the focused node, else the body, else the
/// root element.
fn event_target_node_for_document(document: &dyn Document) -> Option<NodeId> {
    document
        .focused_node()
        .or_else(|| document.body())
        .or_else(|| document.document_element())
}

/// Scroll performed by a navigation key with no editing in progress.
fn scroll_for_key(key_identifier: &str) -> Option<(ScrollDirection, ScrollGranularity)> {
    Some(match key_identifier {
        "Up" => (ScrollDirection::Up, ScrollGranularity::Line),
        "Down" => (ScrollDirection::Down, ScrollGranularity::Line),
        "Left" => (ScrollDirection::Left, ScrollGranularity::Line),
        "Right" => (ScrollDirection::Right, ScrollGranularity::Line),
        "PageUp" => (ScrollDirection::Up, ScrollGranularity::Page),
        "PageDown" => (ScrollDirection::Down, ScrollGranularity::Page),
        "Home" => (ScrollDirection::Up, ScrollGranularity::Document),
        "End" => (ScrollDirection::Down, ScrollGranularity::Document),
        _ => return None,
    })
}

impl EventHandler {
    /// Handle a platform key event. Returns whether it was swallowed.
    pub fn key_event(&self, initial: &PlatformKeyboardEvent) -> bool {
        let Some(frame) = self.frame() else {
            return false;
        };
        let _span = debug_span!(
            "event_handler.key",
            frame = %frame.id(),
            kind = ?initial.kind,
            key = %initial.key_identifier
        )
        .entered();

        if is_main_frame_pan_scrolling(&frame) || self.autoscroll_in_progress.get() {
            if initial.kind == KeyEventKind::KeyUp && initial.key_identifier == "U+001B" {
                self.stop_autoscroll_timer(false);
            }
            return true;
        }

        // Too early for events, e.g. an unmatched key-up.
        let Some(document) = frame.document() else {
            return false;
        };
        let Some(node) = event_target_node_for_document(document.as_ref()) else {
            return false;
        };
        if let Some(view) = frame.view() {
            view.reset_deferred_repaint_delay();
        }

        let matched_access_key = initial.kind == KeyEventKind::KeyDown && self.handle_access_key(&frame, initial);

        match initial.kind {
            KeyEventKind::KeyUp => {
                let event = DomEvent::new(EventType::KeyUp, node).with_detail(EventDetail::Key(initial.clone()));
                return self.dispatch_key_event(&frame, &event);
            }
            KeyEventKind::Char => {
                let event = DomEvent::new(EventType::KeyPress, node).with_detail(EventDetail::Key(initial.clone()));
                return self.dispatch_key_event(&frame, &event);
            }
            KeyEventKind::RawKeyDown => {
                let event = DomEvent::new(EventType::KeyDown, node)
                    .with_detail(EventDetail::Key(initial.clone()))
                    .with_default_prevented(matched_access_key);
                return self.dispatch_key_event(&frame, &event);
            }
            KeyEventKind::KeyDown => {}
        }

        let compat = self.config.keyboard.needs_keypress_compat_mode;
        let mut key_down = initial.clone();
        key_down.disambiguate_key_down(KeyEventKind::RawKeyDown, compat);

        // The input method sees the key before the page does.
        let handled_by_input_method = frame.editor().handle_input_method_keydown(&key_down);
        if handled_by_input_method {
            key_down.windows_virtual_key_code = self.config.keyboard.composition_key_code;
            trace!("keydown taken by input method");
        }
        let keydown = DomEvent::new(EventType::KeyDown, node)
            .with_detail(EventDetail::Key(key_down))
            .with_default_prevented(matched_access_key && !handled_by_input_method)
            .with_default_handled(handled_by_input_method);
        let keydown_result = self.dispatch_key_event(&frame, &keydown);
        if handled_by_input_method || (keydown_result && !compat) {
            return keydown_result;
        }

        // Keydown handlers may have moved focus.
        let node = if keydown_result {
            node
        } else {
            match frame.document().and_then(|document| event_target_node_for_document(document.as_ref())) {
                Some(node) => node,
                None => return false,
            }
        };

        let mut key_press = initial.clone();
        key_press.disambiguate_key_down(KeyEventKind::Char, compat);
        if key_press.text.is_empty() {
            return keydown_result;
        }
        let keypress = DomEvent::new(EventType::KeyPress, node)
            .with_detail(EventDetail::Key(key_press))
            .with_default_prevented(keydown_result);
        let keypress_result = self.dispatch_key_event(&frame, &keypress);
        keydown_result || keypress_result
    }

    /// Dispatch a key event, then run default handling if nothing
    /// swallowed it. Returns whether the event ended up handled.
    fn dispatch_key_event(&self, frame: &Frame, event: &DomEvent) -> bool {
        let Some(document) = frame.document() else {
            return false;
        };
        if document.dispatch_event(event).including_initial(event).swallowed() {
            return true;
        }
        match event.event_type {
            EventType::KeyDown => self.default_keydown_handler(frame, event),
            EventType::KeyPress => self.default_keypress_handler(frame, event),
            _ => false,
        }
    }

    /// Run the element registered for the key, if the held modifiers are
    /// the access-key modifiers. Shift is ignored and the key matches
    /// case-insensitively.
    fn handle_access_key(&self, frame: &Frame, event: &PlatformKeyboardEvent) -> bool {
        if event.modifiers.difference(Modifiers::SHIFT) != self.config.keyboard.access_key_modifiers {
            return false;
        }
        let Some(document) = frame.document() else {
            return false;
        };
        let key = event.unmodified_text.to_lowercase();
        let Some(element) = document.element_for_access_key(&key) else {
            return false;
        };
        trace!(?element, %key, "access key matched");
        document.access_key_action(element, false);
        true
    }

    fn default_keydown_handler(&self, frame: &Frame, event: &DomEvent) -> bool {
        if frame.editor().handle_keyboard_event(event) {
            return true;
        }
        let Some(key) = event.key() else {
            return false;
        };
        if key.key_identifier == "U+0009" {
            return self.default_tab_handler(frame, key);
        }
        if key.ctrl() || key.alt() || key.meta() || frame.editor().can_edit() {
            return false;
        }
        let Some((direction, granularity)) = scroll_for_key(&key.key_identifier) else {
            return false;
        };
        self.scroll_overflow(direction, granularity)
            || frame.view().is_some_and(|view| view.scroll(direction, granularity))
    }

    fn default_keypress_handler(&self, frame: &Frame, event: &DomEvent) -> bool {
        if frame.editor().handle_keyboard_event(event) {
            return true;
        }
        let Some(key) = event.key() else {
            return false;
        };
        if frame.editor().can_edit() && !key.text.is_empty() {
            return match key.text.as_str() {
                // Enter inserts a paragraph; Shift-Enter a line break.
                "\r" | "\n" => self.handle_text_input_event("\n", Some(event), key.shift(), false),
                text => self.handle_text_input_event(text, Some(event), false, false),
            };
        }
        if key.text == " " {
            return self.default_space_handler(frame, key.shift());
        }
        false
    }

    fn default_space_handler(&self, frame: &Frame, shift: bool) -> bool {
        let direction = if shift {
            ScrollDirection::Up
        } else {
            ScrollDirection::Down
        };
        if self.scroll_overflow(direction, ScrollGranularity::Page) {
            return true;
        }
        frame
            .view()
            .is_some_and(|view| view.scroll(direction, ScrollGranularity::Page))
    }

    fn default_tab_handler(&self, frame: &Frame, key: &PlatformKeyboardEvent) -> bool {
        if key.ctrl() || key.meta() || key.alt() {
            return false;
        }
        let Some(page) = frame.page() else {
            return false;
        };
        if !page.tab_key_cycles_through_elements() {
            return false;
        }
        // Tabs are content in design mode.
        if frame.document().is_some_and(|document| document.in_design_mode()) {
            return false;
        }
        let direction = if key.shift() {
            FocusDirection::Backward
        } else {
            FocusDirection::Forward
        };
        page.focus_controller().advance_focus(direction)
    }

    // -----------------------------------------------------------------------
    // Text input
    // -----------------------------------------------------------------------

    /// Dispatch `textInput` carrying `text`, at the target of `underlying`
    /// or at the focused node. Unhandled, the text goes to the editor.
    pub fn handle_text_input_event(
        &self,
        text: &str,
        underlying: Option<&DomEvent>,
        is_line_break: bool,
        is_back_tab: bool,
    ) -> bool {
        let Some(frame) = self.frame() else {
            return false;
        };
        let Some(document) = frame.document() else {
            return false;
        };
        let target = match underlying {
            Some(event) => Some(event.target),
            None => event_target_node_for_document(document.as_ref()),
        };
        let Some(target) = target else {
            return false;
        };
        if let Some(view) = frame.view() {
            view.reset_deferred_repaint_delay();
        }

        let event = DomEvent::new(EventType::TextInput, target).with_detail(EventDetail::Text(TextEventDetail {
            data: text.to_owned(),
            is_line_break,
            is_back_tab,
        }));
        let result = document.dispatch_event(&event).including_initial(&event);
        if result.default_handled {
            return true;
        }
        if result.default_prevented {
            return false;
        }
        let editor = frame.editor();
        if text == "\n" {
            if is_line_break {
                editor.insert_line_break()
            } else {
                editor.insert_paragraph_separator()
            }
        } else {
            editor.insert_text(text)
        }
    }
}
