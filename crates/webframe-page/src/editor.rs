#![forbid(unsafe_code)]

//! Editing entry points used by event handling.
//!
//! The editing engine itself (commands, typing, undo) belongs to the host.
//! [`EditorClient`] is the boundary: key bindings, input methods, and text
//! insertion are delegated to it, and it may veto selection changes or the
//! end of an editing session. [`Editor`] gates those calls on the frame's
//! selection being editable.

use std::rc::{Rc, Weak};

use webframe_core::event::PlatformKeyboardEvent;

use crate::dom::{DomEvent, NodeId, Range};
use crate::frame::Frame;
use crate::frame_tree::FrameId;

/// Host editing delegate.
pub trait EditorClient {
    /// Key binding handling for a `keydown` / `keypress` DOM event.
    fn handle_keyboard_event(&self, _frame: FrameId, _event: &DomEvent) -> bool {
        false
    }

    /// Give an input method the key before DOM dispatch.
    fn handle_input_method_keydown(&self, _frame: FrameId, _event: &PlatformKeyboardEvent) -> bool {
        false
    }

    fn insert_text(&self, _frame: FrameId, _text: &str) -> bool {
        false
    }

    fn insert_line_break(&self, _frame: FrameId) -> bool {
        false
    }

    fn insert_paragraph_separator(&self, _frame: FrameId) -> bool {
        false
    }

    fn should_change_selected_range(
        &self,
        _from: Option<Range>,
        _to: Option<Range>,
        _still_selecting: bool,
    ) -> bool {
        true
    }

    fn should_end_editing(&self, _node: NodeId) -> bool {
        true
    }

    fn set_input_method_state(&self, _enabled: bool) {}

    fn respond_to_changed_selection(&self, _frame: FrameId) {}

    /// The whole web view is editable.
    fn is_editable(&self) -> bool {
        false
    }
}

/// An editor client that accepts every change and handles nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyEditorClient;

impl EditorClient for EmptyEditorClient {}

/// Per-frame editing front end.
pub struct Editor {
    frame: Weak<Frame>,
    client: Rc<dyn EditorClient>,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor").finish_non_exhaustive()
    }
}

impl Editor {
    pub(crate) fn new(frame: Weak<Frame>, client: Rc<dyn EditorClient>) -> Self {
        Self { frame, client }
    }

    #[must_use]
    pub fn client(&self) -> &Rc<dyn EditorClient> {
        &self.client
    }

    #[must_use]
    pub fn client_is_editable(&self) -> bool {
        self.client.is_editable()
    }

    /// The selection sits in content that accepts typing.
    #[must_use]
    pub fn can_edit(&self) -> bool {
        let Some(frame) = self.frame.upgrade() else {
            return false;
        };
        if frame.selection().is_none() {
            return false;
        }
        if frame.is_content_editable() {
            return true;
        }
        frame
            .document()
            .is_some_and(|doc| frame.selection().is_content_editable(doc.as_ref()))
    }

    pub fn handle_keyboard_event(&self, event: &DomEvent) -> bool {
        let Some(frame) = self.frame.upgrade() else {
            return false;
        };
        self.client.handle_keyboard_event(frame.id(), event)
    }

    pub fn handle_input_method_keydown(&self, event: &PlatformKeyboardEvent) -> bool {
        let Some(frame) = self.frame.upgrade() else {
            return false;
        };
        self.client.handle_input_method_keydown(frame.id(), event)
    }

    pub fn insert_text(&self, text: &str) -> bool {
        if text.is_empty() || !self.can_edit() {
            return false;
        }
        let Some(frame) = self.frame.upgrade() else {
            return false;
        };
        self.client.insert_text(frame.id(), text)
    }

    pub fn insert_line_break(&self) -> bool {
        if !self.can_edit() {
            return false;
        }
        self.frame
            .upgrade()
            .is_some_and(|frame| self.client.insert_line_break(frame.id()))
    }

    pub fn insert_paragraph_separator(&self) -> bool {
        if !self.can_edit() {
            return false;
        }
        self.frame
            .upgrade()
            .is_some_and(|frame| self.client.insert_paragraph_separator(frame.id()))
    }

    #[must_use]
    pub fn should_change_selection(
        &self,
        from: Option<Range>,
        to: Option<Range>,
        still_selecting: bool,
    ) -> bool {
        self.client
            .should_change_selected_range(from, to, still_selecting)
    }

    #[must_use]
    pub fn should_end_editing(&self, node: NodeId) -> bool {
        self.client.should_end_editing(node)
    }

    /// Visibility of a match for search purposes.
    ///
    /// Only frames cut off from their owner element are checked; every other
    /// frame is assumed visible.
    #[must_use]
    pub fn inside_visible_area(&self, range: &Range) -> bool {
        let Some(frame) = self.frame.upgrade() else {
            return false;
        };
        if !frame.is_disconnected() {
            return true;
        }
        let (Some(doc), Some(view)) = (frame.document(), frame.view()) else {
            return false;
        };
        let Some(render) = doc.renderer() else {
            return false;
        };
        render
            .range_bounds(range)
            .is_some_and(|bounds| bounds.intersects(&view.visible_content_rect()))
    }
}
