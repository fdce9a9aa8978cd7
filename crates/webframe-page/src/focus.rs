#![forbid(unsafe_code)]

//! Page-wide focus routing.
//!
//! Exactly one frame of a page is focused at a time; within it the document
//! tracks its own focused node. [`FocusController`] moves focus between
//! frames: mouse-down focus transfer goes through
//! [`FocusController::set_focused_node`], Tab navigation through
//! [`FocusController::advance_focus`], which crosses frame boundaries in
//! both directions and wraps at the ends of the page.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::dom::{Document, EventType, NodeId};
use crate::frame::Frame;
use crate::frame_tree::FrameId;
use crate::page::Page;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FocusDirection {
    Forward,
    Backward,
}

fn step(document: &dyn Document, direction: FocusDirection, from: Option<NodeId>) -> Option<NodeId> {
    match direction {
        FocusDirection::Forward => document.next_focusable_node(from),
        FocusDirection::Backward => document.previous_focusable_node(from),
    }
}

/// Descend through frame owners until a focusable node or the deepest owner.
fn deep_focusable_node(
    direction: FocusDirection,
    mut frame: Rc<Frame>,
    mut node: NodeId,
) -> (Rc<Frame>, NodeId) {
    while let Some(child) = frame.child_frame_for_owner(node) {
        let Some(document) = child.document() else {
            break;
        };
        match step(document.as_ref(), direction, None) {
            Some(inner) => {
                frame = child;
                node = inner;
            }
            None => break,
        }
    }
    (frame, node)
}

/// Tracks the focused frame of a page.
#[derive(Debug)]
pub struct FocusController {
    page: Weak<Page>,
    focused_frame: Cell<Option<FrameId>>,
    is_active: Cell<bool>,
}

impl FocusController {
    pub(crate) fn new(page: Weak<Page>) -> Self {
        Self {
            page,
            focused_frame: Cell::new(None),
            is_active: Cell::new(false),
        }
    }

    #[must_use]
    pub fn focused_frame(&self) -> Option<Rc<Frame>> {
        let page = self.page.upgrade()?;
        page.frame(self.focused_frame.get()?)
    }

    #[must_use]
    pub fn focused_or_main_frame(&self) -> Option<Rc<Frame>> {
        self.focused_frame()
            .or_else(|| self.page.upgrade()?.main_frame())
    }

    /// Move frame focus, firing window blur on the old frame and focus on
    /// the new one.
    pub fn set_focused_frame(&self, frame: Option<&Rc<Frame>>) {
        let new_id = frame.map(|f| f.id());
        if self.focused_frame.get() == new_id {
            return;
        }
        let old = self.focused_frame();
        self.focused_frame.set(new_id);
        trace!(from = ?old.as_ref().map(|f| f.id()), to = ?new_id, "focused frame changed");

        if let Some(old) = old
            && old.view().is_some()
        {
            old.selection().set_focused(false);
            if let Some(doc) = old.document() {
                doc.dispatch_window_event(EventType::Blur);
            }
        }
        if let Some(new) = frame
            && new.view().is_some()
        {
            new.selection().set_focused(true);
            if let Some(doc) = new.document() {
                doc.dispatch_window_event(EventType::Focus);
            }
        }
    }

    pub fn set_active(&self, active: bool) {
        self.is_active.set(active);
        if let Some(frame) = self.focused_or_main_frame() {
            frame.selection().set_active(active);
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active.get()
    }

    /// Focus `node` in `frame`'s document, or clear focus when `None`.
    ///
    /// Returns `false` when the currently focused editable root refuses to
    /// end editing; the caller treats that as a swallowed event.
    pub fn set_focused_node(&self, node: Option<NodeId>, frame: &Rc<Frame>) -> bool {
        let Some(page) = self.page.upgrade() else {
            return false;
        };
        let old_frame = self.focused_frame();
        let old_document = old_frame.as_ref().and_then(|f| f.document());
        let old_node = old_document.as_ref().and_then(|d| d.focused_node());

        let same_document = match (&old_document, frame.document()) {
            (Some(old), Some(new)) => old.id() == new.id(),
            _ => false,
        };
        if same_document && old_node == node {
            return true;
        }

        if let (Some(old_doc), Some(old_node)) = (&old_document, old_node)
            && old_doc.root_editable_element(old_node) == Some(old_node)
            && !page.editor_client().should_end_editing(old_node)
        {
            debug!(?old_node, "editable root refused to give up focus");
            return false;
        }

        if let Some(old_frame) = &old_frame {
            clear_selection_if_needed(old_frame, frame, node);
        }

        let Some(node) = node else {
            if let Some(old_doc) = &old_document {
                old_doc.set_focused_node(None);
            }
            page.editor_client().set_input_method_state(false);
            return true;
        };

        let Some(new_document) = frame.document() else {
            return false;
        };
        if new_document.focused_node() == Some(node) {
            page.editor_client()
                .set_input_method_state(new_document.is_content_editable(node));
            return true;
        }
        if let Some(old_doc) = &old_document
            && old_doc.id() != new_document.id()
        {
            old_doc.set_focused_node(None);
        }

        self.set_focused_frame(Some(frame));
        new_document.set_focused_node(Some(node));
        page.editor_client()
            .set_input_method_state(new_document.is_content_editable(node));
        true
    }

    /// Move focus to the next (or previous) focusable node of the page.
    ///
    /// Searches the focused frame's document from its focused node, climbs
    /// to parent documents when it runs out, descends into subframes it
    /// lands on, and finally offers focus to the chrome or wraps to the start
    /// of the main frame.
    pub fn advance_focus(&self, direction: FocusDirection) -> bool {
        let Some(page) = self.page.upgrade() else {
            return false;
        };
        let Some(start_frame) = self.focused_or_main_frame() else {
            return false;
        };
        let Some(document) = start_frame.document() else {
            return false;
        };

        let mut frame = Rc::clone(&start_frame);
        let mut found = step(document.as_ref(), direction, document.focused_node())
            .map(|n| (Rc::clone(&frame), n));
        while found.is_none() {
            let (Some(parent), Some(owner)) = (frame.parent(), frame.owner_element()) else {
                break;
            };
            let Some(parent_document) = parent.document() else {
                break;
            };
            found = step(parent_document.as_ref(), direction, Some(owner))
                .map(|n| (Rc::clone(&parent), n));
            frame = parent;
        }
        let mut found = found.map(|(f, n)| deep_focusable_node(direction, f, n));

        if found.is_none() {
            if page.chrome().can_take_focus(direction) {
                document.set_focused_node(None);
                self.set_focused_frame(None);
                page.chrome().take_focus(direction);
                return true;
            }
            let Some(main) = page.main_frame() else {
                return false;
            };
            let Some(main_document) = main.document() else {
                return false;
            };
            found = step(main_document.as_ref(), direction, None)
                .map(|n| deep_focusable_node(direction, Rc::clone(&main), n));
        }
        let Some((target_frame, node)) = found else {
            return false;
        };

        if target_frame.id() == start_frame.id() && document.focused_node() == Some(node) {
            return true;
        }

        if let Some(content) = target_frame.child_frame_for_owner(node) {
            document.set_focused_node(None);
            self.set_focused_frame(Some(&content));
            return true;
        }

        if target_frame.id() != start_frame.id() {
            document.set_focused_node(None);
        }
        self.set_focused_frame(Some(&target_frame));
        let Some(target_document) = target_frame.document() else {
            return false;
        };
        trace!(frame = %target_frame.id(), ?node, ?direction, "focus advanced");
        target_document.set_focused_node(Some(node))
    }
}

fn clear_selection_if_needed(old_frame: &Rc<Frame>, new_frame: &Rc<Frame>, new_node: Option<NodeId>) {
    let (Some(old_doc), Some(new_doc)) = (old_frame.document(), new_frame.document()) else {
        return;
    };
    if old_doc.id() != new_doc.id() {
        return;
    }
    let selection = old_frame.selection().selection();
    let Some(start_node) = selection.start_node() else {
        return;
    };
    if let Some(node) = new_node
        && (start_node == node
            || old_doc.is_descendant_of(start_node, node)
            || old_doc.shadow_ancestor_node(start_node) == node)
    {
        return;
    }
    if let Some(press) = new_frame.event_handler().mouse_press_node()
        && !new_doc.can_start_selection(press)
        && selection.start_node().is_some_and(|n| old_doc.root_editable_element(n).is_none())
    {
        return;
    }
    old_frame.clear_selection();
}
