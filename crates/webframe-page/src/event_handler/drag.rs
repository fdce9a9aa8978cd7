#![forbid(unsafe_code)]

//! Drag and drop, both as the source of a drag and as its destination.
//!
//! As a destination the handler tracks one drag target node. When the
//! target changes, the new node is entered before the old one is left;
//! existing content depends on that order. Frame owner targets forward the
//! whole exchange to the subframe's handler instead of receiving events.

use std::rc::Rc;

use tracing::{debug, trace};
use webframe_core::event::{MouseButton, MouseEventKind, PlatformMouseEvent};
use webframe_core::gesture::DragSourceKind;

use super::{subframe_for_target_node, EventHandler};
use crate::dom::{DomEvent, EventDetail, EventType, NodeId};
use crate::frame::Frame;
use crate::hit_test::{HitTestRequest, MouseEventWithHitTestResults};

impl EventHandler {
    // -----------------------------------------------------------------------
    // Drag source
    // -----------------------------------------------------------------------

    /// Node being dragged out of this frame, with its kind.
    #[must_use]
    pub fn drag_source(&self) -> Option<(NodeId, DragSourceKind)> {
        self.drag_source.get()
    }

    /// Find the node a press may drag, remembering it as the drag source.
    fn find_drag_source(&self, frame: &Frame) -> Option<(NodeId, DragSourceKind)> {
        let document = frame.document()?;
        let render = document.renderer()?;
        let press = self.mouse_down_pos.get();
        let hit = render.hit_test(HitTestRequest::READ_ONLY, press);
        let node = hit.inner_node?;
        let in_selection = render
            .position_for_point(node, hit.local_point)
            .is_some_and(|position| frame.selection().selection().contains(position, document.as_ref()));
        match document.draggable_node(node) {
            Some((source, DragSourceKind::General)) if in_selection => Some((source, DragSourceKind::Text)),
            Some(source) => Some(source),
            None if in_selection => Some((node, DragSourceKind::Text)),
            None => None,
        }
    }

    /// Start or continue a drag for a move with the button held. Returns
    /// `true` when the move belongs to the drag and no selection handling
    /// should follow.
    pub(super) fn handle_drag(&self, frame: &Rc<Frame>, mev: &MouseEventWithHitTestResults) -> bool {
        if mev.event.button != MouseButton::Left || mev.event.kind != MouseEventKind::Moved {
            return false;
        }
        if !self.mouse_pressed.get() {
            return false;
        }

        if self.mouse_down_may_start_drag.get() && self.drag_source.get().is_none() {
            let source = self.find_drag_source(frame);
            self.drag_source.set(source);
            if source.is_none() {
                self.mouse_down_may_start_drag.set(false);
            }
        }

        // Dragging a selection needs a pause after the press; a quick
        // gesture extends the selection instead.
        if self.mouse_down_may_start_drag.get()
            && let Some((_, DragSourceKind::Text)) = self.drag_source.get()
            && mev.event.timestamp.saturating_sub(self.mouse_down_timestamp.get())
                < self.config.drag.text_drag_delay()
        {
            trace!("press in selection moved too soon; selecting instead of dragging");
            self.mouse_down_may_start_drag.set(false);
            self.drag_source.set(None);
        }

        if !self.mouse_down_may_start_drag.get() {
            return !self.mouse_down_may_start_select.get() && !self.mouse_down_may_start_autoscroll.get();
        }
        let Some((source, kind)) = self.drag_source.get() else {
            return false;
        };
        let Some(view) = frame.view() else {
            return false;
        };
        let delta = view.window_to_contents(mev.event.position) - self.mouse_down_pos.get();
        if !self.hysteresis.exceeded(kind, delta) {
            return true;
        }

        // Past the hysteresis the gesture is no longer a click.
        self.invalidate_click();
        let allowed = !self.dispatch_drag_source_event(frame, EventType::DragStart, &mev.event);
        let source_alive = frame.document().is_some_and(|document| document.contains_node(source));
        let mut started = false;
        if allowed && source_alive {
            started = frame.page().is_some_and(|page| page.chrome().start_drag(frame.id(), source));
            if !started {
                self.dispatch_drag_source_event(frame, EventType::DragEnd, &mev.event);
            }
        }
        if started {
            debug!(?source, ?kind, "drag started");
        } else {
            self.drag_source.set(None);
        }
        self.mouse_down_may_start_drag.set(false);
        true
    }

    /// The platform drag session begun by this frame ended.
    pub fn drag_source_ended_at(&self, event: &PlatformMouseEvent) {
        if let Some(frame) = self.frame()
            && self.drag_source.get().is_some()
        {
            self.dispatch_drag_source_event(&frame, EventType::DragEnd, event);
        }
        self.drag_source.set(None);
    }

    /// Dispatch a drag event at the drag source. Returns whether it was
    /// default-prevented.
    fn dispatch_drag_source_event(&self, frame: &Frame, event_type: EventType, event: &PlatformMouseEvent) -> bool {
        let Some((source, _)) = self.drag_source.get() else {
            return false;
        };
        self.dispatch_drag_event(frame, event_type, source, event)
    }

    // -----------------------------------------------------------------------
    // Drag destination
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn drag_target(&self) -> Option<NodeId> {
        self.drag_target.get()
    }

    fn dispatch_drag_event(
        &self,
        frame: &Frame,
        event_type: EventType,
        target: NodeId,
        event: &PlatformMouseEvent,
    ) -> bool {
        let Some(view) = frame.view() else {
            return false;
        };
        let Some(document) = frame.document() else {
            return false;
        };
        view.reset_deferred_repaint_delay();
        let dom_event = DomEvent::new(event_type, target)
            .with_detail(EventDetail::Mouse(self.mouse_detail(frame, event, 0)));
        document
            .dispatch_event(&dom_event)
            .including_initial(&dom_event)
            .default_prevented
    }

    /// A drag session moved over this frame. Returns whether the current
    /// target accepts the drop.
    pub fn update_drag_and_drop(&self, event: &PlatformMouseEvent) -> bool {
        let Some(frame) = self.frame() else {
            return false;
        };
        if frame.view().is_none() {
            return false;
        }
        let Some(document) = frame.document() else {
            return false;
        };
        let Some(mev) = self.prepare_mouse_event(&frame, HitTestRequest::READ_ONLY, event) else {
            return false;
        };
        // Drag events never target text nodes.
        let new_target = mev.target_node().map(|node| {
            let node = if document.is_text_node(node) {
                document.parent_node(node).unwrap_or(node)
            } else {
                node
            };
            document.shadow_ancestor_node(node)
        });

        let mut accept = false;
        let old_target = self.drag_target.get();
        if old_target != new_target {
            if let Some(target) = new_target {
                accept = match subframe_for_target_node(&frame, target) {
                    Some(subframe) => subframe.event_handler().update_drag_and_drop(event),
                    None => self.dispatch_drag_event(&frame, EventType::DragEnter, target, event),
                };
            }
            if let Some(old) = old_target {
                match frame.child_frame_for_owner(old) {
                    Some(subframe) => accept = subframe.event_handler().update_drag_and_drop(event),
                    None => {
                        self.dispatch_drag_event(&frame, EventType::DragLeave, old, event);
                    }
                }
            }
            trace!(from = ?old_target, to = ?new_target, "drag target changed");
        } else if let Some(target) = new_target {
            accept = match subframe_for_target_node(&frame, target) {
                Some(subframe) => subframe.event_handler().update_drag_and_drop(event),
                None => self.dispatch_drag_event(&frame, EventType::DragOver, target, event),
            };
        }
        self.drag_target.set(new_target);
        accept
    }

    /// The drag session left or was cancelled.
    pub fn cancel_drag_and_drop(&self, event: &PlatformMouseEvent) {
        if let Some(frame) = self.frame()
            && let Some(target) = self.drag_target.get()
        {
            match frame.child_frame_for_owner(target) {
                Some(subframe) => subframe.event_handler().cancel_drag_and_drop(event),
                None => {
                    self.dispatch_drag_event(&frame, EventType::DragLeave, target, event);
                }
            }
        }
        self.clear_drag_state();
    }

    /// Drop onto the current target. Returns whether the drop was accepted.
    pub fn perform_drag_and_drop(&self, event: &PlatformMouseEvent) -> bool {
        let mut accept = false;
        if let Some(frame) = self.frame()
            && let Some(target) = self.drag_target.get()
        {
            accept = match frame.child_frame_for_owner(target) {
                Some(subframe) => subframe.event_handler().perform_drag_and_drop(event),
                None => self.dispatch_drag_event(&frame, EventType::Drop, target, event),
            };
        }
        self.clear_drag_state();
        accept
    }

    pub fn clear_drag_state(&self) {
        self.drag_target.set(None);
        self.capturing_node.set(None);
    }
}
