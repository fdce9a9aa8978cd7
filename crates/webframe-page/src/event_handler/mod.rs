#![forbid(unsafe_code)]

//! Input routing for one frame.
//!
//! An [`EventHandler`] receives platform input addressed to its frame,
//! hit-tests it against the frame's render tree, and turns it into DOM
//! events. Input that lands on a subframe's widget is handed to that
//! subframe's own handler; nothing is shared between handlers except by
//! such explicit calls.
//!
//! The handler is a set of overlapping state flags rather than one enum:
//! a press may be pending click disambiguation, capturing, selecting,
//! autoscrolling, pan-scrolling, resizing a layer, or dragging, and several
//! of these hold at once.
//!
//! # Invariants
//!
//! 1. `mouseout` for the previous node under the mouse is dispatched before
//!    `mouseover` for the new one, and a node is entered at most once
//!    between exits.
//! 2. `click` fires only when press and release resolve to the same node
//!    and the button is not the context-menu button.
//! 3. While a node captures mouse events, moves and releases resolve to it
//!    regardless of the hit test.
//! 4. Every timer this handler starts is stopped by [`EventHandler::clear`]
//!    or by the transition that ends its mode.
//!
//! # Failure Modes
//!
//! When the frame, its view, or its document is gone, every entry point
//! returns `false` (not swallowed). Dispatch may run script that tears the
//! frame down; entry points hold an `Rc` to the frame and its view for the
//! duration of the call and re-check collaborators after each dispatch.

mod autoscroll;
mod drag;
mod keyboard;
mod mouse;
mod wheel;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::trace;
use webframe_core::config::EngineConfig;
use webframe_core::event::PlatformMouseEvent;
use webframe_core::event_loop::{EventLoop, Timer};
use webframe_core::geometry::{IntPoint, IntSize};
use webframe_core::gesture::{ClickCounter, DragHysteresis, DragSourceKind};

use crate::dom::{DocumentId, DomEvent, EventDetail, EventType, MouseEventDetail, NodeId};
use crate::frame::Frame;
use crate::frame_tree::FrameId;
use crate::hit_test::{HitTestRequest, HitTestResult, MouseEventWithHitTestResults};
use crate::render::ScrollbarId;

/// Per-frame input state machine.
pub struct EventHandler {
    frame: Weak<Frame>,
    config: Rc<EngineConfig>,
    event_loop: Rc<EventLoop>,
    hysteresis: DragHysteresis,
    click_counter: RefCell<ClickCounter>,
    last_counted_node: Cell<Option<NodeId>>,

    mouse_pressed: Cell<bool>,
    current_mouse_position: Cell<IntPoint>,
    mouse_down_pos: Cell<IntPoint>,
    drag_start_pos: Cell<IntPoint>,
    mouse_down_timestamp: Cell<Duration>,
    mouse_down_may_start_drag: Cell<bool>,
    mouse_down_may_start_select: Cell<bool>,
    mouse_down_may_start_autoscroll: Cell<bool>,
    mouse_down_was_single_click_in_selection: Cell<bool>,
    mouse_down_was_in_subframe: Cell<bool>,
    began_selecting_text: Cell<bool>,
    captures_dragging: Cell<bool>,
    mouse_press_node: Cell<Option<NodeId>>,

    click_count: Cell<u32>,
    click_node: Cell<Option<NodeId>>,
    capturing_node: Cell<Option<NodeId>>,
    node_under_mouse: Cell<Option<NodeId>>,
    last_node_under_mouse: Cell<Option<(DocumentId, NodeId)>>,
    last_mouse_move_subframe: Cell<Option<FrameId>>,
    last_scrollbar_under_mouse: Cell<Option<ScrollbarId>>,
    hover_timer: Timer,

    resize_layer: Cell<Option<NodeId>>,
    offset_from_resize_corner: Cell<IntSize>,

    autoscroll_timer: Timer,
    autoscroll_target: Cell<Option<(FrameId, NodeId)>>,
    autoscroll_in_progress: Cell<bool>,
    pan_scroll_in_progress: Cell<bool>,
    pan_scroll_start: Cell<IntPoint>,
    pan_ticks: Cell<u32>,

    drag_source: Cell<Option<(NodeId, DragSourceKind)>>,
    drag_target: Cell<Option<NodeId>>,
}

impl std::fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandler")
            .field("mouse_pressed", &self.mouse_pressed.get())
            .field("click_count", &self.click_count.get())
            .field("capturing_node", &self.capturing_node.get())
            .field("node_under_mouse", &self.node_under_mouse.get())
            .field("autoscroll_in_progress", &self.autoscroll_in_progress.get())
            .field("pan_scroll_in_progress", &self.pan_scroll_in_progress.get())
            .finish_non_exhaustive()
    }
}

fn frame_timer(
    event_loop: &Rc<EventLoop>,
    label: &'static str,
    frame: &Weak<Frame>,
    fired: fn(&EventHandler),
) -> Timer {
    let frame = frame.clone();
    Timer::new(event_loop, label, move || {
        if let Some(frame) = frame.upgrade() {
            fired(frame.event_handler());
        }
    })
}

impl EventHandler {
    pub(crate) fn new(frame: Weak<Frame>, event_loop: &Rc<EventLoop>, config: &Rc<EngineConfig>) -> Self {
        Self {
            hover_timer: frame_timer(event_loop, "event_handler.hover", &frame, Self::hover_timer_fired),
            autoscroll_timer: frame_timer(
                event_loop,
                "event_handler.autoscroll",
                &frame,
                Self::autoscroll_timer_fired,
            ),
            frame,
            config: Rc::clone(config),
            event_loop: Rc::clone(event_loop),
            hysteresis: DragHysteresis::new(config.drag.clone()),
            click_counter: RefCell::new(ClickCounter::new(config.click.clone())),
            last_counted_node: Cell::new(None),
            mouse_pressed: Cell::new(false),
            current_mouse_position: Cell::new(IntPoint::zero()),
            mouse_down_pos: Cell::new(IntPoint::zero()),
            drag_start_pos: Cell::new(IntPoint::zero()),
            mouse_down_timestamp: Cell::new(Duration::ZERO),
            mouse_down_may_start_drag: Cell::new(false),
            mouse_down_may_start_select: Cell::new(false),
            mouse_down_may_start_autoscroll: Cell::new(false),
            mouse_down_was_single_click_in_selection: Cell::new(false),
            mouse_down_was_in_subframe: Cell::new(false),
            began_selecting_text: Cell::new(false),
            captures_dragging: Cell::new(false),
            mouse_press_node: Cell::new(None),
            click_count: Cell::new(0),
            click_node: Cell::new(None),
            capturing_node: Cell::new(None),
            node_under_mouse: Cell::new(None),
            last_node_under_mouse: Cell::new(None),
            last_mouse_move_subframe: Cell::new(None),
            last_scrollbar_under_mouse: Cell::new(None),
            resize_layer: Cell::new(None),
            offset_from_resize_corner: Cell::new(IntSize::default()),
            autoscroll_target: Cell::new(None),
            autoscroll_in_progress: Cell::new(false),
            pan_scroll_in_progress: Cell::new(false),
            pan_scroll_start: Cell::new(IntPoint::zero()),
            pan_ticks: Cell::new(0),
            drag_source: Cell::new(None),
            drag_target: Cell::new(None),
        }
    }

    /// Forget all transient state. Runs whenever the frame's view is
    /// replaced.
    pub fn clear(&self) {
        self.hover_timer.stop();
        self.resize_layer.set(None);
        self.node_under_mouse.set(None);
        self.last_node_under_mouse.set(None);
        self.last_mouse_move_subframe.set(None);
        self.last_scrollbar_under_mouse.set(None);
        self.click_count.set(0);
        self.click_node.set(None);
        self.drag_target.set(None);
        self.drag_source.set(None);
        self.current_mouse_position.set(IntPoint::zero());
        self.mouse_press_node.set(None);
        self.mouse_pressed.set(false);
        self.captures_dragging.set(false);
        self.capturing_node.set(None);
        self.click_counter.borrow_mut().reset();
        self.last_counted_node.set(None);
        trace!("event handler cleared");
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn frame(&self) -> Option<Rc<Frame>> {
        self.frame.upgrade()
    }

    #[must_use]
    pub fn mouse_pressed(&self) -> bool {
        self.mouse_pressed.get()
    }

    /// Last mouse position seen, window coordinates.
    #[must_use]
    pub fn current_mouse_position(&self) -> IntPoint {
        self.current_mouse_position.get()
    }

    #[must_use]
    pub fn mouse_press_node(&self) -> Option<NodeId> {
        self.mouse_press_node.get()
    }

    #[must_use]
    pub fn click_count(&self) -> u32 {
        self.click_count.get()
    }

    #[must_use]
    pub fn capturing_node(&self) -> Option<NodeId> {
        self.capturing_node.get()
    }

    /// Route later moves and releases to `node` until released.
    pub fn set_capturing_node(&self, node: Option<NodeId>) {
        trace!(?node, "mouse capture changed");
        self.capturing_node.set(node);
    }

    #[must_use]
    pub fn node_under_mouse(&self) -> Option<NodeId> {
        self.node_under_mouse.get()
    }

    #[must_use]
    pub fn resize_layer(&self) -> Option<NodeId> {
        self.resize_layer.get()
    }

    fn invalidate_click(&self) {
        self.click_count.set(0);
        self.click_node.set(None);
    }

    /// Forget earlier presses so the next one counts from 1.
    fn reset_click_sequence(&self) {
        self.click_counter.borrow_mut().reset();
        self.last_counted_node.set(None);
    }

    // -----------------------------------------------------------------------
    // Hit testing
    // -----------------------------------------------------------------------

    /// Hit-test `event` against this frame's render tree. Non read-only
    /// requests update hover and active state on the document.
    fn prepare_mouse_event(
        &self,
        frame: &Frame,
        request: HitTestRequest,
        event: &PlatformMouseEvent,
    ) -> Option<MouseEventWithHitTestResults> {
        let document = frame.document()?;
        let view = frame.view()?;
        let point = view.window_to_contents(event.position);
        let mut hit = match document.renderer() {
            Some(render) => render.hit_test(request, point),
            None => HitTestResult::new(point),
        };
        hit.frame = Some(frame.id());
        if !request.contains(HitTestRequest::READ_ONLY) {
            document.update_hover_state(request, hit.inner_node);
        }
        Some(MouseEventWithHitTestResults::new(event.clone(), hit))
    }

    /// Hit-test a contents point, descending into subframes under it.
    ///
    /// With `allow_shadow_content` unset, nodes inside shadow trees are
    /// replaced by their hosts.
    #[must_use]
    pub fn hit_test_result_at_point(&self, point: IntPoint, allow_shadow_content: bool) -> HitTestResult {
        let request = HitTestRequest::READ_ONLY | HitTestRequest::ACTIVE;
        let Some(mut frame) = self.frame() else {
            return HitTestResult::new(point);
        };
        let mut point = point;
        loop {
            let Some(document) = frame.document() else {
                return HitTestResult::new(point);
            };
            let Some(render) = document.renderer() else {
                return HitTestResult::new(point);
            };
            let mut result = render.hit_test(request, point);
            result.frame = Some(frame.id());
            if !allow_shadow_content {
                result.set_to_non_shadow_ancestor(document.as_ref());
            }
            let child = result
                .inner_node
                .filter(|_| result.is_over_widget)
                .and_then(|node| subframe_for_target_node(&frame, node));
            let Some(child) = child else {
                return result;
            };
            let Some(child_view) = child.view() else {
                return result;
            };
            point = result.local_point + child_view.scroll_offset();
            trace!(child = %child.id(), ?point, "hit test descends into subframe");
            frame = child;
        }
    }

    fn subframe_for_hit(frame: &Frame, mev: &MouseEventWithHitTestResults) -> Option<Rc<Frame>> {
        if !mev.hit.is_over_widget {
            return None;
        }
        subframe_for_target_node(frame, mev.target_node()?)
    }

    // -----------------------------------------------------------------------
    // Mouse event dispatch
    // -----------------------------------------------------------------------

    fn mouse_detail(&self, frame: &Frame, event: &PlatformMouseEvent, click_count: u32) -> MouseEventDetail {
        let client = frame
            .view()
            .map_or(event.position, |view| view.window_to_contents(event.position));
        MouseEventDetail {
            button: event.button,
            click_count,
            client,
            screen: event.global_position,
            modifiers: event.modifiers,
        }
    }

    /// Resolve the node mouse events go to and, with `set_under_mouse`,
    /// fire the `mouseout` / `mouseover` pair for a change of node.
    fn update_mouse_event_target_node(
        &self,
        frame: &Frame,
        target: Option<NodeId>,
        event: &PlatformMouseEvent,
        set_under_mouse: bool,
    ) {
        let Some(document) = frame.document() else {
            return;
        };
        let resolved = match self.capturing_node.get() {
            Some(capture) => Some(capture),
            None => target.map(|node| {
                let node = if document.is_text_node(node) {
                    document.parent_node(node).unwrap_or(node)
                } else {
                    node
                };
                document.shadow_ancestor_node(node)
            }),
        };
        self.node_under_mouse.set(resolved);
        if !set_under_mouse {
            return;
        }

        let last = match self.last_node_under_mouse.get() {
            Some((doc_id, node)) if doc_id == document.id() && document.contains_node(node) => Some(node),
            Some((doc_id, _)) => {
                if doc_id != document.id() {
                    self.last_scrollbar_under_mouse.set(None);
                }
                None
            }
            None => None,
        };
        if last != resolved {
            let detail = EventDetail::Mouse(self.mouse_detail(frame, event, 0));
            if let Some(last) = last {
                let out = DomEvent::new(EventType::MouseOut, last)
                    .with_related_target(resolved)
                    .with_detail(detail.clone());
                document.dispatch_event(&out);
            }
            if let Some(node) = resolved {
                let over = DomEvent::new(EventType::MouseOver, node)
                    .with_related_target(last)
                    .with_detail(detail);
                document.dispatch_event(&over);
            }
        }
        self.last_node_under_mouse.set(resolved.map(|node| (document.id(), node)));
    }

    /// Dispatch a mouse DOM event at the node under the mouse. Returns
    /// whether it was swallowed.
    ///
    /// An unswallowed `mousedown` moves focus to the nearest focusable
    /// render ancestor of the target, or clears focus.
    fn dispatch_mouse_event(
        &self,
        frame: &Rc<Frame>,
        event_type: EventType,
        target: Option<NodeId>,
        cancelable: bool,
        click_count: u32,
        event: &PlatformMouseEvent,
        set_under_mouse: bool,
    ) -> bool {
        if let Some(view) = frame.view() {
            view.reset_deferred_repaint_delay();
        }
        self.update_mouse_event_target_node(frame, target, event, set_under_mouse);

        let mut swallowed = false;
        if let Some(node) = self.node_under_mouse.get()
            && let Some(document) = frame.document()
        {
            let dom_event = DomEvent::new(event_type, node)
                .with_cancelable(cancelable)
                .with_detail(EventDetail::Mouse(self.mouse_detail(frame, event, click_count)));
            swallowed = document
                .dispatch_event(&dom_event)
                .including_initial(&dom_event)
                .swallowed();
        }

        if !swallowed && event_type == EventType::MouseDown {
            return self.transfer_focus_for_press(frame);
        }
        swallowed
    }

    /// Returns `true` when the focus change was refused, which swallows the
    /// press.
    fn transfer_focus_for_press(&self, frame: &Rc<Frame>) -> bool {
        let Some(document) = frame.document() else {
            return false;
        };
        let mut node = self.node_under_mouse.get();
        if let Some(render) = document.renderer() {
            let mut current = node.filter(|n| render.has_renderer(*n));
            node = None;
            while let Some(candidate) = current {
                if document.is_focusable(candidate) {
                    node = Some(candidate);
                    break;
                }
                current = render.parent_renderer(candidate);
            }
        }

        if let Some(candidate) = node {
            let host = document.shadow_ancestor_node(candidate);
            let selection = frame.selection().selection();
            if selection.is_range()
                && let Some(range) = selection.to_range()
                && document.range_contains_node(&range, host)
                && let Some(focused) = document.focused_node()
                && document.is_descendant_of(host, focused)
            {
                trace!(?host, "press inside focused range selection keeps focus");
                return false;
            }
        }

        let Some(page) = frame.page() else {
            return false;
        };
        let accepted = match node {
            Some(candidate) if document.is_mouse_focusable(candidate) => {
                page.focus_controller().set_focused_node(Some(candidate), frame)
            }
            Some(candidate) if document.focused_node() == Some(candidate) => true,
            _ => page.focus_controller().set_focused_node(None, frame),
        };
        !accepted
    }

    // -----------------------------------------------------------------------
    // Hover
    // -----------------------------------------------------------------------

    /// Refresh hover state at the last mouse position on the next turn.
    pub fn schedule_hover_state_update(&self) {
        if !self.hover_timer.is_active() {
            self.hover_timer.start_one_shot(Duration::ZERO);
        }
    }

    fn hover_timer_fired(&self) {
        self.hover_timer.stop();
        let Some(frame) = self.frame() else {
            return;
        };
        let (Some(document), Some(view)) = (frame.document(), frame.view()) else {
            return;
        };
        let Some(render) = document.renderer() else {
            return;
        };
        let point = view.window_to_contents(self.current_mouse_position.get());
        let hit = render.hit_test(HitTestRequest::MOUSE_MOVE, point);
        document.update_hover_state(HitTestRequest::MOUSE_MOVE, hit.inner_node);
    }

    // -----------------------------------------------------------------------
    // Pending unload listeners
    // -----------------------------------------------------------------------

    /// Count an `unload` (or `beforeunload`) listener against the page.
    pub fn add_pending_unload_event_listener(&self, before_unload: bool) {
        self.change_pending_unload_count(before_unload, 1);
    }

    pub fn remove_pending_unload_event_listener(&self, before_unload: bool) {
        self.change_pending_unload_count(before_unload, -1);
    }

    fn change_pending_unload_count(&self, before_unload: bool, delta: i32) {
        let Some(page) = self.frame().and_then(|frame| frame.page()) else {
            return;
        };
        if before_unload {
            page.change_pending_before_unload_event_count(delta);
        } else {
            page.change_pending_unload_event_count(delta);
        }
    }
}

/// The subframe hosted by `node`, if it has a view to receive input.
fn subframe_for_target_node(frame: &Frame, node: NodeId) -> Option<Rc<Frame>> {
    frame.child_frame_for_owner(node).filter(|child| child.view().is_some())
}

/// Walk render ancestors of `node` for a box that can be scrolled
/// programmatically, stepping out to the owner element at a document root.
fn find_scrollable_ancestor(frame: &Rc<Frame>, node: NodeId) -> Option<(Rc<Frame>, NodeId)> {
    let mut frame = Rc::clone(frame);
    let mut current = Some(node);
    loop {
        let document = frame.document()?;
        let render = document.renderer()?;
        while let Some(node) = current {
            if render.has_renderer(node) && render.can_be_programmatically_scrolled(node) {
                return Some((frame, node));
            }
            current = render.parent_renderer(node);
        }
        let owner = frame.owner_element()?;
        let parent = frame.parent()?;
        current = Some(owner);
        frame = parent;
    }
}

fn is_main_frame_pan_scrolling(frame: &Frame) -> bool {
    frame
        .page()
        .and_then(|page| page.main_frame())
        .is_some_and(|main| main.event_handler().pan_scroll_in_progress())
}
