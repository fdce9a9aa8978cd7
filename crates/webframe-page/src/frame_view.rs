#![forbid(unsafe_code)]

//! The scrollable view of one frame.
//!
//! [`FrameView`] owns three pieces of scheduling state:
//!
//! - **Layout**: a debounced one-shot layout timer, an optional subtree
//!   layout root, and the re-entrancy state of [`FrameView::layout`].
//! - **Repaint coalescing**: while repaints are deferred, dirty rects
//!   accumulate here instead of reaching the chrome. Deferral state lives on
//!   the main frame's view; subframe views forward to it.
//! - **Scheduled events**: events raised during layout (resize, overflow)
//!   are queued and delivered when the outermost layout finishes.
//!
//! It also keeps the scroll offset and converts between window and
//! contents coordinates through the chain of parent views.
//!
//! # Invariants
//!
//! 1. `layout` never re-enters itself: a call made while a layout pass is
//!    running returns immediately.
//! 2. At most one layout root is pending. A second subtree request keeps the
//!    broader of the two roots, or falls back to a full layout when neither
//!    contains the other.
//! 3. The pending repaint list never holds more than the union threshold;
//!    reaching it collapses the list into one rect that absorbs every later
//!    rect, so no dirty area is lost.
//! 4. Deferred repaints are flushed exactly once per outermost
//!    `end_deferred_repaints`, unless a repaint timer is running.
//! 5. Post-layout work that makes layout needed again schedules a zero-delay
//!    follow-up layout instead of recursing.
//!
//! # Failure Modes
//!
//! A view whose frame, document, or render tree is gone treats every
//! layout request as a no-op. Unbalanced `end_deferred_repaints` /
//! `resume_scheduled_events` calls are logged and ignored.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{debug, debug_span, trace, warn};
use webframe_core::config::EngineConfig;
use webframe_core::event::{PlatformWheelEvent, WheelGranularity};
use webframe_core::event_loop::{EventLoop, Timer};
use webframe_core::geometry::{IntPoint, IntRect, IntSize};
use webframe_core::reentrancy::{DeferredQueue, ReentrancyGuard};

use crate::dom::{Document, DomEvent, NodeId};
use crate::frame::{Frame, ScrollAlignment};
use crate::render::{is_render_ancestor_or_self, RenderTree, ScrollDirection, ScrollGranularity, ScrollbarMode};

/// A frame's view.
pub struct FrameView {
    frame: Weak<Frame>,
    config: Rc<EngineConfig>,
    event_loop: Rc<EventLoop>,

    frame_rect: Cell<IntRect>,
    contents_size: Cell<IntSize>,
    scroll_offset: Cell<IntSize>,
    can_have_scrollbars: Cell<bool>,
    horizontal_mode: Cell<ScrollbarMode>,
    vertical_mode: Cell<ScrollbarMode>,

    layout_timer: Timer,
    post_layout_tasks_timer: Timer,
    layout_root: Cell<Option<NodeId>>,
    delayed_layout: Cell<bool>,
    layout_scheduling_enabled: Cell<bool>,
    mid_layout: Cell<bool>,
    nested_layout: ReentrancyGuard,
    layout_count: Cell<u32>,
    first_layout: Cell<bool>,
    do_full_repaint: Cell<bool>,
    last_layout_size: Cell<IntSize>,
    last_zoom_factor: Cell<f32>,
    widget_update_set: RefCell<Vec<NodeId>>,

    event_suspension: ReentrancyGuard,
    scheduled_events: DeferredQueue<DomEvent>,

    deferring_repaints: ReentrancyGuard,
    repaint_rects: RefCell<Vec<IntRect>>,
    repaint_count: Cell<usize>,
    deferred_repaint_delay: Cell<Duration>,
    deferred_repaint_timer: Timer,
    last_paint_time: Cell<Duration>,
}

impl std::fmt::Debug for FrameView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameView")
            .field("frame_rect", &self.frame_rect.get())
            .field("contents_size", &self.contents_size.get())
            .field("scroll_offset", &self.scroll_offset.get())
            .field("layout_pending", &self.layout_pending())
            .field("layout_root", &self.layout_root.get())
            .field("layout_count", &self.layout_count.get())
            .field("repaint_count", &self.repaint_count.get())
            .finish_non_exhaustive()
    }
}

impl FrameView {
    /// Create a view for `frame` occupying `frame_rect`: window coordinates
    /// for the main frame, the parent's contents coordinates otherwise.
    #[must_use]
    pub fn new(frame: &Rc<Frame>, frame_rect: IntRect) -> Rc<Self> {
        let event_loop = Rc::clone(frame.event_loop());
        let config = Rc::clone(frame.config());
        Rc::new_cyclic(|weak: &Weak<FrameView>| {
            let layout_weak = weak.clone();
            let post_weak = weak.clone();
            let repaint_weak = weak.clone();
            Self {
                frame: Rc::downgrade(frame),
                deferred_repaint_delay: Cell::new(Duration::from_millis(
                    config.repaint.initial_delay_during_loading_ms,
                )),
                config,
                frame_rect: Cell::new(frame_rect),
                contents_size: Cell::new(IntSize::default()),
                scroll_offset: Cell::new(IntSize::default()),
                can_have_scrollbars: Cell::new(true),
                horizontal_mode: Cell::new(ScrollbarMode::Auto),
                vertical_mode: Cell::new(ScrollbarMode::Auto),
                layout_timer: Timer::new(&event_loop, "frame_view.layout", move || {
                    if let Some(view) = layout_weak.upgrade() {
                        view.layout_timer_fired();
                    }
                }),
                post_layout_tasks_timer: Timer::new(&event_loop, "frame_view.post_layout", move || {
                    if let Some(view) = post_weak.upgrade() {
                        view.perform_post_layout_tasks();
                    }
                }),
                layout_root: Cell::new(None),
                delayed_layout: Cell::new(false),
                layout_scheduling_enabled: Cell::new(true),
                mid_layout: Cell::new(false),
                nested_layout: ReentrancyGuard::new("frame_view.layout"),
                layout_count: Cell::new(0),
                first_layout: Cell::new(true),
                do_full_repaint: Cell::new(true),
                last_layout_size: Cell::new(IntSize::default()),
                last_zoom_factor: Cell::new(100.0),
                widget_update_set: RefCell::new(Vec::new()),
                event_suspension: ReentrancyGuard::new("frame_view.scheduled_events"),
                scheduled_events: DeferredQueue::new(),
                deferring_repaints: ReentrancyGuard::new("frame_view.deferred_repaints"),
                repaint_rects: RefCell::new(Vec::new()),
                repaint_count: Cell::new(0),
                deferred_repaint_timer: Timer::new(&event_loop, "frame_view.deferred_repaint", move || {
                    if let Some(view) = repaint_weak.upgrade() {
                        view.do_deferred_repaints();
                    }
                }),
                last_paint_time: Cell::new(Duration::ZERO),
                event_loop,
            }
        })
    }

    #[must_use]
    pub fn frame(&self) -> Option<Rc<Frame>> {
        self.frame.upgrade()
    }

    /// Return every transient field to its initial state, as on navigation.
    pub fn reset(&self) {
        self.layout_timer.stop();
        self.layout_root.set(None);
        self.delayed_layout.set(false);
        self.do_full_repaint.set(true);
        self.layout_scheduling_enabled.set(true);
        self.mid_layout.set(false);
        self.layout_count.set(0);
        self.nested_layout.reset();
        self.post_layout_tasks_timer.stop();
        self.first_layout.set(true);
        self.last_layout_size.set(IntSize::default());
        self.last_zoom_factor.set(100.0);
        self.widget_update_set.borrow_mut().clear();
        self.event_suspension.reset();
        self.scheduled_events.clear();
        self.deferring_repaints.reset();
        self.repaint_rects.borrow_mut().clear();
        self.repaint_count.set(0);
        self.deferred_repaint_delay.set(Duration::from_millis(
            self.config.repaint.initial_delay_during_loading_ms,
        ));
        self.deferred_repaint_timer.stop();
        self.last_paint_time.set(Duration::ZERO);
        self.scroll_offset.set(IntSize::default());
    }

    // -----------------------------------------------------------------------
    // Geometry
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn frame_rect(&self) -> IntRect {
        self.frame_rect.get()
    }

    /// Move or resize the view. A size change invalidates layout.
    pub fn set_frame_rect(&self, rect: IntRect) {
        let old = self.frame_rect.replace(rect);
        if old.size() == rect.size() {
            return;
        }
        self.clamp_scroll_offset();
        if let Some(frame) = self.frame()
            && let Some(doc) = frame.document()
            && let Some(render) = doc.renderer()
        {
            render.set_needs_layout(render.root(), true);
        }
        self.schedule_relayout();
    }

    #[must_use]
    pub fn contents_size(&self) -> IntSize {
        self.contents_size.get()
    }

    #[must_use]
    pub fn visible_size(&self) -> IntSize {
        self.frame_rect.get().size()
    }

    /// Visible part of the contents, in contents coordinates.
    #[must_use]
    pub fn visible_content_rect(&self) -> IntRect {
        let offset = self.scroll_offset.get();
        IntRect::from_origin_size(IntPoint::new(offset.width, offset.height), self.visible_size())
    }

    #[must_use]
    pub fn scroll_offset(&self) -> IntSize {
        self.scroll_offset.get()
    }

    #[must_use]
    pub fn maximum_scroll_offset(&self) -> IntSize {
        let contents = self.contents_size.get();
        let visible = self.visible_size();
        IntSize::new(contents.width - visible.width, contents.height - visible.height).clamped_to_zero()
    }

    fn clamp_offset(&self, offset: IntSize) -> IntSize {
        let max = self.maximum_scroll_offset();
        IntSize::new(offset.width.clamp(0, max.width), offset.height.clamp(0, max.height))
    }

    fn clamp_scroll_offset(&self) {
        self.scroll_offset.set(self.clamp_offset(self.scroll_offset.get()));
    }

    /// Scroll to `offset`, clamped to the scrollable range. Returns whether
    /// the offset changed.
    pub fn set_scroll_offset(&self, offset: IntSize) -> bool {
        let clamped = self.clamp_offset(offset);
        if clamped == self.scroll_offset.replace(clamped) {
            return false;
        }
        trace!(?clamped, "view scrolled");
        self.repaint_content_rectangle(self.visible_content_rect(), false);
        if let Some(frame) = self.frame() {
            frame.send_scroll_event();
        }
        true
    }

    pub fn scroll_by(&self, delta: IntSize) -> bool {
        let offset = self.scroll_offset.get();
        self.set_scroll_offset(IntSize::new(offset.width + delta.width, offset.height + delta.height))
    }

    #[must_use]
    pub fn can_have_scrollbars(&self) -> bool {
        self.can_have_scrollbars.get()
    }

    pub fn set_can_have_scrollbars(&self, can: bool) {
        self.can_have_scrollbars.set(can);
    }

    #[must_use]
    pub fn scrollbar_modes(&self) -> (ScrollbarMode, ScrollbarMode) {
        (self.horizontal_mode.get(), self.vertical_mode.get())
    }

    pub fn set_scrollbar_modes(&self, horizontal: ScrollbarMode, vertical: ScrollbarMode) {
        self.horizontal_mode.set(horizontal);
        self.vertical_mode.set(vertical);
    }

    fn parent_view(&self) -> Option<Rc<FrameView>> {
        self.frame()?.parent()?.view()
    }

    /// Window coordinates of the main frame to this view's contents.
    #[must_use]
    pub fn window_to_contents(&self, point: IntPoint) -> IntPoint {
        let in_view = match self.parent_view() {
            Some(parent) => {
                let origin = self.frame_rect.get().origin();
                parent.window_to_contents(point) - IntSize::new(origin.x, origin.y)
            }
            None => point,
        };
        in_view + self.scroll_offset.get()
    }

    #[must_use]
    pub fn contents_to_window(&self, point: IntPoint) -> IntPoint {
        let in_view = point - self.scroll_offset.get();
        match self.parent_view() {
            Some(parent) => {
                let origin = self.frame_rect.get().origin();
                parent.contents_to_window(in_view + IntSize::new(origin.x, origin.y))
            }
            None => in_view,
        }
    }

    #[must_use]
    pub fn contents_to_window_rect(&self, rect: IntRect) -> IntRect {
        IntRect::from_origin_size(self.contents_to_window(rect.origin()), rect.size())
    }

    #[must_use]
    pub fn window_to_contents_rect(&self, rect: IntRect) -> IntRect {
        IntRect::from_origin_size(self.window_to_contents(rect.origin()), rect.size())
    }

    // -----------------------------------------------------------------------
    // Scrolling
    // -----------------------------------------------------------------------

    fn step_for(&self, granularity: ScrollGranularity, vertical: bool) -> i32 {
        let visible = self.visible_size();
        let extent = if vertical { visible.height } else { visible.width };
        match granularity {
            ScrollGranularity::Pixel => 1,
            ScrollGranularity::Line => self.config.scroll.pixels_per_line,
            ScrollGranularity::Page => {
                let keep = (f64::from(extent) * self.config.scroll.page_overlap_fraction).round() as i32;
                (extent - keep).max(1)
            }
            ScrollGranularity::Document => {
                let contents = self.contents_size.get();
                if vertical { contents.height } else { contents.width }
            }
        }
    }

    /// Scroll one step of `granularity` in `direction`. Returns whether the
    /// view moved.
    pub fn scroll(&self, direction: ScrollDirection, granularity: ScrollGranularity) -> bool {
        if !self.can_have_scrollbars.get() {
            return false;
        }
        let vertical = direction.is_vertical();
        let mut step = self.step_for(granularity, vertical);
        if direction.is_backward() {
            step = -step;
        }
        let delta = if vertical {
            IntSize::new(0, step)
        } else {
            IntSize::new(step, 0)
        };
        self.scroll_by(delta)
    }

    /// Native wheel scrolling. Accepts the event when the view can move in
    /// the direction of either delta.
    pub fn wheel_event(&self, event: &PlatformWheelEvent) {
        if !self.can_have_scrollbars.get() {
            return;
        }
        let offset = self.scroll_offset.get();
        let max = self.maximum_scroll_offset();
        let room_right = max.width - offset.width;
        let room_down = max.height - offset.height;
        let can_move = (event.delta_x < 0.0 && room_right > 0)
            || (event.delta_x > 0.0 && offset.width > 0)
            || (event.delta_y < 0.0 && room_down > 0)
            || (event.delta_y > 0.0 && offset.height > 0);
        if !can_move {
            return;
        }
        event.accept();
        let (dx, dy) = match event.granularity {
            WheelGranularity::Pixel => (event.delta_x, event.delta_y),
            WheelGranularity::Line => {
                let per_line = self.config.scroll.pixels_per_line as f32;
                (event.delta_x * per_line, event.delta_y * per_line)
            }
            WheelGranularity::Page => {
                let page_x = self.step_for(ScrollGranularity::Page, false) as f32;
                let page_y = self.step_for(ScrollGranularity::Page, true) as f32;
                (event.delta_x.signum() * page_x, event.delta_y.signum() * page_y)
            }
        };
        self.scroll_by(IntSize::new(-dx.round() as i32, -dy.round() as i32));
    }

    /// Scroll the view so `rect` (contents coordinates) becomes visible.
    pub fn scroll_rect_into_view(&self, rect: IntRect, alignment: ScrollAlignment) -> bool {
        let visible = self.visible_content_rect();
        let fully_visible = visible.contains_rect(&rect);
        let axis = |start: i32, len: i32, view_start: i32, view_len: i32| -> i32 {
            match alignment {
                ScrollAlignment::CenterIfNeeded => start + len / 2 - view_len / 2,
                ScrollAlignment::TopAlways | ScrollAlignment::ToEdgeIfNeeded => {
                    if start < view_start || len > view_len {
                        start
                    } else if start + len > view_start + view_len {
                        start + len - view_len
                    } else {
                        view_start
                    }
                }
            }
        };
        let target = match alignment {
            _ if fully_visible && alignment != ScrollAlignment::TopAlways => return false,
            ScrollAlignment::TopAlways => IntSize::new(
                axis(rect.x, rect.width, visible.x, visible.width),
                rect.y,
            ),
            _ => IntSize::new(
                axis(rect.x, rect.width, visible.x, visible.width),
                axis(rect.y, rect.height, visible.y, visible.height),
            ),
        };
        self.set_scroll_offset(target)
    }

    // -----------------------------------------------------------------------
    // Layout scheduling
    // -----------------------------------------------------------------------

    #[inline]
    #[must_use]
    pub fn layout_pending(&self) -> bool {
        self.layout_timer.is_active()
    }

    #[must_use]
    pub fn layout_root(&self) -> Option<NodeId> {
        self.layout_root.get()
    }

    #[must_use]
    pub fn is_mid_layout(&self) -> bool {
        self.mid_layout.get()
    }

    #[must_use]
    pub fn layout_count(&self) -> u32 {
        self.layout_count.get()
    }

    #[must_use]
    pub fn did_first_layout(&self) -> bool {
        !self.first_layout.get()
    }

    #[must_use]
    pub fn layout_scheduling_enabled(&self) -> bool {
        self.layout_scheduling_enabled.get()
    }

    pub fn set_layout_scheduling_enabled(&self, enabled: bool) {
        self.layout_scheduling_enabled.set(enabled);
    }

    /// Layout is pending, the render tree is dirty, a subtree root is
    /// waiting, or style must be recomputed first.
    #[must_use]
    pub fn needs_layout(&self) -> bool {
        if self.layout_pending() || self.layout_root.get().is_some() {
            return true;
        }
        let Some(frame) = self.frame() else {
            return false;
        };
        let Some(doc) = frame.document() else {
            return false;
        };
        if doc.needs_style_recalc() {
            return true;
        }
        doc.renderer().is_some_and(|render| render.needs_layout(render.root()))
    }

    fn layout_delay(&self, doc: &dyn Document) -> Duration {
        doc.minimum_layout_delay()
            .max(Duration::from_millis(self.config.layout.minimum_layout_delay_ms))
    }

    /// Schedule a full layout after the document's minimum delay.
    ///
    /// An immediate request replaces a pending delayed one; any other
    /// request while a layout is pending is absorbed by it.
    pub fn schedule_relayout(&self) {
        let Some(frame) = self.frame() else {
            return;
        };
        let Some(doc) = frame.document() else {
            return;
        };
        if let Some(root) = self.layout_root.take()
            && let Some(render) = doc.renderer()
        {
            render.mark_containing_blocks_for_layout(root, None);
        }
        if !self.layout_scheduling_enabled.get() || !self.needs_layout() || !doc.should_schedule_layout() {
            return;
        }
        let delay = self.layout_delay(doc.as_ref());
        if self.layout_pending() && self.delayed_layout.get() && delay.is_zero() {
            self.unschedule_relayout();
        }
        if self.layout_pending() {
            return;
        }
        self.delayed_layout.set(!delay.is_zero());
        self.layout_timer.start_one_shot(delay);
        trace!(frame = %frame.id(), ?delay, "layout scheduled");
    }

    /// Schedule layout of the subtree under `root` only.
    pub fn schedule_relayout_of_subtree(&self, root: NodeId) {
        let Some(frame) = self.frame() else {
            return;
        };
        let Some(doc) = frame.document() else {
            return;
        };
        let Some(render) = doc.renderer() else {
            return;
        };
        if !self.layout_scheduling_enabled.get() || render.needs_layout(render.root()) {
            render.mark_containing_blocks_for_layout(root, None);
            return;
        }
        if self.layout_pending() {
            let pending = self.layout_root.get();
            if pending == Some(root) {
                return;
            }
            match pending {
                Some(current) if is_render_ancestor_or_self(render, current, root) => {
                    render.mark_containing_blocks_for_layout(root, Some(current));
                    debug!(root = ?current, requested = ?root, "layout root kept");
                }
                Some(current) if is_render_ancestor_or_self(render, root, current) => {
                    render.mark_containing_blocks_for_layout(current, Some(root));
                    self.layout_root.set(Some(root));
                    debug!(from = ?current, to = ?root, "layout re-rooted");
                }
                _ => {
                    if let Some(current) = pending {
                        render.mark_containing_blocks_for_layout(current, None);
                    }
                    self.layout_root.set(None);
                    render.mark_containing_blocks_for_layout(root, None);
                    debug!(requested = ?root, "layout roots disjoint; full layout");
                }
            }
        } else {
            let delay = self.layout_delay(doc.as_ref());
            self.layout_root.set(Some(root));
            self.delayed_layout.set(!delay.is_zero());
            self.layout_timer.start_one_shot(delay);
            trace!(frame = %frame.id(), ?root, ?delay, "subtree layout scheduled");
        }
    }

    pub fn unschedule_relayout(&self) {
        if !self.layout_pending() {
            return;
        }
        self.layout_timer.stop();
        self.delayed_layout.set(false);
    }

    fn layout_timer_fired(&self) {
        self.layout(true);
    }

    /// Run layout now.
    ///
    /// With `allow_subtree` false a pending subtree root is widened to the
    /// whole document.
    pub fn layout(&self, allow_subtree: bool) {
        if self.mid_layout.get() {
            return;
        }
        self.layout_timer.stop();
        self.delayed_layout.set(false);

        let Some(frame) = self.frame() else {
            self.layout_root.set(None);
            return;
        };
        let Some(doc) = frame.document() else {
            self.layout_root.set(None);
            return;
        };

        self.layout_scheduling_enabled.set(false);
        if !self.nested_layout.is_active() && self.post_layout_tasks_timer.is_active() {
            self.post_layout_tasks_timer.stop();
            self.perform_post_layout_tasks();
        }

        if doc.needs_style_recalc() {
            doc.recalc_style();
        }
        if !allow_subtree
            && let Some(root) = self.layout_root.take()
            && let Some(render) = doc.renderer()
        {
            render.mark_containing_blocks_for_layout(root, None);
        }

        let subtree = self.layout_root.get();
        let Some(render) = doc.renderer() else {
            self.layout_root.set(None);
            self.layout_scheduling_enabled.set(true);
            return;
        };
        let root = subtree.unwrap_or_else(|| render.root());

        let _span = debug_span!("frame_view.layout", frame = ?frame.id(), subtree = subtree.is_some()).entered();
        let scope = self.nested_layout.enter();

        if subtree.is_none() {
            self.apply_viewport_overflow(render);
            self.do_full_repaint.set(self.first_layout.get());
        } else {
            self.do_full_repaint.set(false);
        }
        if self.first_layout.replace(false) {
            self.last_layout_size.set(self.visible_size());
            self.last_zoom_factor.set(frame.zoom_factor());
        }

        self.pause_scheduled_events();
        self.mid_layout.set(true);
        self.begin_deferred_repaints();
        render.layout(root);
        self.end_deferred_repaints();
        self.mid_layout.set(false);

        self.layout_root.set(None);
        frame.selection().set_needs_layout();
        self.layout_scheduling_enabled.set(true);

        if subtree.is_none() {
            self.adjust_view_size(render);
        }
        self.begin_deferred_repaints();
        render.update_layer_positions(self.do_full_repaint.get());
        self.end_deferred_repaints();
        self.layout_count.set(self.layout_count.get() + 1);
        debug!(count = self.layout_count.get(), nested = scope.is_outermost(), "layout done");

        if let Some(page) = frame.page() {
            page.chrome().layout_updated(frame.id());
        }

        if self.post_layout_tasks_timer.is_active() {
            self.resume_scheduled_events();
        } else {
            self.perform_post_layout_tasks();
            if self.needs_layout() && !self.layout_pending() {
                self.delayed_layout.set(false);
                self.layout_timer
                    .start_one_shot(Duration::from_millis(self.config.layout.post_layout_delay_ms));
                debug!("post-layout work invalidated layout; follow-up scheduled");
            }
        }
        drop(scope);
    }

    fn apply_viewport_overflow(&self, render: &dyn RenderTree) {
        let overflow = render.viewport_overflow();
        let (mut horizontal, mut vertical) = if overflow.is_frameset {
            (ScrollbarMode::AlwaysOff, ScrollbarMode::AlwaysOff)
        } else {
            (overflow.horizontal, overflow.vertical)
        };
        if self.first_layout.get() {
            if vertical == ScrollbarMode::Auto {
                vertical = ScrollbarMode::AlwaysOn;
            }
            if horizontal == ScrollbarMode::Auto {
                horizontal = ScrollbarMode::AlwaysOff;
            }
        }
        if (horizontal, vertical) != self.scrollbar_modes() {
            self.set_scrollbar_modes(horizontal, vertical);
        }
    }

    fn adjust_view_size(&self, render: &dyn RenderTree) {
        let size = render.document_size();
        if self.contents_size.replace(size) == size {
            return;
        }
        self.clamp_scroll_offset();
        if let Some(frame) = self.frame()
            && let Some(page) = frame.page()
        {
            page.chrome().contents_size_changed(frame.id(), size);
        }
    }

    /// Queue `node` for a widget update after the next layout.
    pub fn add_widget_to_update(&self, node: NodeId) {
        let mut set = self.widget_update_set.borrow_mut();
        if !set.contains(&node) {
            set.push(node);
        }
    }

    pub fn remove_widget_to_update(&self, node: NodeId) {
        self.widget_update_set.borrow_mut().retain(|n| *n != node);
    }

    fn perform_post_layout_tasks(&self) {
        let Some(frame) = self.frame() else {
            self.resume_scheduled_events();
            return;
        };
        let Some(doc) = frame.document() else {
            self.resume_scheduled_events();
            return;
        };
        if let Some(render) = doc.renderer() {
            render.update_widget_positions();
            if self.nested_layout.depth() <= 1 {
                let widgets = std::mem::take(&mut *self.widget_update_set.borrow_mut());
                for node in widgets {
                    render.update_widget(node);
                }
            }
        }

        self.resume_scheduled_events();

        let size = self.visible_size();
        let zoom = frame.zoom_factor();
        let resized = self.last_layout_size.replace(size) != size
            || self.last_zoom_factor.replace(zoom) != zoom;
        if resized && self.did_first_layout() && !doc.is_loading() {
            trace!(frame = %frame.id(), ?size, "sending resize event");
            frame.send_resize_event();
        }
    }

    // -----------------------------------------------------------------------
    // Scheduled events
    // -----------------------------------------------------------------------

    /// Dispatch `event` now, or queue it while scheduled events are paused.
    pub fn schedule_event(&self, event: DomEvent) {
        if self.event_suspension.is_active() {
            self.scheduled_events.push(event);
            return;
        }
        if let Some(doc) = self.frame().and_then(|f| f.document()) {
            doc.dispatch_event(&event);
        }
    }

    pub fn pause_scheduled_events(&self) {
        self.event_suspension.begin();
    }

    /// Leave one pause level; the outermost resume delivers queued events
    /// whose target is still in the document.
    pub fn resume_scheduled_events(&self) {
        if !self.event_suspension.is_active() {
            warn!("resume_scheduled_events without a matching pause");
            return;
        }
        if self.event_suspension.end() {
            self.dispatch_scheduled_events();
        }
    }

    #[must_use]
    pub fn scheduled_event_count(&self) -> usize {
        self.scheduled_events.len()
    }

    fn dispatch_scheduled_events(&self) {
        let events = self.scheduled_events.take_all();
        if events.is_empty() {
            return;
        }
        let Some(doc) = self.frame().and_then(|f| f.document()) else {
            return;
        };
        for event in events {
            if doc.contains_node(event.target) {
                doc.dispatch_event(&event);
            } else {
                trace!(target = ?event.target, event = %event.event_type, "scheduled event target left the document");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Repaint coalescing
    // -----------------------------------------------------------------------

    fn main_view(&self) -> Option<Rc<FrameView>> {
        let frame = self.frame()?;
        if frame.parent().is_none() {
            return None;
        }
        frame.page()?.main_frame()?.view()
    }

    /// Mark `rect` (contents coordinates) dirty.
    pub fn repaint_content_rectangle(&self, rect: IntRect, immediate: bool) {
        if rect.is_empty() {
            return;
        }
        if let Some(main) = self.main_view() {
            let window = self.contents_to_window_rect(rect);
            main.repaint_content_rectangle(main.window_to_contents_rect(window), immediate);
            return;
        }

        let delay = self.adjusted_deferred_repaint_delay();
        let deferring = self.deferring_repaints.is_active()
            || self.deferred_repaint_timer.is_active()
            || !delay.is_zero();
        if deferring && !immediate {
            if !self.visible_content_rect().intersects(&rect) {
                return;
            }
            let threshold = self.config.repaint.union_threshold.max(1);
            {
                let mut rects = self.repaint_rects.borrow_mut();
                let count = self.repaint_count.get();
                if count == threshold {
                    let united = rects.iter().fold(IntRect::default(), |acc, r| acc.union(r));
                    rects.clear();
                    rects.push(united);
                    debug!(threshold, "repaint rects collapsed into one union");
                }
                if count < threshold {
                    rects.push(rect);
                } else if let Some(first) = rects.first_mut() {
                    *first = first.union(&rect);
                }
            }
            self.repaint_count.set(self.repaint_count.get() + 1);
            if !self.deferring_repaints.is_active() && !self.deferred_repaint_timer.is_active() {
                self.deferred_repaint_timer.start_one_shot(delay);
            }
            return;
        }
        self.invalidate(rect, immediate);
    }

    fn invalidate(&self, rect: IntRect, immediate: bool) {
        let Some(frame) = self.frame() else {
            return;
        };
        let Some(page) = frame.page() else {
            return;
        };
        page.chrome().invalidate_contents(self.contents_to_window_rect(rect), immediate);
    }

    pub fn begin_deferred_repaints(&self) {
        if let Some(main) = self.main_view() {
            main.begin_deferred_repaints();
            return;
        }
        self.deferring_repaints.begin();
    }

    pub fn end_deferred_repaints(&self) {
        if let Some(main) = self.main_view() {
            main.end_deferred_repaints();
            return;
        }
        if !self.deferring_repaints.is_active() {
            warn!("end_deferred_repaints without a matching begin");
            return;
        }
        if !self.deferring_repaints.end() {
            return;
        }
        if self.deferred_repaint_timer.is_active() {
            return;
        }
        let delay = self.adjusted_deferred_repaint_delay();
        if !delay.is_zero() {
            self.deferred_repaint_timer.start_one_shot(delay);
            return;
        }
        self.do_deferred_repaints();
    }

    #[must_use]
    pub fn is_deferring_repaints(&self) -> bool {
        match self.main_view() {
            Some(main) => main.is_deferring_repaints(),
            None => self.deferring_repaints.is_active(),
        }
    }

    /// Rects waiting to be flushed.
    #[must_use]
    pub fn pending_repaint_rects(&self) -> Vec<IntRect> {
        self.repaint_rects.borrow().clone()
    }

    /// Number of repaints absorbed since the last flush.
    #[must_use]
    pub fn repaint_count(&self) -> usize {
        self.repaint_count.get()
    }

    #[must_use]
    pub fn deferred_repaint_delay(&self) -> Duration {
        self.deferred_repaint_delay.get()
    }

    /// Send every pending rect to the chrome and adapt the delay.
    pub fn do_deferred_repaints(&self) {
        debug_assert!(!self.deferring_repaints.is_active());
        let rects = std::mem::take(&mut *self.repaint_rects.borrow_mut());
        let _span = debug_span!("frame_view.flush_repaints", rects = rects.len()).entered();
        self.repaint_count.set(0);
        for rect in rects {
            self.invalidate(rect, false);
        }
        self.update_deferred_repaint_delay();
    }

    fn update_deferred_repaint_delay(&self) {
        let loading = self
            .frame()
            .and_then(|f| f.document())
            .is_some_and(|doc| doc.is_parsing() || doc.is_loading());
        let policy = &self.config.repaint;
        if !loading {
            self.deferred_repaint_delay
                .set(Duration::from_millis(policy.deferred_delay_ms));
            return;
        }
        let max = Duration::from_millis(policy.max_delay_during_loading_ms);
        let current = self.deferred_repaint_delay.get();
        if current < max {
            let next = current + Duration::from_millis(policy.delay_increment_during_loading_ms);
            self.deferred_repaint_delay.set(next.min(max));
        }
    }

    /// Drop the delay to zero and flush anything waiting on the timer.
    pub fn reset_deferred_repaint_delay(&self) {
        self.deferred_repaint_delay.set(Duration::ZERO);
        if self.deferred_repaint_timer.is_active() {
            self.deferred_repaint_timer.stop();
            self.do_deferred_repaints();
        }
    }

    /// Flush early once the document stopped loading.
    pub fn check_stop_delaying_deferred_repaints(&self) {
        if !self.deferred_repaint_timer.is_active() {
            return;
        }
        let loading = self
            .frame()
            .and_then(|f| f.document())
            .is_some_and(|doc| doc.is_parsing() || doc.is_loading());
        if loading {
            return;
        }
        self.deferred_repaint_timer.stop();
        self.do_deferred_repaints();
    }

    /// Delay still owed since the last paint.
    #[must_use]
    pub fn adjusted_deferred_repaint_delay(&self) -> Duration {
        let delay = self.deferred_repaint_delay.get();
        if delay.is_zero() {
            return Duration::ZERO;
        }
        let since_paint = self.event_loop.now().saturating_sub(self.last_paint_time.get());
        delay.saturating_sub(since_paint)
    }

    /// Record that the host painted the view.
    pub fn did_paint(&self) {
        self.last_paint_time.set(self.event_loop.now());
    }
}

impl Drop for FrameView {
    fn drop(&mut self) {
        if self.deferring_repaints.is_active() {
            warn!(depth = self.deferring_repaints.depth(), "view dropped while deferring repaints");
        }
    }
}
