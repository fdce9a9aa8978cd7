#![forbid(unsafe_code)]

//! Mouse press, move, and release, and the selection gestures they drive.

use std::rc::Rc;

use tracing::{debug, debug_span, trace};
use webframe_core::event::{MouseButton, PlatformMouseEvent};
use webframe_core::geometry::IntPoint;

use super::{find_scrollable_ancestor, is_main_frame_pan_scrolling, subframe_for_target_node, EventHandler};
use crate::dom::{Document, DomEvent, EventType, NodeId, TextGranularity};
use crate::frame::Frame;
use crate::hit_test::{HitTestRequest, HitTestResult, MouseEventWithHitTestResults};
use crate::render::ScrollbarId;
use crate::selection::VisibleSelection;

impl EventHandler {
    /// Click count for a press on `target`: the platform's when it
    /// supplies one, otherwise this handler's own count. A press on a
    /// different node than the last counted one starts a new sequence.
    fn effective_click_count(&self, event: &PlatformMouseEvent, target: NodeId) -> u32 {
        let counted = {
            let mut counter = self.click_counter.borrow_mut();
            if self.last_counted_node.replace(Some(target)) != Some(target) {
                counter.reset();
            }
            counter.register_press(event.button, event.position, event.timestamp)
        };
        if event.click_count > 0 {
            event.click_count
        } else {
            counted
        }
    }

    /// Handle a button press. Returns whether the press was swallowed.
    pub fn handle_mouse_press_event(&self, event: &PlatformMouseEvent) -> bool {
        let Some(frame) = self.frame() else {
            return false;
        };
        let Some(view) = frame.view() else {
            return false;
        };
        if frame.document().is_none() {
            return false;
        }
        let _span = debug_span!("event_handler.mouse_press", frame = %frame.id(), button = ?event.button)
            .entered();

        self.mouse_pressed.set(true);
        self.captures_dragging.set(true);
        self.current_mouse_position.set(event.position);
        self.mouse_down_timestamp.set(event.timestamp);
        self.mouse_down_may_start_drag.set(false);
        self.mouse_down_may_start_select.set(false);
        self.mouse_down_may_start_autoscroll.set(false);
        self.mouse_down_was_single_click_in_selection.set(false);
        self.mouse_down_was_in_subframe.set(false);
        self.mouse_down_pos.set(view.window_to_contents(event.position));

        let Some(mut mev) = self.prepare_mouse_event(&frame, HitTestRequest::ACTIVE, event) else {
            return false;
        };
        let Some(target) = mev.target_node() else {
            self.reset_click_sequence();
            return false;
        };
        let click_count = self.effective_click_count(event, target);
        self.mouse_press_node.set(Some(target));

        if let Some(subframe) = Self::subframe_for_hit(&frame, &mev) {
            trace!(subframe = %subframe.id(), "press forwarded to subframe");
            self.mouse_down_was_in_subframe.set(true);
            subframe.event_handler().handle_mouse_press_event(event);
            // A nested modal loop may have released the button already.
            if self.mouse_pressed.get() {
                self.set_capturing_node(Some(target));
            }
            self.reset_click_sequence();
            self.invalidate_click();
            return true;
        }

        if is_main_frame_pan_scrolling(&frame) || self.autoscroll_in_progress.get() {
            self.stop_autoscroll_timer(false);
            self.invalidate_click();
            return true;
        }
        if event.button == MouseButton::Middle
            && !mev.is_over_link()
            && let Some((scroll_frame, node)) = find_scrollable_ancestor(&frame, target)
        {
            self.pan_scroll_in_progress.set(true);
            self.handle_autoscroll(&scroll_frame, node);
            self.invalidate_click();
            return true;
        }

        self.click_count.set(click_count);
        self.click_node.set(Some(target));

        if let Some(document) = frame.document()
            && let Some(render) = document.renderer()
            && let Some(layer) = render.resize_layer_at(target, self.mouse_down_pos.get())
        {
            let offset = render.offset_from_resize_corner(layer, self.mouse_down_pos.get());
            self.resize_layer.set(Some(layer));
            self.offset_from_resize_corner.set(offset);
            debug!(?layer, "layer resize started");
            self.invalidate_click();
            return true;
        }

        let mut swallowed =
            self.dispatch_mouse_event(&frame, EventType::MouseDown, Some(target), true, click_count, event, true);
        self.captures_dragging.set(!swallowed);

        // The scrollbar may have gone away while the press was dispatched.
        if let Some(scrollbar) = mev.scrollbar() {
            let was_last = self.last_scrollbar_under_mouse.get() == Some(scrollbar);
            if let Some(refetched) =
                self.prepare_mouse_event(&frame, HitTestRequest::READ_ONLY | HitTestRequest::ACTIVE, event)
            {
                mev = refetched;
            }
            if was_last && mev.scrollbar() != self.last_scrollbar_under_mouse.get() {
                self.last_scrollbar_under_mouse.set(None);
            }
        }

        if swallowed {
            if let Some(scrollbar) = mev.scrollbar() {
                self.pass_mouse_press_to_scrollbar(&frame, &mev, scrollbar);
            }
        } else if let Some(scrollbar) = mev.scrollbar()
            && self.pass_mouse_press_to_scrollbar(&frame, &mev, scrollbar)
        {
            swallowed = true;
        } else {
            swallowed = self.handle_mouse_press_default(&frame, &mev, click_count);
        }
        swallowed
    }

    fn pass_mouse_press_to_scrollbar(
        &self,
        frame: &Frame,
        mev: &MouseEventWithHitTestResults,
        scrollbar: ScrollbarId,
    ) -> bool {
        let Some(document) = frame.document() else {
            return false;
        };
        let Some(render) = document.renderer() else {
            return false;
        };
        if !render.scrollbar_enabled(scrollbar) {
            return false;
        }
        let handled = render.scrollbar_mouse_down(scrollbar, mev.hit.point);
        if handled {
            trace!(?scrollbar, "press taken by scrollbar");
            self.last_scrollbar_under_mouse.set(Some(scrollbar));
            self.reset_click_sequence();
        }
        handled
    }

    /// Whether a press on `node` may start a selection: `selectstart` is
    /// dispatched and must not be cancelled.
    fn can_mouse_down_start_select(&self, document: &dyn Document, node: NodeId) -> bool {
        let has_renderer = document.renderer().is_some_and(|render| render.has_renderer(node));
        if !has_renderer {
            return true;
        }
        if !document.can_start_selection(node) {
            return false;
        }
        let event = DomEvent::new(EventType::SelectStart, node);
        !document.dispatch_event(&event).default_prevented
    }

    fn can_mouse_drag_extend_select(&self, document: &dyn Document, node: NodeId) -> bool {
        let event = DomEvent::new(EventType::SelectStart, node);
        !document.dispatch_event(&event).default_prevented
    }

    /// Default press handling once DOM dispatch left the press alone:
    /// frame focus and click-count selection.
    fn handle_mouse_press_default(
        &self,
        frame: &Rc<Frame>,
        mev: &MouseEventWithHitTestResults,
        click_count: u32,
    ) -> bool {
        let Some(document) = frame.document() else {
            return false;
        };
        self.drag_source.set(None);
        let single_click = click_count <= 1;
        let may_select = mev
            .target_node()
            .is_none_or(|node| self.can_mouse_down_start_select(document.as_ref(), node));
        self.mouse_down_may_start_select.set(may_select);
        self.mouse_down_may_start_drag.set(single_click);
        self.mouse_down_was_single_click_in_selection.set(false);

        if single_click && let Some(page) = frame.page() {
            page.focus_controller().set_focused_frame(Some(frame));
        }

        self.mouse_press_node.set(mev.target_node());
        self.drag_start_pos.set(mev.event.position);
        self.mouse_pressed.set(true);
        self.began_selecting_text.set(false);

        let swallowed = match click_count {
            2 => self.handle_mouse_press_double_click(frame, mev),
            n if n >= 3 => self.handle_mouse_press_triple_click(frame, mev),
            _ => self.handle_mouse_press_single_click(frame, mev),
        };

        let scrollable_press = self.mouse_press_node.get().is_some_and(|node| {
            document
                .renderer()
                .is_some_and(|render| render.has_renderer(node) && render.can_be_programmatically_scrolled(node))
        });
        self.mouse_down_may_start_autoscroll
            .set(self.mouse_down_may_start_select.get() || scrollable_press);
        swallowed
    }

    /// Position under the hit, in the hit node's document.
    fn position_for_hit(document: &dyn Document, hit: &HitTestResult) -> Option<crate::dom::Position> {
        let node = hit.inner_node?;
        let render = document.renderer()?;
        if !render.has_renderer(node) {
            return None;
        }
        render.position_for_point(node, hit.local_point)
    }

    fn apply_selection(frame: &Frame, selection: VisibleSelection) {
        if frame.should_change_selection(&selection) {
            frame.set_selection(selection, false);
        }
    }

    fn select_closest_word(&self, frame: &Frame, mev: &MouseEventWithHitTestResults) {
        let Some(document) = frame.document() else {
            return;
        };
        if !self.mouse_down_may_start_select.get() {
            return;
        }
        let Some(position) = Self::position_for_hit(document.as_ref(), &mev.hit) else {
            return;
        };
        let selection = VisibleSelection::caret(position).expanded(TextGranularity::Word, document.as_ref());
        if selection.is_range() {
            frame.selection().set_granularity(TextGranularity::Word);
            self.began_selecting_text.set(true);
        }
        Self::apply_selection(frame, selection);
    }

    fn select_closest_word_or_link(&self, frame: &Frame, mev: &MouseEventWithHitTestResults) {
        let Some(link) = mev.hit.url_element else {
            self.select_closest_word(frame, mev);
            return;
        };
        let Some(document) = frame.document() else {
            return;
        };
        if !self.mouse_down_may_start_select.get() {
            return;
        }
        let selection = VisibleSelection::new(document.position_before(link), document.position_after(link), document.as_ref());
        if selection.is_range() {
            frame.selection().set_granularity(TextGranularity::Word);
            self.began_selecting_text.set(true);
        }
        Self::apply_selection(frame, selection);
    }

    fn handle_mouse_press_double_click(&self, frame: &Frame, mev: &MouseEventWithHitTestResults) -> bool {
        if mev.event.button != MouseButton::Left {
            return false;
        }
        if frame.selection().is_range() {
            // Keep the range; the release must not collapse it to a caret.
            self.began_selecting_text.set(true);
        } else {
            self.select_closest_word(frame, mev);
        }
        true
    }

    fn handle_mouse_press_triple_click(&self, frame: &Frame, mev: &MouseEventWithHitTestResults) -> bool {
        if mev.event.button != MouseButton::Left || !self.mouse_down_may_start_select.get() {
            return false;
        }
        let Some(document) = frame.document() else {
            return false;
        };
        let Some(position) = Self::position_for_hit(document.as_ref(), &mev.hit) else {
            return false;
        };
        let selection =
            VisibleSelection::caret(position).expanded(TextGranularity::Paragraph, document.as_ref());
        if selection.is_range() {
            frame.selection().set_granularity(TextGranularity::Paragraph);
            self.began_selecting_text.set(true);
        }
        Self::apply_selection(frame, selection);
        true
    }

    fn handle_mouse_press_single_click(&self, frame: &Frame, mev: &MouseEventWithHitTestResults) -> bool {
        let Some(document) = frame.document() else {
            return false;
        };
        let Some(target) = mev.target_node() else {
            return false;
        };
        let has_renderer = document.renderer().is_some_and(|render| render.has_renderer(target));
        if !has_renderer || !self.mouse_down_may_start_select.get() {
            return false;
        }

        let extend = mev.event.shift() && !mev.is_over_link();
        let position = Self::position_for_hit(document.as_ref(), &mev.hit);
        let current = frame.selection().selection();
        if !extend
            && let Some(position) = position
            && current.contains(position, document.as_ref())
        {
            self.mouse_down_was_single_click_in_selection.set(true);
            return false;
        }

        let position = position.unwrap_or(crate::dom::Position::new(target, 0));
        let selection = match (current.start(), current.end()) {
            (Some(start), Some(end)) if extend => {
                let extended = if document.compare_positions(position, start).is_le() {
                    VisibleSelection::new(position, end, document.as_ref())
                } else {
                    VisibleSelection::new(start, position, document.as_ref())
                };
                self.began_selecting_text.set(true);
                extended.expanded(frame.selection().granularity(), document.as_ref())
            }
            _ => {
                frame.selection().set_granularity(TextGranularity::Character);
                VisibleSelection::caret(position)
            }
        };
        Self::apply_selection(frame, selection);
        false
    }

    // -----------------------------------------------------------------------
    // Move
    // -----------------------------------------------------------------------

    /// Handle a mouse move. Returns whether it was swallowed.
    pub fn handle_mouse_move_event(&self, event: &PlatformMouseEvent) -> bool {
        self.handle_mouse_move(event, &mut None)
    }

    /// Handle a mouse move and tell the chrome what the pointer is over.
    pub fn mouse_moved(&self, event: &PlatformMouseEvent) -> bool {
        let mut hovered = None;
        let result = self.handle_mouse_move(event, &mut hovered);
        let Some(page) = self.frame().and_then(|frame| frame.page()) else {
            return result;
        };
        let mut hovered = hovered.unwrap_or_else(|| HitTestResult::new(IntPoint::zero()));
        if let Some(document) = hovered.frame.and_then(|id| page.frame(id)).and_then(|f| f.document()) {
            hovered.set_to_non_shadow_ancestor(document.as_ref());
        }
        page.chrome().mouse_did_move_over_element(&hovered, event.modifiers);
        page.chrome().set_tool_tip(&hovered);
        result
    }

    fn handle_mouse_move(&self, event: &PlatformMouseEvent, hovered: &mut Option<HitTestResult>) -> bool {
        let Some(frame) = self.frame() else {
            return false;
        };
        let Some(_view) = frame.view() else {
            return false;
        };
        if frame.document().is_none() {
            return false;
        }
        let _span = debug_span!("event_handler.mouse_move", frame = %frame.id()).entered();

        self.current_mouse_position.set(event.position);
        self.hover_timer.stop();

        // While a press may select, hover and active state stay frozen.
        let mut request = HitTestRequest::MOUSE_MOVE;
        if self.mouse_pressed.get() {
            request |= HitTestRequest::ACTIVE;
            if self.mouse_down_may_start_select.get() {
                request |= HitTestRequest::READ_ONLY;
            }
        }
        let Some(mev) = self.prepare_mouse_event(&frame, request, event) else {
            return false;
        };
        *hovered = Some(mev.hit.clone());

        if let Some(document) = frame.document()
            && let Some(render) = document.renderer()
        {
            if let Some(layer) = self.resize_layer.get() {
                render.resize_layer(layer, mev.hit.point, self.offset_from_resize_corner.get());
            } else {
                let scrollbar = mev.scrollbar();
                let last = self.last_scrollbar_under_mouse.get();
                if last != scrollbar {
                    if let Some(last) = last {
                        render.scrollbar_mouse_exited(last);
                    }
                    self.last_scrollbar_under_mouse
                        .set(if self.mouse_pressed.get() { None } else { scrollbar });
                }
                if let Some(scrollbar) = scrollbar {
                    render.scrollbar_mouse_moved(scrollbar, mev.hit.point);
                }
            }
        }

        let new_subframe = match self.capturing_node.get() {
            Some(capture) => subframe_for_target_node(&frame, capture),
            None => Self::subframe_for_hit(&frame, &mev),
        };
        let new_subframe_id = new_subframe.as_ref().map(|f| f.id());

        // Mouseouts fire inside out: the subframe being left sees a move first.
        if let Some(last_id) = self.last_mouse_move_subframe.get()
            && Some(last_id) != new_subframe_id
            && let Some(page) = frame.page()
            && page.with_tree(|tree| tree.is_descendant_of(last_id, frame.id()))
            && let Some(last) = page.frame(last_id)
        {
            trace!(subframe = %last_id, "move forwarded to subframe being left");
            self.pass_mouse_move_to_subframe(&last, event, &mut None);
        }

        let mut swallowed = false;
        if let Some(subframe) = &new_subframe {
            self.update_mouse_event_target_node(&frame, mev.target_node(), event, true);
            // Dispatch above may have detached the subframe's view.
            if subframe.view().is_some() {
                swallowed |= self.pass_mouse_move_to_subframe(subframe, event, hovered);
            }
        }
        self.last_mouse_move_subframe.set(new_subframe_id);
        if swallowed {
            return true;
        }

        swallowed =
            self.dispatch_mouse_event(&frame, EventType::MouseMove, mev.target_node(), false, 0, event, true);
        if !swallowed {
            swallowed = self.handle_mouse_dragged(&frame, &mev);
        }
        swallowed
    }

    fn pass_mouse_move_to_subframe(
        &self,
        subframe: &Frame,
        event: &PlatformMouseEvent,
        hovered: &mut Option<HitTestResult>,
    ) -> bool {
        if self.mouse_pressed.get() && self.mouse_down_may_start_drag.get() && !self.mouse_down_was_in_subframe.get() {
            return false;
        }
        trace!(subframe = %subframe.id(), "move forwarded to subframe");
        subframe.event_handler().handle_mouse_move(event, hovered);
        true
    }

    fn handle_mouse_dragged(&self, frame: &Rc<Frame>, mev: &MouseEventWithHitTestResults) -> bool {
        if self.handle_drag(frame, mev) {
            return true;
        }
        if !self.mouse_pressed.get() || mev.event.button != MouseButton::Left {
            return false;
        }
        let Some(target) = mev.target_node() else {
            return false;
        };
        let Some(document) = frame.document() else {
            return false;
        };
        if !document.renderer().is_some_and(|render| render.has_renderer(target)) {
            return false;
        }

        self.mouse_down_may_start_drag.set(false);
        if self.mouse_down_may_start_autoscroll.get() && !self.pan_scroll_in_progress.get() {
            if let Some((scroll_frame, node)) = find_scrollable_ancestor(frame, target) {
                self.autoscroll_in_progress.set(true);
                self.handle_autoscroll(&scroll_frame, node);
            }
            self.mouse_down_may_start_autoscroll.set(false);
        }
        self.update_selection_for_mouse_drag(frame, document.as_ref(), target, mev.local_point());
        true
    }

    fn update_selection_for_mouse_drag(
        &self,
        frame: &Frame,
        document: &dyn Document,
        target: NodeId,
        local_point: IntPoint,
    ) {
        if !self.mouse_down_may_start_select.get() {
            return;
        }
        if !self.can_mouse_drag_extend_select(document, target) {
            return;
        }
        let Some(position) = document
            .renderer()
            .and_then(|render| render.position_for_point(target, local_point))
        else {
            return;
        };

        // The first drag after a press inside the selection restarts it.
        let mut selection = frame.selection().selection();
        if !self.began_selecting_text.get() {
            self.began_selecting_text.set(true);
            selection = VisibleSelection::caret(position);
        }
        selection = selection.with_extent(position, document);
        let granularity = frame.selection().granularity();
        if granularity != TextGranularity::Character {
            selection = selection.expanded(granularity, document);
        }
        Self::apply_selection(frame, selection);
    }

    // -----------------------------------------------------------------------
    // Release
    // -----------------------------------------------------------------------

    /// Handle a button release. Returns whether it was swallowed.
    pub fn handle_mouse_release_event(&self, event: &PlatformMouseEvent) -> bool {
        let Some(frame) = self.frame() else {
            return false;
        };
        let Some(_view) = frame.view() else {
            return false;
        };
        let _span = debug_span!("event_handler.mouse_release", frame = %frame.id(), button = ?event.button)
            .entered();

        self.mouse_pressed.set(false);
        self.current_mouse_position.set(event.position);

        if let Some(scrollbar) = self.last_scrollbar_under_mouse.get() {
            self.invalidate_click();
            return frame
                .document()
                .and_then(|document| document.renderer().map(|render| render.scrollbar_mouse_up(scrollbar)))
                .unwrap_or(false);
        }

        let Some(mev) = self.prepare_mouse_event(&frame, HitTestRequest::MOUSE_UP, event) else {
            return false;
        };
        let subframe = match self.capturing_node.get() {
            Some(capture) => subframe_for_target_node(&frame, capture),
            None => Self::subframe_for_hit(&frame, &mev),
        };
        if let Some(subframe) = subframe {
            trace!(subframe = %subframe.id(), "release forwarded to subframe");
            subframe.event_handler().handle_mouse_release_event(event);
            self.set_capturing_node(None);
            return true;
        }
        // Mouseup and click go to what is under the pointer, not the captor.
        self.set_capturing_node(None);

        let click_count = self.click_count.get();
        if mev.target_node() != self.click_node.get() {
            self.reset_click_sequence();
        }
        let swallow_mouse_up =
            self.dispatch_mouse_event(&frame, EventType::MouseUp, mev.target_node(), true, click_count, event, false);

        let mut swallow_click = false;
        if click_count > 0
            && event.button != MouseButton::Right
            && mev.target_node().is_some()
            && mev.target_node() == self.click_node.get()
        {
            swallow_click =
                self.dispatch_mouse_event(&frame, EventType::Click, mev.target_node(), true, click_count, event, true);
            if click_count == 2 {
                swallow_click |= self.dispatch_mouse_event(
                    &frame,
                    EventType::DblClick,
                    mev.target_node(),
                    true,
                    click_count,
                    event,
                    true,
                );
            }
        }

        if let Some(layer) = self.resize_layer.take() {
            debug!(?layer, "layer resize ended");
        }

        let mut swallow_release = false;
        if !swallow_mouse_up {
            swallow_release = self.handle_mouse_release_default(&frame, &mev);
        }
        self.invalidate_click();
        swallow_mouse_up || swallow_click || swallow_release
    }

    /// A platform double-click arriving in place of the second release.
    pub fn handle_mouse_double_click_event(&self, event: &PlatformMouseEvent) -> bool {
        let Some(frame) = self.frame() else {
            return false;
        };
        let Some(_view) = frame.view() else {
            return false;
        };
        self.mouse_pressed.set(false);
        self.current_mouse_position.set(event.position);

        let Some(mev) = self.prepare_mouse_event(&frame, HitTestRequest::ACTIVE, event) else {
            return false;
        };
        if let Some(subframe) = Self::subframe_for_hit(&frame, &mev) {
            subframe.event_handler().handle_mouse_double_click_event(event);
            self.set_capturing_node(None);
            return true;
        }

        let click_count = if event.click_count > 0 {
            event.click_count
        } else {
            self.click_count.get().max(2)
        };
        self.click_count.set(click_count);
        let swallow_mouse_up =
            self.dispatch_mouse_event(&frame, EventType::MouseUp, mev.target_node(), true, click_count, event, false);

        let mut swallow_click = false;
        if click_count >= 2 && mev.target_node().is_some() && mev.target_node() == self.click_node.get() {
            swallow_click = self.dispatch_mouse_event(
                &frame,
                EventType::DblClick,
                mev.target_node(),
                true,
                click_count,
                event,
                true,
            );
        }

        let mut swallow_release = false;
        if !swallow_mouse_up {
            swallow_release = self.handle_mouse_release_default(&frame, &mev);
        }
        self.invalidate_click();
        swallow_mouse_up || swallow_click || swallow_release
    }

    /// Release handling after an unswallowed `mouseup`: end autoscroll, and
    /// collapse a selection that was clicked without dragging.
    fn handle_mouse_release_default(&self, frame: &Frame, mev: &MouseEventWithHitTestResults) -> bool {
        if self.autoscroll_in_progress.get() {
            self.stop_autoscroll_timer(false);
        }
        self.mouse_pressed.set(false);
        self.captures_dragging.set(false);
        self.mouse_down_may_start_drag.set(false);
        self.mouse_down_may_start_select.set(false);
        self.mouse_down_may_start_autoscroll.set(false);
        self.mouse_down_was_in_subframe.set(false);

        if !(self.mouse_down_was_single_click_in_selection.get()
            && !self.began_selecting_text.get()
            && self.drag_start_pos.get() == mev.event.position
            && frame.selection().is_range())
        {
            return false;
        }
        let Some(document) = frame.document() else {
            return false;
        };
        let editable_position = mev
            .target_node()
            .filter(|node| document.is_content_editable(*node))
            .and_then(|_| Self::position_for_hit(document.as_ref(), &mev.hit));
        let selection = match editable_position {
            Some(position) => VisibleSelection::caret(position),
            None => VisibleSelection::none(),
        };
        Self::apply_selection(frame, selection);
        true
    }

    // -----------------------------------------------------------------------
    // Context menu
    // -----------------------------------------------------------------------

    /// Dispatch `contextmenu` for a right-button press, first selecting the
    /// word under the pointer when it lies outside the selection.
    pub fn send_context_menu_event(&self, event: &PlatformMouseEvent) -> bool {
        let Some(frame) = self.frame() else {
            return false;
        };
        let Some(_view) = frame.view() else {
            return false;
        };
        let Some(document) = frame.document() else {
            return false;
        };
        let Some(mev) = self.prepare_mouse_event(&frame, HitTestRequest::ACTIVE, event) else {
            return false;
        };

        if self.config.click.select_word_on_context_click {
            let inside_selection = Self::position_for_hit(document.as_ref(), &mev.hit)
                .is_some_and(|position| frame.selection().selection().contains(position, document.as_ref()));
            let over_text = mev.target_node().is_some_and(|node| document.is_text_node(node));
            if !inside_selection && (frame.selection().is_content_editable(document.as_ref()) || over_text) {
                // Context clicks may always select.
                self.mouse_down_may_start_select.set(true);
                self.select_closest_word_or_link(&frame, &mev);
            }
        }
        self.dispatch_mouse_event(&frame, EventType::ContextMenu, mev.target_node(), true, 0, event, true)
    }
}
