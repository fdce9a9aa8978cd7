#![forbid(unsafe_code)]

//! Wheel events and overflow scrolling.

use tracing::{debug_span, trace};
use webframe_core::event::{PlatformWheelEvent, WheelGranularity};

use super::{subframe_for_target_node, EventHandler};
use crate::dom::{DomEvent, EventDetail, EventType, NodeId, WheelEventDetail};
use crate::hit_test::HitTestRequest;
use crate::render::{RenderTree, ScrollDirection, ScrollGranularity};

impl EventHandler {
    /// Handle a wheel event: a subframe under the pointer gets it first,
    /// then the DOM, then the scrollable boxes above the target one axis at
    /// a time, and finally the view itself.
    ///
    /// Returns whether the event was accepted.
    pub fn handle_wheel_event(&self, event: &PlatformWheelEvent) -> bool {
        let Some(frame) = self.frame() else {
            return false;
        };
        let Some(view) = frame.view() else {
            return false;
        };
        let Some(document) = frame.document() else {
            return false;
        };
        let Some(hit) = document
            .renderer()
            .map(|render| render.hit_test(HitTestRequest::READ_ONLY, view.window_to_contents(event.position)))
        else {
            return false;
        };
        let _span = debug_span!(
            "event_handler.wheel",
            frame = %frame.id(),
            delta_x = event.delta_x,
            delta_y = event.delta_y
        )
        .entered();

        if let Some(node) = hit.inner_node {
            if hit.is_over_widget
                && let Some(subframe) = subframe_for_target_node(&frame, node)
                && subframe.event_handler().handle_wheel_event(event)
            {
                trace!(subframe = %subframe.id(), "wheel taken by subframe");
                event.accept();
                return true;
            }

            let node = document.shadow_ancestor_node(node);
            let client = view.window_to_contents(event.position);
            let dom_event = DomEvent::new(EventType::MouseWheel, node).with_detail(EventDetail::Wheel(WheelEventDetail {
                delta_x: event.delta_x,
                delta_y: event.delta_y,
                granularity: event.granularity,
                client,
                screen: event.global_position,
                modifiers: event.modifiers,
            }));
            if document.dispatch_event(&dom_event).including_initial(&dom_event).swallowed() {
                event.accept();
                return true;
            }

            // Handlers may have replaced the document.
            if let Some(document) = frame.document()
                && let Some(render) = document.renderer()
                && render.has_renderer(node)
            {
                // Each axis scrolls on its own, so diagonal motion moves
                // whichever axes can move.
                scroll_and_accept(render, event.delta_x, ScrollDirection::Left, ScrollDirection::Right, event, node, self.config.scroll.pixels_per_line);
                scroll_and_accept(render, event.delta_y, ScrollDirection::Up, ScrollDirection::Down, event, node, self.config.scroll.pixels_per_line);
            }
        }

        if !event.is_accepted() {
            view.wheel_event(event);
        }
        event.is_accepted()
    }

    /// Scroll the overflow box around the focused node, or around the node
    /// last pressed. List boxes scroll themselves.
    pub fn scroll_overflow(&self, direction: ScrollDirection, granularity: ScrollGranularity) -> bool {
        let Some(document) = self.frame().and_then(|frame| frame.document()) else {
            return false;
        };
        let Some(node) = document.focused_node().or_else(|| self.mouse_press_node.get()) else {
            return false;
        };
        let Some(render) = document.renderer() else {
            return false;
        };
        if !render.has_renderer(node) || render.is_list_box(node) {
            return false;
        }
        render.scroll(node, direction, granularity, 1.0)
    }
}

fn scroll_and_accept(
    render: &dyn RenderTree,
    delta: f32,
    positive: ScrollDirection,
    negative: ScrollDirection,
    event: &PlatformWheelEvent,
    node: NodeId,
    pixels_per_line: i32,
) {
    if delta == 0.0 {
        return;
    }
    let direction = if delta > 0.0 { positive } else { negative };
    let scrolled = match event.granularity {
        WheelGranularity::Page => render.scroll(node, direction, ScrollGranularity::Page, 1.0),
        WheelGranularity::Line => render.scroll(
            node,
            direction,
            ScrollGranularity::Pixel,
            delta.abs() * pixels_per_line as f32,
        ),
        WheelGranularity::Pixel => render.scroll(node, direction, ScrollGranularity::Pixel, delta.abs()),
    };
    if scrolled {
        event.accept();
    }
}
