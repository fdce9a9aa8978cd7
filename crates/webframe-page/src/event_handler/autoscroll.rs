#![forbid(unsafe_code)]

//! Selection autoscroll and middle-button pan scrolling.
//!
//! Both modes share one repeating timer. Autoscroll runs while the button
//! stays pressed during a selection drag and asks the target box to scroll
//! toward the pointer. Pan scrolling starts on a middle-button press over a
//! scrollable box and moves it by a step that grows geometrically with
//! every tick the pointer stays outside the dead zone. The main frame's
//! handler carries the page-wide pan flag, so a press anywhere stops a pan
//! started in any subframe.

use std::rc::Rc;

use tracing::{debug, trace};
use webframe_core::geometry::IntSize;

use super::EventHandler;
use crate::dom::NodeId;
use crate::frame::Frame;
use crate::frame_tree::FrameId;

impl EventHandler {
    #[must_use]
    pub fn autoscroll_in_progress(&self) -> bool {
        self.autoscroll_in_progress.get()
    }

    #[must_use]
    pub fn pan_scroll_in_progress(&self) -> bool {
        self.pan_scroll_in_progress.get()
    }

    pub fn set_pan_scroll_in_progress(&self, in_progress: bool) {
        self.pan_scroll_in_progress.set(in_progress);
    }

    /// Frame and node the autoscroll timer currently drives.
    #[must_use]
    pub fn autoscroll_target(&self) -> Option<(FrameId, NodeId)> {
        self.autoscroll_target.get()
    }

    /// Start scrolling `node` of `target_frame` on the autoscroll timer.
    /// Does nothing while the timer already runs.
    pub(crate) fn handle_autoscroll(&self, target_frame: &Rc<Frame>, node: NodeId) {
        if self.autoscroll_timer.is_active() {
            return;
        }
        self.autoscroll_target.set(Some((target_frame.id(), node)));
        if self.pan_scroll_in_progress.get() {
            self.pan_scroll_start.set(self.current_mouse_position.get());
            self.pan_ticks.set(0);
            if let Some(frame) = self.frame()
                && !frame.is_main_frame()
                && let Some(main) = frame.page().and_then(|page| page.main_frame())
            {
                main.event_handler().set_pan_scroll_in_progress(true);
            }
        }
        debug!(
            frame = %target_frame.id(),
            ?node,
            pan = self.pan_scroll_in_progress.get(),
            "autoscroll started"
        );
        self.autoscroll_timer.start_repeating(self.config.autoscroll.interval());
    }

    fn target_frame(&self) -> Option<(Rc<Frame>, NodeId)> {
        let (frame_id, node) = self.autoscroll_target.get()?;
        let frame = self.frame()?;
        if frame_id == frame.id() {
            return Some((frame, node));
        }
        Some((frame.page()?.frame(frame_id)?, node))
    }

    pub(super) fn autoscroll_timer_fired(&self) {
        let Some(frame) = self.frame() else {
            return;
        };
        let Some((target_frame, node)) = self.target_frame() else {
            self.stop_autoscroll_timer(true);
            return;
        };
        let (Some(document), Some(view)) = (target_frame.document(), target_frame.view()) else {
            self.stop_autoscroll_timer(true);
            return;
        };
        let Some(render) = document.renderer() else {
            self.stop_autoscroll_timer(true);
            return;
        };
        // The box went away mid-scroll; never touch it again.
        if !document.contains_node(node) || !render.has_renderer(node) {
            trace!(?node, "autoscroll target lost its renderer");
            self.stop_autoscroll_timer(true);
            return;
        }

        if self.autoscroll_in_progress.get() {
            if !self.mouse_pressed.get() {
                self.stop_autoscroll_timer(false);
                return;
            }
            let point = view.window_to_contents(self.current_mouse_position.get());
            render.autoscroll(node, point);
            return;
        }

        if !super::is_main_frame_pan_scrolling(&frame) {
            self.stop_autoscroll_timer(false);
            return;
        }
        let delta = self.pan_scroll_delta();
        self.pan_ticks.set(self.pan_ticks.get().saturating_add(1));
        if delta != IntSize::default() {
            render.pan_scroll(node, delta);
        }
    }

    /// Step for this tick of a pan: zero inside the dead zone on each axis,
    /// otherwise the base step grown by the acceleration per elapsed tick,
    /// toward the pointer.
    fn pan_scroll_delta(&self) -> IntSize {
        let policy = &self.config.autoscroll;
        let offset = self.current_mouse_position.get() - self.pan_scroll_start.get();
        let ticks = i32::try_from(self.pan_ticks.get()).unwrap_or(i32::MAX);
        let magnitude = (policy.pan_base_step * policy.pan_acceleration.powi(ticks)).round().max(1.0);
        let axis = |distance: i32| -> i32 {
            if distance.abs() <= policy.pan_dead_zone {
                0
            } else {
                let step = magnitude.min(f64::from(i32::MAX)) as i32;
                step * distance.signum()
            }
        };
        IntSize::new(axis(offset.width), axis(offset.height))
    }

    /// Stop autoscroll or pan scrolling.
    ///
    /// With `renderer_is_being_destroyed` set, the target box is not told
    /// to stop, since it is going away.
    pub fn stop_autoscroll_timer(&self, renderer_is_being_destroyed: bool) {
        let frame = self.frame();
        if self.autoscroll_in_progress.get()
            && self.mouse_down_was_in_subframe.get()
            && let Some(frame) = &frame
            && let Some(press) = self.mouse_press_node.get()
            && let Some(subframe) = super::subframe_for_target_node(frame, press)
        {
            subframe.event_handler().stop_autoscroll_timer(renderer_is_being_destroyed);
            return;
        }

        if frame.is_some()
            && (self.autoscroll_in_progress.get() || self.pan_scroll_in_progress.get())
            && !renderer_is_being_destroyed
            && let Some((target_frame, node)) = self.target_frame()
            && let Some(document) = target_frame.document()
            && let Some(render) = document.renderer()
            && render.has_renderer(node)
        {
            render.stop_autoscroll(node);
        }
        let was_running = self.autoscroll_timer.is_active();
        self.autoscroll_target.set(None);
        self.autoscroll_timer.stop();
        self.pan_scroll_in_progress.set(false);
        self.pan_ticks.set(0);
        if let Some(frame) = &frame
            && !frame.is_main_frame()
            && let Some(main) = frame.page().and_then(|page| page.main_frame())
        {
            main.event_handler().set_pan_scroll_in_progress(false);
        }
        self.autoscroll_in_progress.set(false);
        if was_running {
            debug!("autoscroll stopped");
        }
    }
}
