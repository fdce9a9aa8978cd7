#![forbid(unsafe_code)]

//! Host UI delegate.
//!
//! [`ChromeClient`] is implemented by the embedder: invalidation, status and
//! tooltip text, modal dialogs, window creation, and focus hand-off to the
//! surrounding UI. [`Chrome`] wraps it for one page and adds the one piece of
//! policy the core owns: modal calls defer loading in every page of the
//! group while the dialog is up.

use std::rc::{Rc, Weak};

use tracing::trace;
use webframe_core::event::Modifiers;
use webframe_core::geometry::{IntRect, IntSize};

use crate::dom::NodeId;
use crate::focus::FocusDirection;
use crate::frame_tree::FrameId;
use crate::hit_test::HitTestResult;
use crate::page::{Page, PageGroupLoadDeferrer};

/// Features requested for a new window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowFeatures {
    pub rect: Option<IntRect>,
    pub menu_bar_visible: bool,
    pub status_bar_visible: bool,
    pub tool_bar_visible: bool,
    pub resizable: bool,
    pub dialog: bool,
}

/// Embedder callbacks. Every method has a do-nothing default.
pub trait ChromeClient {
    /// Repaint `rect` in window coordinates.
    fn invalidate_contents(&self, _rect: IntRect, _immediate: bool) {}

    fn contents_size_changed(&self, _frame: FrameId, _size: IntSize) {}

    fn layout_updated(&self, _frame: FrameId) {}

    fn set_status_bar_text(&self, _text: &str) {}

    fn set_tool_tip(&self, _tip: &str) {}

    fn mouse_did_move_over_element(&self, _hit: &HitTestResult, _modifiers: Modifiers) {}

    fn run_javascript_alert(&self, _frame: FrameId, _message: &str) {}

    fn run_javascript_confirm(&self, _frame: FrameId, _message: &str) -> bool {
        false
    }

    fn run_javascript_prompt(&self, _frame: FrameId, _message: &str, _default: &str) -> Option<String> {
        None
    }

    fn create_window(&self, _opener: FrameId, _features: &WindowFeatures) -> Option<Rc<Page>> {
        None
    }

    fn can_take_focus(&self, _direction: FocusDirection) -> bool {
        false
    }

    fn take_focus(&self, _direction: FocusDirection) {}

    fn focus(&self) {}

    fn unfocus(&self) {}

    /// Begin a platform drag of `source`. Returns `false` if none started.
    fn start_drag(&self, _frame: FrameId, _source: NodeId) -> bool {
        false
    }

    fn disable_sudden_termination(&self) {}

    fn enable_sudden_termination(&self) {}
}

/// A chrome client that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyChromeClient;

impl ChromeClient for EmptyChromeClient {}

/// A page's view of its chrome.
pub struct Chrome {
    client: Rc<dyn ChromeClient>,
    page: Weak<Page>,
}

impl std::fmt::Debug for Chrome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chrome").finish_non_exhaustive()
    }
}

impl Chrome {
    pub(crate) fn new(client: Rc<dyn ChromeClient>, page: Weak<Page>) -> Self {
        Self { client, page }
    }

    #[must_use]
    pub fn client(&self) -> &Rc<dyn ChromeClient> {
        &self.client
    }

    pub fn invalidate_contents(&self, rect: IntRect, immediate: bool) {
        if rect.is_empty() {
            return;
        }
        self.client.invalidate_contents(rect, immediate);
    }

    pub fn set_status_bar_text(&self, text: &str) {
        self.client.set_status_bar_text(text);
    }

    pub fn mouse_did_move_over_element(&self, hit: &HitTestResult, modifiers: Modifiers) {
        self.client.mouse_did_move_over_element(hit, modifiers);
    }

    /// Show the title of the element under the mouse, or clear the tooltip.
    pub fn set_tool_tip(&self, hit: &HitTestResult) {
        let tip = hit.title.as_deref().unwrap_or_default();
        self.client.set_tool_tip(tip);
    }

    fn deferrer(&self) -> Option<PageGroupLoadDeferrer> {
        self.page
            .upgrade()
            .map(|page| PageGroupLoadDeferrer::new(&page, true))
    }

    pub fn run_javascript_alert(&self, frame: FrameId, message: &str) {
        let _deferrer = self.deferrer();
        trace!(%frame, "modal alert");
        self.client.run_javascript_alert(frame, message);
    }

    pub fn run_javascript_confirm(&self, frame: FrameId, message: &str) -> bool {
        let _deferrer = self.deferrer();
        trace!(%frame, "modal confirm");
        self.client.run_javascript_confirm(frame, message)
    }

    pub fn run_javascript_prompt(&self, frame: FrameId, message: &str, default: &str) -> Option<String> {
        let _deferrer = self.deferrer();
        trace!(%frame, "modal prompt");
        self.client.run_javascript_prompt(frame, message, default)
    }

    pub fn create_window(&self, opener: FrameId, features: &WindowFeatures) -> Option<Rc<Page>> {
        self.client.create_window(opener, features)
    }

    #[must_use]
    pub fn can_take_focus(&self, direction: FocusDirection) -> bool {
        self.client.can_take_focus(direction)
    }

    pub fn take_focus(&self, direction: FocusDirection) {
        self.client.take_focus(direction);
    }

    pub fn focus(&self) {
        self.client.focus();
    }

    pub fn unfocus(&self) {
        self.client.unfocus();
    }

    pub fn start_drag(&self, frame: FrameId, source: NodeId) -> bool {
        self.client.start_drag(frame, source)
    }

    pub(crate) fn disable_sudden_termination(&self) {
        self.client.disable_sudden_termination();
    }

    pub(crate) fn enable_sudden_termination(&self) {
        self.client.enable_sudden_termination();
    }

    pub(crate) fn layout_updated(&self, frame: FrameId) {
        self.client.layout_updated(frame);
    }

    pub(crate) fn contents_size_changed(&self, frame: FrameId, size: IntSize) {
        self.client.contents_size_changed(frame, size);
    }
}
