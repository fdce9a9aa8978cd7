#![forbid(unsafe_code)]

//! Hit-test request modes and results.

use bitflags::bitflags;
use webframe_core::event::PlatformMouseEvent;
use webframe_core::geometry::IntPoint;

use crate::dom::{Document, NodeId};
use crate::frame_tree::FrameId;
use crate::render::ScrollbarId;

bitflags! {
    /// How a hit test may affect document state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HitTestRequest: u8 {
        /// Do not update hover/active state.
        const READ_ONLY  = 0b0001;
        /// The button is down; `:active` applies.
        const ACTIVE     = 0b0010;
        const MOUSE_MOVE = 0b0100;
        const MOUSE_UP   = 0b1000;
    }
}

/// What lies under a point.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HitTestResult {
    /// The tested point, contents coordinates.
    pub point: IntPoint,
    /// The point relative to the inner node's box.
    pub local_point: IntPoint,
    pub inner_node: Option<NodeId>,
    /// Like `inner_node` but never a node shared between renderers.
    pub inner_non_shared_node: Option<NodeId>,
    pub scrollbar: Option<ScrollbarId>,
    /// The inner node hosts a widget (subframe, plugin).
    pub is_over_widget: bool,
    /// Enclosing link element.
    pub url_element: Option<NodeId>,
    pub title: Option<String>,
    /// Frame whose document produced the result, when resolved across frames.
    pub frame: Option<FrameId>,
}

impl HitTestResult {
    #[must_use]
    pub fn new(point: IntPoint) -> Self {
        Self {
            point,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_live_link(&self) -> bool {
        self.url_element.is_some()
    }

    /// Replace nodes inside shadow trees with their hosts.
    pub fn set_to_non_shadow_ancestor(&mut self, document: &dyn Document) {
        self.inner_node = self.inner_node.map(|n| document.shadow_ancestor_node(n));
        self.inner_non_shared_node = self
            .inner_non_shared_node
            .map(|n| document.shadow_ancestor_node(n));
    }
}

/// A platform mouse event together with the hit test done for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MouseEventWithHitTestResults {
    pub event: PlatformMouseEvent,
    pub hit: HitTestResult,
}

impl MouseEventWithHitTestResults {
    #[must_use]
    pub fn new(event: PlatformMouseEvent, hit: HitTestResult) -> Self {
        Self { event, hit }
    }

    #[must_use]
    pub fn target_node(&self) -> Option<NodeId> {
        self.hit.inner_node
    }

    #[must_use]
    pub fn local_point(&self) -> IntPoint {
        self.hit.local_point
    }

    #[must_use]
    pub fn scrollbar(&self) -> Option<ScrollbarId> {
        self.hit.scrollbar
    }

    #[must_use]
    pub fn is_over_link(&self) -> bool {
        self.hit.is_live_link()
    }
}
