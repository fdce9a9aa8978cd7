#![forbid(unsafe_code)]

//! Capability interface of the render tree.
//!
//! The layout algorithm, painting, and scrollable boxes live outside this
//! crate. [`RenderTree`] exposes what the core needs from them: dirty bits
//! and a layout entry point for [`FrameView`](crate::frame_view::FrameView),
//! hit testing and positions for [`EventHandler`](crate::event_handler::EventHandler),
//! and box scrolling for wheel, keyboard, and autoscroll handling.
//!
//! A render object is addressed by the [`NodeId`] of the node that
//! generated it; anonymous boxes are not visible at this boundary.

use webframe_core::geometry::{IntPoint, IntRect, IntSize};

use crate::dom::{NodeId, Position, Range};
use crate::hit_test::{HitTestRequest, HitTestResult};

/// Identifies a scrollbar widget, either a view's or an overflow box's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScrollbarId(pub u64);

/// Scrollbar visibility policy for a view axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScrollbarMode {
    #[default]
    Auto,
    AlwaysOff,
    AlwaysOn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    #[must_use]
    pub const fn is_vertical(self) -> bool {
        matches!(self, Self::Up | Self::Down)
    }

    #[must_use]
    pub const fn is_backward(self) -> bool {
        matches!(self, Self::Up | Self::Left)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollGranularity {
    Line,
    Page,
    Document,
    Pixel,
}

/// Overflow declared on `<html>`/`<body>`, applied to the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewportOverflow {
    pub horizontal: ScrollbarMode,
    pub vertical: ScrollbarMode,
    /// The body is a frameset; the view never scrolls.
    pub is_frameset: bool,
}

/// A document's render tree.
pub trait RenderTree {
    /// Node owning the render view (usually the document node).
    fn root(&self) -> NodeId;

    fn has_renderer(&self, node: NodeId) -> bool;

    /// Render-tree parent, which may differ from the DOM parent.
    fn parent_renderer(&self, node: NodeId) -> Option<NodeId>;

    fn needs_layout(&self, node: NodeId) -> bool;

    fn set_needs_layout(&self, node: NodeId, needs: bool);

    /// Flag the containing-block chain above `node`, stopping below `stop_at`.
    fn mark_containing_blocks_for_layout(&self, node: NodeId, stop_at: Option<NodeId>);

    /// Lay out the subtree rooted at `root`, clearing its dirty bits.
    fn layout(&self, root: NodeId);

    fn viewport_overflow(&self) -> ViewportOverflow {
        ViewportOverflow::default()
    }

    /// Extent of the laid-out document.
    fn document_size(&self) -> IntSize;

    fn update_layer_positions(&self, _full_repaint: bool) {}

    fn update_widget_positions(&self) {}

    /// Sync an embedded widget (plugin, subframe) to its box after layout.
    fn update_widget(&self, _node: NodeId) {}

    // -- Hit testing and geometry -------------------------------------------

    /// Hit test at `point` in contents coordinates.
    fn hit_test(&self, request: HitTestRequest, point: IntPoint) -> HitTestResult;

    /// Closest caret position to `local_point` inside `node`'s box.
    fn position_for_point(&self, node: NodeId, local_point: IntPoint) -> Option<Position>;

    fn absolute_bounds(&self, node: NodeId) -> Option<IntRect>;

    fn caret_bounds(&self, _position: Position) -> Option<IntRect> {
        None
    }

    fn range_bounds(&self, _range: &Range) -> Option<IntRect> {
        None
    }

    // -- Layer resize -------------------------------------------------------

    /// Layer whose resize corner contains `point`, starting from `node`.
    fn resize_layer_at(&self, _node: NodeId, _point: IntPoint) -> Option<NodeId> {
        None
    }

    fn offset_from_resize_corner(&self, _layer: NodeId, _point: IntPoint) -> IntSize {
        IntSize::default()
    }

    fn resize_layer(&self, _layer: NodeId, _point: IntPoint, _offset: IntSize) {}

    // -- Scrolling ----------------------------------------------------------

    fn can_be_programmatically_scrolled(&self, _node: NodeId) -> bool {
        false
    }

    fn is_list_box(&self, _node: NodeId) -> bool {
        false
    }

    /// Scroll the nearest scrollable box at or above `node`.
    /// Returns `true` if anything moved.
    fn scroll(
        &self,
        _node: NodeId,
        _direction: ScrollDirection,
        _granularity: ScrollGranularity,
        _multiplier: f32,
    ) -> bool {
        false
    }

    /// Scroll overflow boxes above `node` so `rect` becomes visible.
    fn scroll_rect_to_visible(&self, _node: NodeId, _rect: IntRect) -> bool {
        false
    }

    /// One selection-autoscroll step of box `node` toward `point`.
    fn autoscroll(&self, _node: NodeId, _point: IntPoint) {}

    /// One pan-scroll step of box `node`.
    fn pan_scroll(&self, _node: NodeId, _delta: IntSize) {}

    fn stop_autoscroll(&self, _node: NodeId) {}

    // -- Scrollbars ---------------------------------------------------------

    fn scrollbar_enabled(&self, _scrollbar: ScrollbarId) -> bool {
        true
    }

    fn scrollbar_mouse_down(&self, _scrollbar: ScrollbarId, _point: IntPoint) -> bool {
        false
    }

    fn scrollbar_mouse_up(&self, _scrollbar: ScrollbarId) -> bool {
        false
    }

    fn scrollbar_mouse_moved(&self, _scrollbar: ScrollbarId, _point: IntPoint) {}

    fn scrollbar_mouse_exited(&self, _scrollbar: ScrollbarId) {}
}

/// Whether `ancestor` is `node` or above it in the render tree.
pub fn is_render_ancestor_or_self(tree: &dyn RenderTree, ancestor: NodeId, node: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(n) = current {
        if n == ancestor {
            return true;
        }
        current = tree.parent_renderer(n);
    }
    false
}
