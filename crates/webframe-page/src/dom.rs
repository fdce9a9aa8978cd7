#![forbid(unsafe_code)]

//! The document as the dispatch core sees it.
//!
//! The DOM tree, style resolution, and script are outside this crate. A frame
//! talks to its document only through the [`Document`] trait: identity and
//! tree queries, focus, event dispatch, position ordering, and text search.
//! Everything is addressed by [`NodeId`]; the core never holds node objects.
//!
//! # Re-entrancy
//!
//! [`Document::dispatch_event`] runs script. Script may mutate the tree,
//! force layout, move focus, or tear down the frame that is dispatching.
//! Callers therefore hold no borrow of their own state across the call and
//! re-check anything they read before it.
//!
//! # Defaults
//!
//! Most methods have conservative defaults (not focusable, not editable, no
//! access keys, no markers) so a minimal document only implements identity,
//! tree shape, focus, dispatch, and position ordering.

use std::cmp::Ordering;
use std::time::Duration;

use webframe_core::event::{Modifiers, MouseButton, PlatformKeyboardEvent, WheelGranularity};
use webframe_core::geometry::IntPoint;
use webframe_core::gesture::DragSourceKind;

use crate::hit_test::HitTestRequest;
use crate::render::RenderTree;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Stable identifier of a node within its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Identifier of a document. A frame's document changes on navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub u64);

/// A point in the document: a container node and an offset inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub node: NodeId,
    pub offset: u32,
}

impl Position {
    #[must_use]
    pub const fn new(node: NodeId, offset: u32) -> Self {
        Self { node, offset }
    }
}

/// Half-open span between two positions, `start` never after `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn collapsed(at: Position) -> Self {
        Self { start: at, end: at }
    }

    #[must_use]
    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// DOM event types the core synthesizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    MouseDown,
    MouseUp,
    Click,
    DblClick,
    MouseMove,
    MouseOver,
    MouseOut,
    ContextMenu,
    MouseWheel,
    KeyDown,
    KeyPress,
    KeyUp,
    TextInput,
    DragStart,
    DragEnd,
    DragEnter,
    DragOver,
    DragLeave,
    Drop,
    SelectStart,
    Resize,
    Scroll,
    Focus,
    Blur,
}

impl EventType {
    /// The DOM name of the event.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MouseDown => "mousedown",
            Self::MouseUp => "mouseup",
            Self::Click => "click",
            Self::DblClick => "dblclick",
            Self::MouseMove => "mousemove",
            Self::MouseOver => "mouseover",
            Self::MouseOut => "mouseout",
            Self::ContextMenu => "contextmenu",
            Self::MouseWheel => "mousewheel",
            Self::KeyDown => "keydown",
            Self::KeyPress => "keypress",
            Self::KeyUp => "keyup",
            Self::TextInput => "textInput",
            Self::DragStart => "dragstart",
            Self::DragEnd => "dragend",
            Self::DragEnter => "dragenter",
            Self::DragOver => "dragover",
            Self::DragLeave => "dragleave",
            Self::Drop => "drop",
            Self::SelectStart => "selectstart",
            Self::Resize => "resize",
            Self::Scroll => "scroll",
            Self::Focus => "focus",
            Self::Blur => "blur",
        }
    }

    #[must_use]
    pub const fn is_mouse(self) -> bool {
        matches!(
            self,
            Self::MouseDown
                | Self::MouseUp
                | Self::Click
                | Self::DblClick
                | Self::MouseMove
                | Self::MouseOver
                | Self::MouseOut
                | Self::ContextMenu
        )
    }

    #[must_use]
    pub const fn is_drag(self) -> bool {
        matches!(
            self,
            Self::DragStart
                | Self::DragEnd
                | Self::DragEnter
                | Self::DragOver
                | Self::DragLeave
                | Self::Drop
        )
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Pointer data carried by mouse and drag events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEventDetail {
    pub button: MouseButton,
    /// DOM `detail`: the click count for press/release/click, 0 otherwise.
    pub click_count: u32,
    /// Position in the target document's contents coordinates.
    pub client: IntPoint,
    pub screen: IntPoint,
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelEventDetail {
    pub delta_x: f32,
    pub delta_y: f32,
    pub granularity: WheelGranularity,
    pub client: IntPoint,
    pub screen: IntPoint,
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEventDetail {
    pub data: String,
    pub is_line_break: bool,
    pub is_back_tab: bool,
}

/// Event-specific payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EventDetail {
    #[default]
    None,
    Mouse(MouseEventDetail),
    Wheel(WheelEventDetail),
    Key(PlatformKeyboardEvent),
    Text(TextEventDetail),
}

/// A synthesized DOM event ready for dispatch.
///
/// `default_prevented` / `default_handled` carry the state the event starts
/// dispatch with; an access-key keydown is pre-prevented, an input-method
/// keydown is pre-handled.
#[derive(Debug, Clone, PartialEq)]
pub struct DomEvent {
    pub event_type: EventType,
    pub target: NodeId,
    pub related_target: Option<NodeId>,
    pub cancelable: bool,
    pub detail: EventDetail,
    pub default_prevented: bool,
    pub default_handled: bool,
}

impl DomEvent {
    #[must_use]
    pub fn new(event_type: EventType, target: NodeId) -> Self {
        Self {
            event_type,
            target,
            related_target: None,
            cancelable: true,
            detail: EventDetail::None,
            default_prevented: false,
            default_handled: false,
        }
    }

    #[must_use]
    pub fn with_related_target(mut self, related: Option<NodeId>) -> Self {
        self.related_target = related;
        self
    }

    #[must_use]
    pub fn with_cancelable(mut self, cancelable: bool) -> Self {
        self.cancelable = cancelable;
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: EventDetail) -> Self {
        self.detail = detail;
        self
    }

    #[must_use]
    pub fn with_default_prevented(mut self, prevented: bool) -> Self {
        self.default_prevented = prevented;
        self
    }

    #[must_use]
    pub fn with_default_handled(mut self, handled: bool) -> Self {
        self.default_handled = handled;
        self
    }

    /// Mouse payload, if any.
    #[must_use]
    pub fn mouse(&self) -> Option<&MouseEventDetail> {
        match &self.detail {
            EventDetail::Mouse(m) => Some(m),
            _ => None,
        }
    }

    /// Keyboard payload, if any.
    #[must_use]
    pub fn key(&self) -> Option<&PlatformKeyboardEvent> {
        match &self.detail {
            EventDetail::Key(k) => Some(k),
            _ => None,
        }
    }

    #[must_use]
    pub fn text(&self) -> Option<&TextEventDetail> {
        match &self.detail {
            EventDetail::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchResult {
    /// A listener called `preventDefault()`.
    pub default_prevented: bool,
    /// Default handling already ran.
    pub default_handled: bool,
}

impl DispatchResult {
    /// The event should not fall through to platform behavior.
    #[must_use]
    pub const fn swallowed(&self) -> bool {
        self.default_prevented || self.default_handled
    }

    /// Fold in the state the event started dispatch with.
    #[must_use]
    pub fn including_initial(mut self, event: &DomEvent) -> Self {
        self.default_prevented |= event.default_prevented && event.cancelable;
        self.default_handled |= event.default_handled;
        self
    }
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Unit by which a selection grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextGranularity {
    #[default]
    Character,
    Word,
    Line,
    Paragraph,
}

/// Document marker kinds the core manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    TextMatch,
    Spelling,
    Grammar,
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A frame's document.
pub trait Document {
    fn id(&self) -> DocumentId;

    /// The document node itself.
    fn document_node(&self) -> NodeId;

    fn document_element(&self) -> Option<NodeId>;

    fn body(&self) -> Option<NodeId>;

    fn parent_node(&self, node: NodeId) -> Option<NodeId>;

    fn contains_node(&self, node: NodeId) -> bool;

    fn is_text_node(&self, _node: NodeId) -> bool {
        false
    }

    /// Host of the shadow tree `node` lives in, or `node` itself.
    fn shadow_ancestor_node(&self, node: NodeId) -> NodeId {
        node
    }

    /// Root of the shadow tree containing `node`, if it is in one.
    fn shadow_tree_root(&self, _node: NodeId) -> Option<NodeId> {
        None
    }

    /// Strict descendant test along the DOM parent chain.
    fn is_descendant_of(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.parent_node(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent_node(n);
        }
        false
    }

    // -- Focus and editing --------------------------------------------------

    fn is_focusable(&self, _node: NodeId) -> bool {
        false
    }

    fn is_mouse_focusable(&self, node: NodeId) -> bool {
        self.is_focusable(node)
    }

    fn is_content_editable(&self, _node: NodeId) -> bool {
        false
    }

    fn root_editable_element(&self, _node: NodeId) -> Option<NodeId> {
        None
    }

    fn in_design_mode(&self) -> bool {
        false
    }

    fn focused_node(&self) -> Option<NodeId>;

    /// Move document focus. Returns `false` if the document refused.
    fn set_focused_node(&self, node: Option<NodeId>) -> bool;

    fn next_focusable_node(&self, from: Option<NodeId>) -> Option<NodeId>;

    fn previous_focusable_node(&self, from: Option<NodeId>) -> Option<NodeId>;

    // -- Links, access keys, drag sources -----------------------------------

    fn is_link(&self, _node: NodeId) -> bool {
        false
    }

    /// Whether a press on `node` may begin a text selection at all.
    fn can_start_selection(&self, _node: NodeId) -> bool {
        true
    }

    /// Nearest draggable node at or above `node` and what kind it is.
    fn draggable_node(&self, _node: NodeId) -> Option<(NodeId, DragSourceKind)> {
        None
    }

    /// Element registered for `key` (already lowercased).
    fn element_for_access_key(&self, _key: &str) -> Option<NodeId> {
        None
    }

    fn access_key_action(&self, _node: NodeId, _send_to_any_element: bool) {}

    // -- Dispatch -----------------------------------------------------------

    /// Refresh `:hover` / `:active` after a hit test.
    fn update_hover_state(&self, _request: HitTestRequest, _inner: Option<NodeId>) {}

    /// Run listeners and element default actions for `event`.
    fn dispatch_event(&self, event: &DomEvent) -> DispatchResult;

    /// Fire a non-cancelable event at the window (resize, focus, blur).
    fn dispatch_window_event(&self, _event_type: EventType) {}

    // -- Loading and layout policy ------------------------------------------

    fn is_loading(&self) -> bool {
        false
    }

    fn is_parsing(&self) -> bool {
        false
    }

    /// Delay the document wants between a mutation and its layout.
    fn minimum_layout_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// `false` vetoes scheduling, e.g. before the body exists.
    fn should_schedule_layout(&self) -> bool {
        true
    }

    fn needs_style_recalc(&self) -> bool {
        false
    }

    fn recalc_style(&self) {}

    /// Tear down rendering; called when the frame drops the document.
    fn detach(&self) {}

    fn suspend_active_dom_objects(&self) {}

    fn resume_active_dom_objects(&self) {}

    // -- Positions and search -----------------------------------------------

    /// Range spanning the whole document.
    fn document_range(&self) -> Range;

    fn compare_positions(&self, a: Position, b: Position) -> Ordering;

    fn position_before(&self, node: NodeId) -> Position;

    fn position_after(&self, node: NodeId) -> Position;

    /// Whether `node` lies entirely inside `range`.
    fn range_contains_node(&self, range: &Range, node: NodeId) -> bool {
        self.compare_positions(range.start, self.position_before(node)) != Ordering::Greater
            && self.compare_positions(self.position_after(node), range.end) != Ordering::Greater
    }

    /// Grow `range` outward to whole units of `granularity`.
    fn expand_range(&self, range: Range, _granularity: TextGranularity) -> Range {
        range
    }

    /// First (or last, if `!forward`) match of `target` inside `search`.
    fn find_plain_text(
        &self,
        search: &Range,
        target: &str,
        forward: bool,
        case_sensitive: bool,
    ) -> Option<Range>;

    fn add_marker(&self, _range: &Range, _kind: MarkerKind) {}

    fn remove_markers(&self, _kind: MarkerKind) {}

    // -- Rendering ----------------------------------------------------------

    /// The render tree, absent while the document is detached.
    fn renderer(&self) -> Option<&dyn RenderTree> {
        None
    }
}
