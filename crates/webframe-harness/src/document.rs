#![forbid(unsafe_code)]

//! An in-memory document and render tree.
//!
//! [`TestDocument`] implements both [`Document`] and [`RenderTree`] over a
//! small node arena. Every element carries an optional absolute rect in
//! contents coordinates; hit testing picks the last node in document order
//! whose rect contains the point. Text nodes lay out their characters on a
//! fixed [`GLYPH_WIDTH`] grid, which is enough for caret positions, word
//! expansion, and find.
//!
//! Everything the core does to the document is recorded: dispatched DOM
//! events in [`TestDocument::events`], every other call in
//! [`TestDocument::calls`].
//!
//! # Positions
//!
//! A position in a text node is a byte offset into its text; a position in
//! any other node is a child index. Positions are ordered by walking the
//! tree in document order, so `position_before(n)` sorts before everything
//! inside `n` and `position_after(n)` after it.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;

use serde_json::json;
use webframe_core::geometry::{IntPoint, IntRect, IntSize};
use webframe_core::gesture::DragSourceKind;
use webframe_page::dom::{
    DispatchResult, Document, DocumentId, DomEvent, EventDetail, EventType, MarkerKind, NodeId,
    Position, Range, TextGranularity,
};
use webframe_page::hit_test::{HitTestRequest, HitTestResult};
use webframe_page::render::{
    RenderTree, ScrollDirection, ScrollGranularity, ScrollbarId, ViewportOverflow,
};

/// Advance of one character of a text node.
pub const GLYPH_WIDTH: i32 = 8;
/// Height of a text node's box.
pub const LINE_HEIGHT: i32 = 16;
/// Pixels an overflow box moves per line step.
pub const LINE_STEP: i32 = 40;

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Event listener. Returns what the listener did to the event.
pub type Listener = Rc<dyn Fn(&DomEvent) -> DispatchResult>;

/// Runs after the render tree laid out `root`.
pub type LayoutHook = Rc<dyn Fn(NodeId)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(String),
    Text(String),
}

/// Something the core asked of the document, other than event dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum DocCall {
    WindowEvent(EventType),
    Hover {
        request: HitTestRequest,
        node: Option<NodeId>,
    },
    Focus(Option<NodeId>),
    AccessKey(NodeId),
    Layout(NodeId),
    LayerPositions {
        full_repaint: bool,
    },
    WidgetUpdate(NodeId),
    Scroll {
        node: NodeId,
        direction: ScrollDirection,
        granularity: ScrollGranularity,
        multiplier: f32,
    },
    Autoscroll {
        node: NodeId,
        point: IntPoint,
    },
    PanScroll {
        node: NodeId,
        delta: IntSize,
    },
    StopAutoscroll(NodeId),
    ResizeLayer {
        layer: NodeId,
        point: IntPoint,
    },
    ScrollbarDown(ScrollbarId),
    ScrollbarUp(ScrollbarId),
    ScrollbarExited(ScrollbarId),
    RecalcStyle,
    Detach,
    Suspend,
    Resume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScrollBox {
    offset: IntSize,
    max: IntSize,
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    rect: Option<IntRect>,
    focusable: bool,
    mouse_focusable: Option<bool>,
    editable: bool,
    link: bool,
    title: Option<String>,
    draggable: Option<DragSourceKind>,
    frame_owner: bool,
    unselectable: bool,
    scroll_box: Option<ScrollBox>,
    list_box: bool,
    scrollbar: Option<(ScrollbarId, IntRect)>,
    resize_corner: Option<IntRect>,
    shadow_host: Option<NodeId>,
    needs_layout: bool,
}

impl NodeData {
    fn new(kind: NodeKind, parent: Option<NodeId>, rect: Option<IntRect>) -> Self {
        Self {
            kind,
            parent,
            children: Vec::new(),
            rect,
            focusable: false,
            mouse_focusable: None,
            editable: false,
            link: false,
            title: None,
            draggable: None,
            frame_owner: false,
            unselectable: false,
            scroll_box: None,
            list_box: false,
            scrollbar: None,
            resize_corner: None,
            shadow_host: None,
            needs_layout: true,
        }
    }

    fn text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }
}

struct Registration {
    event_type: EventType,
    node: NodeId,
    listener: Listener,
}

struct State {
    nodes: HashMap<NodeId, NodeData>,
    next_node: u64,
    focused: Option<NodeId>,
    listeners: Vec<Registration>,
    events: Vec<DomEvent>,
    calls: Vec<DocCall>,
    access_keys: HashMap<String, NodeId>,
    markers: Vec<(Range, MarkerKind)>,
    document_size: IntSize,
    viewport_overflow: ViewportOverflow,
    layout_hook: Option<LayoutHook>,
}

impl State {
    fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(&id)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(&id)
    }

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    fn ancestors_inclusive(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.nodes.contains_key(&id).then_some(id);
        while let Some(n) = current {
            out.push(n);
            current = self.parent(n);
        }
        out
    }

    fn preorder(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(n) = stack.pop() {
            let Some(data) = self.node(n) else {
                continue;
            };
            out.push(n);
            stack.extend(data.children.iter().rev());
        }
        out
    }

    fn index_in_parent(&self, id: NodeId) -> Option<(NodeId, u32)> {
        let parent = self.parent(id)?;
        let index = self.node(parent)?.children.iter().position(|c| *c == id)?;
        Some((parent, u32::try_from(index).unwrap_or(u32::MAX)))
    }

    fn boundary_keys(&self) -> HashMap<NodeId, (u64, u64)> {
        let mut keys = HashMap::new();
        let mut counter = 0u64;
        self.assign_keys(TestDocument::DOCUMENT, &mut counter, &mut keys);
        keys
    }

    fn assign_keys(&self, node: NodeId, counter: &mut u64, keys: &mut HashMap<NodeId, (u64, u64)>) {
        let begin = *counter;
        *counter += 1;
        if let Some(data) = self.node(node) {
            match data.text() {
                Some(text) => *counter += text.len() as u64,
                None => {
                    for child in &data.children {
                        self.assign_keys(*child, counter, keys);
                    }
                }
            }
        }
        keys.insert(node, (begin, *counter));
        *counter += 1;
    }

    fn position_key(&self, keys: &HashMap<NodeId, (u64, u64)>, position: Position) -> u64 {
        let (Some(&(begin, end)), Some(data)) = (keys.get(&position.node), self.node(position.node)) else {
            return 0;
        };
        match data.text() {
            Some(text) => begin + 1 + u64::from(position.offset).min(text.len() as u64),
            None => data
                .children
                .get(position.offset as usize)
                .and_then(|child| keys.get(child))
                .map_or(end, |&(child_begin, _)| child_begin),
        }
    }

    fn nearest<F: Fn(&NodeData) -> bool>(&self, node: NodeId, pred: F) -> Option<NodeId> {
        self.ancestors_inclusive(node)
            .into_iter()
            .find(|n| self.node(*n).is_some_and(&pred))
    }

    fn is_editable(&self, node: NodeId) -> bool {
        self.nearest(node, |data| data.editable).is_some()
    }
}

/// In-memory [`Document`] + [`RenderTree`].
pub struct TestDocument {
    id: DocumentId,
    state: RefCell<State>,
    loading: Cell<bool>,
    parsing: Cell<bool>,
    design_mode: Cell<bool>,
    minimum_layout_delay: Cell<Duration>,
    should_schedule_layout: Cell<bool>,
    style_dirty: Cell<bool>,
    detached: Cell<bool>,
    layout_count: Cell<u32>,
    refuse_focus: Cell<bool>,
    scrollbar_takes_press: Cell<bool>,
}

impl std::fmt::Debug for TestDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("TestDocument")
            .field("id", &self.id)
            .field("nodes", &state.nodes.len())
            .field("events", &state.events.len())
            .field("focused", &state.focused)
            .finish_non_exhaustive()
    }
}

impl TestDocument {
    pub const DOCUMENT: NodeId = NodeId(1);
    pub const HTML: NodeId = NodeId(2);
    pub const BODY: NodeId = NodeId(3);

    /// A document whose `<html>` and `<body>` fill `size`.
    #[must_use]
    pub fn new(size: IntSize) -> Rc<Self> {
        let full = IntRect::from_origin_size(IntPoint::zero(), size);
        let mut nodes = HashMap::new();
        let mut document = NodeData::new(NodeKind::Document, None, None);
        document.children.push(Self::HTML);
        let mut html = NodeData::new(NodeKind::Element("html".into()), Some(Self::DOCUMENT), Some(full));
        html.children.push(Self::BODY);
        let body = NodeData::new(NodeKind::Element("body".into()), Some(Self::HTML), Some(full));
        nodes.insert(Self::DOCUMENT, document);
        nodes.insert(Self::HTML, html);
        nodes.insert(Self::BODY, body);

        Rc::new(Self {
            id: DocumentId(NEXT_DOCUMENT_ID.fetch_add(1, AtomicOrdering::Relaxed)),
            state: RefCell::new(State {
                nodes,
                next_node: 4,
                focused: None,
                listeners: Vec::new(),
                events: Vec::new(),
                calls: Vec::new(),
                access_keys: HashMap::new(),
                markers: Vec::new(),
                document_size: size,
                viewport_overflow: ViewportOverflow::default(),
                layout_hook: None,
            }),
            loading: Cell::new(false),
            parsing: Cell::new(false),
            design_mode: Cell::new(false),
            minimum_layout_delay: Cell::new(Duration::ZERO),
            should_schedule_layout: Cell::new(true),
            style_dirty: Cell::new(false),
            detached: Cell::new(false),
            layout_count: Cell::new(0),
            refuse_focus: Cell::new(false),
            scrollbar_takes_press: Cell::new(true),
        })
    }

    // -----------------------------------------------------------------------
    // Building
    // -----------------------------------------------------------------------

    fn insert(&self, parent: NodeId, data: NodeData) -> NodeId {
        let mut state = self.state.borrow_mut();
        let id = NodeId(state.next_node);
        state.next_node += 1;
        state.nodes.insert(id, data);
        if let Some(parent) = state.node_mut(parent) {
            parent.children.push(id);
        }
        id
    }

    /// Append an element under `parent`. `rect` is absolute; `None` means
    /// the element generates no box.
    pub fn append_element(&self, parent: NodeId, tag: &str, rect: Option<IntRect>) -> NodeId {
        self.insert(parent, NodeData::new(NodeKind::Element(tag.to_owned()), Some(parent), rect))
    }

    /// Append a text node laid out on one line starting at `origin`.
    pub fn append_text(&self, parent: NodeId, text: &str, origin: IntPoint) -> NodeId {
        let width = i32::try_from(text.len()).unwrap_or(i32::MAX / GLYPH_WIDTH) * GLYPH_WIDTH;
        let rect = IntRect::new(origin.x, origin.y, width, LINE_HEIGHT);
        self.insert(parent, NodeData::new(NodeKind::Text(text.to_owned()), Some(parent), Some(rect)))
    }

    /// Give `host` a shadow root occupying `rect`. Nodes below it resolve
    /// to `host` for event targeting.
    pub fn attach_shadow_root(&self, host: NodeId, rect: Option<IntRect>) -> NodeId {
        let mut data = NodeData::new(NodeKind::Element("#shadow-root".into()), Some(host), rect);
        data.shadow_host = Some(host);
        self.insert(host, data)
    }

    /// Remove `node` and everything below it.
    pub fn remove_node(&self, node: NodeId) {
        let mut state = self.state.borrow_mut();
        if let Some(parent) = state.parent(node)
            && let Some(parent) = state.node_mut(parent)
        {
            parent.children.retain(|c| *c != node);
        }
        for n in state.preorder(node) {
            state.nodes.remove(&n);
            if state.focused == Some(n) {
                state.focused = None;
            }
        }
        state.access_keys.retain(|_, n| *n != node);
    }

    fn update(&self, node: NodeId, f: impl FnOnce(&mut NodeData)) {
        if let Some(data) = self.state.borrow_mut().node_mut(node) {
            f(data);
        }
    }

    pub fn set_rect(&self, node: NodeId, rect: Option<IntRect>) {
        self.update(node, |d| d.rect = rect);
    }

    pub fn set_focusable(&self, node: NodeId, focusable: bool) {
        self.update(node, |d| d.focusable = focusable);
    }

    /// Override mouse focusability, which otherwise follows `set_focusable`.
    pub fn set_mouse_focusable(&self, node: NodeId, focusable: bool) {
        self.update(node, |d| d.mouse_focusable = Some(focusable));
    }

    pub fn set_editable(&self, node: NodeId, editable: bool) {
        self.update(node, |d| d.editable = editable);
    }

    pub fn set_link(&self, node: NodeId, link: bool) {
        self.update(node, |d| d.link = link);
    }

    pub fn set_title(&self, node: NodeId, title: &str) {
        let title = title.to_owned();
        self.update(node, |d| d.title = Some(title));
    }

    pub fn set_draggable(&self, node: NodeId, kind: Option<DragSourceKind>) {
        self.update(node, |d| d.draggable = kind);
    }

    /// Mark `node` as hosting a widget (a subframe's owner element).
    pub fn set_frame_owner(&self, node: NodeId) {
        self.update(node, |d| d.frame_owner = true);
    }

    pub fn set_unselectable(&self, node: NodeId) {
        self.update(node, |d| d.unselectable = true);
    }

    /// Make `node` an overflow box scrollable up to `max`.
    pub fn set_scroll_box(&self, node: NodeId, max: IntSize) {
        self.update(node, |d| {
            d.scroll_box = Some(ScrollBox {
                offset: IntSize::default(),
                max,
            });
        });
    }

    pub fn set_list_box(&self, node: NodeId) {
        self.update(node, |d| d.list_box = true);
    }

    pub fn set_scrollbar(&self, node: NodeId, scrollbar: ScrollbarId, rect: IntRect) {
        self.update(node, |d| d.scrollbar = Some((scrollbar, rect)));
    }

    pub fn set_resize_corner(&self, node: NodeId, rect: IntRect) {
        self.update(node, |d| d.resize_corner = Some(rect));
    }

    pub fn set_access_key(&self, key: &str, node: NodeId) {
        self.state.borrow_mut().access_keys.insert(key.to_lowercase(), node);
    }

    // -----------------------------------------------------------------------
    // Listeners
    // -----------------------------------------------------------------------

    /// Listen for `event_type` at `node` or anywhere below it.
    pub fn on(&self, event_type: EventType, node: NodeId, listener: impl Fn(&DomEvent) -> DispatchResult + 'static) {
        self.state.borrow_mut().listeners.push(Registration {
            event_type,
            node,
            listener: Rc::new(listener),
        });
    }

    pub fn prevent_default(&self, event_type: EventType, node: NodeId) {
        self.on(event_type, node, |_| DispatchResult {
            default_prevented: true,
            default_handled: false,
        });
    }

    pub fn mark_handled(&self, event_type: EventType, node: NodeId) {
        self.on(event_type, node, |_| DispatchResult {
            default_prevented: false,
            default_handled: true,
        });
    }

    pub fn clear_listeners(&self) {
        self.state.borrow_mut().listeners.clear();
    }

    // -----------------------------------------------------------------------
    // Policy knobs
    // -----------------------------------------------------------------------

    pub fn set_loading(&self, loading: bool) {
        self.loading.set(loading);
    }

    pub fn set_parsing(&self, parsing: bool) {
        self.parsing.set(parsing);
    }

    pub fn set_design_mode(&self, on: bool) {
        self.design_mode.set(on);
    }

    pub fn set_minimum_layout_delay(&self, delay: Duration) {
        self.minimum_layout_delay.set(delay);
    }

    pub fn set_should_schedule_layout(&self, allowed: bool) {
        self.should_schedule_layout.set(allowed);
    }

    pub fn set_needs_style_recalc(&self, dirty: bool) {
        self.style_dirty.set(dirty);
    }

    /// Refuse every attempt to focus a node.
    pub fn set_refuse_focus(&self, refuse: bool) {
        self.refuse_focus.set(refuse);
    }

    pub fn set_scrollbar_takes_press(&self, takes: bool) {
        self.scrollbar_takes_press.set(takes);
    }

    pub fn set_document_size(&self, size: IntSize) {
        self.state.borrow_mut().document_size = size;
    }

    pub fn set_viewport_overflow(&self, overflow: ViewportOverflow) {
        self.state.borrow_mut().viewport_overflow = overflow;
    }

    pub fn set_layout_hook(&self, hook: Option<LayoutHook>) {
        self.state.borrow_mut().layout_hook = hook;
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Every DOM event dispatched so far.
    #[must_use]
    pub fn events(&self) -> Vec<DomEvent> {
        self.state.borrow().events.clone()
    }

    /// `(type, target)` of every dispatched event.
    #[must_use]
    pub fn dispatched(&self) -> Vec<(EventType, NodeId)> {
        self.state
            .borrow()
            .events
            .iter()
            .map(|e| (e.event_type, e.target))
            .collect()
    }

    #[must_use]
    pub fn dispatched_types(&self) -> Vec<EventType> {
        self.state.borrow().events.iter().map(|e| e.event_type).collect()
    }

    #[must_use]
    pub fn count_of(&self, event_type: EventType) -> usize {
        self.state
            .borrow()
            .events
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    /// Dispatched events other than `mouseover`/`mouseout`/`mousemove`.
    #[must_use]
    pub fn dispatched_without_hover(&self) -> Vec<(EventType, NodeId)> {
        self.dispatched()
            .into_iter()
            .filter(|(t, _)| !matches!(t, EventType::MouseOver | EventType::MouseOut | EventType::MouseMove))
            .collect()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<DocCall> {
        self.state.borrow().calls.clone()
    }

    /// Layout roots in the order the render tree laid them out.
    #[must_use]
    pub fn layout_roots(&self) -> Vec<NodeId> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|c| match c {
                DocCall::Layout(root) => Some(*root),
                _ => None,
            })
            .collect()
    }

    /// Clear recorded events and calls.
    pub fn clear_log(&self) {
        let mut state = self.state.borrow_mut();
        state.events.clear();
        state.calls.clear();
    }

    /// Number of render-tree layouts run.
    #[must_use]
    pub fn layout_count(&self) -> u32 {
        self.layout_count.get()
    }

    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.detached.get()
    }

    #[must_use]
    pub fn markers(&self) -> Vec<(Range, MarkerKind)> {
        self.state.borrow().markers.clone()
    }

    #[must_use]
    pub fn scroll_offset(&self, node: NodeId) -> Option<IntSize> {
        Some(self.state.borrow().node(node)?.scroll_box?.offset)
    }

    #[must_use]
    pub fn text(&self, node: NodeId) -> Option<String> {
        self.state.borrow().node(node)?.text().map(str::to_owned)
    }

    /// Window point at the middle of character `offset` of a text node.
    #[must_use]
    pub fn point_in_text(&self, node: NodeId, offset: i32) -> Option<IntPoint> {
        let rect = self.state.borrow().node(node)?.rect?;
        Some(IntPoint::new(rect.x + offset * GLYPH_WIDTH + GLYPH_WIDTH / 2, rect.y + LINE_HEIGHT / 2))
    }

    /// The record as JSONL, one object per dispatched event.
    #[must_use]
    pub fn to_jsonl(&self) -> Vec<String> {
        let state = self.state.borrow();
        state
            .events
            .iter()
            .enumerate()
            .map(|(idx, e)| {
                let click_count = match &e.detail {
                    EventDetail::Mouse(m) => Some(m.click_count),
                    _ => None,
                };
                json!({
                    "idx": idx,
                    "document": self.id.0,
                    "event": e.event_type.name(),
                    "target": e.target.0,
                    "related": e.related_target.map(|n| n.0),
                    "cancelable": e.cancelable,
                    "click_count": click_count,
                })
                .to_string()
            })
            .collect()
    }

    fn record(&self, call: DocCall) {
        self.state.borrow_mut().calls.push(call);
    }

    fn caret_rect(state: &State, position: Position) -> Option<IntRect> {
        let data = state.node(position.node)?;
        let rect = data.rect?;
        let offset = i32::try_from(position.offset).unwrap_or(i32::MAX);
        let x = match data.text() {
            Some(_) => rect.x.saturating_add(offset.saturating_mul(GLYPH_WIDTH)),
            None => rect.x,
        };
        Some(IntRect::new(x, rect.y, 1, rect.height.max(1)))
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn word_start(text: &str, offset: usize) -> usize {
    let bytes = text.as_bytes();
    let mut start = offset.min(bytes.len());
    while start > 0 && is_word_byte(bytes[start - 1]) {
        start -= 1;
    }
    start
}

fn word_end(text: &str, offset: usize) -> usize {
    let bytes = text.as_bytes();
    let mut end = offset.min(bytes.len());
    while end < bytes.len() && is_word_byte(bytes[end]) {
        end += 1;
    }
    end
}

fn to_offset(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

impl Document for TestDocument {
    fn id(&self) -> DocumentId {
        self.id
    }

    fn document_node(&self) -> NodeId {
        Self::DOCUMENT
    }

    fn document_element(&self) -> Option<NodeId> {
        self.state.borrow().nodes.contains_key(&Self::HTML).then_some(Self::HTML)
    }

    fn body(&self) -> Option<NodeId> {
        self.state.borrow().nodes.contains_key(&Self::BODY).then_some(Self::BODY)
    }

    fn parent_node(&self, node: NodeId) -> Option<NodeId> {
        self.state.borrow().parent(node)
    }

    fn contains_node(&self, node: NodeId) -> bool {
        self.state.borrow().nodes.contains_key(&node)
    }

    fn is_text_node(&self, node: NodeId) -> bool {
        self.state.borrow().node(node).is_some_and(|d| d.text().is_some())
    }

    fn shadow_ancestor_node(&self, node: NodeId) -> NodeId {
        let state = self.state.borrow();
        state
            .ancestors_inclusive(node)
            .into_iter()
            .find_map(|n| state.node(n).and_then(|d| d.shadow_host))
            .unwrap_or(node)
    }

    fn shadow_tree_root(&self, node: NodeId) -> Option<NodeId> {
        let state = self.state.borrow();
        state.nearest(node, |d| d.shadow_host.is_some())
    }

    fn is_focusable(&self, node: NodeId) -> bool {
        self.state.borrow().node(node).is_some_and(|d| d.focusable)
    }

    fn is_mouse_focusable(&self, node: NodeId) -> bool {
        self.state
            .borrow()
            .node(node)
            .is_some_and(|d| d.mouse_focusable.unwrap_or(d.focusable))
    }

    fn is_content_editable(&self, node: NodeId) -> bool {
        self.design_mode.get() || self.state.borrow().is_editable(node)
    }

    fn root_editable_element(&self, node: NodeId) -> Option<NodeId> {
        let state = self.state.borrow();
        if !state.is_editable(node) {
            return None;
        }
        let mut root = node;
        while let Some(parent) = state.parent(root) {
            if !state.is_editable(parent) {
                break;
            }
            root = parent;
        }
        // Text nodes are never roots; their element is.
        if state.node(root).is_some_and(|d| d.text().is_some()) {
            return state.parent(root);
        }
        Some(root)
    }

    fn in_design_mode(&self) -> bool {
        self.design_mode.get()
    }

    fn focused_node(&self) -> Option<NodeId> {
        self.state.borrow().focused
    }

    fn set_focused_node(&self, node: Option<NodeId>) -> bool {
        if node.is_some() && self.refuse_focus.get() {
            return false;
        }
        let mut state = self.state.borrow_mut();
        if let Some(n) = node
            && !state.nodes.contains_key(&n)
        {
            return false;
        }
        state.focused = node;
        state.calls.push(DocCall::Focus(node));
        true
    }

    fn next_focusable_node(&self, from: Option<NodeId>) -> Option<NodeId> {
        let state = self.state.borrow();
        let order = state.preorder(Self::DOCUMENT);
        let start = match from {
            Some(node) => order.iter().position(|n| *n == node).map_or(0, |i| i + 1),
            None => 0,
        };
        order[start..]
            .iter()
            .copied()
            .find(|n| state.node(*n).is_some_and(|d| d.focusable || d.frame_owner))
    }

    fn previous_focusable_node(&self, from: Option<NodeId>) -> Option<NodeId> {
        let state = self.state.borrow();
        let order = state.preorder(Self::DOCUMENT);
        let end = match from {
            Some(node) => order.iter().position(|n| *n == node).unwrap_or(order.len()),
            None => order.len(),
        };
        order[..end]
            .iter()
            .rev()
            .copied()
            .find(|n| state.node(*n).is_some_and(|d| d.focusable || d.frame_owner))
    }

    fn is_link(&self, node: NodeId) -> bool {
        self.state.borrow().node(node).is_some_and(|d| d.link)
    }

    fn can_start_selection(&self, node: NodeId) -> bool {
        self.state.borrow().nearest(node, |d| d.unselectable).is_none()
    }

    fn draggable_node(&self, node: NodeId) -> Option<(NodeId, DragSourceKind)> {
        let state = self.state.borrow();
        let found = state.nearest(node, |d| d.draggable.is_some())?;
        Some((found, state.node(found)?.draggable?))
    }

    fn element_for_access_key(&self, key: &str) -> Option<NodeId> {
        self.state.borrow().access_keys.get(key).copied()
    }

    fn access_key_action(&self, node: NodeId, _send_to_any_element: bool) {
        self.record(DocCall::AccessKey(node));
    }

    fn update_hover_state(&self, request: HitTestRequest, inner: Option<NodeId>) {
        self.record(DocCall::Hover { request, node: inner });
    }

    fn dispatch_event(&self, event: &DomEvent) -> DispatchResult {
        let listeners: Vec<Listener> = {
            let mut state = self.state.borrow_mut();
            state.events.push(event.clone());
            let path = state.ancestors_inclusive(event.target);
            path.iter()
                .flat_map(|node| {
                    state
                        .listeners
                        .iter()
                        .filter(|r| r.event_type == event.event_type && r.node == *node)
                        .map(|r| Rc::clone(&r.listener))
                        .collect::<Vec<_>>()
                })
                .collect()
        };
        let mut result = DispatchResult::default();
        for listener in listeners {
            let outcome = listener(event);
            result.default_prevented |= outcome.default_prevented;
            result.default_handled |= outcome.default_handled;
        }
        if !event.cancelable {
            result.default_prevented = false;
        }
        result
    }

    fn dispatch_window_event(&self, event_type: EventType) {
        self.record(DocCall::WindowEvent(event_type));
    }

    fn is_loading(&self) -> bool {
        self.loading.get()
    }

    fn is_parsing(&self) -> bool {
        self.parsing.get()
    }

    fn minimum_layout_delay(&self) -> Duration {
        self.minimum_layout_delay.get()
    }

    fn should_schedule_layout(&self) -> bool {
        self.should_schedule_layout.get()
    }

    fn needs_style_recalc(&self) -> bool {
        self.style_dirty.get()
    }

    fn recalc_style(&self) {
        self.style_dirty.set(false);
        self.record(DocCall::RecalcStyle);
    }

    fn detach(&self) {
        self.detached.set(true);
        self.record(DocCall::Detach);
    }

    fn suspend_active_dom_objects(&self) {
        self.record(DocCall::Suspend);
    }

    fn resume_active_dom_objects(&self) {
        self.record(DocCall::Resume);
    }

    fn document_range(&self) -> Range {
        let count = self
            .state
            .borrow()
            .node(Self::DOCUMENT)
            .map_or(0, |d| to_offset(d.children.len()));
        Range::new(Position::new(Self::DOCUMENT, 0), Position::new(Self::DOCUMENT, count))
    }

    fn compare_positions(&self, a: Position, b: Position) -> Ordering {
        let state = self.state.borrow();
        let keys = state.boundary_keys();
        state.position_key(&keys, a).cmp(&state.position_key(&keys, b))
    }

    fn position_before(&self, node: NodeId) -> Position {
        match self.state.borrow().index_in_parent(node) {
            Some((parent, index)) => Position::new(parent, index),
            None => Position::new(node, 0),
        }
    }

    fn position_after(&self, node: NodeId) -> Position {
        let state = self.state.borrow();
        match state.index_in_parent(node) {
            Some((parent, index)) => Position::new(parent, index.saturating_add(1)),
            None => Position::new(node, state.node(node).map_or(0, |d| to_offset(d.children.len()))),
        }
    }

    fn expand_range(&self, range: Range, granularity: TextGranularity) -> Range {
        let state = self.state.borrow();
        let (Some(start_text), Some(end_text)) = (
            state.node(range.start.node).and_then(NodeData::text),
            state.node(range.end.node).and_then(NodeData::text),
        ) else {
            return range;
        };
        match granularity {
            TextGranularity::Character => range,
            TextGranularity::Word => Range::new(
                Position::new(range.start.node, to_offset(word_start(start_text, range.start.offset as usize))),
                Position::new(range.end.node, to_offset(word_end(end_text, range.end.offset as usize))),
            ),
            TextGranularity::Line | TextGranularity::Paragraph => Range::new(
                Position::new(range.start.node, 0),
                Position::new(range.end.node, to_offset(end_text.len())),
            ),
        }
    }

    fn find_plain_text(&self, search: &Range, target: &str, forward: bool, case_sensitive: bool) -> Option<Range> {
        if target.is_empty() {
            return None;
        }
        let state = self.state.borrow();
        let keys = state.boundary_keys();
        let lower_bound = state.position_key(&keys, search.start);
        let upper_bound = state.position_key(&keys, search.end);
        let needle = if case_sensitive {
            target.to_owned()
        } else {
            target.to_ascii_lowercase()
        };

        let mut matches = Vec::new();
        for node in state.preorder(Self::DOCUMENT) {
            let Some(text) = state.node(node).and_then(NodeData::text) else {
                continue;
            };
            let haystack = if case_sensitive {
                text.to_owned()
            } else {
                text.to_ascii_lowercase()
            };
            for (offset, _) in haystack.match_indices(&needle) {
                let range = Range::new(
                    Position::new(node, to_offset(offset)),
                    Position::new(node, to_offset(offset + needle.len())),
                );
                if state.position_key(&keys, range.start) >= lower_bound
                    && state.position_key(&keys, range.end) <= upper_bound
                {
                    matches.push(range);
                }
            }
        }
        if forward {
            matches.first().copied()
        } else {
            matches.last().copied()
        }
    }

    fn add_marker(&self, range: &Range, kind: MarkerKind) {
        self.state.borrow_mut().markers.push((*range, kind));
    }

    fn remove_markers(&self, kind: MarkerKind) {
        self.state.borrow_mut().markers.retain(|(_, k)| *k != kind);
    }

    fn renderer(&self) -> Option<&dyn RenderTree> {
        if self.detached.get() {
            None
        } else {
            Some(self)
        }
    }
}

// ---------------------------------------------------------------------------
// RenderTree
// ---------------------------------------------------------------------------

impl RenderTree for TestDocument {
    fn root(&self) -> NodeId {
        Self::DOCUMENT
    }

    fn has_renderer(&self, node: NodeId) -> bool {
        node == Self::DOCUMENT || self.state.borrow().node(node).is_some_and(|d| d.rect.is_some())
    }

    fn parent_renderer(&self, node: NodeId) -> Option<NodeId> {
        self.state.borrow().parent(node)
    }

    fn needs_layout(&self, node: NodeId) -> bool {
        self.state.borrow().node(node).is_some_and(|d| d.needs_layout)
    }

    fn set_needs_layout(&self, node: NodeId, needs: bool) {
        self.update(node, |d| d.needs_layout = needs);
    }

    fn mark_containing_blocks_for_layout(&self, node: NodeId, stop_at: Option<NodeId>) {
        let mut state = self.state.borrow_mut();
        let mut current = state.parent(node);
        while let Some(n) = current {
            if Some(n) == stop_at {
                break;
            }
            if let Some(data) = state.node_mut(n) {
                data.needs_layout = true;
            }
            current = state.parent(n);
        }
    }

    fn layout(&self, root: NodeId) {
        let hook = {
            let mut state = self.state.borrow_mut();
            for n in state.preorder(root) {
                if let Some(data) = state.node_mut(n) {
                    data.needs_layout = false;
                }
            }
            state.calls.push(DocCall::Layout(root));
            state.layout_hook.clone()
        };
        self.layout_count.set(self.layout_count.get() + 1);
        if let Some(hook) = hook {
            hook(root);
        }
    }

    fn viewport_overflow(&self) -> ViewportOverflow {
        self.state.borrow().viewport_overflow
    }

    fn document_size(&self) -> IntSize {
        self.state.borrow().document_size
    }

    fn update_layer_positions(&self, full_repaint: bool) {
        self.record(DocCall::LayerPositions { full_repaint });
    }

    fn update_widget(&self, node: NodeId) {
        self.record(DocCall::WidgetUpdate(node));
    }

    fn hit_test(&self, _request: HitTestRequest, point: IntPoint) -> HitTestResult {
        let state = self.state.borrow();
        let mut result = HitTestResult::new(point);
        let order = state.preorder(Self::DOCUMENT);
        let inner = order
            .iter()
            .rev()
            .copied()
            .find(|n| state.node(*n).and_then(|d| d.rect).is_some_and(|r| r.contains_point(point)))
            // Points outside every box land on the root element.
            .or_else(|| state.nodes.contains_key(&Self::HTML).then_some(Self::HTML));
        if let Some(node) = inner {
            let rect = state.node(node).and_then(|d| d.rect).unwrap_or_default();
            result.inner_node = Some(node);
            result.inner_non_shared_node = Some(node);
            result.local_point = IntPoint::new(point.x - rect.x, point.y - rect.y);
            result.is_over_widget = state.node(node).is_some_and(|d| d.frame_owner);
            result.url_element = state.nearest(node, |d| d.link);
            result.title = state
                .nearest(node, |d| d.title.is_some())
                .and_then(|n| state.node(n)?.title.clone());
        }
        result.scrollbar = order.iter().rev().find_map(|n| {
            let (id, rect) = state.node(*n)?.scrollbar?;
            rect.contains_point(point).then_some(id)
        });
        result
    }

    fn position_for_point(&self, node: NodeId, local_point: IntPoint) -> Option<Position> {
        let state = self.state.borrow();
        let data = state.node(node)?;
        match data.text() {
            Some(text) => {
                let len = i32::try_from(text.len()).unwrap_or(i32::MAX);
                let offset = ((local_point.x + GLYPH_WIDTH / 2) / GLYPH_WIDTH).clamp(0, len);
                Some(Position::new(node, u32::try_from(offset).unwrap_or(0)))
            }
            None => Some(Position::new(node, 0)),
        }
    }

    fn absolute_bounds(&self, node: NodeId) -> Option<IntRect> {
        self.state.borrow().node(node)?.rect
    }

    fn caret_bounds(&self, position: Position) -> Option<IntRect> {
        Self::caret_rect(&self.state.borrow(), position)
    }

    fn range_bounds(&self, range: &Range) -> Option<IntRect> {
        let state = self.state.borrow();
        let start = Self::caret_rect(&state, range.start)?;
        let end = Self::caret_rect(&state, range.end)?;
        Some(start.union(&end))
    }

    fn resize_layer_at(&self, node: NodeId, point: IntPoint) -> Option<NodeId> {
        let state = self.state.borrow();
        state.nearest(node, |d| d.resize_corner.is_some_and(|c| c.contains_point(point)))
    }

    fn offset_from_resize_corner(&self, layer: NodeId, point: IntPoint) -> IntSize {
        let corner = self
            .state
            .borrow()
            .node(layer)
            .and_then(|d| d.resize_corner)
            .unwrap_or_default();
        IntSize::new(corner.right() - point.x, corner.bottom() - point.y)
    }

    fn resize_layer(&self, layer: NodeId, point: IntPoint, _offset: IntSize) {
        self.record(DocCall::ResizeLayer { layer, point });
    }

    fn can_be_programmatically_scrolled(&self, node: NodeId) -> bool {
        self.state.borrow().node(node).is_some_and(|d| d.scroll_box.is_some())
    }

    fn is_list_box(&self, node: NodeId) -> bool {
        self.state.borrow().node(node).is_some_and(|d| d.list_box)
    }

    fn scroll(&self, node: NodeId, direction: ScrollDirection, granularity: ScrollGranularity, multiplier: f32) -> bool {
        let mut state = self.state.borrow_mut();
        let Some(target) = state.nearest(node, |d| d.scroll_box.is_some()) else {
            return false;
        };
        state.calls.push(DocCall::Scroll {
            node: target,
            direction,
            granularity,
            multiplier,
        });
        let Some(data) = state.node_mut(target) else {
            return false;
        };
        let page = data.rect.map_or(0, |r| if direction.is_vertical() { r.height } else { r.width });
        let Some(scroll_box) = data.scroll_box.as_mut() else {
            return false;
        };
        let step = match granularity {
            ScrollGranularity::Pixel => multiplier.round() as i32,
            ScrollGranularity::Line => (LINE_STEP as f32 * multiplier).round() as i32,
            ScrollGranularity::Page => (page as f32 * multiplier).round() as i32,
            ScrollGranularity::Document => {
                if direction.is_vertical() {
                    scroll_box.max.height
                } else {
                    scroll_box.max.width
                }
            }
        };
        let step = if direction.is_backward() { -step } else { step };
        let old = scroll_box.offset;
        let next = if direction.is_vertical() {
            IntSize::new(old.width, (old.height + step).clamp(0, scroll_box.max.height))
        } else {
            IntSize::new((old.width + step).clamp(0, scroll_box.max.width), old.height)
        };
        scroll_box.offset = next;
        next != old
    }

    fn autoscroll(&self, node: NodeId, point: IntPoint) {
        self.record(DocCall::Autoscroll { node, point });
    }

    fn pan_scroll(&self, node: NodeId, delta: IntSize) {
        self.record(DocCall::PanScroll { node, delta });
    }

    fn stop_autoscroll(&self, node: NodeId) {
        self.record(DocCall::StopAutoscroll(node));
    }

    fn scrollbar_mouse_down(&self, scrollbar: ScrollbarId, _point: IntPoint) -> bool {
        self.record(DocCall::ScrollbarDown(scrollbar));
        self.scrollbar_takes_press.get()
    }

    fn scrollbar_mouse_up(&self, scrollbar: ScrollbarId) -> bool {
        self.record(DocCall::ScrollbarUp(scrollbar));
        true
    }

    fn scrollbar_mouse_exited(&self, scrollbar: ScrollbarId) {
        self.record(DocCall::ScrollbarExited(scrollbar));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_text(text: &str) -> (Rc<TestDocument>, NodeId, NodeId) {
        let doc = TestDocument::new(IntSize::new(800, 600));
        let p = doc.append_element(TestDocument::BODY, "p", Some(IntRect::new(0, 0, 400, 16)));
        let t = doc.append_text(p, text, IntPoint::zero());
        (doc, p, t)
    }

    #[test]
    fn positions_order_in_document_order() {
        let (doc, p, t) = doc_with_text("hello");
        let before = doc.position_before(p);
        let inside = Position::new(t, 2);
        let after = doc.position_after(p);
        assert_eq!(doc.compare_positions(before, inside), Ordering::Less);
        assert_eq!(doc.compare_positions(inside, after), Ordering::Less);
        assert!(doc.range_contains_node(&doc.document_range(), p));
    }

    #[test]
    fn hit_test_prefers_deepest_box() {
        let (doc, p, t) = doc_with_text("hello");
        let hit = doc.hit_test(HitTestRequest::READ_ONLY, IntPoint::new(10, 4));
        assert_eq!(hit.inner_node, Some(t));
        assert_eq!(hit.local_point, IntPoint::new(10, 4));
        let below = doc.hit_test(HitTestRequest::READ_ONLY, IntPoint::new(10, 100));
        assert_eq!(below.inner_node, Some(TestDocument::BODY));
        assert_ne!(below.inner_node, Some(p));
    }

    #[test]
    fn word_expansion_stops_at_spaces() {
        let (doc, _, t) = doc_with_text("one two three");
        let caret = Range::collapsed(Position::new(t, 5));
        let word = doc.expand_range(caret, TextGranularity::Word);
        assert_eq!(word.start.offset, 4);
        assert_eq!(word.end.offset, 7);
    }

    #[test]
    fn find_respects_direction_and_bounds() {
        let (doc, _, t) = doc_with_text("abc ABC abc");
        let all = doc.document_range();
        let first = doc.find_plain_text(&all, "abc", true, false).expect("match");
        assert_eq!(first.start, Position::new(t, 0));
        let last = doc.find_plain_text(&all, "abc", false, false).expect("match");
        assert_eq!(last.start, Position::new(t, 8));
        let sensitive = Range::new(Position::new(t, 1), all.end);
        let found = doc.find_plain_text(&sensitive, "ABC", true, true).expect("match");
        assert_eq!(found.start, Position::new(t, 4));
    }

    #[test]
    fn listeners_bubble_and_respect_cancelable() {
        let (doc, p, t) = doc_with_text("x");
        doc.prevent_default(EventType::MouseDown, TestDocument::BODY);
        let result = doc.dispatch_event(&DomEvent::new(EventType::MouseDown, t));
        assert!(result.default_prevented);
        let result = doc.dispatch_event(&DomEvent::new(EventType::MouseDown, p).with_cancelable(false));
        assert!(!result.default_prevented);
        assert_eq!(doc.count_of(EventType::MouseDown), 2);
    }

    #[test]
    fn scroll_walks_to_nearest_box_and_clamps() {
        let (doc, p, t) = doc_with_text("x");
        doc.set_scroll_box(p, IntSize::new(0, 50));
        assert!(doc.scroll(t, ScrollDirection::Down, ScrollGranularity::Line, 1.0));
        assert_eq!(doc.scroll_offset(p), Some(IntSize::new(0, 40)));
        assert!(doc.scroll(t, ScrollDirection::Down, ScrollGranularity::Line, 1.0));
        assert_eq!(doc.scroll_offset(p), Some(IntSize::new(0, 50)));
        assert!(!doc.scroll(t, ScrollDirection::Down, ScrollGranularity::Line, 1.0));
    }

    #[test]
    fn jsonl_lines_parse() {
        let (doc, _, t) = doc_with_text("x");
        doc.dispatch_event(&DomEvent::new(EventType::Click, t));
        for line in doc.to_jsonl() {
            let value: serde_json::Value = serde_json::from_str(&line).expect("valid json");
            assert_eq!(value["event"], "click");
        }
    }
}
