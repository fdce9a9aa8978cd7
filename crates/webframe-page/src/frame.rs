#![forbid(unsafe_code)]

//! One browsing context.
//!
//! A [`Frame`] ties together a document, an optional [`FrameView`], the
//! frame's [`EventHandler`], its selection, editor front end, script
//! timers, and zoom state. It is the coordination surface the event handler
//! and the view call back into: selection changes with their focus and
//! reveal side effects, incremental find, text-match marking, and the
//! keep-alive that defers destruction to the next event-loop turn.
//!
//! # Invariants
//!
//! 1. Replacing the view always clears the event handler's transient state.
//! 2. Removing the view detaches the document first and cancels any pending
//!    relayout of the old view.
//! 3. Once [`Frame::page_destroyed`] ran, `page()` is `None` and no script
//!    timer of this frame fires again.
//!
//! # Failure Modes
//!
//! Every operation that needs the document, the view, or the page returns
//! `false` / `None` / `0` when that collaborator is gone.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{debug, debug_span, trace, warn};
use webframe_core::config::EngineConfig;
use webframe_core::event_loop::{EventLoop, KeepAliveId};
use webframe_core::geometry::IntRect;

use crate::dom::{Document, EventType, MarkerKind, NodeId, Position, Range};
use crate::editor::{Editor, EditorClient};
use crate::event_handler::EventHandler;
use crate::frame_tree::FrameId;
use crate::frame_view::FrameView;
use crate::page::Page;
use crate::script_timer::{ScriptTimerId, ScriptTimers};
use crate::selection::{SelectionController, SelectionState, VisibleSelection};

/// How [`Frame::reveal_selection`] positions the revealed rect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollAlignment {
    /// Scroll the minimum amount, only if the rect is not fully visible.
    #[default]
    ToEdgeIfNeeded,
    /// Center the rect, only if it is not fully visible.
    CenterIfNeeded,
    /// Always put the rect at the top.
    TopAlways,
}

/// Options for [`Frame::find_string`] and [`Page::find_string`](crate::Page::find_string).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindOptions {
    pub forward: bool,
    pub case_sensitive: bool,
    pub wrap: bool,
    /// Start at the selection's near edge, so the selected text itself can
    /// match when it was not produced by a previous find.
    pub start_in_selection: bool,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            forward: true,
            case_sensitive: false,
            wrap: true,
            start_in_selection: false,
        }
    }
}

/// `<meta name=viewport>` values as parsed by the document.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportArguments {
    pub initial_scale: Option<f32>,
    pub minimum_scale: Option<f32>,
    pub maximum_scale: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub user_scalable: Option<bool>,
}

/// A frame. Always handled through `Rc`; the page holds the owning
/// reference.
pub struct Frame {
    id: FrameId,
    weak_self: Weak<Frame>,
    page: RefCell<Weak<Page>>,
    event_loop: Rc<EventLoop>,
    config: Rc<EngineConfig>,
    owner_element: Cell<Option<NodeId>>,
    document: RefCell<Option<Rc<dyn Document>>>,
    view: RefCell<Option<Rc<FrameView>>>,
    event_handler: EventHandler,
    selection: SelectionController,
    editor: Editor,
    script_timers: Rc<ScriptTimers>,
    zoom_factor: Cell<f32>,
    zoom_text_only: Cell<bool>,
    viewport_arguments: Cell<ViewportArguments>,
    is_disconnected: Cell<bool>,
    mark_text_matches: Cell<bool>,
    keep_alive: Cell<Option<KeepAliveId>>,
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("owner_element", &self.owner_element.get())
            .field("has_view", &self.view.borrow().is_some())
            .field("zoom_factor", &self.zoom_factor.get())
            .finish_non_exhaustive()
    }
}

impl Frame {
    pub(crate) fn new(
        page: Weak<Page>,
        id: FrameId,
        owner_element: Option<NodeId>,
        event_loop: &Rc<EventLoop>,
        config: &Rc<EngineConfig>,
        editor_client: &Rc<dyn EditorClient>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<Frame>| Self {
            id,
            weak_self: weak.clone(),
            page: RefCell::new(page),
            event_loop: Rc::clone(event_loop),
            config: Rc::clone(config),
            owner_element: Cell::new(owner_element),
            document: RefCell::new(None),
            view: RefCell::new(None),
            event_handler: EventHandler::new(weak.clone(), event_loop, config),
            selection: SelectionController::new(),
            editor: Editor::new(weak.clone(), Rc::clone(editor_client)),
            script_timers: ScriptTimers::new(event_loop, config.timers.clone()),
            zoom_factor: Cell::new(100.0),
            zoom_text_only: Cell::new(false),
            viewport_arguments: Cell::new(ViewportArguments::default()),
            is_disconnected: Cell::new(false),
            mark_text_matches: Cell::new(false),
            keep_alive: Cell::new(None),
        })
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> FrameId {
        self.id
    }

    #[must_use]
    pub fn page(&self) -> Option<Rc<Page>> {
        self.page.borrow().upgrade()
    }

    #[must_use]
    pub fn event_loop(&self) -> &Rc<EventLoop> {
        &self.event_loop
    }

    #[must_use]
    pub fn config(&self) -> &Rc<EngineConfig> {
        &self.config
    }

    #[must_use]
    pub fn event_handler(&self) -> &EventHandler {
        &self.event_handler
    }

    #[must_use]
    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    #[must_use]
    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    // -----------------------------------------------------------------------
    // Tree position
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn name(&self) -> String {
        self.page()
            .and_then(|page| page.with_tree(|tree| tree.name(self.id).map(str::to_owned)))
            .unwrap_or_default()
    }

    /// Rename, disambiguating against siblings. Returns the name used.
    pub fn set_name(&self, requested: &str) -> Option<String> {
        self.page()?.rename_frame(self.id, requested).ok()
    }

    #[must_use]
    pub fn parent(&self) -> Option<Rc<Frame>> {
        let page = self.page()?;
        let parent = page.with_tree(|tree| tree.parent(self.id))?;
        page.frame(parent)
    }

    #[must_use]
    pub fn children(&self) -> Vec<Rc<Frame>> {
        let Some(page) = self.page() else {
            return Vec::new();
        };
        let ids = page.with_tree(|tree| tree.children(self.id).to_vec());
        ids.into_iter().filter_map(|id| page.frame(id)).collect()
    }

    /// The subframe whose owner element in this frame's document is `node`.
    #[must_use]
    pub fn child_frame_for_owner(&self, node: NodeId) -> Option<Rc<Frame>> {
        self.children()
            .into_iter()
            .find(|child| child.owner_element() == Some(node))
    }

    #[must_use]
    pub fn is_main_frame(&self) -> bool {
        self.page()
            .and_then(|page| page.main_frame())
            .is_some_and(|main| main.id == self.id)
    }

    #[must_use]
    pub fn owner_element(&self) -> Option<NodeId> {
        self.owner_element.get()
    }

    /// Cut the link to the owner element, as when it leaves its document.
    pub fn disconnect_owner_element(&self) {
        if self.owner_element.take().is_some()
            && let Some(page) = self.page()
        {
            page.decrement_subframe_count();
        }
    }

    // -----------------------------------------------------------------------
    // Document and view
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn document(&self) -> Option<Rc<dyn Document>> {
        self.document.borrow().clone()
    }

    /// Replace the document. The old one is detached and the selection,
    /// which pointed into it, is dropped.
    pub fn set_document(&self, document: Option<Rc<dyn Document>>) {
        let old = self.document.replace(document);
        if let Some(old) = old {
            old.detach();
        }
        self.selection.replace(VisibleSelection::none());
    }

    #[must_use]
    pub fn view(&self) -> Option<Rc<FrameView>> {
        self.view.borrow().clone()
    }

    /// Install or remove the view.
    pub fn set_view(&self, view: Option<Rc<FrameView>>) {
        if view.is_none()
            && let Some(doc) = self.document()
        {
            doc.detach();
            if let Some(old) = self.view() {
                old.unschedule_relayout();
            }
        }
        self.event_handler.clear();
        let old = self.view.replace(view);
        drop(old);
    }

    /// Run layout now, whether or not one is scheduled.
    pub fn force_layout(&self, allow_subtree: bool) {
        if let Some(view) = self.view() {
            view.layout(allow_subtree);
        }
    }

    pub fn send_resize_event(&self) {
        if let Some(doc) = self.document() {
            doc.dispatch_window_event(EventType::Resize);
        }
    }

    pub fn send_scroll_event(&self) {
        if let Some(doc) = self.document() {
            doc.dispatch_window_event(EventType::Scroll);
        }
    }

    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.is_disconnected.get()
    }

    /// Mark the frame as rendered outside its owner's normal flow; find only
    /// counts matches inside the visible part of such frames.
    pub fn set_is_disconnected(&self, disconnected: bool) {
        self.is_disconnected.set(disconnected);
    }

    #[must_use]
    pub fn viewport_arguments(&self) -> ViewportArguments {
        self.viewport_arguments.get()
    }

    pub fn set_viewport_arguments(&self, arguments: ViewportArguments) {
        self.viewport_arguments.set(arguments);
    }

    #[must_use]
    pub fn is_content_editable(&self) -> bool {
        if self.editor.client_is_editable() {
            return true;
        }
        self.document().is_some_and(|doc| doc.in_design_mode())
    }

    // -----------------------------------------------------------------------
    // Lifetime
    // -----------------------------------------------------------------------

    /// Keep this frame alive until the start of the next event-loop turn.
    ///
    /// Script timers call this before running their action, and script
    /// bindings call it when they hand the frame to a callback that may
    /// detach it. Calling it again during the same turn is a no-op.
    pub fn keep_alive(&self) {
        if let Some(id) = self.keep_alive.get()
            && self.event_loop.is_kept_alive(id)
        {
            return;
        }
        let Some(me) = self.weak_self.upgrade() else {
            return;
        };
        let object: Rc<dyn Any> = me;
        self.keep_alive.set(Some(self.event_loop.keep_alive(object)));
    }

    #[must_use]
    pub fn is_kept_alive(&self) -> bool {
        self.keep_alive
            .get()
            .is_some_and(|id| self.event_loop.is_kept_alive(id))
    }

    /// The page is going away or this frame was removed from it.
    pub fn page_destroyed(&self) {
        if let Some(page) = self.page()
            && page.focus_controller().focused_frame().is_some_and(|f| f.id == self.id)
        {
            page.focus_controller().set_focused_frame(None);
        }
        self.script_timers.clear();
        self.event_handler.stop_autoscroll_timer(true);
        *self.page.borrow_mut() = Weak::new();
        trace!(frame = %self.id, "page destroyed");
    }

    pub(crate) fn detach_from_page(&self) {
        self.event_handler.stop_autoscroll_timer(true);
        self.set_view(None);
        self.disconnect_owner_element();
        self.page_destroyed();
    }

    // -----------------------------------------------------------------------
    // Script timers
    // -----------------------------------------------------------------------

    pub fn set_timeout(&self, delay: Duration, action: impl Fn() + 'static) -> Option<ScriptTimerId> {
        self.script_timers.install(self.script_action(action), delay, true)
    }

    pub fn set_interval(&self, interval: Duration, action: impl Fn() + 'static) -> Option<ScriptTimerId> {
        self.script_timers.install(self.script_action(action), interval, false)
    }

    /// Wrap a timer action so the frame outlives a callback that detaches it.
    fn script_action(&self, action: impl Fn() + 'static) -> Rc<dyn Fn()> {
        let frame = self.weak_self.clone();
        Rc::new(move || {
            if let Some(frame) = frame.upgrade() {
                frame.keep_alive();
            }
            action();
        })
    }

    pub fn clear_timer(&self, id: ScriptTimerId) -> bool {
        self.script_timers.remove(id)
    }

    #[must_use]
    pub fn script_timers(&self) -> &ScriptTimers {
        &self.script_timers
    }

    // -----------------------------------------------------------------------
    // Zoom
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn zoom_factor(&self) -> f32 {
        self.zoom_factor.get()
    }

    #[must_use]
    pub fn is_zoom_text_only(&self) -> bool {
        self.zoom_text_only.get()
    }

    pub(crate) fn inherit_zoom(&self, parent: &Frame) {
        self.zoom_factor.set(parent.zoom_factor.get());
        self.zoom_text_only.set(parent.zoom_text_only.get());
    }

    /// Set the zoom percentage for this frame and its descendants, then
    /// relayout if the view already did its first layout.
    pub fn set_zoom_factor(&self, percent: f32, text_only: bool) {
        if self.zoom_factor.get() == percent && self.zoom_text_only.get() == text_only {
            return;
        }
        self.zoom_factor.set(percent);
        self.zoom_text_only.set(text_only);
        debug!(frame = %self.id, percent, text_only, "zoom changed");

        let Some(doc) = self.document() else {
            return;
        };
        doc.recalc_style();
        for child in self.children() {
            child.set_zoom_factor(percent, text_only);
        }
        if let Some(view) = self.view()
            && view.did_first_layout()
            && view.needs_layout()
        {
            view.layout(true);
        }
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Ask the editor client whether the selection may become `new`.
    #[must_use]
    pub fn should_change_selection(&self, new: &VisibleSelection) -> bool {
        let old = self.selection.selection();
        self.editor
            .should_change_selection(old.to_range(), new.to_range(), false)
    }

    /// Replace the selection and run the change side effects: focus
    /// follows a selection into an editable region, the client is told, and
    /// a user-made selection is scrolled into view.
    pub fn set_selection(&self, selection: VisibleSelection, user_triggered: bool) {
        if !self.selection.replace(selection) {
            return;
        }
        if !selection.is_none() {
            self.set_focused_node_if_needed();
        }
        self.editor.client().respond_to_changed_selection(self.id);
        if user_triggered {
            self.reveal_selection(ScrollAlignment::ToEdgeIfNeeded, true);
        }
    }

    pub fn clear_selection(&self) {
        self.set_selection(VisibleSelection::none(), false);
    }

    /// Focus the nearest mouse-focusable render ancestor of the editable
    /// root containing the selection.
    pub fn set_focused_node_if_needed(&self) {
        let Some(doc) = self.document() else {
            return;
        };
        if self.selection.is_none() || !self.selection.is_focused_and_active() {
            return;
        }
        let Some(root) = self.selection.root_editable_element(doc.as_ref()) else {
            return;
        };
        let candidate = {
            let Some(render) = doc.renderer() else {
                return;
            };
            let mut current = render.has_renderer(root).then_some(root);
            let mut found = None;
            while let Some(node) = current {
                if doc.is_mouse_focusable(node) && self.child_frame_for_owner(node).is_none() {
                    found = Some(node);
                    break;
                }
                current = render.parent_renderer(node);
            }
            found
        };
        match (candidate, self.page()) {
            (Some(node), Some(page)) => {
                if let Some(me) = self.weak_self.upgrade() {
                    page.focus_controller().set_focused_node(Some(node), &me);
                }
            }
            _ => {
                doc.set_focused_node(None);
            }
        }
    }

    /// Scroll so the selection (or, for ranges, its extent when
    /// `reveal_extent`) is visible.
    pub fn reveal_selection(&self, alignment: ScrollAlignment, reveal_extent: bool) {
        let Some(doc) = self.document() else {
            return;
        };
        let selection = self.selection.selection();
        let Some(start) = selection.start() else {
            return;
        };
        let rect = {
            let Some(render) = doc.renderer() else {
                return;
            };
            let rect = match selection.state() {
                SelectionState::None => None,
                SelectionState::Caret => render.caret_bounds(start),
                SelectionState::Range if reveal_extent => {
                    selection.extent().and_then(|p| render.caret_bounds(p))
                }
                SelectionState::Range => selection.to_range().and_then(|r| render.range_bounds(&r)),
            };
            let Some(rect) = rect else {
                return;
            };
            if render.has_renderer(start.node) && render.scroll_rect_to_visible(start.node, rect) {
                return;
            }
            rect
        };
        if let Some(view) = self.view() {
            view.scroll_rect_into_view(rect, alignment);
        }
    }

    // -----------------------------------------------------------------------
    // Find
    // -----------------------------------------------------------------------

    /// Find the next occurrence of `target` and select it.
    ///
    /// The search starts at an edge of the current selection, stays inside
    /// the selection's shadow tree first, skips matches outside the visible
    /// area, and wraps to the whole document when allowed.
    pub fn find_string(&self, target: &str, options: FindOptions) -> bool {
        let _span = debug_span!("frame.find_string", frame = %self.id, forward = options.forward).entered();
        if target.is_empty() {
            return false;
        }
        let Some(doc) = self.document() else {
            return false;
        };
        let selection = self.selection.selection();
        let shadow_root = selection.start_node().and_then(|n| doc.shadow_tree_root(n));

        let bounded = |edge: Option<Position>| -> Range {
            let mut range = doc.document_range();
            if options.forward {
                if let Some(p) = edge {
                    range.start = p;
                }
                if let Some(root) = shadow_root {
                    range.end = doc.position_after(root);
                }
            } else {
                if let Some(p) = edge {
                    range.end = p;
                }
                if let Some(root) = shadow_root {
                    range.start = doc.position_before(root);
                }
            }
            range
        };
        let near_edge = if options.forward == options.start_in_selection {
            selection.start()
        } else {
            selection.end()
        };
        let far_edge = if options.forward {
            selection.end()
        } else {
            selection.start()
        };

        let search = |range: &Range| doc.find_plain_text(range, target, options.forward, options.case_sensitive);

        let mut result = search(&bounded(near_edge));
        if options.start_in_selection
            && result.is_some()
            && result == selection.to_range()
        {
            result = search(&bounded(far_edge));
        }

        if result.is_none()
            && let Some(root) = shadow_root
        {
            let host = doc.shadow_ancestor_node(root);
            let mut range = doc.document_range();
            if options.forward {
                range.start = doc.position_after(host);
            } else {
                range.end = doc.position_before(host);
            }
            result = search(&range);
        }

        if let Some(found) = result
            && !self.editor.inside_visible_area(&found)
        {
            result = self.next_visible_range(doc.as_ref(), found, target, options);
            if result.is_none() {
                return false;
            }
        }

        if result.is_none() && options.wrap {
            result = search(&doc.document_range());
        }
        let Some(found) = result else {
            trace!(target, "no match");
            return false;
        };
        self.set_selection(VisibleSelection::from_range(found), false);
        self.reveal_selection(ScrollAlignment::CenterIfNeeded, false);
        true
    }

    /// Keep searching past `from` until a match inside the visible area.
    fn next_visible_range(
        &self,
        doc: &dyn Document,
        from: Range,
        target: &str,
        options: FindOptions,
    ) -> Option<Range> {
        let mut last = from;
        let mut wrapped = false;
        loop {
            let mut range = doc.document_range();
            if options.forward {
                range.start = last.end;
            } else {
                range.end = last.start;
            }
            let found = match doc.find_plain_text(&range, target, options.forward, options.case_sensitive) {
                Some(found) => found,
                None if options.wrap && !wrapped => {
                    wrapped = true;
                    let whole = doc.document_range();
                    doc.find_plain_text(&whole, target, options.forward, options.case_sensitive)?
                }
                None => return None,
            };
            if found == from {
                return None;
            }
            if self.editor.inside_visible_area(&found) {
                return Some(found);
            }
            if found == last {
                return None;
            }
            last = found;
        }
    }

    /// Add a text-match marker for every visible occurrence of `target`.
    /// Stops after `limit` matches unless `limit` is zero. Returns the
    /// number of markers added.
    pub fn mark_all_matches_for_text(&self, target: &str, case_sensitive: bool, limit: u32) -> u32 {
        if target.is_empty() {
            return 0;
        }
        let Some(doc) = self.document() else {
            return 0;
        };
        let mut search_range = doc.document_range();
        let mut count = 0u32;
        while let Some(found) = doc.find_plain_text(&search_range, target, true, case_sensitive) {
            if doc.compare_positions(found.end, search_range.start) != Ordering::Greater {
                warn!(target, "match did not advance the search; stopping");
                break;
            }
            if self.editor.inside_visible_area(&found) {
                count += 1;
                doc.add_marker(&found, MarkerKind::TextMatch);
            }
            if limit > 0 && count >= limit {
                break;
            }
            search_range.start = found.end;
        }
        if let Some(view) = self.view()
            && view.needs_layout()
        {
            view.layout(true);
        }
        debug!(target, count, "text matches marked");
        count
    }

    pub fn unmark_all_text_matches(&self) {
        if let Some(doc) = self.document() {
            doc.remove_markers(MarkerKind::TextMatch);
        }
    }

    #[must_use]
    pub fn mark_text_matches_enabled(&self) -> bool {
        self.mark_text_matches.get()
    }

    /// Toggle match highlighting. Turning it off does not remove markers.
    pub fn set_mark_text_matches_enabled(&self, enabled: bool) {
        if self.mark_text_matches.replace(enabled) != enabled
            && let Some(view) = self.view()
        {
            let visible = view.visible_content_rect();
            view.repaint_content_rectangle(visible, false);
        }
    }

    /// Bounds of the current selection in contents coordinates.
    #[must_use]
    pub fn selection_bounds(&self) -> Option<IntRect> {
        let doc = self.document()?;
        let render = doc.renderer()?;
        let selection = self.selection.selection();
        match selection.state() {
            SelectionState::None => None,
            SelectionState::Caret => render.caret_bounds(selection.start()?),
            SelectionState::Range => render.range_bounds(&selection.to_range()?),
        }
    }
}
