#![forbid(unsafe_code)]

//! The page: owner of a frame tree and its page-wide services.
//!
//! A [`Page`] owns the [`FrameTree`] arena and the `FrameId -> Rc<Frame>`
//! map, the [`Chrome`], the editor client, and the [`FocusController`].
//! Frames refer back to it weakly.
//!
//! # Design
//!
//! Frame creation and teardown go through the page so the arena and the map
//! never disagree: [`Page::create_child_frame`] names, links, and registers a
//! frame in one step and [`Page::detach_frame`] tears a whole subtree down
//! bottom-up before unlinking it.
//!
//! # Failure Modes
//!
//! Structural misuse (unknown parent, detaching an unknown frame) returns a
//! [`FrameTreeError`]. Everything else degrades to `None` / no-op when the
//! frame in question is already gone.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::{debug, debug_span, trace};
use webframe_core::config::EngineConfig;
use webframe_core::event_loop::EventLoop;
use webframe_core::geometry::IntRect;

use crate::chrome::{Chrome, ChromeClient};
use crate::dom::{Document, NodeId};
use crate::editor::EditorClient;
use crate::focus::FocusController;
use crate::frame::{FindOptions, Frame};
use crate::frame_tree::{FrameId, FrameTree, FrameTreeError};
use crate::frame_view::FrameView;

/// One browsing page.
pub struct Page {
    weak_self: Weak<Page>,
    event_loop: Rc<EventLoop>,
    config: Rc<EngineConfig>,
    tree: RefCell<FrameTree>,
    frames: RefCell<HashMap<FrameId, Rc<Frame>>>,
    main_frame: Cell<Option<FrameId>>,
    chrome: Chrome,
    editor_client: Rc<dyn EditorClient>,
    focus_controller: FocusController,
    group: RefCell<Option<Rc<PageGroup>>>,
    defers_loading: Cell<bool>,
    tab_key_cycles_through_elements: Cell<bool>,
    pending_unload_event_count: Cell<u32>,
    pending_before_unload_event_count: Cell<u32>,
    subframe_count: Cell<u32>,
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("main_frame", &self.main_frame.get())
            .field("frames", &self.frames.borrow().len())
            .field("defers_loading", &self.defers_loading.get())
            .finish_non_exhaustive()
    }
}

impl Page {
    #[must_use]
    pub fn new(
        config: EngineConfig,
        event_loop: Rc<EventLoop>,
        chrome_client: Rc<dyn ChromeClient>,
        editor_client: Rc<dyn EditorClient>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<Page>| Self {
            weak_self: weak.clone(),
            event_loop,
            config: Rc::new(config),
            tree: RefCell::new(FrameTree::new()),
            frames: RefCell::new(HashMap::new()),
            main_frame: Cell::new(None),
            chrome: Chrome::new(chrome_client, weak.clone()),
            editor_client,
            focus_controller: FocusController::new(weak.clone()),
            group: RefCell::new(None),
            defers_loading: Cell::new(false),
            tab_key_cycles_through_elements: Cell::new(true),
            pending_unload_event_count: Cell::new(0),
            pending_before_unload_event_count: Cell::new(0),
            subframe_count: Cell::new(0),
        })
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
    pub fn chrome(&self) -> &Chrome {
        &self.chrome
    }

    #[must_use]
    pub fn editor_client(&self) -> &Rc<dyn EditorClient> {
        &self.editor_client
    }

    #[must_use]
    pub fn focus_controller(&self) -> &FocusController {
        &self.focus_controller
    }

    // -----------------------------------------------------------------------
    // Frames
    // -----------------------------------------------------------------------

    /// Create the main frame with a view of `frame_rect`. Any previous main
    /// frame is detached first.
    pub fn create_main_frame(&self, document: Rc<dyn Document>, frame_rect: IntRect) -> Rc<Frame> {
        if let Some(old) = self.main_frame.get() {
            let _ = self.detach_frame(old);
        }
        let id = self.tree.borrow_mut().create_frame(String::new());
        let frame = Frame::new(self.weak_self.clone(), id, None, &self.event_loop, &self.config, &self.editor_client);
        self.frames.borrow_mut().insert(id, Rc::clone(&frame));
        self.main_frame.set(Some(id));
        frame.set_document(Some(document));
        frame.set_view(Some(FrameView::new(&frame, frame_rect)));
        debug!(frame = %id, "main frame created");
        frame
    }

    /// Create a subframe of `parent` hosted by `owner` in the parent's
    /// document. The name is disambiguated among the parent's children and
    /// the zoom factor is inherited from the parent.
    pub fn create_child_frame(
        &self,
        parent: FrameId,
        owner: NodeId,
        name: &str,
        document: Rc<dyn Document>,
        frame_rect: IntRect,
    ) -> Result<Rc<Frame>, FrameTreeError> {
        let parent_frame = self.frame(parent).ok_or(FrameTreeError::UnknownFrame(parent))?;
        let id = {
            let mut tree = self.tree.borrow_mut();
            let unique = tree.unique_child_name(parent, name);
            let id = tree.create_frame(unique);
            if let Err(err) = tree.append_child(parent, id) {
                let _ = tree.remove_subtree(id);
                return Err(err);
            }
            id
        };
        let frame = Frame::new(
            self.weak_self.clone(),
            id,
            Some(owner),
            &self.event_loop,
            &self.config,
            &self.editor_client,
        );
        frame.inherit_zoom(&parent_frame);
        self.frames.borrow_mut().insert(id, Rc::clone(&frame));
        self.subframe_count.set(self.subframe_count.get() + 1);
        frame.set_document(Some(document));
        frame.set_view(Some(FrameView::new(&frame, frame_rect)));
        trace!(frame = %id, %parent, ?owner, "child frame created");
        Ok(frame)
    }

    /// Tear down `id` and every frame below it, deepest first, then unlink
    /// the subtree from the arena.
    pub fn detach_frame(&self, id: FrameId) -> Result<(), FrameTreeError> {
        let ids = self.tree.borrow().descendants_inclusive(id);
        if ids.is_empty() {
            return Err(FrameTreeError::UnknownFrame(id));
        }
        for fid in ids.iter().rev() {
            if self.focus_controller.focused_frame().is_some_and(|f| f.id() == *fid) {
                self.focus_controller.set_focused_frame(None);
            }
            let frame = self.frames.borrow_mut().remove(fid);
            if let Some(frame) = frame {
                frame.detach_from_page();
            }
        }
        self.tree.borrow_mut().remove_subtree(id)?;
        if self.main_frame.get() == Some(id) {
            self.main_frame.set(None);
        }
        debug!(frame = %id, count = ids.len(), "frame subtree detached");
        Ok(())
    }

    #[must_use]
    pub fn frame(&self, id: FrameId) -> Option<Rc<Frame>> {
        self.frames.borrow().get(&id).cloned()
    }

    #[must_use]
    pub fn main_frame(&self) -> Option<Rc<Frame>> {
        self.frame(self.main_frame.get()?)
    }

    /// Every frame in pre-order from the main frame.
    #[must_use]
    pub fn frames(&self) -> Vec<Rc<Frame>> {
        let Some(main) = self.main_frame.get() else {
            return Vec::new();
        };
        let ids = self.tree.borrow().descendants_inclusive(main);
        let frames = self.frames.borrow();
        ids.iter().filter_map(|id| frames.get(id).cloned()).collect()
    }

    /// Read the frame tree. The closure must not call back into the page.
    pub fn with_tree<R>(&self, f: impl FnOnce(&FrameTree) -> R) -> R {
        f(&self.tree.borrow())
    }

    pub(crate) fn rename_frame(&self, id: FrameId, requested: &str) -> Result<String, FrameTreeError> {
        self.tree.borrow_mut().set_name(id, requested)
    }

    /// Resolve a target name from `from`: special names and this page's
    /// tree first, then the main frames' trees of other pages in the group.
    #[must_use]
    pub fn find_frame(&self, from: FrameId, name: &str) -> Option<Rc<Frame>> {
        let local = self.tree.borrow().find(from, name);
        if let Some(id) = local {
            return self.frame(id);
        }
        if name.starts_with('_') {
            return None;
        }
        let group = self.group.borrow().clone()?;
        for page in group.pages() {
            if std::ptr::eq(Rc::as_ptr(&page), self) {
                continue;
            }
            let Some(main) = page.main_frame.get() else {
                continue;
            };
            let found = page.with_tree(|tree| {
                tree.descendants_inclusive(main)
                    .into_iter()
                    .find(|id| tree.name(*id) == Some(name))
            });
            if let Some(id) = found {
                return page.frame(id);
            }
        }
        None
    }

    /// Number of live subframes. The main frame is not counted.
    #[must_use]
    pub fn subframe_count(&self) -> u32 {
        self.subframe_count.get()
    }

    pub(crate) fn decrement_subframe_count(&self) {
        self.subframe_count.set(self.subframe_count.get().saturating_sub(1));
    }

    // -----------------------------------------------------------------------
    // Find across frames
    // -----------------------------------------------------------------------

    fn step_frame(&self, id: FrameId, forward: bool, wrap: bool) -> Option<FrameId> {
        self.with_tree(|tree| {
            if forward {
                tree.traverse_next_with_wrap(id, wrap)
            } else {
                tree.traverse_previous_with_wrap(id, wrap)
            }
        })
    }

    /// Find `target` starting in the focused frame and moving through the
    /// frame tree in `options.forward` order. The frame holding the match
    /// gets focus and the start frame loses its selection. With
    /// `options.wrap` the walk cycles past the last frame and finally
    /// searches the start frame again from its top.
    pub fn find_string(&self, target: &str, options: FindOptions) -> bool {
        let _span = debug_span!("page.find_string", forward = options.forward, wrap = options.wrap).entered();
        if target.is_empty() {
            return false;
        }
        let Some(start) = self.focus_controller.focused_or_main_frame() else {
            return false;
        };
        let per_frame = FindOptions {
            wrap: false,
            start_in_selection: true,
            ..options
        };
        let mut current = Some(start.id());
        while let Some(id) = current {
            if let Some(frame) = self.frame(id)
                && frame.find_string(target, per_frame)
            {
                if id != start.id() {
                    start.clear_selection();
                }
                debug!(frame = %id, "match found");
                self.focus_controller.set_focused_frame(Some(&frame));
                return true;
            }
            current = self.step_frame(id, options.forward, options.wrap);
            if current == Some(start.id()) {
                break;
            }
        }

        if options.wrap && start.selection().is_range() {
            let found = start.find_string(
                target,
                FindOptions {
                    wrap: true,
                    start_in_selection: true,
                    ..options
                },
            );
            self.focus_controller.set_focused_frame(Some(&start));
            return found;
        }
        false
    }

    /// Mark every visible occurrence of `target` in every frame, in tree
    /// order from the main frame. Stops once `limit` markers exist unless
    /// `limit` is zero. Returns the total.
    pub fn mark_all_matches_for_text(&self, target: &str, case_sensitive: bool, limit: u32) -> u32 {
        let mut matches = 0u32;
        let mut current = self.main_frame.get();
        while let Some(id) = current {
            if limit > 0 && matches >= limit {
                break;
            }
            if let Some(frame) = self.frame(id) {
                let remaining = if limit == 0 { 0 } else { limit - matches };
                matches += frame.mark_all_matches_for_text(target, case_sensitive, remaining);
            }
            current = self.step_frame(id, true, false);
        }
        debug!(target, matches, "text matches marked across frames");
        matches
    }

    pub fn unmark_all_text_matches(&self) {
        for frame in self.frames() {
            frame.unmark_all_text_matches();
        }
    }

    // -----------------------------------------------------------------------
    // Loading and groups
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn defers_loading(&self) -> bool {
        self.defers_loading.get()
    }

    pub fn set_defers_loading(&self, defers: bool) {
        if self.defers_loading.replace(defers) != defers {
            trace!(defers, "page load deferral changed");
        }
    }

    #[must_use]
    pub fn group(&self) -> Option<Rc<PageGroup>> {
        self.group.borrow().clone()
    }

    /// Join `group`, leaving any previous one.
    pub fn set_group(&self, group: Option<Rc<PageGroup>>) {
        if let Some(old) = self.group.borrow_mut().take() {
            old.remove_page(self);
        }
        if let Some(group) = &group
            && let Some(me) = self.weak_self.upgrade()
        {
            group.add_page(&me);
        }
        *self.group.borrow_mut() = group;
    }

    #[must_use]
    pub fn tab_key_cycles_through_elements(&self) -> bool {
        self.tab_key_cycles_through_elements.get()
    }

    pub fn set_tab_key_cycles_through_elements(&self, cycles: bool) {
        self.tab_key_cycles_through_elements.set(cycles);
    }

    // -----------------------------------------------------------------------
    // Unload listeners
    // -----------------------------------------------------------------------

    /// Adjust the number of frames with `unload` listeners. The chrome is
    /// told to disable sudden termination on the first and re-enable it when
    /// the count drops back to zero.
    pub fn change_pending_unload_event_count(&self, delta: i32) {
        Self::change_count(&self.pending_unload_event_count, delta, &self.chrome);
    }

    pub fn change_pending_before_unload_event_count(&self, delta: i32) {
        Self::change_count(&self.pending_before_unload_event_count, delta, &self.chrome);
    }

    fn change_count(count: &Cell<u32>, delta: i32, chrome: &Chrome) {
        if delta == 0 {
            return;
        }
        let current = count.get();
        let next = current.saturating_add_signed(delta);
        debug_assert!(i64::from(current) + i64::from(delta) >= 0);
        if current == 0 {
            chrome.disable_sudden_termination();
        } else if next == 0 {
            chrome.enable_sudden_termination();
        }
        count.set(next);
    }

    #[must_use]
    pub fn pending_unload_event_count(&self) -> u32 {
        self.pending_unload_event_count.get()
    }

    #[must_use]
    pub fn pending_before_unload_event_count(&self) -> u32 {
        self.pending_before_unload_event_count.get()
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        if let Some(group) = self.group.get_mut().take() {
            group.remove_page(self);
        }
        let frames: Vec<Rc<Frame>> = self.frames.get_mut().drain().map(|(_, f)| f).collect();
        for frame in frames {
            frame.page_destroyed();
        }
    }
}

// ---------------------------------------------------------------------------
// Page groups
// ---------------------------------------------------------------------------

/// A set of pages that share load deferral and frame-name lookup.
#[derive(Debug)]
pub struct PageGroup {
    name: String,
    pages: RefCell<Vec<Weak<Page>>>,
}

impl PageGroup {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            pages: RefCell::new(Vec::new()),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn add_page(&self, page: &Rc<Page>) {
        let mut pages = self.pages.borrow_mut();
        pages.retain(|p| p.strong_count() > 0);
        if !pages.iter().any(|p| std::ptr::eq(p.as_ptr(), Rc::as_ptr(page))) {
            pages.push(Rc::downgrade(page));
        }
    }

    fn remove_page(&self, page: &Page) {
        self.pages
            .borrow_mut()
            .retain(|p| p.strong_count() > 0 && !std::ptr::eq(p.as_ptr(), page));
    }

    /// Live pages, in join order.
    #[must_use]
    pub fn pages(&self) -> Vec<Rc<Page>> {
        self.pages.borrow().iter().filter_map(Weak::upgrade).collect()
    }
}

/// Defers loading in a page group for its lifetime.
///
/// Pages that were already deferring are left alone and are not touched on
/// drop. Active DOM objects (timers, media) of every deferred frame are
/// suspended and resumed with it.
#[derive(Debug)]
pub struct PageGroupLoadDeferrer {
    deferred: Vec<Weak<Page>>,
}

impl PageGroupLoadDeferrer {
    /// Defer every page of `page`'s group; `page` itself only if
    /// `defer_self`.
    #[must_use = "loading resumes when the deferrer is dropped"]
    pub fn new(page: &Rc<Page>, defer_self: bool) -> Self {
        let pages = match page.group() {
            Some(group) => group.pages(),
            None => vec![Rc::clone(page)],
        };
        let mut deferred = Vec::new();
        for other in pages {
            if !defer_self && Rc::ptr_eq(&other, page) {
                continue;
            }
            if other.defers_loading() {
                continue;
            }
            other.set_defers_loading(true);
            for frame in other.frames() {
                if let Some(doc) = frame.document() {
                    doc.suspend_active_dom_objects();
                }
            }
            deferred.push(Rc::downgrade(&other));
        }
        Self { deferred }
    }

    #[must_use]
    pub fn deferred_count(&self) -> usize {
        self.deferred.len()
    }
}

impl Drop for PageGroupLoadDeferrer {
    fn drop(&mut self) {
        for page in self.deferred.drain(..).filter_map(|p| p.upgrade()) {
            page.set_defers_loading(false);
            for frame in page.frames() {
                if let Some(doc) = frame.document() {
                    doc.resume_active_dom_objects();
                }
            }
        }
    }
}
