#![forbid(unsafe_code)]

//! One-line page setup for tests.

use std::rc::Rc;

use webframe_core::config::EngineConfig;
use webframe_core::event_loop::EventLoop;
use webframe_core::geometry::{IntRect, IntSize};
use webframe_page::dom::NodeId;
use webframe_page::frame::Frame;
use webframe_page::frame_tree::FrameTreeError;
use webframe_page::frame_view::FrameView;
use webframe_page::page::Page;

use crate::clients::{RecordingChrome, RecordingEditorClient};
use crate::document::TestDocument;
use crate::driver::InputDriver;

/// Size of the main frame's view.
pub const VIEWPORT: IntSize = IntSize::new(800, 600);

/// Upper bound on timers [`PageFixture::settle`] runs.
const SETTLE_LIMIT: usize = 10_000;

/// A page with a main frame over a [`TestDocument`], recording clients,
/// and its own event loop.
#[derive(Debug)]
pub struct PageFixture {
    pub event_loop: Rc<EventLoop>,
    pub page: Rc<Page>,
    pub chrome: Rc<RecordingChrome>,
    pub editor: Rc<RecordingEditorClient>,
    pub frame: Rc<Frame>,
    pub document: Rc<TestDocument>,
}

/// A subframe added by [`PageFixture::add_subframe`].
#[derive(Debug, Clone)]
pub struct Subframe {
    /// Owner element in the parent document.
    pub owner: NodeId,
    pub frame: Rc<Frame>,
    pub document: Rc<TestDocument>,
}

impl Default for PageFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl PageFixture {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        let event_loop = EventLoop::new();
        let chrome = Rc::new(RecordingChrome::default());
        let editor = Rc::new(RecordingEditorClient::default());
        let page = Page::new(config, Rc::clone(&event_loop), chrome.clone(), editor.clone());
        let document = TestDocument::new(VIEWPORT);
        let frame = page.create_main_frame(document.clone(), IntRect::from_origin_size(Default::default(), VIEWPORT));
        Self {
            event_loop,
            page,
            chrome,
            editor,
            frame,
            document,
        }
    }

    /// Add a child of `parent` hosted by a new owner element occupying
    /// `owner_rect` in the parent's document.
    pub fn add_subframe_to(
        &self,
        parent: &Subframe,
        owner_rect: IntRect,
        name: &str,
    ) -> Result<Subframe, FrameTreeError> {
        Self::attach_child(&self.page, &parent.frame, &parent.document, owner_rect, name)
    }

    /// Add a child of the main frame occupying `owner_rect`.
    pub fn add_subframe(&self, owner_rect: IntRect, name: &str) -> Result<Subframe, FrameTreeError> {
        Self::attach_child(&self.page, &self.frame, &self.document, owner_rect, name)
    }

    fn attach_child(
        page: &Page,
        parent: &Frame,
        parent_document: &TestDocument,
        owner_rect: IntRect,
        name: &str,
    ) -> Result<Subframe, FrameTreeError> {
        let owner = parent_document.append_element(TestDocument::BODY, "iframe", Some(owner_rect));
        parent_document.set_frame_owner(owner);
        let document = TestDocument::new(owner_rect.size());
        let frame = page.create_child_frame(parent.id(), owner, name, document.clone(), owner_rect)?;
        Ok(Subframe { owner, frame, document })
    }

    #[must_use]
    pub fn view(&self) -> Option<Rc<FrameView>> {
        self.frame.view()
    }

    /// A driver feeding the main frame.
    #[must_use]
    pub fn driver(&self) -> InputDriver {
        InputDriver::new(&self.frame)
    }

    /// Lay out the main frame now, regardless of scheduling.
    pub fn layout(&self) {
        if let Some(view) = self.frame.view() {
            view.layout(false);
        }
    }

    /// Run timers until none is left or a repeating timer keeps the loop
    /// busy. Returns timers run.
    pub fn settle(&self) -> usize {
        let mut ran = 0;
        while ran < SETTLE_LIMIT && self.event_loop.run_next() {
            ran += 1;
        }
        ran
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_builds_a_main_frame_with_a_view() {
        let fixture = PageFixture::new();
        assert!(fixture.frame.is_main_frame());
        let view = fixture.view().expect("main frame view");
        assert_eq!(view.frame_rect().size(), VIEWPORT);
    }

    #[test]
    fn subframes_register_in_the_tree() {
        let fixture = PageFixture::new();
        let child = fixture
            .add_subframe(IntRect::new(100, 100, 200, 150), "child")
            .expect("subframe");
        assert_eq!(child.frame.parent().map(|p| p.id()), Some(fixture.frame.id()));
        assert_eq!(fixture.frame.child_frame_for_owner(child.owner).map(|f| f.id()), Some(child.frame.id()));
        assert_eq!(fixture.page.subframe_count(), 1);
    }
}
