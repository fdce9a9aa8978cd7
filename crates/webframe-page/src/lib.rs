#![forbid(unsafe_code)]

//! Frame tree, layout scheduling, and input dispatch.
//!
//! This crate is the coordination core of a page: it decides *when* layout
//! and painting happen and *where* input goes, and leaves the document, the
//! render tree, and the host UI behind traits.
//!
//! # Key Components
//!
//! - [`Page`] - owns the frame tree, the chrome, and focus routing
//! - [`Frame`] - one browsing context: document, view, selection, find
//! - [`FrameTree`] - arena of frames with naming and target lookup
//! - [`FrameView`] - scroll state, debounced layout, repaint coalescing
//! - [`EventHandler`] - mouse, keyboard, wheel, and drag dispatch per frame
//! - [`FocusController`] - focused frame and Tab navigation across frames
//! - [`Document`] / [`RenderTree`] - what the core needs from the DOM and
//!   the layout engine
//! - [`ChromeClient`] / [`EditorClient`] - embedder callbacks
//!
//! # Threading
//!
//! Everything here is single-threaded and driven by a
//! [`webframe_core::EventLoop`]. Handles are `Rc`; back references are
//! `Weak` and upgraded per call.

pub mod chrome;
pub mod dom;
pub mod editor;
pub mod event_handler;
pub mod focus;
pub mod frame;
pub mod frame_tree;
pub mod frame_view;
pub mod hit_test;
pub mod page;
pub mod render;
pub mod script_timer;
pub mod selection;

pub use chrome::{Chrome, ChromeClient, EmptyChromeClient, WindowFeatures};
pub use dom::{
    DispatchResult, Document, DocumentId, DomEvent, EventDetail, EventType, MarkerKind,
    MouseEventDetail, NodeId, Position, Range, TextEventDetail, TextGranularity,
    WheelEventDetail,
};
pub use editor::{Editor, EditorClient, EmptyEditorClient};
pub use event_handler::EventHandler;
pub use focus::{FocusController, FocusDirection};
pub use frame::{FindOptions, Frame, ScrollAlignment, ViewportArguments};
pub use frame_tree::{FrameId, FrameTree, FrameTreeError};
pub use frame_view::FrameView;
pub use hit_test::{HitTestRequest, HitTestResult, MouseEventWithHitTestResults};
pub use page::{Page, PageGroup, PageGroupLoadDeferrer};
pub use render::{
    RenderTree, ScrollDirection, ScrollGranularity, ScrollbarId, ScrollbarMode, ViewportOverflow,
};
pub use script_timer::{ScriptTimerId, ScriptTimers};
pub use selection::{SelectionController, SelectionState, VisibleSelection};
