#![forbid(unsafe_code)]

//! webframe public facade crate.
//!
//! Re-exports the common types of the core and page crates and offers a
//! [`PageBuilder`] plus a prelude for embedders.

use std::fmt;
use std::rc::Rc;

// --- Core re-exports -------------------------------------------------------

pub use webframe_core::config::EngineConfig;
pub use webframe_core::event::{
    KeyEventKind, Modifiers, MouseButton, MouseEventKind, PlatformKeyboardEvent, PlatformMouseEvent,
    PlatformWheelEvent, WheelGranularity,
};
pub use webframe_core::event_loop::EventLoop;
pub use webframe_core::geometry::{IntPoint, IntRect, IntSize};
pub use webframe_core::{ConfigError, DragSourceKind};

// --- Page re-exports -------------------------------------------------------

pub use webframe_page::{
    ChromeClient, Document, EditorClient, EmptyChromeClient, EmptyEditorClient, EventHandler, FindOptions,
    FocusDirection, Frame, FrameId, FrameTreeError, FrameView, Page, PageGroup, PageGroupLoadDeferrer,
    RenderTree,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for webframe embedders.
#[derive(Debug)]
pub enum Error {
    /// Configuration could not be loaded or failed validation.
    Config(ConfigError),
    /// Structural misuse of a page's frame tree.
    FrameTree(FrameTreeError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "config: {err}"),
            Self::FrameTree(err) => write!(f, "frame tree: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::FrameTree(err) => Some(err),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<FrameTreeError> for Error {
    fn from(err: FrameTreeError) -> Self {
        Self::FrameTree(err)
    }
}

/// Standard result type for webframe APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Page builder -----------------------------------------------------------

/// Assembles a [`Page`] from a validated config and the embedder's clients.
///
/// Clients left unset default to the empty ones; an unset event loop is
/// created fresh.
#[derive(Default)]
pub struct PageBuilder {
    config: EngineConfig,
    event_loop: Option<Rc<EventLoop>>,
    chrome: Option<Rc<dyn ChromeClient>>,
    editor: Option<Rc<dyn EditorClient>>,
    group: Option<Rc<PageGroup>>,
}

impl fmt::Debug for PageBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageBuilder")
            .field("config", &self.config)
            .field("shared_event_loop", &self.event_loop.is_some())
            .field("group", &self.group.as_ref().map(|g| g.name().to_owned()))
            .finish_non_exhaustive()
    }
}

impl PageBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Load the config from a TOML file.
    #[cfg(feature = "config")]
    pub fn config_file(mut self, path: impl AsRef<std::path::Path>) -> Result<Self> {
        self.config = EngineConfig::from_toml_file(path)?;
        Ok(self)
    }

    /// Share an event loop with other pages.
    #[must_use]
    pub fn event_loop(mut self, event_loop: Rc<EventLoop>) -> Self {
        self.event_loop = Some(event_loop);
        self
    }

    #[must_use]
    pub fn chrome_client(mut self, client: Rc<dyn ChromeClient>) -> Self {
        self.chrome = Some(client);
        self
    }

    #[must_use]
    pub fn editor_client(mut self, client: Rc<dyn EditorClient>) -> Self {
        self.editor = Some(client);
        self
    }

    /// Join the page to `group` once built.
    #[must_use]
    pub fn group(mut self, group: Rc<PageGroup>) -> Self {
        self.group = Some(group);
        self
    }

    /// Validate the config and build the page.
    pub fn build(self) -> Result<Rc<Page>> {
        let problems = self.config.validate();
        if !problems.is_empty() {
            return Err(ConfigError::Validation(problems).into());
        }
        let event_loop = self.event_loop.unwrap_or_else(EventLoop::new);
        let chrome: Rc<dyn ChromeClient> = match self.chrome {
            Some(client) => client,
            None => Rc::new(EmptyChromeClient),
        };
        let editor: Rc<dyn EditorClient> = match self.editor {
            Some(client) => client,
            None => Rc::new(EmptyEditorClient),
        };
        let page = Page::new(self.config, event_loop, chrome, editor);
        if self.group.is_some() {
            page.set_group(self.group);
        }
        Ok(page)
    }
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        EngineConfig, Error, EventLoop, FindOptions, Frame, FrameId, FrameView, IntPoint, IntRect, IntSize,
        MouseButton, Page, PageBuilder, PlatformKeyboardEvent, PlatformMouseEvent, PlatformWheelEvent, Result,
    };

    pub use crate::{core, page};
}

pub use webframe_core as core;
pub use webframe_page as page;
