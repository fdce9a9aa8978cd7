#![forbid(unsafe_code)]

//! Leaf primitives for webframe.
//!
//! Nothing here knows about frames or documents. The page crate builds the
//! dispatch and layout core on top of these types.

pub mod config;
pub mod event;
pub mod event_loop;
pub mod geometry;
pub mod gesture;
pub mod reentrancy;

pub use config::{ConfigError, EngineConfig};
pub use event::{
    KeyEventKind, Modifiers, MouseButton, MouseEventKind, PlatformKeyboardEvent,
    PlatformMouseEvent, PlatformWheelEvent, WheelGranularity,
};
pub use event_loop::{EventLoop, KeepAliveId, Timer, TimerId};
pub use geometry::{IntPoint, IntRect, IntSize};
pub use gesture::{ClickCounter, DragHysteresis, DragSourceKind};
pub use reentrancy::{DeferredQueue, ReentrancyGuard, ReentrancyScope};
