#![forbid(unsafe_code)]

//! Test harness for webframe.
//!
//! # Key Components
//!
//! - [`TestDocument`] - in-memory document and render tree that records
//!   every event dispatched into it
//! - [`RecordingChrome`] / [`RecordingEditorClient`] - clients that record
//!   callbacks and answer from settable cells
//! - [`InputDriver`] - scripted platform input with click counting and
//!   timestamps from the event loop
//! - [`PageFixture`] - a page, a main frame, and the recording clients in
//!   one value
//! - [`input_storm`] - seeded input storms with JSONL evidence

pub mod clients;
pub mod document;
pub mod driver;
pub mod fixture;
pub mod input_storm;

pub use clients::{EditCommand, RecordingChrome, RecordingEditorClient};
pub use document::{DocCall, GLYPH_WIDTH, LINE_HEIGHT, LINE_STEP, NodeKind, TestDocument};
pub use driver::{InputDriver, key_identifier_for};
pub use fixture::{PageFixture, Subframe, VIEWPORT};
pub use input_storm::{
    BurstPattern, InputAction, InputStorm, InputStormConfig, generate_storm, run_storm_with_logging,
};
