#![forbid(unsafe_code)]

//! Chrome and editor clients that record every callback.
//!
//! Both clients use interior mutability only, so tests keep an `Rc` to the
//! concrete type and hand the page an `Rc<dyn ...>` clone.

use std::cell::{Cell, RefCell};

use webframe_core::event::{Modifiers, PlatformKeyboardEvent};
use webframe_core::geometry::{IntRect, IntSize};
use webframe_page::chrome::ChromeClient;
use webframe_page::dom::{DomEvent, EventType, NodeId, Range};
use webframe_page::editor::EditorClient;
use webframe_page::focus::FocusDirection;
use webframe_page::frame_tree::FrameId;
use webframe_page::hit_test::HitTestResult;

// ---------------------------------------------------------------------------
// Chrome
// ---------------------------------------------------------------------------

/// A [`ChromeClient`] that records what the core asked of the host UI.
#[derive(Debug)]
pub struct RecordingChrome {
    pub invalidations: RefCell<Vec<(IntRect, bool)>>,
    pub contents_sizes: RefCell<Vec<(FrameId, IntSize)>>,
    pub layouts: RefCell<Vec<FrameId>>,
    pub status_text: RefCell<Vec<String>>,
    pub tool_tips: RefCell<Vec<String>>,
    pub hovered: RefCell<Vec<(Option<NodeId>, Modifiers)>>,
    pub alerts: RefCell<Vec<(FrameId, String)>>,
    /// Answer to `run_javascript_confirm`.
    pub confirm_answer: Cell<bool>,
    /// Answer to `start_drag`.
    pub accept_drag: Cell<bool>,
    pub drags: RefCell<Vec<(FrameId, NodeId)>>,
    /// Answer to `can_take_focus`.
    pub can_take_focus: Cell<bool>,
    pub focus_taken: RefCell<Vec<FocusDirection>>,
    pub focus_count: Cell<u32>,
    pub unfocus_count: Cell<u32>,
    pub sudden_termination_disabled: Cell<u32>,
    pub sudden_termination_enabled: Cell<u32>,
}

impl Default for RecordingChrome {
    fn default() -> Self {
        Self {
            invalidations: RefCell::default(),
            contents_sizes: RefCell::default(),
            layouts: RefCell::default(),
            status_text: RefCell::default(),
            tool_tips: RefCell::default(),
            hovered: RefCell::default(),
            alerts: RefCell::default(),
            confirm_answer: Cell::new(true),
            accept_drag: Cell::new(true),
            drags: RefCell::default(),
            can_take_focus: Cell::new(false),
            focus_taken: RefCell::default(),
            focus_count: Cell::new(0),
            unfocus_count: Cell::new(0),
            sudden_termination_disabled: Cell::new(0),
            sudden_termination_enabled: Cell::new(0),
        }
    }
}

impl RecordingChrome {
    /// Rects invalidated so far, ignoring the immediate flag.
    #[must_use]
    pub fn invalidated_rects(&self) -> Vec<IntRect> {
        self.invalidations.borrow().iter().map(|(rect, _)| *rect).collect()
    }

    #[must_use]
    pub fn layout_count(&self) -> usize {
        self.layouts.borrow().len()
    }

    /// Last tool tip shown, if any.
    #[must_use]
    pub fn last_tool_tip(&self) -> Option<String> {
        self.tool_tips.borrow().last().cloned()
    }

    pub fn clear(&self) {
        self.invalidations.borrow_mut().clear();
        self.contents_sizes.borrow_mut().clear();
        self.layouts.borrow_mut().clear();
        self.status_text.borrow_mut().clear();
        self.tool_tips.borrow_mut().clear();
        self.hovered.borrow_mut().clear();
        self.drags.borrow_mut().clear();
        self.focus_taken.borrow_mut().clear();
    }
}

impl ChromeClient for RecordingChrome {
    fn invalidate_contents(&self, rect: IntRect, immediate: bool) {
        self.invalidations.borrow_mut().push((rect, immediate));
    }

    fn contents_size_changed(&self, frame: FrameId, size: IntSize) {
        self.contents_sizes.borrow_mut().push((frame, size));
    }

    fn layout_updated(&self, frame: FrameId) {
        self.layouts.borrow_mut().push(frame);
    }

    fn set_status_bar_text(&self, text: &str) {
        self.status_text.borrow_mut().push(text.to_owned());
    }

    fn set_tool_tip(&self, tip: &str) {
        self.tool_tips.borrow_mut().push(tip.to_owned());
    }

    fn mouse_did_move_over_element(&self, hit: &HitTestResult, modifiers: Modifiers) {
        self.hovered.borrow_mut().push((hit.inner_node, modifiers));
    }

    fn run_javascript_alert(&self, frame: FrameId, message: &str) {
        self.alerts.borrow_mut().push((frame, message.to_owned()));
    }

    fn run_javascript_confirm(&self, _frame: FrameId, _message: &str) -> bool {
        self.confirm_answer.get()
    }

    fn can_take_focus(&self, _direction: FocusDirection) -> bool {
        self.can_take_focus.get()
    }

    fn take_focus(&self, direction: FocusDirection) {
        self.focus_taken.borrow_mut().push(direction);
    }

    fn focus(&self) {
        self.focus_count.set(self.focus_count.get() + 1);
    }

    fn unfocus(&self) {
        self.unfocus_count.set(self.unfocus_count.get() + 1);
    }

    fn start_drag(&self, frame: FrameId, source: NodeId) -> bool {
        self.drags.borrow_mut().push((frame, source));
        self.accept_drag.get()
    }

    fn disable_sudden_termination(&self) {
        self.sudden_termination_disabled
            .set(self.sudden_termination_disabled.get() + 1);
    }

    fn enable_sudden_termination(&self) {
        self.sudden_termination_enabled
            .set(self.sudden_termination_enabled.get() + 1);
    }
}

// ---------------------------------------------------------------------------
// Editor
// ---------------------------------------------------------------------------

/// An editing command the core handed to the editor client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditCommand {
    InsertText(FrameId, String),
    LineBreak(FrameId),
    ParagraphSeparator(FrameId),
}

/// An [`EditorClient`] that records commands and answers from `Cell`s.
#[derive(Debug)]
pub struct RecordingEditorClient {
    /// Key events offered to the client, as `(type, key identifier)`.
    pub key_events: RefCell<Vec<(EventType, String)>>,
    /// Answer to `handle_keyboard_event`.
    pub handles_keys: Cell<bool>,
    /// Answer to `handle_input_method_keydown`.
    pub input_method_takes: Cell<bool>,
    pub commands: RefCell<Vec<EditCommand>>,
    /// Answer to `should_change_selected_range`.
    pub allow_selection_change: Cell<bool>,
    /// Answer to `should_end_editing`.
    pub allow_end_editing: Cell<bool>,
    pub input_method_states: RefCell<Vec<bool>>,
    pub selection_changes: Cell<u32>,
    /// Answer to `is_editable`.
    pub editable: Cell<bool>,
}

impl Default for RecordingEditorClient {
    fn default() -> Self {
        Self {
            key_events: RefCell::default(),
            handles_keys: Cell::new(false),
            input_method_takes: Cell::new(false),
            commands: RefCell::default(),
            allow_selection_change: Cell::new(true),
            allow_end_editing: Cell::new(true),
            input_method_states: RefCell::default(),
            selection_changes: Cell::new(0),
            editable: Cell::new(false),
        }
    }
}

impl RecordingEditorClient {
    /// Concatenation of every inserted text, line breaks as `\n`.
    #[must_use]
    pub fn typed_text(&self) -> String {
        self.commands
            .borrow()
            .iter()
            .map(|command| match command {
                EditCommand::InsertText(_, text) => text.as_str(),
                EditCommand::LineBreak(_) | EditCommand::ParagraphSeparator(_) => "\n",
            })
            .collect()
    }
}

impl EditorClient for RecordingEditorClient {
    fn handle_keyboard_event(&self, _frame: FrameId, event: &DomEvent) -> bool {
        let key = event.key().map(|k| k.key_identifier.clone()).unwrap_or_default();
        self.key_events.borrow_mut().push((event.event_type, key));
        self.handles_keys.get()
    }

    fn handle_input_method_keydown(&self, _frame: FrameId, _event: &PlatformKeyboardEvent) -> bool {
        self.input_method_takes.get()
    }

    fn insert_text(&self, frame: FrameId, text: &str) -> bool {
        self.commands
            .borrow_mut()
            .push(EditCommand::InsertText(frame, text.to_owned()));
        true
    }

    fn insert_line_break(&self, frame: FrameId) -> bool {
        self.commands.borrow_mut().push(EditCommand::LineBreak(frame));
        true
    }

    fn insert_paragraph_separator(&self, frame: FrameId) -> bool {
        self.commands
            .borrow_mut()
            .push(EditCommand::ParagraphSeparator(frame));
        true
    }

    fn should_change_selected_range(&self, _from: Option<Range>, _to: Option<Range>, _still_selecting: bool) -> bool {
        self.allow_selection_change.get()
    }

    fn should_end_editing(&self, _node: NodeId) -> bool {
        self.allow_end_editing.get()
    }

    fn set_input_method_state(&self, enabled: bool) {
        self.input_method_states.borrow_mut().push(enabled);
    }

    fn respond_to_changed_selection(&self, _frame: FrameId) {
        self.selection_changes.set(self.selection_changes.get() + 1);
    }

    fn is_editable(&self) -> bool {
        self.editable.get()
    }
}
