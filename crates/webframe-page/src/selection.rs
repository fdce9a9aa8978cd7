#![forbid(unsafe_code)]

//! Per-frame selection state.
//!
//! [`VisibleSelection`] is a plain value: a base/extent pair plus the same
//! two positions in document order. [`SelectionController`] stores the
//! frame's current selection and granularity; the side effects of changing
//! it (focus update, reveal, client notification) are driven by
//! [`Frame::set_selection`](crate::frame::Frame::set_selection).

use std::cell::Cell;
use std::cmp::Ordering;

use crate::dom::{Document, NodeId, Position, Range, TextGranularity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    None,
    Caret,
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Endpoints {
    base: Position,
    extent: Position,
    start: Position,
    end: Position,
}

/// A selection value. `start`/`end` are `base`/`extent` in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisibleSelection {
    endpoints: Option<Endpoints>,
}

impl VisibleSelection {
    #[must_use]
    pub const fn none() -> Self {
        Self { endpoints: None }
    }

    #[must_use]
    pub const fn caret(at: Position) -> Self {
        Self {
            endpoints: Some(Endpoints {
                base: at,
                extent: at,
                start: at,
                end: at,
            }),
        }
    }

    /// Selection over `range`, base at its start.
    #[must_use]
    pub const fn from_range(range: Range) -> Self {
        Self {
            endpoints: Some(Endpoints {
                base: range.start,
                extent: range.end,
                start: range.start,
                end: range.end,
            }),
        }
    }

    /// Selection from `base` to `extent`, ordered by `document`.
    #[must_use]
    pub fn new(base: Position, extent: Position, document: &dyn Document) -> Self {
        let (start, end) = if document.compare_positions(base, extent) == Ordering::Greater {
            (extent, base)
        } else {
            (base, extent)
        };
        Self {
            endpoints: Some(Endpoints {
                base,
                extent,
                start,
                end,
            }),
        }
    }

    #[must_use]
    pub fn state(&self) -> SelectionState {
        match &self.endpoints {
            None => SelectionState::None,
            Some(e) if e.start == e.end => SelectionState::Caret,
            Some(_) => SelectionState::Range,
        }
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        self.endpoints.is_none()
    }

    #[must_use]
    pub fn is_caret(&self) -> bool {
        self.state() == SelectionState::Caret
    }

    #[must_use]
    pub fn is_range(&self) -> bool {
        self.state() == SelectionState::Range
    }

    #[must_use]
    pub fn base(&self) -> Option<Position> {
        self.endpoints.map(|e| e.base)
    }

    #[must_use]
    pub fn extent(&self) -> Option<Position> {
        self.endpoints.map(|e| e.extent)
    }

    #[must_use]
    pub fn start(&self) -> Option<Position> {
        self.endpoints.map(|e| e.start)
    }

    #[must_use]
    pub fn end(&self) -> Option<Position> {
        self.endpoints.map(|e| e.end)
    }

    #[must_use]
    pub fn to_range(&self) -> Option<Range> {
        self.endpoints.map(|e| Range::new(e.start, e.end))
    }

    /// Same base, new extent.
    #[must_use]
    pub fn with_extent(&self, extent: Position, document: &dyn Document) -> Self {
        match self.base() {
            Some(base) => Self::new(base, extent, document),
            None => Self::caret(extent),
        }
    }

    /// Grow to whole units of `granularity`, keeping the base/extent direction.
    #[must_use]
    pub fn expanded(&self, granularity: TextGranularity, document: &dyn Document) -> Self {
        let Some(e) = self.endpoints else {
            return *self;
        };
        if granularity == TextGranularity::Character {
            return *self;
        }
        let range = document.expand_range(Range::new(e.start, e.end), granularity);
        let forward = document.compare_positions(e.base, e.extent) != Ordering::Greater;
        let (base, extent) = if forward {
            (range.start, range.end)
        } else {
            (range.end, range.start)
        };
        Self {
            endpoints: Some(Endpoints {
                base,
                extent,
                start: range.start,
                end: range.end,
            }),
        }
    }

    /// Whether `position` falls inside a range selection, ends included.
    #[must_use]
    pub fn contains(&self, position: Position, document: &dyn Document) -> bool {
        let Some(e) = self.endpoints else {
            return false;
        };
        if e.start == e.end {
            return false;
        }
        document.compare_positions(e.start, position) != Ordering::Greater
            && document.compare_positions(position, e.end) != Ordering::Greater
    }

    /// Node of the start position.
    #[must_use]
    pub fn start_node(&self) -> Option<NodeId> {
        self.start().map(|p| p.node)
    }
}

/// The frame's selection and the granularity it was made with.
#[derive(Debug, Default)]
pub struct SelectionController {
    selection: Cell<VisibleSelection>,
    granularity: Cell<TextGranularity>,
    focused: Cell<bool>,
    active: Cell<bool>,
    needs_layout: Cell<bool>,
}

impl SelectionController {
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: Cell::new(true),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn selection(&self) -> VisibleSelection {
        self.selection.get()
    }

    /// Store `selection`. Returns whether it differed from the previous one.
    pub(crate) fn replace(&self, selection: VisibleSelection) -> bool {
        let changed = self.selection.get() != selection;
        if changed {
            self.selection.set(selection);
            self.needs_layout.set(true);
        }
        changed
    }

    #[must_use]
    pub fn granularity(&self) -> TextGranularity {
        self.granularity.get()
    }

    pub fn set_granularity(&self, granularity: TextGranularity) {
        self.granularity.set(granularity);
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        self.selection.get().is_none()
    }

    #[must_use]
    pub fn is_caret(&self) -> bool {
        self.selection.get().is_caret()
    }

    #[must_use]
    pub fn is_range(&self) -> bool {
        self.selection.get().is_range()
    }

    pub fn set_focused(&self, focused: bool) {
        self.focused.set(focused);
    }

    #[must_use]
    pub fn is_focused(&self) -> bool {
        self.focused.get()
    }

    pub fn set_active(&self, active: bool) {
        self.active.set(active);
    }

    #[must_use]
    pub fn is_focused_and_active(&self) -> bool {
        self.focused.get() && self.active.get()
    }

    /// Editable root containing the selection start.
    #[must_use]
    pub fn root_editable_element(&self, document: &dyn Document) -> Option<NodeId> {
        document.root_editable_element(self.selection.get().start_node()?)
    }

    #[must_use]
    pub fn is_content_editable(&self, document: &dyn Document) -> bool {
        self.selection
            .get()
            .start_node()
            .is_some_and(|n| document.is_content_editable(n))
    }

    pub(crate) fn take_needs_layout(&self) -> bool {
        self.needs_layout.replace(false)
    }

    pub fn set_needs_layout(&self) {
        self.needs_layout.set(true);
    }
}
