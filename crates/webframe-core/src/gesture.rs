#![forbid(unsafe_code)]

//! Click-count and drag-threshold rules.
//!
//! [`ClickCounter`] is the reference implementation of how a platform
//! assigns `click_count` to successive mouse presses. [`DragHysteresis`]
//! decides when a press followed by motion becomes a drag.
//!
//! # Invariants
//!
//! 1. A press continues the current sequence only if it uses the same
//!    button, lands within the tolerance of the previous press, and arrives
//!    within the multi-click interval. Any other press restarts at 1.
//! 2. Counts are unbounded; consumers decide what 3+ means.
//! 3. After `reset()`, the next press always counts 1.
//! 4. A drag never starts on a delta strictly below the threshold for its
//!    source kind.

use std::time::Duration;

use crate::config::{ClickPolicy, DragPolicy};
use crate::event::MouseButton;
use crate::geometry::{IntPoint, IntSize};

// ---------------------------------------------------------------------------
// Click counting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct LastPress {
    button: MouseButton,
    position: IntPoint,
    time: Duration,
    count: u32,
}

/// Assigns click counts to a stream of presses.
#[derive(Debug, Clone)]
pub struct ClickCounter {
    policy: ClickPolicy,
    last: Option<LastPress>,
}

impl ClickCounter {
    #[must_use]
    pub fn new(policy: ClickPolicy) -> Self {
        Self { policy, last: None }
    }

    /// Record a press and return its click count.
    pub fn register_press(&mut self, button: MouseButton, position: IntPoint, time: Duration) -> u32 {
        let count = match &self.last {
            Some(last)
                if last.button == button
                    && last.position.manhattan_distance(position)
                        <= self.policy.multi_click_tolerance
                    && time.saturating_sub(last.time) <= self.policy.multi_click_interval() =>
            {
                last.count + 1
            }
            _ => 1,
        };
        self.last = Some(LastPress {
            button,
            position,
            time,
            count,
        });
        count
    }

    /// Count the next press would get if it happened now, without recording it.
    #[must_use]
    pub fn peek(&self, button: MouseButton, position: IntPoint, time: Duration) -> u32 {
        self.clone().register_press(button, position, time)
    }

    pub fn reset(&mut self) {
        self.last = None;
    }

    #[must_use]
    pub fn policy(&self) -> &ClickPolicy {
        &self.policy
    }
}

impl Default for ClickCounter {
    fn default() -> Self {
        Self::new(ClickPolicy::default())
    }
}

// ---------------------------------------------------------------------------
// Drag hysteresis
// ---------------------------------------------------------------------------

/// What the user pressed on, which decides how far they must move before
/// a drag starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DragSourceKind {
    Link,
    Image,
    Text,
    General,
}

/// Per-kind drag thresholds.
#[derive(Debug, Clone, Default)]
pub struct DragHysteresis {
    policy: DragPolicy,
}

impl DragHysteresis {
    #[must_use]
    pub fn new(policy: DragPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn threshold(&self, kind: DragSourceKind) -> u32 {
        match kind {
            DragSourceKind::Link => self.policy.link_hysteresis,
            DragSourceKind::Image => self.policy.image_hysteresis,
            DragSourceKind::Text => self.policy.text_hysteresis,
            DragSourceKind::General => self.policy.general_hysteresis,
        }
    }

    /// Whether motion by `delta` since the press is far enough to drag.
    /// Either axis reaching the threshold is enough.
    #[must_use]
    pub fn exceeded(&self, kind: DragSourceKind, delta: IntSize) -> bool {
        let threshold = self.threshold(kind);
        delta.width.unsigned_abs() >= threshold || delta.height.unsigned_abs() >= threshold
    }
}
