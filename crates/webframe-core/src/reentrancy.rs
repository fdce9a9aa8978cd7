#![forbid(unsafe_code)]

//! Re-entrancy tracking and work deferred to the outermost exit.
//!
//! Layout, repaint batching, and scheduled-event delivery can all be
//! re-entered from script running inside them. Each of those places owns a
//! [`ReentrancyGuard`] counting how deep the current call stack is inside
//! it, and often a [`DeferredQueue`] collecting work that must only run once
//! the outermost level has exited.
//!
//! # Usage
//!
//! ```
//! use webframe_core::reentrancy::{DeferredQueue, ReentrancyGuard};
//!
//! let guard = ReentrancyGuard::new("repaint");
//! let queue = DeferredQueue::new();
//! {
//!     let outer = guard.enter();
//!     queue.push(1);
//!     {
//!         let inner = guard.enter();
//!         queue.push(2);
//!         assert!(!inner.finish());
//!     }
//!     assert!(outer.finish());
//! }
//! assert_eq!(queue.take_all(), vec![1, 2]);
//! ```
//!
//! # Invariants
//!
//! 1. `depth()` equals the number of live scopes plus unmatched `begin()`s.
//! 2. Exactly one exit per nesting episode reports itself as outermost.
//! 3. `end()` without a matching `begin()` is ignored and logged.

use std::cell::{Cell, RefCell};

use tracing::warn;

/// Nesting counter for one re-entrant region.
#[derive(Debug)]
pub struct ReentrancyGuard {
    label: &'static str,
    depth: Cell<u32>,
}

impl ReentrancyGuard {
    #[must_use]
    pub const fn new(label: &'static str) -> Self {
        Self {
            label,
            depth: Cell::new(0),
        }
    }

    /// Enter the region for the lifetime of the returned scope.
    #[must_use = "the region is exited when the scope is dropped"]
    pub fn enter(&self) -> ReentrancyScope<'_> {
        let outermost = self.begin() == 1;
        ReentrancyScope {
            guard: self,
            outermost,
            finished: false,
        }
    }

    /// Enter without a scope object. Returns the new depth.
    pub fn begin(&self) -> u32 {
        let depth = self.depth.get() + 1;
        self.depth.set(depth);
        depth
    }

    /// Leave a region entered with [`begin`](Self::begin). Returns `true`
    /// when this exit brought the depth back to zero.
    pub fn end(&self) -> bool {
        match self.depth.get() {
            0 => {
                warn!(region = self.label, "unbalanced end of re-entrant region");
                false
            }
            depth => {
                self.depth.set(depth - 1);
                depth == 1
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth.get()
    }

    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.depth.get() > 0
    }

    /// Force the depth back to zero, as when the owner is reset.
    pub fn reset(&self) {
        self.depth.set(0);
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }
}

/// RAII token for one level of a [`ReentrancyGuard`].
#[derive(Debug)]
pub struct ReentrancyScope<'a> {
    guard: &'a ReentrancyGuard,
    outermost: bool,
    finished: bool,
}

impl ReentrancyScope<'_> {
    /// Whether this scope opened the region.
    #[must_use]
    pub fn is_outermost(&self) -> bool {
        self.outermost
    }

    /// Exit now. Returns `true` if this was the outermost level.
    pub fn finish(mut self) -> bool {
        self.finished = true;
        self.guard.end()
    }
}

impl Drop for ReentrancyScope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.guard.end();
        }
    }
}

/// Work collected while inside a region, taken out when the region ends.
///
/// Items are returned in push order. The queue never runs anything itself;
/// the owner drains it and runs items with no borrow held.
#[derive(Debug)]
pub struct DeferredQueue<T> {
    items: RefCell<Vec<T>>,
}

impl<T> Default for DeferredQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DeferredQueue<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: RefCell::new(Vec::new()),
        }
    }

    pub fn push(&self, item: T) {
        self.items.borrow_mut().push(item);
    }

    /// Remove and return everything queued so far.
    #[must_use]
    pub fn take_all(&self) -> Vec<T> {
        std::mem::take(&mut *self.items.borrow_mut())
    }

    /// Keep only items matching `f`.
    pub fn retain(&self, f: impl FnMut(&T) -> bool) {
        self.items.borrow_mut().retain(f);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    pub fn clear(&self) {
        let dropped = self.take_all();
        drop(dropped);
    }

    /// Apply `f` to the queued items in place.
    pub fn with_items<R>(&self, f: impl FnOnce(&mut Vec<T>) -> R) -> R {
        f(&mut self.items.borrow_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_scopes_report_outermost_once() {
        let guard = ReentrancyGuard::new("layout");
        let outer = guard.enter();
        assert!(outer.is_outermost());
        let inner = guard.enter();
        assert!(!inner.is_outermost());
        assert_eq!(guard.depth(), 2);
        assert!(!inner.finish());
        assert!(outer.finish());
        assert!(!guard.is_active());
    }

    #[test]
    fn dropped_scope_exits() {
        let guard = ReentrancyGuard::new("layout");
        {
            let _scope = guard.enter();
            assert!(guard.is_active());
        }
        assert_eq!(guard.depth(), 0);
    }

    #[test]
    fn begin_end_pairs() {
        let guard = ReentrancyGuard::new("repaint");
        assert_eq!(guard.begin(), 1);
        assert_eq!(guard.begin(), 2);
        assert!(!guard.end());
        assert!(guard.end());
    }

    #[test]
    fn unbalanced_end_is_ignored() {
        let guard = ReentrancyGuard::new("repaint");
        assert!(!guard.end());
        assert_eq!(guard.depth(), 0);
    }

    #[test]
    fn reset_clears_depth() {
        let guard = ReentrancyGuard::new("events");
        guard.begin();
        guard.begin();
        guard.reset();
        assert!(!guard.is_active());
    }

    #[test]
    fn queue_preserves_order_and_drains() {
        let queue = DeferredQueue::new();
        queue.push("a");
        queue.push("b");
        queue.push("c");
        queue.retain(|s| *s != "b");
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.take_all(), vec!["a", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn push_during_drain_lands_in_next_batch() {
        let queue = DeferredQueue::new();
        queue.push(1);
        for item in queue.take_all() {
            queue.push(item + 10);
        }
        assert_eq!(queue.take_all(), vec![11]);
    }
}
