#![forbid(unsafe_code)]

//! Arena of frame records linked by id.
//!
//! A page's frames form a tree: one main frame and any number of nested
//! subframes. [`FrameTree`] stores only the structure (names, parent, ordered
//! children); the [`Frame`](crate::frame::Frame) objects themselves are kept
//! by the [`Page`](crate::page::Page) in a map keyed by [`FrameId`].
//!
//! # Invariants
//!
//! 1. A frame appears in at most one parent's child list, and its `parent`
//!    field names that list's owner.
//! 2. No frame is its own ancestor.
//! 3. [`FrameTree::unique_child_name`] never returns a name already used by a
//!    current child of the parent.
//! 4. Pre-order traversal from a root visits every frame of that root's tree
//!    exactly once.
//!
//! # Failure Modes
//!
//! Traversal and lookups on an unknown id return `None`. Structural edits on
//! unknown ids, non-children, or edits that would create a cycle return a
//! [`FrameTreeError`] and leave the tree unchanged.

use std::collections::HashMap;

/// Stable identifier of a frame within a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(u64);

impl FrameId {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// Structural misuse of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameTreeError {
    UnknownFrame(FrameId),
    NotAChild { parent: FrameId, child: FrameId },
    AlreadyAttached(FrameId),
    WouldCycle { parent: FrameId, child: FrameId },
}

impl std::fmt::Display for FrameTreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownFrame(id) => write!(f, "unknown frame {id}"),
            Self::NotAChild { parent, child } => write!(f, "{child} is not a child of {parent}"),
            Self::AlreadyAttached(id) => write!(f, "{id} already has a parent"),
            Self::WouldCycle { parent, child } => {
                write!(f, "appending {child} under {parent} would create a cycle")
            }
        }
    }
}

impl std::error::Error for FrameTreeError {}

#[derive(Debug, Clone, Default)]
struct FrameNode {
    name: String,
    parent: Option<FrameId>,
    children: Vec<FrameId>,
    /// Names of children that have since been removed.
    retired_child_names: Vec<String>,
}

/// The frame hierarchy of one page.
#[derive(Debug, Default)]
pub struct FrameTree {
    nodes: HashMap<FrameId, FrameNode>,
    next_id: u64,
}

impl FrameTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached frame record.
    pub fn create_frame(&mut self, name: impl Into<String>) -> FrameId {
        self.next_id += 1;
        let id = FrameId(self.next_id);
        self.nodes.insert(
            id,
            FrameNode {
                name: name.into(),
                ..FrameNode::default()
            },
        );
        id
    }

    #[must_use]
    pub fn contains(&self, id: FrameId) -> bool {
        self.nodes.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, id: FrameId) -> Result<&FrameNode, FrameTreeError> {
        self.nodes.get(&id).ok_or(FrameTreeError::UnknownFrame(id))
    }

    // -----------------------------------------------------------------------
    // Names
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn name(&self, id: FrameId) -> Option<&str> {
        self.nodes.get(&id).map(|n| n.name.as_str())
    }

    /// Rename a frame, disambiguating against its siblings.
    pub fn set_name(&mut self, id: FrameId, requested: &str) -> Result<String, FrameTreeError> {
        let parent = self.node(id)?.parent;
        let name = match parent {
            Some(p) => {
                let current = self.name(id).unwrap_or_default();
                if current == requested {
                    requested.to_owned()
                } else {
                    self.unique_child_name(p, requested)
                }
            }
            None => requested.to_owned(),
        };
        if let Some(node) = self.nodes.get_mut(&id) {
            node.name.clone_from(&name);
        }
        Ok(name)
    }

    /// Name for a child about to be added under `parent`.
    ///
    /// `requested` is returned unchanged when it is non-empty, not `_blank`,
    /// and unused by every current child. Otherwise a `<frame N>` name is
    /// synthesized, skipping names of current and previously removed
    /// children. The result depends only on the tree, so repeated calls on
    /// an unchanged tree agree.
    #[must_use]
    pub fn unique_child_name(&self, parent: FrameId, requested: &str) -> String {
        let Some(node) = self.nodes.get(&parent) else {
            return requested.to_owned();
        };
        if !requested.is_empty()
            && requested != "_blank"
            && self.child_by_name(parent, requested).is_none()
        {
            return requested.to_owned();
        }

        let taken = |candidate: &str| {
            node.retired_child_names.iter().any(|n| n == candidate)
                || node
                    .children
                    .iter()
                    .any(|c| self.name(*c).is_some_and(|n| n == candidate))
        };
        let mut n = node.children.len() + 1;
        loop {
            let candidate = format!("<frame {n}>");
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    #[must_use]
    pub fn child_by_name(&self, parent: FrameId, name: &str) -> Option<FrameId> {
        self.nodes
            .get(&parent)?
            .children
            .iter()
            .copied()
            .find(|c| self.name(*c) == Some(name))
    }

    // -----------------------------------------------------------------------
    // Structure queries
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn parent(&self, id: FrameId) -> Option<FrameId> {
        self.nodes.get(&id)?.parent
    }

    #[must_use]
    pub fn children(&self, id: FrameId) -> &[FrameId] {
        self.nodes.get(&id).map_or(&[], |n| n.children.as_slice())
    }

    #[must_use]
    pub fn child_count(&self, id: FrameId) -> usize {
        self.children(id).len()
    }

    #[must_use]
    pub fn first_child(&self, id: FrameId) -> Option<FrameId> {
        self.children(id).first().copied()
    }

    #[must_use]
    pub fn last_child(&self, id: FrameId) -> Option<FrameId> {
        self.children(id).last().copied()
    }

    fn sibling_index(&self, id: FrameId) -> Option<(FrameId, usize)> {
        let parent = self.parent(id)?;
        let index = self.children(parent).iter().position(|c| *c == id)?;
        Some((parent, index))
    }

    #[must_use]
    pub fn next_sibling(&self, id: FrameId) -> Option<FrameId> {
        let (parent, index) = self.sibling_index(id)?;
        self.children(parent).get(index + 1).copied()
    }

    #[must_use]
    pub fn previous_sibling(&self, id: FrameId) -> Option<FrameId> {
        let (parent, index) = self.sibling_index(id)?;
        index
            .checked_sub(1)
            .and_then(|i| self.children(parent).get(i).copied())
    }

    /// Root of the tree containing `id`.
    #[must_use]
    pub fn top(&self, id: FrameId) -> FrameId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    #[must_use]
    pub fn is_descendant_of(&self, id: FrameId, ancestor: FrameId) -> bool {
        if !self.contains(id) || !self.contains(ancestor) {
            return false;
        }
        let mut current = Some(id);
        while let Some(f) = current {
            if f == ancestor {
                return true;
            }
            current = self.parent(f);
        }
        false
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Append `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: FrameId, child: FrameId) -> Result<(), FrameTreeError> {
        self.node(parent)?;
        if self.node(child)?.parent.is_some() {
            return Err(FrameTreeError::AlreadyAttached(child));
        }
        if self.is_descendant_of(parent, child) {
            return Err(FrameTreeError::WouldCycle { parent, child });
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        Ok(())
    }

    /// Unlink `child` from `parent`. The child keeps its own subtree.
    pub fn remove_child(&mut self, parent: FrameId, child: FrameId) -> Result<(), FrameTreeError> {
        self.node(child)?;
        let node = self
            .nodes
            .get_mut(&parent)
            .ok_or(FrameTreeError::UnknownFrame(parent))?;
        let index = node
            .children
            .iter()
            .position(|c| *c == child)
            .ok_or(FrameTreeError::NotAChild { parent, child })?;
        node.children.remove(index);
        let retired = self.name(child).unwrap_or_default().to_owned();
        if let Some(node) = self.nodes.get_mut(&parent)
            && !retired.is_empty()
        {
            node.retired_child_names.push(retired);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = None;
        }
        Ok(())
    }

    /// Detach `root` if needed and drop it with all its descendants.
    /// Returns the removed ids in pre-order.
    pub fn remove_subtree(&mut self, root: FrameId) -> Result<Vec<FrameId>, FrameTreeError> {
        self.node(root)?;
        if let Some(parent) = self.parent(root) {
            self.remove_child(parent, root)?;
        }
        let mut removed = Vec::new();
        let mut current = Some(root);
        while let Some(id) = current {
            removed.push(id);
            current = self.traverse_next(id, Some(root));
        }
        for id in &removed {
            self.nodes.remove(id);
        }
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Traversal
    // -----------------------------------------------------------------------

    /// Next frame in pre-order, never leaving `stay_within`'s subtree.
    #[must_use]
    pub fn traverse_next(&self, id: FrameId, stay_within: Option<FrameId>) -> Option<FrameId> {
        if let Some(child) = self.first_child(id) {
            return Some(child);
        }
        if Some(id) == stay_within {
            return None;
        }
        let mut frame = id;
        loop {
            if let Some(sibling) = self.next_sibling(frame) {
                return Some(sibling);
            }
            let parent = self.parent(frame)?;
            if Some(parent) == stay_within {
                return None;
            }
            frame = parent;
        }
    }

    /// Pre-order successor, wrapping to the root after the last frame.
    #[must_use]
    pub fn traverse_next_with_wrap(&self, id: FrameId, wrap: bool) -> Option<FrameId> {
        if !self.contains(id) {
            return None;
        }
        self.traverse_next(id, None)
            .or_else(|| wrap.then(|| self.top(id)))
    }

    /// Pre-order predecessor, wrapping from the root to the deepest last frame.
    #[must_use]
    pub fn traverse_previous_with_wrap(&self, id: FrameId, wrap: bool) -> Option<FrameId> {
        if !self.contains(id) {
            return None;
        }
        if let Some(previous) = self.previous_sibling(id) {
            return Some(self.deep_last_child(previous));
        }
        if let Some(parent) = self.parent(id) {
            return Some(parent);
        }
        wrap.then(|| self.deep_last_child(id))
    }

    /// Last frame of `id`'s subtree in pre-order.
    #[must_use]
    pub fn deep_last_child(&self, id: FrameId) -> FrameId {
        let mut result = id;
        while let Some(last) = self.last_child(result) {
            result = last;
        }
        result
    }

    /// Resolve a target name as seen from `from`.
    ///
    /// Handles `_self`/`_current`/empty, `_top`, `_parent`, and `_blank`
    /// (never a frame), then searches `from`'s subtree, then the whole tree.
    #[must_use]
    pub fn find(&self, from: FrameId, name: &str) -> Option<FrameId> {
        if !self.contains(from) {
            return None;
        }
        match name {
            "" | "_self" | "_current" => return Some(from),
            "_top" => return Some(self.top(from)),
            "_parent" => return Some(self.parent(from).unwrap_or(from)),
            "_blank" => return None,
            _ => {}
        }
        let search = |start: FrameId, within: Option<FrameId>| {
            let mut current = Some(start);
            while let Some(f) = current {
                if self.name(f) == Some(name) {
                    return Some(f);
                }
                current = self.traverse_next(f, within);
            }
            None
        };
        search(from, Some(from)).or_else(|| search(self.top(from), None))
    }

    /// All frames of `root`'s tree in pre-order.
    #[must_use]
    pub fn descendants_inclusive(&self, root: FrameId) -> Vec<FrameId> {
        let mut out = Vec::new();
        let mut current = self.contains(root).then_some(root);
        while let Some(f) = current {
            out.push(f);
            current = self.traverse_next(f, Some(root));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// main
    ///  ├─ a
    ///  │   └─ a1
    ///  └─ b
    fn sample() -> (FrameTree, [FrameId; 4]) {
        let mut tree = FrameTree::new();
        let main = tree.create_frame("main");
        let a = tree.create_frame("a");
        let a1 = tree.create_frame("a1");
        let b = tree.create_frame("b");
        tree.append_child(main, a).unwrap();
        tree.append_child(a, a1).unwrap();
        tree.append_child(main, b).unwrap();
        (tree, [main, a, a1, b])
    }

    #[test]
    fn pre_order_traversal() {
        let (tree, [main, a, a1, b]) = sample();
        assert_eq!(tree.traverse_next(main, None), Some(a));
        assert_eq!(tree.traverse_next(a, None), Some(a1));
        assert_eq!(tree.traverse_next(a1, None), Some(b));
        assert_eq!(tree.traverse_next(b, None), None);
        assert_eq!(tree.descendants_inclusive(main), vec![main, a, a1, b]);
    }

    #[test]
    fn stay_within_bounds_traversal() {
        let (tree, [_, a, a1, _]) = sample();
        assert_eq!(tree.traverse_next(a, Some(a)), Some(a1));
        assert_eq!(tree.traverse_next(a1, Some(a)), None);
    }

    #[test]
    fn wrap_both_directions() {
        let (tree, [main, a, a1, b]) = sample();
        assert_eq!(tree.traverse_next_with_wrap(b, true), Some(main));
        assert_eq!(tree.traverse_next_with_wrap(b, false), None);
        assert_eq!(tree.traverse_previous_with_wrap(main, true), Some(b));
        assert_eq!(tree.traverse_previous_with_wrap(main, false), None);
        assert_eq!(tree.traverse_previous_with_wrap(b, false), Some(a1));
        assert_eq!(tree.traverse_previous_with_wrap(a1, false), Some(a));
    }

    #[test]
    fn unique_names() {
        let (mut tree, [main, ..]) = sample();
        assert_eq!(tree.unique_child_name(main, "fresh"), "fresh");
        assert_eq!(tree.unique_child_name(main, "a"), "<frame 3>");
        assert_eq!(tree.unique_child_name(main, ""), "<frame 3>");
        assert_eq!(tree.unique_child_name(main, "_blank"), "<frame 3>");

        let synthesized = tree.create_frame("<frame 3>");
        tree.append_child(main, synthesized).unwrap();
        assert_eq!(tree.unique_child_name(main, ""), "<frame 4>");

        tree.remove_child(main, synthesized).unwrap();
        // Retired names stay reserved.
        assert_eq!(tree.unique_child_name(main, ""), "<frame 4>");
    }

    #[test]
    fn set_name_disambiguates_against_siblings() {
        let (mut tree, [_, a, _, b]) = sample();
        let renamed = tree.set_name(b, "a").unwrap();
        assert_ne!(renamed, "a");
        assert_eq!(tree.name(b), Some(renamed.as_str()));
        assert_eq!(tree.set_name(a, "a").unwrap(), "a");
    }

    #[test]
    fn structural_errors() {
        let (mut tree, [main, a, a1, b]) = sample();
        assert_eq!(tree.append_child(b, a), Err(FrameTreeError::AlreadyAttached(a)));
        assert_eq!(
            tree.remove_child(b, a),
            Err(FrameTreeError::NotAChild { parent: b, child: a })
        );
        tree.remove_child(main, a).unwrap();
        assert_eq!(
            tree.append_child(a1, a),
            Err(FrameTreeError::WouldCycle { parent: a1, child: a })
        );
        let ghost = FrameId(999);
        assert_eq!(tree.append_child(main, ghost), Err(FrameTreeError::UnknownFrame(ghost)));
    }

    #[test]
    fn remove_keeps_sibling_links_consistent() {
        let (mut tree, [main, a, a1, b]) = sample();
        tree.remove_child(main, a).unwrap();
        assert_eq!(tree.first_child(main), Some(b));
        assert_eq!(tree.last_child(main), Some(b));
        assert_eq!(tree.previous_sibling(b), None);
        assert_eq!(tree.parent(a), None);
        assert_eq!(tree.parent(a1), Some(a));
    }

    #[test]
    fn remove_subtree_drops_descendants() {
        let (mut tree, [main, a, a1, b]) = sample();
        let removed = tree.remove_subtree(a).unwrap();
        assert_eq!(removed, vec![a, a1]);
        assert!(!tree.contains(a1));
        assert_eq!(tree.children(main), &[b]);
    }

    #[test]
    fn find_resolves_keywords_and_names() {
        let (tree, [main, a, a1, b]) = sample();
        assert_eq!(tree.find(a1, "_self"), Some(a1));
        assert_eq!(tree.find(a1, "_parent"), Some(a));
        assert_eq!(tree.find(main, "_parent"), Some(main));
        assert_eq!(tree.find(a1, "_top"), Some(main));
        assert_eq!(tree.find(a1, "_blank"), None);
        assert_eq!(tree.find(a1, "b"), Some(b));
        assert_eq!(tree.find(main, "missing"), None);
    }

    #[test]
    fn is_descendant_of_is_inclusive() {
        let (tree, [main, a, a1, b]) = sample();
        assert!(tree.is_descendant_of(a1, main));
        assert!(tree.is_descendant_of(a, a));
        assert!(!tree.is_descendant_of(b, a));
    }
}
