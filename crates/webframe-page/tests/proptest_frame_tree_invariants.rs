#![forbid(unsafe_code)]

//! Property-based invariant tests for the frame tree arena.
//!
//! 1. Parent and child links agree, and no frame is listed twice
//! 2. Sibling names stay unique through adds, renames, and removals
//! 3. Pre-order traversal from the root visits every frame exactly once
//! 4. Wrapped previous-traversal inverts wrapped next-traversal
//! 5. Every frame name resolves to a frame carrying that name
//!
//! Run:
//!   cargo test -p webframe-page --test proptest_frame_tree_invariants

use std::collections::HashSet;

use proptest::prelude::*;
use webframe_page::{FrameId, FrameTree};

const NAMES: &[&str] = &["", "a", "b", "_blank", "<frame 2>", "<frame 3>"];

#[derive(Debug, Clone)]
enum Op {
    Add { parent: usize, name: usize },
    Rename { frame: usize, name: usize },
    Remove(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0usize..32, 0..NAMES.len()).prop_map(|(parent, name)| Op::Add { parent, name }),
        2 => (0usize..32, 0..NAMES.len()).prop_map(|(frame, name)| Op::Rename { frame, name }),
        1 => (1usize..32).prop_map(Op::Remove),
    ]
}

/// Live frames in creation order; index 0 is always the root.
fn live(tree: &FrameTree, root: FrameId) -> Vec<FrameId> {
    let mut frames = tree.descendants_inclusive(root);
    frames.sort();
    frames
}

fn apply(tree: &mut FrameTree, root: FrameId, op: &Op) {
    let frames = live(tree, root);
    match op {
        Op::Add { parent, name } => {
            let parent = frames[parent % frames.len()];
            let name = tree.unique_child_name(parent, NAMES[*name]);
            let child = tree.create_frame(name);
            tree.append_child(parent, child).expect("fresh frame attaches");
        }
        Op::Rename { frame, name } => {
            let frame = frames[frame % frames.len()];
            tree.set_name(frame, NAMES[*name]).expect("live frame renames");
        }
        Op::Remove(index) => {
            if frames.len() > 1 {
                let target = frames[1 + index % (frames.len() - 1)];
                tree.remove_subtree(target).expect("live subtree removes");
            }
        }
    }
}

fn check(tree: &FrameTree, root: FrameId) -> Result<(), TestCaseError> {
    let order = tree.descendants_inclusive(root);
    let unique: HashSet<FrameId> = order.iter().copied().collect();
    prop_assert_eq!(unique.len(), order.len(), "pre-order repeated a frame");
    prop_assert_eq!(order.len(), tree.len(), "pre-order missed frames");
    prop_assert_eq!(order.first().copied(), Some(root));

    for &frame in &order {
        prop_assert_eq!(tree.top(frame), root);
        let mut names = HashSet::new();
        for &child in tree.children(frame) {
            prop_assert_eq!(tree.parent(child), Some(frame));
            let name = tree.name(child).unwrap_or_default();
            prop_assert!(names.insert(name.to_owned()), "duplicate sibling name {:?}", name);
        }
    }

    for pair in order.windows(2) {
        prop_assert_eq!(tree.traverse_next_with_wrap(pair[0], false), Some(pair[1]));
        prop_assert_eq!(tree.traverse_previous_with_wrap(pair[1], false), Some(pair[0]));
    }
    if let Some(&last) = order.last() {
        prop_assert_eq!(tree.traverse_next_with_wrap(last, true), Some(root));
        prop_assert_eq!(tree.traverse_previous_with_wrap(root, true), Some(last));
        prop_assert_eq!(tree.deep_last_child(root), last);
    }

    for &frame in &order {
        let name = tree.name(frame).unwrap_or_default().to_owned();
        if name.is_empty() || name.starts_with('_') {
            continue;
        }
        let found = tree.find(root, &name);
        prop_assert!(found.is_some(), "{:?} did not resolve", name);
        prop_assert_eq!(found.and_then(|f| tree.name(f)), Some(name.as_str()));
    }
    Ok(())
}

proptest! {
    #[test]
    fn structure_and_names_hold_under_edits(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut tree = FrameTree::new();
        let root = tree.create_frame("main");
        for op in &ops {
            apply(&mut tree, root, op);
            check(&tree, root)?;
        }
    }

    #[test]
    fn removing_a_subtree_drops_exactly_its_frames(
        ops in prop::collection::vec(op_strategy(), 1..40),
        pick in 1usize..32,
    ) {
        let mut tree = FrameTree::new();
        let root = tree.create_frame("main");
        for op in &ops {
            apply(&mut tree, root, op);
        }
        let frames = live(&tree, root);
        prop_assume!(frames.len() > 1);
        let target = frames[1 + pick % (frames.len() - 1)];
        let expected = tree.descendants_inclusive(target);
        let before = tree.len();

        let removed = tree.remove_subtree(target).expect("live subtree removes");

        prop_assert_eq!(&removed, &expected);
        prop_assert_eq!(tree.len(), before - removed.len());
        for id in &removed {
            prop_assert!(!tree.contains(*id));
        }
        check(&tree, root)?;
    }

    #[test]
    fn child_names_are_stable_on_an_unchanged_tree(
        ops in prop::collection::vec(op_strategy(), 1..40),
        requested in 0..NAMES.len(),
    ) {
        let mut tree = FrameTree::new();
        let root = tree.create_frame("main");
        for op in &ops {
            apply(&mut tree, root, op);
        }
        let first = tree.unique_child_name(root, NAMES[requested]);
        let second = tree.unique_child_name(root, NAMES[requested]);
        prop_assert_eq!(&first, &second);
        prop_assert!(tree.child_by_name(root, &first).is_none());
    }
}
