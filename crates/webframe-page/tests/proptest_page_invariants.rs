#![forbid(unsafe_code)]

//! Property-based invariant tests for repaint coalescing, hover tracking,
//! click synthesis, and layout scheduling on a live page.
//!
//! 1. Pending repaint rects never exceed the union threshold, and every
//!    visible rect submitted stays covered until the flush delivers it
//! 2. `mouseover` and `mouseout` alternate, each `mouseout` leaving the
//!    node last entered
//! 3. `click` fires exactly for press/release pairs on the same node
//! 4. Any sequence of dirtying and scheduling settles to a clean tree
//!
//! Run:
//!   cargo test -p webframe-page --test proptest_page_invariants

use std::time::Duration;

use proptest::prelude::*;
use webframe_core::event::MouseButton;
use webframe_core::geometry::{IntPoint, IntRect};
use webframe_harness::{PageFixture, TestDocument};
use webframe_page::{EventType, NodeId, RenderTree};

const A: IntRect = IntRect::new(0, 0, 100, 100);
const B: IntRect = IntRect::new(200, 0, 100, 100);

fn two_boxes(fixture: &PageFixture) -> (NodeId, NodeId) {
    let a = fixture.document.append_element(TestDocument::BODY, "div", Some(A));
    let b = fixture.document.append_element(TestDocument::BODY, "div", Some(B));
    (a, b)
}

fn expected_target(point: IntPoint, a: NodeId, b: NodeId) -> NodeId {
    if A.contains_point(point) {
        a
    } else if B.contains_point(point) {
        b
    } else {
        TestDocument::BODY
    }
}

fn point_strategy() -> impl Strategy<Value = IntPoint> {
    (0i32..400, 0i32..200).prop_map(|(x, y)| IntPoint::new(x, y))
}

fn rect_strategy() -> impl Strategy<Value = IntRect> {
    (-100i32..1000, -100i32..800, 1i32..120, 1i32..120).prop_map(|(x, y, w, h)| IntRect::new(x, y, w, h))
}

// ============================================================================
// Repaint coalescing
// ============================================================================

proptest! {
    #[test]
    fn pending_rects_stay_bounded_and_cover_submissions(
        rects in prop::collection::vec(rect_strategy(), 1..80),
    ) {
        let fixture = PageFixture::new();
        let view = fixture.view().expect("view");
        let visible = view.visible_content_rect();
        let threshold = fixture.page.config().repaint.union_threshold;
        let mut submitted = Vec::new();

        view.begin_deferred_repaints();
        for rect in &rects {
            view.repaint_content_rectangle(*rect, false);
            if rect.intersects(&visible) {
                submitted.push(*rect);
            }
            let pending = view.pending_repaint_rects();
            prop_assert!(pending.len() <= threshold, "{} pending rects", pending.len());
            for done in &submitted {
                prop_assert!(
                    pending.iter().any(|p| p.contains_rect(done)),
                    "{:?} lost from {:?}", done, pending
                );
            }
        }
        let pending = view.pending_repaint_rects();
        view.end_deferred_repaints();

        prop_assert_eq!(fixture.chrome.invalidated_rects(), pending);
        prop_assert!(view.pending_repaint_rects().is_empty());
    }
}

// ============================================================================
// Hover and click
// ============================================================================

proptest! {
    #[test]
    fn over_and_out_alternate(points in prop::collection::vec(point_strategy(), 1..40)) {
        let fixture = PageFixture::new();
        let (a, b) = two_boxes(&fixture);
        let mut driver = fixture.driver();
        for point in &points {
            driver.move_to(*point);
        }

        let transitions: Vec<(EventType, NodeId)> = fixture
            .document
            .dispatched()
            .into_iter()
            .filter(|(t, _)| matches!(t, EventType::MouseOver | EventType::MouseOut))
            .collect();

        let mut entered: Option<NodeId> = None;
        for (event_type, node) in &transitions {
            match event_type {
                EventType::MouseOver => {
                    prop_assert!(entered.is_none(), "entered {:?} without leaving {:?}", node, entered);
                    entered = Some(*node);
                }
                _ => {
                    prop_assert_eq!(entered, Some(*node));
                    entered = None;
                }
            }
        }
        let last = points.last().copied().map(|p| expected_target(p, a, b));
        prop_assert_eq!(entered, last);
        prop_assert_eq!(fixture.frame.event_handler().node_under_mouse(), last);
    }

    #[test]
    fn click_needs_press_and_release_on_one_node(
        pairs in prop::collection::vec((point_strategy(), point_strategy()), 1..20),
    ) {
        let fixture = PageFixture::new();
        let (a, b) = two_boxes(&fixture);
        let mut driver = fixture.driver();
        let mut expected = 0;

        for (down, up) in &pairs {
            driver.press(MouseButton::Left, *down);
            driver.release(MouseButton::Left, *up);
            // Keep pairs apart so counts never span them.
            driver.advance(Duration::from_secs(1));
            if expected_target(*down, a, b) == expected_target(*up, a, b) {
                expected += 1;
            }
        }

        prop_assert_eq!(fixture.document.count_of(EventType::Click), expected);
        prop_assert_eq!(fixture.document.count_of(EventType::DblClick), 0);
    }
}

// ============================================================================
// Layout settling
// ============================================================================

#[derive(Debug, Clone)]
enum LayoutOp {
    Dirty(usize),
    Schedule,
    ScheduleSubtree(usize),
    Advance(u64),
}

fn layout_op_strategy() -> impl Strategy<Value = LayoutOp> {
    prop_oneof![
        3 => (0usize..8).prop_map(LayoutOp::Dirty),
        2 => Just(LayoutOp::Schedule),
        2 => (0usize..8).prop_map(LayoutOp::ScheduleSubtree),
        2 => (0u64..60).prop_map(LayoutOp::Advance),
    ]
}

proptest! {
    #[test]
    fn scheduling_settles_to_a_clean_tree(
        ops in prop::collection::vec(layout_op_strategy(), 1..50),
        delay in 0u64..40,
    ) {
        let fixture = PageFixture::new();
        fixture.document.set_minimum_layout_delay(Duration::from_millis(delay));
        let mut nodes = vec![TestDocument::HTML, TestDocument::BODY];
        for i in 0..3 {
            let outer = fixture
                .document
                .append_element(TestDocument::BODY, "div", Some(IntRect::new(0, i * 100, 300, 90)));
            let inner = fixture
                .document
                .append_element(outer, "div", Some(IntRect::new(10, i * 100 + 10, 100, 30)));
            nodes.extend([outer, inner]);
        }
        fixture.layout();
        let view = fixture.view().expect("view");
        let mut last_count = view.layout_count();

        for op in &ops {
            match op {
                LayoutOp::Dirty(i) => {
                    let node = nodes[i % nodes.len()];
                    fixture.document.set_needs_layout(node, true);
                    fixture.document.mark_containing_blocks_for_layout(node, None);
                }
                LayoutOp::Schedule => view.schedule_relayout(),
                LayoutOp::ScheduleSubtree(i) => view.schedule_relayout_of_subtree(nodes[i % nodes.len()]),
                LayoutOp::Advance(ms) => {
                    fixture.event_loop.advance_by(Duration::from_millis(*ms));
                }
            }
            prop_assert!(!view.is_mid_layout());
            prop_assert!(view.layout_count() >= last_count);
            last_count = view.layout_count();
        }

        view.schedule_relayout();
        fixture.settle();

        prop_assert!(!view.layout_pending());
        prop_assert!(!view.needs_layout());
        for node in &nodes {
            prop_assert!(!fixture.document.needs_layout(*node), "{:?} still dirty", node);
        }
    }
}
