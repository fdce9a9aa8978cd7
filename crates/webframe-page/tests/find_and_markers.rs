#![forbid(unsafe_code)]

//! Find-in-page and text-match markers.
//!
//! Verifies:
//! 1. Repeated finds walk matches forward or backward from the selection
//!    and wrap only when asked.
//! 2. Case sensitivity and starting inside the selection change which match
//!    is found.
//! 3. A found match is selected and scrolled to the middle of the view.
//! 4. Frames rendered outside their owner's flow only count visible matches.
//! 5. Marking respects the limit; unmarking removes only text matches.
//! 6. Page-level finds continue into the next frame in tree order, focus
//!    the frame holding the match, and wrap back to the main frame.
//! 7. Page-level marking totals every frame and shares one limit.
//!
//! Run:
//!   cargo test -p webframe-page --test find_and_markers

use webframe_core::geometry::{IntPoint, IntRect, IntSize};
use webframe_harness::{PageFixture, Subframe, TestDocument};
use webframe_page::{
    Document, FindOptions, MarkerKind, NodeId, Position, Range, VisibleSelection,
};

fn text(fixture: &PageFixture, content: &str, y: i32) -> NodeId {
    fixture
        .document
        .append_text(TestDocument::BODY, content, IntPoint::new(0, y))
}

fn span(node: NodeId, start: u32, end: u32) -> Range {
    Range::new(Position::new(node, start), Position::new(node, end))
}

fn selected(fixture: &PageFixture) -> Option<Range> {
    fixture.frame.selection().selection().to_range()
}

fn with_child(fixture: &PageFixture, content: &str) -> (Subframe, NodeId) {
    let child = fixture
        .add_subframe(IntRect::new(0, 100, 300, 200), "child")
        .expect("subframe");
    let t = child
        .document
        .append_text(TestDocument::BODY, content, IntPoint::new(0, 0));
    (child, t)
}

fn focused_id(fixture: &PageFixture) -> Option<webframe_page::FrameId> {
    fixture.page.focus_controller().focused_frame().map(|f| f.id())
}

fn find(fixture: &PageFixture, target: &str, options: FindOptions) -> bool {
    fixture.frame.find_string(target, options)
}

fn backward() -> FindOptions {
    FindOptions {
        forward: false,
        ..FindOptions::default()
    }
}

// ---------------------------------------------------------------------------
// Find
// ---------------------------------------------------------------------------

#[test]
fn repeated_finds_walk_forward_and_wrap() {
    let fixture = PageFixture::new();
    let t = text(&fixture, "cat dog cat", 0);

    assert!(find(&fixture, "cat", FindOptions::default()));
    assert_eq!(selected(&fixture), Some(span(t, 0, 3)));
    assert!(find(&fixture, "cat", FindOptions::default()));
    assert_eq!(selected(&fixture), Some(span(t, 8, 11)));
    assert!(find(&fixture, "cat", FindOptions::default()));
    assert_eq!(selected(&fixture), Some(span(t, 0, 3)));
}

#[test]
fn without_wrap_the_last_match_is_the_end() {
    let fixture = PageFixture::new();
    text(&fixture, "cat dog cat", 0);
    let once = FindOptions {
        wrap: false,
        ..FindOptions::default()
    };

    assert!(find(&fixture, "cat", once));
    assert!(find(&fixture, "cat", once));
    let last = selected(&fixture);

    assert!(!find(&fixture, "cat", once));
    assert_eq!(selected(&fixture), last);
}

#[test]
fn backward_finds_start_from_the_end() {
    let fixture = PageFixture::new();
    let t = text(&fixture, "cat dog cat", 0);

    find(&fixture, "cat", backward());
    assert_eq!(selected(&fixture), Some(span(t, 8, 11)));
    find(&fixture, "cat", backward());
    assert_eq!(selected(&fixture), Some(span(t, 0, 3)));
}

#[test]
fn matches_span_text_nodes_in_document_order() {
    let fixture = PageFixture::new();
    let first = text(&fixture, "one needle", 0);
    let second = text(&fixture, "two needle", 20);

    find(&fixture, "needle", FindOptions::default());
    assert_eq!(selected(&fixture), Some(span(first, 4, 10)));
    find(&fixture, "needle", FindOptions::default());
    assert_eq!(selected(&fixture), Some(span(second, 4, 10)));
}

#[test]
fn case_sensitivity_is_optional() {
    let fixture = PageFixture::new();
    let t = text(&fixture, "Cat dog cat", 0);

    find(&fixture, "cat", FindOptions::default());
    assert_eq!(selected(&fixture), Some(span(t, 0, 3)));

    fixture.frame.clear_selection();
    let exact = FindOptions {
        case_sensitive: true,
        ..FindOptions::default()
    };
    find(&fixture, "cat", exact);
    assert_eq!(selected(&fixture), Some(span(t, 8, 11)));
}

#[test]
fn starting_in_the_selection_can_match_inside_it() {
    let fixture = PageFixture::new();
    let t = text(&fixture, "cat dog cat", 0);
    fixture
        .frame
        .set_selection(VisibleSelection::from_range(span(t, 0, 7)), false);

    let inside = FindOptions {
        start_in_selection: true,
        ..FindOptions::default()
    };
    find(&fixture, "cat", inside);
    assert_eq!(selected(&fixture), Some(span(t, 0, 3)));

    // The selection is now exactly the match, so the search moves past it.
    find(&fixture, "cat", inside);
    assert_eq!(selected(&fixture), Some(span(t, 8, 11)));
}

#[test]
fn empty_or_missing_targets_find_nothing() {
    let fixture = PageFixture::new();
    text(&fixture, "cat dog cat", 0);

    assert!(!find(&fixture, "", FindOptions::default()));
    assert!(!find(&fixture, "bird", FindOptions::default()));
    assert_eq!(selected(&fixture), None);
}

#[test]
fn found_match_is_centered_in_the_view() {
    let fixture = PageFixture::new();
    fixture.document.set_document_size(IntSize::new(800, 2000));
    let t = text(&fixture, "far away", 1500);
    fixture.layout();

    assert!(find(&fixture, "far", FindOptions::default()));

    assert_eq!(selected(&fixture), Some(span(t, 0, 3)));
    // Match is 16px tall at y=1500; the view is 600px tall.
    assert_eq!(
        fixture.view().map(|v| v.scroll_offset()),
        Some(IntSize::new(0, 1500 + 8 - 300))
    );
    assert_eq!(fixture.frame.selection_bounds(), Some(IntRect::new(0, 1500, 25, 16)));
}

#[test]
fn disconnected_frames_skip_offscreen_matches() {
    let fixture = PageFixture::new();
    text(&fixture, "cat", 1000);
    let visible = text(&fixture, "cat", 0);
    fixture.frame.set_is_disconnected(true);

    assert!(find(&fixture, "cat", FindOptions::default()));

    assert_eq!(selected(&fixture), Some(span(visible, 0, 3)));
}

// ---------------------------------------------------------------------------
// Find across frames
// ---------------------------------------------------------------------------

#[test]
fn page_find_moves_into_the_child_and_wraps_back() {
    let fixture = PageFixture::new();
    let main_text = text(&fixture, "cat", 0);
    let (child, child_text) = with_child(&fixture, "cat");
    let page = &fixture.page;

    assert!(page.find_string("cat", FindOptions::default()));
    assert_eq!(selected(&fixture), Some(span(main_text, 0, 3)));
    assert_eq!(focused_id(&fixture), Some(fixture.frame.id()));

    assert!(page.find_string("cat", FindOptions::default()));
    assert_eq!(child.frame.selection().selection().to_range(), Some(span(child_text, 0, 3)));
    assert_eq!(selected(&fixture), None);
    assert_eq!(focused_id(&fixture), Some(child.frame.id()));

    assert!(page.find_string("cat", FindOptions::default()));
    assert_eq!(selected(&fixture), Some(span(main_text, 0, 3)));
    assert_eq!(child.frame.selection().selection().to_range(), None);
    assert_eq!(focused_id(&fixture), Some(fixture.frame.id()));
}

#[test]
fn page_find_without_wrap_stops_after_the_last_frame() {
    let fixture = PageFixture::new();
    text(&fixture, "cat", 0);
    let (child, child_text) = with_child(&fixture, "cat");
    let once = FindOptions {
        wrap: false,
        ..FindOptions::default()
    };

    assert!(fixture.page.find_string("cat", once));
    assert!(fixture.page.find_string("cat", once));
    assert!(!fixture.page.find_string("cat", once));

    assert_eq!(child.frame.selection().selection().to_range(), Some(span(child_text, 0, 3)));
    assert_eq!(focused_id(&fixture), Some(child.frame.id()));
}

#[test]
fn page_find_backward_wraps_from_the_main_frame_to_the_last_child() {
    let fixture = PageFixture::new();
    let main_text = text(&fixture, "cat", 0);
    let (child, child_text) = with_child(&fixture, "cat");

    assert!(fixture.page.find_string("cat", backward()));
    assert_eq!(selected(&fixture), Some(span(main_text, 0, 3)));

    assert!(fixture.page.find_string("cat", backward()));
    assert_eq!(child.frame.selection().selection().to_range(), Some(span(child_text, 0, 3)));
    assert_eq!(focused_id(&fixture), Some(child.frame.id()));
}

#[test]
fn page_find_wraps_within_the_start_frame_when_others_have_nothing() {
    let fixture = PageFixture::new();
    let t = text(&fixture, "cat dog cat", 0);
    with_child(&fixture, "dog");

    assert!(fixture.page.find_string("cat", FindOptions::default()));
    assert!(fixture.page.find_string("cat", FindOptions::default()));
    assert_eq!(selected(&fixture), Some(span(t, 8, 11)));

    assert!(fixture.page.find_string("cat", FindOptions::default()));
    assert_eq!(selected(&fixture), Some(span(t, 0, 3)));
    assert_eq!(focused_id(&fixture), Some(fixture.frame.id()));
}

#[test]
fn page_find_of_nothing_keeps_focus() {
    let fixture = PageFixture::new();
    text(&fixture, "cat", 0);
    with_child(&fixture, "dog");

    assert!(!fixture.page.find_string("", FindOptions::default()));
    assert!(!fixture.page.find_string("bird", FindOptions::default()));
    assert_eq!(focused_id(&fixture), None);
}

// ---------------------------------------------------------------------------
// Markers
// ---------------------------------------------------------------------------

#[test]
fn page_marking_totals_every_frame() {
    let fixture = PageFixture::new();
    text(&fixture, "cat cat", 0);
    let (child, _) = with_child(&fixture, "cat");

    assert_eq!(fixture.page.mark_all_matches_for_text("cat", false, 0), 3);
    assert_eq!(child.document.markers().len(), 1);

    fixture.page.unmark_all_text_matches();
    assert!(fixture.document.markers().is_empty());
    assert!(child.document.markers().is_empty());
}

#[test]
fn page_marking_shares_one_limit_across_frames() {
    let fixture = PageFixture::new();
    text(&fixture, "cat cat", 0);
    let (child, _) = with_child(&fixture, "cat cat");

    assert_eq!(fixture.page.mark_all_matches_for_text("cat", false, 3), 3);
    assert_eq!(fixture.document.markers().len(), 2);
    assert_eq!(child.document.markers().len(), 1);
}

#[test]
fn mark_all_marks_every_match() {
    let fixture = PageFixture::new();
    let t = text(&fixture, "a cat, a cat, a cat", 0);

    assert_eq!(fixture.frame.mark_all_matches_for_text("cat", false, 0), 3);

    let markers = fixture.document.markers();
    assert_eq!(markers.len(), 3);
    assert_eq!(markers[0], (span(t, 2, 5), MarkerKind::TextMatch));
}

#[test]
fn mark_all_stops_at_the_limit() {
    let fixture = PageFixture::new();
    text(&fixture, "a cat, a cat, a cat", 0);

    assert_eq!(fixture.frame.mark_all_matches_for_text("cat", false, 2), 2);
    assert_eq!(fixture.document.markers().len(), 2);
}

#[test]
fn mark_all_counts_only_visible_matches_when_disconnected() {
    let fixture = PageFixture::new();
    text(&fixture, "cat", 0);
    text(&fixture, "cat", 1000);

    fixture.frame.set_is_disconnected(true);
    assert_eq!(fixture.frame.mark_all_matches_for_text("cat", false, 0), 1);

    fixture.frame.unmark_all_text_matches();
    fixture.frame.set_is_disconnected(false);
    assert_eq!(fixture.frame.mark_all_matches_for_text("cat", false, 0), 2);
}

#[test]
fn unmarking_leaves_other_markers() {
    let fixture = PageFixture::new();
    let t = text(&fixture, "cat", 0);
    fixture.document.add_marker(&span(t, 0, 3), MarkerKind::Spelling);
    fixture.frame.mark_all_matches_for_text("cat", false, 0);

    fixture.frame.unmark_all_text_matches();

    assert_eq!(fixture.document.markers(), vec![(span(t, 0, 3), MarkerKind::Spelling)]);
}

#[test]
fn toggling_highlighting_repaints_once_and_keeps_markers() {
    let fixture = PageFixture::new();
    text(&fixture, "cat", 0);
    fixture.frame.mark_all_matches_for_text("cat", false, 0);
    fixture.settle();
    fixture.chrome.clear();
    let visible = fixture.view().expect("view").visible_content_rect();
    assert!(!fixture.frame.mark_text_matches_enabled());

    fixture.frame.set_mark_text_matches_enabled(true);
    fixture.frame.set_mark_text_matches_enabled(true);
    fixture.settle();

    assert!(fixture.frame.mark_text_matches_enabled());
    assert_eq!(fixture.chrome.invalidated_rects(), vec![visible]);

    fixture.frame.set_mark_text_matches_enabled(false);
    assert_eq!(fixture.document.markers().len(), 1);
}
