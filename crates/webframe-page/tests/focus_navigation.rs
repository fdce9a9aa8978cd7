#![forbid(unsafe_code)]

//! Focus movement with Tab and with presses, across frames.
//!
//! Verifies:
//! 1. Tab and Shift-Tab walk focusable nodes in document order.
//! 2. Past the last node focus goes to the chrome when it will take it,
//!    and wraps to the first node otherwise.
//! 3. Focus descends into a subframe through its owner and climbs back out.
//! 4. Moving frame focus blurs the old window and focuses the new one.
//! 5. A focused editable root that refuses to end editing keeps focus.
//!
//! Run:
//!   cargo test -p webframe-page --test focus_navigation

use webframe_core::event::{MouseButton, PlatformKeyboardEvent};
use webframe_core::geometry::{IntPoint, IntRect};
use webframe_harness::{DocCall, PageFixture, Subframe, TestDocument};
use webframe_page::{Document, EventType, FocusDirection, NodeId};

struct Layout {
    a: NodeId,
    b: NodeId,
}

fn focusable(fixture: &PageFixture, rect: IntRect) -> NodeId {
    let node = fixture.document.append_element(TestDocument::BODY, "input", Some(rect));
    fixture.document.set_focusable(node, true);
    node
}

fn two_fields(fixture: &PageFixture) -> Layout {
    Layout {
        a: focusable(fixture, IntRect::new(0, 0, 100, 20)),
        b: focusable(fixture, IntRect::new(0, 40, 100, 20)),
    }
}

/// `a`, then a subframe holding one focusable node, then `b`.
fn fields_around_subframe(fixture: &PageFixture) -> (Layout, Subframe, NodeId) {
    let a = focusable(fixture, IntRect::new(0, 0, 100, 20));
    let child = fixture
        .add_subframe(IntRect::new(0, 100, 300, 200), "inner")
        .expect("subframe");
    let c = child
        .document
        .append_element(TestDocument::BODY, "input", Some(IntRect::new(10, 10, 100, 20)));
    child.document.set_focusable(c, true);
    let b = focusable(fixture, IntRect::new(0, 400, 100, 20));
    (Layout { a, b }, child, c)
}

fn focused_frame_id(fixture: &PageFixture) -> Option<webframe_page::FrameId> {
    fixture.page.focus_controller().focused_frame().map(|f| f.id())
}

// ---------------------------------------------------------------------------
// Tab order
// ---------------------------------------------------------------------------

#[test]
fn tab_walks_focusable_nodes_in_order() {
    let fixture = PageFixture::new();
    let fields = two_fields(&fixture);
    let driver = fixture.driver();

    assert!(driver.tab(false));
    assert_eq!(fixture.document.focused_node(), Some(fields.a));
    driver.tab(false);
    assert_eq!(fixture.document.focused_node(), Some(fields.b));
    driver.tab(true);
    assert_eq!(fixture.document.focused_node(), Some(fields.a));
    assert_eq!(fixture.document.count_of(EventType::KeyPress), 0);
}

#[test]
fn tab_wraps_when_the_chrome_declines_focus() {
    let fixture = PageFixture::new();
    let fields = two_fields(&fixture);
    let driver = fixture.driver();

    driver.tab(false);
    driver.tab(false);
    driver.tab(false);

    assert_eq!(fixture.document.focused_node(), Some(fields.a));
    assert!(fixture.chrome.focus_taken.borrow().is_empty());
}

#[test]
fn chrome_takes_focus_past_the_last_node() {
    let fixture = PageFixture::new();
    two_fields(&fixture);
    fixture.chrome.can_take_focus.set(true);
    let driver = fixture.driver();

    driver.tab(false);
    driver.tab(false);
    assert!(driver.tab(false));

    assert_eq!(*fixture.chrome.focus_taken.borrow(), vec![FocusDirection::Forward]);
    assert_eq!(fixture.document.focused_node(), None);
    assert_eq!(focused_frame_id(&fixture), None);
}

#[test]
fn shift_tab_from_nothing_focuses_the_last_node() {
    let fixture = PageFixture::new();
    let fields = two_fields(&fixture);

    fixture.driver().tab(true);

    assert_eq!(fixture.document.focused_node(), Some(fields.b));
}

#[test]
fn tab_is_content_in_design_mode() {
    let fixture = PageFixture::new();
    two_fields(&fixture);
    fixture.document.set_design_mode(true);

    fixture.driver().tab(false);

    assert_eq!(fixture.document.focused_node(), None);
    assert_eq!(fixture.document.count_of(EventType::KeyPress), 1);
}

#[test]
fn tab_does_nothing_when_the_page_opts_out() {
    let fixture = PageFixture::new();
    two_fields(&fixture);
    fixture.page.set_tab_key_cycles_through_elements(false);

    fixture.driver().tab(false);

    assert_eq!(fixture.document.focused_node(), None);
}

// ---------------------------------------------------------------------------
// Across frames
// ---------------------------------------------------------------------------

#[test]
fn tab_enters_and_leaves_a_subframe() {
    let fixture = PageFixture::new();
    let (fields, child, c) = fields_around_subframe(&fixture);
    let driver = fixture.driver();

    driver.tab(false);
    assert_eq!(fixture.document.focused_node(), Some(fields.a));

    driver.tab(false);
    assert_eq!(child.document.focused_node(), Some(c));
    assert_eq!(fixture.document.focused_node(), None);
    assert_eq!(focused_frame_id(&fixture), Some(child.frame.id()));

    // The next Tab starts from the focused subframe.
    child
        .frame
        .event_handler()
        .key_event(&PlatformKeyboardEvent::key_down("\t", "U+0009", 9));
    assert_eq!(fixture.document.focused_node(), Some(fields.b));
    assert_eq!(child.document.focused_node(), None);
    assert_eq!(focused_frame_id(&fixture), Some(fixture.frame.id()));
}

#[test]
fn shift_tab_enters_a_subframe_from_below() {
    let fixture = PageFixture::new();
    let (fields, child, c) = fields_around_subframe(&fixture);
    let driver = fixture.driver();

    driver.tab(true);
    assert_eq!(fixture.document.focused_node(), Some(fields.b));
    driver.tab(true);

    assert_eq!(child.document.focused_node(), Some(c));
}

#[test]
fn frame_focus_moves_window_focus() {
    let fixture = PageFixture::new();
    let (_, child, _) = fields_around_subframe(&fixture);
    let driver = fixture.driver();

    driver.tab(false);
    assert!(fixture.document.calls().contains(&DocCall::WindowEvent(EventType::Focus)));
    fixture.document.clear_log();

    driver.tab(false);
    assert!(fixture.document.calls().contains(&DocCall::WindowEvent(EventType::Blur)));
    assert!(child.document.calls().contains(&DocCall::WindowEvent(EventType::Focus)));
}

#[test]
fn pressing_in_a_subframe_focuses_that_frame() {
    let fixture = PageFixture::new();
    let (fields, child, _) = fields_around_subframe(&fixture);
    let mut driver = fixture.driver();

    driver.click(IntPoint::new(200, 250));
    assert_eq!(focused_frame_id(&fixture), Some(child.frame.id()));

    driver.click(IntPoint::new(10, 10));
    assert_eq!(focused_frame_id(&fixture), Some(fixture.frame.id()));
    assert_eq!(fixture.document.focused_node(), Some(fields.a));
    assert!(child.document.calls().contains(&DocCall::WindowEvent(EventType::Blur)));
}

// ---------------------------------------------------------------------------
// Editing roots
// ---------------------------------------------------------------------------

#[test]
fn editable_root_can_refuse_to_give_up_focus() {
    let fixture = PageFixture::new();
    let fields = two_fields(&fixture);
    fixture.document.set_editable(fields.a, true);
    let mut driver = fixture.driver();

    driver.click(IntPoint::new(10, 10));
    assert_eq!(fixture.document.focused_node(), Some(fields.a));

    fixture.editor.allow_end_editing.set(false);
    assert!(driver.press(MouseButton::Left, IntPoint::new(10, 50)));
    driver.release(MouseButton::Left, IntPoint::new(10, 50));
    assert_eq!(fixture.document.focused_node(), Some(fields.a));

    fixture.editor.allow_end_editing.set(true);
    driver.click(IntPoint::new(10, 50));
    assert_eq!(fixture.document.focused_node(), Some(fields.b));
}

#[test]
fn pressing_editable_content_enables_the_input_method() {
    let fixture = PageFixture::new();
    let fields = two_fields(&fixture);
    fixture.document.set_editable(fields.b, true);
    let mut driver = fixture.driver();

    driver.click(IntPoint::new(10, 10));
    driver.click(IntPoint::new(10, 50));

    assert_eq!(*fixture.editor.input_method_states.borrow(), vec![false, true]);
}
