#![forbid(unsafe_code)]

//! Wheel dispatch and scrolling.
//!
//! Verifies:
//! 1. `mousewheel` goes to the node under the pointer (shadow content to
//!    its host) before anything scrolls.
//! 2. Line deltas scroll the nearest overflow box by pixels, one axis at a
//!    time.
//! 3. A prevented `mousewheel` scrolls nothing but still counts as handled.
//! 4. With no overflow box to move, the view scrolls.
//! 5. A subframe under the pointer gets the wheel first.
//!
//! Run:
//!   cargo test -p webframe-page --test wheel_scrolling

use webframe_core::event::{PlatformWheelEvent, WheelGranularity};
use webframe_core::geometry::{IntPoint, IntRect, IntSize};
use webframe_harness::{DocCall, PageFixture, TestDocument, LINE_STEP};
use webframe_page::{EventType, NodeId, ScrollDirection, ScrollGranularity};

fn scroll_box(fixture: &PageFixture, max: IntSize) -> NodeId {
    let node = fixture
        .document
        .append_element(TestDocument::BODY, "div", Some(IntRect::new(0, 0, 200, 200)));
    fixture.document.set_scroll_box(node, max);
    node
}

#[test]
fn wheel_dispatches_then_scrolls_the_overflow_box() {
    let fixture = PageFixture::new();
    let node = scroll_box(&fixture, IntSize::new(0, 300));

    let accepted = fixture.driver().wheel(IntPoint::new(10, 10), 0.0, -1.0);

    assert!(accepted);
    let wheel = fixture
        .document
        .events()
        .into_iter()
        .find(|e| e.event_type == EventType::MouseWheel)
        .expect("mousewheel");
    assert_eq!(wheel.target, node);
    assert_eq!(fixture.document.scroll_offset(node), Some(IntSize::new(0, LINE_STEP)));
    assert!(fixture.document.calls().contains(&DocCall::Scroll {
        node,
        direction: ScrollDirection::Down,
        granularity: ScrollGranularity::Pixel,
        multiplier: 40.0,
    }));
}

#[test]
fn each_axis_scrolls_on_its_own() {
    let fixture = PageFixture::new();
    let node = scroll_box(&fixture, IntSize::new(100, 0));

    // Only the horizontal axis can move; the event is still accepted.
    assert!(fixture.driver().wheel(IntPoint::new(10, 10), -2.0, -1.0));

    assert_eq!(fixture.document.scroll_offset(node), Some(IntSize::new(80, 0)));
}

#[test]
fn prevented_wheel_scrolls_nothing() {
    let fixture = PageFixture::new();
    let node = scroll_box(&fixture, IntSize::new(0, 300));
    fixture.document.prevent_default(EventType::MouseWheel, node);

    assert!(fixture.driver().wheel(IntPoint::new(10, 10), 0.0, -1.0));

    assert_eq!(fixture.document.scroll_offset(node), Some(IntSize::default()));
}

#[test]
fn view_scrolls_when_no_box_can() {
    let fixture = PageFixture::new();
    fixture.document.set_document_size(IntSize::new(800, 2000));
    fixture.layout();
    let view = fixture.view().expect("view");

    assert!(fixture.driver().wheel(IntPoint::new(400, 300), 0.0, -2.0));
    assert_eq!(view.scroll_offset(), IntSize::new(0, 80));

    assert!(fixture.driver().wheel(IntPoint::new(400, 300), 0.0, 1.0));
    assert_eq!(view.scroll_offset(), IntSize::new(0, 40));
}

#[test]
fn wheel_with_nowhere_to_go_is_not_accepted() {
    let fixture = PageFixture::new();
    fixture.layout();

    assert!(!fixture.driver().wheel(IntPoint::new(400, 300), 0.0, 1.0));
    assert_eq!(fixture.document.count_of(EventType::MouseWheel), 1);
}

#[test]
fn shadow_content_wheels_at_its_host() {
    let fixture = PageFixture::new();
    let host = fixture
        .document
        .append_element(TestDocument::BODY, "textarea", Some(IntRect::new(0, 0, 200, 100)));
    let root = fixture
        .document
        .attach_shadow_root(host, Some(IntRect::new(0, 0, 200, 100)));
    fixture
        .document
        .append_element(root, "div", Some(IntRect::new(0, 0, 200, 100)));

    fixture.driver().wheel(IntPoint::new(10, 10), 0.0, -1.0);

    let wheel = fixture
        .document
        .events()
        .into_iter()
        .find(|e| e.event_type == EventType::MouseWheel)
        .expect("mousewheel");
    assert_eq!(wheel.target, host);
}

#[test]
fn subframe_under_the_pointer_scrolls_first() {
    let fixture = PageFixture::new();
    let child = fixture
        .add_subframe(IntRect::new(300, 300, 200, 100), "scroller")
        .expect("subframe");
    child.document.set_scroll_box(TestDocument::BODY, IntSize::new(0, 100));

    assert!(fixture.driver().wheel(IntPoint::new(350, 320), 0.0, -1.0));

    assert_eq!(child.document.count_of(EventType::MouseWheel), 1);
    assert_eq!(fixture.document.count_of(EventType::MouseWheel), 0);
    assert_eq!(
        child.document.scroll_offset(TestDocument::BODY),
        Some(IntSize::new(0, LINE_STEP))
    );
}

#[test]
fn pixel_granularity_scrolls_exact_deltas() {
    let fixture = PageFixture::new();
    let node = scroll_box(&fixture, IntSize::new(0, 300));
    let event = PlatformWheelEvent::new(IntPoint::new(10, 10), 0.0, -15.0)
        .with_granularity(WheelGranularity::Pixel);

    assert!(fixture.frame.event_handler().handle_wheel_event(&event));

    assert_eq!(fixture.document.scroll_offset(node), Some(IntSize::new(0, 15)));
}
