#![forbid(unsafe_code)]

//! Keyboard dispatch: the keydown / keypress split, access keys, editing,
//! and the default scrolling bindings.
//!
//! Verifies:
//! 1. A platform key down becomes `keydown` then `keypress`, and the key up
//!    a `keyup`, all at the focused node or the body.
//! 2. A swallowed `keydown` suppresses `keypress`, except in compatibility
//!    mode where the `keypress` goes out pre-prevented.
//! 3. Access keys need the access-key modifiers and pre-prevent the
//!    `keydown`.
//! 4. Typing into editable content reaches the editor through `textInput`;
//!    Enter and Shift-Enter insert a paragraph and a line break.
//! 5. Arrow, page, and space keys scroll the overflow box around the focus,
//!    or the view when there is none.
//!
//! Run:
//!   cargo test -p webframe-page --test keyboard_dispatch

use webframe_core::config::EngineConfig;
use webframe_core::event::{Modifiers, PlatformKeyboardEvent};
use webframe_core::geometry::{IntPoint, IntRect, IntSize};
use webframe_harness::{DocCall, EditCommand, PageFixture, TestDocument};
use webframe_page::{EventType, NodeId};

fn focused_box(fixture: &PageFixture) -> NodeId {
    let node = fixture
        .document
        .append_element(TestDocument::BODY, "div", Some(IntRect::new(0, 0, 200, 200)));
    fixture.document.set_focusable(node, true);
    node
}

/// Editable box with a line of text, clicked so the caret sits inside.
fn editable_box(fixture: &PageFixture) -> NodeId {
    let node = focused_box(fixture);
    fixture.document.set_editable(node, true);
    let text = fixture.document.append_text(node, "abc", IntPoint::new(0, 0));
    let at = fixture.document.point_in_text(text, 1).expect("text box");
    fixture.driver().click(at);
    fixture.document.clear_log();
    node
}

fn tall_page(fixture: &PageFixture) {
    fixture.document.set_document_size(IntSize::new(800, 2000));
    fixture.layout();
}

// ---------------------------------------------------------------------------
// Sequencing
// ---------------------------------------------------------------------------

#[test]
fn key_down_splits_into_keydown_and_keypress() {
    let fixture = PageFixture::new();
    let driver = fixture.driver();

    driver.type_text("a");

    assert_eq!(
        fixture.document.dispatched(),
        vec![
            (EventType::KeyDown, TestDocument::BODY),
            (EventType::KeyPress, TestDocument::BODY),
            (EventType::KeyUp, TestDocument::BODY),
        ]
    );
    let keypress = fixture
        .document
        .events()
        .into_iter()
        .find(|e| e.event_type == EventType::KeyPress)
        .expect("keypress");
    assert_eq!(keypress.key().map(|k| k.text.as_str()), Some("a"));
    let offered: Vec<_> = fixture.editor.key_events.borrow().iter().map(|(t, _)| *t).collect();
    assert_eq!(offered, vec![EventType::KeyDown, EventType::KeyPress]);
}

#[test]
fn keys_target_the_focused_node() {
    let fixture = PageFixture::new();
    let node = focused_box(&fixture);
    fixture.driver().click(IntPoint::new(10, 10));
    fixture.document.clear_log();

    fixture.driver().type_text("x");

    assert!(fixture.document.dispatched().iter().all(|(_, target)| *target == node));
}

#[test]
fn keys_without_text_send_no_keypress() {
    let fixture = PageFixture::new();

    fixture.driver().press_key("Left", "", 37);

    assert_eq!(fixture.document.dispatched_types(), vec![EventType::KeyDown, EventType::KeyUp]);
}

#[test]
fn swallowed_keydown_suppresses_keypress() {
    let fixture = PageFixture::new();
    fixture.document.prevent_default(EventType::KeyDown, TestDocument::BODY);

    let swallowed = fixture
        .driver()
        .key(PlatformKeyboardEvent::key_down("a", "U+0041", 65));

    assert!(swallowed);
    assert_eq!(fixture.document.count_of(EventType::KeyPress), 0);
}

#[test]
fn compat_mode_sends_a_prevented_keypress() {
    let mut config = EngineConfig::default();
    config.keyboard.needs_keypress_compat_mode = true;
    let fixture = PageFixture::with_config(config);
    fixture.document.prevent_default(EventType::KeyDown, TestDocument::BODY);

    fixture
        .driver()
        .key(PlatformKeyboardEvent::key_down("a", "U+0041", 65));

    let keypress = fixture
        .document
        .events()
        .into_iter()
        .find(|e| e.event_type == EventType::KeyPress)
        .expect("keypress in compat mode");
    assert!(keypress.default_prevented);
    assert!(fixture.editor.commands.borrow().is_empty());
}

#[test]
fn editor_client_can_take_the_keydown() {
    let fixture = PageFixture::new();
    fixture.editor.handles_keys.set(true);

    assert!(fixture.driver().key(PlatformKeyboardEvent::key_down("a", "U+0041", 65)));
    assert_eq!(fixture.document.count_of(EventType::KeyPress), 0);
}

#[test]
fn input_method_keydown_is_pre_handled() {
    let fixture = PageFixture::new();
    fixture.editor.input_method_takes.set(true);

    assert!(fixture.driver().key(PlatformKeyboardEvent::key_down("a", "U+0041", 65)));

    let events = fixture.document.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].default_handled);
    assert_eq!(events[0].key().map(|k| k.windows_virtual_key_code), Some(229));
}

// ---------------------------------------------------------------------------
// Access keys
// ---------------------------------------------------------------------------

#[test]
fn access_key_runs_with_alt_held() {
    let fixture = PageFixture::new();
    let link = fixture
        .document
        .append_element(TestDocument::BODY, "a", Some(IntRect::new(0, 0, 50, 20)));
    fixture.document.set_access_key("k", link);
    let mut driver = fixture.driver();

    driver.press_key("U+004B", "k", 75);
    assert!(!fixture.document.calls().contains(&DocCall::AccessKey(link)));

    driver.set_modifiers(Modifiers::ALT);
    fixture.document.clear_log();
    driver.press_key("U+004B", "k", 75);

    assert!(fixture.document.calls().contains(&DocCall::AccessKey(link)));
    let keydown = fixture
        .document
        .events()
        .into_iter()
        .find(|e| e.event_type == EventType::KeyDown)
        .expect("keydown");
    assert!(keydown.default_prevented);
    assert_eq!(fixture.document.count_of(EventType::KeyPress), 0);
}

#[test]
fn input_method_keydown_is_not_pre_prevented_by_an_access_key() {
    let fixture = PageFixture::new();
    let link = fixture
        .document
        .append_element(TestDocument::BODY, "a", Some(IntRect::new(0, 0, 50, 20)));
    fixture.document.set_access_key("k", link);
    fixture.editor.input_method_takes.set(true);
    let mut driver = fixture.driver();
    driver.set_modifiers(Modifiers::ALT);

    driver.press_key("U+004B", "k", 75);

    assert!(fixture.document.calls().contains(&DocCall::AccessKey(link)));
    let keydown = fixture
        .document
        .events()
        .into_iter()
        .find(|e| e.event_type == EventType::KeyDown)
        .expect("keydown");
    assert!(keydown.default_handled);
    assert!(!keydown.default_prevented);
}

#[test]
fn access_key_ignores_shift_and_case() {
    let fixture = PageFixture::new();
    let link = fixture
        .document
        .append_element(TestDocument::BODY, "a", Some(IntRect::new(0, 0, 50, 20)));
    fixture.document.set_access_key("k", link);
    let mut driver = fixture.driver();
    driver.set_modifiers(Modifiers::ALT | Modifiers::SHIFT);

    driver.press_key("U+004B", "K", 75);

    assert!(fixture.document.calls().contains(&DocCall::AccessKey(link)));
}

// ---------------------------------------------------------------------------
// Editing
// ---------------------------------------------------------------------------

#[test]
fn typing_into_editable_content_inserts_text() {
    let fixture = PageFixture::new();
    let node = editable_box(&fixture);

    let swallowed = fixture.driver().type_text("hi");

    assert_eq!(swallowed, 2);
    assert_eq!(fixture.editor.typed_text(), "hi");
    let inputs: Vec<_> = fixture
        .document
        .events()
        .into_iter()
        .filter(|e| e.event_type == EventType::TextInput)
        .collect();
    assert_eq!(inputs.len(), 2);
    assert!(inputs.iter().all(|e| e.target == node));
    assert_eq!(inputs[0].text().map(|t| t.data.as_str()), Some("h"));
}

#[test]
fn enter_inserts_paragraphs_and_shift_enter_line_breaks() {
    let fixture = PageFixture::new();
    editable_box(&fixture);
    let mut driver = fixture.driver();
    let frame = fixture.frame.id();

    driver.press_key("Enter", "\r", 13);
    driver.set_modifiers(Modifiers::SHIFT);
    driver.press_key("Enter", "\r", 13);

    assert_eq!(
        *fixture.editor.commands.borrow(),
        vec![EditCommand::ParagraphSeparator(frame), EditCommand::LineBreak(frame)]
    );
}

#[test]
fn prevented_text_input_reaches_no_editor() {
    let fixture = PageFixture::new();
    let node = editable_box(&fixture);
    fixture.document.prevent_default(EventType::TextInput, node);

    fixture.driver().type_text("q");

    assert_eq!(fixture.document.count_of(EventType::TextInput), 1);
    assert!(fixture.editor.commands.borrow().is_empty());
}

#[test]
fn typing_outside_editable_content_inserts_nothing() {
    let fixture = PageFixture::new();

    fixture.driver().type_text("abc");

    assert_eq!(fixture.document.count_of(EventType::TextInput), 0);
    assert!(fixture.editor.commands.borrow().is_empty());
}

#[test]
fn design_mode_makes_the_frame_editable() {
    let fixture = PageFixture::new();
    fixture.document.set_design_mode(true);
    let text = fixture
        .document
        .append_text(TestDocument::BODY, "abc", IntPoint::new(0, 300));
    let at = fixture.document.point_in_text(text, 0).expect("text box");
    fixture.driver().click(at);

    fixture.driver().type_text("z");

    assert_eq!(fixture.editor.typed_text(), "z");
}

// ---------------------------------------------------------------------------
// Scrolling keys
// ---------------------------------------------------------------------------

#[test]
fn arrow_keys_scroll_the_focused_overflow_box() {
    let fixture = PageFixture::new();
    let node = focused_box(&fixture);
    fixture.document.set_scroll_box(node, IntSize::new(0, 500));
    fixture.driver().click(IntPoint::new(10, 10));

    fixture.driver().press_key("Down", "", 40);
    fixture.driver().press_key("Down", "", 40);
    fixture.driver().press_key("Up", "", 38);

    assert_eq!(fixture.document.scroll_offset(node), Some(IntSize::new(0, 40)));
    assert_eq!(fixture.view().map(|v| v.scroll_offset()), Some(IntSize::default()));
}

#[test]
fn page_keys_scroll_the_view_without_an_overflow_box() {
    let fixture = PageFixture::new();
    tall_page(&fixture);
    let view = fixture.view().expect("view");

    fixture.driver().press_key("PageDown", "", 34);
    // 600 high, minus an eighth kept for context.
    assert_eq!(view.scroll_offset(), IntSize::new(0, 525));

    fixture.driver().press_key("End", "", 35);
    assert_eq!(view.scroll_offset(), IntSize::new(0, 1400));

    fixture.driver().press_key("Home", "", 36);
    assert_eq!(view.scroll_offset(), IntSize::new(0, 0));
}

#[test]
fn space_pages_and_shift_space_pages_back() {
    let fixture = PageFixture::new();
    tall_page(&fixture);
    let view = fixture.view().expect("view");
    let mut driver = fixture.driver();

    driver.press_key("U+0020", " ", 32);
    assert_eq!(view.scroll_offset(), IntSize::new(0, 525));

    driver.set_modifiers(Modifiers::SHIFT);
    driver.press_key("U+0020", " ", 32);
    assert_eq!(view.scroll_offset(), IntSize::new(0, 0));
}

#[test]
fn modified_arrows_do_not_scroll() {
    let fixture = PageFixture::new();
    tall_page(&fixture);
    let mut driver = fixture.driver();
    driver.set_modifiers(Modifiers::CTRL);

    assert!(!driver.press_key("Down", "", 40));
    assert_eq!(fixture.view().map(|v| v.scroll_offset()), Some(IntSize::default()));
}
