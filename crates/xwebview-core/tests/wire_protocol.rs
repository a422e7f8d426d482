//! Integration tests for the xwebview-core public API.
//!
//! These tests drive the pieces together the way the server does: parse an
//! inbound message, translate it and resolve its KeySym; take a dirty region,
//! encode a frame for it and build the `GETREADY` header that announces it.

use std::io::Read;

use xwebview_core::{
    translate, ButtonAction, DirtyRegion, FrameEncoder, FrameMetadata, InputCommand, InputEvent,
    KeyAddress, KeyMapper, ParseError, Rect, ServerMessage,
};

fn key_of(text: &str) -> (KeyAddress, ButtonAction) {
    let event = InputEvent::parse(text).expect("message must parse");
    match translate(&event).expect("event must translate") {
        InputCommand::Key { key, action } => (key, action),
        other => panic!("expected a key command, got {other:?}"),
    }
}

#[test]
fn test_key_down_letter_presses_literal() {
    let (key, action) = key_of("2:0:10:20:a");
    assert_eq!(key, KeyAddress::Literal('a'));
    assert_eq!(action, ButtonAction::Press);
}

#[test]
fn test_key_down_space_presses_named_space() {
    let (key, _) = key_of("2:0:10:20: ");
    assert_eq!(key, KeyAddress::Named("space".to_string()));
    assert_eq!(KeyMapper::resolve(&key), Some(0x20));
}

#[test]
fn test_key_down_exclamation_presses_hex_code() {
    let (key, _) = key_of("2:0:10:20:!");
    assert_eq!(key.to_string(), "0x0021");
}

#[test]
fn test_key_up_named_key_releases() {
    let (key, action) = key_of("3:0:0:0:Control_L");
    assert_eq!(action, ButtonAction::Release);
    assert_eq!(KeyMapper::resolve(&key), Some(0xFFE3));
}

#[test]
fn test_shipped_client_mouse_message() {
    // Arrange: what the browser sends for a left click at (640, 360)
    let event = InputEvent::parse("0:1:640:360").unwrap();

    // Act
    let cmd = translate(&event).unwrap();

    // Assert
    assert_eq!(
        cmd,
        InputCommand::Pointer {
            x: 640,
            y: 360,
            button: 1,
            action: ButtonAction::Press
        }
    );
}

#[test]
fn test_malformed_messages_are_rejected() {
    for text in ["", "garbage", "9:0:0:0:a", "2:0:0:0", "0:x:1:1", "1:1:1"] {
        assert!(InputEvent::parse(text).is_err(), "{text:?} should not parse");
    }
    assert_eq!(InputEvent::parse("2:0:0:0"), Err(ParseError::MissingToken));
}

#[test]
fn test_getready_length_matches_encoded_payload() {
    // Arrange: a burst of damage coalesced into one region
    let mut region = DirtyRegion::new();
    region.merge(Rect::new(10, 10, 40, 30));
    region.merge(Rect::new(30, 20, 40, 30));
    let rect = region.take().unwrap();
    let pixels = vec![0x7Fu8; rect.area() * 4];

    // Act
    let payload = FrameEncoder::new().encode(&pixels).unwrap();
    let header = ServerMessage::GetReady(FrameMetadata::for_frame(rect, payload.len()))
        .to_text()
        .unwrap();

    // Assert: the header describes exactly the region and the payload
    match ServerMessage::parse(&header).unwrap() {
        ServerMessage::GetReady(meta) => {
            assert_eq!(meta.rect(), Rect::new(10, 10, 60, 40));
            assert_eq!(meta.length, payload.len());
        }
        other => panic!("expected GETREADY, got {other:?}"),
    }

    let mut decoded = Vec::new();
    lz4_flex::frame::FrameDecoder::new(&payload[..])
        .read_to_end(&mut decoded)
        .unwrap();
    assert_eq!(decoded, pixels);
}
