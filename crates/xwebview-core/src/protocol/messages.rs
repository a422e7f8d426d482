//! Server → browser text messages.
//!
//! Every text message is a tag, a colon and a compact JSON object:
//!
//! ```text
//! MONITOR:{"x":0,"y":0,"w":1920,"h":1080}
//! GETREADY:{"x":10,"y":20,"w":300,"h":200,"length":4711}
//! ```
//!
//! `MONITOR` is sent once per active output right after a viewer connects.
//! `GETREADY` announces the rectangle and byte length of the binary message
//! that follows it on the same connection.  The browser relies on the field
//! order shown above only for readability; it parses the JSON by key.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::region::Rect;

const MONITOR_TAG: &str = "MONITOR";
const GETREADY_TAG: &str = "GETREADY";

/// Errors produced while rendering or parsing a [`ServerMessage`].
#[derive(Debug, Error)]
pub enum MessageError {
    /// The text has no `TAG:` prefix or the tag is not recognised.
    #[error("unknown server message tag in {0:?}")]
    UnknownTag(String),

    /// The JSON body could not be serialised or deserialised.
    #[error("invalid message body: {0}")]
    Json(#[from] serde_json::Error),
}

/// One active display output (a RandR CRTC with a non-zero width).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputInfo {
    pub x: i16,
    pub y: i16,
    pub w: u16,
    pub h: u16,
}

impl OutputInfo {
    /// The output's area as a [`Rect`].
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h)
    }
}

impl From<Rect> for OutputInfo {
    fn from(r: Rect) -> Self {
        Self {
            x: r.x,
            y: r.y,
            w: r.width,
            h: r.height,
        }
    }
}

/// Header announcing the binary frame that follows it.
///
/// `length` is always the exact byte count of that binary message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMetadata {
    pub x: i16,
    pub y: i16,
    pub w: u16,
    pub h: u16,
    pub length: usize,
}

impl FrameMetadata {
    /// Builds the metadata for a compressed frame of `length` bytes covering
    /// `rect`.
    pub fn for_frame(rect: Rect, length: usize) -> Self {
        Self {
            x: rect.x,
            y: rect.y,
            w: rect.width,
            h: rect.height,
            length,
        }
    }

    /// The rectangle this frame covers.
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h)
    }
}

/// Every text message the server can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMessage {
    /// Describes one display output.
    Monitor(OutputInfo),
    /// Announces the next binary frame.
    GetReady(FrameMetadata),
}

impl ServerMessage {
    /// Renders the message in its `TAG:{json}` wire form.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Json`] if serialisation fails, which cannot
    /// happen for these plain integer structs but is still propagated.
    pub fn to_text(&self) -> Result<String, MessageError> {
        let (tag, body) = match self {
            Self::Monitor(info) => (MONITOR_TAG, serde_json::to_string(info)?),
            Self::GetReady(meta) => (GETREADY_TAG, serde_json::to_string(meta)?),
        };
        Ok(format!("{tag}:{body}"))
    }

    /// Parses a `TAG:{json}` text message.
    ///
    /// The server never receives these; the parser exists so tests and
    /// tooling can check what went over the wire.
    ///
    /// # Errors
    ///
    /// [`MessageError::UnknownTag`] for a missing or unknown tag,
    /// [`MessageError::Json`] for a malformed body.
    pub fn parse(text: &str) -> Result<Self, MessageError> {
        let (tag, body) = text
            .split_once(':')
            .ok_or_else(|| MessageError::UnknownTag(text.to_string()))?;
        match tag {
            MONITOR_TAG => Ok(Self::Monitor(serde_json::from_str(body)?)),
            GETREADY_TAG => Ok(Self::GetReady(serde_json::from_str(body)?)),
            _ => Err(MessageError::UnknownTag(tag.to_string())),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_text_format() {
        // Arrange
        let msg = ServerMessage::Monitor(OutputInfo {
            x: 1920,
            y: 0,
            w: 1280,
            h: 1024,
        });

        // Act
        let text = msg.to_text().unwrap();

        // Assert
        assert_eq!(text, r#"MONITOR:{"x":1920,"y":0,"w":1280,"h":1024}"#);
    }

    #[test]
    fn test_getready_text_format_has_length_last() {
        let meta = FrameMetadata::for_frame(Rect::new(10, 20, 300, 200), 4711);
        let text = ServerMessage::GetReady(meta).to_text().unwrap();
        assert_eq!(
            text,
            r#"GETREADY:{"x":10,"y":20,"w":300,"h":200,"length":4711}"#
        );
    }

    #[test]
    fn test_negative_origin_is_rendered_signed() {
        let msg = ServerMessage::Monitor(OutputInfo::from(Rect::new(-1280, 0, 1280, 720)));
        assert_eq!(
            msg.to_text().unwrap(),
            r#"MONITOR:{"x":-1280,"y":0,"w":1280,"h":720}"#
        );
    }

    #[test]
    fn test_parse_getready() {
        let parsed =
            ServerMessage::parse(r#"GETREADY:{"x":1,"y":2,"w":3,"h":4,"length":5}"#).unwrap();
        assert_eq!(
            parsed,
            ServerMessage::GetReady(FrameMetadata {
                x: 1,
                y: 2,
                w: 3,
                h: 4,
                length: 5
            })
        );
    }

    #[test]
    fn test_parse_unknown_tag_is_error() {
        let result = ServerMessage::parse(r#"HELLO:{"x":1}"#);
        assert!(matches!(result, Err(MessageError::UnknownTag(t)) if t == "HELLO"));
    }

    #[test]
    fn test_parse_without_colon_is_error() {
        assert!(matches!(
            ServerMessage::parse("MONITOR"),
            Err(MessageError::UnknownTag(_))
        ));
    }

    #[test]
    fn test_parse_bad_json_is_error() {
        assert!(matches!(
            ServerMessage::parse("MONITOR:{not json}"),
            Err(MessageError::Json(_))
        ));
    }

    #[test]
    fn test_metadata_rect_matches_source() {
        let rect = Rect::new(7, 8, 9, 10);
        assert_eq!(FrameMetadata::for_frame(rect, 0).rect(), rect);
    }
}
