//! Browser → server input messages.
//!
//! # Wire format
//!
//! ```text
//! kind:button:x:y:token
//! ```
//!
//! | Field    | Meaning                                                  |
//! |----------|----------------------------------------------------------|
//! | `kind`   | 0 = mouse down, 1 = mouse up, 2 = key down, 3 = key up   |
//! | `button` | pointer button, 1-based (ignored for key events)         |
//! | `x`, `y` | pointer position in root-window coordinates              |
//! | `token`  | key name or character (ignored for mouse events)         |
//!
//! The shipped browser client sends mouse events with only the first four
//! fields (`0:1:640:360`) and key events with zeroed pointer fields
//! (`2:0:0:0:Return`).  A four-field message is therefore valid for mouse
//! kinds and rejected for key kinds.
//!
//! The token is everything after the fourth colon, so `2:0:0:0::` presses
//! the colon key and `2:0:0:0: ` presses space.

use thiserror::Error;

/// Why an inbound text message was rejected.
///
/// None of these are reported to the client; the gateway logs them at debug
/// level and drops the message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected 4 or 5 fields, found {found}")]
    WrongFieldCount { found: usize },

    #[error("field `{field}` is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("unknown event kind {0}")]
    UnknownKind(u32),

    #[error("key event without a key token")]
    MissingToken,
}

/// The four kinds of input event the browser can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MouseDown,
    MouseUp,
    KeyDown,
    KeyUp,
}

impl EventKind {
    /// Maps the numeric wire code to a kind.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::MouseDown),
            1 => Some(Self::MouseUp),
            2 => Some(Self::KeyDown),
            3 => Some(Self::KeyUp),
            _ => None,
        }
    }

    /// The numeric wire code.
    pub fn code(self) -> u32 {
        match self {
            Self::MouseDown => 0,
            Self::MouseUp => 1,
            Self::KeyDown => 2,
            Self::KeyUp => 3,
        }
    }

    pub fn is_mouse(self) -> bool {
        matches!(self, Self::MouseDown | Self::MouseUp)
    }

    /// `true` for the "down" half of a press.
    pub fn is_press(self) -> bool {
        matches!(self, Self::MouseDown | Self::KeyDown)
    }
}

/// One parsed input message.
///
/// Built only by [`InputEvent::parse`] in production, which guarantees that
/// key events carry a non-empty `token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEvent {
    pub kind: EventKind,
    pub button: u8,
    pub x: i32,
    pub y: i32,
    /// Key name or character; empty for mouse events.
    pub token: String,
}

impl InputEvent {
    /// Parses one `kind:button:x:y[:token]` text message.
    ///
    /// # Errors
    ///
    /// See [`ParseError`].  A mouse event that carries a token is accepted and
    /// the token is discarded.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use xwebview_core::{EventKind, InputEvent};
    ///
    /// let ev = InputEvent::parse("2:0:0:0:Return").unwrap();
    /// assert_eq!(ev.kind, EventKind::KeyDown);
    /// assert_eq!(ev.token, "Return");
    /// ```
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let fields: Vec<&str> = text.splitn(5, ':').collect();
        if fields.len() < 4 {
            return Err(ParseError::WrongFieldCount {
                found: fields.len(),
            });
        }

        let code: u32 = parse_number("kind", fields[0])?;
        let kind = EventKind::from_code(code).ok_or(ParseError::UnknownKind(code))?;
        let button: u8 = parse_number("button", fields[1])?;
        let x: i32 = parse_number("x", fields[2])?;
        let y: i32 = parse_number("y", fields[3])?;

        let token = if kind.is_mouse() {
            String::new()
        } else {
            match fields.get(4) {
                Some(token) if !token.is_empty() => (*token).to_string(),
                _ => return Err(ParseError::MissingToken),
            }
        };

        Ok(Self {
            kind,
            button,
            x,
            y,
            token,
        })
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, ParseError> {
    raw.trim().parse().map_err(|_| ParseError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
