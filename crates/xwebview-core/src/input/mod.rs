//! Translation of parsed input events into local injection commands.
//!
//! # How keys are addressed (for beginners)
//!
//! A key token from the browser can mean three different things:
//!
//! - a punctuation or symbol character such as `!` or `[`, which is safest to
//!   address by its numeric code point because its printable name differs
//!   between keyboard layouts;
//! - a *named* key such as `Return` or `Shift_L`;
//! - a plain character such as `a`.
//!
//! [`translate`] picks one of the three [`KeyAddress`] forms by looking at
//! the token.  The rules are applied in a fixed order:
//!
//! 1. first character in `!`..=`@`, `[`..=`` ` `` or at/after `{` → [`KeyAddress::Code`]
//! 2. token is exactly one space → [`KeyAddress::Named`]`("space")`
//! 3. token longer than one character → [`KeyAddress::Named`]
//! 4. otherwise → [`KeyAddress::Literal`]
//!
//! Rule 1 runs before rule 3 so a token starting with punctuation is never
//! mistaken for a key name.  Digits fall in the `!`..=`@` range and are
//! addressed by code as well.
//!
//! Resolving a [`KeyAddress`] to an X11 KeySym is the job of
//! [`crate::keymap`]; this module performs no table lookups.

use std::fmt;

use crate::protocol::input::{EventKind, InputEvent};

/// Whether a button or key goes down or comes up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonAction {
    Press,
    Release,
}

impl ButtonAction {
    pub fn is_press(self) -> bool {
        self == Self::Press
    }
}

/// How a key is identified for injection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyAddress {
    /// A Unicode code point, rendered as `0x%04x`.
    Code(u32),
    /// An X11 key name such as `Return` or `space`.
    Named(String),
    /// A single plain character.
    Literal(char),
}

impl fmt::Display for KeyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(cp) => write!(f, "0x{cp:04x}"),
            Self::Named(name) => f.write_str(name),
            Self::Literal(c) => write!(f, "{c}"),
        }
    }
}

/// One local input action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    /// Move the pointer to `(x, y)`, then press or release `button`.
    Pointer {
        x: i32,
        y: i32,
        button: u8,
        action: ButtonAction,
    },
    /// Press or release a key.
    Key { key: KeyAddress, action: ButtonAction },
}

impl fmt::Display for InputCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pointer {
                x,
                y,
                button,
                action,
            } => {
                let verb = if action.is_press() { "down" } else { "up" };
                write!(f, "move {x},{y} button {button} {verb}")
            }
            Self::Key { key, action } => {
                let verb = if action.is_press() { "down" } else { "up" };
                write!(f, "key {key} {verb}")
            }
        }
    }
}

/// Translates one parsed event into exactly one command.
///
/// Returns `None` only for a key event with an empty token, which
/// [`InputEvent::parse`] never produces.
pub fn translate(event: &InputEvent) -> Option<InputCommand> {
    let action = if event.kind.is_press() {
        ButtonAction::Press
    } else {
        ButtonAction::Release
    };

    match event.kind {
        EventKind::MouseDown | EventKind::MouseUp => Some(InputCommand::Pointer {
            x: event.x,
            y: event.y,
            button: event.button,
            action,
        }),
        EventKind::KeyDown | EventKind::KeyUp => {
            key_address(&event.token).map(|key| InputCommand::Key { key, action })
        }
    }
}

/// Classifies a key token.  See the module docs for the rule order.
pub fn key_address(token: &str) -> Option<KeyAddress> {
    let mut chars = token.chars();
    let first = chars.next()?;

    if addressed_by_code(first) {
        return Some(KeyAddress::Code(u32::from(first)));
    }
    if token == " " {
        return Some(KeyAddress::Named("space".to_string()));
    }
    if chars.next().is_some() {
        return Some(KeyAddress::Named(token.to_string()));
    }
    Some(KeyAddress::Literal(first))
}

fn addressed_by_code(c: char) -> bool {
    ('!'..='@').contains(&c) || ('['..='`').contains(&c) || c >= '{'
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn key_event(kind: EventKind, token: &str) -> InputEvent {
        InputEvent {
            kind,
            button: 0,
            x: 10,
            y: 20,
            token: token.to_string(),
        }
    }

    #[test]
    fn test_plain_letter_is_literal() {
        // Arrange
        let ev = key_event(EventKind::KeyDown, "a");

        // Act
        let cmd = translate(&ev).unwrap();

        // Assert
        assert_eq!(
            cmd,
            InputCommand::Key {
                key: KeyAddress::Literal('a'),
                action: ButtonAction::Press
            }
        );
    }

    #[test]
    fn test_single_space_is_named_space() {
        let cmd = translate(&key_event(EventKind::KeyDown, " ")).unwrap();
        assert_eq!(
            cmd,
            InputCommand::Key {
                key: KeyAddress::Named("space".to_string()),
                action: ButtonAction::Press
            }
        );
    }

    #[test]
    fn test_exclamation_is_addressed_by_hex_code() {
        let cmd = translate(&key_event(EventKind::KeyDown, "!")).unwrap();
        match cmd {
            InputCommand::Key { key, .. } => {
                assert_eq!(key, KeyAddress::Code(0x21));
                assert_eq!(key.to_string(), "0x0021");
            }
            other => panic!("expected key command, got {other:?}"),
        }
    }

    #[test]
    fn test_multi_char_token_is_named() {
        let cmd = translate(&key_event(EventKind::KeyUp, "Return")).unwrap();
        assert_eq!(
            cmd,
            InputCommand::Key {
                key: KeyAddress::Named("Return".to_string()),
                action: ButtonAction::Release
            }
        );
    }

    #[test]
    fn test_punctuation_rule_wins_over_name_rule() {
        // Starts with '[' so it is addressed by code even though it is long.
        assert_eq!(key_address("[abc"), Some(KeyAddress::Code(0x5b)));
    }

    #[test]
    fn test_range_boundaries() {
        assert_eq!(key_address("@"), Some(KeyAddress::Code(0x40)));
        assert_eq!(key_address("`"), Some(KeyAddress::Code(0x60)));
        assert_eq!(key_address("{"), Some(KeyAddress::Code(0x7b)));
        assert_eq!(key_address("~"), Some(KeyAddress::Code(0x7e)));
        assert_eq!(key_address("5"), Some(KeyAddress::Code(0x35)));
        assert_eq!(key_address("A"), Some(KeyAddress::Literal('A')));
        assert_eq!(key_address("Z"), Some(KeyAddress::Literal('Z')));
        assert_eq!(key_address("z"), Some(KeyAddress::Literal('z')));
    }

    #[test]
    fn test_non_ascii_character_is_addressed_by_code() {
        assert_eq!(key_address("é"), Some(KeyAddress::Code(0xe9)));
        assert_eq!(KeyAddress::Code(0x20ac).to_string(), "0x20ac");
    }

    #[test]
    fn test_empty_token_yields_nothing() {
        assert_eq!(translate(&key_event(EventKind::KeyDown, "")), None);
    }

    #[test]
    fn test_mouse_down_moves_then_presses() {
        let ev = InputEvent {
            kind: EventKind::MouseDown,
            button: 3,
            x: -40,
            y: 700,
            token: String::new(),
        };

        let cmd = translate(&ev).unwrap();

        assert_eq!(
            cmd,
            InputCommand::Pointer {
                x: -40,
                y: 700,
                button: 3,
                action: ButtonAction::Press
            }
        );
        assert_eq!(cmd.to_string(), "move -40,700 button 3 down");
    }

    #[test]
    fn test_mouse_up_releases() {
        let ev = InputEvent {
            kind: EventKind::MouseUp,
            button: 1,
            x: 0,
            y: 0,
            token: String::new(),
        };
        assert!(matches!(
            translate(&ev),
            Some(InputCommand::Pointer {
                action: ButtonAction::Release,
                ..
            })
        ));
    }
}
