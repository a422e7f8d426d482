//! Input injection port and command execution.
//!
//! [`InputInjector`] is the capability interface the gateway drives: one
//! operation per kind of input.  [`execute`] turns a translated
//! [`InputCommand`] into calls on it, resolving key addresses to KeySyms on
//! the way.  The XTest implementation lives in `infrastructure::x11`.

use thiserror::Error;
use xwebview_core::{ButtonAction, InputCommand, KeyMapper};

/// Error type for input injection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InjectError {
    /// The key has no KeySym.
    #[error("unknown key: {0}")]
    UnknownKey(String),

    /// Pointer button 0 does not exist.
    #[error("invalid pointer button {0}")]
    InvalidButton(u8),

    /// The KeySym is not on the keyboard and no spare keycode is left to map
    /// it to.
    #[error("no keycode available for keysym {0:#x}")]
    NoKeycode(u32),

    /// The platform call failed.
    #[error("platform error: {0}")]
    Platform(String),
}

/// Synthesises local input events.
#[cfg_attr(test, mockall::automock)]
pub trait InputInjector: Send + Sync {
    /// Moves the pointer to an absolute root-window position.
    fn move_pointer(&self, x: i32, y: i32) -> Result<(), InjectError>;

    /// Presses or releases a pointer button (1 = left, 2 = middle, 3 = right).
    fn set_button(&self, button: u8, action: ButtonAction) -> Result<(), InjectError>;

    /// Presses or releases the key that produces `keysym`.
    fn set_key(&self, keysym: u32, action: ButtonAction) -> Result<(), InjectError>;
}

/// Executes one command against `injector`.
///
/// Pointer commands move first, then change the button state, so the button
/// event lands at the reported position.
///
/// # Errors
///
/// [`InjectError::InvalidButton`] for button 0, [`InjectError::UnknownKey`]
/// for a key without a KeySym, or whatever the injector reports.
pub fn execute(injector: &dyn InputInjector, command: &InputCommand) -> Result<(), InjectError> {
    match command {
        InputCommand::Pointer {
            x,
            y,
            button,
            action,
        } => {
            if *button == 0 {
                return Err(InjectError::InvalidButton(0));
            }
            injector.move_pointer(*x, *y)?;
            injector.set_button(*button, *action)
        }
        InputCommand::Key { key, action } => {
            let keysym =
                KeyMapper::resolve(key).ok_or_else(|| InjectError::UnknownKey(key.to_string()))?;
            injector.set_key(keysym, *action)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
