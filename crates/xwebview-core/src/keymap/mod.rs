//! Key resolution for input injection.
//!
//! The translator describes a key as a [`KeyAddress`]; the XTest injector
//! needs a KeySym.  [`KeyMapper`] bridges the two using the tables in
//! [`x11_keysym`].

pub mod x11_keysym;

use crate::input::KeyAddress;

/// Resolves key addresses to X11 KeySyms.
pub struct KeyMapper;

impl KeyMapper {
    /// Returns the KeySym for `key`, or `None` if it has none.
    ///
    /// - `Code(cp)` and `Literal(c)` go through the code-point mapping.
    /// - `Named(name)` is looked up in the name table; a name of the form
    ///   `0x…` is taken as an explicit hexadecimal KeySym.
    pub fn resolve(key: &KeyAddress) -> Option<u32> {
        match key {
            KeyAddress::Code(cp) => x11_keysym::keysym_from_code_point(*cp),
            KeyAddress::Literal(c) => x11_keysym::keysym_from_code_point(u32::from(*c)),
            KeyAddress::Named(name) => x11_keysym::keysym_from_hex(name)
                .or_else(|| x11_keysym::keysym_from_name(name)),
        }
    }

    /// Returns the KeySym for an X11 key name.
    pub fn name_to_keysym(name: &str) -> Option<u32> {
        x11_keysym::keysym_from_name(name)
    }

    /// Returns the KeySym for a character.
    pub fn char_to_keysym(c: char) -> Option<u32> {
        x11_keysym::keysym_from_code_point(u32::from(c))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
