//! X11 KeySym tables.
//!
//! KeySym values are defined in X11/keysymdef.h.
//! Reference: https://gitlab.freedesktop.org/xorg/proto/xorgproto/-/blob/master/include/X11/keysymdef.h
//!
//! # What is an X11 KeySym? (for beginners)
//!
//! X11 identifies keys by **KeySym** (Key Symbol).  A KeySym can stand for a
//! character as well as a function key:
//!
//! | KeySym name | Value  | Meaning        |
//! |-------------|--------|----------------|
//! | `XK_a`      | 0x0061 | lowercase 'a'  |
//! | `XK_A`      | 0x0041 | uppercase 'A'  |
//! | `XK_Return` | 0xFF0D | Enter key      |
//! | `XK_Escape` | 0xFF1B | Escape key     |
//!
//! Latin-1 characters use their code point directly (0x61 = 'a').  Every other
//! Unicode character `U` maps to `0x0100_0000 | U`.  Function keys live in the
//! 0xFFxx range and are looked up by name in [`keysym_from_name`].

/// Offset applied to Unicode code points outside Latin-1.
pub const UNICODE_OFFSET: u32 = 0x0100_0000;

/// Returns the KeySym for an X11 key name, e.g. `"Return"` → `0xFF0D`.
///
/// Names are case-sensitive, as they are in keysymdef.h.  Returns `None` for
/// names not in the table.
pub fn keysym_from_name(name: &str) -> Option<u32> {
    let keysym = match name {
        // TTY function keys
        "BackSpace" => 0xFF08,
        "Tab" => 0xFF09,
        "Linefeed" => 0xFF0A,
        "Clear" => 0xFF0B,
        "Return" => 0xFF0D,
        "Pause" => 0xFF13,
        "Scroll_Lock" => 0xFF14,
        "Sys_Req" => 0xFF15,
        "Escape" => 0xFF1B,
        "Delete" => 0xFFFF,

        // Cursor control
        "Home" => 0xFF50,
        "Left" => 0xFF51,
        "Up" => 0xFF52,
        "Right" => 0xFF53,
        "Down" => 0xFF54,
        "Prior" | "Page_Up" => 0xFF55,
        "Next" | "Page_Down" => 0xFF56,
        "End" => 0xFF57,
        "Begin" => 0xFF58,

        // Misc functions
        "Select" => 0xFF60,
        "Print" => 0xFF61,
        "Execute" => 0xFF62,
        "Insert" => 0xFF63,
        "Undo" => 0xFF65,
        "Redo" => 0xFF66,
        "Menu" => 0xFF67,
        "Find" => 0xFF68,
        "Cancel" => 0xFF69,
        "Help" => 0xFF6A,
        "Break" => 0xFF6B,
        "Num_Lock" => 0xFF7F,

        // Keypad
        "KP_Space" => 0xFF80,
        "KP_Tab" => 0xFF89,
        "KP_Enter" => 0xFF8D,
        "KP_Home" => 0xFF95,
        "KP_Left" => 0xFF96,
        "KP_Up" => 0xFF97,
        "KP_Right" => 0xFF98,
        "KP_Down" => 0xFF99,
        "KP_Prior" | "KP_Page_Up" => 0xFF9A,
        "KP_Next" | "KP_Page_Down" => 0xFF9B,
        "KP_End" => 0xFF9C,
        "KP_Begin" => 0xFF9D,
        "KP_Insert" => 0xFF9E,
        "KP_Delete" => 0xFF9F,
        "KP_Equal" => 0xFFBD,
        "KP_Multiply" => 0xFFAA,
        "KP_Add" => 0xFFAB,
        "KP_Separator" => 0xFFAC,
        "KP_Subtract" => 0xFFAD,
        "KP_Decimal" => 0xFFAE,
        "KP_Divide" => 0xFFAF,
        "KP_0" => 0xFFB0,
        "KP_1" => 0xFFB1,
        "KP_2" => 0xFFB2,
        "KP_3" => 0xFFB3,
        "KP_4" => 0xFFB4,
        "KP_5" => 0xFFB5,
        "KP_6" => 0xFFB6,
        "KP_7" => 0xFFB7,
        "KP_8" => 0xFFB8,
        "KP_9" => 0xFFB9,

        // Function keys
        "F1" => 0xFFBE,
        "F2" => 0xFFBF,
        "F3" => 0xFFC0,
        "F4" => 0xFFC1,
        "F5" => 0xFFC2,
        "F6" => 0xFFC3,
        "F7" => 0xFFC4,
        "F8" => 0xFFC5,
        "F9" => 0xFFC6,
        "F10" => 0xFFC7,
        "F11" => 0xFFC8,
        "F12" => 0xFFC9,

        // Modifiers
        "Shift_L" => 0xFFE1,
        "Shift_R" => 0xFFE2,
        "Control_L" => 0xFFE3,
        "Control_R" => 0xFFE4,
        "Caps_Lock" => 0xFFE5,
        "Shift_Lock" => 0xFFE6,
        "Meta_L" => 0xFFE7,
        "Meta_R" => 0xFFE8,
        "Alt_L" => 0xFFE9,
        "Alt_R" => 0xFFEA,
        "Super_L" => 0xFFEB,
        "Super_R" => 0xFFEC,
        "Hyper_L" => 0xFFED,
        "Hyper_R" => 0xFFEE,

        // Latin-1 names that reach the server as multi-character tokens
        "space" => 0x0020,
        "exclam" => 0x0021,
        "quotedbl" => 0x0022,
        "numbersign" => 0x0023,
        "dollar" => 0x0024,
        "percent" => 0x0025,
        "ampersand" => 0x0026,
        "apostrophe" => 0x0027,
        "parenleft" => 0x0028,
        "parenright" => 0x0029,
        "asterisk" => 0x002A,
        "plus" => 0x002B,
        "comma" => 0x002C,
        "minus" => 0x002D,
        "period" => 0x002E,
        "slash" => 0x002F,
        "colon" => 0x003A,
        "semicolon" => 0x003B,
        "less" => 0x003C,
        "equal" => 0x003D,
        "greater" => 0x003E,
        "question" => 0x003F,
        "at" => 0x0040,
        "bracketleft" => 0x005B,
        "backslash" => 0x005C,
        "bracketright" => 0x005D,
        "asciicircum" => 0x005E,
        "underscore" => 0x005F,
        "grave" => 0x0060,
        "braceleft" => 0x007B,
        "bar" => 0x007C,
        "braceright" => 0x007D,
        "asciitilde" => 0x007E,

        _ => return None,
    };
    Some(keysym)
}

/// Returns the KeySym for a Unicode code point.
///
/// Latin-1 printable characters map to themselves; other characters use the
/// [`UNICODE_OFFSET`] encoding.  Control characters and invalid code points
/// have no KeySym.
pub fn keysym_from_code_point(cp: u32) -> Option<u32> {
    match cp {
        0x20..=0x7E | 0xA0..=0xFF => Some(cp),
        0x00..=0x1F | 0x7F..=0x9F => None,
        _ if char::from_u32(cp).is_some() => Some(UNICODE_OFFSET | cp),
        _ => None,
    }
}

/// Parses an explicit hexadecimal KeySym such as `"0xff0d"`.
pub fn keysym_from_hex(text: &str) -> Option<u32> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))?;
    u32::from_str_radix(digits, 16).ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_and_escape() {
        assert_eq!(keysym_from_name("Return"), Some(0xFF0D));
        assert_eq!(keysym_from_name("Escape"), Some(0xFF1B));
    }

    #[test]
    fn test_arrow_keys() {
        assert_eq!(keysym_from_name("Left"), Some(0xFF51));
        assert_eq!(keysym_from_name("Up"), Some(0xFF52));
        assert_eq!(keysym_from_name("Right"), Some(0xFF53));
        assert_eq!(keysym_from_name("Down"), Some(0xFF54));
    }

    #[test]
    fn test_browser_client_key_names_are_all_known() {
        // Names the shipped web client sends for non-character keys.
        let names = [
            "KP_Space",
            "Shift_L",
            "Alt_L",
            "Return",
            "BackSpace",
            "Caps_Lock",
            "Tab",
            "Control_L",
            "Left",
            "Right",
            "Up",
            "Down",
            "KP_Page_Up",
            "KP_Page_Down",
        ];
        for name in names {
            assert!(keysym_from_name(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn test_page_aliases_share_keysym() {
        assert_eq!(keysym_from_name("Prior"), keysym_from_name("Page_Up"));
        assert_eq!(keysym_from_name("Next"), keysym_from_name("Page_Down"));
    }

    #[test]
    fn test_names_are_case_sensitive() {
        assert_eq!(keysym_from_name("return"), None);
        assert_eq!(keysym_from_name("Space"), None);
        assert_eq!(keysym_from_name("space"), Some(0x20));
    }

    #[test]
    fn test_function_keys_are_contiguous() {
        for n in 1..=12u32 {
            assert_eq!(keysym_from_name(&format!("F{n}")), Some(0xFFBE + n - 1));
        }
    }

    #[test]
    fn test_latin1_code_points_map_to_themselves() {
        assert_eq!(keysym_from_code_point(0x61), Some(0x61));
        assert_eq!(keysym_from_code_point(0x21), Some(0x21));
        assert_eq!(keysym_from_code_point(0xE9), Some(0xE9));
    }

    #[test]
    fn test_other_unicode_uses_offset() {
        assert_eq!(keysym_from_code_point(0x20AC), Some(0x0100_20AC));
    }

    #[test]
    fn test_control_characters_have_no_keysym() {
        assert_eq!(keysym_from_code_point(0x0A), None);
        assert_eq!(keysym_from_code_point(0x7F), None);
        assert_eq!(keysym_from_code_point(0xD800), None);
    }

    #[test]
    fn test_hex_keysym() {
        assert_eq!(keysym_from_hex("0xff0d"), Some(0xFF0D));
        assert_eq!(keysym_from_hex("0X0021"), Some(0x21));
        assert_eq!(keysym_from_hex("ff0d"), None);
        assert_eq!(keysym_from_hex("0xzz"), None);
    }
}
