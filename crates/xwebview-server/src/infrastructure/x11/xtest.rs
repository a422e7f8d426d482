//! X11 input injection via the XTest extension.
//!
//! # What is XTest? (for beginners)
//!
//! XTest lets a client synthesise keyboard and pointer events that the server
//! delivers exactly like physical input.  One request, `FakeInput`, covers
//! every case: motion to an absolute root position, a button press or
//! release, a key press or release.
//!
//! # KeySym → keycode
//!
//! `FakeInput` takes a *keycode* (a physical key position), while the client
//! sends characters and key names, which [`KeyMapper`](xwebview_core::KeyMapper)
//! resolves to *KeySyms*.  The injector keeps a copy of the server's keyboard
//! mapping and searches it:
//!
//! | Found in column | Meaning            | Injected as                         |
//! |-----------------|--------------------|-------------------------------------|
//! | 0               | unshifted symbol   | the key alone                       |
//! | 1               | shifted symbol     | Shift down, key down, Shift up      |
//! | nowhere         | not on the keyboard| remap a spare keycode, then the key |
//!
//! The copy is refreshed whenever the server reports a `MappingNotify`.

use std::sync::Mutex;

use tracing::{debug, info};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    ConnectionExt as _, Keycode, Keysym, Window, BUTTON_PRESS_EVENT, BUTTON_RELEASE_EVENT,
    KEY_PRESS_EVENT, KEY_RELEASE_EVENT, MOTION_NOTIFY_EVENT,
};
use x11rb::protocol::xtest::ConnectionExt as _;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;
use xwebview_core::ButtonAction;

use crate::application::display::DisplayError;
use crate::application::inject::{InjectError, InputInjector};

/// `CurrentTime`: let the server stamp the event.
const CURRENT_TIME: u32 = 0;

/// XTest's "core device" id.
const CORE_DEVICE: u8 = 0;

const XK_SHIFT_L: Keysym = 0xFFE1;

/// A copy of the server's keycode → KeySym table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardMap {
    min_keycode: Keycode,
    keysyms_per_keycode: usize,
    keysyms: Vec<Keysym>,
}

impl KeyboardMap {
    pub fn new(min_keycode: Keycode, keysyms_per_keycode: u8, keysyms: Vec<Keysym>) -> Self {
        Self {
            min_keycode,
            keysyms_per_keycode: usize::from(keysyms_per_keycode.max(1)),
            keysyms,
        }
    }

    fn rows(&self) -> impl Iterator<Item = (Keycode, &[Keysym])> + '_ {
        self.keysyms
            .chunks(self.keysyms_per_keycode)
            .enumerate()
            .map(|(i, row)| (self.min_keycode.saturating_add(i as u8), row))
    }

    /// Finds the keycode producing `keysym`, preferring unshifted positions.
    /// Returns the keycode and whether Shift is needed.
    pub fn lookup(&self, keysym: Keysym) -> Option<(Keycode, bool)> {
        if keysym == 0 {
            return None;
        }
        for column in 0..2 {
            if let Some((keycode, _)) = self
                .rows()
                .find(|(_, row)| row.get(column) == Some(&keysym))
            {
                return Some((keycode, column == 1));
            }
        }
        None
    }

    /// The highest keycode with no symbols at all, used for remapping.
    pub fn spare_keycode(&self) -> Option<Keycode> {
        self.rows()
            .filter(|(_, row)| row.iter().all(|&sym| sym == 0))
            .map(|(keycode, _)| keycode)
            .last()
    }

    /// Records that `keycode` now produces `keysym` in every column.
    fn assign(&mut self, keycode: Keycode, keysym: Keysym) {
        let Some(index) = keycode.checked_sub(self.min_keycode) else {
            return;
        };
        let start = usize::from(index) * self.keysyms_per_keycode;
        if let Some(row) = self
            .keysyms
            .get_mut(start..start + self.keysyms_per_keycode)
        {
            row.fill(keysym);
        }
    }
}

/// Injects input into one X screen.
pub struct XTestInjector {
    conn: RustConnection,
    root: Window,
    keyboard: Mutex<Option<KeyboardMap>>,
}

fn platform(e: impl std::fmt::Display) -> InjectError {
    InjectError::Platform(e.to_string())
}

impl XTestInjector {
    /// Connects to `display` (or `$DISPLAY`) and checks for XTest.
    ///
    /// # Errors
    ///
    /// [`DisplayError`] if the connection fails or XTest is missing.
    pub fn connect(display: Option<&str>) -> Result<Self, DisplayError> {
        let (conn, screen_num) =
            RustConnection::connect(display).map_err(|e| DisplayError::Connect(e.to_string()))?;
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .ok_or_else(|| DisplayError::Connect(format!("screen {screen_num} does not exist")))?;

        let version = conn
            .xtest_get_version(2, 2)
            .map_err(|e| DisplayError::Extension {
                name: "XTEST",
                reason: e.to_string(),
            })?
            .reply()
            .map_err(|e| DisplayError::Extension {
                name: "XTEST",
                reason: e.to_string(),
            })?;
        info!(
            "XTEST {}.{} ready for input injection",
            version.major_version, version.minor_version
        );

        Ok(Self {
            conn,
            root,
            keyboard: Mutex::new(None),
        })
    }

    fn fetch_keyboard_map(&self) -> Result<KeyboardMap, InjectError> {
        let setup = self.conn.setup();
        let (min, max) = (setup.min_keycode, setup.max_keycode);
        let reply = self
            .conn
            .get_keyboard_mapping(min, max - min + 1)
            .map_err(platform)?
            .reply()
            .map_err(platform)?;
        Ok(KeyboardMap::new(min, reply.keysyms_per_keycode, reply.keysyms))
    }

    /// Discards the cached mapping if the server reported a change.
    fn process_pending_events(&self, cache: &mut Option<KeyboardMap>) -> Result<(), InjectError> {
        while let Some(event) = self.conn.poll_for_event().map_err(platform)? {
            if let Event::MappingNotify(_) = event {
                debug!("keyboard mapping changed");
                *cache = None;
            }
        }
        Ok(())
    }

    fn fake(&self, kind: u8, detail: u8, x: i16, y: i16) -> Result<(), InjectError> {
        self.conn
            .xtest_fake_input(kind, detail, CURRENT_TIME, self.root, x, y, CORE_DEVICE)
            .map_err(platform)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), InjectError> {
        self.conn.flush().map_err(platform)
    }

    /// Resolves `keysym` to a keycode, remapping a spare key if needed.
    fn keycode_for(&self, keysym: Keysym) -> Result<(Keycode, bool), InjectError> {
        let mut cache = self
            .keyboard
            .lock()
            .map_err(|_| InjectError::Platform("keyboard cache poisoned".into()))?;
        self.process_pending_events(&mut cache)?;

        if cache.is_none() {
            *cache = Some(self.fetch_keyboard_map()?);
        }
        let Some(map) = cache.as_mut() else {
            return Err(InjectError::NoKeycode(keysym));
        };
        if let Some(found) = map.lookup(keysym) {
            return Ok(found);
        }

        let spare = map.spare_keycode().ok_or(InjectError::NoKeycode(keysym))?;
        let row = vec![keysym; map.keysyms_per_keycode];
        self.conn
            .change_keyboard_mapping(1, spare, map.keysyms_per_keycode as u8, &row)
            .map_err(platform)?;
        map.assign(spare, keysym);
        debug!("mapped keysym {keysym:#x} to spare keycode {spare}");
        Ok((spare, false))
    }
}

fn clamp_coordinate(value: i32) -> i16 {
    value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

impl InputInjector for XTestInjector {
    fn move_pointer(&self, x: i32, y: i32) -> Result<(), InjectError> {
        // Detail 0 means absolute motion.
        self.fake(MOTION_NOTIFY_EVENT, 0, clamp_coordinate(x), clamp_coordinate(y))?;
        self.flush()
    }

    fn set_button(&self, button: u8, action: ButtonAction) -> Result<(), InjectError> {
        if button == 0 {
            return Err(InjectError::InvalidButton(button));
        }
        let kind = if action.is_press() {
            BUTTON_PRESS_EVENT
        } else {
            BUTTON_RELEASE_EVENT
        };
        self.fake(kind, button, 0, 0)?;
        self.flush()
    }

    fn set_key(&self, keysym: u32, action: ButtonAction) -> Result<(), InjectError> {
        let (keycode, shifted) = self.keycode_for(keysym)?;

        if action.is_press() {
            let shift = if shifted {
                Some(self.keycode_for(XK_SHIFT_L)?.0)
            } else {
                None
            };
            if let Some(shift) = shift {
                self.fake(KEY_PRESS_EVENT, shift, 0, 0)?;
            }
            self.fake(KEY_PRESS_EVENT, keycode, 0, 0)?;
            if let Some(shift) = shift {
                self.fake(KEY_RELEASE_EVENT, shift, 0, 0)?;
            }
        } else {
            self.fake(KEY_RELEASE_EVENT, keycode, 0, 0)?;
        }
        self.flush()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
