//! The display capture loop.
//!
//! # How change detection works (for beginners)
//!
//! The X Damage extension tells a client which parts of a window changed.
//! We create one damage object on the root window with the `NonEmpty` report
//! level: the server sends a single `DamageNotify` when the accumulated damage
//! goes from empty to non-empty, and stays quiet until we subtract it.  On
//! each notify the loop moves the accumulated damage into a fresh XFixes
//! region, fetches its rectangles and posts them to the coordinator.
//!
//! ```text
//! X server ──DamageNotify──▶ capture thread ──Rect──▶ region channel ──▶ coordinator
//! ```
//!
//! # Why a dedicated thread with its own connection?
//!
//! `wait_for_event` blocks with no timeout.  Running it on a plain OS thread
//! keeps it off the async runtime, and a separate connection keeps its event
//! queue separate from the capture and injection requests.
//!
//! # Stopping
//!
//! The loop owns an unmapped `InputOnly` window.  [`DamageWatcher::stop`]
//! raises a stop flag and sends a `ClientMessage` to that window; with an
//! empty event mask the server delivers it to the window's creator, which
//! wakes `wait_for_event`.  The loop also ends when the region channel is
//! closed or the connection fails.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::errors::ReplyOrIdError;
use x11rb::protocol::damage::{ConnectionExt as _, Damage, ReportLevel};
use x11rb::protocol::xfixes::ConnectionExt as _;
use x11rb::protocol::xproto::{
    AtomEnum, ClientMessageEvent, ConnectionExt as _, CreateWindowAux, EventMask, Window,
    WindowClass,
};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;
use xwebview_core::Rect;

use crate::application::display::{CaptureControl, DisplayError};
use crate::infrastructure::x11::display::request_error;

/// Minimum XFixes major version; regions arrived in 2.0.
const XFIXES_MAJOR: u32 = 2;

/// Handle to a running capture thread.
pub struct DamageWatcher {
    conn: Arc<RustConnection>,
    wake: Window,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DamageWatcher {
    /// Opens a connection to `display`, sets up damage tracking on its root
    /// window and starts the capture thread, which posts changed rectangles
    /// to `regions`.
    ///
    /// # Errors
    ///
    /// [`DisplayError`] if the connection fails or Damage 1.1 / XFixes 2.0
    /// are unavailable.
    pub fn start(display: Option<&str>, regions: mpsc::Sender<Rect>) -> Result<Self, DisplayError> {
        let (conn, screen_num) =
            RustConnection::connect(display).map_err(|e| DisplayError::Connect(e.to_string()))?;
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .ok_or_else(|| DisplayError::Connect(format!("screen {screen_num} does not exist")))?;

        let damage_version = conn
            .damage_query_version(1, 1)
            .map_err(|e| extension_error("DAMAGE", e))?
            .reply()
            .map_err(|e| extension_error("DAMAGE", e))?;
        let xfixes_version = conn
            .xfixes_query_version(5, 0)
            .map_err(|e| extension_error("XFIXES", e))?
            .reply()
            .map_err(|e| extension_error("XFIXES", e))?;
        if xfixes_version.major_version < XFIXES_MAJOR {
            return Err(DisplayError::Extension {
                name: "XFIXES",
                reason: format!(
                    "version {}.{} is older than 2.0",
                    xfixes_version.major_version, xfixes_version.minor_version
                ),
            });
        }
        debug!(
            "DAMAGE {}.{}, XFIXES {}.{}",
            damage_version.major_version,
            damage_version.minor_version,
            xfixes_version.major_version,
            xfixes_version.minor_version
        );

        let damage = conn.generate_id().map_err(request_error)?;
        conn.damage_create(damage, root, ReportLevel::NON_EMPTY)
            .map_err(request_error)?;

        let wake = conn.generate_id().map_err(request_error)?;
        conn.create_window(
            0,
            wake,
            root,
            -1,
            -1,
            1,
            1,
            0,
            WindowClass::INPUT_ONLY,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new(),
        )
        .map_err(request_error)?;
        conn.flush().map_err(request_error)?;

        let conn = Arc::new(conn);
        let stop = Arc::new(AtomicBool::new(false));
        let thread = std::thread::Builder::new()
            .name("xwebview-capture".into())
            .spawn({
                let conn = Arc::clone(&conn);
                let stop = Arc::clone(&stop);
                move || capture_loop(&conn, damage, wake, &stop, &regions)
            })
            .map_err(request_error)?;

        info!("capture loop started");
        Ok(Self {
            conn,
            wake,
            stop,
            thread: Some(thread),
        })
    }

    fn wake_loop(&self) -> Result<(), DisplayError> {
        let event = ClientMessageEvent::new(32, self.wake, AtomEnum::STRING, [0u32; 5]);
        self.conn
            .send_event(false, self.wake, EventMask::NO_EVENT, event)
            .map_err(request_error)?;
        self.conn.flush().map_err(request_error)
    }
}

impl CaptureControl for DamageWatcher {
    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.stop.store(true, Ordering::SeqCst);
        if let Err(e) = self.wake_loop() {
            warn!("cannot wake capture loop: {e}");
        }
        if thread.join().is_err() {
            warn!("capture thread panicked");
        }
        info!("capture loop stopped");
    }
}

impl Drop for DamageWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn extension_error(name: &'static str, e: impl std::fmt::Display) -> DisplayError {
    DisplayError::Extension {
        name,
        reason: e.to_string(),
    }
}

fn capture_loop(
    conn: &RustConnection,
    damage: Damage,
    wake: Window,
    stop: &AtomicBool,
    regions: &mpsc::Sender<Rect>,
) {
    loop {
        let event = match conn.wait_for_event() {
            Ok(event) => event,
            Err(e) => {
                warn!("capture connection failed: {e}");
                break;
            }
        };
        if stop.load(Ordering::SeqCst) {
            break;
        }

        match event {
            Event::DamageNotify(notify) => {
                let rects = match take_damage(conn, notify.damage) {
                    Ok(rects) => rects,
                    Err(e) => {
                        warn!("cannot fetch damaged region: {e}");
                        continue;
                    }
                };
                if post_rects(rects, regions) == Posted::ChannelClosed {
                    debug!("region channel closed");
                    break;
                }
            }
            Event::ClientMessage(message) if message.window == wake => {
                debug!("capture loop woken");
            }
            _ => {}
        }
    }
    release(conn, damage, wake);
}

#[derive(Debug, PartialEq, Eq)]
enum Posted {
    All,
    ChannelClosed,
}

/// Posts each rectangle of one notify in order, blocking while the channel is
/// full.  Stops at the first rectangle the closed channel refuses.
fn post_rects(rects: Vec<Rect>, regions: &mpsc::Sender<Rect>) -> Posted {
    for rect in rects {
        if regions.blocking_send(rect).is_err() {
            return Posted::ChannelClosed;
        }
    }
    Posted::All
}

/// Moves the accumulated damage into a fresh region and returns its
/// rectangles.  The region is destroyed whether or not the fetch succeeds.
fn take_damage(conn: &RustConnection, damage: Damage) -> Result<Vec<Rect>, ReplyOrIdError> {
    let region = conn.generate_id()?;
    conn.xfixes_create_region(region, &[])?;
    conn.damage_subtract(damage, x11rb::NONE, region)?;
    let fetched = conn.xfixes_fetch_region(region)?.reply();
    conn.xfixes_destroy_region(region)?;

    Ok(fetched?
        .rectangles
        .into_iter()
        .map(|r| Rect::new(r.x, r.y, r.width, r.height))
        .collect())
}

fn release(conn: &RustConnection, damage: Damage, wake: Window) {
    // The connection may already be gone; nothing left to do then.
    let _ = conn.damage_destroy(damage);
    let _ = conn.destroy_window(wake);
    let _ = conn.flush();
}

// ── Tests ─────────────────────────────────────────────────────────────────────
