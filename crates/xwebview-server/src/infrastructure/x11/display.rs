//! X11 implementation of [`DisplaySource`].
//!
//! Outputs come from RandR: every CRTC with a non-zero width is an active
//! output.  Pixels come from `GetImage` on the root window in `ZPixmap`
//! format, which on a 24/32-bit visual is 4 bytes per pixel with no row
//! padding.

use std::fmt::Display;

use tracing::{debug, info};
use x11rb::connection::Connection;
use x11rb::protocol::randr::ConnectionExt as _;
use x11rb::protocol::xproto::{ConnectionExt as _, ImageFormat, Window};
use x11rb::rust_connection::RustConnection;
use xwebview_core::{OutputInfo, Rect};

use crate::application::display::{DisplayError, DisplaySource, PixelBuffer};

/// Read-only view of one X screen.
pub struct X11Display {
    conn: RustConnection,
    root: Window,
    bounds: Rect,
}

pub(crate) fn request_error(e: impl Display) -> DisplayError {
    DisplayError::Request(e.to_string())
}

/// Keeps the CRTCs that drive an output, in CRTC order.  A disabled CRTC
/// reports a width of zero.
fn active_outputs(crtcs: impl IntoIterator<Item = Rect>) -> Vec<OutputInfo> {
    crtcs
        .into_iter()
        .filter(|crtc| crtc.width != 0)
        .map(OutputInfo::from)
        .collect()
}

impl X11Display {
    /// Connects to `display` (or `$DISPLAY` when `None`).
    ///
    /// # Errors
    ///
    /// [`DisplayError::Connect`] if the server is unreachable.
    pub fn connect(display: Option<&str>) -> Result<Self, DisplayError> {
        let (conn, screen_num) =
            RustConnection::connect(display).map_err(|e| DisplayError::Connect(e.to_string()))?;

        let screen = conn
            .setup()
            .roots
            .get(screen_num)
            .ok_or_else(|| DisplayError::Connect(format!("screen {screen_num} does not exist")))?;
        let root = screen.root;
        let bounds = Rect::full_screen(screen.width_in_pixels, screen.height_in_pixels);

        let name = display.unwrap_or("$DISPLAY");
        info!(
            "connected to display {name} (screen {screen_num}, {}x{})",
            bounds.width, bounds.height
        );
        Ok(Self { conn, root, bounds })
    }
}

impl DisplaySource for X11Display {
    fn outputs(&self) -> Result<Vec<OutputInfo>, DisplayError> {
        let resources = self
            .conn
            .randr_get_screen_resources(self.root)
            .map_err(request_error)?
            .reply()
            .map_err(request_error)?;

        let mut crtcs = Vec::with_capacity(resources.crtcs.len());
        for crtc in resources.crtcs {
            let info = self
                .conn
                .randr_get_crtc_info(crtc, resources.config_timestamp)
                .map_err(request_error)?
                .reply()
                .map_err(request_error)?;
            crtcs.push(Rect::new(info.x, info.y, info.width, info.height));
        }
        let outputs = active_outputs(crtcs);
        debug!(count = outputs.len(), "enumerated outputs");
        Ok(outputs)
    }

    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn capture(&self, rect: Rect) -> Result<PixelBuffer, DisplayError> {
        if rect.intersect(&self.bounds) != Some(rect) {
            return Err(DisplayError::OutOfBounds(rect));
        }

        let image = self
            .conn
            .get_image(
                ImageFormat::Z_PIXMAP,
                self.root,
                rect.x,
                rect.y,
                rect.width,
                rect.height,
                !0,
            )
            .map_err(request_error)?
            .reply()
            .map_err(request_error)?;

        Ok(PixelBuffer {
            rect,
            data: image.data,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
