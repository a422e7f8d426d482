//! Display access port.
//!
//! The coordinator needs three things from the display: the list of active
//! outputs (for `MONITOR` messages), the bounds of the whole virtual screen,
//! and the raw pixels of a rectangle.  [`DisplaySource`] captures exactly that
//! so the coordinator can be tested without an X server; the X11
//! implementation lives in `infrastructure::x11`.

use thiserror::Error;
use xwebview_core::{OutputInfo, Rect};

/// Error type for display operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DisplayError {
    /// The display connection could not be opened.
    #[error("cannot open display: {0}")]
    Connect(String),

    /// A required protocol extension is missing or too old.
    #[error("display extension {name} unavailable: {reason}")]
    Extension { name: &'static str, reason: String },

    /// A request to the display failed.
    #[error("display request failed: {0}")]
    Request(String),

    /// The rectangle is not inside the screen.
    #[error("rectangle {0:?} is outside the screen")]
    OutOfBounds(Rect),
}

/// Raw pixels captured for one rectangle.
///
/// `data` holds `rect.width * rect.height` pixels in the display's native
/// 32-bit format, row-major with no padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub rect: Rect,
    pub data: Vec<u8>,
}

/// Read access to a display.
///
/// Implementations must be usable from the blocking thread pool, hence the
/// `Send + Sync` bound.
pub trait DisplaySource: Send + Sync {
    /// Lists active outputs in enumeration order.
    ///
    /// # Errors
    ///
    /// Returns [`DisplayError`] if the outputs cannot be queried.
    fn outputs(&self) -> Result<Vec<OutputInfo>, DisplayError>;

    /// The full virtual-screen rectangle, anchored at the origin.
    fn bounds(&self) -> Rect;

    /// Captures the pixels of `rect`, which must lie inside
    /// [`bounds`](Self::bounds).
    ///
    /// # Errors
    ///
    /// Returns [`DisplayError`] if the capture request fails.
    fn capture(&self, rect: Rect) -> Result<PixelBuffer, DisplayError>;
}

/// Stops a running capture loop.
///
/// The coordinator owns the capture loop's control handle and calls
/// [`stop`](Self::stop) exactly once during shutdown, after it has closed the
/// region channel so a loop blocked on a full channel can exit.
pub trait CaptureControl: Send {
    fn stop(&mut self);
}
