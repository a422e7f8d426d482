//! Screen rectangles and the pending dirty region.
//!
//! # What is a dirty region? (for beginners)
//!
//! Whenever something on the X display is redrawn, the X server's Damage
//! extension reports *which rectangle* changed.  The capture loop forwards
//! those rectangles to the coordinator, which keeps the one still waiting to
//! be captured in a [`DirtyRegion`].  Once per broadcast cycle the coordinator
//! takes a local copy of it (so the value cannot change while it is in use),
//! captures exactly that rectangle, and starts over with an empty region.
//!
//! Several rectangles may arrive before the coordinator gets round to a cycle.
//! Instead of capturing each one separately they are *coalesced* into their
//! bounding box.  The result is a superset of what changed, which is always
//! safe: a few unchanged pixels are re-sent, nothing changed is ever missed.
//!
//! # Coordinate types
//!
//! X11 rectangles use signed 16-bit origins and unsigned 16-bit extents, so
//! `width >= 0` and `height >= 0` hold by construction.  Intermediate
//! arithmetic is done in `i32` to avoid overflow.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in root-window (virtual screen) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge in pixels.
    pub x: i16,
    /// Top edge in pixels.
    pub y: i16,
    /// Width in pixels.
    pub width: u16,
    /// Height in pixels.
    pub height: u16,
}

impl Rect {
    /// Creates a rectangle from its origin and extent.
    pub const fn new(x: i16, y: i16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rectangle anchored at the origin covering a whole `width`×`height` screen.
    pub const fn full_screen(width: u16, height: u16) -> Self {
        Self::new(0, 0, width, height)
    }

    /// `true` if the rectangle covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered.
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Right edge (exclusive).
    fn right(&self) -> i32 {
        i32::from(self.x) + i32::from(self.width)
    }

    /// Bottom edge (exclusive).
    fn bottom(&self) -> i32 {
        i32::from(self.y) + i32::from(self.height)
    }

    /// Returns the smallest rectangle containing both `self` and `other`.
    ///
    /// An empty operand does not contribute; the union of two empty
    /// rectangles is `self`.  The result saturates at the `u16` extent limit.
    pub fn union(&self, other: &Rect) -> Rect {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }

        let left = i32::from(self.x).min(i32::from(other.x));
        let top = i32::from(self.y).min(i32::from(other.y));
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());

        Rect {
            x: left as i16,
            y: top as i16,
            width: clamp_extent(right - left),
            height: clamp_extent(bottom - top),
        }
    }

    /// Returns the overlap of `self` and `other`, or `None` if they do not
    /// overlap.
    ///
    /// Used to clip damage rectangles to the screen before asking the X
    /// server for pixels: `GetImage` fails with `BadMatch` outside the root.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let left = i32::from(self.x).max(i32::from(other.x));
        let top = i32::from(self.y).max(i32::from(other.y));
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right <= left || bottom <= top {
            return None;
        }

        Some(Rect {
            x: left as i16,
            y: top as i16,
            width: clamp_extent(right - left),
            height: clamp_extent(bottom - top),
        })
    }
}

fn clamp_extent(value: i32) -> u16 {
    value.clamp(0, i32::from(u16::MAX)) as u16
}

/// The rectangle still waiting to be captured, if any.
///
/// Only the coordinator touches a `DirtyRegion`; rectangles reach it by value
/// over a channel, so there is no shared cell and no torn read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyRegion {
    pending: Option<Rect>,
}

impl DirtyRegion {
    /// Creates an empty region (nothing pending).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a changed rectangle, coalescing it with whatever is pending.
    ///
    /// Empty rectangles are ignored.
    pub fn merge(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        self.pending = Some(match self.pending {
            Some(current) => current.union(&rect),
            None => rect,
        });
    }

    /// Replaces whatever is pending with `full`.
    ///
    /// Called when a new viewer connects: it needs every pixel, not just the
    /// ones that changed since the previous cycle.
    pub fn reset(&mut self, full: Rect) {
        self.pending = if full.is_empty() { None } else { Some(full) };
    }

    /// Takes the pending rectangle, leaving the region empty.
    pub fn take(&mut self) -> Option<Rect> {
        self.pending.take()
    }

    /// Returns the pending rectangle without consuming it.
    pub fn peek(&self) -> Option<Rect> {
        self.pending
    }

    /// `true` if nothing is pending.
    pub fn is_clean(&self) -> bool {
        self.pending.is_none()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
