//! In-memory display, injector and capture loop for tests.
//!
//! # Why mock adapters?
//!
//! The real adapters talk to an X server: they need a running display, they
//! move the real pointer, and their effects cannot be observed from test
//! code.  The mocks here replace every X11 call with in-memory recording so
//! tests can check exactly what the coordinator and the gateway asked for,
//! and in what order.
//!
//! # `should_fail` flag
//!
//! Each mock has a `should_fail` flag.  When it is set every operation
//! returns an error, which exercises the error paths of the callers without
//! needing a broken display.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::thread::{self, ThreadId};

use xwebview_core::{ButtonAction, OutputInfo, Rect};

use crate::application::display::{CaptureControl, DisplayError, DisplaySource, PixelBuffer};
use crate::application::inject::{InjectError, InputInjector};

// ── MockDisplay ───────────────────────────────────────────────────────────────

/// A fake display with fixed outputs that records every capture request.
///
/// Captured pixels are a deterministic pattern of `width * height * 4` bytes,
/// so frames compress and decode like real ones.
pub struct MockDisplay {
    outputs: Vec<OutputInfo>,
    bounds: Rect,
    captures: Arc<Mutex<Vec<Rect>>>,
    /// Thread of every `outputs` and `capture` call.
    threads: Arc<Mutex<Vec<ThreadId>>>,
    drops: Arc<AtomicUsize>,
    /// When `true`, `outputs` and `capture` return `DisplayError::Request`.
    pub should_fail: bool,
}

impl MockDisplay {
    /// A display with the given outputs; the bounds cover all of them.
    pub fn with_outputs(outputs: Vec<OutputInfo>) -> Self {
        let bounds = outputs
            .iter()
            .fold(Rect::default(), |acc, output| acc.union(&output.rect()));
        Self {
            outputs,
            bounds: Rect::full_screen(
                (i32::from(bounds.x) + i32::from(bounds.width)).clamp(0, 65535) as u16,
                (i32::from(bounds.y) + i32::from(bounds.height)).clamp(0, 65535) as u16,
            ),
            captures: Arc::new(Mutex::new(Vec::new())),
            threads: Arc::new(Mutex::new(Vec::new())),
            drops: Arc::new(AtomicUsize::new(0)),
            should_fail: false,
        }
    }

    /// One 1920×1080 output.
    pub fn single_1080p() -> Self {
        Self::with_outputs(vec![OutputInfo {
            x: 0,
            y: 0,
            w: 1920,
            h: 1080,
        }])
    }

    /// Two 2560×1440 outputs side by side.
    pub fn dual_1440p() -> Self {
        Self::with_outputs(vec![
            OutputInfo {
                x: 0,
                y: 0,
                w: 2560,
                h: 1440,
            },
            OutputInfo {
                x: 2560,
                y: 0,
                w: 2560,
                h: 1440,
            },
        ])
    }

    /// Makes every operation fail.
    pub fn failing(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Shared log of every rectangle passed to `capture`, in call order.
    pub fn capture_log(&self) -> Arc<Mutex<Vec<Rect>>> {
        Arc::clone(&self.captures)
    }

    /// Shared log of the threads `outputs` and `capture` were called on.
    pub fn thread_log(&self) -> Arc<Mutex<Vec<ThreadId>>> {
        Arc::clone(&self.threads)
    }

    fn record_thread(&self) {
        if let Ok(mut log) = self.threads.lock() {
            log.push(thread::current().id());
        }
    }

    /// Counts how many times this display has been dropped (0 or 1).
    pub fn drop_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.drops)
    }
}

/// Fills `len` bytes with a repeating gradient.
fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i / 4 % 251) as u8).collect()
}

impl DisplaySource for MockDisplay {
    fn outputs(&self) -> Result<Vec<OutputInfo>, DisplayError> {
        self.record_thread();
        if self.should_fail {
            return Err(DisplayError::Request("mock outputs failure".into()));
        }
        Ok(self.outputs.clone())
    }

    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn capture(&self, rect: Rect) -> Result<PixelBuffer, DisplayError> {
        self.record_thread();
        if let Ok(mut log) = self.captures.lock() {
            log.push(rect);
        }
        if self.should_fail {
            return Err(DisplayError::Request("mock capture failure".into()));
        }
        if !rect.is_empty() && rect.intersect(&self.bounds) != Some(rect) {
            return Err(DisplayError::OutOfBounds(rect));
        }
        Ok(PixelBuffer {
            rect,
            data: pattern(rect.area() * 4),
        })
    }
}

impl Drop for MockDisplay {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

// ── MockInjector ──────────────────────────────────────────────────────────────

/// One call recorded by [`MockInjector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Injected {
    Move { x: i32, y: i32 },
    Button { button: u8, action: ButtonAction },
    Key { keysym: u32, action: ButtonAction },
}

/// An injector that records calls instead of touching the input devices.
///
/// Unlike the `mockall`-generated mock, this one needs no expectations and is
/// shared with a running server in integration tests.
#[derive(Default)]
pub struct MockInjector {
    /// Every call, in order.
    pub calls: Mutex<Vec<Injected>>,
    /// When `true`, every method returns `InjectError::Platform`.
    pub should_fail: bool,
}

impl MockInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of the recorded calls.
    pub fn recorded(&self) -> Vec<Injected> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: Injected) -> Result<(), InjectError> {
        if self.should_fail {
            return Err(InjectError::Platform("mock injection failure".into()));
        }
        self.calls
            .lock()
            .map_err(|_| InjectError::Platform("mock poisoned".into()))?
            .push(call);
        Ok(())
    }
}

impl InputInjector for MockInjector {
    fn move_pointer(&self, x: i32, y: i32) -> Result<(), InjectError> {
        self.record(Injected::Move { x, y })
    }

    fn set_button(&self, button: u8, action: ButtonAction) -> Result<(), InjectError> {
        self.record(Injected::Button { button, action })
    }

    fn set_key(&self, keysym: u32, action: ButtonAction) -> Result<(), InjectError> {
        self.record(Injected::Key { keysym, action })
    }
}

// ── MockCapture ───────────────────────────────────────────────────────────────

/// A capture-loop handle that counts `stop` calls and remembers the thread
/// of the last one.
#[derive(Default)]
pub struct MockCapture {
    stops: Arc<AtomicUsize>,
    stopped_on: Arc<Mutex<Option<ThreadId>>>,
}

impl MockCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.stops)
    }

    pub fn stop_thread(&self) -> Arc<Mutex<Option<ThreadId>>> {
        Arc::clone(&self.stopped_on)
    }
}

impl CaptureControl for MockCapture {
    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut stopped_on) = self.stopped_on.lock() {
            *stopped_on = Some(thread::current().id());
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
