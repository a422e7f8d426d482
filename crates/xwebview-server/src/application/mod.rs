//! Application layer for the xwebview server.
//!
//! The application layer decides *what* happens on each event: which frames
//! to capture, who receives them, which input to replay.  It talks to the
//! display and the input device only through the [`DisplaySource`] and
//! [`InputInjector`] ports, so everything here runs in tests without an X
//! server.
//!
//! # Responsibilities
//!
//! - The coordinator task that owns the viewer pool and the dirty region
//! - Capture → encode cycles and fan-out to viewers
//! - Parsing, translating and executing client input
//!
//! # What does NOT belong here?
//!
//! - X11 requests (that is `infrastructure::x11`)
//! - Sockets, websocket framing, HTTP (that is infrastructure)

pub mod broadcast;
pub mod coordinator;
pub mod display;
pub mod frame_cycle;
pub mod gateway;
pub mod inject;

pub use broadcast::{
    broadcast, catch_up_region, has_backlog, BroadcastReport, Outbound, OutboundSender, Viewer,
    ViewerPool,
};
pub use coordinator::{
    Coordinator, CoordinatorHandle, CoordinatorParts, CoordinatorStats, OpenError,
};
pub use display::{CaptureControl, DisplayError, DisplaySource, PixelBuffer};
pub use frame_cycle::{capture_and_encode, CycleError, EncodedFrame};
pub use gateway::Gateway;
pub use inject::{execute, InjectError, InputInjector};
