//! Infrastructure layer for the xwebview server.
//!
//! The infrastructure layer handles all I/O: the X server, sockets, process
//! signals.
//!
//! # Responsibilities
//!
//! - X11 adapters for the display and input ports (`x11`)
//! - The websocket accept loop and per-viewer sessions
//! - The static-file HTTP server
//! - Turning SIGINT/SIGTERM/SIGQUIT into the shutdown signal
//! - Wiring everything together at startup
//! - In-memory adapters for tests (`mock`)
//!
//! # What does NOT belong here?
//!
//! - Deciding what to capture or who gets a frame (application layer)
//! - Wire formats and the encoder (`xwebview-core`)

pub mod bootstrap;
pub mod mock;
pub mod signals;
pub mod static_files;
pub mod ws_server;
pub mod x11;

pub use bootstrap::run;
pub use ws_server::{run_server, SessionSettings};
