//! xwebview-server library crate.
//!
//! Streams an X11 display to web browsers and replays their mouse and
//! keyboard input on it.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Browser (MONITOR / GETREADY text + LZ4 binary, input as text)
//!         ↕  websocket
//! [xwebview-server]
//!   ├── domain/           ServerConfig
//!   ├── application/      Coordinator, broadcast cycle, gateway, ports
//!   └── infrastructure/
//!         ├── x11/        Damage capture loop, GetImage, XTest (x11rb)
//!         ├── ws_server   websocket sessions (tokio-tungstenite)
//!         └── static_files plain-HTTP web assets
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O.
//! - `application` depends on `domain` and `xwebview-core`; it reaches the
//!   display and the input devices only through the `DisplaySource` and
//!   `InputInjector` traits.
//! - `infrastructure` implements those traits and owns every socket.

/// Domain layer: configuration.
pub mod domain;

/// Application layer: coordinator, frame cycle, gateway.
pub mod application;

/// Infrastructure layer: X11, websocket, HTTP, signals.
pub mod infrastructure;
