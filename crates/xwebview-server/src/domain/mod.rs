//! Domain layer for xwebview-server.
//!
//! Pure types with no I/O.  The geometry, pool and protocol types the server
//! shares with tooling live in `xwebview-core`; what remains here is specific
//! to running the server.
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, X11 or websocket types
//! - Reading files or environment variables

pub mod config;

pub use config::{ConfigError, ServerConfig};
