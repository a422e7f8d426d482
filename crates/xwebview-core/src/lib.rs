//! # xwebview-core
//!
//! Shared library for xwebview, the X11-display-in-a-browser server.  It holds
//! every piece of the capture → encode → broadcast pipeline that can be
//! expressed without sockets, threads or a live X server.
//!
//! # Architecture overview (for beginners)
//!
//! xwebview watches an X11 display for changes ("damage"), grabs the pixels of
//! each changed rectangle, compresses them and pushes the result over a
//! websocket to every browser that is watching.  Mouse clicks and key presses
//! travel the other way and are replayed into the X session.
//!
//! This crate (`xwebview-core`) is the pure foundation.  It defines:
//!
//! - **`domain`** – Geometry ([`Rect`]), the pending [`DirtyRegion`] and the
//!   fixed-capacity, generation-tagged [`ConnectionPool`] used for fan-out.
//!
//! - **`protocol`** – The text messages the server sends (`MONITOR:`,
//!   `GETREADY:`) and the `kind:button:x:y:token` input messages the browser
//!   sends back.
//!
//! - **`input`** – Translation of a parsed input message into a local
//!   injection command (move the pointer, press a key by name, ...).
//!
//! - **`keymap`** – X11 KeySym tables used to resolve a key address to the
//!   KeySym the input injector needs.
//!
//! - **`codec`** – The three-phase LZ4 frame encoder that turns a raw pixel
//!   buffer into the binary payload the browser decompresses.

pub mod codec;
pub mod domain;
pub mod input;
pub mod keymap;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `xwebview_core::Rect` instead of `xwebview_core::domain::region::Rect`.
pub use codec::lz4_frame::{EncodeError, FrameEncoder};
pub use domain::pool::{ConnectionHandle, ConnectionPool, PoolError};
pub use domain::region::{DirtyRegion, Rect};
pub use input::{key_address, translate, ButtonAction, InputCommand, KeyAddress};
pub use keymap::KeyMapper;
pub use protocol::input::{EventKind, InputEvent, ParseError};
pub use protocol::messages::{FrameMetadata, MessageError, OutputInfo, ServerMessage};
