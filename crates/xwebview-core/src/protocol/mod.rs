//! Wire protocol spoken over the websocket.
//!
//! - [`messages`] – text messages the server sends (`MONITOR:` and `GETREADY:`).
//! - [`input`] – the `kind:button:x:y:token` messages the browser sends back.
//!
//! Binary websocket messages carry nothing but LZ4 frame data; they are
//! produced by [`crate::codec`] and never parsed here.

pub mod input;
pub mod messages;

pub use input::{EventKind, InputEvent, ParseError};
pub use messages::{FrameMetadata, MessageError, OutputInfo, ServerMessage};
