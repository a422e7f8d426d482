//! Frame compression.
//!
//! The browser decodes binary messages with an LZ4 *frame* decoder, so every
//! captured rectangle is compressed into one self-contained LZ4 frame by
//! [`lz4_frame::FrameEncoder`].

pub mod lz4_frame;

pub use lz4_frame::{EncodeError, FrameEncoder, Phase};
