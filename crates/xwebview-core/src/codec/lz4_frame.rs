//! Three-phase LZ4 frame encoder.
//!
//! # How an LZ4 frame is produced (for beginners)
//!
//! The LZ4 frame API compresses in three strictly ordered phases, each of
//! which appends bytes to the same output buffer:
//!
//! ```text
//! ┌────────────┬──────────────────────────┬──────────┐
//! │ begin      │ body (compressed blocks) │ end      │
//! │ magic +    │ one call over the whole  │ end mark │
//! │ frame desc │ uncompressed buffer      │          │
//! └────────────┴──────────────────────────┴──────────┘
//! ```
//!
//! The output buffer is sized once, before any phase runs, to
//! `HEADER_SIZE_MAX + LZ4F_compressBound(len)`.  That bound covers the body
//! and the end mark for any input of `len` bytes, so no phase can ever run out
//! of room.
//!
//! Auto-flush is enabled, which makes the body phase emit its blocks
//! immediately instead of buffering them inside the context.  As a result
//! every phase writes at least one byte for non-empty input, and a phase that
//! reports zero bytes is treated as a failure.
//!
//! # Resource safety
//!
//! The compression context is owned by a guard whose `Drop` frees it, and the
//! output buffer is an ordinary `Vec`.  Whichever phase fails, both are
//! released when the function returns.

use std::ffi::CStr;
use std::fmt;
use std::ptr;

use lz4_sys::{
    BlockChecksum, BlockMode, BlockSize, ContentChecksum, FrameType, LZ4FCompressionContext,
    LZ4FFrameInfo, LZ4FPreferences, LZ4F_compressBegin, LZ4F_compressBound, LZ4F_compressEnd,
    LZ4F_compressUpdate, LZ4F_createCompressionContext, LZ4F_freeCompressionContext,
    LZ4F_getErrorName, LZ4F_isError, LZ4F_VERSION,
};
use thiserror::Error;
use tracing::trace;

/// Largest possible frame header (magic number + frame descriptor).
pub const HEADER_SIZE_MAX: usize = 19;

/// The step of the encoding that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Creating the compression context.
    Context,
    /// Writing the frame header.
    Begin,
    /// Compressing the pixel data.
    Body,
    /// Writing the end mark.
    End,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Context => "context",
            Self::Begin => "begin",
            Self::Body => "body",
            Self::End => "end",
        };
        f.write_str(name)
    }
}

/// Errors returned by [`FrameEncoder::encode`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// There was nothing to compress.
    #[error("refusing to encode an empty buffer")]
    EmptyInput,

    /// The LZ4 library reported an error code.
    #[error("lz4 {phase} phase failed: {name}")]
    Lz4 { phase: Phase, name: String },

    /// A phase reported success but wrote nothing.
    #[error("lz4 {phase} phase produced no output")]
    NoOutput { phase: Phase },
}

/// Compresses raw pixel buffers into standalone LZ4 frames.
///
/// The encoder itself holds only settings; every call to
/// [`encode`](Self::encode) creates and frees its own context, so one encoder
/// can be shared freely between threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEncoder {
    compression_level: u32,
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameEncoder {
    /// Encoder with the library's default (fast) compression level.
    pub fn new() -> Self {
        Self {
            compression_level: 0,
        }
    }

    /// Encoder with an explicit compression level (0 = fast default,
    /// 3..=12 = LZ4-HC levels).
    pub fn with_level(compression_level: u32) -> Self {
        Self { compression_level }
    }

    pub fn compression_level(&self) -> u32 {
        self.compression_level
    }

    /// Size of the buffer allocated for an input of `len` bytes.
    ///
    /// Every frame produced by [`encode`](Self::encode) fits in this many
    /// bytes.
    pub fn compress_bound(&self, len: usize) -> usize {
        let prefs = self.preferences();
        // SAFETY: `prefs` is a valid, fully initialised preferences struct
        // that outlives the call.
        let body_bound = unsafe { LZ4F_compressBound(len, &prefs) };
        HEADER_SIZE_MAX + body_bound
    }

    /// Compresses `src` into one complete LZ4 frame.
    ///
    /// # Errors
    ///
    /// - [`EncodeError::EmptyInput`] if `src` is empty (checked before any
    ///   allocation).
    /// - [`EncodeError::Lz4`] or [`EncodeError::NoOutput`] if any phase fails;
    ///   the remaining phases are skipped.
    pub fn encode(&self, src: &[u8]) -> Result<Vec<u8>, EncodeError> {
        if src.is_empty() {
            return Err(EncodeError::EmptyInput);
        }

        let prefs = self.preferences();
        let capacity = self.compress_bound(src.len());
        let ctx = CompressionContext::new()?;
        let mut dst = vec![0u8; capacity];
        let mut written = 0usize;

        // SAFETY: for every call below, `ctx` is a live context, the
        // destination pointer and length describe the unused tail of `dst`
        // (`written <= capacity` always holds because each phase writes at
        // most the room it is given), and `src`/`prefs` outlive the call.
        let begin = unsafe {
            LZ4F_compressBegin(
                ctx.raw(),
                dst.as_mut_ptr().add(written),
                capacity - written,
                &prefs,
            )
        };
        written += check(Phase::Begin, begin)?;

        let body = unsafe {
            LZ4F_compressUpdate(
                ctx.raw(),
                dst.as_mut_ptr().add(written),
                capacity - written,
                src.as_ptr(),
                src.len(),
                ptr::null(),
            )
        };
        written += check(Phase::Body, body)?;

        let end = unsafe {
            LZ4F_compressEnd(
                ctx.raw(),
                dst.as_mut_ptr().add(written),
                capacity - written,
                ptr::null(),
            )
        };
        written += check(Phase::End, end)?;

        dst.truncate(written);
        trace!(
            input = src.len(),
            output = written,
            capacity,
            "encoded lz4 frame"
        );
        Ok(dst)
    }

    fn preferences(&self) -> LZ4FPreferences {
        LZ4FPreferences {
            frame_info: LZ4FFrameInfo {
                block_size_id: BlockSize::Default,
                block_mode: BlockMode::Linked,
                content_checksum_flag: ContentChecksum::NoChecksum,
                frame_type: FrameType::Frame,
                content_size: 0,
                dict_id: 0,
                block_checksum_flag: BlockChecksum::NoBlockChecksum,
            },
            compression_level: self.compression_level,
            auto_flush: 1,
            favor_dec_speed: 0,
            reserved: [0; 3],
        }
    }
}

/// Owns an `LZ4F_cctx` and frees it on drop.
struct CompressionContext(LZ4FCompressionContext);

impl CompressionContext {
    fn new() -> Result<Self, EncodeError> {
        let mut raw = LZ4FCompressionContext(ptr::null_mut());
        // SAFETY: `raw` is a valid out-pointer for the new context.
        let code = unsafe { LZ4F_createCompressionContext(&mut raw, LZ4F_VERSION) };
        // Wrap first so a partially created context is still freed.
        let ctx = Self(raw);
        if is_error(code) {
            return Err(EncodeError::Lz4 {
                phase: Phase::Context,
                name: error_name(code),
            });
        }
        Ok(ctx)
    }

    fn raw(&self) -> LZ4FCompressionContext {
        self.0
    }
}

impl Drop for CompressionContext {
    fn drop(&mut self) {
        // SAFETY: the context came from LZ4F_createCompressionContext and is
        // freed exactly once.  Freeing a NULL context is a no-op.
        unsafe {
            LZ4F_freeCompressionContext(self.0);
        }
    }
}

/// Turns a phase return code into the number of bytes written.
fn check(phase: Phase, code: usize) -> Result<usize, EncodeError> {
    if is_error(code) {
        return Err(EncodeError::Lz4 {
            phase,
            name: error_name(code),
        });
    }
    if code == 0 {
        return Err(EncodeError::NoOutput { phase });
    }
    Ok(code)
}

fn is_error(code: usize) -> bool {
    // SAFETY: LZ4F_isError only inspects the integer value.
    unsafe { LZ4F_isError(code) != 0 }
}

fn error_name(code: usize) -> String {
    // SAFETY: LZ4F_getErrorName returns a pointer to a static NUL-terminated
    // string for every code.
    let name = unsafe { LZ4F_getErrorName(code) };
    if name.is_null() {
        return format!("error code {code}");
    }
    unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
