//! One capture → encode step.
//!
//! [`capture_and_encode`] is the blocking half of a broadcast cycle: it asks
//! the display for the pixels of one rectangle, compresses them into an LZ4
//! frame and renders the `GETREADY` header that announces the frame.  The
//! coordinator runs it on the blocking thread pool and fans the result out.
//!
//! The pixel buffer is dropped as soon as the encoder returns, on the success
//! path and on every error path alike.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use xwebview_core::{EncodeError, FrameEncoder, FrameMetadata, MessageError, Rect, ServerMessage};

use crate::application::display::{DisplayError, DisplaySource};

/// Why a cycle produced no frame.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("capture failed: {0}")]
    Capture(#[from] DisplayError),

    #[error("compression failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("cannot render frame header: {0}")]
    Header(#[from] MessageError),
}

/// A compressed frame ready for fan-out.
///
/// `header` and `payload` are reference counted so every viewer receives the
/// same bytes without copying them per connection.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub metadata: FrameMetadata,
    /// `GETREADY:{...}` text announcing the payload.
    pub header: Arc<str>,
    /// The LZ4 frame; exactly `metadata.length` bytes.
    pub payload: Arc<[u8]>,
}

/// Captures `rect` from `display` and compresses it.
///
/// # Errors
///
/// Returns [`CycleError`] if the capture, the compression or the header
/// rendering fails.  No partial frame is ever returned.
pub fn capture_and_encode(
    display: &dyn DisplaySource,
    encoder: &FrameEncoder,
    rect: Rect,
) -> Result<EncodedFrame, CycleError> {
    let payload = {
        let pixels = display.capture(rect)?;
        encoder.encode(&pixels.data)?
    };

    let metadata = FrameMetadata::for_frame(rect, payload.len());
    let header = ServerMessage::GetReady(metadata).to_text()?;
    debug!(?rect, bytes = payload.len(), "frame encoded");

    Ok(EncodedFrame {
        metadata,
        header: Arc::from(header),
        payload: Arc::from(payload),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::MockDisplay;

    #[test]
    fn test_metadata_matches_rect_and_payload() {
        // Arrange
        let display = MockDisplay::single_1080p();
        let rect = Rect::new(100, 50, 64, 32);

        // Act
        let frame = capture_and_encode(&display, &FrameEncoder::new(), rect).unwrap();

        // Assert
        assert_eq!(frame.metadata.rect(), rect);
        assert_eq!(frame.metadata.length, frame.payload.len());
        assert!(frame.header.starts_with("GETREADY:{"));
        assert!(frame
            .header
            .ends_with(&format!("\"length\":{}}}", frame.payload.len())));
    }

    #[test]
    fn test_capture_failure_is_reported() {
        let display = MockDisplay::single_1080p().failing();

        let result = capture_and_encode(&display, &FrameEncoder::new(), Rect::new(0, 0, 8, 8));

        assert!(matches!(result, Err(CycleError::Capture(_))));
    }

    #[test]
    fn test_empty_capture_is_an_encode_error() {
        // A zero-area rectangle yields an empty buffer, which the encoder
        // refuses.
        let display = MockDisplay::single_1080p();

        let result = capture_and_encode(&display, &FrameEncoder::new(), Rect::new(0, 0, 0, 8));

        assert!(matches!(
            result,
            Err(CycleError::Encode(EncodeError::EmptyInput))
        ));
    }
}
