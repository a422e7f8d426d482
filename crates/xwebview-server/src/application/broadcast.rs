//! Fan-out of frames to every viewer.
//!
//! # How a frame reaches a browser (for beginners)
//!
//! Every viewer has its own bounded queue of [`Outbound`] items and a writer
//! task that drains it onto the websocket.  Broadcasting therefore never
//! touches a socket: it only pushes one item per viewer with `try_send`,
//! which returns immediately.
//!
//! ```text
//! broadcast ──try_send──▶ [queue A] ──writer A──▶ GETREADY text, binary payload
//!           ──try_send──▶ [queue B] ──writer B──▶ GETREADY text, binary payload
//! ```
//!
//! # Viewers that fall behind
//!
//! A full queue means the viewer is reading more slowly than the screen
//! changes, not that it is gone.  The frame is skipped for that viewer and its
//! rectangle is merged into the viewer's `missed` region.  Once the queue has
//! room again, [`catch_up_region`] hands the missed area back to the
//! coordinator, which includes it in the next capture.  Only a closed queue
//! (the session ended) removes a viewer here; a viewer that stops reading
//! altogether is cut off by the writer's send deadline.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;
use xwebview_core::{ConnectionHandle, ConnectionPool, DirtyRegion, Rect};

use crate::application::frame_cycle::EncodedFrame;

/// Sender half of one viewer's outbound queue.
pub type OutboundSender = mpsc::Sender<Outbound>;

/// Pool of live viewers.
pub type ViewerPool = ConnectionPool<Viewer>;

/// One item on a viewer's outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// `MONITOR:` messages sent once after the viewer connects, as one item
    /// so a display with many outputs still takes a single queue slot.
    Monitors(Vec<String>),

    /// A `GETREADY:` header and the binary frame it announces.  The writer
    /// sends both back to back.
    Frame {
        metadata: Arc<str>,
        payload: Arc<[u8]>,
    },
}

/// A registered viewer: its outbound queue plus the screen area it has not
/// received because the queue was full.
#[derive(Debug)]
pub struct Viewer {
    sink: OutboundSender,
    missed: DirtyRegion,
}

impl Viewer {
    pub fn new(sink: OutboundSender) -> Self {
        Self {
            sink,
            missed: DirtyRegion::new(),
        }
    }

    pub fn sink(&self) -> &OutboundSender {
        &self.sink
    }

    /// Area skipped while the queue was full, if any.
    pub fn missed(&self) -> Option<Rect> {
        self.missed.peek()
    }

    /// `true` if the queue can take another item right now.
    pub fn has_room(&self) -> bool {
        self.sink.capacity() > 0
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Viewers the frame was queued for.
    pub delivered: usize,
    /// Viewers whose queue was full; the frame's area is kept as missed.
    pub deferred: Vec<ConnectionHandle>,
    /// Viewers removed because their queue was closed.
    pub dropped: Vec<ConnectionHandle>,
}

/// Queues `frame` for every viewer in `pool`, in iteration order.
///
/// Viewers whose queue is closed are removed from the pool.
pub fn broadcast(pool: &mut ViewerPool, frame: &EncodedFrame) -> BroadcastReport {
    let mut report = BroadcastReport::default();
    let rect = frame.metadata.rect();

    for handle in pool.handles() {
        let Some(viewer) = pool.get_mut(handle) else {
            continue;
        };
        let item = Outbound::Frame {
            metadata: Arc::clone(&frame.header),
            payload: Arc::clone(&frame.payload),
        };
        match viewer.sink.try_send(item) {
            Ok(()) => {
                if viewer.missed().is_some_and(|missed| missed.union(&rect) == rect) {
                    viewer.missed.take();
                }
                report.delivered += 1;
            }
            Err(TrySendError::Full(_)) => {
                debug!(%handle, ?rect, "viewer queue full; deferring area");
                viewer.missed.merge(rect);
                report.deferred.push(handle);
            }
            Err(TrySendError::Closed(_)) => {
                debug!(%handle, "viewer queue closed");
                report.dropped.push(handle);
            }
        }
    }

    for handle in &report.dropped {
        pool.remove(*handle);
    }

    report
}

/// Union of the missed areas of every viewer whose queue has room again.
pub fn catch_up_region(pool: &ViewerPool) -> Option<Rect> {
    let mut region = DirtyRegion::new();
    for (_, viewer) in pool.iter() {
        if let Some(missed) = viewer.missed().filter(|_| viewer.has_room()) {
            region.merge(missed);
        }
    }
    region.take()
}

/// `true` if any viewer still has a missed area to catch up on.
pub fn has_backlog(pool: &ViewerPool) -> bool {
    pool.iter().any(|(_, viewer)| viewer.missed().is_some())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
