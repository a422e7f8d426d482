//! The coordinator: single owner of the viewer pool, the pending dirty region
//! and the display.
//!
//! # How the coordinator works (for beginners)
//!
//! Everything that changes shared state goes through one task, so no locks
//! are needed.  The task sleeps until one of four things happens:
//!
//! | Wake reason            | Source                     | Reaction                         |
//! |------------------------|----------------------------|----------------------------------|
//! | shutdown signal        | `watch` channel            | run the teardown once, then exit |
//! | open / close / stats   | [`CoordinatorHandle`]      | register or remove a viewer      |
//! | damage rectangle       | region channel (capture)   | run a broadcast cycle            |
//! | catch-up timer         | armed while viewers lag    | run a broadcast cycle            |
//!
//! A **broadcast cycle** drains every rectangle already queued, unions them
//! into the [`DirtyRegion`] and, if anyone is watching, captures that
//! rectangle, compresses it on the blocking pool and queues the result for
//! every viewer.  The coordinator awaits the blocking work, so cycles never
//! overlap and a cycle is never abandoned half way.
//!
//! A viewer whose queue was full during a broadcast keeps the skipped area
//! as its missed region (see [`broadcast`](crate::application::broadcast)).
//! While any viewer has one, a short timer re-runs the cycle; once that
//! viewer's queue has room the missed area is captured along with any new
//! damage.
//!
//! When a viewer **opens**, it first receives one `MONITOR:` message per
//! output, then the region is reset to the whole screen and a cycle runs, so
//! the new viewer gets a complete picture immediately.
//!
//! Every display call (output enumeration, capture) and the capture-thread
//! join run on the blocking pool; the coordinator task itself never waits on
//! the X server.
//!
//! # Teardown order
//!
//! 1. Close the region channel, so a capture thread blocked on a full channel
//!    wakes up.
//! 2. Stop the capture loop and wait for its thread.
//! 3. Abort the static-file server without waiting for in-flight requests.
//! 4. Drain the pool; dropping each queue sender ends that viewer's session.
//! 5. Release the display.
//!
//! Teardown runs at most once; later requests are no-ops.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use xwebview_core::{
    ConnectionHandle, DirtyRegion, FrameEncoder, OutputInfo, PoolError, Rect, ServerMessage,
};

use crate::application::broadcast::{
    broadcast, catch_up_region, has_backlog, Outbound, OutboundSender, Viewer, ViewerPool,
};
use crate::application::display::{CaptureControl, DisplaySource};
use crate::application::frame_cycle::capture_and_encode;

/// Control requests queued for one coordinator; small because every request
/// is answered quickly.
const CONTROL_QUEUE_CAPACITY: usize = 32;

/// Delay between catch-up attempts while a viewer's queue is full.
const CATCH_UP_INTERVAL: Duration = Duration::from_millis(25);

/// Why a viewer could not be registered.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OpenError {
    #[error(transparent)]
    Full(#[from] PoolError),

    /// The viewer's queue refused the `MONITOR:` messages.
    #[error("viewer queue rejected the monitor list")]
    QueueUnavailable,

    #[error("coordinator has shut down")]
    Stopped,
}

/// Counters exposed for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Viewers currently in the pool.
    pub viewers: usize,
    /// Cycles that produced a frame and handed it to the pool.
    pub frames_broadcast: u64,
    /// Cycles skipped because nobody was watching.
    pub idle_cycles: u64,
    /// Cycles whose capture or compression failed.
    pub failed_cycles: u64,
    /// Frames a viewer skipped because its queue was full.
    pub frames_deferred: u64,
    /// Viewers removed because their queue was closed.
    pub viewers_dropped: u64,
}

enum Control {
    Open {
        sink: OutboundSender,
        reply: oneshot::Sender<Result<ConnectionHandle, OpenError>>,
    },
    Close(ConnectionHandle),
    Stats(oneshot::Sender<CoordinatorStats>),
}

/// Cloneable handle used by websocket sessions to talk to the coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    control: mpsc::Sender<Control>,
}

impl CoordinatorHandle {
    /// Registers a viewer whose outbound queue is `sink`.
    ///
    /// On success the viewer's `MONITOR:` messages are already queued and a
    /// full-screen frame follows.
    ///
    /// # Errors
    ///
    /// [`OpenError::Full`] when the pool is at capacity (the sink is dropped,
    /// which closes the viewer's writer), [`OpenError::QueueUnavailable`] if
    /// the sink refused the monitor list, [`OpenError::Stopped`] after
    /// shutdown.
    pub async fn open(&self, sink: OutboundSender) -> Result<ConnectionHandle, OpenError> {
        let (reply, response) = oneshot::channel();
        self.control
            .send(Control::Open { sink, reply })
            .await
            .map_err(|_| OpenError::Stopped)?;
        response.await.map_err(|_| OpenError::Stopped)?
    }

    /// Removes a viewer.  Unknown or already removed handles are ignored.
    pub async fn close(&self, handle: ConnectionHandle) {
        // After shutdown the pool is already gone.
        let _ = self.control.send(Control::Close(handle)).await;
    }

    /// Returns the current counters, or `None` after shutdown.
    pub async fn stats(&self) -> Option<CoordinatorStats> {
        let (reply, response) = oneshot::channel();
        self.control.send(Control::Stats(reply)).await.ok()?;
        response.await.ok()
    }
}

/// Everything a coordinator owns, handed over at construction.
pub struct CoordinatorParts {
    pub display: Arc<dyn DisplaySource>,
    pub encoder: FrameEncoder,
    pub max_connections: usize,
    /// Receiving end of the capture loop's region channel.
    pub regions: mpsc::Receiver<Rect>,
    pub shutdown: watch::Receiver<bool>,
    /// Control of the capture loop, stopped during teardown.
    pub capture: Option<Box<dyn CaptureControl>>,
    /// The static-file server task, aborted during teardown.
    pub static_server: Option<JoinHandle<()>>,
}

enum Wake {
    Terminate,
    Control(Control),
    Region(Option<Rect>),
    CatchUp,
}

/// The supervising task.  See the module docs.
pub struct Coordinator {
    display: Option<Arc<dyn DisplaySource>>,
    encoder: FrameEncoder,
    pool: ViewerPool,
    region: DirtyRegion,
    regions: mpsc::Receiver<Rect>,
    regions_open: bool,
    control: mpsc::Receiver<Control>,
    shutdown: watch::Receiver<bool>,
    capture: Option<Box<dyn CaptureControl>>,
    static_server: Option<JoinHandle<()>>,
    catch_up_at: Option<Instant>,
    stats: CoordinatorStats,
    terminated: bool,
}

impl Coordinator {
    /// Creates a coordinator and the handle sessions use to reach it.
    pub fn new(parts: CoordinatorParts) -> (Self, CoordinatorHandle) {
        let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE_CAPACITY);
        let coordinator = Self {
            display: Some(parts.display),
            encoder: parts.encoder,
            pool: ViewerPool::with_capacity(parts.max_connections),
            region: DirtyRegion::new(),
            regions: parts.regions,
            regions_open: true,
            control: control_rx,
            shutdown: parts.shutdown,
            capture: parts.capture,
            static_server: parts.static_server,
            catch_up_at: None,
            stats: CoordinatorStats::default(),
            terminated: false,
        };
        (
            coordinator,
            CoordinatorHandle {
                control: control_tx,
            },
        )
    }

    /// Runs until shutdown is signalled (or every handle and the shutdown
    /// sender are gone), then tears down.  Returns the final counters.
    pub async fn run(mut self) -> CoordinatorStats {
        info!(capacity = self.pool.capacity(), "coordinator started");

        loop {
            let catch_up_at = self.catch_up_at;
            let wake = tokio::select! {
                changed = self.shutdown.wait_for(|stop| *stop) => {
                    if changed.is_err() {
                        debug!("shutdown sender dropped");
                    }
                    Wake::Terminate
                }
                request = self.control.recv() => match request {
                    Some(request) => Wake::Control(request),
                    None => Wake::Terminate,
                },
                rect = self.regions.recv(), if self.regions_open => Wake::Region(rect),
                _ = tokio::time::sleep_until(catch_up_at.unwrap_or_else(Instant::now)),
                    if catch_up_at.is_some() => Wake::CatchUp,
            };

            match wake {
                Wake::Terminate => break,
                Wake::Control(request) => self.handle_control(request).await,
                Wake::Region(Some(rect)) => {
                    self.region.merge(rect);
                    self.drain_regions();
                    self.run_cycle().await;
                }
                Wake::Region(None) => {
                    warn!("capture loop stopped; no further screen updates will be sent");
                    self.regions_open = false;
                }
                Wake::CatchUp => {
                    self.catch_up_at = None;
                    self.drain_regions();
                    self.run_cycle().await;
                }
            }
        }

        self.terminate().await;
        self.stats
    }

    /// Releases every resource the coordinator owns.  Idempotent.
    pub async fn terminate(&mut self) {
        if self.terminated {
            debug!("terminate requested again; already done");
            return;
        }
        self.terminated = true;
        info!("coordinator shutting down");

        self.regions.close();
        self.regions_open = false;
        if let Some(mut capture) = self.capture.take() {
            // Stopping joins the capture thread.
            if let Err(e) = tokio::task::spawn_blocking(move || capture.stop()).await {
                warn!("stopping the capture loop failed: {e}");
            }
        }
        if let Some(task) = self.static_server.take() {
            task.abort();
        }
        let viewers = self.pool.drain();
        info!(viewers = viewers.len(), "closing viewer connections");
        drop(viewers);
        self.control.close();
        self.catch_up_at = None;
        self.display = None;
        self.stats.viewers = 0;
    }

    /// Current counters.
    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            viewers: self.pool.len(),
            ..self.stats
        }
    }

    async fn handle_control(&mut self, request: Control) {
        match request {
            Control::Open { sink, reply } => {
                let result = self.open(sink).await;
                let opened = result.is_ok();
                if reply.send(result).is_err() {
                    debug!("viewer went away before registration completed");
                }
                if opened {
                    self.run_cycle().await;
                }
            }
            Control::Close(handle) => {
                if self.pool.remove(handle).is_some() {
                    info!(%handle, viewers = self.pool.len(), "viewer closed");
                    self.schedule_catch_up();
                }
            }
            Control::Stats(reply) => {
                let _ = reply.send(self.stats());
            }
        }
    }

    async fn open(&mut self, sink: OutboundSender) -> Result<ConnectionHandle, OpenError> {
        let Some(display) = self.display.clone() else {
            return Err(OpenError::Stopped);
        };

        let handle = self.pool.insert(Viewer::new(sink)).map_err(|e| {
            warn!("rejecting viewer: {e}");
            OpenError::from(e)
        })?;

        let outputs = tokio::task::spawn_blocking({
            let display = Arc::clone(&display);
            move || display.outputs()
        })
        .await;
        let monitors = match outputs {
            Ok(Ok(outputs)) => monitor_messages(outputs),
            Ok(Err(e)) => {
                warn!("cannot enumerate outputs: {e}");
                Vec::new()
            }
            Err(e) => {
                warn!("output enumeration task failed: {e}");
                Vec::new()
            }
        };

        let queued = self
            .pool
            .get(handle)
            .is_some_and(|viewer| viewer.sink().try_send(Outbound::Monitors(monitors)).is_ok());
        if !queued {
            self.pool.remove(handle);
            warn!(%handle, "viewer queue closed before the monitor list was sent");
            return Err(OpenError::QueueUnavailable);
        }

        self.region.reset(display.bounds());
        info!(%handle, viewers = self.pool.len(), "viewer opened");
        Ok(handle)
    }

    /// Unions every rectangle already waiting in the channel.
    fn drain_regions(&mut self) {
        while let Ok(rect) = self.regions.try_recv() {
            self.region.merge(rect);
        }
    }

    /// Arms the catch-up timer while any viewer has a missed area.
    fn schedule_catch_up(&mut self) {
        self.catch_up_at = if has_backlog(&self.pool) {
            Some(
                self.catch_up_at
                    .unwrap_or_else(|| Instant::now() + CATCH_UP_INTERVAL),
            )
        } else {
            None
        };
    }

    async fn run_cycle(&mut self) {
        if self.pool.is_empty() {
            self.region.take();
            self.catch_up_at = None;
            self.stats.idle_cycles += 1;
            return;
        }
        let Some(display) = self.display.clone() else {
            return;
        };

        let pending = match (self.region.take(), catch_up_region(&self.pool)) {
            (Some(damage), Some(missed)) => Some(damage.union(&missed)),
            (Some(rect), None) | (None, Some(rect)) => Some(rect),
            (None, None) => None,
        };
        match pending.map(|pending| (pending, pending.intersect(&display.bounds()))) {
            Some((_, Some(rect))) => self.capture_and_broadcast(display, rect).await,
            Some((pending, None)) => debug!(?pending, "damage outside the screen; skipping"),
            None => {}
        }

        self.schedule_catch_up();
    }

    async fn capture_and_broadcast(&mut self, display: Arc<dyn DisplaySource>, rect: Rect) {
        let encoder = self.encoder;
        let outcome =
            tokio::task::spawn_blocking(move || capture_and_encode(display.as_ref(), &encoder, rect))
                .await;

        match outcome {
            Ok(Ok(frame)) => {
                let report = broadcast(&mut self.pool, &frame);
                self.stats.frames_broadcast += 1;
                self.stats.frames_deferred += report.deferred.len() as u64;
                self.stats.viewers_dropped += report.dropped.len() as u64;
                debug!(
                    ?rect,
                    bytes = frame.payload.len(),
                    delivered = report.delivered,
                    deferred = report.deferred.len(),
                    dropped = report.dropped.len(),
                    "frame broadcast"
                );
            }
            Ok(Err(e)) => {
                self.stats.failed_cycles += 1;
                warn!(?rect, "frame cycle failed: {e}");
            }
            Err(e) => {
                self.stats.failed_cycles += 1;
                warn!(?rect, "frame cycle task failed: {e}");
            }
        }
    }
}

fn monitor_messages(outputs: Vec<OutputInfo>) -> Vec<String> {
    outputs
        .into_iter()
        .filter_map(|output| ServerMessage::Monitor(output).to_text().ok())
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::{MockCapture, MockDisplay};

    fn coordinator_with(display: MockDisplay, capacity: usize) -> (Coordinator, mpsc::Sender<Rect>) {
        let (region_tx, region_rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (coordinator, _handle) = Coordinator::new(CoordinatorParts {
            display: Arc::new(display),
            encoder: FrameEncoder::new(),
            max_connections: capacity,
            regions: region_rx,
            shutdown: shutdown_rx,
            capture: None,
            static_server: None,
        });
        (coordinator, region_tx)
    }

    fn small_display() -> MockDisplay {
        MockDisplay::with_outputs(vec![OutputInfo {
            x: 0,
            y: 0,
            w: 64,
            h: 32,
        }])
    }

    fn frame_rect(item: Outbound) -> Rect {
        match item {
            Outbound::Frame { metadata, .. } => match ServerMessage::parse(&metadata) {
                Ok(ServerMessage::GetReady(meta)) => meta.rect(),
                other => panic!("expected GETREADY, got {other:?}"),
            },
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_open_queues_one_monitor_message_per_output() {
        // Arrange
        let (mut coordinator, _regions) = coordinator_with(MockDisplay::dual_1440p(), 2);
        let (tx, mut rx) = mpsc::channel(4);

        // Act
        coordinator.open(tx).await.unwrap();

        // Assert
        match rx.try_recv().unwrap() {
            Outbound::Monitors(texts) => {
                assert_eq!(
                    texts,
                    vec![
                        r#"MONITOR:{"x":0,"y":0,"w":2560,"h":1440}"#.to_string(),
                        r#"MONITOR:{"x":2560,"y":0,"w":2560,"h":1440}"#.to_string(),
                    ]
                );
            }
            other => panic!("expected monitors, got {other:?}"),
        }
        assert_eq!(coordinator.region.peek(), Some(Rect::full_screen(5120, 1440)));
    }

    #[tokio::test]
    async fn test_open_rejects_when_full() {
        let (mut coordinator, _regions) = coordinator_with(MockDisplay::single_1080p(), 1);
        let (tx_a, _rx_a) = mpsc::channel(4);
        let (tx_b, _rx_b) = mpsc::channel(4);

        coordinator.open(tx_a).await.unwrap();
        let result = coordinator.open(tx_b).await;

        assert_eq!(result, Err(OpenError::Full(PoolError::Full { capacity: 1 })));
        assert_eq!(coordinator.stats().viewers, 1);
    }

    #[tokio::test]
    async fn test_open_with_closed_queue_is_not_reported_as_full() {
        // Arrange: the session's receiver is already gone
        let (mut coordinator, _regions) = coordinator_with(small_display(), 4);
        let (tx, rx) = mpsc::channel(4);
        drop(rx);

        // Act
        let result = coordinator.open(tx).await;

        // Assert
        assert_eq!(result, Err(OpenError::QueueUnavailable));
        assert_eq!(coordinator.stats().viewers, 0);
    }

    #[tokio::test]
    async fn test_open_after_terminate_reports_stopped() {
        let (mut coordinator, _regions) = coordinator_with(small_display(), 4);
        coordinator.terminate().await;

        let result = coordinator.open(mpsc::channel(4).0).await;

        assert_eq!(result, Err(OpenError::Stopped));
    }

    #[tokio::test]
    async fn test_cycle_with_empty_pool_does_no_capture() {
        // Arrange
        let display = MockDisplay::single_1080p();
        let captures = display.capture_log();
        let (mut coordinator, _regions) = coordinator_with(display, 2);
        coordinator.region.merge(Rect::new(0, 0, 10, 10));

        // Act
        coordinator.run_cycle().await;

        // Assert
        assert!(captures.lock().unwrap().is_empty());
        assert_eq!(coordinator.stats().idle_cycles, 1);
        assert!(coordinator.region.is_clean());
    }

    #[tokio::test]
    async fn test_cycle_clips_damage_to_screen() {
        let display = MockDisplay::single_1080p();
        let captures = display.capture_log();
        let (mut coordinator, _regions) = coordinator_with(display, 2);
        let (tx, _rx) = mpsc::channel(4);
        coordinator.open(tx).await.unwrap();
        coordinator.region.take();
        coordinator.region.merge(Rect::new(1900, 1070, 100, 100));

        coordinator.run_cycle().await;

        assert_eq!(
            captures.lock().unwrap().as_slice(),
            &[Rect::new(1900, 1070, 20, 10)]
        );
    }

    #[tokio::test]
    async fn test_failed_capture_sends_nothing() {
        let (mut coordinator, _regions) =
            coordinator_with(MockDisplay::single_1080p().failing(), 2);
        let (tx, mut rx) = mpsc::channel(4);
        coordinator.open(tx).await.unwrap();
        let _monitors = rx.try_recv().unwrap();

        coordinator.run_cycle().await;

        assert!(rx.try_recv().is_err());
        assert_eq!(coordinator.stats().failed_cycles, 1);
        assert_eq!(coordinator.stats().viewers, 1);
    }

    #[tokio::test]
    async fn test_viewer_with_full_queue_catches_up_once_it_reads() {
        // Arrange: a two-slot queue filled by the monitor list and the first frame
        let (mut coordinator, _regions) = coordinator_with(small_display(), 2);
        let (tx, mut rx) = mpsc::channel(2);
        coordinator.open(tx).await.unwrap();
        coordinator.run_cycle().await;

        // Act: damage arrives while the queue is full
        coordinator.region.merge(Rect::new(4, 4, 8, 8));
        coordinator.run_cycle().await;

        // Assert: the viewer is kept and the area is remembered
        let stats = coordinator.stats();
        assert_eq!(stats.viewers, 1);
        assert_eq!(stats.frames_deferred, 1);
        assert_eq!(stats.viewers_dropped, 0);
        assert!(coordinator.catch_up_at.is_some());

        // Act: the viewer reads one item, then the catch-up cycle runs
        assert!(matches!(rx.try_recv().unwrap(), Outbound::Monitors(_)));
        coordinator.run_cycle().await;

        // Assert: the missed area is delivered and the timer is disarmed
        assert_eq!(frame_rect(rx.try_recv().unwrap()), Rect::full_screen(64, 32));
        assert_eq!(frame_rect(rx.try_recv().unwrap()), Rect::new(4, 4, 8, 8));
        assert!(coordinator.catch_up_at.is_none());
    }

    #[tokio::test]
    async fn test_catch_up_waits_while_queue_is_still_full() {
        let display = small_display();
        let captures = display.capture_log();
        let (mut coordinator, _regions) = coordinator_with(display, 2);
        let (tx, _rx) = mpsc::channel(2);
        coordinator.open(tx).await.unwrap();
        coordinator.run_cycle().await;
        coordinator.region.merge(Rect::new(0, 0, 4, 4));
        coordinator.run_cycle().await;
        let captured = captures.lock().unwrap().len();

        coordinator.run_cycle().await;

        assert_eq!(captures.lock().unwrap().len(), captured);
        assert!(coordinator.catch_up_at.is_some());
    }

    #[tokio::test]
    async fn test_display_calls_and_capture_stop_leave_the_runtime_thread() {
        // Arrange: a current-thread runtime, so the test thread is the runtime
        let runtime_thread = std::thread::current().id();
        let display = small_display();
        let threads = display.thread_log();
        let capture = MockCapture::new();
        let stopped_on = capture.stop_thread();
        let (_region_tx, region_rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (mut coordinator, _handle) = Coordinator::new(CoordinatorParts {
            display: Arc::new(display),
            encoder: FrameEncoder::new(),
            max_connections: 2,
            regions: region_rx,
            shutdown: shutdown_rx,
            capture: Some(Box::new(capture)),
            static_server: None,
        });
        let (tx, _rx) = mpsc::channel(4);

        // Act: open enumerates outputs, the cycle captures, terminate stops
        coordinator.open(tx).await.unwrap();
        coordinator.run_cycle().await;
        coordinator.terminate().await;

        // Assert
        let threads = threads.lock().unwrap();
        assert_eq!(threads.len(), 2);
        assert!(threads.iter().all(|id| *id != runtime_thread));
        let stopped_on = *stopped_on.lock().unwrap();
        assert!(stopped_on.is_some_and(|id| id != runtime_thread));
    }

    #[tokio::test]
    async fn test_terminate_twice_releases_once() {
        // Arrange
        let display = MockDisplay::single_1080p();
        let drops = display.drop_counter();
        let capture = MockCapture::new();
        let stops = capture.stop_counter();
        let (_region_tx, region_rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (mut coordinator, _handle) = Coordinator::new(CoordinatorParts {
            display: Arc::new(display),
            encoder: FrameEncoder::new(),
            max_connections: 2,
            regions: region_rx,
            shutdown: shutdown_rx,
            capture: Some(Box::new(capture)),
            static_server: None,
        });

        // Act
        coordinator.terminate().await;
        coordinator.terminate().await;

        // Assert
        assert_eq!(drops.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(stops.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
