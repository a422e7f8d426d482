//! WebSocket server: accept loop and per-viewer sessions.
//!
//! This module is responsible for:
//!
//! 1. Accepting TCP connections from browsers.
//! 2. Upgrading each connection to a WebSocket session.
//! 3. Registering the session with the [`Gateway`] and giving it a bounded
//!    outbound queue.
//! 4. Running two halves per session:
//!    - **Writer**: drains the outbound queue onto the socket.  A `GETREADY`
//!      item becomes one text message followed by one binary message.  Every
//!      send has a deadline; a viewer that misses it is disconnected.
//!    - **Reader**: hands text messages to the gateway, ignores binary
//!      messages, ends the session on Close.
//! 5. Stopping the accept loop when the shutdown flag is raised.
//!
//! # How a session ends
//!
//! Whichever half finishes first ends the session.  The reader then tells the
//! gateway the viewer is gone, which drops the coordinator's queue sender;
//! the writer sees its queue close, sends a Close frame and exits.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
    WebSocketStream,
};
use tracing::{debug, error, info, warn};

use crate::application::broadcast::Outbound;
use crate::application::gateway::Gateway;
use crate::domain::ServerConfig;

type WsSink = SplitSink<WebSocketStream<TcpStream>, WsMessage>;

/// Per-session limits taken from [`ServerConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Capacity of each viewer's outbound queue.
    pub outbound_queue_capacity: usize,
    /// Deadline for a single websocket send.
    pub send_timeout: Duration,
}

impl From<&ServerConfig> for SessionSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            outbound_queue_capacity: config.outbound_queue_capacity,
            send_timeout: config.send_timeout(),
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Accepts websocket viewers on `listener` until `shutdown` becomes `true`.
///
/// Each connection runs in its own task, so one slow handshake never delays
/// the others.  Sessions that are still open when the loop stops end when
/// the coordinator drops their queues.
pub async fn run_server(
    listener: TcpListener,
    gateway: Arc<Gateway>,
    settings: SessionSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    match listener.local_addr() {
        Ok(addr) => info!("websocket server listening on {addr}"),
        Err(_) => info!("websocket server started"),
    }

    loop {
        tokio::select! {
            _ = shutdown.wait_for(|stop| *stop) => {
                info!("shutdown requested; stopping websocket accept loop");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!("new connection from {peer}");
                    let gateway = Arc::clone(&gateway);
                    tokio::spawn(async move {
                        handle_session(stream, peer, gateway, settings).await;
                    });
                }
                // Transient (e.g. out of file descriptors); keep accepting.
                Err(e) => error!("accept error: {e}"),
            },
        }
    }
}

// ── Per-session handler ───────────────────────────────────────────────────────

async fn handle_session(
    stream: TcpStream,
    peer: SocketAddr,
    gateway: Arc<Gateway>,
    settings: SessionSettings,
) {
    match run_session(stream, peer, &gateway, settings).await {
        Ok(()) => debug!("session {peer} ended"),
        Err(e) => warn!("session {peer} failed: {e:#}"),
    }
}

async fn run_session(
    stream: TcpStream,
    peer: SocketAddr,
    gateway: &Gateway,
    settings: SessionSettings,
) -> anyhow::Result<()> {
    let ws = accept_async(stream)
        .await
        .with_context(|| format!("websocket handshake with {peer} failed"))?;
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (queue_tx, queue_rx) = mpsc::channel(settings.outbound_queue_capacity);
    let handle = match gateway.on_open(queue_tx).await {
        Ok(handle) => handle,
        Err(e) => {
            warn!("rejecting viewer {peer}: {e}");
            // Best effort; the viewer is turned away either way.
            let _ = ws_tx.close().await;
            return Ok(());
        }
    };
    info!(%handle, "viewer {peer} connected");

    let mut writer = tokio::spawn(write_outbound(ws_tx, queue_rx, settings.send_timeout));
    let mut writer_result = None;

    loop {
        tokio::select! {
            result = &mut writer => {
                writer_result = Some(result);
                break;
            }
            message = ws_rx.next() => match message {
                Some(Ok(WsMessage::Text(text))) => {
                    gateway.on_message(handle, &text).await;
                }
                Some(Ok(WsMessage::Binary(_))) => {
                    debug!(%handle, "ignoring binary message");
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    debug!(%handle, "viewer closed the connection");
                    break;
                }
                // Ping/Pong are answered by tungstenite.
                Some(Ok(_)) => {}
                Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => break,
                Some(Err(e)) => {
                    debug!(%handle, "websocket read error: {e}");
                    break;
                }
            },
        }
    }

    gateway.on_close(handle).await;
    let result = match writer_result {
        Some(result) => result,
        None => writer.await,
    };
    info!(%handle, "viewer {peer} disconnected");

    result.context("writer task failed")?
}

/// Drains `queue` onto the socket until the queue closes or a send fails.
async fn write_outbound(
    mut sink: WsSink,
    mut queue: mpsc::Receiver<Outbound>,
    send_timeout: Duration,
) -> anyhow::Result<()> {
    while let Some(item) = queue.recv().await {
        match item {
            Outbound::Monitors(texts) => {
                for text in texts {
                    send(&mut sink, WsMessage::Text(text), send_timeout).await?;
                }
            }
            Outbound::Frame { metadata, payload } => {
                send(&mut sink, WsMessage::Text(metadata.to_string()), send_timeout).await?;
                send(&mut sink, WsMessage::Binary(payload.to_vec()), send_timeout).await?;
            }
        }
    }

    // Queue closed: removed from the pool or shutting down.
    let _ = timeout(send_timeout, sink.close()).await;
    Ok(())
}

async fn send(sink: &mut WsSink, message: WsMessage, limit: Duration) -> anyhow::Result<()> {
    timeout(limit, sink.send(message))
        .await
        .context("send timed out")?
        .context("send failed")
}
