//! Process wiring: builds every component from a [`ServerConfig`] and runs
//! until shutdown.
//!
//! # Startup order
//!
//! 1. Open the display used for outputs and pixel capture.
//! 2. Bind the websocket and HTTP listeners.
//! 3. Open the XTest connection.
//! 4. Create the region channel and start the capture loop.
//! 5. Install the signal listener.
//! 6. Spawn the static-file server and the coordinator.
//! 7. Run the websocket accept loop until shutdown, then wait for the
//!    coordinator's teardown.
//!
//! Any failure in steps 1–5 is fatal: it is returned with context and the
//! binary exits non-zero.  Nothing is retried.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::info;
use xwebview_core::FrameEncoder;

use crate::application::coordinator::{Coordinator, CoordinatorParts};
use crate::application::gateway::Gateway;
use crate::domain::ServerConfig;
use crate::infrastructure::signals::spawn_signal_listener;
use crate::infrastructure::static_files;
use crate::infrastructure::ws_server::{run_server, SessionSettings};
use crate::infrastructure::x11::{DamageWatcher, X11Display, XTestInjector};

/// Runs the server until a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if the display cannot be opened, a listener cannot be
/// bound, or a required X extension is missing.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let display_name = config.display.as_deref();

    let display = X11Display::connect(display_name).context("cannot open the X display")?;

    let ws_listener = TcpListener::bind(config.ws_bind_addr)
        .await
        .with_context(|| format!("failed to bind websocket listener on {}", config.ws_bind_addr))?;
    let http_listener = TcpListener::bind(config.http_bind_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {}", config.http_bind_addr))?;

    let injector =
        XTestInjector::connect(display_name).context("cannot set up input injection")?;

    let (region_tx, region_rx) = mpsc::channel(config.region_queue_capacity);
    let capture =
        DamageWatcher::start(display_name, region_tx).context("cannot start the capture loop")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signals = spawn_signal_listener(shutdown_tx)?;

    let static_server = tokio::spawn(static_files::serve(http_listener, config.web_root.clone()));

    let (coordinator, handle) = Coordinator::new(CoordinatorParts {
        display: Arc::new(display),
        encoder: FrameEncoder::new(),
        max_connections: config.max_connections,
        regions: region_rx,
        shutdown: shutdown_rx.clone(),
        capture: Some(Box::new(capture)),
        static_server: Some(static_server),
    });
    let coordinator = tokio::spawn(coordinator.run());

    let gateway = Arc::new(Gateway::new(handle, Arc::new(injector)));
    info!(
        ws = %config.ws_bind_addr,
        http = %config.http_bind_addr,
        max_connections = config.max_connections,
        "xwebview running"
    );
    run_server(ws_listener, gateway, SessionSettings::from(&config), shutdown_rx).await;

    let stats = coordinator.await.context("coordinator task failed")?;
    signals.abort();
    info!(
        frames = stats.frames_broadcast,
        failed = stats.failed_cycles,
        deferred = stats.frames_deferred,
        dropped_viewers = stats.viewers_dropped,
        "xwebview stopped"
    );
    Ok(())
}
