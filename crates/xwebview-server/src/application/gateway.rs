//! Websocket lifecycle callbacks.
//!
//! The websocket server calls into [`Gateway`] for the three events of a
//! viewer's life: open, message, close.  Open and close are forwarded to the
//! coordinator; messages are parsed and translated right here, because
//! injection does not touch the pool.  The injector call itself runs on the
//! blocking pool, since the XTest adapter waits for X server replies.
//!
//! Malformed client input is dropped with a `debug!` line.  It is never
//! answered and never ends the session.

use std::sync::Arc;

use tracing::{debug, warn};
use xwebview_core::{translate, ConnectionHandle, InputCommand, InputEvent};

use crate::application::broadcast::OutboundSender;
use crate::application::coordinator::{CoordinatorHandle, OpenError};
use crate::application::inject::{execute, InputInjector};

/// Connection lifecycle entry points shared by every websocket session.
pub struct Gateway {
    coordinator: CoordinatorHandle,
    injector: Arc<dyn InputInjector>,
}

impl Gateway {
    pub fn new(coordinator: CoordinatorHandle, injector: Arc<dyn InputInjector>) -> Self {
        Self {
            coordinator,
            injector,
        }
    }

    /// Registers a new viewer whose outbound queue is `sink`.
    ///
    /// # Errors
    ///
    /// [`OpenError`] when the pool is full or the server is shutting down;
    /// the caller closes the connection.
    pub async fn on_open(&self, sink: OutboundSender) -> Result<ConnectionHandle, OpenError> {
        self.coordinator.open(sink).await
    }

    /// Removes a viewer.  Closing an unknown handle is not an error.
    pub async fn on_close(&self, handle: ConnectionHandle) {
        self.coordinator.close(handle).await;
    }

    /// Handles one text message from a viewer.
    ///
    /// Returns the command that was injected, or `None` when the message was
    /// malformed, had no command, or injection failed.  Messages from one
    /// session are injected in arrival order: the caller awaits each one.
    pub async fn on_message(&self, handle: ConnectionHandle, text: &str) -> Option<InputCommand> {
        let event = match InputEvent::parse(text) {
            Ok(event) => event,
            Err(e) => {
                debug!(%handle, "ignoring malformed input {text:?}: {e}");
                return None;
            }
        };

        let command = translate(&event)?;
        let injector = Arc::clone(&self.injector);
        let outcome = tokio::task::spawn_blocking({
            let command = command.clone();
            move || execute(injector.as_ref(), &command)
        })
        .await;

        match outcome {
            Ok(Ok(())) => {
                debug!(%handle, "injected: {command}");
                Some(command)
            }
            Ok(Err(e)) => {
                warn!(%handle, "cannot inject {command}: {e}");
                None
            }
            Err(e) => {
                warn!(%handle, "injection task failed for {command}: {e}");
                None
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
