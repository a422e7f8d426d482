//! Process signals → shutdown flag.
//!
//! SIGINT, SIGTERM and SIGQUIT all mean "shut down".  One listener task turns
//! each of them into a `true` on the shutdown `watch` channel; the
//! coordinator reacts to that.  Repeated signals only log.

use anyhow::Context;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Installs the signal handlers and spawns the listener task.
///
/// # Errors
///
/// Returns an error if a handler cannot be installed.
pub fn spawn_signal_listener(shutdown: watch::Sender<bool>) -> anyhow::Result<JoinHandle<()>> {
    let mut sigint = signal(SignalKind::interrupt()).context("cannot install SIGINT handler")?;
    let mut sigterm = signal(SignalKind::terminate()).context("cannot install SIGTERM handler")?;
    let mut sigquit = signal(SignalKind::quit()).context("cannot install SIGQUIT handler")?;

    Ok(tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                _ = sigint.recv() => "SIGINT",
                _ = sigterm.recv() => "SIGTERM",
                _ = sigquit.recv() => "SIGQUIT",
            };
            request_shutdown(&shutdown, name);
        }
    }))
}

/// Sets the shutdown flag.  Returns `true` the first time only.
pub fn request_shutdown(shutdown: &watch::Sender<bool>, reason: &str) -> bool {
    let first = !shutdown.send_replace(true);
    if first {
        info!("received {reason}; shutting down");
    } else {
        info!("received {reason}; shutdown already in progress");
    }
    first
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shutdown_is_idempotent() {
        // Arrange
        let (tx, rx) = watch::channel(false);

        // Act
        let first = request_shutdown(&tx, "SIGTERM");
        let second = request_shutdown(&tx, "SIGINT");

        // Assert
        assert!(first);
        assert!(!second);
        assert!(*rx.borrow());
    }
}
