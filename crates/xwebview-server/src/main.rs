//! xwebview: view and control an X11 desktop from a web browser.
//!
//! This binary captures the screen of an X display, streams changed regions
//! to every connected browser as LZ4-compressed frames over WebSocket, and
//! replays the browsers' mouse and keyboard input on the display.  A small
//! HTTP server hands out the web client itself.
//!
//! # Usage
//!
//! ```text
//! xwebview [OPTIONS]
//!
//! Options:
//!   --config <PATH>          TOML config file
//!   --ws-bind <IP>           WebSocket bind address        [default: 0.0.0.0]
//!   --ws-port <PORT>         WebSocket port                [default: 8080]
//!   --http-bind <IP>         Static file server address    [default: 0.0.0.0]
//!   --http-port <PORT>       Static file server port       [default: 5123]
//!   --web-root <DIR>         Directory with the web client [default: .]
//!   --max-connections <N>    Simultaneous viewers          [default: 8]
//!   --display <NAME>         X display, e.g. :1            [default: $DISPLAY]
//!   --send-timeout <SECS>    Per-send deadline per viewer  [default: 5]
//!   --log-level <FILTER>     Used when RUST_LOG is unset   [default: info]
//! ```
//!
//! # Environment variable overrides
//!
//! Every flag can also be set with an environment variable.  Flags win over
//! variables, variables win over the config file.
//!
//! | Variable                   | Flag                |
//! |----------------------------|---------------------|
//! | `XWEBVIEW_CONFIG`          | `--config`          |
//! | `XWEBVIEW_WS_BIND`         | `--ws-bind`         |
//! | `XWEBVIEW_WS_PORT`         | `--ws-port`         |
//! | `XWEBVIEW_HTTP_BIND`       | `--http-bind`       |
//! | `XWEBVIEW_HTTP_PORT`       | `--http-port`       |
//! | `XWEBVIEW_WEB_ROOT`        | `--web-root`        |
//! | `XWEBVIEW_MAX_CONNECTIONS` | `--max-connections` |
//! | `XWEBVIEW_DISPLAY`         | `--display`         |
//! | `XWEBVIEW_SEND_TIMEOUT`    | `--send-timeout`    |
//! | `XWEBVIEW_LOG_LEVEL`       | `--log-level`       |
//!
//! # Exit status
//!
//! Non-zero when startup fails: the display cannot be opened, a port cannot
//! be bound, or the configuration is invalid.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use xwebview_server::domain::ServerConfig;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Streams an X11 display to web browsers.
///
/// Every option is optional: unset options keep the value from the config
/// file, or the built-in default when there is no file.
#[derive(Debug, Default, Parser)]
#[command(
    name = "xwebview",
    about = "Stream an X11 display to web browsers over WebSocket",
    version
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "XWEBVIEW_CONFIG")]
    config: Option<PathBuf>,

    /// IP address for the WebSocket server.
    #[arg(long, env = "XWEBVIEW_WS_BIND")]
    ws_bind: Option<IpAddr>,

    /// Port for the WebSocket server.
    #[arg(long, env = "XWEBVIEW_WS_PORT")]
    ws_port: Option<u16>,

    /// IP address for the static file server.
    #[arg(long, env = "XWEBVIEW_HTTP_BIND")]
    http_bind: Option<IpAddr>,

    /// Port for the static file server.
    #[arg(long, env = "XWEBVIEW_HTTP_PORT")]
    http_port: Option<u16>,

    /// Directory containing `index.html` and the client scripts.
    #[arg(long, env = "XWEBVIEW_WEB_ROOT")]
    web_root: Option<PathBuf>,

    /// Maximum number of simultaneous viewers.
    #[arg(long, env = "XWEBVIEW_MAX_CONNECTIONS")]
    max_connections: Option<usize>,

    /// X display to stream, e.g. `:1`.
    #[arg(long, env = "XWEBVIEW_DISPLAY")]
    display: Option<String>,

    /// Seconds a single send to a viewer may take before it is dropped.
    #[arg(long, env = "XWEBVIEW_SEND_TIMEOUT")]
    send_timeout: Option<u64>,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, env = "XWEBVIEW_LOG_LEVEL")]
    log_level: Option<String>,
}

fn override_addr(addr: &mut SocketAddr, ip: Option<IpAddr>, port: Option<u16>) {
    if let Some(ip) = ip {
        addr.set_ip(ip);
    }
    if let Some(port) = port {
        addr.set_port(port);
    }
}

impl Cli {
    /// Builds the effective [`ServerConfig`]: defaults, then the config file,
    /// then the flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if
    /// the combined values are invalid.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)
                .with_context(|| format!("cannot load config file {}", path.display()))?,
            None => ServerConfig::default(),
        };

        override_addr(&mut config.ws_bind_addr, self.ws_bind, self.ws_port);
        override_addr(&mut config.http_bind_addr, self.http_bind, self.http_port);
        if let Some(web_root) = self.web_root {
            config.web_root = web_root;
        }
        if let Some(max) = self.max_connections {
            config.max_connections = max;
        }
        if self.display.is_some() {
            config.display = self.display;
        }
        if let Some(secs) = self.send_timeout {
            config.send_timeout_secs = secs;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_server_config()?;

    // `RUST_LOG` wins; otherwise the configured level.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "xwebview starting — ws={}, http={}, display={}",
        config.ws_bind_addr,
        config.http_bind_addr,
        config.display.as_deref().unwrap_or("$DISPLAY")
    );

    xwebview_server::infrastructure::run(config).await
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_no_flags_gives_defaults() {
        // Arrange
        let cli = Cli::parse_from(["xwebview"]);

        // Act
        let config = cli.into_server_config().unwrap();

        // Assert
        assert_eq!(config.ws_bind_addr.port(), 8080);
        assert_eq!(config.http_bind_addr.port(), 5123);
        assert_eq!(config.max_connections, 8);
    }

    #[test]
    fn test_port_flag_keeps_bind_ip() {
        let cli = Cli::parse_from(["xwebview", "--ws-port", "9000"]);
        let config = cli.into_server_config().unwrap();
        assert_eq!(config.ws_bind_addr.to_string(), "0.0.0.0:9000");
    }

    #[test]
    fn test_bind_flag_keeps_port() {
        let cli = Cli::parse_from(["xwebview", "--http-bind", "127.0.0.1"]);
        let config = cli.into_server_config().unwrap();
        assert_eq!(config.http_bind_addr.to_string(), "127.0.0.1:5123");
    }

    #[test]
    fn test_invalid_bind_ip_is_a_parse_error() {
        assert!(Cli::try_parse_from(["xwebview", "--ws-bind", "not.an.ip"]).is_err());
    }

    #[test]
    fn test_display_and_timeout_flags() {
        let cli = Cli::parse_from(["xwebview", "--display", ":3", "--send-timeout", "9"]);
        let config = cli.into_server_config().unwrap();
        assert_eq!(config.display.as_deref(), Some(":3"));
        assert_eq!(config.send_timeout_secs, 9);
    }

    #[test]
    fn test_zero_max_connections_is_rejected() {
        let cli = Cli {
            max_connections: Some(0),
            ..Cli::default()
        };
        assert!(cli.into_server_config().is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        // Arrange
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_connections = 3\nweb_root = \"/srv/xwebview\"").unwrap();
        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            max_connections: Some(5),
            ..Cli::default()
        };

        // Act
        let config = cli.into_server_config().unwrap();

        // Assert
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.web_root, PathBuf::from("/srv/xwebview"));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/xwebview.toml")),
            ..Cli::default()
        };
        assert!(cli.into_server_config().is_err());
    }
}
