//! Server configuration.
//!
//! [`ServerConfig`] is the single source of truth for all runtime settings.
//! It is built once at startup from three layers, later layers winning:
//!
//! 1. Built-in defaults ([`ServerConfig::default`]).
//! 2. An optional TOML file (`--config`, `XWEBVIEW_CONFIG`).
//! 3. Command-line flags and their `XWEBVIEW_*` environment variables.
//!
//! The domain type itself never reads files or the environment; [`load`]
//! and the CLI in `main.rs` do that and hand the result over.
//!
//! # Config file format
//!
//! Every key is optional; missing keys keep their default:
//!
//! ```toml
//! ws_bind_addr = "0.0.0.0:8080"
//! http_bind_addr = "0.0.0.0:5123"
//! web_root = "/usr/share/xwebview/web"
//! max_connections = 8
//! display = ":1"
//! region_queue_capacity = 64
//! outbound_queue_capacity = 4
//! send_timeout_secs = 5
//! log_level = "info"
//! ```
//!
//! [`load`]: ServerConfig::load

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// All runtime configuration for the xwebview server.
///
/// # Example
///
/// ```rust
/// use xwebview_server::domain::ServerConfig;
///
/// let cfg = ServerConfig::default();
/// assert_eq!(cfg.ws_bind_addr.port(), 8080);
/// assert_eq!(cfg.max_connections, 8);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the websocket server listens on.
    #[serde(default = "default_ws_bind_addr")]
    pub ws_bind_addr: SocketAddr,

    /// Address the static web-asset server listens on.
    #[serde(default = "default_http_bind_addr")]
    pub http_bind_addr: SocketAddr,

    /// Directory the static server serves files from.
    #[serde(default = "default_web_root")]
    pub web_root: PathBuf,

    /// Maximum number of simultaneous viewers.  Further connections are
    /// rejected.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// X display name such as `":0"`.  `None` uses `$DISPLAY`.
    #[serde(default)]
    pub display: Option<String>,

    /// Damage rectangles that may queue up between the capture thread and
    /// the coordinator before the capture thread blocks.
    #[serde(default = "default_region_queue_capacity")]
    pub region_queue_capacity: usize,

    /// Messages that may queue up for one viewer.  When the queue is full
    /// new frames are skipped for that viewer and its missed area is sent
    /// once it has room again.
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,

    /// Deadline for one websocket send to a viewer, in seconds.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,

    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_ws_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}
fn default_http_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5123))
}
fn default_web_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_max_connections() -> usize {
    8
}
fn default_region_queue_capacity() -> usize {
    64
}
fn default_outbound_queue_capacity() -> usize {
    4
}
fn default_send_timeout_secs() -> u64 {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    /// | Field                   | Default        |
    /// |-------------------------|----------------|
    /// | ws_bind_addr            | `0.0.0.0:8080` |
    /// | http_bind_addr          | `0.0.0.0:5123` |
    /// | web_root                | `.`            |
    /// | max_connections         | 8              |
    /// | display                 | `$DISPLAY`     |
    /// | region_queue_capacity   | 64             |
    /// | outbound_queue_capacity | 4              |
    /// | send_timeout_secs       | 5              |
    /// | log_level               | `info`         |
    fn default() -> Self {
        Self {
            ws_bind_addr: default_ws_bind_addr(),
            http_bind_addr: default_http_bind_addr(),
            web_root: default_web_root(),
            max_connections: default_max_connections(),
            display: None,
            region_queue_capacity: default_region_queue_capacity(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
            send_timeout_secs: default_send_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

impl ServerConfig {
    /// Parses a TOML document.  Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed TOML or wrongly typed values,
    /// [`ConfigError::Invalid`] if the result fails [`validate`](Self::validate).
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: ServerConfig = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads and parses the TOML file at `path`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks the values that would make the server misbehave.
    ///
    /// The outbound queue must hold at least two items: the initial monitor
    /// list and the first full frame are queued back to back.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be at least 1".into(),
            ));
        }
        if self.region_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "region_queue_capacity must be at least 1".into(),
            ));
        }
        if self.outbound_queue_capacity < 2 {
            return Err(ConfigError::Invalid(
                "outbound_queue_capacity must be at least 2".into(),
            ));
        }
        if self.send_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "send_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Per-send deadline for viewer websockets.
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_ports() {
        // Arrange / Act
        let cfg = ServerConfig::default();
        // Assert
        assert_eq!(cfg.ws_bind_addr.port(), 8080);
        assert_eq!(cfg.http_bind_addr.port(), 5123);
    }

    #[test]
    fn test_default_limits() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.max_connections, 8);
        assert_eq!(cfg.region_queue_capacity, 64);
        assert_eq!(cfg.outbound_queue_capacity, 4);
        assert_eq!(cfg.send_timeout(), Duration::from_secs(5));
        assert!(cfg.display.is_none());
    }

    #[test]
    fn test_default_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        let cfg = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, ServerConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides_only_given_keys() {
        // Arrange
        let text = r#"
            max_connections = 2
            display = ":1"
        "#;

        // Act
        let cfg = ServerConfig::from_toml_str(text).unwrap();

        // Assert
        assert_eq!(cfg.max_connections, 2);
        assert_eq!(cfg.display.as_deref(), Some(":1"));
        assert_eq!(cfg.ws_bind_addr.port(), 8080);
    }

    #[test]
    fn test_bad_address_is_parse_error() {
        let result = ServerConfig::from_toml_str(r#"ws_bind_addr = "not an address""#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_zero_connections_is_invalid() {
        let result = ServerConfig::from_toml_str("max_connections = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_single_slot_outbound_queue_is_invalid() {
        let result = ServerConfig::from_toml_str("outbound_queue_capacity = 1");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "http_bind_addr = \"127.0.0.1:9000\"").unwrap();

        let cfg = ServerConfig::load(file.path()).unwrap();

        assert_eq!(cfg.http_bind_addr.to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = ServerConfig::load(Path::new("/nonexistent/xwebview.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
