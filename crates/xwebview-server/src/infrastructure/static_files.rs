//! Minimal static-file server for the web client.
//!
//! Serves files from `web_root` over plain HTTP, one request at a time:
//! read one request line, answer, close.  Only `GET` is understood.  The
//! request line may arrive in several TCP segments; reading stops at the
//! first `\n` or after `REQUEST_BUFFER_SIZE` bytes.
//!
//! | Request                      | Response                                   |
//! |------------------------------|--------------------------------------------|
//! | `GET / HTTP/1.1`             | `index.html`                               |
//! | `GET /app.js HTTP/1.1`       | `200 OK`, `application/javascript`         |
//! | path with a `..` component   | `404 Not Found`                            |
//! | missing or unreadable file   | `404 Not Found`                            |
//! | non-`GET` or malformed line  | `404 Not Found`                            |
//!
//! The 404 response is a bare status line with no headers and no body.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Most bytes read from a request; only the request line matters.
const REQUEST_BUFFER_SIZE: usize = 1024;

/// How long a client gets to send its request line.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

const NOT_FOUND: &[u8] = b"HTTP/1.1 404 Not Found\r\n\r\n";

/// Accepts and answers requests sequentially until the task is aborted.
pub async fn serve(listener: TcpListener, root: PathBuf) {
    match listener.local_addr() {
        Ok(addr) => info!("static file server listening on {addr}, root {}", root.display()),
        Err(_) => info!("static file server started, root {}", root.display()),
    }

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                if let Err(e) = handle(stream, &root).await {
                    debug!("static request from {peer} failed: {e}");
                }
            }
            Err(e) => warn!("static accept error: {e}"),
        }
    }
}

async fn handle(mut stream: TcpStream, root: &Path) -> std::io::Result<()> {
    let request = match timeout(READ_TIMEOUT, read_request_line(&mut stream)).await {
        Ok(result) => result?,
        Err(_) => {
            debug!("static request timed out");
            return Ok(());
        }
    };

    let response = match parse_request_path(&request).and_then(|p| resolve_path(root, p)) {
        Some(path) => respond(&path).await,
        None => NOT_FOUND.to_vec(),
    };

    stream.write_all(&response).await?;
    stream.shutdown().await
}

/// Reads up to and including the first `\n`, across as many reads as it
/// takes.  Invalid UTF-8 is replaced rather than rejected.
async fn read_request_line<R: AsyncRead + Unpin>(reader: R) -> std::io::Result<String> {
    let mut reader = BufReader::new(reader.take(REQUEST_BUFFER_SIZE as u64));
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line).await?;
    Ok(String::from_utf8_lossy(&line).into_owned())
}

/// Extracts the path from a `GET <path> HTTP/1.x` request line.
pub fn parse_request_path(request: &str) -> Option<&str> {
    let line = request.lines().next()?;
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("GET"), Some(path), Some(version)) if version.starts_with("HTTP/") => Some(path),
        _ => None,
    }
}

/// Maps a request path onto a file under `root`.
///
/// `/` becomes `index.html`; query strings are ignored.  Returns `None` for
/// any path containing a `..` component.
pub fn resolve_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    let path = request_path.split(['?', '#']).next().unwrap_or_default();
    let relative = path.trim_start_matches('/');
    let relative = if relative.is_empty() {
        "index.html"
    } else {
        relative
    };

    let relative = Path::new(relative);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }
    Some(root.join(relative))
}

/// MIME type by file extension.
pub fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("js") => "application/javascript",
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("wasm") => "application/wasm",
        _ => "text/plain",
    }
}

async fn respond(path: &Path) -> Vec<u8> {
    match tokio::fs::read(path).await {
        Ok(body) => {
            debug!("200 {}", path.display());
            let mut response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: {}\r\n\r\n",
                body.len(),
                content_type(path)
            )
            .into_bytes();
            response.extend_from_slice(&body);
            response
        }
        Err(e) => {
            debug!("404 {}: {e}", path.display());
            NOT_FOUND.to_vec()
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
