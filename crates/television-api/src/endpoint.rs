//! WebSocket endpoint derivation.
//!
//! The endpoint is a path-scoped upgrade on the configured origin. The
//! transport variant follows the origin's own scheme: plain origins get
//! `ws://`, TLS origins get `wss://`.

use url::Url;

use crate::error::Error;

/// Default upgrade path served by the backend.
pub const DEFAULT_PATH: &str = "/tv/";

/// Build the WebSocket URL for `path` on `origin`.
///
/// Any path, query, or fragment already on `origin` is replaced.
pub fn endpoint_url(origin: &Url, path: &str) -> Result<Url, Error> {
    let scheme = match origin.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::UnsupportedScheme {
                scheme: other.to_owned(),
            });
        }
    };

    let host = origin.host_str().ok_or(url::ParseError::EmptyHost)?;
    let authority = match origin.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    };
    let path = if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    };

    Ok(Url::parse(&format!("{scheme}://{authority}{path}"))?)
}
