use thiserror::Error;

/// Top-level error type for the `television-api` crate.
///
/// Covers the wire layer only: endpoint derivation, the WebSocket
/// connection, and envelope encoding. `television-core` maps these into
/// session-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Endpoint ────────────────────────────────────────────────────
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Origin uses a scheme that has no WebSocket counterpart.
    #[error("Unsupported origin scheme '{scheme}' (expected http, https, ws or wss)")]
    UnsupportedScheme { scheme: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed by the server.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// A frame was offered while the connection was not open.
    #[error("Connection is not ready")]
    NotReady,

    /// The connection loop has been cancelled.
    #[error("Connection has been shut down")]
    Shutdown,

    // ── Data ────────────────────────────────────────────────────────
    /// Envelope could not be encoded as JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::WebSocketConnect(_) | Self::WebSocketClosed { .. } | Self::NotReady
        )
    }
}
