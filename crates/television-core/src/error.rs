// ── Core error types ──
//
// Session-level errors from television-core. Consumers never see raw
// tungstenite or JSON failures directly; the `From<television_api::Error>`
// impl translates wire-layer errors into these variants.

use serde_json::Value;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Transport error: {reason}")]
    Transport { reason: String },

    #[error("Session has been shut down")]
    Shutdown,

    // ── Call errors ──────────────────────────────────────────────────
    /// The server answered on the call's error channel.
    #[error("Call to '{channel}' was rejected: {payload}")]
    CallRejected { channel: String, payload: Value },

    #[error("Call to '{channel}' timed out after {timeout_ms}ms")]
    CallTimeout { channel: String, timeout_ms: u64 },

    #[error("Could not decode reply from '{channel}': {message}")]
    Decode { channel: String, message: String },

    // ── Reconciliation errors ────────────────────────────────────────
    /// A mutation carried an action this client does not understand.
    #[error("Unhandled data binding event '{action}' on channel={channel}")]
    UnhandledAction { channel: String, action: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Returns `true` for faults the server signalled for a specific call.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::CallRejected { .. })
    }

    /// Returns `true` for faults that mean client and server disagree on
    /// the protocol itself.
    pub fn is_integration_fault(&self) -> bool {
        matches!(self, Self::UnhandledAction { .. })
    }
}

// ── Conversion from wire-layer errors ────────────────────────────────

impl From<television_api::Error> for CoreError {
    fn from(err: television_api::Error) -> Self {
        match err {
            television_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            television_api::Error::UnsupportedScheme { scheme } => CoreError::Config {
                message: format!("Unsupported origin scheme '{scheme}'"),
            },
            television_api::Error::Shutdown => CoreError::Shutdown,
            television_api::Error::Serialization(e) => CoreError::Serialization(e),
            err @ (television_api::Error::WebSocketConnect(_)
            | television_api::Error::WebSocketClosed { .. }
            | television_api::Error::NotReady) => CoreError::Transport {
                reason: err.to_string(),
            },
        }
    }
}
