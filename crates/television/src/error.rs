//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use television_config::ConfigError;
use television_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const REJECTED: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const PROTOCOL: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Calls ────────────────────────────────────────────────────────
    #[error("Call to '{channel}' was rejected by the server")]
    #[diagnostic(code(television::rejected), help("Server said:\n{payload}"))]
    Rejected { channel: String, payload: String },

    #[error("Call to '{channel}' got no reply within {timeout_ms}ms")]
    #[diagnostic(
        code(television::timeout),
        help("Raise --timeout, or check that a handler is registered for '{channel}'.")
    )]
    Timeout { channel: String, timeout_ms: u64 },

    #[error("Could not decode reply from '{channel}': {message}")]
    #[diagnostic(code(television::decode))]
    Decode { channel: String, message: String },

    // ── Bindings ─────────────────────────────────────────────────────
    #[error("Unhandled data binding event '{action}' on channel={channel}")]
    #[diagnostic(
        code(television::unhandled_action),
        help("The server sent a mutation this client does not understand; client and server versions likely differ.")
    )]
    UnhandledAction { channel: String, action: String },

    // ── Connection ───────────────────────────────────────────────────
    #[error("Transport error: {reason}")]
    #[diagnostic(code(television::transport))]
    Transport { reason: String },

    #[error("Session closed before the operation completed")]
    #[diagnostic(code(television::shutdown))]
    Shutdown,

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(television::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(television::profile_not_found),
        help("Available profiles: {available}\nConfig file: {path}")
    )]
    ProfileNotFound {
        name: String,
        available: String,
        path: String,
    },

    #[error("No server configured")]
    #[diagnostic(
        code(television::no_config),
        help(
            "Pass --origin (or set TELEVISION_ORIGIN), or add a profile to the config file.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(television::config))]
    Config(Box<ConfigError>),

    // ── Serialization ────────────────────────────────────────────────
    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(television::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::UnhandledAction { .. } | Self::Decode { .. } => exit_code::PROTOCOL,
            Self::Transport { .. } | Self::Shutdown => exit_code::CONNECTION,
            Self::Validation { .. } | Self::ProfileNotFound { .. } | Self::NoConfig { .. } => {
                exit_code::USAGE
            }
            Self::Config(_) | Self::Json(_) => exit_code::GENERAL,
        }
    }
}

// ── Library errors → CliError ────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::CallRejected { channel, payload } => CliError::Rejected {
                channel,
                payload: payload
                    .as_str()
                    .map_or_else(|| payload.to_string(), str::to_owned),
            },
            CoreError::CallTimeout {
                channel,
                timeout_ms,
            } => CliError::Timeout {
                channel,
                timeout_ms,
            },
            CoreError::Decode { channel, message } => CliError::Decode { channel, message },
            CoreError::UnhandledAction { channel, action } => {
                CliError::UnhandledAction { channel, action }
            }
            CoreError::Transport { reason } => CliError::Transport { reason },
            CoreError::Shutdown => CliError::Shutdown,
            CoreError::Serialization(e) => CliError::Json(e),
            CoreError::Config { message } => CliError::Validation {
                field: "origin".into(),
                reason: message,
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(Box::new(other)),
        }
    }
}
