// ── Runtime session configuration ──
//
// Describes *where* to connect and how patient to be. Never touches disk:
// the CLI (or any embedding application) builds a `SessionConfig` and
// hands it in.

use std::time::Duration;

use television_api::{ConnectionConfig, DEFAULT_PATH, DEFAULT_UPDATE_STREAM, endpoint_url};
use url::Url;

use crate::error::CoreError;

/// Configuration for one session against one server.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Server origin (e.g., `https://app.example.com`). The WebSocket
    /// scheme is derived from it.
    pub origin: Url,
    /// Upgrade path on the origin.
    pub path: String,
    /// Fixed delay before reopening a closed connection.
    pub reconnect_delay: Duration,
    /// Fixed interval at which a call waits for readiness.
    pub call_retry_interval: Duration,
    /// Stream name carrying model-update broadcasts.
    pub update_stream: String,
    /// Give up on unanswered calls after this long. `None` = wait forever.
    pub call_timeout: Option<Duration>,
}

impl SessionConfig {
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            path: DEFAULT_PATH.into(),
            reconnect_delay: Duration::from_millis(1000),
            call_retry_interval: Duration::from_millis(500),
            update_stream: DEFAULT_UPDATE_STREAM.into(),
            call_timeout: None,
        }
    }

    /// The WebSocket endpoint this config points at.
    pub fn endpoint(&self) -> Result<Url, CoreError> {
        Ok(endpoint_url(&self.origin, &self.path)?)
    }

    pub(crate) fn connection_config(&self) -> Result<ConnectionConfig, CoreError> {
        Ok(ConnectionConfig {
            url: self.endpoint()?,
            reconnect_delay: self.reconnect_delay,
            update_stream: self.update_stream.clone(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SessionConfig::new("http://localhost:8000".parse().unwrap());
        assert_eq!(config.path, "/tv/");
        assert_eq!(config.reconnect_delay, Duration::from_secs(1));
        assert_eq!(config.call_retry_interval, Duration::from_millis(500));
        assert_eq!(config.update_stream, "television-updates");
        assert!(config.call_timeout.is_none());
    }

    #[test]
    fn connection_config_follows_origin_scheme() {
        let mut config = SessionConfig::new("https://example.com".parse().unwrap());
        config.path = "/realtime/".into();
        let conn = config.connection_config().unwrap();
        assert_eq!(conn.url.as_str(), "wss://example.com/realtime/");
        assert_eq!(conn.reconnect_delay, config.reconnect_delay);
    }

    #[test]
    fn bad_origin_is_a_config_error() {
        let config = SessionConfig::new("file:///tmp/socket".parse().unwrap());
        assert!(matches!(config.endpoint(), Err(CoreError::Config { .. })));
    }
}
