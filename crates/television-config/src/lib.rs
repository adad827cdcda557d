//! Shared configuration for television clients.
//!
//! TOML profiles overlaid with `TELEVISION_` environment variables, and
//! translation of a profile into `television_core::SessionConfig`. The
//! core never reads files; this crate is the only place that does.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use television_core::SessionConfig;

/// Prefix of environment variables overlaid on the config file.
/// Nested keys are separated by a double underscore, e.g.
/// `TELEVISION_DEFAULTS__CALL_RETRY_MS=250`.
pub const ENV_PREFIX: &str = "TELEVISION_";

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "TELEVISION_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is requested explicitly.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

/// Settings every profile inherits unless it overrides them.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_call_retry_ms")]
    pub call_retry_ms: u64,

    #[serde(default = "default_update_stream")]
    pub update_stream: String,

    /// Unset means calls wait for their reply indefinitely.
    #[serde(default)]
    pub call_timeout_secs: Option<u64>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
            call_retry_ms: default_call_retry_ms(),
            update_stream: default_update_stream(),
            call_timeout_secs: None,
        }
    }
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}
fn default_call_retry_ms() -> u64 {
    500
}
fn default_update_stream() -> String {
    television_core::DEFAULT_UPDATE_STREAM.into()
}

/// A named server profile.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Server origin (e.g., "https://app.example.com").
    pub origin: String,

    /// WebSocket upgrade path on the origin.
    #[serde(default = "default_path")]
    pub path: String,

    pub reconnect_delay_ms: Option<u64>,
    pub call_retry_ms: Option<u64>,
    pub update_stream: Option<String>,
    pub call_timeout_secs: Option<u64>,
}

fn default_path() -> String {
    television_core::DEFAULT_PATH.into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `TELEVISION_CONFIG` if set, otherwise
/// the platform config directory.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("com", "television", "television").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("television");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment. A missing file is
/// not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Render a config as pretty TOML.
pub fn render_config(config: &Config) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(config)?)
}

// ── Profile resolution ──────────────────────────────────────────────

/// The profile to use: the requested one, else the configured default,
/// else `"default"`.
pub fn active_profile_name(requested: Option<&str>, config: &Config) -> String {
    requested
        .map(str::to_owned)
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Look up a profile by name.
pub fn find_profile<'a>(config: &'a Config, name: &str) -> Result<&'a Profile, ConfigError> {
    config
        .profiles
        .get(name)
        .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
}

/// Build a `SessionConfig` from a profile, filling gaps from `defaults`.
///
/// This is the single boundary where config types cross into core types.
pub fn profile_to_session_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<SessionConfig, ConfigError> {
    let origin: url::Url = profile.origin.parse().map_err(|_| ConfigError::Validation {
        field: "origin".into(),
        reason: format!("invalid URL: {}", profile.origin),
    })?;

    let call_retry_ms = profile.call_retry_ms.unwrap_or(defaults.call_retry_ms);
    if call_retry_ms == 0 {
        return Err(ConfigError::Validation {
            field: "call_retry_ms".into(),
            reason: "must be greater than zero".into(),
        });
    }

    let mut config = SessionConfig::new(origin);
    config.path.clone_from(&profile.path);
    config.reconnect_delay =
        Duration::from_millis(profile.reconnect_delay_ms.unwrap_or(defaults.reconnect_delay_ms));
    config.call_retry_interval = Duration::from_millis(call_retry_ms);
    config.update_stream = profile
        .update_stream
        .clone()
        .unwrap_or_else(|| defaults.update_stream.clone());
    config.call_timeout = profile
        .call_timeout_secs
        .or(defaults.call_timeout_secs)
        .map(Duration::from_secs);

    config.endpoint().map_err(|e| ConfigError::Validation {
        field: "origin".into(),
        reason: e.to_string(),
    })?;

    Ok(config)
}
