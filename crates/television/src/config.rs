//! Session configuration from the config file, profile, and CLI flags.

use television_config::{Config, Profile, active_profile_name, config_path, profile_to_session_config};
use television_core::{DEFAULT_PATH, SessionConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Build a `SessionConfig`. Precedence: flag > env > profile > defaults.
///
/// A profile is optional when `--origin` is given.
pub fn build_session_config(global: &GlobalOpts, cfg: &Config) -> Result<SessionConfig, CliError> {
    let profile_name = active_profile_name(global.profile.as_deref(), cfg);

    let mut profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.origin.is_some() => Profile {
            path: DEFAULT_PATH.into(),
            ..Profile::default()
        },
        // An explicitly requested profile must exist.
        None if global.profile.is_some() => {
            let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
            available.sort_unstable();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
                path: config_path().display().to_string(),
            });
        }
        None => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    if let Some(origin) = &global.origin {
        profile.origin.clone_from(origin);
    }
    if let Some(path) = &global.path {
        profile.path.clone_from(path);
    }

    tracing::debug!(profile = %profile_name, origin = %profile.origin, "resolved profile");
    Ok(profile_to_session_config(&profile, &cfg.defaults)?)
}
